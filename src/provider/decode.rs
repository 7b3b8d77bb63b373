//! Incremental decoders for the two streaming wire formats.
//!
//! Both keep a single byte buffer of bytes received but not yet resolved into
//! a complete frame. A decoder lives for exactly one response body; `finish`
//! consumes it so partial frames can never leak into another request.

use super::{anthropic, ollama, openai};
use memchr::memmem;

const EVENT_SEPARATOR: &[u8] = b"\n\n";
const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Where the text lives inside one decoded JSON payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `content_block_delta` events, `delta.text`.
    AnthropicDelta,
    /// `choices[0].delta.content`.
    OpenAiChoice,
    /// `message.content`.
    OllamaMessage,
}

impl Dialect {
    fn extract(self, payload: &str) -> Option<String> {
        let text = match self {
            Dialect::AnthropicDelta => anthropic::extract_text(payload),
            Dialect::OpenAiChoice => openai::extract_text(payload),
            Dialect::OllamaMessage => ollama::extract_text(payload),
        };
        text.filter(|t| !t.is_empty())
    }
}

/// Closed set of stream decoders, picked per backend.
#[derive(Debug)]
pub enum Decoder {
    Events(EventDecoder),
    Lines(LineDecoder),
}

impl Decoder {
    /// Feed one network chunk; returns every fragment that became complete.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        match self {
            Decoder::Events(d) => d.push(chunk),
            Decoder::Lines(d) => d.push(chunk),
        }
    }

    /// Signal end-of-stream.
    pub fn finish(self) -> Vec<String> {
        match self {
            Decoder::Events(d) => d.finish(),
            Decoder::Lines(d) => d.finish(),
        }
    }
}

/// Blank-line delimited `field: value` blocks (server-sent events).
#[derive(Debug)]
pub struct EventDecoder {
    buf: Vec<u8>,
    dialect: Dialect,
}

impl EventDecoder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            buf: Vec::new(),
            dialect,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(idx) = memmem::find(&self.buf, EVENT_SEPARATOR) {
            let frame: Vec<u8> = self.buf.drain(..idx + EVENT_SEPARATOR.len()).collect();
            self.decode_frame(&frame, &mut out);
        }

        out
    }

    /// The last event may arrive without its trailing separator.
    pub fn finish(mut self) -> Vec<String> {
        let mut out = Vec::new();
        let residue = std::mem::take(&mut self.buf);
        if !residue.iter().all(u8::is_ascii_whitespace) {
            self.decode_frame(&residue, &mut out);
        }
        out
    }

    fn decode_frame(&self, frame: &[u8], out: &mut Vec<String>) {
        let frame = String::from_utf8_lossy(frame);
        for line in frame.lines() {
            let Some(data) = line.trim().strip_prefix(DATA_PREFIX) else {
                // event:, id:, retry: and comments carry nothing for us.
                continue;
            };
            if data == DONE_SENTINEL {
                continue;
            }
            match self.dialect.extract(data) {
                Some(text) => out.push(text),
                None => tracing::trace!(data, "event carried no text"),
            }
        }
    }
}

/// One JSON object per line.
#[derive(Debug)]
pub struct LineDecoder {
    buf: Vec<u8>,
    dialect: Dialect,
}

impl LineDecoder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            buf: Vec::new(),
            dialect,
        }
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();

        while let Some(pos) = memchr::memchr(b'\n', &self.buf) {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(text) = self.dialect.extract(line) {
                out.push(text);
            }
        }

        out
    }

    /// An unterminated trailing line is dropped, not decoded.
    // TODO: decide whether a backend that omits the final newline should be
    // tolerated; for now the partial line is logged and discarded.
    pub fn finish(self) -> Vec<String> {
        let residue = String::from_utf8_lossy(&self.buf);
        if !residue.trim().is_empty() {
            tracing::warn!(
                bytes = self.buf.len(),
                "discarding unterminated trailing line at end of stream"
            );
        }
        Vec::new()
    }
}
