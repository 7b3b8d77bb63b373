use super::decode::Decoder;
use crate::error::ChatError;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde::Serialize;
use tokio_stream::StreamExt;

/// Per-fragment sink, called synchronously before the next chunk is read.
pub type FragmentSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// POST `body` to `url` and drive `decoder` over the streamed response.
///
/// Returns the concatenation of every fragment, which is exactly what `sink`
/// observed (when given). TLS is chosen by the URL scheme.
pub async fn post_stream<B: Serialize + ?Sized>(
    http: &reqwest::Client,
    url: Url,
    headers: HeaderMap,
    body: &B,
    mut decoder: Decoder,
    mut sink: Option<FragmentSink<'_>>,
) -> Result<String, ChatError> {
    tracing::debug!(%url, "starting streaming request");

    let resp = http.post(url).headers(headers).json(body).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let body = match resp.text().await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, %status, "failed to read error body");
                String::new()
            }
        };
        return Err(ChatError::Transport {
            status: status.as_u16(),
            body,
        });
    }

    let mut full = String::new();
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        deliver(decoder.push(&chunk), &mut full, &mut sink);
    }
    deliver(decoder.finish(), &mut full, &mut sink);

    tracing::debug!(chars = full.len(), "stream complete");
    Ok(full)
}

fn deliver(fragments: Vec<String>, full: &mut String, sink: &mut Option<FragmentSink<'_>>) {
    for fragment in fragments {
        full.push_str(&fragment);
        if let Some(sink) = sink.as_mut() {
            (*sink)(&fragment);
        }
    }
}
