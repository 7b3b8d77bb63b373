use crate::config::{self, Config, Settings};
use crate::conversation::{Conversation, Role};
use crate::error::ChatError;
use crate::provider::Provider;
use crate::{cli, paths};
use anyhow::Context;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Merge config layers, CLI flags and environment credentials.
pub fn resolve_config(args: &cli::Args) -> anyhow::Result<Config> {
    let layers = paths::config_layers()?;
    let mut cfg = Config::load_layered(&layers)?.merge(Config {
        provider: args.provider.clone(),
        api_key: None,
        model: args.model.clone(),
        system_prompt: args.system.clone(),
        base_url: None,
    });

    if cfg.api_key.is_none() {
        let env_key = cfg
            .provider
            .as_deref()
            .and_then(|name| crate::provider::lookup(name).ok())
            .and_then(|kind| kind.api_key_env());
        if let Some(var) = env_key {
            cfg.api_key = std::env::var(var).ok();
        }
    }

    tracing::debug!(?cfg, "resolved config");
    Ok(cfg)
}

pub async fn build_provider(http: &reqwest::Client, settings: &Settings) -> anyhow::Result<Provider> {
    let provider = settings.build_provider(http)?;
    config::validate_model(&provider).await?;
    Ok(provider)
}

pub async fn cmd_models(provider: &Provider) -> anyhow::Result<()> {
    let models = provider.supported_models().await;
    let mut out = std::io::stdout();
    if models.is_empty() {
        writeln!(out, "No models available for {}", provider.name())?;
    }
    for m in models {
        writeln!(out, "{m}")?;
    }
    Ok(())
}

/// Append `input` as a user turn, stream the reply into `out`, and commit
/// the reply as an assistant turn once the stream completed with text.
///
/// If this future is dropped mid-stream nothing beyond the user turn is
/// recorded.
pub async fn run_turn(
    provider: &Provider,
    conversation: &mut Conversation,
    input: String,
    out: &mut (dyn Write + Send),
) -> Result<String, ChatError> {
    conversation.add_message(Role::User, input);

    let mut sink = |text: &str| {
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    };
    let reply = provider.chat(conversation, Some(&mut sink)).await?;

    if !reply.is_empty() {
        conversation.add_message(Role::Assistant, reply.clone());
    }
    Ok(reply)
}

/// Read one multi-line message; an empty line submits it.
///
/// Returns `None` at end of input with nothing pending.
pub async fn read_input<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<Option<String>> {
    let mut message = String::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Ok((!message.is_empty()).then_some(message));
        }
        if line.trim().is_empty() {
            return Ok(Some(message));
        }
        message.push_str(&line);
    }
}

pub async fn run_repl(provider: &Provider, conversation: &mut Conversation) -> anyhow::Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut out = std::io::stdout();

    writeln!(out, "parley v{} ({})", env!("CARGO_PKG_VERSION"), provider.name())?;
    writeln!(out, "Type your message and press Enter twice to send. Type 'exit' or 'quit' to quit.")?;
    writeln!(out)?;

    loop {
        write!(out, "parley> ")?;
        out.flush()?;

        let input = tokio::select! {
            read = read_input(&mut stdin) => read.context("failed to read input")?,
            _ = tokio::signal::ctrl_c() => {
                writeln!(out, "\nGoodbye!")?;
                return Ok(());
            }
        };
        let Some(input) = input else { break };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_ascii_lowercase().as_str(), "exit" | "quit") {
            break;
        }
        if input == "/clear" {
            conversation.clear();
            writeln!(out, "(conversation cleared)")?;
            continue;
        }

        // Dropping the turn future on Ctrl+C abandons the request.
        let turn = tokio::select! {
            res = run_turn(provider, &mut *conversation, input.to_string(), &mut out) => Some(res),
            _ = tokio::signal::ctrl_c() => None,
        };
        writeln!(out)?;

        match turn {
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                tracing::debug!(status = ?e.status(), "turn failed");
                eprintln!("error: {e}");
            }
            None => tracing::info!("response interrupted; not recorded"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use reqwest::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn ollama_at(server: &MockServer) -> Provider {
        let base = Url::parse(&server.uri()).unwrap();
        Provider::new(reqwest::Client::new(), ProviderKind::Ollama, None, Some("llama3".into()))
            .unwrap()
            .with_base_url(&base)
            .unwrap()
    }

    #[tokio::test]
    async fn completed_turn_is_committed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                "{\"message\":{\"content\":\"Hi\"}}\n{\"message\":{\"content\":\"!\"}}\n",
            ))
            .mount(&server)
            .await;

        let provider = ollama_at(&server).await;
        let mut conv = Conversation::new();
        let mut out = Vec::new();
        let reply = run_turn(&provider, &mut conv, "hello".into(), &mut out).await.unwrap();

        assert_eq!(reply, "Hi!");
        assert_eq!(String::from_utf8(out).unwrap(), "Hi!");
        let roles: Vec<_> = conv.messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, [Role::User, Role::Assistant]);
        assert_eq!(conv.messages()[1].content(), "Hi!");
    }

    #[tokio::test]
    async fn failed_turn_records_only_the_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&server)
            .await;

        let provider = ollama_at(&server).await;
        let mut conv = Conversation::new();
        let mut out = Vec::new();
        let err = run_turn(&provider, &mut conv, "hello".into(), &mut out).await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(conv.messages().len(), 1);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn empty_reply_is_not_committed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"done\":true}\n"))
            .mount(&server)
            .await;

        let provider = ollama_at(&server).await;
        let mut conv = Conversation::new();
        let mut out = Vec::new();
        let reply = run_turn(&provider, &mut conv, "hello".into(), &mut out).await.unwrap();
        assert_eq!(reply, "");
        assert_eq!(conv.messages().len(), 1);
    }

    #[tokio::test]
    async fn cancelled_turn_commits_no_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"message\":{\"content\":\"late\"}}\n")
                    .set_delay(std::time::Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let provider = ollama_at(&server).await;
        let mut conv = Conversation::new();
        let mut out = Vec::new();
        let turn = tokio::time::timeout(
            std::time::Duration::from_millis(200),
            run_turn(&provider, &mut conv, "hello".into(), &mut out),
        )
        .await;

        assert!(turn.is_err(), "turn should have been cut off");
        assert_eq!(conv.messages().len(), 1);
        assert_eq!(conv.messages()[0].role(), Role::User);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn blank_line_submits_multi_line_input() {
        let mut reader = BufReader::new(&b"first line\nsecond line\n\nnext\n"[..]);
        let msg = read_input(&mut reader).await.unwrap();
        assert_eq!(msg.as_deref(), Some("first line\nsecond line\n"));

        let msg = read_input(&mut reader).await.unwrap();
        assert_eq!(msg.as_deref(), Some("next\n"));
        assert!(read_input(&mut reader).await.unwrap().is_none());
    }
}
