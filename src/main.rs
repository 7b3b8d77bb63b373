mod app;
mod cli;
mod config;
mod conversation;
mod error;
mod paths;
mod provider;

use anyhow::Context;
use clap::Parser;
use conversation::{Conversation, Role};
use std::io::Write;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Streamed text owns stdout; logs go to stderr and stay quiet by default.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let args = cli::Args::parse();

    let cfg = app::resolve_config(&args)?;
    let settings = config::Settings::from_config(&cfg)?;
    tracing::debug!(?settings, "validated settings");

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    let provider = app::build_provider(&http, &settings).await?;

    tracing::debug!(provider = provider.name(), endpoint = %provider.endpoint(), "provider ready");

    if let Some(cli::Command::Models) = args.cmd {
        return app::cmd_models(&provider).await;
    }

    let mut conversation = match settings.system_prompt.clone() {
        Some(system) => Conversation::with_system_prompt(system),
        None => Conversation::new(),
    };

    let prompt = args.prompt.join(" ");
    if prompt.trim().is_empty() {
        return app::run_repl(&provider, &mut conversation).await;
    }

    conversation.add_message(Role::User, prompt);
    let mut sink = |text: &str| {
        print!("{text}");
        std::io::stdout().flush().ok();
    };
    provider
        .chat(&conversation, Some(&mut sink))
        .await
        .context("chat request failed")?;
    println!();

    Ok(())
}
