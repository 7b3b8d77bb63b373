use clap::{Parser, Subcommand};

/// Stream a conversation to Anthropic, OpenAI or a local Ollama server
#[derive(Debug, Parser)]
#[command(name = "parley")]
#[command(version)]
#[command(about = "Streaming chat client for several LLM backends", long_about = None)]
pub struct Args {
    /// Provider: anthropic, open_ai or ollama (default: config)
    #[arg(short = 'p', long = "provider")]
    pub provider: Option<String>,

    /// Model name (default: config, then the provider's first model)
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// System prompt for this session
    #[arg(short = 's', long = "system")]
    pub system: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Prompt text; without one an interactive session starts. Put `--`
    /// first when the prompt begins with a subcommand name (`parley -- models ...`)
    #[arg(value_name = "PROMPT")]
    pub prompt: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the models the selected provider accepts
    Models,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_words_and_flags() {
        let args = Args::parse_from(["parley", "-p", "ollama", "--model", "llama3", "hello", "there"]);
        assert_eq!(args.provider.as_deref(), Some("ollama"));
        assert_eq!(args.model.as_deref(), Some("llama3"));
        assert_eq!(args.prompt, ["hello", "there"]);
        assert!(args.cmd.is_none());
    }

    #[test]
    fn models_subcommand() {
        let args = Args::parse_from(["parley", "--provider", "open_ai", "models"]);
        assert!(matches!(args.cmd, Some(Command::Models)));
    }

    #[test]
    fn prompt_starting_with_subcommand_name() {
        assert!(Args::try_parse_from(["parley", "models", "are", "cool"]).is_err());

        let args = Args::parse_from(["parley", "--", "models", "are", "cool"]);
        assert!(args.cmd.is_none());
        assert_eq!(args.prompt, ["models", "are", "cool"]);
    }
}
