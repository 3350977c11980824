use clap::{Args, Parser, Subcommand};

use crate::config::ConfigOverrides;

#[derive(Parser)]
#[command(
    name = "kbchat",
    about = "Answer questions about a scraped website with retrieval-augmented generation",
    version
)]
pub struct Cli {
    /// Enable verbose output (debug logging, retrieval details)
    #[arg(global = true, long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Interactive chat session over the knowledge base
    Chat {
        #[command(flatten)]
        serve: ServeArgs,
    },

    /// Answer a single question and exit
    Ask {
        /// Question to answer
        query: String,

        #[command(flatten)]
        serve: ServeArgs,
    },

    /// Build a chunk index from scraped section content
    Build {
        /// Scraped content JSON: {"Section": {"context": "...", "url": "...", "links": {...}}}
        #[arg(long, short)]
        input: String,

        /// Where to write the index (default: $KBCHAT_INDEX or the data directory)
        #[arg(long, short)]
        output: Option<String>,

        /// Embedding provider (huggingface, openai, ollama)
        #[arg(long, default_value = "huggingface")]
        provider: String,

        /// Embedding model (default depends on provider)
        #[arg(long)]
        model: Option<String>,

        /// Embedding endpoint override
        #[arg(long)]
        endpoint: Option<String>,

        /// Words per chunk
        #[arg(long, default_value = "300")]
        chunk_words: usize,

        /// Drop chunks shorter than this many words
        #[arg(long, default_value = "30")]
        min_words: usize,
    },

    /// Summarize an index file
    Inspect {
        /// Index path (default: $KBCHAT_INDEX or the data directory)
        #[arg(long)]
        index: Option<String>,
    },
}

/// Options shared by the commands that answer questions.
#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Index path (default: $KBCHAT_INDEX or the data directory)
    #[arg(long)]
    pub index: Option<String>,

    /// Generation provider (huggingface, openai, ollama)
    #[arg(long)]
    pub provider: Option<String>,

    /// Generation model id
    #[arg(long)]
    pub model: Option<String>,

    /// Generation endpoint override
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Query embedding endpoint override
    #[arg(long)]
    pub embed_endpoint: Option<String>,

    /// Candidates kept per section
    #[arg(long)]
    pub top_n: Option<usize>,

    /// Minimum similarity for a chunk to be used
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Maximum generated tokens
    #[arg(long)]
    pub max_tokens: Option<u32>,
}

impl From<ServeArgs> for ConfigOverrides {
    fn from(args: ServeArgs) -> Self {
        ConfigOverrides {
            index: args.index,
            provider: args.provider,
            model: args.model,
            endpoint: args.endpoint,
            embed_endpoint: args.embed_endpoint,
            top_n: args.top_n,
            threshold: args.threshold,
            max_tokens: args.max_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn ask_parses_serve_flags() {
        let cli = Cli::parse_from([
            "kbchat", "ask", "how much", "--threshold", "0.5", "--top-n", "2", "-v",
        ]);
        assert!(cli.verbose);
        match cli.command {
            Commands::Ask { query, serve } => {
                assert_eq!(query, "how much");
                let overrides = ConfigOverrides::from(serve);
                assert_eq!(overrides.threshold, Some(0.5));
                assert_eq!(overrides.top_n, Some(2));
            }
            _ => panic!("expected ask"),
        }
    }

    #[test]
    fn build_defaults() {
        let cli = Cli::parse_from(["kbchat", "build", "--input", "scraped.json"]);
        match cli.command {
            Commands::Build {
                provider,
                chunk_words,
                min_words,
                ..
            } => {
                assert_eq!(provider, "huggingface");
                assert_eq!(chunk_words, 300);
                assert_eq!(min_words, 30);
            }
            _ => panic!("expected build"),
        }
    }
}
