use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use kbchat::cli::{Cli, Commands};
use kbchat::commands::ask::cmd_ask;
use kbchat::commands::build::{cmd_build, BuildArgs};
use kbchat::commands::chat::cmd_chat;
use kbchat::commands::inspect::cmd_inspect;
use kbchat::config::{default_index_path, Config};
use kbchat::error::Result;
use kbchat::index::builder::BuildOptions;

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "kbchat=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Index load and config failures are the only fatal errors
    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Chat { serve } => {
            let config = Config::load(serve.into())?;
            cmd_chat(&config)
        }
        Commands::Ask { query, serve } => {
            let config = Config::load(serve.into())?;
            cmd_ask(&config, &query, cli.verbose)
        }
        Commands::Build {
            input,
            output,
            provider,
            model,
            endpoint,
            chunk_words,
            min_words,
        } => cmd_build(BuildArgs {
            input,
            output,
            provider,
            model,
            endpoint,
            options: BuildOptions {
                chunk_words,
                min_words,
            },
        }),
        Commands::Inspect { index } => {
            let path = match index.or_else(|| std::env::var("KBCHAT_INDEX").ok()) {
                Some(p) => std::path::PathBuf::from(shellexpand::tilde(&p).into_owned()),
                None => default_index_path()?,
            };
            cmd_inspect(&path)
        }
    }
}
