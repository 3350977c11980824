use std::path::PathBuf;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::default_index_path;
use crate::embeddings::EmbeddingProvider;
use crate::error::{ChatError, Result};
use crate::index::builder::{self, BuildOptions};
use crate::providers::{Provider, ResolvedProvider};

pub struct BuildArgs {
    pub input: String,
    pub output: Option<String>,
    pub provider: String,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    pub options: BuildOptions,
}

pub fn cmd_build(args: BuildArgs) -> Result<()> {
    let provider = Provider::from_str_loose(&args.provider)
        .ok_or_else(|| ChatError::Config(format!("Unknown provider: {}", args.provider)))?;
    if args.options.chunk_words == 0 {
        return Err(ChatError::Config("--chunk-words must be at least 1".into()));
    }

    let input = PathBuf::from(shellexpand::tilde(&args.input).into_owned());
    let output = match args
        .output
        .or_else(|| std::env::var("KBCHAT_INDEX").ok())
    {
        Some(path) => PathBuf::from(shellexpand::tilde(&path).into_owned()),
        None => default_index_path()?,
    };

    let scraped = builder::load_scraped(&input)?;
    let prepared = builder::prepare_sections(scraped.sections, args.options);
    let total: usize = prepared.iter().map(|s| s.segments.len()).sum();

    println!(
        "{} {} chunks across {} sections",
        "Embedding".green().bold(),
        total,
        prepared.len()
    );

    let embedder = EmbeddingProvider::new(ResolvedProvider::resolve(
        provider,
        args.endpoint,
        args.model,
        provider.default_embedding_model(),
    ));

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| ChatError::Config(format!("progress template: {}", e)))?
            .progress_chars("=>-"),
    );

    let rt = super::runtime()?;
    let index = rt.block_on(builder::embed_sections(
        prepared,
        &embedder,
        provider,
        |name, count| {
            pb.set_message(name.to_string());
            pb.inc(count as u64);
        },
    ));
    pb.finish_and_clear();
    let index = index?.with_source_digest(scraped.digest);

    index.save(&output)?;

    let stats = index.stats();
    println!("{} Index written to {}", "Done!".green().bold(), output.display().to_string().cyan());
    println!("  Model:      {} ({})", index.metadata().model, provider);
    println!("  Dimension:  {}", index.dimension());
    println!("  Sections:   {}", stats.sections);
    println!("  Chunks:     {}", stats.total_chunks);

    Ok(())
}
