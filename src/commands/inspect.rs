use std::path::Path;

use colored::Colorize;

use crate::error::Result;
use crate::index::ChunkIndex;

const PREVIEW_CHARS: usize = 200;

pub fn cmd_inspect(index_path: &Path) -> Result<()> {
    let index = super::load_index(index_path)?;
    let size = std::fs::metadata(index_path)?.len();
    let meta = index.metadata();
    let stats = index.stats();

    println!("{}", "Index".green().bold());
    println!("{}", "=".repeat(40));
    println!("  Path:       {}", index_path.display().to_string().cyan());
    println!("  Size:       {}", humansize::format_size(size, humansize::BINARY));
    println!("  Embeddings: {} / {} (dim {})", meta.provider, meta.model, meta.dimension);
    if let Some(built_at) = meta.built_at {
        println!("  Built:      {}", built_at.format("%Y-%m-%d %H:%M UTC"));
    }
    if let Some(digest) = &meta.source_digest {
        println!("  Source:     sha256:{}", short_digest(digest));
    }
    println!(
        "  Sections:   {} ({} empty)",
        stats.sections, stats.empty_sections
    );
    println!("  Chunks:     {}", stats.total_chunks);
    println!();

    for section in index.sections() {
        println!(
            "  {}\t{} chunks, {} links",
            section.name().cyan().bold(),
            section.chunks().len(),
            section.links().len()
        );
        if let Some(first) = section.chunks().first() {
            println!("    {}", preview(&first.text).dimmed());
        }
    }

    Ok(())
}

fn short_digest(digest: &str) -> String {
    digest.chars().take(16).collect()
}

fn preview(text: &str) -> String {
    let cleaned = text.replace('\n', " ");
    let cleaned = cleaned.trim();
    if cleaned.chars().count() <= PREVIEW_CHARS {
        cleaned.to_string()
    } else {
        let cut: String = cleaned.chars().take(PREVIEW_CHARS - 3).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_shortened_on_char_boundary() {
        assert_eq!(short_digest("aéééééééé"), "aéééééééé");
        assert_eq!(short_digest(&"é".repeat(20)).chars().count(), 16);
        assert_eq!(short_digest(&"ab".repeat(32)), "abababababababab");
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(preview("Plans\nstart at $10"), "Plans start at $10");
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        let text = "é".repeat(300);
        let p = preview(&text);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS);
    }
}
