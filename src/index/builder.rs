use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{ChunkIndex, IndexFile, IndexMetadata, SectionRecord};
use crate::embeddings::Embedder;
use crate::error::{ChatError, Result};
use crate::providers::Provider;

pub const DEFAULT_CHUNK_WORDS: usize = 300;
pub const DEFAULT_MIN_WORDS: usize = 30;

/// Scraped page content for one section, as produced by the content store.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedSection {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub links: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Words per segment
    pub chunk_words: usize,
    /// Segments shorter than this are dropped
    pub min_words: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            chunk_words: DEFAULT_CHUNK_WORDS,
            min_words: DEFAULT_MIN_WORDS,
        }
    }
}

/// A section whose text is segmented but not yet embedded.
#[derive(Debug, Clone)]
pub struct PreparedSection {
    pub name: String,
    pub url: Option<String>,
    pub segments: Vec<String>,
    pub links: BTreeMap<String, String>,
}

pub struct ScrapedInput {
    pub sections: Vec<(String, ScrapedSection)>,
    pub digest: String,
}

/// Read a scraped-content file: an object of section name -> page content.
pub fn load_scraped(path: &Path) -> Result<ScrapedInput> {
    let content = std::fs::read_to_string(path)?;
    Ok(ScrapedInput {
        sections: parse_scraped(&content)?,
        digest: source_digest(&content),
    })
}

/// Hex SHA-256 of the raw scraped content.
pub fn source_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn parse_scraped(content: &str) -> Result<Vec<(String, ScrapedSection)>> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
    map.into_iter()
        .filter(|(name, _)| !name.starts_with('_'))
        .map(|(name, value)| -> Result<(String, ScrapedSection)> {
            Ok((name, serde_json::from_value(value)?))
        })
        .collect()
}

fn tag_pattern() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new(r"<[^>]+>").expect("static regex"))
}

/// Strip markup tags and collapse whitespace runs to single spaces.
pub fn clean_text(raw: &str) -> String {
    let stripped = tag_pattern().replace_all(raw, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Consecutive windows of `size` words. The last window may be shorter.
pub fn segment_words(text: &str, size: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    words
        .chunks(size.max(1))
        .map(|window| window.join(" "))
        .collect()
}

/// Keep segments with at least `min_words` words and some alphanumeric content.
pub fn prune_segments(segments: Vec<String>, min_words: usize) -> Vec<String> {
    segments
        .into_iter()
        .filter(|s| s.split_whitespace().count() >= min_words)
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

/// Clean, segment and prune every section. Sections left without segments are dropped.
pub fn prepare_sections(
    scraped: Vec<(String, ScrapedSection)>,
    options: BuildOptions,
) -> Vec<PreparedSection> {
    let mut prepared = Vec::new();
    for (name, section) in scraped {
        let cleaned = clean_text(&section.context);
        let segments = prune_segments(
            segment_words(&cleaned, options.chunk_words),
            options.min_words,
        );
        if segments.is_empty() {
            tracing::warn!(section = %name, "no valid segments found, skipping section");
            continue;
        }
        prepared.push(PreparedSection {
            name,
            url: section.url,
            segments,
            links: section.links,
        });
    }
    prepared
}

/// Embed prepared sections and assemble a validated index.
///
/// `on_section` is called after each section is embedded.
pub async fn embed_sections(
    prepared: Vec<PreparedSection>,
    embedder: &dyn Embedder,
    provider: Provider,
    mut on_section: impl FnMut(&str, usize),
) -> Result<ChunkIndex> {
    if prepared.is_empty() {
        return Err(ChatError::Config(
            "no section produced valid segments; nothing to index".into(),
        ));
    }

    let mut dimension: Option<usize> = None;
    let mut records = Vec::with_capacity(prepared.len());

    for section in prepared {
        let embeddings = embedder.embed_batch(&section.segments).await?;
        if embeddings.len() != section.segments.len() {
            return Err(ChatError::Embedding(format!(
                "section '{}': {} segments but {} embeddings",
                section.name,
                section.segments.len(),
                embeddings.len()
            )));
        }

        for e in &embeddings {
            match dimension {
                None => dimension = Some(e.len()),
                Some(d) if d != e.len() => {
                    return Err(ChatError::Embedding(format!(
                        "section '{}': embedding dimension {} differs from {}",
                        section.name,
                        e.len(),
                        d
                    )));
                }
                Some(_) => {}
            }
        }

        on_section(&section.name, section.segments.len());

        let references = match &section.url {
            Some(url) => vec![Some(url.clone()); section.segments.len()],
            None => Vec::new(),
        };
        records.push(SectionRecord {
            name: section.name,
            chunks: section.segments,
            embeddings,
            references,
            links: section.links,
        });
    }

    let file = IndexFile {
        metadata: IndexMetadata {
            provider,
            model: embedder.model_id().to_string(),
            dimension: dimension.unwrap_or(0),
            built_at: Some(chrono::Utc::now()),
            source_digest: None,
        },
        sections: records,
    };

    ChunkIndex::from_file(file).map_err(ChatError::from)
}
