//! Named sections of text chunks with their precomputed embeddings.
//!
//! An index is built once by [`builder`], persisted as JSON and loaded
//! read-only for serving. Every vector in an index lives in the single
//! embedding space named by its [`IndexMetadata`].

pub mod builder;

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IndexLoadError, Result};
use crate::providers::Provider;

/// Legacy layouts keep the model name under this key next to the sections.
const LEGACY_MODEL_KEY: &str = "_embedding_model";

/// Which embedding model produced the vectors of an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub provider: Provider,
    pub model: String,
    pub dimension: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
    /// SHA-256 of the scraped content the index was built from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_digest: Option<String>,
}

/// A unit of retrievable text and its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub embedding: Vec<f32>,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    name: String,
    chunks: Vec<Chunk>,
    links: BTreeMap<String, String>,
}

impl Section {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Embeddings aligned by position with [`Section::chunks`].
    pub fn embeddings(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.chunks.iter().map(|c| c.embedding.as_slice())
    }

    pub fn links(&self) -> &BTreeMap<String, String> {
        &self.links
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// On-disk section record. `chunks` and `embeddings` are parallel arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRecord {
    pub name: String,
    pub chunks: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Option<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,
}

/// On-disk index layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub metadata: IndexMetadata,
    pub sections: Vec<SectionRecord>,
}

#[derive(Debug, Deserialize)]
struct LegacySection {
    #[serde(default)]
    chunks: Vec<String>,
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
    #[serde(default)]
    links: BTreeMap<String, String>,
}

/// Read-only chunk index, safe to share across sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkIndex {
    metadata: IndexMetadata,
    sections: Vec<Section>,
}

pub struct IndexStats {
    pub sections: usize,
    pub empty_sections: usize,
    pub total_chunks: usize,
    pub by_section: Vec<(String, usize)>,
}

impl ChunkIndex {
    /// Load and validate an index file.
    pub fn load(path: &Path) -> std::result::Result<Self, IndexLoadError> {
        let content = std::fs::read_to_string(path).map_err(|source| IndexLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse either the canonical layout or the legacy section map.
    pub fn from_json(content: &str) -> std::result::Result<Self, IndexLoadError> {
        let value: serde_json::Value = serde_json::from_str(content)?;

        let is_canonical = value
            .as_object()
            .map(|o| {
                o.get("metadata").is_some_and(|m| m.is_object())
                    && o.get("sections").is_some_and(|s| s.is_array())
            })
            .unwrap_or(false);

        if is_canonical {
            let file: IndexFile = serde_json::from_value(value)?;
            Self::from_file(file)
        } else {
            Self::from_legacy(value)
        }
    }

    /// Validate a deserialized index file and build the serving structure.
    pub fn from_file(file: IndexFile) -> std::result::Result<Self, IndexLoadError> {
        let dimension = file.metadata.dimension;
        if dimension == 0 && file.sections.iter().any(|r| !r.embeddings.is_empty()) {
            return Err(IndexLoadError::Corrupt(
                "index has embeddings but dimension 0".into(),
            ));
        }

        let mut seen = HashSet::new();
        let mut sections = Vec::with_capacity(file.sections.len());

        for record in file.sections {
            if !seen.insert(record.name.clone()) {
                return Err(IndexLoadError::Corrupt(format!(
                    "duplicate section '{}'",
                    record.name
                )));
            }
            if record.chunks.len() != record.embeddings.len() {
                return Err(IndexLoadError::Corrupt(format!(
                    "section '{}' has {} chunks but {} embeddings",
                    record.name,
                    record.chunks.len(),
                    record.embeddings.len()
                )));
            }
            if !record.references.is_empty() && record.references.len() != record.chunks.len() {
                return Err(IndexLoadError::Corrupt(format!(
                    "section '{}' has {} chunks but {} references",
                    record.name,
                    record.chunks.len(),
                    record.references.len()
                )));
            }
            if let Some((pos, e)) = record
                .embeddings
                .iter()
                .enumerate()
                .find(|(_, e)| e.len() != dimension)
            {
                return Err(IndexLoadError::Corrupt(format!(
                    "section '{}' chunk {} has dimension {}, index expects {}",
                    record.name,
                    pos,
                    e.len(),
                    dimension
                )));
            }

            let mut references = record.references.into_iter();
            let chunks = record
                .chunks
                .into_iter()
                .zip(record.embeddings)
                .map(|(text, embedding)| Chunk {
                    text,
                    embedding,
                    reference: references.next().flatten(),
                })
                .collect();

            sections.push(Section {
                name: record.name,
                chunks,
                links: record.links,
            });
        }

        Ok(Self {
            metadata: file.metadata,
            sections,
        })
    }

    /// Section-name-keyed object; underscore-prefixed keys are metadata.
    fn from_legacy(value: serde_json::Value) -> std::result::Result<Self, IndexLoadError> {
        let serde_json::Value::Object(map) = value else {
            return Err(IndexLoadError::Corrupt(
                "expected an object of sections".into(),
            ));
        };

        let model = map
            .get(LEGACY_MODEL_KEY)
            .and_then(|v| v.as_str())
            .map(normalize_legacy_model)
            .unwrap_or_else(|| crate::embeddings::DEFAULT_EMBEDDING_MODEL.to_string());

        let mut records = Vec::new();
        for (name, entry) in map {
            if name.starts_with('_') {
                continue;
            }
            let section: LegacySection = serde_json::from_value(entry)?;
            records.push(SectionRecord {
                name,
                chunks: section.chunks,
                embeddings: section.embeddings,
                references: Vec::new(),
                links: section.links,
            });
        }

        let dimension = records
            .iter()
            .flat_map(|r| r.embeddings.first())
            .map(|e| e.len())
            .next()
            .unwrap_or(0);

        Self::from_file(IndexFile {
            metadata: IndexMetadata {
                provider: Provider::HuggingFace,
                model,
                dimension,
                built_at: None,
                source_digest: None,
            },
            sections: records,
        })
    }

    pub fn with_source_digest(mut self, digest: String) -> Self {
        self.metadata.source_digest = Some(digest);
        self
    }

    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    pub fn dimension(&self) -> usize {
        self.metadata.dimension
    }

    /// Sections in persisted order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> + '_ {
        self.sections.iter()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn chunk_count(&self) -> usize {
        self.sections.iter().map(|s| s.chunks.len()).sum()
    }

    /// True when no section holds a chunk.
    pub fn is_empty(&self) -> bool {
        self.chunk_count() == 0
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            sections: self.sections.len(),
            empty_sections: self.sections.iter().filter(|s| s.is_empty()).count(),
            total_chunks: self.chunk_count(),
            by_section: self
                .sections
                .iter()
                .map(|s| (s.name.clone(), s.chunks.len()))
                .collect(),
        }
    }

    /// Convert back to the canonical on-disk layout.
    pub fn to_file(&self) -> IndexFile {
        IndexFile {
            metadata: self.metadata.clone(),
            sections: self
                .sections
                .iter()
                .map(|s| {
                    let references = if s.chunks.iter().any(|c| c.reference.is_some()) {
                        s.chunks.iter().map(|c| c.reference.clone()).collect()
                    } else {
                        Vec::new()
                    };
                    SectionRecord {
                        name: s.name.clone(),
                        chunks: s.chunks.iter().map(|c| c.text.clone()).collect(),
                        embeddings: s.chunks.iter().map(|c| c.embedding.clone()).collect(),
                        references,
                        links: s.links.clone(),
                    }
                })
                .collect(),
        }
    }

    /// Save in the canonical layout.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.to_file())?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Bare sentence-transformers names ("all-MiniLM-L6-v2") get their hub namespace.
fn normalize_legacy_model(name: &str) -> String {
    if name.contains('/') {
        name.to_string()
    } else {
        format!("sentence-transformers/{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical(sections: serde_json::Value) -> String {
        json!({
            "metadata": { "provider": "huggingface", "model": "m", "dimension": 2 },
            "sections": sections,
        })
        .to_string()
    }

    #[test]
    fn loads_canonical_layout_in_order() {
        let index = ChunkIndex::from_json(&canonical(json!([
            { "name": "Pricing", "chunks": ["a", "b"], "embeddings": [[1.0, 0.0], [0.0, 1.0]] },
            { "name": "About", "chunks": [], "embeddings": [] },
        ])))
        .unwrap();

        let names: Vec<_> = index.sections().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Pricing", "About"]);
        assert_eq!(index.chunk_count(), 2);
        assert_eq!(index.dimension(), 2);
        let pricing = index.section("Pricing").unwrap();
        let embeddings: Vec<_> = pricing.embeddings().collect();
        assert_eq!(embeddings[1], &[0.0, 1.0][..]);
        assert_eq!(pricing.chunks()[0].text, "a");
    }

    #[test]
    fn chunk_embedding_count_mismatch_is_corrupt() {
        let err = ChunkIndex::from_json(&canonical(json!([
            { "name": "Pricing", "chunks": ["a", "b"], "embeddings": [[1.0, 0.0]] },
        ])))
        .unwrap_err();
        assert!(matches!(err, IndexLoadError::Corrupt(_)));
        assert!(err.to_string().contains("2 chunks but 1 embeddings"));
    }

    #[test]
    fn dimension_mismatch_across_sections_is_corrupt() {
        let err = ChunkIndex::from_json(&canonical(json!([
            { "name": "A", "chunks": ["a"], "embeddings": [[1.0, 0.0]] },
            { "name": "B", "chunks": ["b"], "embeddings": [[1.0, 0.0, 0.0]] },
        ])))
        .unwrap_err();
        assert!(matches!(err, IndexLoadError::Corrupt(_)));
    }

    #[test]
    fn zero_dimension_with_embeddings_is_corrupt() {
        let err = ChunkIndex::from_json(
            &json!({
                "metadata": { "provider": "huggingface", "model": "m", "dimension": 0 },
                "sections": [{ "name": "A", "chunks": ["x"], "embeddings": [[]] }],
            })
            .to_string(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexLoadError::Corrupt(_)));
        assert!(err.to_string().contains("dimension 0"));
    }

    #[test]
    fn legacy_empty_embeddings_are_corrupt() {
        let err = ChunkIndex::from_json(r#"{"A": {"chunks": ["x"], "embeddings": [[]]}}"#)
            .unwrap_err();
        assert!(matches!(err, IndexLoadError::Corrupt(_)));
    }

    #[test]
    fn legacy_sections_named_like_canonical_keys() {
        let index = ChunkIndex::from_json(
            r#"{"metadata": {"chunks": ["m"], "embeddings": [[1.0, 0.0]]},
                "sections": {"chunks": ["s"], "embeddings": [[0.0, 1.0]]}}"#,
        )
        .unwrap();
        assert_eq!(index.dimension(), 2);
        assert_eq!(index.section("sections").unwrap().chunks()[0].text, "s");
        assert_eq!(index.section("metadata").unwrap().chunks()[0].text, "m");
    }

    #[test]
    fn duplicate_sections_are_corrupt() {
        let err = ChunkIndex::from_json(&canonical(json!([
            { "name": "A", "chunks": [], "embeddings": [] },
            { "name": "A", "chunks": [], "embeddings": [] },
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn misaligned_references_are_corrupt() {
        let err = ChunkIndex::from_json(&canonical(json!([
            { "name": "A", "chunks": ["a", "b"], "embeddings": [[1.0, 0.0], [1.0, 1.0]],
              "references": ["https://x"] },
        ])))
        .unwrap_err();
        assert!(err.to_string().contains("references"));
    }

    #[test]
    fn missing_required_field_is_parse_error() {
        let err = ChunkIndex::from_json(&canonical(json!([{ "name": "A", "chunks": [] }])))
            .unwrap_err();
        assert!(matches!(err, IndexLoadError::Parse(_)));
    }

    #[test]
    fn legacy_layout_strips_metadata_keys() {
        let index = ChunkIndex::from_json(
            &json!({
                "Homepage": { "chunks": ["hello"], "embeddings": [[0.5, 0.5, 0.1]],
                              "links": { "/plans": "https://example.com/plans" } },
                "_embedding_model": "all-MiniLM-L6-v2",
                "_scraped_at": "yesterday",
            })
            .to_string(),
        )
        .unwrap();

        assert_eq!(index.sections().count(), 1);
        assert_eq!(index.dimension(), 3);
        assert_eq!(
            index.metadata().model,
            "sentence-transformers/all-MiniLM-L6-v2"
        );
        assert_eq!(
            index.section("Homepage").unwrap().links()["/plans"],
            "https://example.com/plans"
        );
    }

    #[test]
    fn empty_object_is_an_empty_index() {
        let index = ChunkIndex::from_json("{}").unwrap();
        assert!(index.is_empty());
        assert_eq!(index.sections().count(), 0);
    }

    #[test]
    fn non_object_is_corrupt() {
        assert!(matches!(
            ChunkIndex::from_json("[1, 2]").unwrap_err(),
            IndexLoadError::Corrupt(_)
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ChunkIndex::load(Path::new("/nonexistent/kbchat/index.json")).unwrap_err();
        assert!(matches!(err, IndexLoadError::Io { .. }));
    }

    #[test]
    fn save_then_load_preserves_references() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("index.json");
        let index = ChunkIndex::from_json(&canonical(json!([
            { "name": "A", "chunks": ["a"], "embeddings": [[1.0, 0.0]],
              "references": ["https://example.com/a"] },
        ])))
        .unwrap()
        .with_source_digest("ab12".into());

        index.save(&path).unwrap();
        let loaded = ChunkIndex::load(&path).unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.metadata().source_digest.as_deref(), Some("ab12"));
        assert_eq!(
            loaded.section("A").unwrap().chunks()[0].reference.as_deref(),
            Some("https://example.com/a")
        );
    }

    #[test]
    fn stats_count_empty_sections() {
        let index = ChunkIndex::from_json(&canonical(json!([
            { "name": "A", "chunks": ["a"], "embeddings": [[1.0, 0.0]] },
            { "name": "B", "chunks": [], "embeddings": [] },
        ])))
        .unwrap();
        let stats = index.stats();
        assert_eq!(stats.sections, 2);
        assert_eq!(stats.empty_sections, 1);
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.by_section[0], ("A".to_string(), 1));
    }
}
