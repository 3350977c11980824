// Library interface for kbchat
pub mod assistant;
pub mod cli;
pub mod commands;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod history;
pub mod index;
pub mod llm;
pub mod providers;
pub mod retrieval;

// Re-export commonly used types
pub use assistant::{Answer, Assistant};
pub use config::Config;
pub use error::{ChatError, GenerationError, IndexLoadError, Result};
pub use history::{History, Role, Turn};
pub use index::ChunkIndex;
