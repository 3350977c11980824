pub mod client;
pub mod prompts;

pub use client::{GenerationParams, GenerationService, LlmClient, RetryPolicy};
