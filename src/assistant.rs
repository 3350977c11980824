//! Query answering: retrieve one chunk, prompt the model, record the exchange.

use crate::embeddings::Embedder;
use crate::error::Result;
use crate::history::{History, Role};
use crate::index::ChunkIndex;
use crate::llm::prompts::{answer_prompt, error_response, NO_MATCH_RESPONSE};
use crate::llm::{GenerationParams, GenerationService};
use crate::retrieval::{retrieve, RetrievalPolicy, ScoredCandidate, Selection};

/// Result of a successful pass through the pipeline.
#[derive(Debug, Clone)]
pub enum Answer<'a> {
    Generated {
        text: String,
        source: ScoredCandidate<'a>,
    },
    NoMatch,
}

impl Answer<'_> {
    pub fn text(&self) -> &str {
        match self {
            Answer::Generated { text, .. } => text,
            Answer::NoMatch => NO_MATCH_RESPONSE,
        }
    }
}

pub struct Assistant {
    embedder: Box<dyn Embedder>,
    generator: Box<dyn GenerationService>,
    policy: RetrievalPolicy,
    params: GenerationParams,
}

impl Assistant {
    pub fn new(embedder: Box<dyn Embedder>, generator: Box<dyn GenerationService>) -> Self {
        Self {
            embedder,
            generator,
            policy: RetrievalPolicy::default(),
            params: GenerationParams::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetrievalPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn policy(&self) -> &RetrievalPolicy {
        &self.policy
    }

    /// Retrieve context and generate an answer, surfacing any failure.
    ///
    /// The generation service is only contacted when a chunk was selected.
    pub async fn answer<'a>(&self, query: &str, index: &'a ChunkIndex) -> Result<Answer<'a>> {
        let selection = retrieve(self.embedder.as_ref(), index, query, &self.policy).await?;

        let source = match selection {
            Selection::Match(candidate) => candidate,
            Selection::NoMatch => return Ok(Answer::NoMatch),
        };

        let prompt = answer_prompt(&source.chunk.text, query);
        let text = self.generator.generate(&prompt, &self.params).await?;

        Ok(Answer::Generated {
            text: text.trim().to_string(),
            source,
        })
    }

    /// Always answers with text. A generated answer is recorded in `history`
    /// as a user turn followed by an assistant turn; apologies and errors are
    /// not recorded.
    pub async fn respond(&self, query: &str, index: &ChunkIndex, history: &mut History) -> String {
        match self.answer(query, index).await {
            Ok(Answer::Generated { text, source }) => {
                tracing::debug!(
                    section = source.section,
                    score = source.score,
                    "answered from context"
                );
                history.push(Role::User, query);
                history.push(Role::Assistant, text.clone());
                text
            }
            Ok(Answer::NoMatch) => NO_MATCH_RESPONSE.to_string(),
            Err(err) => {
                tracing::warn!(error = %err, "query failed");
                error_response(&err.to_string())
            }
        }
    }
}
