/// Returned when no chunk clears the similarity threshold.
pub const NO_MATCH_RESPONSE: &str =
    "Apologies, I couldn't locate relevant information. Could you rephrase or elaborate?";

/// Prefix for failures converted into user-facing text.
pub const ERROR_PREFIX: &str = "Error in generating response";

pub fn answer_prompt(context: &str, query: &str) -> String {
    format!(
        r#"You are an intelligent assistant. Use the given context to answer the query accurately and succinctly. If the context is inadequate, mention this.

Context: {}

Query: {}

Response:"#,
        context.trim(),
        query.trim()
    )
}

pub fn error_response(description: &str) -> String {
    format!("{}: {}", ERROR_PREFIX, description)
}
