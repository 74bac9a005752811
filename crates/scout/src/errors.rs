use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Terminal failures of one analysis.
///
/// The `Display` text of each variant is what callers of the front door receive as the
/// response body, so the wording is part of the contract.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("An error occurred: {0}")]
    Completion(#[source] anyhow::Error),

    #[error("An error occurred during reprocessing: {0}")]
    Reprocessing(#[source] anyhow::Error),

    #[error("error parsing tool call arguments: {0}")]
    Arguments(AgentError),

    #[error("An error occurred during JSON Unmarshalling: {source} Message content: {content}")]
    ResponseParse {
        #[source]
        source: serde_json::Error,
        content: String,
    },

    #[error("An error occurred during JSON Marshalling: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("An error occurred while preparing the prompt: {0}")]
    Prompt(#[from] tera::Error),
}

pub type AnalysisOutcome<T> = Result<T, AnalysisError>;
