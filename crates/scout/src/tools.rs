use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::errors::{AgentError, AgentResult, AnalysisError};
use crate::harvest::{EvidenceHarvester, HarvestConfig};
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolCall};
use crate::search::{SearchConfig, SearchSelector};
use crate::token_counter::TokenMeter;

pub const SEARCH_TOOL_NAME: &str = "search_web";

/// The function definition offered to the completion service
pub fn search_tool() -> Tool {
    Tool::new(
        SEARCH_TOOL_NAME,
        "Search the web for additional information",
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "additionalProperties": false
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchArgs {
    pub query: String,
}

/// Every tool the model may call, with its decoded arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebTool {
    Search(SearchArgs),
}

impl WebTool {
    /// Resolve a raw call into a typed tool. Decoding fails closed: anything other than an
    /// object with a string `query` is rejected.
    pub fn decode(call: &ToolCall) -> AgentResult<Self> {
        match call.name.as_str() {
            SEARCH_TOOL_NAME => serde_json::from_str::<SearchArgs>(&call.arguments)
                .map(WebTool::Search)
                .map_err(|e| AgentError::InvalidParameters(e.to_string())),
            _ => Err(AgentError::ToolNotFound(call.name.clone())),
        }
    }
}

/// Turns a search query into evidence text
#[async_trait]
pub trait Researcher: Send + Sync {
    async fn research(&self, query: &str) -> String;
}

/// Search plus concurrent harvest of the result pages
pub struct WebResearcher {
    selector: SearchSelector,
    harvester: EvidenceHarvester,
}

impl WebResearcher {
    pub fn new(
        client: Client,
        search: SearchConfig,
        harvest: HarvestConfig,
        meter: Arc<dyn TokenMeter>,
    ) -> Result<Self> {
        Ok(Self {
            selector: SearchSelector::new(client.clone(), search)?,
            harvester: EvidenceHarvester::new(client, meter, harvest),
        })
    }
}

#[async_trait]
impl Researcher for WebResearcher {
    async fn research(&self, query: &str) -> String {
        let candidates = match self.selector.select(query, self.selector.max_results()).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(query, error = %e, "Search failed, continuing without evidence");
                return String::new();
            }
        };
        self.harvester.harvest(&candidates).await.text
    }
}

/// Tool responses for one assistant message
#[derive(Debug, Default)]
pub struct Invocation {
    /// `None` when the message requested no tools
    pub response: Option<Message>,
    /// Whether a web search ran
    pub searched: bool,
}

/// Executes the tool requests found in an assistant message
pub struct ToolInvoker {
    researcher: Arc<dyn Researcher>,
}

impl ToolInvoker {
    pub fn new(researcher: Arc<dyn Researcher>) -> Self {
        Self { researcher }
    }

    pub fn tools(&self) -> Vec<Tool> {
        vec![search_tool()]
    }

    /// Run every tool request in `message`.
    ///
    /// All requests are decoded before any runs, so malformed arguments abort the analysis
    /// without touching the network. Unknown tool names are answered with an error result.
    pub async fn invoke(&self, message: &Message) -> Result<Invocation, AnalysisError> {
        let mut decoded = Vec::new();
        for request in message.tool_requests() {
            match WebTool::decode(&request.tool_call) {
                Ok(tool) => decoded.push((request.id.clone(), Ok(tool))),
                Err(AgentError::ToolNotFound(name)) => {
                    tracing::warn!(tool_id = %request.id, tool = %name, "Unknown tool requested");
                    decoded.push((request.id.clone(), Err(AgentError::ToolNotFound(name))));
                }
                Err(e) => {
                    tracing::error!(tool_id = %request.id, error = %e, "Invalid tool call arguments");
                    return Err(AnalysisError::Arguments(e));
                }
            }
        }
        if decoded.is_empty() {
            return Ok(Invocation::default());
        }

        let mut invocation = Invocation::default();
        let mut response = Message::user();
        for (id, tool) in decoded {
            let result = match tool {
                Ok(WebTool::Search(args)) => {
                    tracing::info!(tool_id = %id, query = %args.query, "Running web search");
                    let evidence = self.researcher.research(&args.query).await;
                    tracing::info!(tool_id = %id, result_length = evidence.len(), "Web search finished");
                    invocation.searched = true;
                    Ok(evidence)
                }
                Err(e) => Err(e),
            };
            response = response.with_tool_response(id, result);
        }
        invocation.response = Some(response);
        Ok(invocation)
    }
}
