use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::conversation::Conversation;
use crate::errors::{AnalysisError, AnalysisOutcome};
use crate::models::answer::{AnalysisResult, StructuredAnswer};
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::prompt_template::{system_prompt, user_prompt};
use crate::providers::base::{Provider, Usage};
use crate::tools::{Researcher, ToolInvoker};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub max_attempts: usize,
    /// Pause before retrying after an empty or incomplete answer
    pub retry_delay_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
        }
    }
}

/// Drives one prompt through the completion service until it yields a usable answer.
///
/// Each attempt is a round of two calls: the first may request web searches, whose
/// results are appended to the conversation before the second call produces the answer.
/// Only empty or incomplete answers are retried; every other failure ends the analysis.
pub struct Analyst {
    provider: Box<dyn Provider>,
    invoker: ToolInvoker,
    config: AnalysisConfig,
}

impl Analyst {
    pub fn new(
        provider: Box<dyn Provider>,
        researcher: Arc<dyn Researcher>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            provider,
            invoker: ToolInvoker::new(researcher),
            config,
        }
    }

    pub async fn analyse(&self, prompt: &str) -> AnalysisOutcome<AnalysisResult> {
        let started = Instant::now();
        let system = system_prompt(Local::now().date_naive())?;
        let tools = self.invoker.tools();
        let response_format = StructuredAnswer::response_format();

        tracing::info!(prompt_length = prompt.len(), "Starting analysis");

        let mut conversation =
            Conversation::new(system, Message::user().with_text(user_prompt(prompt)));
        let mut answer = StructuredAnswer::default();
        let mut search_used = false;
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let will_retry = attempt < max_attempts;

            let (reply, usage) = self
                .complete(&conversation, &tools, &response_format, attempt)
                .await
                .map_err(|e| {
                    tracing::error!(attempt, error = %e, "First completion call failed");
                    AnalysisError::Completion(e)
                })?;
            log_usage("first", attempt, &usage);

            tracing::info!(
                attempt,
                has_tool_calls = reply.has_tool_requests(),
                "Processing tool calls"
            );
            let invocation = self.invoker.invoke(&reply).await?;
            search_used |= invocation.searched;
            conversation = conversation
                .with_message(reply)
                .with_messages(invocation.response);

            let (reply, usage) = self
                .complete(&conversation, &tools, &response_format, attempt)
                .await
                .map_err(|e| {
                    tracing::error!(attempt, error = %e, "Second completion call failed");
                    AnalysisError::Reprocessing(e)
                })?;
            log_usage("second", attempt, &usage);

            let content = reply.text();
            if content.is_empty() {
                tracing::warn!(attempt, will_retry, "Received empty response");
                self.pause(will_retry).await;
                continue;
            }

            answer = StructuredAnswer::parse(&content).map_err(|source| {
                tracing::error!(attempt, error = %source, response_content = %content, "Failed to parse answer");
                AnalysisError::ResponseParse {
                    source,
                    content: content.clone(),
                }
            })?;

            tracing::info!(
                attempt,
                has_long_response = !answer.long_response.is_empty(),
                has_short_response = !answer.short_response.is_empty(),
                has_title = !answer.title.is_empty(),
                "Response parsed"
            );
            if answer.is_complete() {
                break;
            }

            tracing::warn!(attempt, will_retry, "Received incomplete response");
            self.pause(will_retry).await;
        }

        tracing::info!(
            internet_search = search_used,
            complete = answer.is_complete(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Analysis completed"
        );
        Ok(AnalysisResult {
            content: answer,
            internet_search: search_used,
        })
    }

    /// Analyse and render the outcome as the response body: the result JSON on success,
    /// the error text otherwise.
    pub async fn analyse_to_body(&self, prompt: &str) -> String {
        let body = self
            .analyse(prompt)
            .await
            .and_then(|result| serde_json::to_string(&result).map_err(AnalysisError::Serialize))
            .unwrap_or_else(|e| e.to_string());

        tracing::info!(target: "scout::usage", prompt, response = %body, "Analysis served");
        body
    }

    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[Tool],
        response_format: &Value,
        attempt: usize,
    ) -> anyhow::Result<(Message, Usage)> {
        tracing::info!(
            attempt,
            max_attempts = self.config.max_attempts,
            message_count = conversation.len(),
            "Calling completion service"
        );
        self.provider
            .complete(
                conversation.system(),
                conversation.messages(),
                tools,
                Some(response_format),
            )
            .await
    }

    async fn pause(&self, will_retry: bool) {
        if will_retry {
            tokio::time::sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
        }
    }
}

fn log_usage(call: &str, attempt: usize, usage: &Usage) {
    tracing::info!(
        call,
        attempt,
        prompt_tokens = usage.input_tokens,
        completion_tokens = usage.output_tokens,
        total_tokens = usage.total_tokens,
        "Completion call finished"
    );
}
