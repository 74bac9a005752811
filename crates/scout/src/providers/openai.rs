use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::{Duration, Instant};

use super::base::{Provider, Usage};
use super::configs::OpenAiProviderConfig;
use super::utils::{
    check_openai_context_length_error, messages_to_openai_spec, openai_finish_reason,
    openai_response_to_message, tools_to_openai_spec,
};
use crate::models::message::Message;
use crate::models::tool::Tool;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn get_usage(data: &Value) -> Result<Usage> {
        let usage = data
            .get("usage")
            .ok_or_else(|| anyhow!("No usage data in response"))?;

        let input_tokens = usage
            .get("prompt_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let output_tokens = usage
            .get("completion_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32);

        let total_tokens = usage
            .get("total_tokens")
            .and_then(|v| v.as_i64())
            .map(|v| v as i32)
            .or_else(|| match (input_tokens, output_tokens) {
                (Some(input), Some(output)) => Some(input + output),
                _ => None,
            });

        Ok(Usage::new(input_tokens, output_tokens, total_tokens))
    }

    async fn post(&self, payload: Value) -> Result<Value> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json().await?),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}", status)),
        }
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        response_format: Option<&Value>,
    ) -> Result<(Message, Usage)> {
        let started = Instant::now();
        let system_message = json!({
            "role": "system",
            "content": system
        });

        let messages_spec = messages_to_openai_spec(messages);
        let tools_spec = if !tools.is_empty() {
            tools_to_openai_spec(tools)?
        } else {
            vec![]
        };

        // create messages array with system message first
        let mut messages_array = vec![system_message];
        messages_array.extend(messages_spec);
        let message_count = messages_array.len();

        let mut payload = json!({
            "model": self.config.model,
            "messages": messages_array
        });

        if !tools_spec.is_empty() {
            payload["tools"] = json!(tools_spec);
        }
        if let Some(format) = response_format {
            payload["response_format"] = format.clone();
        }
        if let Some(temp) = self.config.temperature {
            payload["temperature"] = json!(temp);
        }
        if let Some(tokens) = self.config.max_tokens {
            payload["max_tokens"] = json!(tokens);
        }

        tracing::info!(
            model = %self.config.model,
            message_count,
            has_tools = !tools.is_empty(),
            has_response_format = response_format.is_some(),
            "Starting completion request"
        );

        let response = match self.post(payload).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    model = %self.config.model,
                    message_count,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Completion request failed"
                );
                return Err(e);
            }
        };

        // Raise specific error if context length is exceeded
        if let Some(error) = response.get("error") {
            if let Some(err) = check_openai_context_length_error(error) {
                return Err(err.into());
            }
            return Err(anyhow!("OpenAI API error: {}", error));
        }

        let finish_reason = openai_finish_reason(&response).unwrap_or_default().to_string();
        let message = openai_response_to_message(response.clone())?;
        let usage = Self::get_usage(&response)?;

        tracing::info!(
            duration_ms = started.elapsed().as_millis() as u64,
            prompt_tokens = usage.input_tokens,
            completion_tokens = usage.output_tokens,
            total_tokens = usage.total_tokens,
            finish_reason = %finish_reason,
            has_tool_calls = message.has_tool_requests(),
            response_length = message.text().len(),
            "Completion request successful"
        );

        Ok((message, usage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::answer::StructuredAnswer;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn _setup_mock_server(response: ResponseTemplate) -> (MockServer, OpenAiProvider) {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_api_key"))
            .respond_with(response)
            .mount(&mock_server)
            .await;

        // Create the OpenAiProvider with the mock server's URL as the host
        let config = OpenAiProviderConfig {
            host: mock_server.uri(),
            api_key: "test_api_key".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: Some(0.7),
            max_tokens: None,
        };

        let provider = OpenAiProvider::new(config).unwrap();
        (mock_server, provider)
    }

    #[tokio::test]
    async fn test_complete_basic() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "{\"longresponse\":\"Zdravo\",\"shortresponse\":\"Zdravo\",\"title\":\"Pozdrav\"}",
                    "tool_calls": null
                },
                "finish_reason": "stop"
            }],
            "usage": {
                "prompt_tokens": 12,
                "completion_tokens": 15,
                "total_tokens": 27
            }
        });

        let (_, provider) =
            _setup_mock_server(ResponseTemplate::new(200).set_body_json(response_body)).await;

        let messages = vec![Message::user().with_text("User prompt: zdravo")];
        let format = StructuredAnswer::response_format();

        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[], Some(&format))
            .await?;

        let answer = StructuredAnswer::parse(&message.text())?;
        assert_eq!(answer.title, "Pozdrav");
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.output_tokens, Some(15));
        assert_eq!(usage.total_tokens, Some(27));

        Ok(())
    }

    #[tokio::test]
    async fn test_request_carries_schema_and_tools() -> Result<()> {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "response_format": {"type": "json_schema"},
                "tools": [{"type": "function", "function": {"name": "search_web"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "ok"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1}
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let mut config = OpenAiProviderConfig::new("test_api_key");
        config.host = mock_server.uri();
        let provider = OpenAiProvider::new(config)?;

        let tool = Tool::new(
            "search_web",
            "Search the web",
            json!({"type": "object", "properties": {"query": {"type": "string"}}, "required": ["query"]}),
        );
        let format = StructuredAnswer::response_format();
        let (message, usage) = provider
            .complete("system", &[Message::user().with_text("hi")], &[tool], Some(&format))
            .await?;

        assert_eq!(message.text(), "ok");
        // total is derived when the service omits it
        assert_eq!(usage.total_tokens, Some(2));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_tool_request() -> Result<()> {
        let response_body = json!({
            "id": "chatcmpl-tool",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_123",
                        "type": "function",
                        "function": {
                            "name": "search_web",
                            "arguments": "{\"query\":\"ko je predsjednik\"}"
                        }
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {
                "prompt_tokens": 20,
                "completion_tokens": 15,
                "total_tokens": 35
            }
        });

        let (_, provider) =
            _setup_mock_server(ResponseTemplate::new(200).set_body_json(response_body)).await;

        let messages = vec![Message::user().with_text("Ko je predsjednik?")];
        let (message, usage) = provider
            .complete("You are a helpful assistant.", &messages, &[], None)
            .await?;

        let request = message.tool_requests().next().expect("tool request");
        assert_eq!(request.id, "call_123");
        assert_eq!(request.tool_call.name, "search_web");
        assert_eq!(request.tool_call.arguments, "{\"query\":\"ko je predsjednik\"}");
        assert_eq!(message.text(), "");
        assert_eq!(usage.total_tokens, Some(35));

        Ok(())
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let (_, provider) = _setup_mock_server(ResponseTemplate::new(503)).await;

        let result = provider
            .complete("system", &[Message::user().with_text("hi")], &[], None)
            .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("Server error: 503"));
    }

    #[tokio::test]
    async fn test_api_error_body_is_reported() {
        let (_, provider) = _setup_mock_server(ResponseTemplate::new(200).set_body_json(json!({
            "error": {"code": "context_length_exceeded", "message": "too long"}
        })))
        .await;

        let err = provider
            .complete("system", &[Message::user().with_text("hi")], &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Context length exceeded. Message: too long");
    }
}
