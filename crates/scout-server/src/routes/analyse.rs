use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use scout::analyst::Analyst;
use scout::providers::openai::OpenAiProvider;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct AnalyseRequest {
    text: String,
}

/// First `X-Forwarded-For` hop, else the peer address
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn handler(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let client_ip = client_ip(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    let Some(provider_config) = state.provider_config.clone() else {
        tracing::error!(client_ip = %client_ip, "No API key configured");
        return (StatusCode::INTERNAL_SERVER_ERROR, "API key error").into_response();
    };

    let request: AnalyseRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(client_ip = %client_ip, error = %e, "Invalid request body");
            return (StatusCode::BAD_REQUEST, "Invalid JSON format").into_response();
        }
    };

    let provider = match OpenAiProvider::new(provider_config) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::error!(error = %e, "Failed to create provider");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };
    let analyst = Analyst::new(
        Box::new(provider),
        Arc::clone(&state.researcher),
        state.analysis.clone(),
    );

    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("analysis", %request_id, client_ip = %client_ip);
    let body = async {
        tracing::info!(target: "scout::usage", text = %request.text, "Received text");
        analyst.analyse_to_body(&request.text).await
    }
    .instrument(span)
    .await;

    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

pub fn routes(state: AppState) -> Router {
    Router::new().route("/", post(handler)).with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request};
    use http_body_util::BodyExt;
    use scout::analyst::AnalysisConfig;
    use scout::providers::configs::OpenAiProviderConfig;
    use scout::tools::Researcher;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct NoEvidence;

    #[async_trait]
    impl Researcher for NoEvidence {
        async fn research(&self, _query: &str) -> String {
            String::new()
        }
    }

    fn state(provider_config: Option<OpenAiProviderConfig>) -> AppState {
        AppState {
            provider_config,
            researcher: Arc::new(NoEvidence),
            analysis: AnalysisConfig::default(),
        }
    }

    fn config_for(server: &MockServer) -> Option<OpenAiProviderConfig> {
        Some(OpenAiProviderConfig {
            host: server.uri(),
            ..OpenAiProviderConfig::new("test-key")
        })
    }

    fn post_root(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("X-Forwarded-For", "10.0.0.7, 172.16.0.1")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_client_ip() {
        let mut headers = HeaderMap::new();
        let peer: SocketAddr = "192.168.1.5:5000".parse().unwrap();
        assert_eq!(client_ip(&headers, Some(peer)), "192.168.1.5");
        assert_eq!(client_ip(&headers, None), "unknown");

        headers.insert("x-forwarded-for", "10.0.0.7, 172.16.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, Some(peer)), "10.0.0.7");
    }

    #[tokio::test]
    async fn test_other_methods_are_rejected() {
        let response = routes(state(None))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let response = routes(state(None))
            .oneshot(post_root(r#"{"text":"zdravo"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read_body(response).await, "API key error");
    }

    #[tokio::test]
    async fn test_invalid_json() {
        let server = MockServer::start().await;
        for body in ["not json", r#"{"prompt":"zdravo"}"#, r#"{"text":5}"#] {
            let response = routes(state(config_for(&server)))
                .oneshot(post_root(body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(read_body(response).await, "Invalid JSON format");
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_successful_analysis() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{
                    "index": 0,
                    "message": {
                        "role": "assistant",
                        "content": "{\"longresponse\":\"<b>4</b>\",\"shortresponse\":\"4\",\"title\":\"Zbir\"}"
                    },
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
            })))
            .expect(2)
            .mount(&server)
            .await;

        let response = routes(state(config_for(&server)))
            .oneshot(post_root(r#"{"text":"Koliko je 2 + 2?"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        let body: Value = serde_json::from_str(&read_body(response).await).unwrap();
        assert_eq!(
            body,
            json!({
                "content": {"longresponse": "<b>4</b>", "shortresponse": "4", "title": "Zbir"},
                "internet_search": false
            })
        );
    }

    #[tokio::test]
    async fn test_analysis_error_is_returned_as_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let response = routes(state(config_for(&server)))
            .oneshot(post_root(r#"{"text":"zdravo"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            read_body(response).await,
            "An error occurred: Server error: 500 Internal Server Error"
        );
    }
}
