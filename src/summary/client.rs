//! HTTP clients for the AI service.

use super::prompt::{
    render_advice_prompt, render_summary_prompt, ADVICE_SYSTEM_PROMPT, SUMMARY_SYSTEM_PROMPT,
};
use super::{
    AdviceRequest, AdviceResponse, SummaryError, SummaryRequest, SummaryResponse, SummaryService,
};
use crate::config::{AiBackend, ModelConfig};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const SUMMARY_FLOW: &str = "summarizeSurveyResponses";
const ADVICE_FLOW: &str = "analyzeUsageAndAdvise";

/// Build the client selected by `[model] backend`.
pub fn from_config(config: &ModelConfig) -> Result<Arc<dyn SummaryService>, SummaryError> {
    info!(
        "Using {:?} AI backend at {}",
        config.backend, config.service_url
    );
    Ok(match config.backend {
        AiBackend::Flow => Arc::new(FlowClient::new(config)?),
        AiBackend::Ollama => Arc::new(OllamaClient::new(config)?),
    })
}

fn build_http_client(timeout_seconds: u64) -> Result<reqwest::Client, SummaryError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()
        .map_err(|e| SummaryError::Request(format!("failed to create HTTP client: {}", e)))
}

fn map_send_error(e: reqwest::Error, base_url: &str, timeout_seconds: u64) -> SummaryError {
    if e.is_timeout() {
        SummaryError::Timeout(timeout_seconds)
    } else if e.is_connect() {
        SummaryError::Connect(base_url.to_string())
    } else {
        SummaryError::Request(e.to_string())
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SummaryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(SummaryError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = response
        .text()
        .await
        .map_err(|e| SummaryError::Request(e.to_string()))?;
    serde_json::from_str(&body).map_err(|e| SummaryError::Malformed(e.to_string()))
}

/// Client for flow endpoints that take the request shapes as JSON bodies.
pub struct FlowClient {
    base_url: String,
    timeout_seconds: u64,
    http_client: reqwest::Client,
}

impl FlowClient {
    pub fn new(config: &ModelConfig) -> Result<Self, SummaryError> {
        Ok(Self {
            base_url: config.service_url.trim_end_matches('/').to_string(),
            timeout_seconds: config.timeout_seconds,
            http_client: build_http_client(config.timeout_seconds)?,
        })
    }

    async fn call<Req, Resp>(&self, flow: &str, body: &Req) -> Result<Resp, SummaryError>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, flow);
        debug!("POST {}", url);

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.base_url, self.timeout_seconds))?;

        read_json(response).await
    }
}

#[async_trait]
impl SummaryService for FlowClient {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummaryError> {
        self.call(SUMMARY_FLOW, request).await
    }

    async fn advise(&self, request: &AdviceRequest) -> Result<AdviceResponse, SummaryError> {
        self.call(ADVICE_FLOW, request).await
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// Ollama chat API request.
#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    format: &'a str,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama chat API response.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Client for an Ollama server; prompts are rendered locally and the
/// model is asked for JSON output.
pub struct OllamaClient {
    config: ModelConfig,
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaClient {
    pub fn new(config: &ModelConfig) -> Result<Self, SummaryError> {
        Ok(Self {
            config: config.clone(),
            base_url: config.service_url.trim_end_matches('/').to_string(),
            http_client: build_http_client(config.timeout_seconds)?,
        })
    }

    async fn chat_json<T: DeserializeOwned>(&self, system: &str, prompt: &str) -> Result<T, SummaryError> {
        let url = format!("{}/api/chat", self.base_url);

        let request = OllamaChatRequest {
            model: &self.config.name,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: self.config.temperature,
            },
        };

        debug!("Sending {} byte prompt to {}", prompt.len(), self.config.name);

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| map_send_error(e, &self.base_url, self.config.timeout_seconds))?;

        let chat: OllamaChatResponse = read_json(response).await?;
        serde_json::from_str(chat.message.content.trim())
            .map_err(|e| SummaryError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl SummaryService for OllamaClient {
    async fn summarize(&self, request: &SummaryRequest) -> Result<SummaryResponse, SummaryError> {
        self.chat_json(SUMMARY_SYSTEM_PROMPT, &render_summary_prompt(request))
            .await
    }

    async fn advise(&self, request: &AdviceRequest) -> Result<AdviceResponse, SummaryError> {
        self.chat_json(ADVICE_SYSTEM_PROMPT, &render_advice_prompt(request))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use warp::http::StatusCode;
    use warp::Filter;

    fn model_config(backend: AiBackend, url: String) -> ModelConfig {
        ModelConfig {
            backend,
            service_url: url,
            timeout_seconds: 5,
            ..ModelConfig::default()
        }
    }

    fn summary_request() -> SummaryRequest {
        SummaryRequest {
            survey_questions: "[\"Age\"]".to_string(),
            survey_responses: "[{\"Age\":\"21-23\"}]".to_string(),
        }
    }

    async fn spawn<F>(routes: F) -> String
    where
        F: Filter<Error = warp::Rejection> + Clone + Send + Sync + 'static,
        F::Extract: warp::Reply,
    {
        let (addr, server) = warp::serve(routes).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_flow_client_posts_request_body() {
        let route = warp::post()
            .and(warp::path(SUMMARY_FLOW))
            .and(warp::body::json())
            .map(|body: Value| {
                warp::reply::json(&json!({
                    "summary": format!("saw {}", body["surveyResponses"].as_str().unwrap_or(""))
                }))
            });
        let url = spawn(route).await;

        let client = FlowClient::new(&model_config(AiBackend::Flow, format!("{}/", url))).unwrap();
        let response = client.summarize(&summary_request()).await.unwrap();
        assert_eq!(response.summary, "saw [{\"Age\":\"21-23\"}]");
    }

    #[tokio::test]
    async fn test_flow_client_advice_shape() {
        let route = warp::post().and(warp::path(ADVICE_FLOW)).map(|| {
            warp::reply::json(&json!({
                "summary": "Heavy evening use.",
                "advice": {"english": "- Sleep first", "sinhala": "- පළමුව නිදාගන්න"}
            }))
        });
        let url = spawn(route).await;

        let client = FlowClient::new(&model_config(AiBackend::Flow, url)).unwrap();
        let request = AdviceRequest {
            usage_data: "[]".to_string(),
            questions: "[]".to_string(),
        };
        let response = client.advise(&request).await.unwrap();
        assert_eq!(response.summary, "Heavy evening use.");
        assert_eq!(response.advice.english, "- Sleep first");
    }

    #[tokio::test]
    async fn test_flow_client_maps_error_status() {
        let route = warp::post()
            .map(|| warp::reply::with_status("model overloaded", StatusCode::SERVICE_UNAVAILABLE));
        let url = spawn(route).await;

        let client = FlowClient::new(&model_config(AiBackend::Flow, url)).unwrap();
        match client.summarize(&summary_request()).await {
            Err(SummaryError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "model overloaded");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_flow_client_rejects_schema_mismatch() {
        let route = warp::post().map(|| warp::reply::json(&json!({"text": "no summary field"})));
        let url = spawn(route).await;

        let client = FlowClient::new(&model_config(AiBackend::Flow, url)).unwrap();
        let err = client.summarize(&summary_request()).await.unwrap_err();
        assert!(matches!(err, SummaryError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_ollama_client_parses_json_content() {
        let route = warp::post()
            .and(warp::path!("api" / "chat"))
            .and(warp::body::json())
            .map(|body: Value| {
                let content = json!({"summary": format!("model {}", body["model"].as_str().unwrap_or(""))});
                warp::reply::json(&json!({
                    "message": {"role": "assistant", "content": content.to_string()},
                    "done": true
                }))
            });
        let url = spawn(route).await;

        let config = ModelConfig {
            name: "tiny".to_string(),
            ..model_config(AiBackend::Ollama, url)
        };
        let client = OllamaClient::new(&config).unwrap();
        let response = client.summarize(&summary_request()).await.unwrap();
        assert_eq!(response.summary, "model tiny");
    }

    #[tokio::test]
    async fn test_ollama_client_rejects_non_json_content() {
        let route = warp::post().map(|| {
            warp::reply::json(&json!({
                "message": {"role": "assistant", "content": "Here is your summary!"},
                "done": true
            }))
        });
        let url = spawn(route).await;

        let client = OllamaClient::new(&model_config(AiBackend::Ollama, url)).unwrap();
        let err = client.summarize(&summary_request()).await.unwrap_err();
        assert!(matches!(err, SummaryError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_unreachable_service_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            FlowClient::new(&model_config(AiBackend::Flow, format!("http://{}", addr))).unwrap();
        assert!(client.summarize(&summary_request()).await.is_err());
    }
}
