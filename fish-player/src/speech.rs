//! Speech synthesis collaborator
//!
//! Text goes out as `{"text": "..."}` JSON, WAV bytes come back.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Request timeout for the synthesis service
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns text into WAV audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

/// HTTP client for a Piper TTS server
#[derive(Debug, Clone)]
pub struct PiperClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl PiperClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(SYNTHESIS_TIMEOUT)
            .build()
            .map_err(|e| Error::Synthesis(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SpeechSynthesizer for PiperClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        debug!(url = %self.base_url, chars = text.chars().count(), "Requesting speech synthesis");

        let response = self
            .http_client
            .post(&self.base_url)
            .json(&SynthesizeRequest { text })
            .send()
            .await
            .map_err(|e| Error::Synthesis(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "Server returned {}: {}",
                status.as_u16(),
                error_text
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(format!("Failed to read response: {}", e)))?;

        debug!(bytes = body.len(), "Speech synthesized");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Seen {
        requests: Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>,
    }

    async fn synth(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Json(body): Json<serde_json::Value>,
    ) -> Vec<u8> {
        let content_type = headers
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        seen.requests.lock().unwrap().push((content_type, body));
        b"mock-audio-data".to_vec()
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_synthesize_posts_json() {
        let seen = Seen::default();
        let url = serve(Router::new().route("/", post(synth)).with_state(seen.clone())).await;

        let client = PiperClient::new(url).unwrap();
        let audio = client.synthesize("Hello Fish").await.unwrap();

        assert_eq!(audio, b"mock-audio-data");
        let requests = seen.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].0.as_deref(), Some("application/json"));
        assert_eq!(requests[0].1, serde_json::json!({ "text": "Hello Fish" }));
    }

    #[tokio::test]
    async fn test_error_status_is_synthesis_error() {
        let router = Router::new().route(
            "/",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "voice missing") }),
        );
        let url = serve(router).await;

        let result = PiperClient::new(url).unwrap().synthesize("Hallo").await;
        match result {
            Err(Error::Synthesis(message)) => {
                assert!(message.contains("500"));
                assert!(message.contains("voice missing"));
            }
            other => panic!("expected synthesis error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        // Port 9 (discard) on localhost is almost never served
        let client = PiperClient::new("http://127.0.0.1:9/").unwrap();
        assert!(matches!(
            client.synthesize("Hallo").await,
            Err(Error::Synthesis(_))
        ));
    }
}
