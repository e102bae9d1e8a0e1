//! OpenAI audio transcription adapter

use std::error::Error as StdError;
use std::io;

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;

use crate::application::ports::Transcriber;
use crate::domain::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::domain::retry::UpstreamFailure;
use crate::domain::transcription::AudioData;

// Response types for the transcription API

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

/// Transcriber backed by the OpenAI `/v1/audio/transcriptions` endpoint
pub struct OpenAiTranscriber {
    api_key: String,
    endpoint: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiTranscriber {
    /// Create a transcriber for the public endpoint with the default model
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point at a different endpoint (proxies, test servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Use a different model identifier
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the multipart body: model name plus the audio file
    fn build_form(&self, audio: &AudioData) -> Result<Form, UpstreamFailure> {
        let file = Part::bytes(audio.data().to_vec())
            .file_name(audio.file_name())
            .mime_str(audio.mime_type().as_str())
            .map_err(|e| failure_from_reqwest(&e))?;

        Ok(Form::new().text("model", self.model.clone()).part("file", file))
    }

    /// Extract `text` from a success body; anything else counts as no text
    fn transcript_text(body: &str) -> Option<String> {
        serde_json::from_str::<Value>(body)
            .ok()?
            .get("text")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Extract `error.message` from an error body
    fn error_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorEnvelope>(body)
            .ok()?
            .error?
            .message
            .filter(|m| !m.trim().is_empty())
    }
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &AudioData) -> Result<Option<String>, UpstreamFailure> {
        let form = self.build_form(audio)?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| failure_from_reqwest(&e))?;

        let status = response.status();

        if !status.is_success() {
            // HeaderMap lookups are case-insensitive
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let body = response.text().await.unwrap_or_default();
            let message = Self::error_message(&body)
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

            let failure = UpstreamFailure::http(status.as_u16(), message);
            return Err(match retry_after {
                Some(value) => failure.with_retry_after(value),
                None => failure,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| failure_from_reqwest(&e))?;

        Ok(Self::transcript_text(&body))
    }
}

/// Translate a reqwest error into the normalized failure record
fn failure_from_reqwest(err: &reqwest::Error) -> UpstreamFailure {
    let message = error_chain(err);
    let lower = message.to_ascii_lowercase();

    let code = if err.is_timeout() {
        Some("ETIMEDOUT")
    } else if lower.contains("dns error") || lower.contains("failed to lookup address") {
        Some("ENOTFOUND")
    } else if let Some(code) = io_error_code(err) {
        Some(code)
    } else if err.is_connect() {
        Some("ECONNREFUSED")
    } else {
        None
    };

    UpstreamFailure {
        status: err.status().map(|s| s.as_u16()),
        code: code.map(str::to_string),
        message,
        retry_after: None,
    }
}

/// Code for the first I/O error in the cause chain, if it is a reset or timeout
fn io_error_code(err: &(dyn StdError + 'static)) -> Option<&'static str> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            match io_err.kind() {
                io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe => return Some("ECONNRESET"),
                io::ErrorKind::TimedOut => return Some("ETIMEDOUT"),
                _ => {}
            }
        }
        current = e.source();
    }
    None
}

/// Join an error and all its sources into one message
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_public_endpoint_and_whisper() {
        let transcriber = OpenAiTranscriber::new("test-key");
        assert_eq!(transcriber.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(transcriber.model(), "whisper-1");
    }

    #[test]
    fn custom_endpoint_and_model() {
        let transcriber = OpenAiTranscriber::new("key")
            .with_endpoint("http://localhost:9000/v1/audio/transcriptions")
            .with_model("custom-model");

        assert!(transcriber.endpoint().starts_with("http://localhost:9000"));
        assert_eq!(transcriber.model(), "custom-model");
    }

    #[test]
    fn build_form_accepts_audio() {
        let transcriber = OpenAiTranscriber::new("key");
        let audio = AudioData::from(vec![1, 2, 3]);
        assert!(transcriber.build_form(&audio).is_ok());
    }

    #[test]
    fn transcript_text_from_body() {
        assert_eq!(
            OpenAiTranscriber::transcript_text(r#"{"text":"hello"}"#),
            Some("hello".to_string())
        );
    }

    #[test]
    fn transcript_text_tolerates_odd_bodies() {
        assert_eq!(OpenAiTranscriber::transcript_text("OK"), None);
        assert_eq!(OpenAiTranscriber::transcript_text(""), None);
        assert_eq!(OpenAiTranscriber::transcript_text(r#"{"text":123}"#), None);
        assert_eq!(OpenAiTranscriber::transcript_text(r#"["text"]"#), None);
    }

    #[test]
    fn error_message_from_body() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(
            OpenAiTranscriber::error_message(body),
            Some("Incorrect API key provided".to_string())
        );
    }

    #[test]
    fn error_message_missing() {
        assert_eq!(OpenAiTranscriber::error_message("<html>502</html>"), None);
        assert_eq!(OpenAiTranscriber::error_message(r#"{"error":{}}"#), None);
        assert_eq!(OpenAiTranscriber::error_message(r#"{"error":{"message":""}}"#), None);
    }

    #[test]
    fn io_reset_maps_to_econnreset() {
        let err = io::Error::new(io::ErrorKind::ConnectionReset, "peer reset");
        assert_eq!(io_error_code(&err), Some("ECONNRESET"));

        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert_eq!(io_error_code(&err), Some("ETIMEDOUT"));

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "no");
        assert_eq!(io_error_code(&err), None);
    }

    #[test]
    fn error_chain_joins_sources() {
        #[derive(Debug)]
        struct Outer(io::Error);

        impl std::fmt::Display for Outer {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "error sending request")
            }
        }

        impl StdError for Outer {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer"));
        assert_eq!(error_chain(&err), "error sending request: connection reset by peer");
        assert_eq!(io_error_code(&err), Some("ECONNRESET"));
    }
}
