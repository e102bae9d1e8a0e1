//! OpenAI adapter tests against a mock HTTP server

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use whisper_relay::application::ports::Transcriber;
use whisper_relay::application::{RetryOrchestrator, NO_TEXT_PLACEHOLDER};
use whisper_relay::domain::retry::{
    classify, ErrorClass, RetryPolicies, TerminalError, UpstreamFailure,
};
use whisper_relay::domain::transcription::{AudioData, AudioMimeType, Job};
use whisper_relay::infrastructure::OpenAiTranscriber;

const ROUTE: &str = "/v1/audio/transcriptions";

fn audio() -> AudioData {
    // ASCII payload keeps the multipart body matchable as a string
    AudioData::new(b"fake-webm-bytes".to_vec(), AudioMimeType::Webm)
}

fn transcriber(server: &MockServer) -> OpenAiTranscriber {
    OpenAiTranscriber::new("sk-test").with_endpoint(format!("{}{}", server.uri(), ROUTE))
}

fn fast_policies() -> RetryPolicies {
    let mut policies = RetryPolicies::default();
    for class in ErrorClass::ALL {
        let policy = policies.for_class_mut(class);
        policy.base_delay_ms = 10;
        policy.max_delay_ms = 50;
        policy.jitter_ms = 0;
    }
    policies
}

#[tokio::test]
async fn uploads_multipart_with_bearer_auth() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ROUTE))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("name=\"model\""))
        .and(body_string_contains("whisper-1"))
        .and(body_string_contains("filename=\"audio.webm\""))
        .and(body_string_contains("audio/webm"))
        .and(body_string_contains("fake-webm-bytes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "hello world"})))
        .expect(1)
        .mount(&server)
        .await;

    let text = transcriber(&server).transcribe(&audio()).await.unwrap();
    assert_eq!(text.as_deref(), Some("hello world"));
}

#[tokio::test]
async fn sends_configured_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("whisper-large-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let result = transcriber(&server)
        .with_model("whisper-large-test")
        .transcribe(&audio())
        .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn success_without_text_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task": "transcribe"})))
        .mount(&server)
        .await;

    let text = transcriber(&server).transcribe(&audio()).await.unwrap();
    assert_eq!(text, None);
}

#[tokio::test]
async fn non_json_success_body_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .mount(&server)
        .await;

    let text = transcriber(&server).transcribe(&audio()).await.unwrap();
    assert_eq!(text, None);
}

#[tokio::test]
async fn non_string_text_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": 123})))
        .mount(&server)
        .await;

    let text = transcriber(&server).transcribe(&audio()).await.unwrap();
    assert_eq!(text, None);
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "7")
                .set_body_json(json!({"error": {"message": "Rate limit reached"}})),
        )
        .mount(&server)
        .await;

    let failure = transcriber(&server).transcribe(&audio()).await.unwrap_err();
    assert_eq!(failure.status, Some(429));
    assert_eq!(failure.retry_after.as_deref(), Some("7"));
    assert_eq!(failure.retry_after_secs(), Some(7));
    assert_eq!(failure.message, "Rate limit reached");
    assert_eq!(classify(&failure), ErrorClass::RateLimited);
}

#[tokio::test]
async fn api_error_message_is_extracted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
        })))
        .mount(&server)
        .await;

    let failure = transcriber(&server).transcribe(&audio()).await.unwrap_err();
    assert_eq!(failure.status, Some(401));
    assert_eq!(failure.message, "Incorrect API key provided");
    assert_eq!(classify(&failure), ErrorClass::Fatal);
}

#[tokio::test]
async fn non_json_error_falls_back_to_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&server)
        .await;

    let failure = transcriber(&server).transcribe(&audio()).await.unwrap_err();
    assert_eq!(failure.status, Some(502));
    assert_eq!(failure.message, "Request failed with status code 502");
}

#[tokio::test]
async fn connection_refused_is_fatal() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let failure = OpenAiTranscriber::new("sk-test")
        .with_endpoint(format!("http://{}{}", addr, ROUTE))
        .transcribe(&audio())
        .await
        .unwrap_err();

    assert_eq!(failure.status, None);
    assert_eq!(failure.code.as_deref(), Some("ECONNREFUSED"));
    assert_eq!(classify(&failure), ErrorClass::Fatal);
}

#[tokio::test]
async fn unresolvable_host_is_dns_failure() {
    let failure = OpenAiTranscriber::new("sk-test")
        .with_endpoint("http://whisper-relay-test.invalid/v1/audio/transcriptions")
        .transcribe(&audio())
        .await
        .unwrap_err();

    assert_eq!(failure.code.as_deref(), Some("ENOTFOUND"), "failure: {:?}", failure);
    assert_eq!(classify(&failure), ErrorClass::DnsFailure);
}

#[tokio::test]
async fn orchestrator_stops_on_fatal_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"message": "Invalid file format."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = RetryOrchestrator::new(transcriber(&server), fast_policies());
    let result = orchestrator.run(&Job::new(audio())).await;

    assert_eq!(
        result,
        Err(TerminalError::Upstream {
            message: "Invalid file format.".to_string()
        })
    );
}

#[tokio::test]
async fn orchestrator_recovers_after_rate_limit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "slow down"}
        })))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "finally"})))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = RetryOrchestrator::new(transcriber(&server), fast_policies());
    let text = orchestrator.run(&Job::new(audio())).await.unwrap();
    assert_eq!(text, "finally");
}

#[tokio::test]
async fn orchestrator_exhausts_rate_limit_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let mut policies = fast_policies();
    policies.rate_limited.max_attempts = 3;

    let orchestrator = RetryOrchestrator::new(transcriber(&server), policies);
    let result = orchestrator.run(&Job::new(audio())).await;
    assert_eq!(result, Err(TerminalError::RateLimitExceeded { attempts: 3 }));
}

#[tokio::test]
async fn orchestrator_times_out_slow_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"text": "too late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut policies = fast_policies();
    policies.transient_network.max_attempts = 2;

    let orchestrator = RetryOrchestrator::new(transcriber(&server), policies)
        .with_attempt_timeout(Duration::from_millis(200));
    let result = orchestrator.run(&Job::new(audio())).await;
    assert_eq!(result, Err(TerminalError::NetworkError { attempts: 2 }));
}

#[tokio::test]
async fn orchestrator_substitutes_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": ""})))
        .mount(&server)
        .await;

    let orchestrator = RetryOrchestrator::new(transcriber(&server), fast_policies());
    let text = orchestrator.run(&Job::new(audio())).await.unwrap();
    assert_eq!(text, NO_TEXT_PLACEHOLDER);
}

#[tokio::test]
async fn orchestrator_substitutes_placeholder_for_plain_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = RetryOrchestrator::new(transcriber(&server), fast_policies());
    let text = orchestrator.run(&Job::new(audio())).await.unwrap();
    assert_eq!(text, NO_TEXT_PLACEHOLDER);
}

#[test]
fn failure_display_includes_status() {
    let failure = UpstreamFailure::http(429, "Rate limit reached");
    assert!(failure.to_string().contains("429"));
}
