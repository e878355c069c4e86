use std::time::Duration;

use taskdeck_provider::{ChatRequest, LlmProvider, OpenAiProvider, RetryPolicy};
use tokio_stream::StreamExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn mock_completion(text: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
}

fn mock_error(status: u16, message: &str) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(serde_json::json!({
        "error": {"message": message, "type": "api_error"}
    }))
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn basic_chat_with_header_verification() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion("Hello!")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri());
    let resp = provider
        .chat(ChatRequest::simple("gpt-4o", Some("be helpful"), "hi"))
        .await
        .unwrap();

    assert_eq!(resp.text, "Hello!");
    assert_eq!(resp.input_tokens, Some(10));
    assert_eq!(resp.output_tokens, Some(5));
    assert_eq!(resp.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(mock_error(500, "upstream blew up"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion("recovered")))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).with_retry(fast_retry());
    let resp = provider
        .chat(ChatRequest::simple("gpt-4o", None, "hi"))
        .await
        .unwrap();
    assert_eq!(resp.text, "recovered");
}

#[tokio::test]
async fn rate_limit_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(mock_error(429, "slow down"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(mock_completion("ok")))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).with_retry(fast_retry());
    let resp = provider
        .chat(ChatRequest::simple("gpt-4o", None, "hi"))
        .await
        .unwrap();
    assert_eq!(resp.text, "ok");
}

#[tokio::test]
async fn client_errors_propagate_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(mock_error(400, "bad payload"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).with_retry(fast_retry());
    let err = provider
        .chat(ChatRequest::simple("gpt-4o", None, "hi"))
        .await
        .err()
        .expect("must fail");
    assert!(err.to_string().contains("bad payload"));
}

#[tokio::test]
async fn retry_ceiling_gives_up_after_max_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(mock_error(503, "still down"))
        .expect(3)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).with_retry(fast_retry());
    let err = provider
        .chat(ChatRequest::simple("gpt-4o", None, "hi"))
        .await
        .err()
        .expect("must fail");
    assert!(err.to_string().contains("still down"));
}

#[tokio::test]
async fn streaming_parses_sse_until_done() {
    let server = MockServer::start().await;

    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri());
    let mut stream = provider
        .stream(ChatRequest::simple("gpt-4o", None, "hi"))
        .await
        .unwrap();

    let mut collected = String::new();
    let mut got_final = false;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.unwrap();
        if chunk.is_final {
            got_final = true;
            assert_eq!(chunk.finish_reason.as_deref(), Some("stop"));
        } else {
            collected.push_str(&chunk.delta);
        }
    }
    assert!(got_final);
    assert_eq!(collected, "Hello");
}

#[tokio::test]
async fn streaming_error_status_fails_fast() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(mock_error(401, "bad key"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = OpenAiProvider::new("test-key", server.uri()).with_retry(fast_retry());
    let err = provider
        .stream(ChatRequest::simple("gpt-4o", None, "hi"))
        .await
        .err()
        .expect("must fail");
    assert!(err.to_string().contains("bad key"));
}
