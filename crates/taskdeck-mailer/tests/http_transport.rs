use std::sync::Arc;

use taskdeck_mailer::{Email, EmailQueue, HttpMailTransport, MailTransport, Mailer, MailerConfig, SendOutcome};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn email() -> Email {
    Email::new("ada@example.com", "Task overdue", "<p>late</p>")
}

#[tokio::test]
async fn posts_expected_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .and(header("authorization", "Bearer mail-key"))
        .and(body_partial_json(serde_json::json!({
            "from": "taskdeck@example.com",
            "to": "ada@example.com",
            "subject": "Task overdue"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "m1"})))
        .expect(1)
        .mount(&server)
        .await;

    let transport = HttpMailTransport::new(
        format!("{}/v1/send", server.uri()),
        "mail-key",
        "taskdeck@example.com",
    );
    transport.send(&email()).await.unwrap();
}

#[tokio::test]
async fn rate_limited_send_lands_on_retry_queue() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpMailTransport::new(
        format!("{}/v1/send", server.uri()),
        "mail-key",
        "taskdeck@example.com",
    ));
    let config = MailerConfig {
        enabled: true,
        ..MailerConfig::default()
    };
    let mailer = Mailer::new(transport, EmailQueue::new(), config);

    let outcome = mailer.send(email()).await.unwrap();
    assert_eq!(outcome, SendOutcome::Queued);
    assert_eq!(mailer.queue().len(), 1);
}

#[tokio::test]
async fn rejected_payload_is_a_permanent_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/send"))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad recipient"))
        .expect(1)
        .mount(&server)
        .await;

    let transport = Arc::new(HttpMailTransport::new(
        format!("{}/v1/send", server.uri()),
        "mail-key",
        "taskdeck@example.com",
    ));
    let config = MailerConfig {
        enabled: true,
        ..MailerConfig::default()
    };
    let mailer = Mailer::new(transport, EmailQueue::new(), config);

    let err = mailer.send(email()).await.err().expect("must fail");
    assert!(!err.is_transient());
    assert!(mailer.queue().is_empty());
}
