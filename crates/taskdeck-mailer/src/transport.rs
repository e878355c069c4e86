use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
            text: None,
        }
    }
}

/// Send failures split into the classes the retry queue cares about:
/// transient ones go back on the queue, permanent ones are logged and lost.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("transient mail failure: {0}")]
    Transient(String),
    #[error("permanent mail failure: {0}")]
    Permanent(String),
}

impl SendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        // Rate limits and upstream failures are worth another try; other
        // 4xx means the payload or the recipient is wrong.
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Self::Transient(format!("mail api returned {status}: {body}"))
        } else {
            Self::Permanent(format!("mail api returned {status}: {body}"))
        }
    }

    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() || e.is_connect() {
            Self::Transient(e.to_string())
        } else {
            Self::Permanent(e.to_string())
        }
    }
}

#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), SendError>;
}

/// HTTP mail API transport: posts one JSON message per send with a bearer
/// key, the shape most hosted mail providers accept.
pub struct HttpMailTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailTransport {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[derive(Serialize)]
struct OutboundPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

#[async_trait]
impl MailTransport for HttpMailTransport {
    async fn send(&self, email: &Email) -> Result<(), SendError> {
        let payload = OutboundPayload {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            html: &email.html,
            text: email.text.as_deref(),
        };

        let resp = self
            .client
            .post(&self.api_url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| SendError::from_reqwest(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SendError::from_status(status, &body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(SendError::from_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(SendError::from_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(!SendError::from_status(StatusCode::BAD_REQUEST, "").is_transient());
        assert!(!SendError::from_status(StatusCode::UNPROCESSABLE_ENTITY, "").is_transient());
    }
}
