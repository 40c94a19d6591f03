//! Mail API client.
//!
//! Posts built envelopes to a Gmail-style `users/{user}/messages/send`
//! endpoint. The worker only sees the [`MailSender`] capability.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::error::TransportError;
use crate::mail::codec::TransportPayload;

/// Capability to hand an envelope to the mail provider.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, payload: &TransportPayload) -> Result<(), TransportError>;
}

#[derive(Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

/// HTTP mail API sender.
#[derive(Clone)]
pub struct MailApiSender {
    client: Client,
    endpoint: Url,
    token: Option<String>,
    timeout: Duration,
}

impl MailApiSender {
    /// Create a sender for `base` acting as `user`.
    pub fn new(
        base: &str,
        user: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let base = Url::parse(base)?;
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: send_endpoint(&base, user),
            token,
            timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// `{base}/gmail/v1/users/{user}/messages/send`
fn send_endpoint(base: &Url, user: &str) -> Url {
    let mut endpoint = base.clone();
    if let Ok(mut segments) = endpoint.path_segments_mut() {
        segments
            .pop_if_empty()
            .extend(["gmail", "v1", "users", user, "messages", "send"]);
    }
    endpoint
}

#[async_trait]
impl MailSender for MailApiSender {
    async fn send(&self, payload: &TransportPayload) -> Result<(), TransportError> {
        let token = self.token.as_deref().ok_or(TransportError::NotConfigured)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token)
            .json(&SendRequest { raw: &payload.raw })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    TransportError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                message_id = %payload.message_id,
                status = status.as_u16(),
                "mail_api_rejected"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        info!(
            message_id = %payload.message_id,
            status = status.as_u16(),
            "mail_api_accepted"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use tokio::net::TcpListener;

    async fn spawn_api(status: StatusCode, delay: Duration) -> String {
        let app = Router::new().route(
            "/gmail/v1/users/me/messages/send",
            post(move |headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                tokio::time::sleep(delay).await;
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer token-1");
                if !authorized || body.get("raw").and_then(|r| r.as_str()).is_none() {
                    return (StatusCode::UNAUTHORIZED, "bad request".to_string());
                }
                (status, "{}".to_string())
            }),
        );

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}/", addr)
    }

    fn payload() -> TransportPayload {
        TransportPayload {
            message_id: "m1".to_string(),
            raw: "VG86IGFAYi5jb20".to_string(),
        }
    }

    #[test]
    fn test_send_endpoint() {
        let base = Url::parse("https://gmail.googleapis.com/").unwrap();
        assert_eq!(
            send_endpoint(&base, "me").as_str(),
            "https://gmail.googleapis.com/gmail/v1/users/me/messages/send"
        );

        let base = Url::parse("http://localhost:9000/proxy").unwrap();
        assert_eq!(
            send_endpoint(&base, "me").as_str(),
            "http://localhost:9000/proxy/gmail/v1/users/me/messages/send"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            MailApiSender::new("not a url", "me", None, Duration::from_secs(1)),
            Err(TransportError::InvalidUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_send_success() {
        let base = spawn_api(StatusCode::OK, Duration::ZERO).await;
        let sender =
            MailApiSender::new(&base, "me", Some("token-1".to_string()), Duration::from_secs(5))
                .unwrap();

        assert!(sender.send(&payload()).await.is_ok());
    }

    #[tokio::test]
    async fn test_send_non_success_status() {
        let base = spawn_api(StatusCode::BAD_GATEWAY, Duration::ZERO).await;
        let sender =
            MailApiSender::new(&base, "me", Some("token-1".to_string()), Duration::from_secs(5))
                .unwrap();

        match sender.send(&payload()).await {
            Err(TransportError::Status { status, .. }) => assert_eq!(status, 502),
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_send_timeout() {
        let base = spawn_api(StatusCode::OK, Duration::from_secs(2)).await;
        let sender = MailApiSender::new(
            &base,
            "me",
            Some("token-1".to_string()),
            Duration::from_millis(100),
        )
        .unwrap();

        assert!(matches!(
            sender.send(&payload()).await,
            Err(TransportError::Timeout(100))
        ));
    }

    #[tokio::test]
    async fn test_send_without_token() {
        let sender =
            MailApiSender::new("http://127.0.0.1:9/", "me", None, Duration::from_secs(1)).unwrap();

        assert!(matches!(
            sender.send(&payload()).await,
            Err(TransportError::NotConfigured)
        ));
    }
}
