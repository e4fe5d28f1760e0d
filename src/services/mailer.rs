//! Outgoing email dispatch through the Resend HTTP API, with a logging fallback for local runs.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

/// A rendered email ready to be handed to the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Errors raised by an email provider.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("email provider unreachable")]
    Transport(#[from] reqwest::Error),
    #[error("email provider answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends emails and returns the provider message id used to match delivery events.
pub trait Mailer: Send + Sync {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'static, Result<String, MailError>>;
}

#[derive(Serialize)]
struct SendEmailRequest {
    from: String,
    to: Vec<String>,
    subject: String,
    html: String,
}

#[derive(Deserialize)]
struct SendEmailResponse {
    id: String,
}

/// [`Mailer`] backed by the Resend API.
#[derive(Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }
}

impl Mailer for ResendMailer {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'static, Result<String, MailError>> {
        let client = self.client.clone();
        let api_key = self.api_key.clone();
        Box::pin(async move {
            let body = SendEmailRequest {
                from: email.from,
                to: vec![email.to.clone()],
                subject: email.subject,
                html: email.html,
            };

            let resp = client
                .post(RESEND_ENDPOINT)
                .bearer_auth(&api_key)
                .json(&body)
                .send()
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let text = resp.text().await.unwrap_or_default();
                error!(%status, body = %text, "Resend API error");
                return Err(MailError::Rejected {
                    status: status.as_u16(),
                    body: text,
                });
            }

            let SendEmailResponse { id } = resp.json().await?;
            info!(to = %email.to, message_id = %id, "email handed to Resend");
            Ok(id)
        })
    }
}

/// [`Mailer`] that only logs, used when no provider key is configured.
#[derive(Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, email: OutgoingEmail) -> BoxFuture<'static, Result<String, MailError>> {
        Box::pin(async move {
            let id = format!("local-{}", Uuid::new_v4().simple());
            info!(
                to = %email.to,
                subject = %email.subject,
                message_id = %id,
                "email not sent (no provider configured)"
            );
            Ok(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_mailer_hands_out_distinct_ids() {
        let email = OutgoingEmail {
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            subject: "hi".into(),
            html: "<p>hi</p>".into(),
        };

        let first = LogMailer.send(email.clone()).await.unwrap();
        let second = LogMailer.send(email).await.unwrap();
        assert!(first.starts_with("local-"));
        assert_ne!(first, second);
    }
}
