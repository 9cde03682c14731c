//! Transactional email through a Brevo-compatible HTTP API.
//!
//! When no API key or sender is configured the message is logged instead of
//! sent, which keeps local development usable without a mail provider.

use serde::Serialize;
use thiserror::Error;

use crate::config::MailConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("mail provider answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody {
    sender: EmailAddress,
    to: Vec<EmailAddress>,
    subject: String,
    text_content: String,
    html_content: String,
}

#[derive(Clone)]
pub struct Mailer {
    client: reqwest::Client,
    config: MailConfig,
}

impl Mailer {
    pub fn new(config: MailConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub async fn send_verification_email(
        &self,
        to_email: &str,
        nickname: &str,
        link: &str,
    ) -> Result<(), MailError> {
        let subject = "Verify your email address".to_string();
        let text = format!(
            "Hi {nickname},\n\nPlease confirm your email address by opening the link below:\n{link}\n"
        );
        let html = format!(
            "<p>Hi {nickname},</p><p>Please confirm your email address:</p><p><a href=\"{link}\">Verify email</a></p>"
        );
        self.send(to_email, Some(nickname), subject, text, html).await
    }

    async fn send(
        &self,
        to_email: &str,
        to_name: Option<&str>,
        subject: String,
        text: String,
        html: String,
    ) -> Result<(), MailError> {
        if !self.config.is_configured() {
            tracing::info!(to = %to_email, %subject, "mail provider not configured, message:\n{}", text);
            return Ok(());
        }
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let sender = self.config.sender_email.as_deref().unwrap_or_default();

        let body = SendEmailBody {
            sender: EmailAddress {
                email: sender.to_string(),
                name: self.config.sender_name.clone(),
            },
            to: vec![EmailAddress {
                email: to_email.to_string(),
                name: to_name.map(str::to_string),
            }],
            subject,
            text_content: text,
            html_content: html,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %to_email, "mail accepted by provider");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}
