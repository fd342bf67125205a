//! Purchase confirmation email via a Resend-style HTTP API.
//!
//! Two modes:
//! 1. Send via the API (when an API key is configured)
//! 2. Disabled (no email sent, log only)
//!
//! Delivery is best-effort: callers dispatch sends from a detached task and
//! treat failure as a log line, never as a failure of the payment flow.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Album, Track};

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Result of attempting to send a purchase confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailSendResult {
    Sent,
    /// No API key configured; nothing was sent.
    Disabled,
}

/// Everything the confirmation email mentions.
pub struct PurchaseEmailArgs<'a> {
    pub to_email: &'a str,
    pub customer_name: Option<&'a str>,
    pub order_id: &'a str,
    pub purchase_token: &'a str,
    pub album: &'a Album,
    pub tracks: &'a [Track],
}

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    text: String,
    html: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailResponse {
    #[allow(dead_code)]
    id: String,
}

#[derive(Clone)]
pub struct EmailService {
    client: Client,
    api_key: Option<String>,
    from: String,
    site_url: String,
}

impl EmailService {
    pub fn new(client: Client, api_key: Option<String>, from: String, site_url: String) -> Self {
        Self {
            client,
            api_key,
            from,
            site_url,
        }
    }

    /// Whether an API key is configured and sends will actually go out.
    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Send the one-time purchase confirmation with download links.
    pub async fn send_purchase_email(&self, args: &PurchaseEmailArgs<'_>) -> Result<EmailSendResult> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::info!(
                "Email disabled, skipping purchase confirmation for order {}",
                args.order_id
            );
            return Ok(EmailSendResult::Disabled);
        };

        let subject = format!(
            "Thank you for your purchase: {} - {}",
            args.album.artist, args.album.title
        );

        let request = SendEmailRequest {
            from: &self.from,
            to: vec![args.to_email],
            subject,
            text: self.render_text(args),
            html: self.render_html(args),
        };

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Email API error: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Internal(format!(
                "Email API returned {}: {}",
                status, body
            )));
        }

        let _: SendEmailResponse = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Invalid email API response: {}", e)))?;

        Ok(EmailSendResult::Sent)
    }

    fn download_link(&self, token: &str, track_id: &str) -> String {
        format!(
            "{}/api/download?token={}&track={}",
            self.site_url, token, track_id
        )
    }

    fn render_text(&self, args: &PurchaseEmailArgs<'_>) -> String {
        let greeting = match args.customer_name {
            Some(name) => format!("Hello, {}!", name),
            None => "Hello!".to_string(),
        };

        let track_lines: String = args
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    "{}. {}\n   Download: {}\n",
                    i + 1,
                    t.title,
                    self.download_link(args.purchase_token, &t.id)
                )
            })
            .collect();

        format!(
            "Thank you for your purchase!\n\n{}\n\nYour order #{} has been paid.\n\n{} - {}\n\nTracks:\n{}",
            greeting,
            &args.order_id[..args.order_id.len().min(15)],
            args.album.artist,
            args.album.title,
            track_lines,
        )
    }

    fn render_html(&self, args: &PurchaseEmailArgs<'_>) -> String {
        let greeting = match args.customer_name {
            Some(name) => format!("Hello, {}!", escape_html(name)),
            None => "Hello!".to_string(),
        };

        let rows: String = args
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| {
                format!(
                    r#"<tr><td style="padding: 8px 0;">{}.</td><td style="padding: 8px 0;">{}</td><td style="padding: 8px 0; text-align: right;"><a href="{}">Download</a></td></tr>"#,
                    i + 1,
                    escape_html(&t.title),
                    self.download_link(args.purchase_token, &t.id)
                )
            })
            .collect();

        format!(
            r#"<html><body style="font-family: sans-serif; max-width: 600px; margin: 0 auto;">
<h1>Thank you for your purchase!</h1>
<p>{}</p>
<p>Your order <strong>#{}</strong> has been paid.</p>
<h2>{} &mdash; {}</h2>
<table style="width: 100%; border-collapse: collapse;">{}</table>
</body></html>"#,
            greeting,
            escape_html(&args.order_id[..args.order_id.len().min(15)]),
            escape_html(&args.album.artist),
            escape_html(&args.album.title),
            rows,
        )
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#039;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tar & Feathers"</b>"#),
            "&lt;b&gt;&quot;Tar &amp; Feathers&quot;&lt;/b&gt;"
        );
    }
}
