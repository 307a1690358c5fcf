//! Forwarding emails with their attachments to the bookkeeping mailbox over
//! SMTP.

use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use mail_parser::{MessageParser, MimeHeaders};
use secrecy::ExposeSecret;

use crate::channels::gmail_types::strip_html;
use crate::config::BookkeepingConfig;
use crate::error::ProviderError;

const PROVIDER: &str = "smtp";

/// An email reduced to what the bookkeeper needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedEmail {
    pub subject: String,
    pub from: String,
    pub body: String,
    pub attachments: Vec<ForwardedAttachment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardedAttachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Parse RFC 822 source into a [`ForwardedEmail`].
pub fn parse_raw_email(raw: &[u8]) -> Result<ForwardedEmail, ProviderError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| ProviderError::invalid("gmail", "raw message could not be parsed"))?;

    let from = parsed
        .from()
        .and_then(|addr| addr.first())
        .map(|a| match (a.name(), a.address()) {
            (Some(name), Some(address)) => format!("{name} <{address}>"),
            (None, Some(address)) => address.to_string(),
            (Some(name), None) => name.to_string(),
            (None, None) => String::new(),
        })
        .unwrap_or_default();

    let body = parsed
        .body_text(0)
        .map(|t| t.into_owned())
        .or_else(|| parsed.body_html(0).map(|h| strip_html(&h)))
        .unwrap_or_default();

    let attachments = parsed
        .attachments()
        .enumerate()
        .map(|(i, part)| {
            let content_type = MimeHeaders::content_type(part)
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| "application/octet-stream".to_string());
            ForwardedAttachment {
                filename: MimeHeaders::attachment_name(part)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("attachment-{}", i + 1)),
                content_type,
                data: part.contents().to_vec(),
            }
        })
        .collect();

    Ok(ForwardedEmail {
        subject: parsed.subject().unwrap_or_default().to_string(),
        from,
        body,
        attachments,
    })
}

pub struct BookkeepingMailer {
    config: BookkeepingConfig,
}

impl BookkeepingMailer {
    pub fn new(config: BookkeepingConfig) -> Self {
        Self { config }
    }

    pub fn recipient(&self) -> &str {
        &self.config.recipient
    }

    /// Label to add once a message has been forwarded.
    pub fn sent_label(&self) -> Option<&str> {
        self.config.sent_label.as_deref()
    }

    /// Build the outgoing message: original body as text plus every attachment.
    pub fn build_message(&self, email: &ForwardedEmail) -> Result<Message, ProviderError> {
        let subject = if email.subject.to_lowercase().starts_with("fwd:") {
            email.subject.clone()
        } else {
            format!("Fwd: {}", email.subject)
        };
        let text = format!(
            "---------- Forwarded message ---------\nFrom: {}\nSubject: {}\n\n{}",
            email.from, email.subject, email.body
        );

        let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(text));
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type)
                .or_else(|_| ContentType::parse("application/octet-stream"))
                .map_err(|e| rejected(format!("Invalid content type: {e}")))?;
            multipart = multipart.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }

        Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| rejected(format!("Invalid from address: {e}")))?,
            )
            .to(self
                .config
                .recipient
                .parse()
                .map_err(|e| rejected(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .multipart(multipart)
            .map_err(|e| rejected(format!("Failed to build email: {e}")))
    }

    /// Send over SMTP. The blocking transport runs on the blocking pool.
    pub async fn send(&self, email: &ForwardedEmail) -> Result<(), ProviderError> {
        let message = self.build_message(email)?;
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );
        let transport = SmtpTransport::relay(&self.config.smtp_host)
            .map_err(|e| rejected(format!("SMTP relay error: {e}")))?
            .port(self.config.smtp_port)
            .credentials(creds)
            .build();

        tokio::task::spawn_blocking(move || transport.send(&message))
            .await
            .map_err(|e| ProviderError::request(PROVIDER, format!("SMTP task failed: {e}")))?
            .map_err(|e| ProviderError::request(PROVIDER, format!("SMTP send failed: {e}")))?;

        tracing::info!(
            to = %self.config.recipient,
            attachments = email.attachments.len(),
            "Forwarded email to bookkeeping"
        );
        Ok(())
    }
}

fn rejected(reason: String) -> ProviderError {
    ProviderError::Rejected {
        provider: PROVIDER.into(),
        reason,
    }
}
