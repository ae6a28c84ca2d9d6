//! Contact mail delivery
//!
//! The contact form hands a [`ContactMessage`] to a [`Mailer`]. The SMTP
//! implementation builds the message with Lettre and submits it through the
//! configured relay. Failures are returned to the caller and never retried;
//! the visitor can resubmit the form.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport};
use std::time::Duration;
use thiserror::Error;

use crate::config::MailConfig;
use crate::i18n::I18n;

/// Upper bound for one SMTP conversation
const SMTP_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors raised while sending a contact message
#[derive(Debug, Error)]
pub enum MailError {
    /// Mail settings are missing; nothing was attempted
    #[error("mail is not configured (missing {0})")]
    Config(String),

    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("failed to build message: {0}")]
    Build(String),

    /// The relay could not be reached or refused the message
    #[error("failed to send message: {0}")]
    Transport(String),
}

/// A validated contact form submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Something that can deliver contact messages to the site operator
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &ContactMessage) -> Result<(), MailError>;
}

/// Fixed, localized parts of the notification mail
#[derive(Debug, Clone)]
struct Template {
    subject: String,
    name_label: String,
    email_label: String,
    message_label: String,
}

impl Template {
    fn new(i18n: &I18n) -> Self {
        Self {
            subject: i18n.get("mail.subject"),
            name_label: i18n.get("mail.name"),
            email_label: i18n.get("mail.email"),
            message_label: i18n.get("mail.message"),
        }
    }

    fn body(&self, message: &ContactMessage) -> String {
        format!(
            "{}: {}\n{}: {}\n{}:\n\n{}\n",
            self.name_label,
            message.name,
            self.email_label,
            message.email,
            self.message_label,
            message.message
        )
    }
}

/// SMTP mailer using Lettre.
///
/// The submitter goes in `From` and `Reply-To` so a reply reaches them
/// directly; the configured account is the `Sender` that authenticates
/// against the relay.
#[derive(Clone)]
pub struct SmtpMailer {
    config: MailConfig,
    template: Template,
}

impl SmtpMailer {
    pub fn new(config: MailConfig, i18n: &I18n) -> Self {
        let missing = config.missing();
        if !missing.is_empty() {
            tracing::warn!(
                "Mail is not configured (missing {}); contact form submissions will fail",
                missing.join(", ")
            );
        }
        Self {
            config,
            template: Template::new(i18n),
        }
    }

    fn require<'a>(&self, value: &'a Option<String>) -> Result<&'a str, MailError> {
        value
            .as_deref()
            .ok_or_else(|| MailError::Config(self.config.missing().join(", ")))
    }

    /// Build the notification email for a submission
    pub fn build_message(&self, message: &ContactMessage) -> Result<Message, MailError> {
        let sender = parse_address(self.require(&self.config.sender)?)?;
        let recipient = parse_address(self.require(&self.config.recipient)?)?;
        let submitter = Mailbox::new(
            Some(message.name.clone()),
            parse_address(&message.email)?,
        );

        Message::builder()
            .from(submitter.clone())
            .sender(Mailbox::new(None, sender))
            .reply_to(submitter)
            .to(Mailbox::new(None, recipient))
            .subject(self.template.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(self.template.body(message))
            .map_err(|e| MailError::Build(e.to_string()))
    }

    /// Build SMTP transport for sending emails.
    ///
    /// Creates a new transport for each email; contact traffic is too low to
    /// benefit from a pooled connection.
    fn build_transport(&self) -> Result<SmtpTransport, MailError> {
        let host = self.require(&self.config.smtp_host)?;
        let username = self.require(&self.config.username)?;
        let password = self.require(&self.config.password)?;

        let transport = SmtpTransport::starttls_relay(host)
            .map_err(|e| MailError::Transport(format!("SMTP relay error: {e}")))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .timeout(Some(SMTP_TIMEOUT))
            .build();
        Ok(transport)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &ContactMessage) -> Result<(), MailError> {
        let email = self.build_message(message)?;
        let mailer = self.build_transport()?;

        tokio::task::spawn_blocking(move || {
            mailer
                .send(&email)
                .map_err(|e| MailError::Transport(e.to_string()))
        })
        .await
        .map_err(|e| MailError::Transport(format!("mail task failed: {e}")))??;

        tracing::debug!("Contact message delivered");
        Ok(())
    }
}

fn parse_address(address: &str) -> Result<Address, MailError> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| MailError::Address {
            address: address.to_string(),
            reason: e.to_string(),
        })
}
