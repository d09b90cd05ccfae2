use std::fs;
use std::io;
use std::path::Path;

use engine_logging::engine_info;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use press_core::IssueMetadata;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid address '{address}': {source}")]
    Address {
        address: String,
        source: lettre::address::AddressError,
    },
    #[error("no recipients configured")]
    NoRecipients,
    #[error("cannot read {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("cannot build message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("smtp error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Hands a finished issue to its readers.
pub trait Notifier: Send + Sync {
    fn deliver(&self, issue: &IssueMetadata, file: &Path) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    /// STARTTLS on `port`; implicit TLS otherwise.
    pub starttls: bool,
    pub username: String,
    pub password: String,
    pub from: String,
}

pub struct SmtpNotifier {
    settings: SmtpSettings,
    recipients: Vec<String>,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings, recipients: Vec<String>) -> Self {
        Self {
            settings,
            recipients,
        }
    }

    /// One message to all recipients with `file` attached as `document.<ext>`.
    pub fn compose(&self, issue: &IssueMetadata, file: &Path) -> Result<Message, NotifyError> {
        if self.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }
        let mut builder = Message::builder()
            .from(mailbox(&self.settings.from)?)
            .subject(format!("{} {}: {}", issue.publication, issue.date, issue.title));
        for recipient in &self.recipients {
            builder = builder.to(mailbox(recipient)?);
        }

        let bytes = fs::read(file).map_err(|source| NotifyError::Read {
            path: file.display().to_string(),
            source,
        })?;
        let extension = file
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
            .to_ascii_lowercase();
        let attachment = Attachment::new(format!("document.{extension}"))
            .body(bytes, content_type_for(&extension));
        let text = format!(
            "{} issue {} ({}), attached as document.{extension}.",
            issue.publication, issue.id, issue.date
        );

        Ok(builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(text))
                .singlepart(attachment),
        )?)
    }

    fn transport(&self) -> Result<SmtpTransport, NotifyError> {
        let builder = if self.settings.starttls {
            SmtpTransport::starttls_relay(&self.settings.host)?
        } else {
            SmtpTransport::relay(&self.settings.host)?
        };
        Ok(builder
            .port(self.settings.port)
            .credentials(Credentials::new(
                self.settings.username.clone(),
                self.settings.password.clone(),
            ))
            .build())
    }
}

impl Notifier for SmtpNotifier {
    fn deliver(&self, issue: &IssueMetadata, file: &Path) -> Result<(), NotifyError> {
        let message = self.compose(issue, file)?;
        self.transport()?.send(&message)?;
        engine_info!(
            "Sent {} to {} recipient(s)",
            file.display(),
            self.recipients.len()
        );
        Ok(())
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

fn content_type_for(extension: &str) -> ContentType {
    let mime = match extension {
        "epub" => "application/epub+zip",
        "mobi" => "application/x-mobipocket-ebook",
        _ => "application/octet-stream",
    };
    ContentType::parse(mime).unwrap_or(ContentType::TEXT_PLAIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            starttls: true,
            username: "press".to_string(),
            password: "secret".to_string(),
            from: "press@example.com".to_string(),
        }
    }

    fn metadata() -> IssueMetadata {
        IssueMetadata {
            id: "2013-01-05".to_string(),
            title: "Fixing the roof".to_string(),
            publication: "The Economist".to_string(),
            publisher: None,
            date: NaiveDate::from_ymd_opt(2013, 1, 5).unwrap(),
        }
    }

    #[test]
    fn message_carries_the_document_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("2013-01-05.mobi");
        fs::write(&file, b"MOBI").unwrap();

        let notifier = SmtpNotifier::new(settings(), vec!["reader@kindle.example".to_string()]);
        let message = notifier.compose(&metadata(), &file).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();

        assert!(raw.contains("Subject: The Economist 2013-01-05: Fixing the roof"));
        assert!(raw.contains("To: reader@kindle.example"));
        assert!(raw.contains("document.mobi"));
        assert!(raw.contains("application/x-mobipocket-ebook"));
    }

    #[test]
    fn recipients_and_addresses_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("x.epub");
        fs::write(&file, b"PK").unwrap();

        let nobody = SmtpNotifier::new(settings(), Vec::new());
        assert!(matches!(
            nobody.compose(&metadata(), &file),
            Err(NotifyError::NoRecipients)
        ));
        let bad = SmtpNotifier::new(settings(), vec!["not an address".to_string()]);
        assert!(matches!(
            bad.compose(&metadata(), &file),
            Err(NotifyError::Address { .. })
        ));
    }
}
