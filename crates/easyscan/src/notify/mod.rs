//! Patron confirmation email.

pub mod sendmail;

use thiserror::Error;

use crate::config::EmailConfig;
use crate::record::ScanRequestRecord;

pub use sendmail::SendmailMailer;

pub const CONFIRMATION_SUBJECT: &str = "Scan Request Confirmation";

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Failed to start mailer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to hand message to mailer: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mailer exited with status {status}: {stderr}")]
    Exit { status: i32, stderr: String },

    #[error("Header '{header}' contains a line break")]
    InvalidHeader { header: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: String,
    pub to: String,
    pub reply_to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    /// Renders the message as RFC 822 text. Header values may not contain
    /// CR or LF.
    pub fn to_rfc822(&self) -> Result<String, NotifyError> {
        let headers: [(&'static str, &str); 4] = [
            ("From", &self.from),
            ("To", &self.to),
            ("Reply-To", &self.reply_to),
            ("Subject", &self.subject),
        ];

        let mut out = String::new();
        for (name, value) in headers {
            if value.contains(['\r', '\n']) {
                return Err(NotifyError::InvalidHeader { header: name });
            }
            if name == "Reply-To" && value.is_empty() {
                continue;
            }
            out.push_str(&format!("{}: {}\n", name, value));
        }
        out.push_str("MIME-Version: 1.0\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\n");
        out.push_str("Content-Transfer-Encoding: 8bit\n");
        out.push('\n');
        out.push_str(&self.body.replace("\r\n", "\n"));
        if !out.ends_with('\n') {
            out.push('\n');
        }
        Ok(out)
    }
}

/// Delivers outbound email.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError>;
}

/// Confirmation body for a newly created request.
pub fn confirmation_body(record: &ScanRequestRecord, config: &EmailConfig) -> String {
    let item = record.item();
    format!(
        "Greetings {name},

This is a confirmation that your easyscan request for the item...

Item title: {title}
Volume/Year: {volume_year}

specifically...

Article/Chapter title: {chapter}
Page range: {pages}

...has been received.

Scans generally take two business days, and will be sent to this email address.

If you have questions, feel free to email {help_email} or call {help_phone}, and reference easyscan request #{id}.",
        name = record.patron().name(),
        title = item.title,
        volume_year = item.volume_year,
        chapter = item.chapter_title,
        pages = item.page_range,
        help_email = config.help_email,
        help_phone = config.help_phone,
        id = record.id(),
    )
}

pub fn confirmation_message(record: &ScanRequestRecord, config: &EmailConfig) -> EmailMessage {
    EmailMessage {
        from: config.from.clone(),
        to: record.patron().email().to_string(),
        reply_to: config.reply_to.clone(),
        subject: CONFIRMATION_SUBJECT.to_string(),
        body: confirmation_body(record, config),
    }
}
