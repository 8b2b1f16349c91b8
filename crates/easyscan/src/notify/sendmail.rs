use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;

use super::{EmailMessage, Mailer, NotifyError};
use crate::sanitize::redact_email;

/// Hands messages to the local MTA via `sendmail -t -oi`.
#[derive(Debug, Clone)]
pub struct SendmailMailer {
    program: String,
}

impl SendmailMailer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait::async_trait]
impl Mailer for SendmailMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), NotifyError> {
        let text = message.to_rfc822()?;

        let mut child = TokioCommand::new(&self.program)
            .args(["-t", "-oi"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NotifyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // An MTA that exits early closes stdin; its exit status says why.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(text.as_bytes()).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
                    tracing::debug!("sendmail closed stdin before reading the message");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(NotifyError::Exit {
                status: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::info!(to = %redact_email(&message.to), "Confirmation email handed to sendmail");
        Ok(())
    }
}
