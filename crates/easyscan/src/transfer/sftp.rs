//! [`Transport`] backed by the OpenSSH client binaries.
//!
//! `open` starts a ControlMaster connection (`ssh -M -N -f`), which performs
//! host-key verification and authentication exactly once. Each `put` runs
//! `sftp -b -` multiplexed over that master, and `close` sends `-O exit`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;

use super::auth::{build_ssh_auth, SshAuth, TempFileCleanup};
use super::error::{classify_ssh_error, HandoffFailure};
use super::handoff::{TransferSession, Transport};
use crate::config::RemoteConfig;
use crate::sanitize::{redact_host, redact_path};

pub struct OpenSshTransport {
    remote: RemoteConfig,
}

impl OpenSshTransport {
    pub fn new(remote: RemoteConfig) -> Self {
        Self { remote }
    }
}

fn destination(remote: &RemoteConfig) -> String {
    format!("{}@{}", remote.username, remote.host)
}

/// Remote target path for `local` inside `remote_dir`.
pub fn remote_target(remote_dir: &str, local: &Path) -> String {
    let name = redact_path(local);
    let dir = remote_dir.trim_end_matches('/');
    if dir.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", dir, name)
    }
}

/// One `put` line for an sftp batch file. Quotes both paths; rejects
/// characters the batch syntax cannot carry.
pub fn put_command(local: &Path, remote_path: &str) -> Result<String, HandoffFailure> {
    let local = local.display().to_string();
    for value in [local.as_str(), remote_path] {
        if value.contains(['"', '\n', '\r']) {
            return Err(HandoffFailure::Transfer {
                file: value.to_string(),
                message: "path contains characters not allowed in sftp batch mode".to_string(),
            });
        }
    }
    Ok(format!("put \"{}\" \"{}\"\n", local, remote_path))
}

async fn run_with_timeout(
    mut cmd: TokioCommand,
    program: &str,
    stdin_data: Option<String>,
    timeout_secs: u64,
) -> Result<std::process::Output, HandoffFailure> {
    cmd.kill_on_drop(true)
        .stdin(if stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|source| HandoffFailure::Spawn {
        program: program.to_string(),
        source,
    })?;

    if let (Some(data), Some(mut stdin)) = (stdin_data, child.stdin.take()) {
        stdin
            .write_all(data.as_bytes())
            .await
            .map_err(|e| HandoffFailure::Transfer {
                file: program.to_string(),
                message: format!("failed to write batch commands: {}", e),
            })?;
    }

    tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output())
        .await
        .map_err(|_| HandoffFailure::Timeout(timeout_secs))?
        .map_err(|source| HandoffFailure::Spawn {
            program: program.to_string(),
            source,
        })
}

#[async_trait::async_trait]
impl Transport for OpenSshTransport {
    #[tracing::instrument(skip_all, fields(host = %redact_host(&self.remote.host)))]
    async fn open(&self) -> Result<Box<dyn TransferSession>, HandoffFailure> {
        let auth = build_ssh_auth(&self.remote)?;

        let control_dir =
            std::env::temp_dir().join(format!(".easyscan-ssh-{}", uuid::Uuid::new_v4()));
        create_private_dir(&control_dir)?;
        let control_guard = TempFileCleanup::new(control_dir.clone());
        let control_path = control_dir.join("cm");
        let log_path = control_dir.join("master.log");

        // With -f the master backgrounds after authenticating. Its diagnostics
        // go to the -E log, which is read back on failure.
        let mut cmd = TokioCommand::new(&self.remote.ssh_program);
        cmd.args(["-M", "-N", "-f", "-p"])
            .arg(self.remote.port.to_string())
            .arg("-o")
            .arg(format!("ControlPath={}", control_path.display()))
            .arg("-E")
            .arg(&log_path)
            .args(&auth.args)
            .arg(destination(&self.remote));
        for (key, value) in &auth.env_vars {
            cmd.env(key, value);
        }

        cmd.kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let timeout_secs = self.remote.timeout_secs;
        let status = tokio::time::timeout(Duration::from_secs(timeout_secs), cmd.status())
            .await
            .map_err(|_| HandoffFailure::Timeout(timeout_secs))?
            .map_err(|source| HandoffFailure::Spawn {
                program: self.remote.ssh_program.clone(),
                source,
            })?;

        if !status.success() {
            let log = std::fs::read_to_string(&log_path).unwrap_or_default();
            return Err(classify_ssh_error(&log));
        }

        tracing::debug!("Remote session opened");

        Ok(Box::new(OpenSshSession {
            remote: self.remote.clone(),
            control_path,
            auth,
            _control_dir: control_guard,
            closed: false,
        }))
    }
}

fn create_private_dir(path: &Path) -> Result<(), HandoffFailure> {
    let mut builder = std::fs::DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder
        .create(path)
        .map_err(|e| HandoffFailure::Connect(format!("failed to create control directory: {}", e)))
}

struct OpenSshSession {
    remote: RemoteConfig,
    control_path: PathBuf,
    auth: SshAuth,
    _control_dir: TempFileCleanup,
    closed: bool,
}

impl OpenSshSession {
    fn control_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            format!("ControlPath={}", self.control_path.display()),
            "-o".to_string(),
            "ControlMaster=no".to_string(),
        ]
    }
}

#[async_trait::async_trait]
impl TransferSession for OpenSshSession {
    async fn put(&mut self, local: &Path, remote_dir: &str) -> Result<(), HandoffFailure> {
        let file = redact_path(local);
        let batch = put_command(local, &remote_target(remote_dir, local))?;

        let mut cmd = TokioCommand::new(&self.remote.sftp_program);
        cmd.args(["-b", "-", "-P"])
            .arg(self.remote.port.to_string())
            .args(self.control_args())
            .args(&self.auth.args)
            .arg(destination(&self.remote));
        for (key, value) in &self.auth.env_vars {
            cmd.env(key, value);
        }

        let output = run_with_timeout(
            cmd,
            &self.remote.sftp_program,
            Some(batch),
            self.remote.timeout_secs,
        )
        .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(HandoffFailure::Transfer {
                file,
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    async fn close(&mut self) -> Result<(), HandoffFailure> {
        self.closed = true;

        let mut cmd = TokioCommand::new(&self.remote.ssh_program);
        cmd.args(["-O", "exit"])
            .args(self.control_args())
            .arg(destination(&self.remote));

        let output = run_with_timeout(
            cmd,
            &self.remote.ssh_program,
            None,
            self.remote.timeout_secs,
        )
        .await?;

        if output.status.success() {
            Ok(())
        } else {
            Err(HandoffFailure::Close(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

impl Drop for OpenSshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let result = std::process::Command::new(&self.remote.ssh_program)
            .args(["-O", "exit"])
            .args(self.control_args())
            .arg(destination(&self.remote))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to stop ssh control master");
        }
    }
}
