//! OpenSSH authentication and host-key options for the remote drop account.

use std::path::{Path, PathBuf};

use secrecy::ExposeSecret;

use super::error::HandoffFailure;
use crate::config::{HostKeyPolicy, RemoteConfig};

/// Escapes a value for safe use inside a single-quoted shell string.
pub fn shell_escape_token(token: &str) -> String {
    token.replace('\'', "'\\''")
}

/// RAII guard that deletes a temporary file or directory when dropped.
///
/// Keeps the askpass script (which contains the password) and the control
/// socket directory from outliving the session, even on error paths.
#[derive(Debug)]
pub struct TempFileCleanup {
    path: Option<PathBuf>,
}

impl TempFileCleanup {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub(crate) fn empty() -> Self {
        Self { path: None }
    }
}

impl Drop for TempFileCleanup {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let result = if path.is_dir() {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            if let Err(e) = result {
                tracing::warn!(path = %path.display(), error = %e, "Failed to clean up temporary file");
            }
        }
    }
}

/// Arguments and environment shared by every ssh/sftp invocation.
#[derive(Debug)]
pub struct SshAuth {
    /// `-o` options and identity arguments, valid for both ssh and sftp.
    pub args: Vec<String>,
    pub env_vars: Vec<(String, String)>,
    /// Must outlive the commands that use `env_vars`.
    pub _cleanup: TempFileCleanup,
}

/// Host-key options for the configured trust policy.
///
/// `RequireKnown` maps to strict checking, so an unknown or changed key is a
/// connection failure rather than a prompt or a silent accept.
pub fn host_key_args(policy: HostKeyPolicy, known_hosts_file: Option<&str>) -> Vec<String> {
    let checking = match policy {
        HostKeyPolicy::TrustOnFirstUse => "accept-new",
        HostKeyPolicy::RequireKnown => "yes",
    };

    let mut args = vec![
        "-o".to_string(),
        format!("StrictHostKeyChecking={}", checking),
    ];
    if let Some(file) = known_hosts_file.filter(|f| !f.trim().is_empty()) {
        args.push("-o".to_string());
        args.push(format!(
            "UserKnownHostsFile={}",
            crate::secrets::expand_home(file)
        ));
    }
    args
}

/// Builds the authentication arguments for `remote`.
///
/// A configured key path wins; otherwise the password is resolved from its
/// configured source and supplied through a throwaway `SSH_ASKPASS` script.
pub fn build_ssh_auth(remote: &RemoteConfig) -> Result<SshAuth, HandoffFailure> {
    let mut args = host_key_args(remote.host_key_policy, remote.known_hosts_file.as_deref());
    args.push("-o".to_string());
    args.push(format!("ConnectTimeout={}", remote.timeout_secs));

    if !remote.ssh_key_path.is_empty() {
        let key_path = PathBuf::from(crate::secrets::expand_home(&remote.ssh_key_path));
        if !key_path.exists() {
            return Err(HandoffFailure::Credentials(format!(
                "SSH key file not found: {}",
                key_path.display()
            )));
        }

        args.extend([
            "-i".to_string(),
            key_path.display().to_string(),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ]);

        return Ok(SshAuth {
            args,
            env_vars: Vec::new(),
            _cleanup: TempFileCleanup::empty(),
        });
    }

    let env_var = Some(remote.password_env_var.as_str()).filter(|v| !v.is_empty());
    let password = crate::secrets::resolve_secret(
        remote.password_insecure.as_deref(),
        remote.password_file.as_deref(),
        env_var,
    )
    .map_err(|e| {
        HandoffFailure::Credentials(format!(
            "{}. Configure sshKeyPath, password, passwordFile, or passwordEnvVar.",
            e
        ))
    })?;

    let askpass_path =
        std::env::temp_dir().join(format!(".easyscan-askpass-{}.sh", uuid::Uuid::new_v4()));
    write_askpass_script(&askpass_path, password.expose_secret())?;
    let cleanup = TempFileCleanup::new(askpass_path.clone());

    let askpass = askpass_path
        .to_str()
        .ok_or_else(|| {
            HandoffFailure::Credentials(
                "Temp directory path contains non-UTF8 characters".to_string(),
            )
        })?
        .to_string();

    args.extend([
        "-o".to_string(),
        "PreferredAuthentications=password,keyboard-interactive".to_string(),
        "-o".to_string(),
        "PubkeyAuthentication=no".to_string(),
        "-o".to_string(),
        "NumberOfPasswordPrompts=1".to_string(),
    ]);

    Ok(SshAuth {
        args,
        env_vars: vec![
            ("SSH_ASKPASS".to_string(), askpass),
            ("SSH_ASKPASS_REQUIRE".to_string(), "force".to_string()),
            ("DISPLAY".to_string(), ":0".to_string()),
        ],
        _cleanup: cleanup,
    })
}

fn write_askpass_script(path: &Path, password: &str) -> Result<(), HandoffFailure> {
    let script = format!(
        "#!/bin/sh\nprintf '%s\\n' '{}'\n",
        shell_escape_token(password)
    );

    let io_err = |e: std::io::Error| {
        HandoffFailure::Credentials(format!("Failed to write askpass script: {}", e))
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o700)
            .open(path)
            .map_err(io_err)?;
        std::io::Write::write_all(&mut file, script.as_bytes()).map_err(io_err)?;
    }

    #[cfg(not(unix))]
    {
        std::fs::write(path, &script).map_err(io_err)?;
    }

    Ok(())
}
