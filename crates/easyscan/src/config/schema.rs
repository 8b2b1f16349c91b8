use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::secrets::expand_home;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: String,
    /// Enables local-development conveniences (test assertion, logout bypass)
    /// for requests whose host is local.
    #[serde(default)]
    pub debug: bool,
    pub database: DatabaseConfig,
    pub staging: StagingConfig,
    pub remote: RemoteConfig,
    pub identity: IdentityConfig,
    pub email: EmailConfig,
    pub lookup: LookupConfig,
    pub sso: SsoConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub path: String,
}

impl DatabaseConfig {
    /// Database file with a leading `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingConfig {
    pub directory: String,
}

impl StagingConfig {
    pub fn resolved_directory(&self) -> PathBuf {
        PathBuf::from(expand_home(&self.directory))
    }
}

/// Remote file-drop endpoint reached over ssh/sftp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub username: String,

    /// Direct password value (for local development).
    /// WARNING: This stores the password in plaintext in the config file.
    /// Prefer password_env_var or password_file.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "password")]
    pub password_insecure: Option<String>,

    /// Path to file containing the password (for Docker secrets).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<String>,

    /// Environment variable containing the password.
    #[serde(default)]
    pub password_env_var: String,

    /// Path to a private key. Used instead of a password when set.
    #[serde(default)]
    pub ssh_key_path: String,

    pub data_directory: String,

    pub count_directory: String,

    #[serde(default)]
    pub host_key_policy: HostKeyPolicy,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts_file: Option<String>,

    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_ssh_program")]
    pub ssh_program: String,

    #[serde(default = "default_sftp_program")]
    pub sftp_program: String,
}

impl RemoteConfig {
    pub fn has_password_source(&self) -> bool {
        crate::secrets::has_secret_source(
            self.password_insecure.as_deref(),
            self.password_file.as_deref(),
            Some(self.password_env_var.as_str()),
        )
    }
}

fn default_ssh_port() -> u16 {
    22
}

fn default_remote_timeout() -> u64 {
    60
}

fn default_ssh_program() -> String {
    "ssh".to_string()
}

fn default_sftp_program() -> String {
    "sftp".to_string()
}

/// How the remote host key is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyPolicy {
    /// Accept and remember an unknown key, reject a changed one.
    TrustOnFirstUse,
    /// Refuse to connect unless the key is already known.
    #[default]
    RequireKnown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityConfig {
    /// Organizational domain the institutional id must belong to (`inst.edu`).
    pub required_domain: String,

    /// Group-membership value required for authorization.
    pub eligibility_marker: String,

    #[serde(default = "default_header_prefix")]
    pub header_prefix: String,

    #[serde(default = "default_barcode_attribute")]
    pub barcode_attribute: String,

    /// Fixed assertion used for local debug hosts only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_assertion_json: Option<String>,
}

fn default_header_prefix() -> String {
    "Shibboleth-".to_string()
}

fn default_barcode_attribute() -> String {
    "patronBarcode".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailConfig {
    pub from: String,
    pub reply_to: String,
    pub help_email: String,
    #[serde(default)]
    pub help_phone: String,
    #[serde(default = "default_sendmail_path")]
    pub sendmail_path: String,
}

fn default_sendmail_path() -> String {
    "/usr/sbin/sendmail".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupConfig {
    pub url_root: String,
    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,
}

fn default_lookup_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SsoConfig {
    pub login_url: String,
    pub logout_url_root: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_sessions")]
    pub max_sessions: u64,
}

fn default_idle_timeout() -> u64 {
    3600
}

fn default_max_sessions() -> u64 {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            max_sessions: default_max_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}
