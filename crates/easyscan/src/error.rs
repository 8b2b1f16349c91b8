use std::path::PathBuf;
use thiserror::Error;

pub use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum EasyScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Encoding error: {0}")]
    Codec(#[from] crate::record::CodecError),

    #[error("Staging error: {0}")]
    Staging(#[from] crate::transfer::StagingError),

    #[error("Handoff error: {0}")]
    Handoff(#[from] crate::transfer::HandoffError),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] crate::transfer::DispatchError),

    #[error("Title lookup error: {0}")]
    Lookup(#[from] crate::lookup::LookupError),

    #[error("Notification error: {0}")]
    Notify(#[from] crate::notify::NotifyError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] crate::workflow::WorkflowError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),

    #[error("Logging setup failed: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

pub type Result<T> = std::result::Result<T, EasyScanError>;
