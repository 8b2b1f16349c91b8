use thiserror::Error;

use super::form::FormError;
use crate::db::DatabaseError;
use crate::record::CodecError;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Invalid form submission: {}", join_errors(.0))]
    Validation(Vec<FormError>),

    #[error("Failed to encode scan request: {0}")]
    Codec(#[from] CodecError),

    #[error("Failed to store scan request: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

fn join_errors(errors: &[FormError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
