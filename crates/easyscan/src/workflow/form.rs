//! The citation form posted from the request page.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::WorkflowError;

pub const MAX_FIELD_LENGTH: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationForm {
    #[serde(default)]
    pub article_chapter_title: String,
    #[serde(default)]
    pub page_range: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for FormError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl CitationForm {
    /// Builds the form from posted fields. Values are trimmed; missing
    /// fields are empty.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let field = |name: &str| {
            fields
                .get(name)
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };
        Self {
            article_chapter_title: field("article_chapter_title"),
            page_range: field("page_range"),
        }
    }

    pub fn errors(&self) -> Vec<FormError> {
        let mut errors = Vec::new();

        if self.page_range.trim().is_empty() {
            errors.push(FormError {
                field: "page_range",
                message: "This field is required.".to_string(),
            });
        }

        for (field, value) in [
            ("article_chapter_title", &self.article_chapter_title),
            ("page_range", &self.page_range),
        ] {
            if value.chars().count() > MAX_FIELD_LENGTH {
                errors.push(FormError {
                    field,
                    message: format!(
                        "Ensure this value has at most {} characters.",
                        MAX_FIELD_LENGTH
                    ),
                });
            }
        }

        errors
    }

    pub fn validate(&self) -> Result<(), WorkflowError> {
        let errors = self.errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::Validation(errors))
        }
    }
}
