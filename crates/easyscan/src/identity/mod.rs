//! Identity assertion handling.

pub mod assertion;
pub mod evaluator;

use serde::Serialize;

pub use assertion::IdentityAssertion;
pub use evaluator::IdentityEvaluator;

/// Patron identity established by a successful evaluation.
///
/// Only [`IdentityEvaluator::authorize`] creates one. The email is stored
/// lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    name: String,
    patron_barcode: String,
    email: String,
}

impl UserInfo {
    pub(crate) fn new(
        name: impl Into<String>,
        patron_barcode: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        let email: String = email.into();
        Self {
            name: name.into(),
            patron_barcode: patron_barcode.into(),
            email: email.to_lowercase(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn patron_barcode(&self) -> &str {
        &self.patron_barcode
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}
