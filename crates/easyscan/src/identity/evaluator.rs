//! Acceptance rules for an identity assertion.

use super::{IdentityAssertion, UserInfo};
use crate::config::IdentityConfig;

/// Decides whether an asserted identity may place scan requests.
///
/// All three rules must hold:
/// - every attribute is present and non-blank
/// - the institutional id's domain is the required domain
/// - the group-membership value contains the eligibility marker
#[derive(Debug, Clone)]
pub struct IdentityEvaluator {
    required_domain: String,
    eligibility_marker: String,
}

impl IdentityEvaluator {
    pub fn new(required_domain: impl Into<String>, eligibility_marker: impl Into<String>) -> Self {
        let required_domain: String = required_domain.into();
        Self {
            required_domain: required_domain.trim_start_matches('@').to_ascii_lowercase(),
            eligibility_marker: eligibility_marker.into(),
        }
    }

    pub fn from_config(config: &IdentityConfig) -> Self {
        Self::new(&config.required_domain, &config.eligibility_marker)
    }

    pub fn evaluate(&self, assertion: &IdentityAssertion) -> bool {
        let valid = all_values_present(assertion)
            && self.domain_confirmed(assertion)
            && self.eligible(assertion);
        tracing::debug!(valid, "Evaluated identity assertion");
        valid
    }

    /// The patron identity for a valid assertion.
    pub fn authorize(&self, assertion: &IdentityAssertion) -> Option<UserInfo> {
        if !self.evaluate(assertion) {
            return None;
        }
        Some(UserInfo::new(
            format!(
                "{} {}",
                value(&assertion.firstname).trim(),
                value(&assertion.lastname).trim()
            ),
            value(&assertion.patron_barcode).trim(),
            value(&assertion.email).trim(),
        ))
    }

    fn domain_confirmed(&self, assertion: &IdentityAssertion) -> bool {
        value(&assertion.eppn)
            .trim()
            .rsplit_once('@')
            .is_some_and(|(local, domain)| {
                !local.is_empty() && domain.eq_ignore_ascii_case(&self.required_domain)
            })
    }

    fn eligible(&self, assertion: &IdentityAssertion) -> bool {
        value(&assertion.member_of).contains(&self.eligibility_marker)
    }
}

fn value(attribute: &Option<String>) -> &str {
    attribute.as_deref().unwrap_or("")
}

fn all_values_present(assertion: &IdentityAssertion) -> bool {
    [
        &assertion.eppn,
        &assertion.firstname,
        &assertion.lastname,
        &assertion.email,
        &assertion.patron_barcode,
        &assertion.member_of,
    ]
    .into_iter()
    .all(|attribute| !value(attribute).trim().is_empty())
}
