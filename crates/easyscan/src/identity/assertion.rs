//! Identity assertions supplied by the authentication layer in front of the app.

use std::collections::HashMap;

use serde::Deserialize;

use crate::config::IdentityConfig;

/// Attributes vouched for by the identity provider. A missing attribute is
/// `None`; whether it is acceptable is decided by the evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IdentityAssertion {
    #[serde(default)]
    pub eppn: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub patron_barcode: Option<String>,
    #[serde(default)]
    pub member_of: Option<String>,
}

fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

impl IdentityAssertion {
    /// Reads the assertion from trusted request headers.
    ///
    /// Returns `None` when the institutional-id header is absent, which means
    /// the request did not pass through the identity provider at all.
    pub fn from_headers(headers: &HashMap<String, String>, config: &IdentityConfig) -> Option<Self> {
        let prefix = &config.header_prefix;
        let get = |attribute: &str| header(headers, &format!("{}{}", prefix, attribute)).map(str::to_string);

        let eppn = get("eppn")?;
        Some(Self {
            eppn: Some(eppn),
            firstname: get("givenName"),
            lastname: get("sn"),
            email: get("mail"),
            patron_barcode: get(&config.barcode_attribute),
            member_of: get("isMemberOf"),
        })
    }

    /// Parses the fixed assertion used on local development hosts.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Header assertion if present, otherwise the configured test assertion
    /// when `allow_test_assertion` is set. Anything else yields an empty
    /// assertion, which never evaluates as valid.
    pub fn extract(
        headers: &HashMap<String, String>,
        config: &IdentityConfig,
        allow_test_assertion: bool,
    ) -> Self {
        if let Some(assertion) = Self::from_headers(headers, config) {
            return assertion;
        }

        if allow_test_assertion {
            if let Some(json) = config.test_assertion_json.as_deref() {
                match Self::from_json(json) {
                    Ok(assertion) => {
                        tracing::debug!("Using configured test identity assertion");
                        return assertion;
                    }
                    Err(e) => tracing::warn!(error = %e, "Test identity assertion is not valid JSON"),
                }
            }
        }

        Self::default()
    }
}
