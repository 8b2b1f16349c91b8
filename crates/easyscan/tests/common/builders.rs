//! Builders for test configuration and identity headers.

#![allow(dead_code)]

use std::collections::HashMap;

use serde_json::{json, Value};

use easyscan::config::{load_config_from_str, Config};

/// Builds a configuration document, validated through the real loader.
pub struct ConfigBuilder {
    doc: Value,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            doc: json!({
                "version": "1.0",
                "database": { "path": "/tmp/easyscan-test.db" },
                "staging": { "directory": "/tmp/easyscan-staging" },
                "remote": {
                    "host": "las.example.edu",
                    "username": "easyscan",
                    "passwordEnvVar": "EASYSCAN_TEST_REMOTE_PASSWORD",
                    "dataDirectory": "/remote/data",
                    "countDirectory": "/remote/count"
                },
                "identity": {
                    "requiredDomain": "inst.edu",
                    "eligibilityMarker": "ERES_OK"
                },
                "email": {
                    "from": "easyscan@inst.edu",
                    "replyTo": "scans@inst.edu",
                    "helpEmail": "help@inst.edu",
                    "helpPhone": "555-0100"
                },
                "lookup": { "urlRoot": "https://api.inst.edu/availability" },
                "sso": {
                    "loginUrl": "https://sso.inst.edu/login",
                    "logoutUrlRoot": "https://sso.inst.edu/logout"
                }
            }),
        }
    }

    pub fn staging_directory(mut self, path: &str) -> Self {
        self.doc["staging"]["directory"] = json!(path);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.doc["debug"] = json!(debug);
        self
    }

    pub fn test_assertion(mut self, assertion: Value) -> Self {
        self.doc["identity"]["testAssertionJson"] = json!(assertion.to_string());
        self
    }

    /// Sets any value by JSON pointer-like path segments.
    pub fn set(mut self, path: &[&str], value: Value) -> Self {
        let mut target = &mut self.doc;
        for segment in path {
            target = &mut target[*segment];
        }
        *target = value;
        self
    }

    pub fn remove(mut self, section: &str, key: &str) -> Self {
        if let Some(obj) = self.doc[section].as_object_mut() {
            obj.remove(key);
        }
        self
    }

    pub fn remove_section(mut self, section: &str) -> Self {
        if let Some(obj) = self.doc.as_object_mut() {
            obj.remove(section);
        }
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.doc).expect("Failed to serialize config")
    }

    pub fn build(self) -> Config {
        load_config_from_str(&self.to_json()).expect("Test config should be valid")
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity-provider headers for a patron.
#[derive(Clone)]
pub struct AssertionHeaders {
    values: Vec<(&'static str, String)>,
}

impl AssertionHeaders {
    /// Headers that pass evaluation against the default test config.
    pub fn valid() -> Self {
        Self {
            values: vec![
                ("eppn", "jdoe@inst.edu".to_string()),
                ("givenName", "Jane".to_string()),
                ("sn", "Doe".to_string()),
                ("mail", "JDOE@INST.EDU".to_string()),
                ("patronBarcode", "123456".to_string()),
                ("isMemberOf", "urn:groups:staff;urn:groups:ERES_OK".to_string()),
            ],
        }
    }

    pub fn with(mut self, attribute: &'static str, value: &str) -> Self {
        self.values.retain(|(name, _)| *name != attribute);
        self.values.push((attribute, value.to_string()));
        self
    }

    pub fn without(mut self, attribute: &'static str) -> Self {
        self.values.retain(|(name, _)| *name != attribute);
        self
    }

    pub fn build(&self) -> HashMap<String, String> {
        self.values
            .iter()
            .map(|(name, value)| (format!("Shibboleth-{}", name), value.clone()))
            .collect()
    }
}
