use std::path::Path;

use crate::config::schema::{Config, HostKeyPolicy};
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        message: message.into(),
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(invalid(format!(
            "Unsupported config version: {}",
            config.version
        )));
    }

    let remote = &config.remote;
    if remote.ssh_key_path.is_empty() && !remote.has_password_source() {
        return Err(invalid(
            "remote credentials missing: configure sshKeyPath, password, passwordFile, or passwordEnvVar",
        ));
    }
    if remote.host.contains('@') {
        return Err(invalid(
            "remote.host must not contain userinfo; use remote.username",
        ));
    }
    if remote.host_key_policy == HostKeyPolicy::RequireKnown {
        if let Some(file) = &remote.known_hosts_file {
            if file.trim().is_empty() {
                return Err(invalid("remote.knownHostsFile must not be empty when set"));
            }
        }
    }

    let identity = &config.identity;
    if identity.required_domain.trim_start_matches('@').contains('@') {
        return Err(invalid(format!(
            "identity.requiredDomain '{}' is not a bare domain",
            identity.required_domain
        )));
    }
    if identity.eligibility_marker.trim().is_empty() {
        return Err(invalid("identity.eligibilityMarker must not be blank"));
    }
    if let Some(json) = &identity.test_assertion_json {
        let parsed: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| invalid(format!("identity.testAssertionJson is not valid JSON: {}", e)))?;
        if !parsed.is_object() {
            return Err(invalid("identity.testAssertionJson must be a JSON object"));
        }
    }

    let root = &config.lookup.url_root;
    if !(root.starts_with("http://") || root.starts_with("https://")) {
        return Err(invalid(format!(
            "lookup.urlRoot must be an http(s) URL, got '{}'",
            root
        )));
    }

    for (name, address) in [
        ("email.from", &config.email.from),
        ("email.replyTo", &config.email.reply_to),
    ] {
        if !address.contains('@') || address.contains('\n') || address.contains('\r') {
            return Err(invalid(format!("{} is not a valid address", name)));
        }
    }

    Ok(())
}
