//! Helpers for sanitizing data before it enters tracing span attributes.
//!
//! Patron identifiers are personal data. Spans and log lines carry only the
//! redacted forms produced here, enough to correlate a support ticket with a
//! log entry without putting addresses or library card numbers in the logs.

use std::path::Path;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Masks the local part of an email address, keeping its first character.
///
/// - `jdoe@inst.edu` → `j***@inst.edu`
/// - `not-an-address` → `***`
pub fn redact_email(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((local, domain)) if !local.is_empty() => {
            let first: String = local.chars().take(1).collect();
            format!("{}***@{}", first, domain)
        }
        _ => "***".to_string(),
    }
}

/// Keeps the last four characters of a barcode.
///
/// - `21236009876543` → `***6543`
/// - `123` → `***`
pub fn redact_barcode(barcode: &str) -> String {
    let chars: Vec<char> = barcode.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{}", tail)
}

/// Strips any userinfo from a host specification.
///
/// - `user:pw@las.inst.edu` → `las.inst.edu`
/// - `las.inst.edu` → `las.inst.edu`
pub fn redact_host(host: &str) -> String {
    match host.rsplit_once('@') {
        Some((_, bare)) => bare.to_string(),
        None => host.to_string(),
    }
}

/// Shortens a session id for log correlation.
pub fn short_session_id(session_id: &str) -> String {
    session_id.chars().take(8).collect()
}
