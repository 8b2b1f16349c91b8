use std::collections::HashMap;

/// What a handler needs to know about the inbound HTTP request. The host
/// web framework fills this in.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub session_id: String,
    /// `Host` header value, possibly with a port.
    pub host: String,
    pub secure: bool,
    /// Path plus query string, as received.
    pub full_path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub referrer: Option<String>,
}

impl RequestContext {
    pub fn new(session_id: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn with_full_path(mut self, full_path: impl Into<String>) -> Self {
        self.full_path = full_path.into();
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    /// Query parameter value, empty when absent.
    pub fn query_param(&self, name: &str) -> &str {
        self.query.get(name).map(String::as_str).unwrap_or("")
    }

    /// Host name without any port.
    pub fn host_name(&self) -> &str {
        if let Some(rest) = self.host.strip_prefix('[') {
            return rest.split(']').next().unwrap_or(rest);
        }
        match self.host.rsplit_once(':') {
            Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
            _ => &self.host,
        }
    }

    /// Loopback hosts used for local development.
    pub fn is_local(&self) -> bool {
        matches!(self.host_name(), "127.0.0.1" | "localhost" | "::1")
    }

    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Absolute URL for a path on this host, keeping the current scheme.
    pub fn absolute_url(&self, path: &str) -> String {
        format!("{}://{}{}", self.scheme(), self.host, path)
    }
}
