//! Title lookup against the catalog availability service.
//!
//! `GET <root>/bib/<bibnum>` returns JSON with the title at
//! `response.backend_response[0].title`. Callers treat every failure as
//! "no title"; the error value exists so that decision is made explicitly.

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::config::LookupConfig;

pub const BIB_ID_LENGTH: usize = 8;

const TITLE_POINTER: &str = "/response/backend_response/0/title";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Invalid bibliographic id '{0}'")]
    InvalidId(String),

    #[error("Title service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Title service returned status {0}")]
    Status(u16),

    #[error("Unexpected title service response: {0}")]
    Shape(String),
}

/// Anything that can resolve a bibliographic id to a title.
#[async_trait::async_trait]
pub trait TitleSource: Send + Sync {
    async fn title(&self, bibnum: &str) -> Result<String, LookupError>;
}

/// True for ids the catalog can resolve: exactly eight ASCII alphanumerics.
pub fn is_bib_id(bibnum: &str) -> bool {
    bibnum.len() == BIB_ID_LENGTH && bibnum.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Pulls the title out of a service response.
pub fn extract_title(body: &serde_json::Value) -> Result<String, LookupError> {
    body.pointer(TITLE_POINTER)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| LookupError::Shape(format!("no string at {}", TITLE_POINTER)))
}

pub struct TitleLookup {
    client: Client,
    url_root: String,
}

impl TitleLookup {
    pub fn new(config: &LookupConfig) -> Result<Self, LookupError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url_root: config.url_root.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, bibnum: &str) -> String {
        format!("{}/bib/{}", self.url_root, bibnum)
    }
}

#[async_trait::async_trait]
impl TitleSource for TitleLookup {
    #[tracing::instrument(skip(self))]
    async fn title(&self, bibnum: &str) -> Result<String, LookupError> {
        if !is_bib_id(bibnum) {
            return Err(LookupError::InvalidId(bibnum.to_string()));
        }

        let response = self.client.get(self.url_for(bibnum)).send().await?;
        if !response.status().is_success() {
            return Err(LookupError::Status(response.status().as_u16()));
        }

        let body: serde_json::Value = response.json().await?;
        extract_title(&body)
    }
}
