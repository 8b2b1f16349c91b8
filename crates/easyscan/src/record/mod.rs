//! Scan request records.
//!
//! A record is created once and never edited. Its export line is computed
//! from the other fields when the record is prepared and stored alongside
//! them, so the line shipped to the remote system is always the one that
//! matched the record at creation time.

pub mod codec;

use chrono::{DateTime, Local, Timelike};
use serde::Serialize;

use crate::identity::UserInfo;

pub use codec::CodecError;

/// Item description as entered or looked up. All fields may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemFields {
    pub title: String,
    pub barcode: String,
    pub callnumber: String,
    pub volume_year: String,
    pub chapter_title: String,
    pub page_range: String,
    pub source_url: String,
}

/// Patron identity copied from an authorized identity assertion.
///
/// There is no public constructor taking raw strings: the only way in from
/// outside the crate is `From<&UserInfo>`, and `UserInfo` only comes out
/// of a successful authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatronFields {
    name: String,
    barcode: String,
    email: String,
}

impl PatronFields {
    /// Rebuilds patron fields from storage.
    pub(crate) fn restore(name: &str, barcode: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            barcode: barcode.to_string(),
            email: email.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl From<&UserInfo> for PatronFields {
    fn from(user: &UserInfo) -> Self {
        Self {
            name: user.name().to_string(),
            barcode: user.patron_barcode().to_string(),
            email: user.email().to_string(),
        }
    }
}

/// A request that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewScanRequest {
    item: ItemFields,
    patron: PatronFields,
}

impl NewScanRequest {
    pub fn new(item: ItemFields, patron: PatronFields) -> Self {
        Self { item, patron }
    }

    pub fn item(&self) -> &ItemFields {
        &self.item
    }

    pub fn patron(&self) -> &PatronFields {
        &self.patron
    }

    /// Fixes the creation time (second precision) and computes the export line.
    pub fn prepare(self, now: DateTime<Local>) -> Result<PreparedScanRequest, CodecError> {
        let created_at = now.with_nanosecond(0).unwrap_or(now);
        let export_line = codec::encode(&self, created_at.date_naive())?;
        Ok(PreparedScanRequest {
            request: self,
            created_at,
            export_line,
        })
    }
}

/// A request with its creation timestamp and export line fixed, ready to insert.
#[derive(Debug, Clone)]
pub struct PreparedScanRequest {
    request: NewScanRequest,
    created_at: DateTime<Local>,
    export_line: String,
}

impl PreparedScanRequest {
    pub fn request(&self) -> &NewScanRequest {
        &self.request
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn export_line(&self) -> &str {
        &self.export_line
    }

    /// Attaches the store-assigned id.
    pub(crate) fn into_record(self, id: i64) -> ScanRequestRecord {
        ScanRequestRecord {
            id,
            item: self.request.item,
            patron: self.request.patron,
            created_at: self.created_at,
            export_line: self.export_line,
        }
    }
}

/// A stored scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRequestRecord {
    id: i64,
    item: ItemFields,
    patron: PatronFields,
    created_at: DateTime<Local>,
    export_line: String,
}

impl ScanRequestRecord {
    pub(crate) fn restore(
        id: i64,
        item: ItemFields,
        patron: PatronFields,
        created_at: DateTime<Local>,
        export_line: String,
    ) -> Self {
        Self {
            id,
            item,
            patron,
            created_at,
            export_line,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn item(&self) -> &ItemFields {
        &self.item
    }

    pub fn patron(&self) -> &PatronFields {
        &self.patron
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn export_line(&self) -> &str {
        &self.export_line
    }
}

impl std::fmt::Display for ScanRequestRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "id: {} || title: {}", self.id, self.item.title)
    }
}
