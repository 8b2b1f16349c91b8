//! Transfer attempt log.
//!
//! Each dispatch of a record (first send or operator resend) appends one
//! row. The scan request row itself is never touched.

use chrono::{DateTime, Local};
use rusqlite::{params, Row};
use serde::Serialize;

use super::request_repo::{format_timestamp, parse_timestamp};
use super::{Database, DatabaseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferOutcome {
    Sent,
    Failed,
}

impl TransferOutcome {
    fn as_str(self) -> &'static str {
        match self {
            TransferOutcome::Sent => "sent",
            TransferOutcome::Failed => "failed",
        }
    }

    fn parse(value: &str) -> Result<Self, DatabaseError> {
        match value {
            "sent" => Ok(TransferOutcome::Sent),
            "failed" => Ok(TransferOutcome::Failed),
            other => Err(DatabaseError::Corrupt {
                column: "outcome",
                reason: format!("unknown outcome '{}'", other),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferAttempt {
    pub id: i64,
    pub request_id: i64,
    pub attempted_at: DateTime<Local>,
    pub staged_stem: Option<String>,
    pub outcome: TransferOutcome,
    pub detail: Option<String>,
}

struct AttemptRow {
    id: i64,
    request_id: i64,
    attempted_at: String,
    staged_stem: Option<String>,
    outcome: String,
    detail: Option<String>,
}

impl AttemptRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            request_id: row.get("request_id")?,
            attempted_at: row.get("attempted_at")?,
            staged_stem: row.get("staged_stem")?,
            outcome: row.get("outcome")?,
            detail: row.get("detail")?,
        })
    }

    fn into_attempt(self) -> Result<TransferAttempt, DatabaseError> {
        Ok(TransferAttempt {
            id: self.id,
            request_id: self.request_id,
            attempted_at: parse_timestamp("attempted_at", &self.attempted_at)?,
            staged_stem: self.staged_stem,
            outcome: TransferOutcome::parse(&self.outcome)?,
            detail: self.detail,
        })
    }
}

/// Appends an attempt for `request_id`.
pub fn insert_attempt(
    db: &Database,
    request_id: i64,
    attempted_at: DateTime<Local>,
    staged_stem: Option<&str>,
    outcome: TransferOutcome,
    detail: Option<&str>,
) -> Result<i64, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO transfer_attempts (request_id, attempted_at, staged_stem, outcome, detail)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request_id,
                format_timestamp(&attempted_at),
                staged_stem,
                outcome.as_str(),
                detail,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })
}

/// All attempts for one request, oldest first.
pub fn attempts_for(db: &Database, request_id: i64) -> Result<Vec<TransferAttempt>, DatabaseError> {
    let rows = db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM transfer_attempts WHERE request_id = ?1 ORDER BY attempted_at, id",
        )?;
        let rows = stmt
            .query_map(params![request_id], AttemptRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    rows.into_iter().map(AttemptRow::into_attempt).collect()
}

/// Number of requests whose latest attempt failed.
pub fn count_unsent(db: &Database) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM transfer_attempts t
             WHERE t.outcome = 'failed'
               AND t.id = (SELECT MAX(id) FROM transfer_attempts WHERE request_id = t.request_id)",
            [],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
