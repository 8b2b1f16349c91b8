//! Scan request repository. Rows are inserted once and never updated.

use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::record::{ItemFields, PatronFields, PreparedScanRequest, ScanRequestRecord};

/// Query filter for listing requests. Date bounds are inclusive.
#[derive(Debug, Default, Clone)]
pub struct RequestFilter {
    pub patron_barcode: Option<String>,
    pub item_barcode: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

pub(crate) fn format_timestamp<Tz: chrono::TimeZone>(ts: &DateTime<Tz>) -> String {
    ts.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub(crate) fn parse_timestamp(
    column: &'static str,
    value: &str,
) -> Result<DateTime<Local>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Local))
        .map_err(|e| DatabaseError::Corrupt {
            column,
            reason: e.to_string(),
        })
}

struct RequestRow {
    id: i64,
    item: ItemFields,
    patron_name: String,
    patron_barcode: String,
    patron_email: String,
    created_at: String,
    export_line: String,
}

impl RequestRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            item: ItemFields {
                title: row.get("item_title")?,
                barcode: row.get("item_barcode")?,
                callnumber: row.get("item_callnumber")?,
                volume_year: row.get("item_volume_year")?,
                chapter_title: row.get("item_chapter_title")?,
                page_range: row.get("item_page_range")?,
                source_url: row.get("item_source_url")?,
            },
            patron_name: row.get("patron_name")?,
            patron_barcode: row.get("patron_barcode")?,
            patron_email: row.get("patron_email")?,
            created_at: row.get("created_at")?,
            export_line: row.get("export_line")?,
        })
    }

    fn into_record(self) -> Result<ScanRequestRecord, DatabaseError> {
        let created_at = parse_timestamp("created_at", &self.created_at)?;
        Ok(ScanRequestRecord::restore(
            self.id,
            self.item,
            PatronFields::restore(&self.patron_name, &self.patron_barcode, &self.patron_email),
            created_at,
            self.export_line,
        ))
    }
}

/// Stores a prepared request and returns it with its assigned id.
pub fn insert(
    db: &Database,
    prepared: PreparedScanRequest,
) -> Result<ScanRequestRecord, DatabaseError> {
    let id = db.with_conn(|conn| {
        let item = prepared.request().item();
        let patron = prepared.request().patron();
        conn.execute(
            "INSERT INTO scan_requests (item_title, item_barcode, item_callnumber,
             item_volume_year, item_chapter_title, item_page_range, item_source_url,
             patron_name, patron_barcode, patron_email, created_at, export_line)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                item.title,
                item.barcode,
                item.callnumber,
                item.volume_year,
                item.chapter_title,
                item.page_range,
                item.source_url,
                patron.name(),
                patron.barcode(),
                patron.email(),
                format_timestamp(&prepared.created_at()),
                prepared.export_line(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    })?;

    Ok(prepared.into_record(id))
}

/// Finds a request by id.
pub fn find_by_id(db: &Database, id: i64) -> Result<Option<ScanRequestRecord>, DatabaseError> {
    let row = db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM scan_requests WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], RequestRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })?;
    row.map(RequestRow::into_record).transpose()
}

/// Most recent requests first.
pub fn recent(db: &Database, limit: u64) -> Result<Vec<ScanRequestRecord>, DatabaseError> {
    let (records, _) = query(
        db,
        &RequestFilter {
            limit: Some(limit),
            ..Default::default()
        },
    )?;
    Ok(records)
}

/// Counts requests created within `[from, to]`.
pub fn count_between(
    db: &Database,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM scan_requests WHERE created_at >= ?1 AND created_at <= ?2",
            params![format_timestamp(&from), format_timestamp(&to)],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Queries requests with filters, returning (records, total_count).
pub fn query(
    db: &Database,
    filter: &RequestFilter,
) -> Result<(Vec<ScanRequestRecord>, u64), DatabaseError> {
    let (rows, total) = db.with_conn(|conn| {
        let mut conditions = Vec::new();
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

        if let Some(ref patron_barcode) = filter.patron_barcode {
            conditions.push(format!("patron_barcode = ?{}", param_values.len() + 1));
            param_values.push(Box::new(patron_barcode.clone()));
        }
        if let Some(ref item_barcode) = filter.item_barcode {
            conditions.push(format!("item_barcode = ?{}", param_values.len() + 1));
            param_values.push(Box::new(item_barcode.clone()));
        }
        if let Some(ref from) = filter.from {
            conditions.push(format!("created_at >= ?{}", param_values.len() + 1));
            param_values.push(Box::new(format_timestamp(from)));
        }
        if let Some(ref to) = filter.to {
            conditions.push(format!("created_at <= ?{}", param_values.len() + 1));
            param_values.push(Box::new(format_timestamp(to)));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM scan_requests {}", where_clause);
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

        let limit = filter.limit.unwrap_or(100) as i64;
        let offset = filter.offset.unwrap_or(0) as i64;
        param_values.push(Box::new(limit));
        param_values.push(Box::new(offset));
        let query_sql = format!(
            "SELECT * FROM scan_requests {} ORDER BY created_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            where_clause,
            param_values.len() - 1,
            param_values.len()
        );

        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query_sql)?;
        let rows: Vec<RequestRow> = stmt
            .query_map(params_ref.as_slice(), RequestRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((rows, total))
    })?;

    let records = rows
        .into_iter()
        .map(RequestRow::into_record)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((records, total))
}
