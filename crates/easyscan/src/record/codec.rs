//! Flat-file line format consumed by the remote fulfillment system.
//!
//! One line, nine fields, every field double-quoted:
//!
//! ```text
//! "item_id_not_applicable","<item barcode>","ED","QS","<patron name>","<patron barcode>",
//! "<title>","<Www Mmm DD YYYY>","eml, <email> -- artcl-chptr-ttl, <chapter> -- pg-rng, <pages>"
//! ```
//!
//! (wrapped here for width; the encoded value has no line break).

use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;

use super::NewScanRequest;

pub const ITEM_ID_PLACEHOLDER: &str = "item_id_not_applicable";
pub const ROUTING_DELIVERY: &str = "ED";
pub const ROUTING_SERVICE: &str = "QS";
pub const FIELD_COUNT: usize = 9;

/// Marker substituted for characters the line format cannot carry.
pub const REPLACEMENT: char = '?';

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode export line: {0}")]
    Encoding(String),

    #[error("CSV writer error: {0}")]
    Csv(#[from] csv::Error),
}

/// Encodes a request into its export line.
pub fn encode(request: &NewScanRequest, created_on: NaiveDate) -> Result<String, CodecError> {
    let item = request.item();
    let patron = request.patron();

    let notes = format!(
        "eml, {} -- artcl-chptr-ttl, {} -- pg-rng, {}",
        transcode(patron.email()),
        transcode(&item.chapter_title),
        transcode(&item.page_range),
    );

    let fields = [
        ITEM_ID_PLACEHOLDER.to_string(),
        transcode(&item.barcode),
        ROUTING_DELIVERY.to_string(),
        ROUTING_SERVICE.to_string(),
        transcode(patron.name()),
        transcode(patron.barcode()),
        transcode(&item.title),
        las_date(created_on),
        notes,
    ];

    encode_fields(&fields)
}

/// Writes already-transcoded fields as one quote-all CSV line, without the
/// trailing line terminator.
pub fn encode_fields(fields: &[String]) -> Result<String, CodecError> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(fields)?;

    let bytes = writer
        .into_inner()
        .map_err(|e| CodecError::Encoding(e.to_string()))?;
    let line = String::from_utf8(bytes).map_err(|e| CodecError::Encoding(e.to_string()))?;

    Ok(line.trim_end_matches('\n').to_string())
}

/// Total text conversion: CR and LF, which would split the record into two
/// lines on the remote side, become [`REPLACEMENT`]. Everything else passes
/// through. Never fails.
pub fn transcode(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\r' | '\n') { REPLACEMENT } else { c })
        .collect()
}

/// Date in the fulfillment system's format, e.g. `Tue Mar 05 2024`.
pub fn las_date(date: NaiveDate) -> String {
    date.format("%a %b %d %Y").to_string()
}
