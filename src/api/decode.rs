//! Export response decoding.
//!
//! The export endpoint returns gzip-compressed newline-delimited JSON. The
//! stream is occasionally cut off mid-record, so lines that fail to parse are
//! counted and skipped rather than failing the whole export.

use std::io::Read;

use flate2::read::MultiGzDecoder;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AmplitudeError, Result};

/// Records decoded from one export response, in stream order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportBatch {
    pub records: Vec<Value>,
    /// Non-blank lines that were not a standalone JSON object
    pub skipped_lines: usize,
}

/// What the export tool hands back after client-side truncation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPage {
    pub total_records: usize,
    pub returned_records: usize,
    pub skipped_lines: usize,
    pub truncated: bool,
    pub records: Vec<Value>,
}

impl ExportBatch {
    /// Keep the first `limit` records. Everything was already downloaded and
    /// decompressed; this only bounds what is returned.
    pub fn into_page(mut self, limit: usize) -> ExportPage {
        let total_records = self.records.len();
        self.records.truncate(limit);
        ExportPage {
            total_records,
            returned_records: self.records.len(),
            skipped_lines: self.skipped_lines,
            truncated: total_records > limit,
            records: self.records,
        }
    }
}

/// Decompress a gzip body fully in memory and parse one JSON object per line.
pub fn decode_export(body: &[u8]) -> Result<ExportBatch> {
    if body.is_empty() {
        return Ok(ExportBatch::default());
    }

    let mut decompressed = Vec::new();
    MultiGzDecoder::new(body)
        .read_to_end(&mut decompressed)
        .map_err(|e| {
            AmplitudeError::decode("export_events", format!("gzip decompression failed: {}", e))
        })?;

    Ok(parse_lines(&decompressed))
}

/// Parse newline-delimited JSON, skipping blank and malformed lines.
pub fn parse_lines(text: &[u8]) -> ExportBatch {
    let mut batch = ExportBatch::default();

    for raw in text.split(|b| *b == b'\n') {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim(),
            Err(_) => {
                batch.skipped_lines += 1;
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(record @ Value::Object(_)) => batch.records.push(record),
            _ => batch.skipped_lines += 1,
        }
    }

    batch
}
