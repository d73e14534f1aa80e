//! CSV decoding into a [`TabularDataset`].
//!
//! Rules:
//!
//! - The first row is the header and names the columns.
//! - Every data row must have the same number of fields as the header.
//! - The whole input must be valid UTF-8 (a leading BOM is ignored).
//! - Empty header cells become `Unnamed: {index}`; repeated names get a
//!   `.1`, `.2`, … suffix so the column list stays unique.
//!
//! Cell values are validated for encoding and width, then discarded.

use std::collections::HashSet;

use thiserror::Error;

use crate::models::TabularDataset;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Why a byte buffer could not be read as a table.
#[derive(Debug, Error)]
pub enum TabularError {
    /// Input was empty or its header row held no fields.
    #[error("No columns to parse from file")]
    NoColumns,

    /// Malformed row, mismatched width, or invalid UTF-8.
    #[error("{0}")]
    Csv(#[from] csv::Error),
}

/// Parse comma-delimited bytes with a header row.
pub fn parse_csv(bytes: &[u8]) -> Result<TabularDataset, TabularError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(TabularError::NoColumns);
    }
    let columns = unique_column_names(&headers);

    // StringRecord validates UTF-8; the reader enforces equal widths.
    let mut record = csv::StringRecord::new();
    let mut row_count = 0usize;
    while rdr.read_record(&mut record)? {
        row_count += 1;
    }

    Ok(TabularDataset { columns, row_count })
}

fn unique_column_names(headers: &csv::StringRecord) -> Vec<String> {
    let named: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            if name.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name.to_string()
            }
        })
        .collect();

    let reserved: HashSet<&str> = named.iter().map(|s| s.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::with_capacity(named.len());
    let mut columns = Vec::with_capacity(named.len());

    for name in &named {
        let mut candidate = name.clone();
        let mut suffix = 0usize;
        while seen.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}.{}", name, suffix);
            if reserved.contains(candidate.as_str()) && !seen.contains(&candidate) {
                // Taken by a later header; keep looking.
                candidate = name.clone();
            }
        }
        seen.insert(candidate.clone());
        columns.push(candidate);
    }

    columns
}
