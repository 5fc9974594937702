//! Append extracted records to the destination tab.

use serde::Serialize;
use sheetfeed_core::{header_row, Destination, StageError, TransactionRecord, SHEET_COLUMNS};

use crate::sheets::{SheetsApi, SheetsError};

/// Largest text a single Sheets cell accepts.
pub const MAX_CELL_CHARS: usize = 50_000;
pub const DEFAULT_BATCH_ROWS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub batch_rows: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub rows_appended: usize,
    pub batches: usize,
    pub tab_created: bool,
    pub header_written: bool,
    /// Row 1 held something other than the expected column names.
    pub header_mismatch: bool,
}

/// Append `records` in order, beneath a single header row.
///
/// Existing rows are never cleared or rewritten. A rejected batch stops the
/// upload; the error reports the record range and how many rows were committed.
pub async fn upload_records<S: SheetsApi>(
    sheets: &S,
    dest: &Destination,
    records: &[TransactionRecord],
    opts: &UploadOptions,
) -> Result<UploadReport, StageError> {
    let mut report = UploadReport::default();
    if records.is_empty() {
        return Ok(report);
    }

    let rows: Vec<Vec<String>> = records.iter().map(TransactionRecord::to_row).collect();
    validate_rows(&rows)?;

    let whole = |e: SheetsError| rejected(e, 0, rows.len() - 1, 0);

    let titles = sheets.tab_titles(dest).await.map_err(whole)?;
    if !titles.iter().any(|t| t == &dest.tab) {
        tracing::info!(tab = %dest.tab, "destination tab missing, creating it");
        sheets.add_tab(dest).await.map_err(whole)?;
        report.tab_created = true;
    }

    let expected = header_row();
    let current = sheets.read_header(dest).await.map_err(whole)?;
    if current.iter().all(|c| c.trim().is_empty()) {
        sheets.append_rows(dest, vec![expected]).await.map_err(whole)?;
        report.header_written = true;
    } else if !header_matches(&current, &expected) {
        tracing::warn!(
            tab = %dest.tab,
            found = ?current,
            "row 1 differs from the expected columns; appending below it anyway"
        );
        report.header_mismatch = true;
    }

    let batch_rows = opts.batch_rows.max(1);
    for (b, chunk) in rows.chunks(batch_rows).enumerate() {
        let first = b * batch_rows;
        let last = first + chunk.len() - 1;
        let appended = report.rows_appended;

        let written = sheets
            .append_rows(dest, chunk.to_vec())
            .await
            .map_err(|e| {
                tracing::warn!(first, last, rows_appended = appended, error = %e, "batch rejected");
                rejected(e, first, last, appended)
            })?;
        if written != chunk.len() {
            tracing::warn!(sent = chunk.len(), written, "row count mismatch in append response");
        }

        report.rows_appended += chunk.len();
        report.batches += 1;
        tracing::debug!(batch = b, rows = chunk.len(), "batch appended");
    }

    tracing::info!(
        tab = %dest.tab,
        rows = report.rows_appended,
        batches = report.batches,
        "upload finished"
    );
    Ok(report)
}

fn validate_rows(rows: &[Vec<String>]) -> Result<(), StageError> {
    for (i, row) in rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            if len > MAX_CELL_CHARS {
                let column = SHEET_COLUMNS.get(col).copied().unwrap_or("?");
                return Err(StageError::UploadRejected {
                    first_index: i,
                    last_index: i,
                    rows_appended: 0,
                    detail: format!(
                        "{column} is {len} characters, above the {MAX_CELL_CHARS} cell limit"
                    ),
                });
            }
        }
    }
    Ok(())
}

fn header_matches(current: &[String], expected: &[String]) -> bool {
    let len = current
        .iter()
        .rposition(|c| !c.trim().is_empty())
        .map_or(0, |i| i + 1);
    len == expected.len()
        && current[..len]
            .iter()
            .zip(expected)
            .all(|(a, b)| a.trim().eq_ignore_ascii_case(b))
}

fn rejected(
    err: SheetsError,
    first_index: usize,
    last_index: usize,
    rows_appended: usize,
) -> StageError {
    match err {
        SheetsError::Unauthorized(detail) => StageError::AuthenticationFailure { detail },
        SheetsError::Rejected(detail) | SheetsError::Transport(detail) => StageError::UploadRejected {
            first_index,
            last_index,
            rows_appended,
            detail,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_header_match_ignores_case_and_trailing_blanks() {
        let mut current = header_row();
        current[0] = "posting date".into();
        current.push(String::new());
        assert!(header_matches(&current, &header_row()));
        assert!(!header_matches(&header(&["Date", "Amount"]), &header_row()));
    }

    #[test]
    fn test_oversized_cell_is_rejected_before_sending() {
        let mut rows = vec![vec!["ok".to_string()]; 3];
        rows[2] = vec![
            "2024-01-02".into(),
            String::new(),
            String::new(),
            String::new(),
            "x".repeat(MAX_CELL_CHARS + 1),
        ];
        match validate_rows(&rows) {
            Err(StageError::UploadRejected {
                first_index,
                rows_appended,
                detail,
                ..
            }) => {
                assert_eq!(first_index, 2);
                assert_eq!(rows_appended, 0);
                assert!(detail.starts_with("Description"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_unauthorized_maps_to_authentication_failure() {
        let e = rejected(SheetsError::Unauthorized("invalid_grant".into()), 0, 4, 0);
        assert_eq!(e.kind(), "authentication_failure");
    }
}
