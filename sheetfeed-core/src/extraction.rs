//! Output of the extraction stage.

use serde::{Deserialize, Serialize};

use crate::record::TransactionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BadDate,
    BadAmount,
    MissingAmount,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::BadDate => "date could not be parsed",
            SkipReason::BadAmount => "amount could not be parsed",
            SkipReason::MissingAmount => "no amount on the row",
        }
    }
}

/// A candidate row that failed required-field parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedRow {
    pub page: u32,
    pub line: usize,
    pub text: String,
    pub reason: SkipReason,
}

/// Counters collected while scanning the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    pub pages: usize,
    /// Pages where a header line was recognized
    pub table_pages: usize,
    /// Pages parsed by the line heuristic
    pub fallback_pages: usize,
    /// Rows that reached field parsing
    pub candidates: usize,
    /// Lines dropped by the non-transaction filters
    pub filtered: usize,
    /// Wrapped description lines merged into the previous record
    pub continuations: usize,
    /// Pages beyond the configured page limit, never scanned
    pub ignored_pages: usize,
    /// Accepted rows whose value-date cell held text that is not a date
    pub unparsed_value_dates: usize,
}

/// Ordered records plus skipped-row diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub records: Vec<TransactionRecord>,
    pub skipped: Vec<SkippedRow>,
    pub stats: ExtractionStats,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when some candidate rows were dropped.
    pub fn is_partial(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Human-readable warning for a partial extraction.
    pub fn partial_warning(&self) -> Option<String> {
        if !self.is_partial() {
            return None;
        }
        Some(format!(
            "{} of {} candidate rows were skipped because required fields could not be parsed",
            self.skipped.len(),
            self.stats.candidates
        ))
    }

    /// Every condition the uploader should hear about, including the partial warning.
    pub fn warnings(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.stats.ignored_pages > 0 {
            out.push(format!(
                "Only the first {} pages were read; {} later pages were ignored because of the page limit",
                self.stats.pages, self.stats.ignored_pages
            ));
        }
        out.extend(self.partial_warning());
        if self.stats.unparsed_value_dates > 0 {
            out.push(format!(
                "{} rows had a value date that could not be parsed; their Value Date cell was left empty",
                self.stats.unparsed_value_dates
            ));
        }
        out
    }
}

/// Progress callback payload, emitted once per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageProgress {
    pub page: usize,
    pub total: usize,
}

impl PageProgress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.page * 100) / self.total).min(100) as u8
    }
}
