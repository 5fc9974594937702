//! The spreadsheet operations the upload stage needs.

use std::future::Future;

use sheetfeed_core::Destination;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SheetsError {
    /// The service refused the credential or token.
    #[error("not authorized: {0}")]
    Unauthorized(String),
    /// The request reached the service and was refused.
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("transport: {0}")]
    Transport(String),
}

/// Minimal spreadsheet surface: list tabs, add a tab, read row 1, append rows.
///
/// Implementations never clear or overwrite existing cells.
pub trait SheetsApi: Send + Sync {
    fn tab_titles(
        &self,
        dest: &Destination,
    ) -> impl Future<Output = Result<Vec<String>, SheetsError>> + Send;

    fn add_tab(
        &self,
        dest: &Destination,
    ) -> impl Future<Output = Result<(), SheetsError>> + Send;

    /// Row 1 of the destination tab; empty when the tab has no rows.
    fn read_header(
        &self,
        dest: &Destination,
    ) -> impl Future<Output = Result<Vec<String>, SheetsError>> + Send;

    /// Append rows after the last non-empty row. Returns the number of rows written.
    fn append_rows(
        &self,
        dest: &Destination,
        rows: Vec<Vec<String>>,
    ) -> impl Future<Output = Result<usize, SheetsError>> + Send;
}
