//! In-process spreadsheet used by tests and `--dry-run`.

use sheetfeed_core::Destination;
use tokio::sync::Mutex;

use crate::sheets::{SheetsApi, SheetsError};

#[derive(Debug, Default)]
struct Workbook {
    /// Tabs in creation order.
    tabs: Vec<(String, Vec<Vec<String>>)>,
    append_calls: usize,
    reject_append_call: Option<usize>,
    unauthorized: bool,
}

impl Workbook {
    fn tab_mut(&mut self, title: &str) -> Option<&mut Vec<Vec<String>>> {
        self.tabs
            .iter_mut()
            .find(|(t, _)| t == title)
            .map(|(_, rows)| rows)
    }
}

#[derive(Debug, Default)]
pub struct MemorySheets {
    book: Mutex<Workbook>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing tab and its rows.
    pub fn with_tab(mut self, title: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        self.book.get_mut().tabs.push((title.into(), rows));
        self
    }

    /// Fail the `n`-th append call (0-based) as the service would on a bad batch.
    pub fn reject_append_call(mut self, n: usize) -> Self {
        self.book.get_mut().reject_append_call = Some(n);
        self
    }

    /// Refuse every call as unauthorized.
    pub fn unauthorized(mut self) -> Self {
        self.book.get_mut().unauthorized = true;
        self
    }

    pub async fn rows(&self, title: &str) -> Vec<Vec<String>> {
        let book = self.book.lock().await;
        book.tabs
            .iter()
            .find(|(t, _)| t == title)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }

    pub async fn append_calls(&self) -> usize {
        self.book.lock().await.append_calls
    }

    fn check_auth(book: &Workbook) -> Result<(), SheetsError> {
        if book.unauthorized {
            return Err(SheetsError::Unauthorized(
                "The caller does not have permission".to_string(),
            ));
        }
        Ok(())
    }
}

impl SheetsApi for MemorySheets {
    async fn tab_titles(&self, _dest: &Destination) -> Result<Vec<String>, SheetsError> {
        let book = self.book.lock().await;
        Self::check_auth(&book)?;
        Ok(book.tabs.iter().map(|(t, _)| t.clone()).collect())
    }

    async fn add_tab(&self, dest: &Destination) -> Result<(), SheetsError> {
        let mut book = self.book.lock().await;
        Self::check_auth(&book)?;
        if book.tab_mut(&dest.tab).is_some() {
            return Err(SheetsError::Rejected(format!(
                "A sheet with the name \"{}\" already exists",
                dest.tab
            )));
        }
        book.tabs.push((dest.tab.clone(), Vec::new()));
        Ok(())
    }

    async fn read_header(&self, dest: &Destination) -> Result<Vec<String>, SheetsError> {
        let mut book = self.book.lock().await;
        Self::check_auth(&book)?;
        let rows = book
            .tab_mut(&dest.tab)
            .ok_or_else(|| SheetsError::Rejected(format!("Unable to parse range: {}", dest.header_range())))?;
        Ok(rows.first().cloned().unwrap_or_default())
    }

    async fn append_rows(
        &self,
        dest: &Destination,
        rows: Vec<Vec<String>>,
    ) -> Result<usize, SheetsError> {
        let mut book = self.book.lock().await;
        Self::check_auth(&book)?;
        let call = book.append_calls;
        book.append_calls += 1;
        if book.reject_append_call == Some(call) {
            return Err(SheetsError::Rejected("Invalid values[0][0]".to_string()));
        }
        let tab = book
            .tab_mut(&dest.tab)
            .ok_or_else(|| SheetsError::Rejected(format!("Unable to parse range: {}", dest.tab_range())))?;
        let n = rows.len();
        tab.extend(rows);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> Destination {
        Destination::new("sheet-1", "Raw_Data")
    }

    #[tokio::test]
    async fn test_append_requires_tab() {
        let sheets = MemorySheets::new();
        let err = sheets
            .append_rows(&dest(), vec![vec!["a".into()]])
            .await
            .unwrap_err();
        assert!(matches!(err, SheetsError::Rejected(_)));

        sheets.add_tab(&dest()).await.unwrap();
        assert_eq!(sheets.append_rows(&dest(), vec![vec!["a".into()]]).await.unwrap(), 1);
        assert_eq!(sheets.rows("Raw_Data").await, vec![vec!["a".to_string()]]);
    }

    #[tokio::test]
    async fn test_rejected_call_counts() {
        let sheets = MemorySheets::new()
            .with_tab("Raw_Data", Vec::new())
            .reject_append_call(1);
        sheets.append_rows(&dest(), vec![vec!["1".into()]]).await.unwrap();
        assert!(sheets.append_rows(&dest(), vec![vec!["2".into()]]).await.is_err());
        assert_eq!(sheets.append_calls().await, 2);
        assert_eq!(sheets.rows("Raw_Data").await.len(), 1);
    }
}
