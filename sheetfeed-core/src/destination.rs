//! Where extracted rows are appended.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TAB: &str = "Raw_Data";

/// Target spreadsheet and tab. Static configuration, never derived from the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub spreadsheet_id: String,
    #[serde(default = "default_tab")]
    pub tab: String,
}

fn default_tab() -> String {
    DEFAULT_TAB.to_string()
}

impl Destination {
    pub fn new(spreadsheet_id: impl Into<String>, tab: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            tab: tab.into(),
        }
    }

    /// A1 range covering the whole tab, quoted so names with spaces work.
    pub fn tab_range(&self) -> String {
        format!("'{}'", self.quoted_tab())
    }

    /// A1 range of the header row.
    pub fn header_range(&self) -> String {
        format!("'{}'!1:1", self.quoted_tab())
    }

    /// Accept either a bare id or a full `.../d/<id>/edit` sheet URL.
    pub fn normalize_id(raw: &str) -> String {
        let raw = raw.trim();
        match raw.split_once("/d/") {
            Some((_, rest)) => rest.split('/').next().unwrap_or(rest).to_string(),
            None => raw.to_string(),
        }
    }

    fn quoted_tab(&self) -> String {
        self.tab.replace('\'', "''")
    }
}
