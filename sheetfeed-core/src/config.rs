//! Statement format configuration.
//!
//! Real statements differ in date layout and number punctuation, so the accepted
//! variants are data rather than code.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// chrono formats tried in order; the first that parses wins.
    pub date_formats: Vec<String>,
    /// Year used for formats without one ("%d %b"). Rows are skipped when unset.
    pub default_year: Option<i32>,
    pub decimal_separator: char,
    pub thousands_separator: char,
    /// Regexes (case-insensitive) for lines that are never transactions.
    pub skip_patterns: Vec<String>,
    /// Upper bound on pages scanned; 0 means no limit.
    pub max_pages: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            date_formats: [
                "%Y-%m-%d",
                "%d/%m/%Y",
                "%d-%m-%Y",
                "%d.%m.%Y",
                "%d %b %Y",
                "%d-%b-%Y",
                "%d %B %Y",
                "%b %d, %Y",
                "%d/%m/%y",
                "%d-%b-%y",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_year: None,
            decimal_separator: '.',
            thousands_separator: ',',
            skip_patterns: [
                r"^page\s+\d+(\s+of\s+\d+)?$",
                r"^\d+\s*/\s*\d+$",
                r"\b(opening|closing|available|ledger)\s+balance\b",
                r"\bbalance\s+(brought|carried)\s+(forward|fwd)\b",
                r"^(sub\s*)?totals?\b",
                r"\btotal\s+(debits?|credits?|withdrawals?|deposits?)\b",
                r"\bstatement\s+(period|date|of\s+account)\b",
                r"^account\s+(number|no\.?|name)\b",
                r"\bcontinued\s+(on|from)\s+(next|previous)\s+page\b",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            max_pages: 0,
        }
    }
}

impl ExtractionConfig {
    /// Formats that carry no year component.
    pub fn is_yearless(format: &str) -> bool {
        !(format.contains("%Y") || format.contains("%y") || format.contains("%G"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg: ExtractionConfig = toml::from_str(
            r#"
date_formats = ["%m/%d/%Y"]
decimal_separator = ","
thousands_separator = "."
"#,
        )
        .unwrap();
        assert_eq!(cfg.date_formats, vec!["%m/%d/%Y".to_string()]);
        assert_eq!(cfg.decimal_separator, ',');
        assert!(!cfg.skip_patterns.is_empty());
        assert_eq!(cfg.max_pages, 0);
    }

    #[test]
    fn test_yearless_detection() {
        assert!(ExtractionConfig::is_yearless("%d %b"));
        assert!(ExtractionConfig::is_yearless("%m/%d"));
        assert!(!ExtractionConfig::is_yearless("%d/%m/%Y"));
    }
}
