//! Non-transaction line filters (page furniture, totals, balances carried over).

use regex::{Regex, RegexBuilder};

use crate::normalize::collapse_ws;

#[derive(Debug, Clone)]
pub struct LineFilter {
    patterns: Vec<Regex>,
}

impl LineFilter {
    pub fn new(patterns: &[String]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| RegexBuilder::new(p).case_insensitive(true).build())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// True when the line matches any configured pattern.
    pub fn is_noise(&self, line: &str) -> bool {
        let line = collapse_ws(line);
        self.patterns.iter().any(|re| re.is_match(&line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetfeed_core::ExtractionConfig;

    fn default_filter() -> LineFilter {
        LineFilter::new(&ExtractionConfig::default().skip_patterns).unwrap()
    }

    #[test]
    fn test_default_patterns_catch_page_furniture() {
        let f = default_filter();
        assert!(f.is_noise("Page 2 of 7"));
        assert!(f.is_noise("   2 / 7 "));
        assert!(f.is_noise("01/01/2024   Opening Balance            1,000.00"));
        assert!(f.is_noise("Balance carried forward   95.50"));
        assert!(f.is_noise("TOTAL            4.50     2,000.00"));
        assert!(f.is_noise("Statement Period: 01/01/2024 - 31/01/2024"));
    }

    #[test]
    fn test_default_patterns_keep_transactions() {
        let f = default_filter();
        assert!(!f.is_noise("02/01/2024   Coffee   -4.50"));
        assert!(!f.is_noise("03/01/2024   Salary ACME Corp   2,000.00   2,095.50"));
        assert!(!f.is_noise("04/01/2024   Balance transfer fee   5.00"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        assert!(LineFilter::new(&["(unclosed".to_string()]).is_err());
    }
}
