//! Date and amount coercion driven by [`ExtractionConfig`].

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use sheetfeed_core::ExtractionConfig;
use std::str::FromStr;

const CURRENCY_PREFIXES: [&str; 11] = [
    "USD", "EUR", "GBP", "INR", "RS.", "RS", "$", "€", "£", "¥", "₹",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

/// An amount as printed: magnitude plus whatever sign marker the statement used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedAmount {
    pub magnitude: Decimal,
    /// `None` when the cell carried no sign, parentheses or CR/DR label.
    pub sign: Option<Sign>,
    pub fraction_digits: usize,
}

impl ParsedAmount {
    /// Signed value, using `default` when the statement printed no marker.
    pub fn signed_or(&self, default: Sign) -> Decimal {
        match self.sign.unwrap_or(default) {
            Sign::Positive => self.magnitude,
            Sign::Negative => -self.magnitude,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DateParser {
    formats: Vec<String>,
    default_year: Option<i32>,
}

impl DateParser {
    pub fn new(cfg: &ExtractionConfig) -> Self {
        Self {
            formats: cfg.date_formats.clone(),
            default_year: cfg.default_year,
        }
    }

    /// Try each configured format in order; the first plausible date wins.
    pub fn parse(&self, raw: &str) -> Option<NaiveDate> {
        let s = collapse_ws(raw.trim().trim_end_matches(','));
        if s.is_empty() {
            return None;
        }

        for fmt in &self.formats {
            let parsed = if ExtractionConfig::is_yearless(fmt) {
                let Some(year) = self.default_year else {
                    continue;
                };
                NaiveDate::parse_from_str(&format!("{s} {year}"), &format!("{fmt} %Y"))
            } else {
                NaiveDate::parse_from_str(&s, fmt)
            };

            // `%Y` happily reads "24" as year 24.
            if let Ok(d) = parsed {
                if d.year() >= 1900 {
                    return Some(d);
                }
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AmountParser {
    decimal: char,
    thousands: char,
}

impl AmountParser {
    pub fn new(cfg: &ExtractionConfig) -> Self {
        Self {
            decimal: cfg.decimal_separator,
            thousands: cfg.thousands_separator,
        }
    }

    /// Parse one amount cell such as `1,234.56`, `(12.00)`, `- $14.05` or `250.00 CR`.
    pub fn parse(&self, raw: &str) -> Option<ParsedAmount> {
        let mut s = raw.trim().to_string();
        if s.is_empty() {
            return None;
        }

        let mut sign = None;

        for (label, label_sign) in [("CR", Sign::Positive), ("DR", Sign::Negative)] {
            let n = s.len();
            if n >= 2 && s.is_char_boundary(n - 2) && s[n - 2..].eq_ignore_ascii_case(label) {
                s = s[..n - 2].trim_end().to_string();
                sign = Some(label_sign);
                break;
            }
        }

        if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
            s = s[1..s.len() - 1].trim().to_string();
            sign = Some(Sign::Negative);
        }

        if let Some(rest) = s.strip_prefix('-') {
            s = rest.trim_start().to_string();
            sign = Some(Sign::Negative);
        } else if let Some(rest) = s.strip_prefix('+') {
            s = rest.trim_start().to_string();
            sign = Some(Sign::Positive);
        } else if let Some(rest) = s.strip_suffix('-') {
            s = rest.trim_end().to_string();
            sign = Some(Sign::Negative);
        }

        for prefix in CURRENCY_PREFIXES {
            let matches = s
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matches {
                s = s[prefix.len()..].trim_start().to_string();
                break;
            }
        }
        // "$-4.50"
        if let Some(rest) = s.strip_prefix('-') {
            s = rest.to_string();
            sign = Some(Sign::Negative);
        }

        let mut normalized = String::with_capacity(s.len());
        let mut fraction_digits = 0;
        let mut seen_decimal = false;
        for c in s.chars() {
            if c.is_ascii_digit() {
                normalized.push(c);
                if seen_decimal {
                    fraction_digits += 1;
                }
            } else if c == self.decimal && !seen_decimal {
                normalized.push('.');
                seen_decimal = true;
            } else if c == self.thousands && !seen_decimal {
                continue;
            } else {
                return None;
            }
        }

        if !normalized.chars().any(|c| c.is_ascii_digit()) {
            return None;
        }

        let magnitude = Decimal::from_str(&normalized).ok()?;
        Some(ParsedAmount {
            magnitude,
            sign,
            fraction_digits,
        })
    }

    /// Stricter check used on free-form lines: the token must carry a two-digit fraction,
    /// so reference numbers and years are not mistaken for money.
    pub fn parse_money_token(&self, tok: &str) -> Option<ParsedAmount> {
        self.parse(tok).filter(|a| a.fraction_digits == 2)
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn amounts() -> AmountParser {
        AmountParser::new(&ExtractionConfig::default())
    }

    #[test]
    fn test_dates_follow_configured_order() {
        let p = DateParser::new(&ExtractionConfig::default());
        assert_eq!(p.parse("2024-01-02"), NaiveDate::from_ymd_opt(2024, 1, 2));
        // day-first wins because %d/%m/%Y is listed before any month-first format
        assert_eq!(p.parse("02/01/2024"), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(p.parse("02 Jan 2024"), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(p.parse("02-JAN-2024"), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(p.parse("Jan 2, 2024"), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(p.parse("31/02/2024"), None);
        assert_eq!(p.parse("Coffee"), None);
        assert_eq!(p.parse(""), None);
    }

    #[test]
    fn test_month_first_configuration() {
        let cfg = ExtractionConfig {
            date_formats: vec!["%m/%d/%Y".into()],
            ..ExtractionConfig::default()
        };
        let p = DateParser::new(&cfg);
        assert_eq!(p.parse("01/02/2024"), NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(p.parse("13/02/2024"), None);
    }

    #[test]
    fn test_yearless_format_needs_default_year() {
        let mut cfg = ExtractionConfig {
            date_formats: vec!["%b %d".into()],
            ..ExtractionConfig::default()
        };
        assert_eq!(DateParser::new(&cfg).parse("Jul 20"), None);

        cfg.default_year = Some(2024);
        assert_eq!(
            DateParser::new(&cfg).parse("Jul 20"),
            NaiveDate::from_ymd_opt(2024, 7, 20)
        );
    }

    #[test]
    fn test_two_digit_year_is_not_year_24() {
        let p = DateParser::new(&ExtractionConfig::default());
        assert_eq!(p.parse("02/01/24"), NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn test_amount_markers() {
        let p = amounts();
        let a = p.parse("1,234.56").unwrap();
        assert_eq!(a.magnitude, dec("1234.56"));
        assert_eq!(a.sign, None);
        assert_eq!(a.fraction_digits, 2);

        assert_eq!(p.parse("-4.50").unwrap().signed_or(Sign::Positive), dec("-4.50"));
        assert_eq!(p.parse("(12.00)").unwrap().sign, Some(Sign::Negative));
        assert_eq!(p.parse("250.00 CR").unwrap().sign, Some(Sign::Positive));
        assert_eq!(p.parse("250.00Dr").unwrap().sign, Some(Sign::Negative));
        assert_eq!(p.parse("15.00-").unwrap().sign, Some(Sign::Negative));
        assert_eq!(p.parse("$5.82").unwrap().magnitude, dec("5.82"));
        assert_eq!(p.parse("- $14.05").unwrap().signed_or(Sign::Positive), dec("-14.05"));
        assert_eq!(p.parse("$-3.00").unwrap().signed_or(Sign::Positive), dec("-3.00"));
        assert_eq!(p.parse("+2,000.00").unwrap().sign, Some(Sign::Positive));
    }

    #[test]
    fn test_amount_rejects_text() {
        let p = amounts();
        assert!(p.parse("").is_none());
        assert!(p.parse("abc").is_none());
        assert!(p.parse("12.34.56").is_none());
        assert!(p.parse("CR").is_none());
        assert!(p.parse("E-Payment").is_none());
    }

    #[test]
    fn test_european_separators() {
        let cfg = ExtractionConfig {
            decimal_separator: ',',
            thousands_separator: '.',
            ..ExtractionConfig::default()
        };
        let p = AmountParser::new(&cfg);
        assert_eq!(p.parse("1.234,56").unwrap().magnitude, dec("1234.56"));
        assert_eq!(p.parse("-0,99").unwrap().signed_or(Sign::Positive), dec("-0.99"));
    }

    #[test]
    fn test_money_token_requires_cents() {
        let p = amounts();
        assert!(p.parse_money_token("8148").is_none());
        assert!(p.parse_money_token("2024").is_none());
        assert!(p.parse_money_token("15.00").is_some());
    }
}
