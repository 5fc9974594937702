//! Normalized transaction rows and their spreadsheet rendering.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Column headers written to the destination tab, in row order.
pub const SHEET_COLUMNS: [&str; 9] = [
    "Posting Date",
    "Value Date",
    "Transaction Branch",
    "Reference Number",
    "Description",
    "Debit",
    "Credit",
    "Amount",
    "Balance",
];

const SHEET_DATE_FORMAT: &str = "%Y-%m-%d";

/// One statement line after normalization (bank-agnostic).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub posting_date: NaiveDate,
    pub value_date: Option<NaiveDate>,
    pub branch: Option<String>,
    pub reference: Option<String>,
    pub description: String,
    /// Money out as printed on the statement (always non-negative).
    pub debit: Option<Decimal>,
    /// Money in as printed on the statement (always non-negative).
    pub credit: Option<Decimal>,
    /// Signed amount: negative means money left the account.
    pub amount: Decimal,
    /// Optional running balance
    pub balance: Option<Decimal>,
    /// 1-based page the row came from
    pub page: u32,
    /// 1-based line within the page text
    pub line: usize,
}

impl TransactionRecord {
    /// Minimal record with only the required fields; debit/credit are derived from the sign.
    pub fn new(posting_date: NaiveDate, description: impl Into<String>, amount: Decimal) -> Self {
        let (debit, credit) = split_signed(amount);
        Self {
            posting_date,
            value_date: None,
            branch: None,
            reference: None,
            description: description.into(),
            debit,
            credit,
            amount,
            balance: None,
            page: 0,
            line: 0,
        }
    }

    pub fn is_debit(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Render the record as one sheet row, matching [`SHEET_COLUMNS`].
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.posting_date.format(SHEET_DATE_FORMAT).to_string(),
            opt_date(self.value_date),
            text_cell(self.branch.as_deref().unwrap_or("")),
            text_cell(self.reference.as_deref().unwrap_or("")),
            text_cell(&self.description),
            opt_decimal(self.debit),
            opt_decimal(self.credit),
            self.amount.to_string(),
            opt_decimal(self.balance),
        ]
    }
}

/// Split a signed amount into (debit, credit) magnitudes.
pub fn split_signed(amount: Decimal) -> (Option<Decimal>, Option<Decimal>) {
    if amount.is_sign_negative() && !amount.is_zero() {
        (Some(amount.abs()), None)
    } else {
        (None, Some(amount))
    }
}

/// Header row as owned strings.
pub fn header_row() -> Vec<String> {
    SHEET_COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn opt_date(d: Option<NaiveDate>) -> String {
    d.map(|d| d.format(SHEET_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn opt_decimal(d: Option<Decimal>) -> String {
    d.map(|d| d.to_string()).unwrap_or_default()
}

/// Keep free text as text: with user-entered input the sheet would evaluate
/// formulas and turn number-, date- or boolean-looking strings into values
/// (dropping leading zeros from "000123").
fn text_cell(s: &str) -> String {
    if would_coerce(s) {
        format!("'{s}")
    } else {
        s.to_string()
    }
}

const DATE_WORDS: [&str; 28] = [
    "jan", "january", "feb", "february", "mar", "march", "apr", "april", "may", "jun", "june",
    "jul", "july", "aug", "august", "sep", "sept", "september", "oct", "october", "nov",
    "november", "dec", "december", "am", "pm", "e", "t",
];

fn would_coerce(s: &str) -> bool {
    let t = s.trim();
    if t.is_empty() {
        return false;
    }
    if matches!(t.chars().next(), Some('=' | '+' | '-' | '@' | '\'')) {
        return true;
    }
    if t.eq_ignore_ascii_case("true") || t.eq_ignore_ascii_case("false") {
        return true;
    }

    let words: Vec<String> = t
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    // Digits and punctuation only: numbers, dates, times, percentages, currency.
    if words.is_empty() {
        return true;
    }
    // "5 Jan 2024", "1e5", "10:30 pm"
    t.chars().any(|c| c.is_ascii_digit()) && words.iter().all(|w| DATE_WORDS.contains(&w.as_str()))
}
