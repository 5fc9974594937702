//! Line-based fallback for pages without a recognizable table header.
//!
//! Expected text rows:
//!   02/01/2024   Coffee                                  -4.50
//!   03 Jan 2024  Salary ACME Corp               2,000.00  2,095.50
//!   Jul 20       Jul 22   H-E-B #455 SAN MARCOS TX      - $14.05
//!
//! A line is a candidate when it starts like a date and ends in one to three
//! money tokens. One amount is the transaction amount; two are amount and
//! balance; three are debit, credit and balance.

use regex::Regex;

use super::RawRow;
use crate::normalize::{AmountParser, DateParser};

const MONTHS: &str = "jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec";

#[derive(Debug, Clone)]
pub struct LineParser {
    dates: DateParser,
    amounts: AmountParser,
    date_start: Regex,
}

impl LineParser {
    pub fn new(dates: DateParser, amounts: AmountParser) -> Result<Self, regex::Error> {
        let date_start = Regex::new(&format!(
            concat!(
                r"(?i)^(\d{{1,4}}[/.\-]\d{{1,2}}([/.\-]\d{{2,4}})?",
                r"|\d{{1,2}}[\s\-]({m})[a-z]*\.?",
                r"|({m})[a-z]*\.?\s+\d{{1,2}})\b"
            ),
            m = MONTHS
        ))?;
        Ok(Self {
            dates,
            amounts,
            date_start,
        })
    }

    /// `None` when the line does not have the shape of a transaction row.
    pub fn parse(&self, line: &str) -> Option<RawRow> {
        let line = line.trim();
        if !self.date_start.is_match(line) {
            return None;
        }

        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        let mut money: Vec<String> = Vec::new();

        while money.len() < 3 && tokens.len() > 1 {
            let last = tokens[tokens.len() - 1];
            let (mut text, used) = if is_label(last) && tokens.len() > 2 {
                (format!("{} {}", tokens[tokens.len() - 2], last), 2)
            } else {
                (last.to_string(), 1)
            };
            if self.amounts.parse_money_token(&text).is_none() {
                break;
            }
            tokens.truncate(tokens.len() - used);

            // "- $14.05"
            if let Some(&sign) = tokens.last() {
                if (sign == "-" || sign == "+") && tokens.len() > 1 {
                    text = format!("{sign}{text}");
                    tokens.pop();
                }
            }
            money.push(text);
        }

        if money.is_empty() {
            return None;
        }
        money.reverse();

        let (posting, rest) = match self.leading_date(&tokens) {
            Some((date, used)) => (date, &tokens[used..]),
            None => (tokens[0].to_string(), &tokens[1..]),
        };
        let (value_date, rest) = match self.leading_date(rest) {
            Some((date, used)) if used < rest.len() => (Some(date), &rest[used..]),
            _ => (None, rest),
        };

        let mut raw = RawRow {
            posting_date: posting,
            value_date,
            description: rest.join(" "),
            ..RawRow::default()
        };

        let mut money = money.into_iter();
        match money.len() {
            1 => raw.amount = money.next(),
            2 => {
                raw.amount = money.next();
                raw.balance = money.next();
            }
            _ => {
                raw.debit = money.next();
                raw.credit = money.next();
                raw.balance = money.next();
            }
        }

        Some(raw)
    }

    /// Longest run of up to three leading tokens that parses as a date.
    fn leading_date(&self, tokens: &[&str]) -> Option<(String, usize)> {
        (1..=tokens.len().min(3)).rev().find_map(|n| {
            let candidate = tokens[..n].join(" ");
            self.dates.parse(&candidate).map(|_| (candidate, n))
        })
    }
}

fn is_label(tok: &str) -> bool {
    tok.eq_ignore_ascii_case("cr") || tok.eq_ignore_ascii_case("dr")
}
