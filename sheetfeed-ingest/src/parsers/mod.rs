//! Row parsers: header-driven tables and the line-based fallback.
//!
//! Both produce a [`RawRow`] of cell text; [`RowBuilder`] turns that into a
//! typed [`TransactionRecord`] or a [`SkipReason`].

pub mod lines;
pub mod table;

use rust_decimal::Decimal;
use sheetfeed_core::{split_signed, SkipReason, TransactionRecord};

use crate::normalize::{collapse_ws, AmountParser, DateParser, ParsedAmount, Sign};

/// Semantic column of a statement table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PostingDate,
    ValueDate,
    Branch,
    Reference,
    Description,
    Debit,
    Credit,
    Amount,
    Balance,
}

impl Field {
    pub fn carries_money(&self) -> bool {
        matches!(
            self,
            Field::Debit | Field::Credit | Field::Amount | Field::Balance
        )
    }
}

/// Cell text for one candidate row, before type coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub posting_date: String,
    pub value_date: Option<String>,
    pub branch: Option<String>,
    pub reference: Option<String>,
    pub description: String,
    pub debit: Option<String>,
    pub credit: Option<String>,
    pub amount: Option<String>,
    pub balance: Option<String>,
}

impl RawRow {
    pub fn set(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::PostingDate => {
                push_text(&mut self.posting_date, text);
                return;
            }
            Field::Description => {
                push_text(&mut self.description, text);
                return;
            }
            Field::ValueDate => &mut self.value_date,
            Field::Branch => &mut self.branch,
            Field::Reference => &mut self.reference,
            Field::Debit => &mut self.debit,
            Field::Credit => &mut self.credit,
            Field::Amount => &mut self.amount,
            Field::Balance => &mut self.balance,
        };
        push_text(slot.get_or_insert_with(String::new), text);
    }

    pub fn has_money_cell(&self) -> bool {
        [&self.debit, &self.credit, &self.amount, &self.balance]
            .into_iter()
            .any(|c| c.as_deref().is_some_and(|s| !is_blank_cell(s)))
    }
}

fn push_text(dst: &mut String, text: &str) {
    if !dst.is_empty() {
        dst.push(' ');
    }
    dst.push_str(text.trim());
}

/// Placeholders statements print in empty money columns.
fn is_blank_cell(s: &str) -> bool {
    matches!(s.trim(), "" | "-" | "–" | "—" | "nil" | "NIL")
}

/// Coerces [`RawRow`]s into records with the configured date and number rules.
#[derive(Debug, Clone)]
pub struct RowBuilder {
    pub(crate) dates: DateParser,
    pub(crate) amounts: AmountParser,
}

impl RowBuilder {
    pub fn new(dates: DateParser, amounts: AmountParser) -> Self {
        Self { dates, amounts }
    }

    /// Build a record. `previous_balance` lets an unsigned amount take its sign
    /// from the running balance when the two agree exactly.
    pub fn build(
        &self,
        raw: &RawRow,
        previous_balance: Option<Decimal>,
        page: u32,
        line: usize,
    ) -> Result<TransactionRecord, SkipReason> {
        let posting_date = self
            .dates
            .parse(&raw.posting_date)
            .ok_or(SkipReason::BadDate)?;
        let value_date = raw
            .value_date
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .and_then(|v| self.dates.parse(v));

        let debit = self.money_cell(raw.debit.as_deref())?;
        let credit = self.money_cell(raw.credit.as_deref())?;
        let single = self.money_cell(raw.amount.as_deref())?;

        let balance = raw
            .balance
            .as_deref()
            .filter(|b| !is_blank_cell(b))
            .and_then(|b| self.amounts.parse(b))
            .map(|b| b.signed_or(Sign::Positive));

        let (amount, debit, credit) = match (single, debit, credit) {
            (Some(a), d, c) => {
                let sign = a
                    .sign
                    .or_else(|| sign_from_balance(a.magnitude, previous_balance, balance))
                    .unwrap_or(Sign::Positive);
                let value = a.signed_or(sign);
                if d.is_some() || c.is_some() {
                    (value, d.map(|d| d.magnitude), c.map(|c| c.magnitude))
                } else {
                    let (d, c) = split_signed(value);
                    (value, d, c)
                }
            }
            (None, None, None) => return Err(SkipReason::MissingAmount),
            (None, d, c) => {
                let out = d.map(|d| d.signed_or(Sign::Negative)).unwrap_or(Decimal::ZERO);
                let inn = c.map(|c| c.signed_or(Sign::Positive)).unwrap_or(Decimal::ZERO);
                (inn + out, d.map(|d| d.magnitude), c.map(|c| c.magnitude))
            }
        };

        Ok(TransactionRecord {
            posting_date,
            value_date,
            branch: non_empty(raw.branch.as_deref()),
            reference: non_empty(raw.reference.as_deref()),
            description: collapse_ws(&raw.description),
            debit,
            credit,
            amount,
            balance,
            page,
            line,
        })
    }

    /// `Ok(None)` for an absent or placeholder cell, `Err` when text is present but not a number.
    fn money_cell(&self, cell: Option<&str>) -> Result<Option<ParsedAmount>, SkipReason> {
        match cell {
            None => Ok(None),
            Some(s) if is_blank_cell(s) => Ok(None),
            Some(s) => self
                .amounts
                .parse(s)
                .map(Some)
                .ok_or(SkipReason::BadAmount),
        }
    }
}

fn sign_from_balance(
    magnitude: Decimal,
    previous: Option<Decimal>,
    current: Option<Decimal>,
) -> Option<Sign> {
    let (prev, cur) = (previous?, current?);
    if prev - magnitude == cur {
        Some(Sign::Negative)
    } else if prev + magnitude == cur {
        Some(Sign::Positive)
    } else {
        None
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(collapse_ws).filter(|s| !s.is_empty())
}
