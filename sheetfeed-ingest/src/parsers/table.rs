//! Header-driven table parsing.
//!
//! Expected page text after extraction:
//!   Posting Date   Value Date   Description              Debit     Credit    Balance
//!   02/01/2024     02/01/2024   Coffee                    4.50               95.50
//!   03/01/2024     03/01/2024   Salary ACME                        2,000.00  2,095.50
//!
//! Cells are separated by two or more spaces (or a tab). Rows with the same cell
//! count as the header map positionally; others are placed by character offset.

use super::{Field, RawRow};
use crate::normalize::collapse_ws;

/// A run of text on a line, with char offsets `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Column {
    field: Option<Field>,
    start: usize,
}

/// Column layout recovered from a header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    columns: Vec<Column>,
    header_key: String,
}

impl TableLayout {
    /// Recognize a header line: it must name a date column and a money column,
    /// and at least half of its cells must be known headings.
    pub fn detect(line: &str) -> Option<Self> {
        let cells = split_cells(line);
        if cells.len() < 2 {
            return None;
        }

        let mut seen: Vec<Field> = Vec::new();
        let mut columns: Vec<Column> = cells
            .iter()
            .map(|c| {
                let field = header_field(&c.text).filter(|f| !seen.contains(f));
                if let Some(f) = field {
                    seen.push(f);
                }
                Column {
                    field,
                    start: c.start,
                }
            })
            .collect();

        if !seen.contains(&Field::PostingDate) {
            let value_date = columns
                .iter_mut()
                .find(|c| c.field == Some(Field::ValueDate))?;
            value_date.field = Some(Field::PostingDate);
            seen.push(Field::PostingDate);
        }

        let has_money = seen
            .iter()
            .any(|f| matches!(f, Field::Amount | Field::Debit | Field::Credit));
        if !has_money || seen.len() * 2 < columns.len() {
            return None;
        }

        Some(Self {
            columns,
            header_key: header_key(line),
        })
    }

    pub fn fields(&self) -> Vec<Option<Field>> {
        self.columns.iter().map(|c| c.field).collect()
    }

    /// True for a header printed again further down the page.
    pub fn is_header_repeat(&self, line: &str) -> bool {
        header_key(line) == self.header_key
    }

    /// Split a data line into cells and assign them to columns.
    pub fn map_row(&self, line: &str) -> RawRow {
        let cells = split_cells(line);
        let mut raw = RawRow::default();

        if cells.len() == self.columns.len() {
            for (cell, col) in cells.iter().zip(&self.columns) {
                if let Some(field) = col.field {
                    raw.set(field, &cell.text);
                }
            }
            return raw;
        }

        for cell in &cells {
            if let Some(field) = self.columns[self.column_for(cell)].field {
                raw.set(field, &cell.text);
            }
        }
        raw
    }

    /// Column whose span overlaps the cell most; spans run from one header start to the next.
    fn column_for(&self, cell: &Cell) -> usize {
        let mut best = (0usize, 0usize);
        for (i, col) in self.columns.iter().enumerate() {
            let col_start = if i == 0 { 0 } else { col.start };
            let col_end = self
                .columns
                .get(i + 1)
                .map(|next| next.start)
                .unwrap_or(usize::MAX);
            let overlap = cell.end.min(col_end).saturating_sub(cell.start.max(col_start));
            if overlap > best.1 {
                best = (i, overlap);
            }
        }
        if best.1 == 0 {
            // Entirely right of the last header start.
            return self.columns.len() - 1;
        }
        best.0
    }
}

/// Split on tabs or runs of 2+ whitespace characters, keeping char offsets.
pub fn split_cells(line: &str) -> Vec<Cell> {
    let chars: Vec<char> = line.chars().collect();
    let is_gap = |c: char| c.is_whitespace() && c != '\t';
    let mut cells = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        while i < chars.len() {
            let c = chars[i];
            if c == '\t' {
                break;
            }
            if is_gap(c) {
                let run_start = i;
                while i < chars.len() && is_gap(chars[i]) {
                    i += 1;
                }
                if i - run_start >= 2 || i >= chars.len() || chars[i] == '\t' {
                    break;
                }
                continue;
            }
            i += 1;
            end = i;
        }

        cells.push(Cell {
            text: chars[start..end].iter().collect(),
            start,
            end,
        });
    }

    cells
}

fn header_key(line: &str) -> String {
    collapse_ws(line).to_lowercase()
}

/// Map a header cell to a field by name.
fn header_field(text: &str) -> Option<Field> {
    let mut name = text.to_lowercase();
    // "Debit (INR)", "Amount ($)"
    if let Some(idx) = name.find('(') {
        name.truncate(idx);
    }
    let name = collapse_ws(name.trim_end_matches(|c: char| c == '.' || c == ':').trim());

    let field = match name.as_str() {
        "date" | "posting date" | "post date" | "transaction date" | "trans date" | "txn date"
        | "tran date" | "booking date" | "book date" => Field::PostingDate,
        "value date" | "val date" | "effective date" | "value dt" => Field::ValueDate,
        "branch" | "transaction branch" | "txn branch" | "branch name" => Field::Branch,
        "reference" | "reference number" | "reference no" | "ref" | "ref no"
        | "ref number" | "cheque no" | "chq no" | "chq/ref no" | "chq./ref.no" => Field::Reference,
        "description" | "details" | "transaction details" | "narration" | "particulars"
        | "memo" | "payee" | "remarks" => Field::Description,
        "debit" | "debits" | "debit amount" | "withdrawal" | "withdrawals" | "withdrawal amt"
        | "money out" | "paid out" | "dr" => Field::Debit,
        "credit" | "credits" | "credit amount" | "deposit" | "deposits" | "deposit amt"
        | "money in" | "paid in" | "cr" => Field::Credit,
        "amount" | "amt" | "transaction amount" | "txn amount" => Field::Amount,
        "balance" | "running balance" | "balance amount" | "closing balance" => Field::Balance,
        _ => return None,
    };
    Some(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "Posting Date   Value Date   Description              Debit     Credit    Balance";

    #[test]
    fn test_split_cells_keeps_single_spaces() {
        let cells = split_cells("02/01/2024   Coffee Shop 12   4.50");
        let texts: Vec<_> = cells.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["02/01/2024", "Coffee Shop 12", "4.50"]);
        assert_eq!(cells[0].start, 0);
        assert_eq!(cells[0].end, 10);
        assert_eq!(cells[1].start, 13);
    }

    #[test]
    fn test_split_cells_on_tabs() {
        let texts: Vec<_> = split_cells("a\tb c\t\td")
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["a", "b c", "d"]);
    }

    #[test]
    fn test_detects_full_header() {
        let layout = TableLayout::detect(HEADER).unwrap();
        assert_eq!(
            layout.fields(),
            vec![
                Some(Field::PostingDate),
                Some(Field::ValueDate),
                Some(Field::Description),
                Some(Field::Debit),
                Some(Field::Credit),
                Some(Field::Balance),
            ]
        );
        assert!(layout.is_header_repeat("POSTING DATE  VALUE DATE  DESCRIPTION  DEBIT  CREDIT  BALANCE"));
    }

    #[test]
    fn test_rejects_prose_and_moneyless_headers() {
        assert!(TableLayout::detect("Thank you for banking with us").is_none());
        assert!(TableLayout::detect("Date   Description").is_none());
        assert!(TableLayout::detect("02/01/2024   Coffee   4.50").is_none());
    }

    #[test]
    fn test_value_date_promoted_when_alone() {
        let layout = TableLayout::detect("Value Date   Narration   Amount (INR)").unwrap();
        assert_eq!(
            layout.fields(),
            vec![
                Some(Field::PostingDate),
                Some(Field::Description),
                Some(Field::Amount)
            ]
        );
    }

    #[test]
    fn test_positional_mapping() {
        let layout = TableLayout::detect("Date   Description   Amount   Balance").unwrap();
        let raw = layout.map_row("2024-01-02   Coffee   -4.50   95.50");
        assert_eq!(raw.posting_date, "2024-01-02");
        assert_eq!(raw.description, "Coffee");
        assert_eq!(raw.amount.as_deref(), Some("-4.50"));
        assert_eq!(raw.balance.as_deref(), Some("95.50"));
    }

    #[test]
    fn test_offset_mapping_with_empty_cells() {
        let layout = TableLayout::detect(HEADER).unwrap();
        let debit_row =
            "02/01/2024     02/01/2024   Coffee                    4.50                95.50";
        let raw = layout.map_row(debit_row);
        assert_eq!(raw.description, "Coffee");
        assert_eq!(raw.debit.as_deref(), Some("4.50"));
        assert_eq!(raw.credit, None);
        assert_eq!(raw.balance.as_deref(), Some("95.50"));

        let credit_row =
            "03/01/2024     03/01/2024   Salary ACME                         2,000.00  2,095.50";
        let raw = layout.map_row(credit_row);
        assert_eq!(raw.debit, None);
        assert_eq!(raw.credit.as_deref(), Some("2,000.00"));
        assert_eq!(raw.balance.as_deref(), Some("2,095.50"));
    }
}
