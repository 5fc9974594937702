//! Page scanning: header detection, filtering, row parsing and continuation merging.

use rust_decimal::Decimal;
use sheetfeed_core::{
    ExtractionConfig, ExtractionResult, PageProgress, SkippedRow, StageError,
};

use crate::document::StatementDocument;
use crate::filters::LineFilter;
use crate::normalize::{collapse_ws, AmountParser, DateParser};
use crate::parsers::lines::LineParser;
use crate::parsers::table::TableLayout;
use crate::parsers::{RawRow, RowBuilder};

/// Wrapped description lines attached to a single record.
const MAX_CONTINUATIONS: usize = 2;
/// Longer text-only lines are prose, not a wrapped description.
const MAX_CONTINUATION_CHARS: usize = 80;

#[derive(Debug, Clone)]
pub struct Extractor {
    filter: LineFilter,
    rows: RowBuilder,
    lines: LineParser,
    max_pages: usize,
}

/// Record still accepting continuation lines.
struct OpenRecord {
    index: usize,
    attached: usize,
}

impl Extractor {
    pub fn new(cfg: &ExtractionConfig) -> Result<Self, regex::Error> {
        let dates = DateParser::new(cfg);
        let amounts = AmountParser::new(cfg);
        Ok(Self {
            filter: LineFilter::new(&cfg.skip_patterns)?,
            rows: RowBuilder::new(dates.clone(), amounts),
            lines: LineParser::new(dates, amounts)?,
            max_pages: cfg.max_pages,
        })
    }

    /// Scan every page of `doc`. The document is consumed and dropped here.
    ///
    /// Returns `ExtractionEmpty` when no record was accepted; skipped rows
    /// alongside accepted ones are reported inside the result.
    pub fn extract(
        &self,
        doc: StatementDocument,
        on_page: impl FnMut(PageProgress),
    ) -> Result<ExtractionResult, StageError> {
        let mut pages = doc.page_numbers().to_vec();
        let mut ignored_pages = 0;
        if self.max_pages > 0 && pages.len() > self.max_pages {
            ignored_pages = pages.len() - self.max_pages;
            tracing::warn!(
                file = %doc.file_name(),
                pages = pages.len(),
                max_pages = self.max_pages,
                "page limit reached, remaining pages ignored"
            );
            pages.truncate(self.max_pages);
        }

        let total = pages.len();
        let mut result = self.extract_pages(
            pages.iter().map(|&p| (p, doc.page_text(p))),
            total,
            on_page,
        );
        result.stats.ignored_pages = ignored_pages;

        tracing::info!(
            file = %doc.file_name(),
            pages = result.stats.pages,
            table_pages = result.stats.table_pages,
            records = result.records.len(),
            skipped = result.skipped.len(),
            filtered = result.stats.filtered,
            "extraction finished"
        );
        drop(doc);

        if result.is_empty() {
            return Err(StageError::ExtractionEmpty {
                pages: result.stats.pages,
                skipped: result.skipped.len(),
            });
        }
        Ok(result)
    }

    /// Scan already-extracted page text. Never fails; an empty result is the
    /// caller's decision.
    pub fn extract_pages<I>(
        &self,
        pages: I,
        total: usize,
        mut on_page: impl FnMut(PageProgress),
    ) -> ExtractionResult
    where
        I: IntoIterator<Item = (u32, String)>,
    {
        let mut result = ExtractionResult::default();
        let mut previous_balance: Option<Decimal> = None;

        for (i, (page, text)) in pages.into_iter().enumerate() {
            let had_table = self.scan_page(page, &text, &mut result, &mut previous_balance);
            result.stats.pages += 1;
            if had_table {
                result.stats.table_pages += 1;
            } else {
                result.stats.fallback_pages += 1;
            }
            tracing::debug!(page, records = result.records.len(), "page scanned");
            on_page(PageProgress {
                page: i + 1,
                total,
            });
        }

        result
    }

    /// Returns true when the page carried a table header.
    fn scan_page(
        &self,
        page: u32,
        text: &str,
        result: &mut ExtractionResult,
        previous_balance: &mut Option<Decimal>,
    ) -> bool {
        let mut layout: Option<TableLayout> = None;
        let mut had_table = false;
        let mut open: Option<OpenRecord> = None;

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                open = None;
                continue;
            }

            // Header detection runs before the noise filter: "Closing Balance"
            // is both a column name and a filtered summary line.
            if layout.as_ref().is_some_and(|l| l.is_header_repeat(line)) {
                result.stats.filtered += 1;
                open = None;
                continue;
            }
            if let Some(found) = TableLayout::detect(line) {
                layout = Some(found);
                had_table = true;
                open = None;
                continue;
            }

            if self.filter.is_noise(line) {
                result.stats.filtered += 1;
                open = None;
                continue;
            }

            let raw = match &layout {
                Some(l) => match self.table_row(l, line) {
                    Some(raw) => raw,
                    None => {
                        if let Some(o) = open.as_mut() {
                            if o.attached < MAX_CONTINUATIONS
                                && trimmed.chars().count() <= MAX_CONTINUATION_CHARS
                            {
                                let desc = &mut result.records[o.index].description;
                                if !desc.is_empty() {
                                    desc.push(' ');
                                }
                                desc.push_str(&collapse_ws(trimmed));
                                o.attached += 1;
                                result.stats.continuations += 1;
                                continue;
                            }
                        }
                        open = None;
                        continue;
                    }
                },
                None => match self.lines.parse(line) {
                    Some(raw) => raw,
                    None => {
                        open = None;
                        continue;
                    }
                },
            };

            result.stats.candidates += 1;
            match self.rows.build(&raw, *previous_balance, page, line_no) {
                Ok(record) => {
                    if record.value_date.is_none()
                        && raw.value_date.as_deref().is_some_and(|v| !v.trim().is_empty())
                    {
                        tracing::debug!(page, line = line_no, "value date not parsed, cell left empty");
                        result.stats.unparsed_value_dates += 1;
                    }
                    if record.balance.is_some() {
                        *previous_balance = record.balance;
                    }
                    result.records.push(record);
                    open = Some(OpenRecord {
                        index: result.records.len() - 1,
                        attached: 0,
                    });
                }
                Err(reason) => {
                    tracing::debug!(page, line = line_no, reason = reason.describe(), "row skipped");
                    result.skipped.push(SkippedRow {
                        page,
                        line: line_no,
                        text: collapse_ws(trimmed),
                        reason,
                    });
                    open = None;
                }
            }
        }

        had_table
    }

    /// Map a line under a detected header. `None` marks a text-only line
    /// (no amount and no date), which is a continuation candidate.
    fn table_row(&self, layout: &TableLayout, line: &str) -> Option<RawRow> {
        let raw = layout.map_row(line);
        if raw.has_money_cell() {
            return Some(raw);
        }
        // Cells that do not line up with the header.
        if let Some(fallback) = self.lines.parse(line) {
            return Some(fallback);
        }
        if self.rows.dates.parse(&raw.posting_date).is_some() {
            return Some(raw);
        }
        None
    }
}
