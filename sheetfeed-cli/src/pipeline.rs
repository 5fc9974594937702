//! Ingestion → extraction → upload for one statement.

use anyhow::{Context, Result};
use serde::Serialize;
use sheetfeed_core::{Destination, ExtractionResult, PageProgress, SkippedRow, Stage, StageError};
use sheetfeed_ingest::{Extractor, IngestLimits, StatementDocument};
use sheetfeed_upload::{upload_records, SheetsApi, UploadOptions, UploadReport};
use std::sync::Arc;

use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub file_name: String,
    pub pages: usize,
    pub records: usize,
    pub rows_appended: usize,
    pub upload: UploadReport,
    pub warnings: Vec<String>,
    pub skipped: Vec<SkippedRow>,
}

pub struct Pipeline {
    extractor: Arc<Extractor>,
    limits: IngestLimits,
    destination: Destination,
    upload: UploadOptions,
}

impl Pipeline {
    pub fn new(cfg: &Config) -> Result<Self> {
        let extractor = Extractor::new(&cfg.extraction).context("compiling extraction.skip_patterns")?;
        Ok(Self {
            extractor: Arc::new(extractor),
            limits: IngestLimits {
                max_bytes: Some(cfg.server.max_upload_bytes),
            },
            destination: cfg.destination(),
            upload: UploadOptions {
                batch_rows: cfg.upload.batch_rows,
            },
        })
    }

    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Ingestion and extraction on the blocking pool. The bytes move into the
    /// task and are dropped there.
    pub async fn extract(
        &self,
        file_name: String,
        bytes: Vec<u8>,
        on_page: impl FnMut(PageProgress) + Send + 'static,
    ) -> Result<ExtractionResult, StageError> {
        let extractor = Arc::clone(&self.extractor);
        let limits = self.limits;

        tokio::task::spawn_blocking(move || {
            let doc = StatementDocument::from_upload(file_name, bytes, &limits)?;
            extractor.extract(doc, on_page)
        })
        .await
        .map_err(|e| StageError::internal(Stage::Extraction, e))?
    }

    pub async fn run<S: SheetsApi>(
        &self,
        sheets: &S,
        file_name: String,
        bytes: Vec<u8>,
    ) -> Result<PipelineReport, StageError> {
        tracing::info!(file = %file_name, size = bytes.len(), "statement received");

        let extraction = self
            .extract(file_name.clone(), bytes, |p| {
                tracing::debug!(page = p.page, total = p.total, percent = p.percent(), "extracting");
            })
            .await?;

        let mut warnings = extraction.warnings();
        if !warnings.is_empty() {
            tracing::warn!(
                file = %file_name,
                skipped = extraction.skipped.len(),
                ignored_pages = extraction.stats.ignored_pages,
                "incomplete extraction"
            );
        }

        let upload = upload_records(sheets, &self.destination, &extraction.records, &self.upload).await?;
        if upload.header_mismatch {
            warnings.push(format!(
                "Row 1 of '{}' does not match the expected columns; rows were appended below it.",
                self.destination.tab
            ));
        }

        Ok(PipelineReport {
            file_name,
            pages: extraction.stats.pages,
            records: extraction.records.len(),
            rows_appended: upload.rows_appended,
            upload,
            warnings,
            skipped: extraction.skipped,
        })
    }
}
