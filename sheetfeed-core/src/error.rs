//! Stage-boundary error taxonomy.
//!
//! Every stage returns `Result<Payload, StageError>`. A partial extraction is not
//! an error: skipped rows travel inside [`crate::ExtractionResult`].

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingestion,
    Extraction,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Ingestion => "ingestion",
            Stage::Extraction => "extraction",
            Stage::Upload => "upload",
        };
        f.write_str(s)
    }
}

/// Why an upload was refused before extraction started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("the upload is empty")]
    Empty,
    #[error("the upload is {size} bytes, above the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },
    #[error("the file is not a PDF")]
    NotPdf,
    #[error("the PDF could not be read: {detail}")]
    Unreadable { detail: String },
    #[error("the PDF is encrypted")]
    Encrypted,
}

#[derive(Debug, Error)]
pub enum StageError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InputError),

    #[error("no transactions found ({pages} pages scanned, {skipped} rows unparseable)")]
    ExtractionEmpty { pages: usize, skipped: usize },

    #[error("authentication failed: {detail}")]
    AuthenticationFailure { detail: String },

    #[error("upload rejected for records {first_index}..={last_index}: {detail}")]
    UploadRejected {
        first_index: usize,
        last_index: usize,
        /// Rows already committed by earlier batches
        rows_appended: usize,
        detail: String,
    },

    #[error("{stage} failed: {detail}")]
    Internal { stage: Stage, detail: String },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            StageError::InvalidInput(_) => Stage::Ingestion,
            StageError::ExtractionEmpty { .. } => Stage::Extraction,
            StageError::AuthenticationFailure { .. } | StageError::UploadRejected { .. } => {
                Stage::Upload
            }
            StageError::Internal { stage, .. } => *stage,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StageError::InvalidInput(_) => "invalid_input",
            StageError::ExtractionEmpty { .. } => "extraction_empty",
            StageError::AuthenticationFailure { .. } => "authentication_failure",
            StageError::UploadRejected { .. } => "upload_rejected",
            StageError::Internal { .. } => "internal",
        }
    }

    pub fn internal(stage: Stage, detail: impl fmt::Display) -> Self {
        StageError::Internal {
            stage,
            detail: detail.to_string(),
        }
    }

    /// Message shown to the person who uploaded the file.
    ///
    /// Authentication and internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            StageError::InvalidInput(e) => format!("Could not read file: {e}."),
            StageError::ExtractionEmpty { skipped: 0, .. } => {
                "No transactions were found in the PDF.".to_string()
            }
            StageError::ExtractionEmpty { skipped, .. } => format!(
                "No transactions were found in the PDF. {skipped} rows looked like transactions \
                 but their date or amount could not be parsed; check the accepted formats."
            ),
            StageError::AuthenticationFailure { .. } => {
                "The spreadsheet service did not accept the service account credential. \
                 Ask the owner to check the deployment secrets."
                    .to_string()
            }
            StageError::UploadRejected {
                first_index,
                last_index,
                rows_appended,
                detail,
            } => format!(
                "The spreadsheet rejected records #{} to #{} ({detail}). \
                 {rows_appended} rows were appended before the failure; later records were not sent.",
                first_index + 1,
                last_index + 1,
            ),
            StageError::Internal { stage, .. } => {
                format!("Unexpected error during {stage}. Please try again or contact the owner.")
            }
        }
    }
}
