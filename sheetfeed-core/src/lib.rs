//! sheetfeed-core: records, stage errors and format configuration shared by the pipeline

pub mod config;
pub mod destination;
pub mod error;
pub mod extraction;
pub mod record;

pub use config::ExtractionConfig;
pub use destination::{Destination, DEFAULT_TAB};
pub use error::{InputError, Stage, StageError};
pub use extraction::{ExtractionResult, ExtractionStats, PageProgress, SkipReason, SkippedRow};
pub use record::{header_row, split_signed, TransactionRecord, SHEET_COLUMNS};
