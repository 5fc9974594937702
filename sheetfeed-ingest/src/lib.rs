//! sheetfeed-ingest: statement PDF loading and transaction extraction

pub mod document;
pub mod extract;
pub mod filters;
pub mod layout;
pub mod normalize;
pub mod parsers;

pub use document::{IngestLimits, StatementDocument};
pub use extract::Extractor;
