//! sheetfeed-upload: append normalized records to a spreadsheet tab

pub mod credential;
#[cfg(feature = "google")]
pub mod google;
pub mod memory;
pub mod sheets;
pub mod upload;

pub use credential::ServiceAccountCredential;
#[cfg(feature = "google")]
pub use google::GoogleSheets;
pub use memory::MemorySheets;
pub use sheets::{SheetsApi, SheetsError};
pub use upload::{upload_records, UploadOptions, UploadReport};
