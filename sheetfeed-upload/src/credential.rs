//! Service-account key material, supplied at deploy time and never printed.

use std::fmt;
use std::path::Path;

#[derive(Clone)]
pub struct ServiceAccountCredential {
    json: String,
}

impl ServiceAccountCredential {
    pub fn from_json(json: impl Into<String>) -> Self {
        Self { json: json.into() }
    }

    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        std::fs::read_to_string(path).map(Self::from_json)
    }

    /// The `client_email` field, safe to log.
    pub fn client_email(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_str(&self.json).ok()?;
        value["client_email"].as_str().map(str::to_string)
    }

    #[cfg_attr(not(feature = "google"), allow(dead_code))]
    pub(crate) fn expose(&self) -> &str {
        &self.json
    }
}

impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("client_email", &self.client_email())
            .field("key", &"<redacted>")
            .finish()
    }
}
