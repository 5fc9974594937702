//! Google Sheets backend: service-account auth, tab management, row appends.

use google_sheets4::api::{
    AddSheetRequest, BatchUpdateSpreadsheetRequest, Request, SheetProperties, ValueRange,
};
use google_sheets4::Sheets;
use hyper::client::HttpConnector;
use hyper_rustls::HttpsConnector;
use serde_json::Value;
use sheetfeed_core::Destination;

use crate::credential::ServiceAccountCredential;
use crate::sheets::{SheetsApi, SheetsError};

// Use the oauth2 version re-exported by google-sheets4 to avoid version mismatches.
use google_sheets4::oauth2;

const SPREADSHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

pub struct GoogleSheets {
    hub: Sheets<HttpsConnector<HttpConnector>>,
    value_input_option: String,
}

impl GoogleSheets {
    /// Build the hub and fetch a token up front, so a bad credential fails
    /// before any spreadsheet call.
    pub async fn connect(credential: &ServiceAccountCredential) -> Result<Self, SheetsError> {
        let key = oauth2::parse_service_account_key(credential.expose())
            .map_err(|e| SheetsError::Unauthorized(format!("service account key: {e}")))?;
        let auth = oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| SheetsError::Unauthorized(format!("building authenticator: {e}")))?;
        auth.token(&[SPREADSHEETS_SCOPE])
            .await
            .map_err(|e| SheetsError::Unauthorized(e.to_string()))?;

        tracing::debug!(account = ?credential.client_email(), "service account token acquired");

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .https_or_http()
            .enable_http1()
            .build();
        let hub = Sheets::new(hyper::Client::builder().build(connector), auth);
        Ok(Self {
            hub,
            value_input_option: "USER_ENTERED".to_string(),
        })
    }

    /// `USER_ENTERED` (sheet parses dates and numbers) or `RAW`.
    pub fn with_value_input_option(mut self, option: impl Into<String>) -> Self {
        self.value_input_option = option.into();
        self
    }
}

impl SheetsApi for GoogleSheets {
    async fn tab_titles(&self, dest: &Destination) -> Result<Vec<String>, SheetsError> {
        let (_, spreadsheet) = self
            .hub
            .spreadsheets()
            .get(&dest.spreadsheet_id)
            .param("fields", "sheets.properties.title")
            .add_scope(SPREADSHEETS_SCOPE)
            .doit()
            .await
            .map_err(map_error)?;

        Ok(spreadsheet
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|s| s.properties.and_then(|p| p.title))
            .collect())
    }

    async fn add_tab(&self, dest: &Destination) -> Result<(), SheetsError> {
        let req = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![Request {
                add_sheet: Some(AddSheetRequest {
                    properties: Some(SheetProperties {
                        title: Some(dest.tab.clone()),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };

        self.hub
            .spreadsheets()
            .batch_update(req, &dest.spreadsheet_id)
            .add_scope(SPREADSHEETS_SCOPE)
            .doit()
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn read_header(&self, dest: &Destination) -> Result<Vec<String>, SheetsError> {
        let (_, range) = self
            .hub
            .spreadsheets()
            .values_get(&dest.spreadsheet_id, &dest.header_range())
            .add_scope(SPREADSHEETS_SCOPE)
            .doit()
            .await
            .map_err(map_error)?;

        Ok(range
            .values
            .unwrap_or_default()
            .into_iter()
            .next()
            .unwrap_or_default()
            .into_iter()
            .map(cell_text)
            .collect())
    }

    async fn append_rows(
        &self,
        dest: &Destination,
        rows: Vec<Vec<String>>,
    ) -> Result<usize, SheetsError> {
        let sent = rows.len();
        let body = ValueRange {
            major_dimension: Some("ROWS".to_string()),
            values: Some(
                rows.into_iter()
                    .map(|r| r.into_iter().map(Value::String).collect())
                    .collect(),
            ),
            ..Default::default()
        };

        let (_, resp) = self
            .hub
            .spreadsheets()
            .values_append(body, &dest.spreadsheet_id, &dest.tab_range())
            .value_input_option(&self.value_input_option)
            .insert_data_option("INSERT_ROWS")
            .add_scope(SPREADSHEETS_SCOPE)
            .doit()
            .await
            .map_err(map_error)?;

        let written = resp
            .updates
            .and_then(|u| u.updated_rows)
            .map(|n| n.max(0) as usize)
            .unwrap_or(sent);
        Ok(written)
    }
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn map_error(err: google_sheets4::Error) -> SheetsError {
    use google_sheets4::Error;

    match err {
        Error::MissingToken(e) => SheetsError::Unauthorized(e.to_string()),
        Error::BadRequest(body) => {
            let message = body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string());
            match body["error"]["code"].as_u64() {
                Some(401) | Some(403) => SheetsError::Unauthorized(message),
                _ => SheetsError::Rejected(message),
            }
        }
        Error::Failure(resp) => {
            let status = resp.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                SheetsError::Unauthorized(format!("HTTP {status}"))
            } else {
                SheetsError::Rejected(format!("HTTP {status}"))
            }
        }
        Error::HttpError(e) => SheetsError::Transport(e.to_string()),
        Error::Io(e) => SheetsError::Transport(e.to_string()),
        other => SheetsError::Rejected(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_permission_denied_maps_to_unauthorized() {
        let body = json!({
            "error": { "code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED" }
        });
        assert_eq!(
            map_error(google_sheets4::Error::BadRequest(body)),
            SheetsError::Unauthorized("The caller does not have permission".to_string())
        );
    }

    #[test]
    fn test_invalid_range_maps_to_rejected() {
        let body = json!({
            "error": { "code": 400, "message": "Unable to parse range: 'Raw Data'", "status": "INVALID_ARGUMENT" }
        });
        assert!(matches!(
            map_error(google_sheets4::Error::BadRequest(body)),
            SheetsError::Rejected(m) if m.contains("Unable to parse range")
        ));
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(json!("Posting Date")), "Posting Date");
        assert_eq!(cell_text(json!(12.5)), "12.5");
        assert_eq!(cell_text(Value::Null), "");
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_key() {
        let cred = ServiceAccountCredential::from_json("{\"type\": \"service_account\"}");
        let err = GoogleSheets::connect(&cred).await.err().unwrap();
        assert!(matches!(err, SheetsError::Unauthorized(_)));
    }
}
