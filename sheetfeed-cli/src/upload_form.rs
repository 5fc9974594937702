use axum::extract::Multipart;
use axum::http::StatusCode;

/// The statement file taken from the form, held in memory only.
pub struct UploadedPdf {
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug)]
pub struct FormError {
    pub status: StatusCode,
    pub message: String,
}

impl FormError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Read the `pdf` field of a multipart upload. Other fields are drained and ignored.
pub async fn read_pdf_field(mut multipart: Multipart) -> Result<UploadedPdf, FormError> {
    let mut file: Option<UploadedPdf> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FormError::new(e.status(), format!("Failed to read form field: {}", e.body_text())))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "pdf" => {
                let file_name = field.file_name().unwrap_or("statement.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| FormError::new(e.status(), format!("Failed to read file data: {}", e.body_text())))?
                    .to_vec();
                file = Some(UploadedPdf { file_name, data });
            }
            _ => {
                let _ = field.bytes().await;
            }
        }
    }

    file.ok_or_else(|| FormError::new(StatusCode::BAD_REQUEST, "No file uploaded (expected a `pdf` field)"))
}
