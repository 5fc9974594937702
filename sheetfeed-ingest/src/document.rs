//! In-memory PDF ingestion.
//!
//! The uploaded bytes are parsed once and dropped; nothing is written to disk.

use std::collections::BTreeMap;
use std::fmt;

use lopdf::{Document, ObjectId};
use sheetfeed_core::InputError;

use crate::layout;

const PDF_MAGIC: &[u8] = b"%PDF-";
/// Readers accept a header preceded by junk within the first 1024 bytes.
const MAGIC_WINDOW: usize = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestLimits {
    pub max_bytes: Option<usize>,
}

/// One uploaded statement, owned by the request that received it.
pub struct StatementDocument {
    file_name: String,
    size: usize,
    pdf: Document,
    pages: BTreeMap<u32, ObjectId>,
    numbers: Vec<u32>,
}

impl StatementDocument {
    pub fn from_upload(
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        limits: &IngestLimits,
    ) -> Result<Self, InputError> {
        let file_name = file_name.into();
        let size = bytes.len();

        if size == 0 {
            return Err(InputError::Empty);
        }
        if let Some(limit) = limits.max_bytes {
            if size > limit {
                return Err(InputError::TooLarge { size, limit });
            }
        }
        if !has_pdf_magic(&bytes) {
            return Err(InputError::NotPdf);
        }

        let pdf = match Document::load_mem(&bytes) {
            Ok(pdf) => pdf,
            Err(_) if mentions_encrypt(&bytes) => return Err(InputError::Encrypted),
            Err(e) => {
                return Err(InputError::Unreadable {
                    detail: e.to_string(),
                });
            }
        };
        drop(bytes);

        if pdf.trailer.get(b"Encrypt").is_ok() {
            return Err(InputError::Encrypted);
        }

        let pages = pdf.get_pages();
        if pages.is_empty() {
            return Err(InputError::Unreadable {
                detail: "document has no pages".to_string(),
            });
        }

        tracing::debug!(file = %file_name, size, pages = pages.len(), "statement loaded");
        Ok(Self {
            file_name,
            size,
            numbers: pages.keys().copied().collect(),
            pdf,
            pages,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Page numbers in document order (1-based).
    pub fn page_numbers(&self) -> &[u32] {
        &self.numbers
    }

    /// Text of one page laid out by glyph position: one line per baseline,
    /// horizontal gaps rendered as spaces. A page whose content cannot be
    /// decoded yields an empty string.
    pub fn page_text(&self, page: u32) -> String {
        let Some(&page_id) = self.pages.get(&page) else {
            return String::new();
        };
        match layout::page_glyphs(&self.pdf, page_id) {
            Ok(glyphs) => layout::render_lines(&glyphs),
            Err(e) => {
                tracing::warn!(file = %self.file_name, page, error = %e, "page text extraction failed");
                String::new()
            }
        }
    }
}

impl fmt::Debug for StatementDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementDocument")
            .field("file_name", &self.file_name)
            .field("size", &self.size)
            .field("pages", &self.pages.len())
            .finish()
    }
}

fn has_pdf_magic(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(MAGIC_WINDOW)];
    window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
}

fn mentions_encrypt(bytes: &[u8]) -> bool {
    bytes.windows(8).any(|w| w == b"/Encrypt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_upload() {
        let err = StatementDocument::from_upload("a.pdf", Vec::new(), &IngestLimits::default())
            .unwrap_err();
        assert_eq!(err, InputError::Empty);
    }

    #[test]
    fn test_size_limit() {
        let limits = IngestLimits {
            max_bytes: Some(4),
        };
        let err = StatementDocument::from_upload("a.pdf", b"%PDF-1.5".to_vec(), &limits)
            .unwrap_err();
        assert_eq!(err, InputError::TooLarge { size: 8, limit: 4 });
    }

    #[test]
    fn test_not_a_pdf() {
        let err = StatementDocument::from_upload(
            "notes.txt",
            b"Date,Description,Amount\n".to_vec(),
            &IngestLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err, InputError::NotPdf);
    }

    #[test]
    fn test_truncated_pdf_is_unreadable() {
        let err = StatementDocument::from_upload(
            "broken.pdf",
            b"%PDF-1.5\n1 0 obj\n<<".to_vec(),
            &IngestLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, InputError::Unreadable { .. }));
    }

    fn minimal_pdf(encrypt: bool) -> Vec<u8> {
        use lopdf::{dictionary, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        if encrypt {
            let encrypt_id = doc.add_object(dictionary! {
                "Filter" => "Standard",
                "V" => 1,
                "R" => 2,
                "O" => Object::string_literal(vec![0u8; 32]),
                "U" => Object::string_literal(vec![0u8; 32]),
                "P" => -44,
            });
            doc.trailer.set("Encrypt", encrypt_id);
        }
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_plain_pdf_loads() {
        let doc = StatementDocument::from_upload("a.pdf", minimal_pdf(false), &IngestLimits::default())
            .unwrap();
        assert_eq!(doc.page_numbers(), &[1]);
        assert_eq!(doc.page_text(1), "");
    }

    #[test]
    fn test_encrypt_entry_in_trailer() {
        let err = StatementDocument::from_upload("locked.pdf", minimal_pdf(true), &IngestLimits::default())
            .unwrap_err();
        assert_eq!(err, InputError::Encrypted);
    }

    #[test]
    fn test_unparseable_encrypted_pdf() {
        let err = StatementDocument::from_upload(
            "locked.pdf",
            b"%PDF-1.7\ntrailer << /Encrypt 9 0 R /Root 1 0 R >>".to_vec(),
            &IngestLimits::default(),
        )
        .unwrap_err();
        assert_eq!(err, InputError::Encrypted);
    }

    #[test]
    fn test_magic_after_leading_junk() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert!(has_pdf_magic(&bytes));

        let mut far = vec![b' '; MAGIC_WINDOW];
        far.extend_from_slice(b"%PDF-1.4");
        assert!(!has_pdf_magic(&far));
    }
}
