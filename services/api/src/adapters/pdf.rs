//! services/api/src/adapters/pdf.rs
//!
//! Implements the `DocumentTextExtractor` port with `lopdf`. Parsing is CPU-bound,
//! so it runs on the blocking thread pool.

use async_trait::async_trait;
use lopdf::Document;
use study_kit_core::ports::{DocumentTextExtractor, PortError, PortResult};
use tracing::{debug, warn};

#[derive(Clone, Copy, Default)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

fn extract_pages_blocking(bytes: &[u8]) -> PortResult<Vec<Option<String>>> {
    let mut document = Document::load_mem(bytes)
        .map_err(|e| PortError::InvalidInput(format!("not a readable PDF: {}", e)))?;
    // Owner-password-only documents open with an empty user password.
    if document.is_encrypted() {
        document.decrypt("").map_err(|e| {
            PortError::InvalidInput(format!("the PDF is password protected: {}", e))
        })?;
        debug!("Decrypted PDF with the empty user password");
    }

    let pages = document
        .get_pages()
        .into_keys()
        .map(|number| match document.extract_text(&[number]) {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("No text extracted from page {}: {}", number, e);
                None
            }
        })
        .collect::<Vec<_>>();

    debug!("Parsed PDF with {} pages", pages.len());
    Ok(pages)
}

#[async_trait]
impl DocumentTextExtractor for LopdfExtractor {
    async fn extract_pages(&self, document: &[u8]) -> PortResult<Vec<Option<String>>> {
        let bytes = document.to_vec();
        tokio::task::spawn_blocking(move || extract_pages_blocking(&bytes))
            .await
            .map_err(|e| PortError::Unexpected(format!("PDF extraction task failed: {}", e)))?
    }
}
