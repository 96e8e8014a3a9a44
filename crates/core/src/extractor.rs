use crate::error::BotError;
use crate::models::IngestionLimits;
use lopdf::Document;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor {
    /// Returns one entry per page in document order, blank pages included.
    /// A document with more than `max_pages` pages is refused before any
    /// page text is pulled out.
    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<PageText>, BotError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, bytes: &[u8], max_pages: usize) -> Result<Vec<PageText>, BotError> {
        // The parsed document is owned here and dropped on every return path.
        let document =
            Document::load_mem(bytes).map_err(|error| BotError::Extraction(error.to_string()))?;

        let page_ids = document.get_pages();
        if page_ids.len() > max_pages {
            return Err(BotError::Validation(format!(
                "document has {} pages, limit is {max_pages}",
                page_ids.len()
            )));
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for page_no in page_ids.into_keys() {
            let text = document.extract_text(&[page_no]).map_err(|error| {
                BotError::Extraction(format!("page {page_no}: {error}"))
            })?;

            pages.push(PageText {
                number: page_no,
                text,
            });
        }

        Ok(pages)
    }
}

pub fn extract_page_texts(
    bytes: &[u8],
    limits: &IngestionLimits,
) -> Result<Vec<PageText>, BotError> {
    LopdfExtractor.extract_pages(bytes, limits.max_pages)
}

/// Reads an uploaded PDF from disk, refusing files larger than the limit
/// before any bytes are loaded.
pub async fn read_pdf_file(path: &Path, limits: &IngestionLimits) -> Result<Vec<u8>, BotError> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(BotError::Validation(format!(
            "not a file: {}",
            path.display()
        )));
    }
    if metadata.len() > limits.max_bytes {
        return Err(BotError::Validation(format!(
            "{} is {} bytes, limit is {}",
            path.display(),
            metadata.len(),
            limits.max_bytes
        )));
    }

    Ok(tokio::fs::read(path).await?)
}


#[cfg(test)]
mod tests {
    use super::test_pdf::build_pdf;
    use super::{extract_page_texts, read_pdf_file};
    use crate::{BotError, IngestionLimits};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn pages_come_back_in_document_order() {
        let bytes = build_pdf(&["first page", "second page", "third page"]);
        let pages =
            extract_page_texts(&bytes, &IngestionLimits::default()).expect("pdf should parse");

        assert_eq!(pages.len(), 3);
        assert_eq!(
            pages.iter().map(|page| page.number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(pages[0].text.contains("first page"));
        assert!(pages[2].text.contains("third page"));
    }

    #[test]
    fn garbage_bytes_are_an_extraction_error() {
        let result = extract_page_texts(b"%PDF-1.4\n%broken", &IngestionLimits::default());
        assert!(matches!(result, Err(BotError::Extraction(_))));
    }

    #[test]
    fn page_limit_is_checked_before_extraction() {
        let bytes = build_pdf(&["one", "two", "three"]);
        let limits = IngestionLimits {
            max_pages: 2,
            ..IngestionLimits::default()
        };

        let result = extract_page_texts(&bytes, &limits);
        assert!(
            matches!(&result, Err(BotError::Validation(message)) if message.contains("3 pages")),
            "unexpected result {result:?}"
        );
    }

    #[tokio::test]
    async fn oversized_files_are_rejected_before_reading() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let path = dir.path().join("big.pdf");
        fs::write(&path, vec![b'x'; 64])?;

        let limits = IngestionLimits {
            max_bytes: 16,
            max_pages: 10,
        };
        let result = read_pdf_file(&path, &limits).await;
        assert!(matches!(result, Err(BotError::Validation(_))));

        let relaxed = IngestionLimits::default();
        let bytes = read_pdf_file(&path, &relaxed).await?;
        assert_eq!(bytes.len(), 64);
        Ok(())
    }
}
