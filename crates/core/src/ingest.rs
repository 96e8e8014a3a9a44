use crate::dedup::unique_texts;
use crate::embeddings::Embedder;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::index::VectorIndexClient;
use crate::models::{IngestionLimits, IngestionReport};
use crate::traits::VectorStore;
use crate::BotError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{info, warn};

pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub async fn ingest_pdf<S, E>(
    bytes: &[u8],
    index: &VectorIndexClient<S, E>,
    collection: &str,
    limits: &IngestionLimits,
) -> Result<IngestionReport, BotError>
where
    S: VectorStore,
    E: Embedder,
{
    ingest_pdf_with(&LopdfExtractor, bytes, index, collection, limits).await
}

/// Extract, drop blank pages, dedup, then embed and upsert what is left.
pub async fn ingest_pdf_with<X, S, E>(
    extractor: &X,
    bytes: &[u8],
    index: &VectorIndexClient<S, E>,
    collection: &str,
    limits: &IngestionLimits,
) -> Result<IngestionReport, BotError>
where
    X: PdfExtractor + ?Sized,
    S: VectorStore,
    E: Embedder,
{
    if bytes.len() as u64 > limits.max_bytes {
        return Err(BotError::Validation(format!(
            "upload is {} bytes, limit is {}",
            bytes.len(),
            limits.max_bytes
        )));
    }

    let checksum = digest_bytes(bytes);
    let pages = extractor.extract_pages(bytes, limits.max_pages)?;

    let page_count = pages.len();
    let mut first_page = HashMap::new();
    let mut texts = Vec::with_capacity(page_count);
    let mut blank_pages = 0usize;
    for page in pages {
        if page.text.trim().is_empty() {
            blank_pages += 1;
            continue;
        }
        first_page.entry(page.text.clone()).or_insert(page.number);
        texts.push(page.text);
    }
    if blank_pages > 0 {
        warn!(checksum = %checksum, blank_pages, "skipping pages without text");
    }

    let records = unique_texts(texts)
        .into_iter()
        .map(|text| {
            let page = first_page.get(&text).copied();
            (text, page)
        })
        .collect::<Vec<_>>();
    let unique_pages = records.len();

    let record_ids = index.upsert_pages(collection, &records).await?;
    info!(
        checksum = %checksum,
        page_count,
        unique_pages,
        collection,
        "document indexed"
    );

    Ok(IngestionReport {
        checksum,
        page_count,
        blank_pages,
        unique_pages,
        record_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::{digest_bytes, ingest_pdf, ingest_pdf_with};
    use crate::embeddings::DEFAULT_EMBEDDING_DIMENSIONS;
    use crate::extractor::test_pdf::build_pdf;
    use crate::extractor::{PageText, PdfExtractor};
    use crate::index::test_support::CountingEmbedder;
    use crate::stores::MemoryStore;
    use crate::{BotError, IngestionLimits, RetryPolicy, VectorIndexClient};

    struct FixedPages(Vec<&'static str>);

    impl PdfExtractor for FixedPages {
        fn extract_pages(
            &self,
            _bytes: &[u8],
            _max_pages: usize,
        ) -> Result<Vec<PageText>, BotError> {
            Ok(self
                .0
                .iter()
                .enumerate()
                .map(|(index, text)| PageText {
                    number: index as u32 + 1,
                    text: text.to_string(),
                })
                .collect())
        }
    }

    async fn index() -> VectorIndexClient<MemoryStore, CountingEmbedder> {
        let client = VectorIndexClient::new(
            MemoryStore::new(),
            CountingEmbedder::default(),
            RetryPolicy::single_attempt(),
        );
        client
            .create_collection("pdfbot", DEFAULT_EMBEDDING_DIMENSIONS as i64)
            .await
            .expect("collection");
        client
    }

    #[test]
    fn checksum_is_reproducible() {
        assert_eq!(digest_bytes(b"abc"), digest_bytes(b"abc"));
        assert_ne!(digest_bytes(b"abc"), digest_bytes(b"abd"));
    }

    #[tokio::test]
    async fn three_pages_with_a_repeat_index_two_texts() {
        let client = index().await;
        let bytes = build_pdf(&[
            "Safety notice: wear protective gloves.",
            "Calibrate the torque wrench to forty newton metres.",
            "Safety notice: wear protective gloves.",
        ]);

        let report = ingest_pdf(&bytes, &client, "pdfbot", &IngestionLimits::default())
            .await
            .expect("ingestion");

        assert_eq!(report.page_count, 3);
        assert_eq!(report.unique_pages, 2);
        assert_eq!(report.record_ids.len(), 2);

        let hits = client
            .similarity_search("pdfbot", "torque wrench calibration", 4)
            .await
            .expect("search");
        assert!(hits[0].text.contains("torque wrench"));

        let fetched = client
            .fetch_by_ids("pdfbot", &report.record_ids)
            .await
            .expect("fetch");
        assert!(fetched.is_complete());
        let mut pages = fetched
            .found
            .iter()
            .filter_map(|record| record.page)
            .collect::<Vec<_>>();
        pages.sort_unstable();
        assert_eq!(pages, vec![1, 2]);
    }

    #[tokio::test]
    async fn blank_document_makes_no_embedding_call() {
        let client = index().await;
        let extractor = FixedPages(vec!["", "   \n"]);

        let report = ingest_pdf_with(
            &extractor,
            b"%PDF-1.4",
            &client,
            "pdfbot",
            &IngestionLimits::default(),
        )
        .await
        .expect("empty ingestion is fine");

        assert_eq!(report.page_count, 2);
        assert_eq!(report.blank_pages, 2);
        assert!(report.record_ids.is_empty());
        assert_eq!(client.embedder().calls(), 0);
    }

    #[tokio::test]
    async fn page_limit_is_enforced() {
        let client = index().await;
        let bytes = build_pdf(&["a page", "b page", "c page"]);
        let limits = IngestionLimits {
            max_pages: 2,
            ..IngestionLimits::default()
        };

        let result = ingest_pdf(&bytes, &client, "pdfbot", &limits).await;
        assert!(matches!(result, Err(BotError::Validation(_))));
        assert_eq!(client.embedder().calls(), 0);
    }

    #[tokio::test]
    async fn corrupt_upload_is_an_extraction_error() {
        let client = index().await;
        let result = ingest_pdf(
            b"definitely not a pdf",
            &client,
            "pdfbot",
            &IngestionLimits::default(),
        )
        .await;
        assert!(matches!(result, Err(BotError::Extraction(_))));
    }

    #[tokio::test]
    async fn missing_collection_is_reported() {
        let client = VectorIndexClient::new(
            MemoryStore::new(),
            CountingEmbedder::default(),
            RetryPolicy::single_attempt(),
        );
        let extractor = FixedPages(vec!["content"]);

        let result = ingest_pdf_with(
            &extractor,
            b"%PDF-1.4",
            &client,
            "pdfbot",
            &IngestionLimits::default(),
        )
        .await;
        assert!(matches!(result, Err(BotError::CollectionNotFound(_))));
    }
}
