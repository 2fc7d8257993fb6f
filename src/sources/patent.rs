//! Patent document search and download, grounded in the original
//! corpus's `PatentPDFDownloader.process_smile` (structure-keyed patent
//! search, used when `--retrieval_mode` includes a patent leg).
use crate::error::Result;
use crate::expansion::DocumentSource;
use crate::sources::pdf::PdfRenderer;
use serde::Deserialize;

pub struct PatentDocumentSource<'a> {
    client: reqwest::Client,
    base_url: String,
    renderer: &'a dyn PdfRenderer,
}

impl<'a> PatentDocumentSource<'a> {
    pub fn new(client: reqwest::Client, base_url: String, renderer: &'a dyn PdfRenderer) -> Self {
        Self {
            client,
            base_url,
            renderer,
        }
    }
}

#[derive(Deserialize)]
struct PatentSearchResponse {
    patents: Vec<PatentHit>,
}

#[derive(Deserialize)]
struct PatentHit {
    pdf_url: String,
}

#[async_trait::async_trait]
impl<'a> DocumentSource for PatentDocumentSource<'a> {
    /// Searches by structure query parameter; the patent index accepts
    /// either a bare name or a structural string, so `substance` is passed
    /// through unresolved (matching `looks_like_structural_key`'s either/or
    /// handling on the Name Resolver side).
    async fn fetch(&self, substance: &str, num_results: u32) -> Result<Vec<String>> {
        let search_url = format!(
            "{}/search?structure={}&max_patents={}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(substance),
            num_results,
        );
        let hits: PatentSearchResponse = self
            .client
            .get(&search_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut texts = Vec::new();
        for hit in hits.patents {
            let bytes = self.client.get(&hit.pdf_url).send().await?.bytes().await?;
            if let Ok(text) = self.renderer.render_to_text(&bytes) {
                texts.push(text);
            }
        }
        Ok(texts)
    }
}
