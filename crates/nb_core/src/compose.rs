use async_trait::async_trait;

use crate::types::{ArticleRecords, UploadedImages};
use crate::Result;

/// Everything a composition model sees when producing the newsletter HTML.
#[derive(Debug, Clone)]
pub struct ComposeInput {
    /// The editor's instruction text, handed through verbatim.
    pub instructions: String,
    pub records: ArticleRecords,
    /// Public image URLs from the upload stage, when that stage ran.
    pub image_urls: Option<UploadedImages>,
    /// A previous issue used as a style reference.
    pub style_example: Option<String>,
    /// Issue date, preformatted as d.m.Y.
    pub date: String,
}

/// A model that turns the gathered inputs into a complete HTML document.
#[async_trait]
pub trait Composer: Send + Sync {
    fn name(&self) -> &str;

    async fn compose(&self, input: &ComposeInput) -> Result<String>;
}
