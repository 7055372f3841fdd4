use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Recorded in place of a product field the page does not carry.
pub const MISSING_FIELD: &str = "N/A";

/// The product fields pulled from one shop article page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedFields {
    pub description: String,
    pub price: String,
    pub unit_content: String,
    pub price_per_unit: String,
}

impl Default for ScrapedFields {
    fn default() -> Self {
        Self {
            description: MISSING_FIELD.to_string(),
            price: MISSING_FIELD.to_string(),
            unit_content: MISSING_FIELD.to_string(),
            price_per_unit: MISSING_FIELD.to_string(),
        }
    }
}

/// One entry of the scraped-record file: either the structured fields or
/// the error that replaced them. Serialized untagged so the on-disk shape
/// stays a plain object in both cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArticleRecord {
    Fields(ScrapedFields),
    Error { error: String },
}

impl ArticleRecord {
    pub fn is_error(&self) -> bool {
        matches!(self, ArticleRecord::Error { .. })
    }

    pub fn fields(&self) -> Option<&ScrapedFields> {
        match self {
            ArticleRecord::Fields(fields) => Some(fields),
            ArticleRecord::Error { .. } => None,
        }
    }
}

/// Scrape results keyed by article URL. BTreeMap keeps the file ordering
/// stable between runs.
pub type ArticleRecords = BTreeMap<String, ArticleRecord>;

/// Public image URLs keyed by the uploaded file name.
pub type UploadedImages = BTreeMap<String, String>;
