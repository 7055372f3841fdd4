//! Pulls the product fields off the shop's article pages.

use std::path::Path;

use scraper::{Html, Selector};
use tracing::{info, warn};

use nb_core::artifacts;
use nb_core::fetch::Fetcher;
use nb_core::types::{ArticleRecord, ArticleRecords, ScrapedFields, MISSING_FIELD};
use nb_core::Result;

const DESCRIPTION: &str = "div[itemprop='description']";
const PRICE: &str = ".product-detail-price";
const UNIT_CONTENT: &str = ".price-unit-content";
const PRICE_PER_UNIT: &str = ".price-unit-reference-content";

fn text_of(document: &Html, css: &str) -> Option<String> {
    document
        .select(&Selector::parse(css).unwrap())
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

// The description spans several block elements; keep them apart with
// newlines instead of mashing the text together.
fn block_text_of(document: &Html, css: &str) -> Option<String> {
    document.select(&Selector::parse(css).unwrap()).next().map(|el| {
        el.text()
            .map(str::trim)
            .filter(|chunk| !chunk.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    })
}

/// Extract the four product fields from one page. A field whose selector
/// matches nothing becomes the placeholder; this never fails.
pub fn parse_product(html: &str) -> ScrapedFields {
    let document = Html::parse_document(html);
    let or_missing = |text: Option<String>| text.unwrap_or_else(|| MISSING_FIELD.to_string());

    ScrapedFields {
        description: or_missing(block_text_of(&document, DESCRIPTION)),
        price: or_missing(text_of(&document, PRICE)),
        unit_content: or_missing(text_of(&document, UNIT_CONTENT)),
        price_per_unit: or_missing(text_of(&document, PRICE_PER_UNIT)),
    }
}

/// Scrape every URL and persist the keyed records to `output`. A URL that
/// cannot be fetched gets an error record; the batch always covers the full
/// input list.
pub async fn scrape_articles(
    fetcher: &dyn Fetcher,
    urls: &[String],
    output: &Path,
) -> Result<String> {
    let mut records = ArticleRecords::new();

    for url in urls {
        info!("🛒 Scraping product data from {}", url);
        match fetcher.fetch_text(url).await {
            Ok(html) => {
                records.insert(url.clone(), ArticleRecord::Fields(parse_product(&html)));
            }
            Err(e) => {
                warn!("Failed to scrape {}: {}", url, e);
                records.insert(
                    url.clone(),
                    ArticleRecord::Error {
                        error: format!("Error fetching or parsing URL: {}", e),
                    },
                );
            }
        }
    }

    artifacts::save_records(&records, output)?;

    let message = format!(
        "Successfully saved structured data for {} articles to {}",
        records.len(),
        output.display()
    );
    info!("💾 {}", message);
    Ok(message)
}
