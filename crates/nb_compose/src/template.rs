use async_trait::async_trait;
use tracing::debug;

use nb_core::compose::{ComposeInput, Composer};
use nb_core::Result;

/// Deterministic offline renderer. Lays the scraped products out in a plain
/// issue without calling any model service, so a run can finish without
/// credentials.
pub struct TemplateComposer;

impl TemplateComposer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TemplateComposer {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[async_trait]
impl Composer for TemplateComposer {
    fn name(&self) -> &str {
        "template"
    }

    async fn compose(&self, input: &ComposeInput) -> Result<String> {
        // Records are keyed by URL and image URLs by file name, so there is
        // no shared key. Both maps iterate in a stable order; pair them up
        // positionally.
        let mut images = input
            .image_urls
            .iter()
            .flat_map(|urls| urls.values())
            .cloned();

        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html lang=\"de\">\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        html.push_str(&format!("<title>Newsletter {}</title>\n", input.date));
        html.push_str("</head>\n<body>\n");
        html.push_str(&format!("<h1>Newsletter vom {}</h1>\n", input.date));

        let mut skipped = 0;
        for (url, record) in &input.records {
            let fields = match record.fields() {
                Some(fields) => fields,
                None => {
                    skipped += 1;
                    continue;
                }
            };

            html.push_str("<article>\n");
            if let Some(image) = images.next() {
                html.push_str(&format!(
                    "<img src=\"{}\" alt=\"\" height=\"300\">\n",
                    escape_html(&image)
                ));
            }
            for line in fields.description.lines() {
                html.push_str(&format!("<p>{}</p>\n", escape_html(line)));
            }
            html.push_str(&format!(
                "<p><strong>{}</strong> ({}, {})</p>\n",
                escape_html(&fields.price),
                escape_html(&fields.unit_content),
                escape_html(&fields.price_per_unit)
            ));
            html.push_str(&format!(
                "<p><a href=\"{}\">Zum Artikel</a></p>\n",
                escape_html(url)
            ));
            html.push_str("</article>\n");
        }

        if skipped > 0 {
            debug!("Left {} unreachable articles out of the issue", skipped);
        }

        html.push_str("</body>\n</html>\n");
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nb_core::types::{ArticleRecord, ArticleRecords, ScrapedFields, UploadedImages};

    fn input_with(records: ArticleRecords, image_urls: Option<UploadedImages>) -> ComposeInput {
        ComposeInput {
            instructions: "egal".to_string(),
            records,
            image_urls,
            style_example: None,
            date: "22.08.2026".to_string(),
        }
    }

    #[tokio::test]
    async fn renders_products_and_drops_error_records() {
        let mut records = ArticleRecords::new();
        records.insert(
            "https://shop.example/p/feigen".to_string(),
            ArticleRecord::Fields(ScrapedFields {
                description: "Süße Feigen.\nSonnengetrocknet.".to_string(),
                price: "4,99 €".to_string(),
                unit_content: "250 g".to_string(),
                price_per_unit: "19,96 € / 1 kg".to_string(),
            }),
        );
        records.insert(
            "https://shop.example/p/weg".to_string(),
            ArticleRecord::Error {
                error: "Error fetching or parsing URL: HTTP 404".to_string(),
            },
        );

        let html = TemplateComposer::new()
            .compose(&input_with(records, None))
            .await
            .unwrap();

        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Newsletter vom 22.08.2026"));
        assert!(html.contains("<p>Süße Feigen.</p>"));
        assert!(html.contains("<p>Sonnengetrocknet.</p>"));
        assert!(html.contains("4,99 €"));
        assert!(!html.contains("HTTP 404"));
        assert_eq!(html.matches("<article>").count(), 1);
    }

    #[tokio::test]
    async fn pairs_images_with_products_in_order() {
        let mut records = ArticleRecords::new();
        records.insert(
            "https://shop.example/p/feigen".to_string(),
            ArticleRecord::Fields(ScrapedFields::default()),
        );
        let mut urls = UploadedImages::new();
        urls.insert(
            "feigen_300.jpg".to_string(),
            "https://shop.example/media/feigen_300.jpg".to_string(),
        );

        let html = TemplateComposer::new()
            .compose(&input_with(records, Some(urls)))
            .await
            .unwrap();
        assert!(html.contains(r#"<img src="https://shop.example/media/feigen_300.jpg""#));
    }

    #[tokio::test]
    async fn escapes_markup_in_scraped_text() {
        let mut records = ArticleRecords::new();
        records.insert(
            "https://shop.example/p/x".to_string(),
            ArticleRecord::Fields(ScrapedFields {
                description: "<script>alert(1)</script>".to_string(),
                ..ScrapedFields::default()
            }),
        );

        let html = TemplateComposer::new()
            .compose(&input_with(records, None))
            .await
            .unwrap();
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>"));
    }
}
