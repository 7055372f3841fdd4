//! Finds each article's product image, scales it and writes it out as JPEG.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use scraper::{Html, Selector};
use tracing::{info, warn};
use url::Url;

use nb_core::fetch::Fetcher;
use nb_core::{Error, Result};

/// Every processed image is scaled to this height; the width follows the
/// source aspect ratio.
pub const TARGET_HEIGHT: u32 = 300;

const OG_IMAGE: &str = "meta[property='og:image']";
const PRODUCT_IMAGE: &str = ".product--image-container img, div.image-slider--item img";

fn attr_of(document: &Html, css: &str, name: &str) -> Option<String> {
    document
        .select(&Selector::parse(css).unwrap())
        .next()
        .and_then(|el| el.value().attr(name))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

// Url::join resolves protocol-relative (//cdn…) and root-relative (/media…)
// candidates against the article page and passes absolute ones through.
fn resolve_against(article_url: &str, candidate: &str) -> Result<String> {
    let base = Url::parse(article_url)
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", article_url, e)))?;
    let resolved = base
        .join(candidate)
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", candidate, e)))?;
    Ok(resolved.to_string())
}

/// Locate the product image of an article page: the `og:image` meta tag
/// first, the product image containers as fallback. Returns `None` when the
/// page offers neither.
pub fn find_image_url(html: &str, article_url: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);

    let candidate = attr_of(&document, OG_IMAGE, "content")
        .or_else(|| attr_of(&document, PRODUCT_IMAGE, "src"));

    match candidate {
        Some(found) => Ok(Some(resolve_against(article_url, &found)?)),
        None => Ok(None),
    }
}

/// Derive the local file name: source basename without query or extension,
/// suffixed with the target height.
pub fn target_filename(image_url: &str) -> Result<String> {
    let parsed = Url::parse(image_url)
        .map_err(|e| Error::InvalidUrl(format!("{}: {}", image_url, e)))?;
    let basename = parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or("image");
    let stem = Path::new(basename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(basename);
    Ok(format!("{}_{}.jpg", stem, TARGET_HEIGHT))
}

/// Scale to the fixed height, width rounded from the source aspect ratio.
pub fn resize_to_target(img: &DynamicImage) -> DynamicImage {
    let ratio = img.width() as f64 / img.height() as f64;
    let width = (TARGET_HEIGHT as f64 * ratio).round() as u32;
    img.resize_exact(width.max(1), TARGET_HEIGHT, FilterType::Lanczos3)
}

async fn process_one(
    fetcher: &dyn Fetcher,
    article_url: &str,
    out_dir: &Path,
) -> Result<Option<PathBuf>> {
    let html = fetcher.fetch_text(article_url).await?;

    let image_url = match find_image_url(&html, article_url)? {
        Some(found) => found,
        None => {
            info!("No image URL found for {}", article_url);
            return Ok(None);
        }
    };

    let bytes = fetcher.fetch_bytes(&image_url).await?;
    let decoded = image::load_from_memory(&bytes)
        .map_err(|e| Error::Image(format!("{}: {}", image_url, e)))?;
    let resized = resize_to_target(&decoded);

    let path = out_dir.join(target_filename(&image_url)?);
    // JPEG has no alpha channel, so flatten to RGB before encoding.
    resized
        .to_rgb8()
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .map_err(|e| Error::Image(format!("{}: {}", path.display(), e)))?;

    let absolute = path
        .canonicalize()
        .map_err(|e| Error::File(format!("{}: {}", path.display(), e)))?;
    Ok(Some(absolute))
}

/// Download and convert the product image of every article. Failures and
/// pages without an image are skipped; the returned paths are the files
/// actually written, absolute so the upload stage can hand them to the
/// browser as-is.
pub async fn process_images(
    fetcher: &dyn Fetcher,
    urls: &[String],
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| Error::File(format!("{}: {}", out_dir.display(), e)))?;

    let mut written = Vec::new();
    for url in urls {
        info!("🖼️ Processing product image for {}", url);
        match process_one(fetcher, url, out_dir).await {
            Ok(Some(path)) => {
                info!("Saved {}", path.display());
                written.push(path);
            }
            Ok(None) => {}
            Err(e) => warn!("Image processing failed for {}: {}", url, e),
        }
    }

    info!("✨ Image processing complete, saved {} files", written.len());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::io::Cursor;

    use async_trait::async_trait;
    use image::{ImageOutputFormat, Rgb, RgbImage};

    struct StaticFetcher {
        pages: HashMap<String, String>,
        blobs: HashMap<String, Vec<u8>>,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch_text(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Scraping(format!("HTTP 404 for {}", url)))
        }

        async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
            self.blobs
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Scraping(format!("HTTP 404 for {}", url)))
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([180, 40, 40]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageOutputFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn og_image_wins_over_the_product_container() {
        let html = r#"
            <html><head>
                <meta property="og:image" content="https://cdn.example/media/feigen.png">
            </head><body>
                <div class="product--image-container"><img src="/media/fallback.png"></div>
            </body></html>
        "#;
        let found = find_image_url(html, "https://shop.example/p/1").unwrap();
        assert_eq!(found.as_deref(), Some("https://cdn.example/media/feigen.png"));
    }

    #[test]
    fn fallback_src_is_resolved_against_the_article() {
        let html = r#"<div class="image-slider--item"><img src="//cdn.example/media/datteln.png"></div>"#;
        let found = find_image_url(html, "https://shop.example/p/2").unwrap();
        assert_eq!(found.as_deref(), Some("https://cdn.example/media/datteln.png"));

        let html = r#"<div class="product--image-container"><img src="/media/datteln.png"></div>"#;
        let found = find_image_url(html, "https://shop.example/p/2").unwrap();
        assert_eq!(found.as_deref(), Some("https://shop.example/media/datteln.png"));
    }

    #[test]
    fn pages_without_an_image_yield_none() {
        let found = find_image_url("<html><body><p>kein Bild</p></body></html>", "https://shop.example/p/3");
        assert_eq!(found.unwrap(), None);
    }

    #[test]
    fn filename_drops_query_and_extension() {
        let name = target_filename("https://cdn.example/media/image/feigen.png?ts=1712").unwrap();
        assert_eq!(name, "feigen_300.jpg");
    }

    #[test]
    fn resize_keeps_the_aspect_ratio() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(600, 400, Rgb([0, 0, 0])));
        let resized = resize_to_target(&img);
        assert_eq!((resized.width(), resized.height()), (450, 300));

        let tall = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 400, Rgb([0, 0, 0])));
        let resized = resize_to_target(&tall);
        assert_eq!((resized.width(), resized.height()), (75, 300));
    }

    #[tokio::test]
    async fn batch_writes_jpegs_and_skips_failures() {
        let dir = tempfile::tempdir().unwrap();

        let with_image = "https://shop.example/p/feigen".to_string();
        let without_image = "https://shop.example/p/ohne-bild".to_string();
        let unreachable = "https://shop.example/p/weg".to_string();

        let fetcher = StaticFetcher {
            pages: HashMap::from([
                (
                    with_image.clone(),
                    r#"<meta property="og:image" content="https://cdn.example/media/feigen.png">"#.to_string(),
                ),
                (without_image.clone(), "<p>kein Bild</p>".to_string()),
            ]),
            blobs: HashMap::from([(
                "https://cdn.example/media/feigen.png".to_string(),
                png_bytes(600, 300),
            )]),
        };

        let urls = vec![with_image, without_image, unreachable];
        let written = process_images(&fetcher, &urls, dir.path()).await.unwrap();

        assert_eq!(written.len(), 1);
        assert!(written[0].is_absolute());
        assert!(written[0].ends_with("feigen_300.jpg"));

        let saved = image::open(&written[0]).unwrap();
        assert_eq!((saved.width(), saved.height()), (600, 300));
    }
}
