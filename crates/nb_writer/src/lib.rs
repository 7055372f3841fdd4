//! Turns the gathered artifacts into the dated newsletter file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::{info, warn};

use nb_core::artifacts;
use nb_core::compose::{ComposeInput, Composer};
use nb_core::{Error, Result};

/// Read a text file, naming the path in any failure.
pub fn read_file_content(path: &Path) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::File(format!("Error reading file {}: {}", path.display(), e)))
}

/// Models tend to wrap their HTML in a Markdown fence. Strip it when
/// present; the match is greedy, so it spans from the first ```html to the
/// last ``` and drops anything the model wrote around the fence.
pub fn strip_html_fence(content: &str) -> String {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| Regex::new(r"(?s)```html(.*)```").unwrap());

    match fence.captures(content).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim().to_string(),
        None => content.to_string(),
    }
}

/// `Newsletter_YYYYMMDD.html`, dating each issue by its run.
pub fn dated_filename(base: &str, date: NaiveDate) -> String {
    format!("{}_{}.html", base, date.format("%Y%m%d"))
}

/// Strip any fence and save the issue under its dated name.
pub fn write_newsletter(html: &str, base: &str, date: NaiveDate, out_dir: &Path) -> Result<PathBuf> {
    let path = out_dir.join(dated_filename(base, date));
    fs::write(&path, strip_html_fence(html))
        .map_err(|e| Error::File(format!("Error saving newsletter {}: {}", path.display(), e)))?;
    info!("📰 Newsletter successfully saved to {}", path.display());
    Ok(path)
}

/// What the write stage reads and where the issue lands.
#[derive(Debug, Clone)]
pub struct WriteStageConfig {
    pub instructions_path: PathBuf,
    pub style_example_path: Option<PathBuf>,
    pub records_path: PathBuf,
    pub image_urls_path: Option<PathBuf>,
    pub base_filename: String,
    pub out_dir: PathBuf,
}

/// Gather the artifacts, compose the issue and save it. Instructions and
/// records are required; a missing style example or image-URL file only
/// costs its section.
pub async fn write_stage(
    composer: &dyn Composer,
    cfg: &WriteStageConfig,
    date: NaiveDate,
) -> Result<String> {
    let instructions = read_file_content(&cfg.instructions_path)?;
    let records = artifacts::load_records(&cfg.records_path)?;

    let style_example = match &cfg.style_example_path {
        Some(path) => match read_file_content(path) {
            Ok(content) => Some(content),
            Err(e) => {
                warn!("Proceeding without a style example: {}", e);
                None
            }
        },
        None => None,
    };

    let image_urls = match &cfg.image_urls_path {
        Some(path) => match artifacts::load_image_urls(path) {
            Ok(urls) => Some(urls),
            Err(e) => {
                warn!("Proceeding without uploaded image URLs: {}", e);
                None
            }
        },
        None => None,
    };

    let input = ComposeInput {
        instructions,
        records,
        image_urls,
        style_example,
        date: date.format("%d.%m.%Y").to_string(),
    };

    info!("🧠 Composing the newsletter with the {} model", composer.name());
    let html = composer.compose(&input).await?;
    let path = write_newsletter(&html, &cfg.base_filename, date, &cfg.out_dir)?;

    Ok(format!("Successfully saved newsletter to {}", path.display()))
}
