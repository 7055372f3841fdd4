//! Runs the four stages of a newsletter issue in their fixed order.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use nb_core::compose::Composer;
use nb_core::fetch::Fetcher;
use nb_core::{Error, Result};
use nb_upload::{AdminCredentials, MediaConsole};
use nb_writer::WriteStageConfig;

/// One step of the run. Images come first so the upload stage has files to
/// work with; scraping and writing follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Images,
    Upload,
    Scrape,
    Write,
    Done,
}

impl Stage {
    /// The fixed transition order; upload is entered only when enabled.
    pub fn next(self, with_upload: bool) -> Stage {
        match self {
            Stage::Images if with_upload => Stage::Upload,
            Stage::Images => Stage::Scrape,
            Stage::Upload => Stage::Scrape,
            Stage::Scrape => Stage::Write,
            Stage::Write => Stage::Done,
            Stage::Done => Stage::Done,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Images => "images",
            Stage::Upload => "upload",
            Stage::Scrape => "scrape",
            Stage::Write => "write",
            Stage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// File locations and run options, assembled once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub article_list_path: PathBuf,
    pub instructions_path: PathBuf,
    pub style_example_path: Option<PathBuf>,
    pub records_path: PathBuf,
    pub image_urls_path: PathBuf,
    pub image_dir: PathBuf,
    pub base_filename: String,
    pub out_dir: PathBuf,
    pub with_upload: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            article_list_path: PathBuf::from("Artikelliste_Newsletter.txt"),
            instructions_path: PathBuf::from("Newsletter-Instructions.txt"),
            style_example_path: None,
            records_path: PathBuf::from("scraped_texts.json"),
            image_urls_path: PathBuf::from("uploaded_image_urls.json"),
            image_dir: PathBuf::from("."),
            base_filename: "Newsletter".to_string(),
            out_dir: PathBuf::from("."),
            with_upload: true,
        }
    }
}

/// Stage confirmations collected over one run, in execution order.
#[derive(Debug, Default)]
pub struct RunReport {
    entries: Vec<(Stage, String)>,
}

impl RunReport {
    fn record(&mut self, stage: Stage, confirmation: impl Into<String>) {
        self.entries.push((stage, confirmation.into()));
    }

    pub fn entries(&self) -> &[(Stage, String)] {
        &self.entries
    }

    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|(stage, confirmation)| format!("{}: {}", stage, confirmation))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Read the article list: one URL per line, blank lines and `#` comments
/// skipped. An empty list is refused before any stage runs.
pub fn read_article_list(path: &Path) -> Result<Vec<String>> {
    let content = nb_writer::read_file_content(path)?;
    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        return Err(Error::File(format!(
            "No article URLs found in {}",
            path.display()
        )));
    }
    Ok(urls)
}

/// Wires the stages together. The fetcher, console and composer come in as
/// trait objects so runs can be assembled against fakes.
pub struct Pipeline {
    config: PipelineConfig,
    fetcher: Arc<dyn Fetcher>,
    console: Option<Arc<dyn MediaConsole>>,
    credentials: Option<AdminCredentials>,
    composer: Arc<dyn Composer>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn Fetcher>,
        console: Option<Arc<dyn MediaConsole>>,
        credentials: Option<AdminCredentials>,
        composer: Arc<dyn Composer>,
    ) -> Self {
        Self {
            config,
            fetcher,
            console,
            credentials,
            composer,
        }
    }

    /// Run every enabled stage for the given issue date. The first stage
    /// failure aborts the run; image processing itself skips per-article
    /// problems and never aborts on one bad page.
    pub async fn run(&self, date: NaiveDate) -> Result<RunReport> {
        let urls = read_article_list(&self.config.article_list_path)?;
        info!("🦗 Starting the newsletter run for {} articles", urls.len());

        let mut report = RunReport::default();
        let mut processed: Vec<PathBuf> = Vec::new();
        let mut stage = Stage::Images;

        while stage != Stage::Done {
            match stage {
                Stage::Images => {
                    processed = nb_images::process_images(
                        self.fetcher.as_ref(),
                        &urls,
                        &self.config.image_dir,
                    )
                    .await?;
                    report.record(stage, format!("processed {} images", processed.len()));
                }
                Stage::Upload => {
                    let console = self.console.as_deref().ok_or_else(|| {
                        Error::Upload("The upload stage needs an admin console".to_string())
                    })?;
                    let credentials = self.credentials.as_ref().ok_or_else(|| {
                        Error::Upload("The upload stage needs admin credentials".to_string())
                    })?;
                    let confirmation = nb_upload::upload_images(
                        console,
                        credentials,
                        &processed,
                        &self.config.image_urls_path,
                    )
                    .await?;
                    report.record(stage, confirmation);
                }
                Stage::Scrape => {
                    let confirmation = nb_scraper::scrape_articles(
                        self.fetcher.as_ref(),
                        &urls,
                        &self.config.records_path,
                    )
                    .await?;
                    report.record(stage, confirmation);
                }
                Stage::Write => {
                    let write_cfg = WriteStageConfig {
                        instructions_path: self.config.instructions_path.clone(),
                        style_example_path: self.config.style_example_path.clone(),
                        records_path: self.config.records_path.clone(),
                        image_urls_path: self
                            .config
                            .with_upload
                            .then(|| self.config.image_urls_path.clone()),
                        base_filename: self.config.base_filename.clone(),
                        out_dir: self.config.out_dir.clone(),
                    };
                    let confirmation =
                        nb_writer::write_stage(self.composer.as_ref(), &write_cfg, date).await?;
                    report.record(stage, confirmation);
                }
                Stage::Done => break,
            }
            stage = stage.next(self.config.with_upload);
        }

        info!("✨ Newsletter run finished");
        Ok(report)
    }
}
