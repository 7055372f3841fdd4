use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use nb_core::fetch::HttpFetcher;
use nb_core::{Error, Result};
use nb_pipeline::{read_article_list, Pipeline, PipelineConfig};
use nb_upload::{AdminCredentials, ChromiumConsole, MediaConsole, UploadConfig};

const LOGIN_VAR: &str = "SHOP_ADMIN_LOGIN";
const PASSWORD_VAR: &str = "SHOP_ADMIN_PASSWORD";
const GEMINI_KEY_VAR: &str = "GEMINI_API_KEY";

#[derive(Parser, Debug)]
#[command(author, version, about = "Builds the shop newsletter: product images, uploads, scraped data and the composed issue", long_about = None)]
pub struct Cli {
    /// Composition model: template (offline) or gemini
    #[arg(long, default_value = "template")]
    composer: String,
    /// Override the Gemini model name
    #[arg(long)]
    model: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run every stage: images, upload, scrape, write
    Run {
        /// Article list, one URL per line
        #[arg(long, default_value = "Artikelliste_Newsletter.txt")]
        articles: PathBuf,
        #[arg(long, default_value = "Newsletter-Instructions.txt")]
        instructions: PathBuf,
        /// Previous issue handed to the composer as a style reference
        #[arg(long)]
        style_example: Option<PathBuf>,
        /// Leave the admin console out and compose without uploaded URLs
        #[arg(long)]
        skip_upload: bool,
        #[arg(long, default_value = "Newsletter")]
        base_filename: String,
        /// Drive the admin browser headless instead of watching it
        #[arg(long)]
        headless: bool,
        /// Where artifacts and the issue land
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Scrape the product data into scraped_texts.json
    Scrape {
        #[arg(long, default_value = "Artikelliste_Newsletter.txt")]
        articles: PathBuf,
        #[arg(long, default_value = "scraped_texts.json")]
        output: PathBuf,
    },
    /// Download and resize the product images
    Images {
        #[arg(long, default_value = "Artikelliste_Newsletter.txt")]
        articles: PathBuf,
        #[arg(long, default_value = ".")]
        image_dir: PathBuf,
    },
    /// Upload image files and record their public URLs
    Upload {
        /// Image files to publish
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(long, default_value = "uploaded_image_urls.json")]
        output: PathBuf,
        #[arg(long)]
        headless: bool,
    },
    /// Compose and save the issue from existing artifacts
    Write {
        #[arg(long, default_value = "Newsletter-Instructions.txt")]
        instructions: PathBuf,
        #[arg(long, default_value = "scraped_texts.json")]
        records: PathBuf,
        #[arg(long)]
        image_urls: Option<PathBuf>,
        #[arg(long)]
        style_example: Option<PathBuf>,
        #[arg(long, default_value = "Newsletter")]
        base_filename: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn admin_credentials() -> Result<AdminCredentials> {
    let login = std::env::var(LOGIN_VAR)
        .map_err(|_| Error::Upload(format!("{} is not set", LOGIN_VAR)))?;
    let password = std::env::var(PASSWORD_VAR)
        .map_err(|_| Error::Upload(format!("{} is not set", PASSWORD_VAR)))?;
    Ok(AdminCredentials { login, password })
}

async fn open_console(headless: bool) -> Result<Arc<dyn MediaConsole>> {
    let console = ChromiumConsole::connect(UploadConfig {
        headless,
        ..UploadConfig::default()
    })
    .await?;
    Ok(Arc::new(console))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Values from the local .env win over the inherited environment, so a
    // checked-out deployment always runs with its own credentials.
    let env_file = dotenvy::dotenv_override().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if let Some(path) = &env_file {
        info!("Loaded environment overrides from {}", path.display());
    }

    let cli = Cli::parse();

    let fetcher = Arc::new(HttpFetcher::new()?);
    let composer = nb_compose::create_composer(
        &cli.composer,
        nb_compose::Config {
            api_key: std::env::var(GEMINI_KEY_VAR).ok(),
            model_name: cli.model.clone(),
        },
    )?;
    info!("🧠 Composer initialized: {}", composer.name());

    let today = chrono::Local::now().date_naive();

    match cli.command {
        Commands::Run {
            articles,
            instructions,
            style_example,
            skip_upload,
            base_filename,
            headless,
            out_dir,
        } => {
            let with_upload = !skip_upload;
            let config = PipelineConfig {
                article_list_path: articles,
                instructions_path: instructions,
                style_example_path: style_example,
                records_path: out_dir.join("scraped_texts.json"),
                image_urls_path: out_dir.join("uploaded_image_urls.json"),
                image_dir: out_dir.clone(),
                base_filename,
                out_dir,
                with_upload,
            };

            let (console, credentials) = if with_upload {
                (Some(open_console(headless).await?), Some(admin_credentials()?))
            } else {
                (None, None)
            };

            let pipeline = Pipeline::new(config, fetcher, console, credentials, composer);
            let report = pipeline.run(today).await?;
            println!("{}", report.summary());
        }
        Commands::Scrape { articles, output } => {
            let urls = read_article_list(&articles)?;
            let confirmation = nb_scraper::scrape_articles(fetcher.as_ref(), &urls, &output).await?;
            println!("{}", confirmation);
        }
        Commands::Images { articles, image_dir } => {
            let urls = read_article_list(&articles)?;
            let written = nb_images::process_images(fetcher.as_ref(), &urls, &image_dir).await?;
            for path in &written {
                println!("{}", path.display());
            }
        }
        Commands::Upload { files, output, headless } => {
            let credentials = admin_credentials()?;
            let console = open_console(headless).await?;
            let confirmation =
                nb_upload::upload_images(console.as_ref(), &credentials, &files, &output).await?;
            println!("{}", confirmation);
        }
        Commands::Write {
            instructions,
            records,
            image_urls,
            style_example,
            base_filename,
            out_dir,
        } => {
            let cfg = nb_writer::WriteStageConfig {
                instructions_path: instructions,
                style_example_path: style_example,
                records_path: records,
                image_urls_path: image_urls,
                base_filename,
                out_dir,
            };
            let confirmation = nb_writer::write_stage(composer.as_ref(), &cfg, today).await?;
            println!("{}", confirmation);
        }
    }

    Ok(())
}
