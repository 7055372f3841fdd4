//! Drives the shop's admin console to publish the processed images.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use nb_core::artifacts;
use nb_core::types::UploadedImages;
use nb_core::{Error, Result};

pub mod chromium;

pub use chromium::ChromiumConsole;

/// Wait budgets for the individual console interactions.
#[derive(Debug, Clone)]
pub struct UploadTimeouts {
    /// General budget for navigation and menu clicks.
    pub navigation: Duration,
    pub duplicate_modal_visible: Duration,
    pub duplicate_modal_hidden: Duration,
    pub banner_visible: Duration,
    pub banner_hidden: Duration,
    pub load_more_visible: Duration,
    pub thumbnail_visible: Duration,
}

impl Default for UploadTimeouts {
    fn default() -> Self {
        Self {
            navigation: Duration::from_secs(30),
            duplicate_modal_visible: Duration::from_millis(3_000),
            duplicate_modal_hidden: Duration::from_millis(10_000),
            banner_visible: Duration::from_millis(5_000),
            banner_hidden: Duration::from_millis(15_000),
            load_more_visible: Duration::from_millis(5_000),
            thumbnail_visible: Duration::from_millis(5_000),
        }
    }
}

/// Where and how the admin console is driven.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub admin_url: String,
    /// Media folder the files land in.
    pub media_folder: String,
    /// The console is watched interactively by default.
    pub headless: bool,
    pub timeouts: UploadTimeouts,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            admin_url: "https://www.amadoro.de/admin#/login/".to_string(),
            media_folder: "Migration".to_string(),
            headless: false,
            timeouts: UploadTimeouts::default(),
        }
    }
}

/// Admin login, read from the environment by the CLI.
#[derive(Clone)]
pub struct AdminCredentials {
    pub login: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// What happened when the duplicate-file dialog was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateOutcome {
    /// The dialog never appeared within its budget.
    NoDuplicates,
    /// The dialog appeared and the files were replaced.
    Replaced,
}

/// The admin media screen, reduced to the steps the upload flow takes.
/// [`ChromiumConsole`] implements it over a real browser; tests script it.
#[async_trait]
pub trait MediaConsole: Send + Sync {
    /// Sign in and land on the dashboard.
    async fn login(&self, credentials: &AdminCredentials) -> Result<()>;

    /// Navigate to the media section and open the configured folder.
    async fn open_media_folder(&self) -> Result<()>;

    /// Put the given files into the folder's upload input.
    async fn submit_files(&self, paths: &[PathBuf]) -> Result<()>;

    /// Check for the duplicate-file dialog and resolve it by replacing.
    /// The dialog not showing up within its budget is the normal path.
    async fn resolve_duplicates(&self) -> Result<DuplicateOutcome>;

    /// Wait for the upload progress banner to appear and clear again.
    async fn await_upload_settled(&self) -> Result<()>;

    /// Page through the media grid until no more thumbnails load.
    async fn load_remaining_media(&self) -> Result<()>;

    /// Read the public URL of the thumbnail whose alt text is `stem`.
    async fn public_image_url(&self, stem: &str) -> Result<String>;

    /// Tear the session down.
    async fn close(&self) -> Result<()>;
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Upload(format!("Invalid file name: {}", path.display())))
}

fn file_stem(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Upload(format!("Invalid file name: {}", path.display())))
}

async fn run_upload(
    console: &dyn MediaConsole,
    credentials: &AdminCredentials,
    paths: &[PathBuf],
    output: &Path,
) -> Result<String> {
    info!("📤 Uploading {} files to the media folder", paths.len());

    console.login(credentials).await?;
    console.open_media_folder().await?;
    console.submit_files(paths).await?;

    match console.resolve_duplicates().await? {
        DuplicateOutcome::Replaced => info!("Replaced previously uploaded files"),
        DuplicateOutcome::NoDuplicates => info!("No duplicate-file dialog appeared"),
    }

    console.await_upload_settled().await?;
    info!("Upload confirmed");
    console.load_remaining_media().await?;

    let mut urls = UploadedImages::new();
    for path in paths {
        let url = console.public_image_url(&file_stem(path)?).await?;
        urls.insert(file_name(path)?, url);
    }

    artifacts::save_image_urls(&urls, output)?;
    info!("💾 Collected {} public image URLs", urls.len());

    Ok(format!("Successfully saved image URLs to {}", output.display()))
}

/// Publish the files through the admin console and persist the
/// file name → public URL map to `output`. Any step failing or timing out
/// fails the whole call; there is no partial result. The session is closed
/// either way.
pub async fn upload_images(
    console: &dyn MediaConsole,
    credentials: &AdminCredentials,
    paths: &[PathBuf],
    output: &Path,
) -> Result<String> {
    let result = run_upload(console, credentials, paths, output).await;
    if let Err(e) = console.close().await {
        warn!("Failed to close the admin session: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedConsole {
        calls: Mutex<Vec<String>>,
        fail_on_settle: bool,
        duplicates: bool,
    }

    impl ScriptedConsole {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaConsole for ScriptedConsole {
        async fn login(&self, credentials: &AdminCredentials) -> Result<()> {
            self.record(format!("login {}", credentials.login));
            Ok(())
        }

        async fn open_media_folder(&self) -> Result<()> {
            self.record("open_media_folder");
            Ok(())
        }

        async fn submit_files(&self, paths: &[PathBuf]) -> Result<()> {
            self.record(format!("submit_files {}", paths.len()));
            Ok(())
        }

        async fn resolve_duplicates(&self) -> Result<DuplicateOutcome> {
            self.record("resolve_duplicates");
            Ok(if self.duplicates {
                DuplicateOutcome::Replaced
            } else {
                DuplicateOutcome::NoDuplicates
            })
        }

        async fn await_upload_settled(&self) -> Result<()> {
            self.record("await_upload_settled");
            if self.fail_on_settle {
                Err(Error::Timeout("upload banner".to_string()))
            } else {
                Ok(())
            }
        }

        async fn load_remaining_media(&self) -> Result<()> {
            self.record("load_remaining_media");
            Ok(())
        }

        async fn public_image_url(&self, stem: &str) -> Result<String> {
            self.record(format!("public_image_url {}", stem));
            Ok(format!("https://shop.example/media/ab/cd/{}.jpg", stem))
        }

        async fn close(&self) -> Result<()> {
            self.record("close");
            Ok(())
        }
    }

    fn credentials() -> AdminCredentials {
        AdminCredentials {
            login: "redaktion".to_string(),
            password: "geheim".to_string(),
        }
    }

    #[tokio::test]
    async fn happy_path_walks_the_console_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("uploaded_image_urls.json");
        let console = ScriptedConsole { duplicates: true, ..Default::default() };

        let paths = vec![
            PathBuf::from("/tmp/feigen_300.jpg"),
            PathBuf::from("/tmp/datteln_300.jpg"),
        ];
        let message = upload_images(&console, &credentials(), &paths, &output)
            .await
            .unwrap();
        assert!(message.contains("uploaded_image_urls.json"));

        assert_eq!(
            console.calls(),
            vec![
                "login redaktion",
                "open_media_folder",
                "submit_files 2",
                "resolve_duplicates",
                "await_upload_settled",
                "load_remaining_media",
                "public_image_url feigen_300",
                "public_image_url datteln_300",
                "close",
            ]
        );

        let urls = artifacts::load_image_urls(&output).unwrap();
        assert_eq!(
            urls.get("feigen_300.jpg").map(String::as_str),
            Some("https://shop.example/media/ab/cd/feigen_300.jpg")
        );
        assert_eq!(urls.len(), 2);
    }

    #[tokio::test]
    async fn missing_duplicate_dialog_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("uploaded_image_urls.json");
        let console = ScriptedConsole::default();

        let paths = vec![PathBuf::from("/tmp/feigen_300.jpg")];
        upload_images(&console, &credentials(), &paths, &output)
            .await
            .unwrap();
        assert!(output.exists());
    }

    #[tokio::test]
    async fn a_failed_step_aborts_but_still_closes_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("uploaded_image_urls.json");
        let console = ScriptedConsole { fail_on_settle: true, ..Default::default() };

        let paths = vec![PathBuf::from("/tmp/feigen_300.jpg")];
        let err = upload_images(&console, &credentials(), &paths, &output)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));

        assert!(!output.exists());
        assert_eq!(console.calls().last().map(String::as_str), Some("close"));
    }

    #[test]
    fn credentials_debug_hides_the_password() {
        let debug = format!("{:?}", credentials());
        assert!(debug.contains("redaktion"));
        assert!(!debug.contains("geheim"));
    }
}
