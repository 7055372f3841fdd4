//! chromiumoxide-backed [`MediaConsole`](crate::MediaConsole).

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::dom::SetFileInputFilesParams;
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use nb_core::{Error, Result};

use crate::{AdminCredentials, DuplicateOutcome, MediaConsole, UploadConfig};

/// Fixed selectors and labels of the admin screens. The console is a
/// German-language Shopware installation, hence the German labels.
mod ui {
    pub const LOGIN_NAME: &str = "#sw-field--username";
    pub const LOGIN_PASSWORD: &str = "#sw-field--password";
    pub const LOGIN_SUBMIT: &str = "button[type='submit']";
    pub const CONTENTS_LABEL: &str = "Inhalte";
    pub const MEDIA_LABEL: &str = "Medien";
    pub const FOLDER_ACTIONS_LABEL: &str = "Aktionen";
    pub const UPLOAD_FILES_LABEL: &str = "Dateien hochladen";
    pub const FILE_INPUT: &str = "input[type='file']";
    pub const DUPLICATE_MODAL: &str = "div.sw-duplicated-media-v2";
    pub const REPLACE_OPTION_LABEL: &str = "Hochladen und ersetzen";
    pub const REMEMBER_CHOICE_LABEL: &str = "Auswahl merken";
    pub const REPLACE_CONFIRM_LABEL: &str = "Datei ersetzen";
    pub const UPLOAD_BANNER: &str = "[role=banner]";
    pub const LOAD_MORE_LABEL: &str = "Weitere laden";
    pub const THUMBNAIL: &str = "img.sw-media-preview-v2__item";
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

// A JSON string literal is also a valid JS string literal.
fn js_quote(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// Drives a Chromium instance against the admin console. Headed by default
/// so the run can be watched; the handler event stream is drained on a
/// background task for the lifetime of the session.
pub struct ChromiumConsole {
    browser: Mutex<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    cfg: UploadConfig,
}

impl ChromiumConsole {
    /// Launch a browser and open the admin login page.
    pub async fn connect(cfg: UploadConfig) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !cfg.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(Error::Upload)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| Error::Upload(format!("Failed to launch browser: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page(cfg.admin_url.as_str())
            .await
            .map_err(|e| Error::Upload(format!("Failed to open {}: {}", cfg.admin_url, e)))?;

        info!("🌐 Admin console opened at {}", cfg.admin_url);

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler_task,
            cfg,
        })
    }

    async fn eval<T: serde::de::DeserializeOwned>(&self, script: String) -> Result<T> {
        self.page
            .evaluate(script)
            .await
            .map_err(|e| Error::Upload(format!("Script evaluation failed: {}", e)))?
            .into_value()
            .map_err(|e| Error::Upload(format!("Unexpected script result: {}", e)))
    }

    // Visibility matches Playwright's notion closely enough for these
    // screens: attached and taking part in layout.
    async fn count_visible(&self, selector: &str) -> Result<i64> {
        let script = format!(
            "Array.from(document.querySelectorAll({})).filter(el => el.offsetParent !== null).length",
            js_quote(selector)
        );
        self.eval(script).await
    }

    async fn wait_for_visible(&self, selector: &str, budget: Duration, what: &str) -> Result<()> {
        let deadline = Instant::now() + budget;
        loop {
            if self.count_visible(selector).await? > 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(what.to_string()));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_for_hidden(&self, selector: &str, budget: Duration, what: &str) -> Result<()> {
        let deadline = Instant::now() + budget;
        loop {
            if self.count_visible(selector).await? == 0 {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!("{} to clear", what)));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    // Like wait_for_visible, but absence is an answer rather than an error.
    async fn is_visible_within(&self, selector: &str, budget: Duration) -> Result<bool> {
        let deadline = Instant::now() + budget;
        loop {
            if self.count_visible(selector).await? > 0 {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Click the first visible control whose text contains `label`. The
    /// admin UI renders its actions as buttons, links and menu entries, so
    /// all three are candidates.
    async fn try_click_labeled(&self, label: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const label = {};
                const candidates = document.querySelectorAll(
                    'button, a, [role=button], .sw-admin-menu__navigation-link, .sw-context-menu-item'
                );
                const hit = Array.from(candidates).find(
                    el => el.offsetParent !== null && el.textContent.trim().includes(label)
                );
                if (!hit) return false;
                hit.click();
                return true;
            }})()"#,
            js_quote(label)
        );
        self.eval(script).await
    }

    async fn click_labeled(&self, label: &str, budget: Duration) -> Result<()> {
        let deadline = Instant::now() + budget;
        loop {
            if self.try_click_labeled(label).await? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!("control labeled '{}'", label)));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    // The "remember selection" checkbox sits behind a styled label; tick it
    // through the label so the framework sees the change.
    async fn tick_labeled_checkbox(&self, label: &str) -> Result<bool> {
        let script = format!(
            r#"(() => {{
                const label = {};
                const hit = Array.from(document.querySelectorAll('label')).find(
                    el => el.offsetParent !== null && el.textContent.trim().includes(label)
                );
                if (!hit) return false;
                hit.click();
                return true;
            }})()"#,
            js_quote(label)
        );
        self.eval(script).await
    }

    async fn find_file_input(&self) -> Result<Element> {
        let deadline = Instant::now() + self.cfg.timeouts.navigation;
        loop {
            match self.page.find_element(ui::FILE_INPUT).await {
                Ok(element) => return Ok(element),
                Err(_) if Instant::now() < deadline => sleep(POLL_INTERVAL).await,
                Err(_) => return Err(Error::Timeout("file input".to_string())),
            }
        }
    }
}

#[async_trait]
impl MediaConsole for ChromiumConsole {
    async fn login(&self, credentials: &AdminCredentials) -> Result<()> {
        let t = &self.cfg.timeouts;
        self.wait_for_visible(ui::LOGIN_NAME, t.navigation, "login form").await?;

        let name = self
            .page
            .find_element(ui::LOGIN_NAME)
            .await
            .map_err(|e| Error::Upload(format!("Login field missing: {}", e)))?;
        name.click()
            .await
            .map_err(|e| Error::Upload(format!("Login field unusable: {}", e)))?;
        name.type_str(&credentials.login)
            .await
            .map_err(|e| Error::Upload(format!("Could not enter the login: {}", e)))?;

        let password = self
            .page
            .find_element(ui::LOGIN_PASSWORD)
            .await
            .map_err(|e| Error::Upload(format!("Password field missing: {}", e)))?;
        password
            .click()
            .await
            .map_err(|e| Error::Upload(format!("Password field unusable: {}", e)))?;
        password
            .type_str(&credentials.password)
            .await
            .map_err(|e| Error::Upload(format!("Could not enter the password: {}", e)))?;

        let submit = self
            .page
            .find_element(ui::LOGIN_SUBMIT)
            .await
            .map_err(|e| Error::Upload(format!("Login button missing: {}", e)))?;
        submit
            .click()
            .await
            .map_err(|e| Error::Upload(format!("Login submit failed: {}", e)))?;

        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| Error::Upload(format!("Dashboard did not load: {}", e)))?;

        info!("🔑 Signed in to the admin console");
        Ok(())
    }

    async fn open_media_folder(&self) -> Result<()> {
        let t = &self.cfg.timeouts;
        self.click_labeled(ui::CONTENTS_LABEL, t.navigation).await?;
        self.click_labeled(ui::MEDIA_LABEL, t.navigation).await?;
        self.click_labeled(&self.cfg.media_folder, t.navigation).await?;
        info!("📁 Opened media folder '{}'", self.cfg.media_folder);
        Ok(())
    }

    async fn submit_files(&self, paths: &[PathBuf]) -> Result<()> {
        let t = &self.cfg.timeouts;
        self.click_labeled(ui::FOLDER_ACTIONS_LABEL, t.navigation).await?;
        self.click_labeled(ui::UPLOAD_FILES_LABEL, t.navigation).await?;

        let input = self.find_file_input().await?;
        let files: Vec<String> = paths
            .iter()
            .map(|path| path.to_string_lossy().into_owned())
            .collect();

        let mut params = SetFileInputFilesParams::new(files);
        params.backend_node_id = Some(input.backend_node_id.clone());
        self.page
            .execute(params)
            .await
            .map_err(|e| Error::Upload(format!("Could not hand files to the console: {}", e)))?;

        info!("Handed {} files to the upload dialog", paths.len());
        Ok(())
    }

    async fn resolve_duplicates(&self) -> Result<DuplicateOutcome> {
        let t = &self.cfg.timeouts;
        if !self
            .is_visible_within(ui::DUPLICATE_MODAL, t.duplicate_modal_visible)
            .await?
        {
            return Ok(DuplicateOutcome::NoDuplicates);
        }

        self.click_labeled(ui::REPLACE_OPTION_LABEL, t.duplicate_modal_visible).await?;
        match self.tick_labeled_checkbox(ui::REMEMBER_CHOICE_LABEL).await {
            Ok(true) => debug!("Remembered the replace choice for this batch"),
            Ok(false) => debug!("No remember-choice checkbox offered"),
            Err(e) => debug!("Could not persist the replace choice: {}", e),
        }
        self.click_labeled(ui::REPLACE_CONFIRM_LABEL, t.duplicate_modal_visible).await?;
        self.wait_for_hidden(ui::DUPLICATE_MODAL, t.duplicate_modal_hidden, "duplicate dialog")
            .await?;

        Ok(DuplicateOutcome::Replaced)
    }

    async fn await_upload_settled(&self) -> Result<()> {
        let t = &self.cfg.timeouts;
        self.wait_for_visible(ui::UPLOAD_BANNER, t.banner_visible, "upload banner").await?;
        self.wait_for_hidden(ui::UPLOAD_BANNER, t.banner_hidden, "upload banner").await?;
        Ok(())
    }

    async fn load_remaining_media(&self) -> Result<()> {
        let t = &self.cfg.timeouts;
        while self.try_click_labeled(ui::LOAD_MORE_LABEL).await? {
            if !self
                .is_visible_within(ui::LOAD_MORE_LABEL, t.load_more_visible)
                .await?
            {
                break;
            }
        }
        Ok(())
    }

    async fn public_image_url(&self, stem: &str) -> Result<String> {
        let t = &self.cfg.timeouts;
        let selector = format!("{}[alt='{}']", ui::THUMBNAIL, stem);
        self.wait_for_visible(&selector, t.thumbnail_visible, &format!("thumbnail '{}'", stem))
            .await?;

        let thumbnail = self
            .page
            .find_element(selector.as_str())
            .await
            .map_err(|e| Error::Upload(format!("Thumbnail '{}' disappeared: {}", stem, e)))?;
        thumbnail
            .attribute("src")
            .await
            .map_err(|e| Error::Upload(format!("Could not read thumbnail '{}': {}", stem, e)))?
            .ok_or_else(|| Error::Upload(format!("Thumbnail '{}' carries no src", stem)))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        browser
            .close()
            .await
            .map_err(|e| Error::Upload(format!("Failed to close the browser: {}", e)))?;
        self.handler_task.abort();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UploadTimeouts;

    #[test]
    fn quoted_labels_are_valid_js_literals() {
        assert_eq!(js_quote("Weitere laden"), r#""Weitere laden""#);
        assert_eq!(js_quote(r#"a "b" c"#), r#""a \"b\" c""#);
    }

    #[test]
    fn default_budgets_match_the_console_pacing() {
        let t = UploadTimeouts::default();
        assert_eq!(t.duplicate_modal_visible, Duration::from_millis(3_000));
        assert_eq!(t.duplicate_modal_hidden, Duration::from_millis(10_000));
        assert_eq!(t.banner_visible, Duration::from_millis(5_000));
        assert_eq!(t.banner_hidden, Duration::from_millis(15_000));
        assert_eq!(t.thumbnail_visible, Duration::from_millis(5_000));
    }
}
