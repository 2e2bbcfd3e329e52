use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tracing::debug;

use super::{FetchedPage, PageSource};
use crate::error::FetchError;

/// Locate a Chromium/Chrome binary: `CHROME_PATH` first, then PATH.
pub fn find_chromium() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_PATH") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }
    ["google-chrome", "chromium", "chromium-browser"]
        .iter()
        .find_map(|bin| which::which(bin).ok())
}

/// HTTP status of the main document, or 0 where the browser does not
/// expose one (data: URLs, older Chromium).
const NAV_STATUS_JS: &str = "(() => { const e = performance.getEntriesByType('navigation')[0]; \
     return e && e.responseStatus ? e.responseStatus : 0; })()";

/// Error pages render fine, so the status has to be checked explicitly.
fn check_status(status: u16, url: &str) -> Result<(), FetchError> {
    match status {
        0 | 200 => Ok(()),
        other => Err(FetchError::HttpStatus { status: other, url: url.to_string() }),
    }
}

/// Headless Chromium fetch for listing tables populated by script. A
/// browser is launched per call and torn down before returning.
pub struct RenderedSource {
    chrome: Option<PathBuf>,
    nav_timeout: Duration,
    settle: Duration,
}

impl RenderedSource {
    pub fn new(nav_timeout: Duration, settle: Duration) -> Self {
        Self { chrome: find_chromium(), nav_timeout, settle }
    }

    pub fn is_available(&self) -> bool {
        self.chrome.is_some()
    }

    async fn render(&self, browser: &Browser, url: &str) -> Result<FetchedPage, FetchError> {
        let page = browser.new_page("about:blank").await.map_err(browser_err)?;

        match tokio::time::timeout(self.nav_timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(FetchError::Browser(format!("navigation failed: {e}"))),
            Err(_) => return Err(FetchError::Timeout(self.nav_timeout)),
        }
        let _ = tokio::time::timeout(self.nav_timeout, page.wait_for_navigation()).await;

        let status: u16 = page
            .evaluate(NAV_STATUS_JS)
            .await
            .map_err(browser_err)?
            .into_value()
            .unwrap_or(0);
        check_status(status, url)?;

        // Tables are filled in by XHR after load.
        tokio::time::sleep(self.settle).await;

        let markup: String = page
            .evaluate("document.documentElement.outerHTML")
            .await
            .map_err(browser_err)?
            .into_value()
            .map_err(|e| FetchError::Browser(format!("failed to read page HTML: {e:?}")))?;

        let final_url = page.url().await.ok().flatten().unwrap_or_else(|| url.to_string());
        let _ = page.close().await;

        if markup.trim().is_empty() {
            return Err(FetchError::EmptyBody(final_url));
        }
        Ok(FetchedPage { url: final_url, markup, strategy: "rendered" })
    }
}

#[async_trait]
impl PageSource for RenderedSource {
    fn name(&self) -> &'static str {
        "rendered"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let chrome = self
            .chrome
            .as_ref()
            .ok_or_else(|| FetchError::Browser("no Chromium binary found".into()))?;

        let config = BrowserConfig::builder()
            .chrome_executable(chrome)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .build()
            .map_err(|e| FetchError::Browser(format!("failed to build browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(browser_err)?;
        let events = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        debug!(url, "rendering listing page");
        let result = self.render(&browser, url).await;

        let _ = browser.close().await;
        events.abort();
        result
    }
}

fn browser_err(e: impl std::fmt::Display) -> FetchError {
    FetchError::Browser(e.to_string())
}

// ── Tests ──
