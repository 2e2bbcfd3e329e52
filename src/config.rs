use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment};
use serde::Deserialize;

use crate::model::Section;

const ENV_PREFIX: &str = "DGFT";

/// Runtime settings. Defaults below, overridden by `DGFT_*` environment
/// variables (a `.env` file is loaded first if present).
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub notifications_url: String,
    pub public_notices_url: String,
    pub circulars_url: String,
    pub ocr_language: String,
    pub db_path: PathBuf,
    pub scratch_root: Option<PathBuf>,
    pub http_timeout_secs: u64,
    pub render_timeout_secs: u64,
    pub render_settle_ms: u64,
    pub rendered_fetch: bool,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(Config::builder().add_source(
            Environment::with_prefix(ENV_PREFIX).try_parsing(true),
        ))
    }

    fn from_builder(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<Self> {
        builder
            .set_default("notifications_url", "https://www.dgft.gov.in/CP/?opt=notification")?
            .set_default("public_notices_url", "https://www.dgft.gov.in/CP/?opt=public-notice")?
            .set_default("circulars_url", "https://www.dgft.gov.in/CP/?opt=circular")?
            .set_default("ocr_language", "eng")?
            .set_default("db_path", "data/dgft.sqlite")?
            .set_default("http_timeout_secs", 30)?
            .set_default("render_timeout_secs", 30)?
            .set_default("render_settle_ms", 5000)?
            .set_default("rendered_fetch", true)?
            .build()
            .context("failed to build settings")?
            .try_deserialize()
            .context("invalid DGFT_* settings")
    }

    pub fn section_url(&self, section: Section) -> &str {
        match section {
            Section::Notification => &self.notifications_url,
            Section::PublicNotice => &self.public_notices_url,
            Section::Circular => &self.circulars_url,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn render_settle(&self) -> Duration {
        Duration::from_millis(self.render_settle_ms)
    }
}

// ── Tests ──
