use std::fmt;
use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::{char_count, run_tool};
use crate::error::ToolError;

/// Tesseract engine mode + page segmentation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrConfig {
    pub oem: u8,
    pub psm: u8,
}

impl fmt::Display for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--oem {} --psm {}", self.oem, self.psm)
    }
}

/// Uniform block, fully automatic, automatic with orientation detection.
pub const DEFAULT_CONFIGS: [OcrConfig; 3] = [
    OcrConfig { oem: 1, psm: 6 },
    OcrConfig { oem: 1, psm: 3 },
    OcrConfig { oem: 1, psm: 1 },
];

pub trait OcrEngine: Send + Sync {
    fn image_to_string(&self, image: &Path, config: OcrConfig) -> Result<String, ToolError>;
}

pub struct Tesseract {
    lang: String,
}

impl Tesseract {
    /// `None` when the binary is not on PATH.
    pub fn detect(lang: &str) -> Option<Self> {
        which::which("tesseract").ok().map(|_| Self { lang: lang.to_string() })
    }
}

impl OcrEngine for Tesseract {
    fn image_to_string(&self, image: &Path, config: OcrConfig) -> Result<String, ToolError> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .arg("--oem")
            .arg(config.oem.to_string())
            .arg("--psm")
            .arg(config.psm.to_string());
        run_tool("tesseract", &mut cmd)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrAttempt {
    pub config: OcrConfig,
    pub text: String,
}

/// Longest output wins; the earlier attempt wins a tie.
pub fn select_best(attempts: Vec<OcrAttempt>) -> Option<OcrAttempt> {
    let mut best: Option<OcrAttempt> = None;
    for attempt in attempts {
        let better = match &best {
            Some(b) => char_count(&attempt.text) > char_count(&b.text),
            None => true,
        };
        if better {
            best = Some(attempt);
        }
    }
    best
}

/// Run every config over one image and keep the best transcription.
/// Errors only when every config failed.
pub fn recognize(engine: &dyn OcrEngine, image: &Path, configs: &[OcrConfig]) -> Result<OcrAttempt, Vec<ToolError>> {
    let mut attempts = Vec::with_capacity(configs.len());
    let mut errors = Vec::new();
    for &config in configs {
        match engine.image_to_string(image, config) {
            Ok(text) => {
                debug!(image = %image.display(), %config, chars = char_count(&text), "ocr attempt");
                attempts.push(OcrAttempt { config, text });
            }
            Err(e) => errors.push(e),
        }
    }
    select_best(attempts).ok_or(errors)
}

// ── Tests ──
