use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Sections ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Section {
    Notification,
    PublicNotice,
    Circular,
}

impl Section {
    pub const ALL: [Section; 3] = [Section::Notification, Section::PublicNotice, Section::Circular];

    /// Human-readable name as printed on the portal.
    pub fn name(self) -> &'static str {
        match self {
            Section::Notification => "Notification",
            Section::PublicNotice => "Public Notice",
            Section::Circular => "Circular",
        }
    }

    /// CLI / storage key.
    pub fn key(self) -> &'static str {
        match self {
            Section::Notification => "notification",
            Section::PublicNotice => "public-notice",
            Section::Circular => "circular",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match norm.as_str() {
            "notification" | "notifications" => Ok(Section::Notification),
            "publicnotice" | "publicnotices" => Ok(Section::PublicNotice),
            "circular" | "circulars" => Ok(Section::Circular),
            _ => Err(format!(
                "unknown section '{}' (expected notification, public-notice or circular)",
                s
            )),
        }
    }
}

// ── Listing ──

/// One row of a section's listing table that carried a downloadable attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub section: Section,
    pub date: Option<NaiveDate>,
    pub raw_date_text: String,
    pub description: String,
    pub attachment_url: String,
}

// ── Extraction ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionMethod {
    DirectText,
    Ocr,
    Failed,
}

impl ExtractionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractionMethod::DirectText => "direct_text",
            ExtractionMethod::Ocr => "ocr",
            ExtractionMethod::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct_text" => Some(ExtractionMethod::DirectText),
            "ocr" => Some(ExtractionMethod::Ocr),
            "failed" => Some(ExtractionMethod::Failed),
            _ => None,
        }
    }

    /// Tag used in the per-page segment headers.
    pub fn label(self) -> &'static str {
        match self {
            ExtractionMethod::DirectText => "Text",
            ExtractionMethod::Ocr => "OCR",
            ExtractionMethod::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageExtraction {
    /// Zero-based page index.
    pub page_index: usize,
    pub method: ExtractionMethod,
    pub char_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub source_path: PathBuf,
    pub method: ExtractionMethod,
    pub text: String,
    pub char_count: usize,
    pub pages: Vec<PageExtraction>,
    pub failure: Option<String>,
    pub notes: Vec<String>,
}

impl ExtractionResult {
    pub fn failed(source_path: PathBuf, reason: impl Into<String>) -> Self {
        ExtractionResult {
            source_path,
            method: ExtractionMethod::Failed,
            text: String::new(),
            char_count: 0,
            pages: Vec::new(),
            failure: Some(reason.into()),
            notes: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.method == ExtractionMethod::Failed
    }
}

// ── Output ──

/// Durable per-document artifact handed to downstream consumers, keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub id: String,
    pub section: Section,
    pub date: Option<NaiveDate>,
    pub raw_date_text: String,
    pub description: String,
    pub attachment_url: String,
    pub extraction: ExtractionResult,
    pub processed_at: DateTime<Utc>,
}

// ── Tests ──
