use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use percent_encoding::percent_decode_str;
use tracing::{debug, info};
use url::Url;

use crate::error::DownloadError;

/// Write buffer size; the body is streamed through it, never held whole.
const CHUNK_SIZE: usize = 8192;
const DEFAULT_FILENAME: &str = "attachment.pdf";

#[async_trait]
pub trait AttachmentSource: Send + Sync {
    /// Download `url` into `dest_dir`, returning the written path.
    /// `hint` names the file when neither the response nor the URL does.
    async fn download(&self, url: &str, dest_dir: &Path, hint: Option<&str>) -> Result<PathBuf, DownloadError>;
}

pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AttachmentSource for Downloader {
    async fn download(&self, url: &str, dest_dir: &Path, hint: Option<&str>) -> Result<PathBuf, DownloadError> {
        let mut resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(DownloadError::HttpStatus { status: status.as_u16(), url: url.to_string() });
        }

        let disposition = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let filename = choose_filename(disposition.as_deref(), url, hint);

        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(&filename);
        let mut writer = BufWriter::with_capacity(CHUNK_SIZE, File::create(&path).await?);

        let mut bytes = 0usize;
        while let Some(chunk) = resp.chunk().await? {
            bytes += chunk.len();
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;

        info!(url, file = %path.display(), bytes, "downloaded attachment");
        Ok(path)
    }
}

/// Content-Disposition, then the last URL path segment, then the hint.
pub fn choose_filename(disposition: Option<&str>, url: &str, hint: Option<&str>) -> String {
    let candidates = [
        disposition.and_then(filename_from_disposition),
        filename_from_url(url),
        hint.map(|h| h.to_string()),
    ];
    for candidate in candidates.into_iter().flatten() {
        let clean = sanitize_filename(&candidate);
        if !clean.is_empty() {
            debug!(raw = %candidate, file = %clean, "resolved attachment filename");
            return clean;
        }
    }
    DEFAULT_FILENAME.to_string()
}

/// `attachment; filename="x.pdf"` or `filename*=UTF-8''x.pdf`.
fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;
    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else { continue };
        let value = value.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain = Some(value.to_string()),
            "filename*" => {
                let name = value.rsplit_once("''").map(|(_, n)| n).unwrap_or(value);
                extended = Some(percent_decode(name));
            }
            _ => {}
        }
    }
    extended.or(plain).filter(|n| !n.is_empty())
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    Some(percent_decode(last))
}

fn percent_decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

/// Keep `[A-Za-z0-9._- ]`, replace anything else with `_`. Names made only
/// of dots and underscores come back empty so the caller falls through.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().to_string();
    if cleaned.chars().all(|c| c == '.' || c == '_') {
        String::new()
    } else {
        cleaned
    }
}

// ── Tests ──
