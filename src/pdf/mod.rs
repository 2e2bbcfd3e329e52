pub mod ocr;
pub mod poppler;

use std::path::Path;
use std::process::Command;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::model::{ExtractionMethod, ExtractionResult, PageExtraction};

pub use ocr::{OcrConfig, OcrEngine, Tesseract, DEFAULT_CONFIGS};
pub use poppler::{PdfBackend, Poppler};

/// Pages inspected when deciding between the text layer and OCR.
pub const SAMPLE_PAGES: usize = 5;
/// A page needs strictly more characters than this to count as text-bearing.
pub const TEXT_THRESHOLD: usize = 100;
pub const RENDER_DPI: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfKind {
    DirectText,
    ImageBased,
}

pub trait TextExtractor: Send + Sync {
    /// Never fails: unreadable input yields `ExtractionMethod::Failed`.
    fn extract(&self, pdf: &Path, work_dir: &Path) -> ExtractionResult;
}

pub struct TextExtractionEngine {
    backend: Box<dyn PdfBackend>,
    ocr: Option<Box<dyn OcrEngine>>,
    configs: Vec<OcrConfig>,
    dpi: u32,
}

struct PageOutput {
    index: usize,
    method: ExtractionMethod,
    text: String,
    note: Option<String>,
}

impl TextExtractionEngine {
    pub fn new(backend: Box<dyn PdfBackend>, ocr: Option<Box<dyn OcrEngine>>) -> Self {
        Self { backend, ocr, configs: DEFAULT_CONFIGS.to_vec(), dpi: RENDER_DPI }
    }

    /// Poppler for the text layer and rendering, Tesseract if installed.
    pub fn with_system_tools(ocr_lang: &str) -> Self {
        let ocr = Tesseract::detect(ocr_lang).map(|t| Box::new(t) as Box<dyn OcrEngine>);
        if ocr.is_none() {
            warn!("tesseract not found; image-based PDFs will fall back to the text layer");
        }
        Self::new(Box::new(Poppler::detect()), ocr)
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    fn ocr_page(&self, ocr: &dyn OcrEngine, pdf: &Path, index: usize, embedded: &str, work_dir: &Path) -> PageOutput {
        if char_count(embedded) > TEXT_THRESHOLD {
            return PageOutput { index, method: ExtractionMethod::DirectText, text: embedded.to_string(), note: None };
        }

        let keep_embedded = |reason: String| PageOutput {
            index,
            method: ExtractionMethod::DirectText,
            text: embedded.to_string(),
            note: Some(format!("page {}: {}; kept text layer", index + 1, reason)),
        };

        let image = match self.backend.render_page(pdf, index, self.dpi, work_dir) {
            Ok(p) => p,
            Err(e) => return keep_embedded(format!("render failed ({})", e)),
        };

        match ocr::recognize(ocr, &image, &self.configs) {
            Ok(best) => {
                debug!(page = index + 1, config = %best.config, chars = char_count(&best.text), "ocr page");
                PageOutput { index, method: ExtractionMethod::Ocr, text: best.text, note: None }
            }
            Err(errors) => {
                let reasons: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                keep_embedded(format!("OCR failed ({})", reasons.join("; ")))
            }
        }
    }
}

impl TextExtractor for TextExtractionEngine {
    fn extract(&self, pdf: &Path, work_dir: &Path) -> ExtractionResult {
        let source = pdf.to_path_buf();
        let page_count = match self.backend.page_count(pdf) {
            Ok(0) => return ExtractionResult::failed(source, "PDF has no pages"),
            Ok(n) => n,
            Err(e) => return ExtractionResult::failed(source, format!("unreadable PDF: {}", e)),
        };

        let embedded: Vec<Option<String>> = (0..page_count)
            .into_par_iter()
            .map(|i| match self.backend.page_text(pdf, i) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(pdf = %pdf.display(), page = i + 1, error = %e, "text layer read failed");
                    None
                }
            })
            .collect();
        if embedded.iter().all(Option::is_none) {
            return ExtractionResult::failed(source, "no page of the PDF could be read");
        }

        let kind = classify(&embedded);
        let mut notes = Vec::new();
        let text_layer = |i: usize| embedded[i].clone().unwrap_or_default();

        let pages: Vec<PageOutput> = match (kind, self.ocr.as_deref()) {
            (PdfKind::ImageBased, Some(ocr)) => (0..page_count)
                .into_par_iter()
                .map(|i| self.ocr_page(ocr, pdf, i, &text_layer(i), work_dir))
                .collect(),
            (kind, ocr) => {
                if kind == PdfKind::ImageBased && ocr.is_none() {
                    notes.push("OCR engine unavailable; used embedded text layer".to_string());
                }
                (0..page_count)
                    .map(|i| PageOutput { index: i, method: ExtractionMethod::DirectText, text: text_layer(i), note: None })
                    .collect()
            }
        };

        let result = assemble(source, pages, notes);
        info!(
            pdf = %pdf.display(),
            ?kind,
            method = result.method.as_str(),
            pages = result.pages.len(),
            chars = result.char_count,
            "extracted text"
        );
        result
    }
}

/// Text-bearing if any of the first `SAMPLE_PAGES` pages clears the threshold.
pub fn classify(embedded: &[Option<String>]) -> PdfKind {
    let has_text = embedded
        .iter()
        .take(SAMPLE_PAGES)
        .flatten()
        .any(|t| char_count(t) > TEXT_THRESHOLD);
    if has_text {
        PdfKind::DirectText
    } else {
        PdfKind::ImageBased
    }
}

fn assemble(source_path: std::path::PathBuf, mut pages: Vec<PageOutput>, mut notes: Vec<String>) -> ExtractionResult {
    pages.sort_by_key(|p| p.index);

    let mut text = String::new();
    let mut breakdown = Vec::with_capacity(pages.len());
    let mut total = 0;
    let mut used_ocr = false;

    for page in pages {
        let body = page.text.trim();
        let chars = char_count(body);
        text.push_str(&format!("--- Page {} ({}) ---\n\n{}\n\n", page.index + 1, page.method.label(), body));
        total += chars;
        used_ocr |= page.method == ExtractionMethod::Ocr;
        breakdown.push(PageExtraction { page_index: page.index, method: page.method, char_count: chars });
        notes.extend(page.note);
    }

    ExtractionResult {
        source_path,
        method: if used_ocr { ExtractionMethod::Ocr } else { ExtractionMethod::DirectText },
        text,
        char_count: total,
        pages: breakdown,
        failure: None,
        notes,
    }
}

pub(crate) fn char_count(text: &str) -> usize {
    text.trim().chars().count()
}

/// Run an external tool, returning stdout on a zero exit.
pub(crate) fn run_tool(tool: &'static str, cmd: &mut Command) -> Result<String, ToolError> {
    let out = cmd.output().map_err(|source| ToolError::Spawn { tool, source })?;
    if !out.status.success() {
        return Err(ToolError::Failed {
            tool,
            code: out.status.code(),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}

// ── Tests ──
