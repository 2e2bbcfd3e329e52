use std::path::{Path, PathBuf};
use std::process::Command;

use super::run_tool;
use crate::error::ToolError;

/// Page-level access to a PDF. Page indices are zero-based.
pub trait PdfBackend: Send + Sync {
    fn page_count(&self, pdf: &Path) -> Result<usize, ToolError>;
    fn page_text(&self, pdf: &Path, page: usize) -> Result<String, ToolError>;
    /// Rasterize one page to PNG inside `out_dir`.
    fn render_page(&self, pdf: &Path, page: usize, dpi: u32, out_dir: &Path) -> Result<PathBuf, ToolError>;
}

/// Poppler command line tools: `pdfinfo`, `pdftotext`, `pdftoppm`.
pub struct Poppler {
    pdfinfo: bool,
    pdftotext: bool,
    pdftoppm: bool,
}

impl Poppler {
    pub fn detect() -> Self {
        Self {
            pdfinfo: which::which("pdfinfo").is_ok(),
            pdftotext: which::which("pdftotext").is_ok(),
            pdftoppm: which::which("pdftoppm").is_ok(),
        }
    }

    pub fn missing(&self) -> Vec<&'static str> {
        [("pdfinfo", self.pdfinfo), ("pdftotext", self.pdftotext), ("pdftoppm", self.pdftoppm)]
            .into_iter()
            .filter(|(_, found)| !found)
            .map(|(name, _)| name)
            .collect()
    }
}

impl PdfBackend for Poppler {
    fn page_count(&self, pdf: &Path) -> Result<usize, ToolError> {
        if !self.pdfinfo {
            return Err(ToolError::Missing("pdfinfo"));
        }
        let out = run_tool("pdfinfo", Command::new("pdfinfo").arg(pdf))?;
        parse_page_count(&out).ok_or(ToolError::Output {
            tool: "pdfinfo",
            message: "no Pages: line in output".into(),
        })
    }

    fn page_text(&self, pdf: &Path, page: usize) -> Result<String, ToolError> {
        if !self.pdftotext {
            return Err(ToolError::Missing("pdftotext"));
        }
        let n = (page + 1).to_string();
        let mut cmd = Command::new("pdftotext");
        cmd.arg("-layout")
            .arg("-q")
            .arg("-f")
            .arg(&n)
            .arg("-l")
            .arg(&n)
            .arg(pdf)
            .arg("-");
        let text = run_tool("pdftotext", &mut cmd)?;
        Ok(text.replace('\u{000C}', ""))
    }

    fn render_page(&self, pdf: &Path, page: usize, dpi: u32, out_dir: &Path) -> Result<PathBuf, ToolError> {
        if !self.pdftoppm {
            return Err(ToolError::Missing("pdftoppm"));
        }
        std::fs::create_dir_all(out_dir).map_err(|source| ToolError::Spawn { tool: "pdftoppm", source })?;

        let n = (page + 1).to_string();
        let prefix = out_dir.join(format!("page-{}", n));
        let mut cmd = Command::new("pdftoppm");
        cmd.arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(&n)
            .arg("-l")
            .arg(&n)
            .arg("-png")
            .arg("-singlefile")
            .arg(pdf)
            .arg(&prefix);
        run_tool("pdftoppm", &mut cmd)?;

        let image = prefix.with_extension("png");
        match std::fs::metadata(&image) {
            Ok(meta) if meta.len() > 0 => Ok(image),
            _ => Err(ToolError::Output {
                tool: "pdftoppm",
                message: format!("no image written for page {}", n),
            }),
        }
    }
}

fn parse_page_count(pdfinfo: &str) -> Option<usize> {
    pdfinfo
        .lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|rest| rest.trim().parse().ok())
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_count_from_pdfinfo() {
        let out = "Title:          Notification\nProducer:       iText\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(out), Some(12));
        assert_eq!(parse_page_count("Syntax Error: Couldn't find trailer dictionary"), None);
    }

    #[test]
    fn missing_tools_are_errors() {
        let p = Poppler { pdfinfo: false, pdftotext: false, pdftoppm: false };
        assert_eq!(p.missing(), vec!["pdfinfo", "pdftotext", "pdftoppm"]);
        assert!(matches!(p.page_count(Path::new("x.pdf")), Err(ToolError::Missing("pdfinfo"))));
        assert!(matches!(p.page_text(Path::new("x.pdf"), 0), Err(ToolError::Missing("pdftotext"))));
    }
}
