use std::time::Duration;

use thiserror::Error;

/// One failed attempt inside the fetch strategy chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("empty response body from {0}")]
    EmptyBody(String),
    #[error("browser: {0}")]
    Browser(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("all fetch strategies failed: {}", describe(.0))]
    Exhausted(Vec<StrategyFailure>),
}

fn describe(failures: &[StrategyFailure]) -> String {
    if failures.is_empty() {
        return "no strategies configured".to_string();
    }
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.strategy, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of an external PDF or OCR tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0} not found on PATH")]
    Missing(&'static str),
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {code:?}: {stderr}")]
    Failed {
        tool: &'static str,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{tool}: {message}")]
    Output { tool: &'static str, message: String },
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_lists_every_reason() {
        let err = FetchError::Exhausted(vec![
            StrategyFailure { strategy: "rendered", reason: "no Chromium".into() },
            StrategyFailure { strategy: "static", reason: "HTTP 503".into() },
        ]);
        assert_eq!(
            err.to_string(),
            "all fetch strategies failed: [rendered] no Chromium; [static] HTTP 503"
        );
    }

    #[test]
    fn tool_failure_message() {
        let err = ToolError::Failed { tool: "pdfinfo", code: Some(1), stderr: "Syntax Error".into() };
        assert_eq!(err.to_string(), "pdfinfo exited with Some(1): Syntax Error");
    }
}
