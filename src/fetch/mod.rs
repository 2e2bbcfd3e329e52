pub mod rendered;
pub mod static_http;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{FetchError, StrategyFailure};

pub use rendered::RenderedSource;
pub use static_http::StaticSource;

/// Markup of a listing page plus where it actually came from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects; relative links resolve against it.
    pub url: String,
    pub markup: String,
    pub strategy: &'static str,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// Ordered fallback over several sources. The first success wins; if all
/// fail the error carries every attempt's reason.
pub struct FetchChain {
    sources: Vec<Box<dyn PageSource>>,
}

impl FetchChain {
    pub fn new(sources: Vec<Box<dyn PageSource>>) -> Self {
        Self { sources }
    }

    pub fn strategies(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait]
impl PageSource for FetchChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let mut failures = Vec::new();
        for source in &self.sources {
            match source.fetch(url).await {
                Ok(page) => {
                    info!(url, strategy = source.name(), bytes = page.markup.len(), "fetched listing page");
                    return Ok(page);
                }
                Err(e) => {
                    warn!(url, strategy = source.name(), error = %e, "fetch strategy failed");
                    failures.push(StrategyFailure { strategy: source.name(), reason: e.to_string() });
                }
            }
        }
        Err(FetchError::Exhausted(failures))
    }
}

// ── Tests ──
