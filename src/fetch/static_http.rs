use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::redirect::Policy;
use reqwest::{Client, StatusCode};

use super::{FetchedPage, PageSource};
use crate::error::FetchError;

/// Government portals reject obvious bot user agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Shared client for listing pages and attachment downloads.
pub fn build_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .redirect(Policy::limited(5))
        .user_agent(BROWSER_USER_AGENT)
        .build()
}

/// Plain GET of the listing page. Only works when the table is in the
/// server-rendered HTML.
pub struct StaticSource {
    client: Client,
}

impl StaticSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageSource for StaticSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let resp = self
            .client
            .get(url)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::HttpStatus { status: status.as_u16(), url: url.to_string() });
        }

        let final_url = resp.url().to_string();
        let markup = resp.text().await?;
        if markup.trim().is_empty() {
            return Err(FetchError::EmptyBody(final_url));
        }
        Ok(FetchedPage { url: final_url, markup, strategy: "static" })
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source() -> StaticSource {
        StaticSource::new(build_client(Duration::from_secs(5)).unwrap())
    }

    #[tokio::test]
    async fn returns_markup_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/CP/"))
            .and(header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<table><tr><td>x</td></tr></table>"))
            .mount(&server)
            .await;

        let url = format!("{}/CP/?opt=circular", server.uri());
        let page = source().fetch(&url).await.unwrap();
        assert_eq!(page.strategy, "static");
        assert_eq!(page.url, url);
        assert!(page.markup.contains("<table>"));
    }

    #[tokio::test]
    async fn non_200_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source().fetch(&format!("{}/CP/", server.uri())).await.unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 503, .. }));
    }

    #[tokio::test]
    async fn blank_body_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("  \n"))
            .mount(&server)
            .await;

        let err = source().fetch(&server.uri()).await.unwrap_err();
        assert!(matches!(err, FetchError::EmptyBody(_)));
    }
}
