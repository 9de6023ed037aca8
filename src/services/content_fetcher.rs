use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::ContentSource;

// Keep a handful of lines; summarization only ever looks at the opening of
// an article.
const MAX_CONTENT_LINES: usize = 8;
const MIN_LINE_CHARS: usize = 20;

/// Fetches article pages and reduces them to plain text for summarization.
/// Every failure path degrades to `None`; a single unreadable article must
/// never disturb the ingest cycle.
pub struct ContentFetcher {
    client: Client,
    base_url: String,
}

impl ContentFetcher {
    pub fn new(base_url: String, timeout: Duration, user_agent: String) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, base_url }
    }

    async fn fetch(&self, article_url: &str) -> Option<String> {
        // discussion permalinks have no article body worth summarizing
        if article_url.starts_with(&self.base_url) && article_url.contains("/item?") {
            return None;
        }

        let response = match self.client.get(article_url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(url = article_url, error = %e, "failed to fetch article");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(url = article_url, status = %response.status(), "article fetch rejected");
            return None;
        }

        let html = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(url = article_url, error = %e, "failed to read article body");
                return None;
            }
        };

        extract_content(&html)
    }
}

#[async_trait]
impl ContentSource for ContentFetcher {
    async fn fetch_raw_content(&self, url: &str) -> Option<String> {
        self.fetch(url).await
    }
}

/// Convert HTML to plain text and keep the first few prose-looking lines.
fn extract_content(html: &str) -> Option<String> {
    let text = match html2text::from_read(html.as_bytes(), 80) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!("Failed to convert HTML to text: {}", e);
            return None;
        }
    };

    let cleaned: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| {
            l.chars().count() > MIN_LINE_CHARS
                && !l.starts_with("http")
                && !l.starts_with("www")
                && !l.starts_with('@')
        })
        .take(MAX_CONTENT_LINES)
        .collect();

    if cleaned.is_empty() {
        tracing::debug!("no usable text lines extracted");
        None
    } else {
        Some(cleaned.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discussion_permalinks_are_skipped() {
        let fetcher = ContentFetcher::new(
            "https://news.ycombinator.com".to_string(),
            Duration::from_secs(1),
            "test-agent".to_string(),
        );
        assert_eq!(
            fetcher
                .fetch_raw_content("https://news.ycombinator.com/item?id=1")
                .await,
            None
        );
    }

    #[test]
    fn extracts_prose_and_drops_link_lines() {
        let html = "<html><body>\
            <p>The first paragraph carries enough words to survive cleanup.</p>\
            <p>http://example.com/not-prose-but-a-long-url-line-over-twenty</p>\
            <p>Second paragraph also has plenty of readable text in it.</p>\
            </body></html>";
        let content = extract_content(html).unwrap();
        assert!(content.contains("first paragraph"));
        assert!(content.contains("Second paragraph"));
        assert!(!content.contains("http://example.com"));
    }

    #[test]
    fn empty_or_trivial_pages_yield_none() {
        assert_eq!(extract_content("<html><body></body></html>"), None);
        assert_eq!(extract_content("<p>short</p>"), None);
    }
}
