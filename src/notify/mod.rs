mod telegram;

pub use telegram::TelegramSink;

use async_trait::async_trait;

/// Errors that can occur during notification delivery. The delivery
/// coordinator backs off longer after a timeout than after other failures,
/// and honours the server-suggested wait on rate limits.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("sink API error: {0}")]
    Api(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SinkError::Timeout
        } else {
            SinkError::Http(e)
        }
    }
}

/// Best-effort framing messages around a delivery batch.
#[derive(Debug, Clone, Copy)]
pub enum BatchMarker {
    Start {
        count: usize,
    },
    Completion {
        success: usize,
        total: usize,
        next_run_minutes: u64,
    },
}

/// A downstream notification channel.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Deliver one formatted payload. The caller decides about retries.
    async fn send(&self, text: &str) -> Result<(), SinkError>;

    /// Send a batch header/footer. Callers treat failures as log-and-go.
    async fn send_batch_marker(&self, marker: BatchMarker) -> Result<(), SinkError>;
}

/// Minimal escaping for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_html_metacharacters() {
        assert_eq!(
            escape_html("a < b && c > d"),
            "a &lt; b &amp;&amp; c &gt; d"
        );
        assert_eq!(escape_html("plain title 123"), "plain title 123");
        assert_eq!(escape_html(""), "");
    }
}
