use std::sync::Arc;
use std::time::Duration;

use chrono::Local;

use crate::db::Store;
use crate::error::Result;
use crate::models::{DeliveryReport, Item};
use crate::notify::{escape_html, BatchMarker, Sink, SinkError};

const NO_SUMMARY: &str = "No summary available.";

/// Batches larger than this get the longer inter-message spacing.
const BULK_THRESHOLD: usize = 20;

/// Pushes every unsent item to the sink, in store order, one at a time.
/// An item is marked sent only after the sink confirms; exhausted retries
/// leave it eligible for the next cycle.
pub struct Delivery {
    store: Arc<Store>,
    sink: Arc<dyn Sink>,
    max_attempts: u32,
    send_interval: Duration,
    retry_interval: Duration,
    bulk_interval: Duration,
    max_summary_chars: usize,
    next_run_minutes: u64,
}

impl Delivery {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        sink: Arc<dyn Sink>,
        message_max_retries: u32,
        send_interval: Duration,
        retry_interval: Duration,
        bulk_interval: Duration,
        max_summary_chars: usize,
        next_run_minutes: u64,
    ) -> Self {
        Self {
            store,
            sink,
            max_attempts: message_max_retries + 1,
            send_interval,
            retry_interval,
            bulk_interval,
            max_summary_chars,
            next_run_minutes,
        }
    }

    pub async fn run(&self) -> Result<DeliveryReport> {
        let unsent = self.store.list_unsent().await?;
        if unsent.is_empty() {
            tracing::info!("nothing to deliver");
            return Ok(DeliveryReport::default());
        }

        let total = unsent.len();
        tracing::info!(total, "starting delivery batch");

        if let Err(e) = self
            .sink
            .send_batch_marker(BatchMarker::Start { count: total })
            .await
        {
            tracing::warn!(error = %e, "failed to send batch header");
        }

        let spacing = if total > BULK_THRESHOLD {
            self.bulk_interval
        } else {
            self.send_interval
        };

        let mut sent = 0usize;
        for (index, item) in unsent.iter().enumerate() {
            let text = format_message(item, index + 1, total, self.max_summary_chars);

            if self.send_with_retry(&text).await {
                match self.store.mark_sent(&item.id).await {
                    Ok(true) => {
                        sent += 1;
                        tracing::info!(
                            id = %item.id,
                            progress = format!("{}/{total}", index + 1),
                            "delivered"
                        );
                    }
                    Ok(false) => {
                        tracing::warn!(id = %item.id, "delivered but already marked sent")
                    }
                    Err(e) => {
                        tracing::error!(id = %item.id, error = %e, "failed to mark item sent")
                    }
                }
            } else {
                tracing::warn!(
                    id = %item.id,
                    "delivery failed after retries; eligible again next cycle"
                );
            }

            if index + 1 < total {
                tokio::time::sleep(spacing).await;
            }
        }

        if let Err(e) = self
            .sink
            .send_batch_marker(BatchMarker::Completion {
                success: sent,
                total,
                next_run_minutes: self.next_run_minutes,
            })
            .await
        {
            tracing::warn!(error = %e, "failed to send completion message");
        }

        tracing::info!(sent, total, "delivery batch complete");
        Ok(DeliveryReport { sent, total })
    }

    async fn send_with_retry(&self, text: &str) -> bool {
        for attempt in 1..=self.max_attempts {
            match self.sink.send(text).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max = self.max_attempts,
                        error = %e,
                        "send attempt failed"
                    );
                    if attempt < self.max_attempts {
                        tokio::time::sleep(self.retry_delay(&e, attempt)).await;
                    }
                }
            }
        }
        false
    }

    /// Escalates with the attempt number; timeouts wait on the longer base
    /// interval, rate limits wait exactly what the server asked for.
    fn retry_delay(&self, error: &SinkError, attempt: u32) -> Duration {
        match error {
            SinkError::Timeout => self.retry_interval * attempt,
            SinkError::RateLimited { retry_after_secs } => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => self.send_interval * attempt,
        }
    }
}

pub fn format_message(item: &Item, index: usize, total: usize, max_summary_chars: usize) -> String {
    let title = escape_html(item.title_translated.as_deref().unwrap_or(&item.title));

    let summary = item
        .summary_translated
        .as_deref()
        .or(item.summary.as_deref())
        .unwrap_or(NO_SUMMARY);
    let summary = escape_html(&truncate(summary, max_summary_chars));

    let popularity = popularity_label(item.score);
    let discussion = discussion_label(item.comments);
    let discovered = item.discovered_at.with_timezone(&Local).format("%H:%M");

    format!(
        "<b>📰 Hacker News #{index}</b>\n\
         ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\
         \n\
         <b>🔥 {title}</b>\n\
         \n\
         <b>📊 Signals</b>\n\
         • {popularity} ({score} points)\n\
         • {discussion} ({comments} comments)\n\
         • Discovered: {discovered}\n\
         \n\
         <b>📝 Summary</b>\n\
         {summary}\n\
         \n\
         <b>🔗 Links</b>\n\
         • <a href=\"{url}\">Read the article</a>\n\
         • <a href=\"{source_url}\">Join the discussion</a>\n\
         \n\
         <i>{index} of {total}</i>",
        score = item.score,
        comments = item.comments,
        url = item.url,
        source_url = item.source_url,
    )
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

fn popularity_label(score: i64) -> &'static str {
    if score > 500 {
        "🔥 Trending"
    } else if score > 200 {
        "⭐ High interest"
    } else if score > 100 {
        "📈 Rising"
    } else {
        "📊 Emerging"
    }
}

fn discussion_label(comments: i64) -> &'static str {
    if comments > 100 {
        "💬 Very active discussion"
    } else if comments > 50 {
        "💭 Active discussion"
    } else if comments > 10 {
        "📝 Some discussion"
    } else {
        "🔍 Quiet so far"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item() -> Item {
        Item {
            id: "42".to_string(),
            title: "Rust <3 & beyond".to_string(),
            title_translated: None,
            url: "https://example.com/a".to_string(),
            source_url: "https://news.ycombinator.com/item?id=42".to_string(),
            score: 250,
            comments: 60,
            summary: Some("A plain summary.".to_string()),
            summary_translated: None,
            discovered_at: Utc::now(),
            sent_at: None,
            is_sent: false,
        }
    }

    #[test]
    fn prefers_translated_fields_when_present() {
        let mut it = item();
        it.title_translated = Some("翻译标题".to_string());
        it.summary_translated = Some("翻译摘要。".to_string());
        let msg = format_message(&it, 1, 3, 180);
        assert!(msg.contains("翻译标题"));
        assert!(msg.contains("翻译摘要。"));
        assert!(!msg.contains("A plain summary."));
    }

    #[test]
    fn falls_back_to_original_then_sentinel() {
        let msg = format_message(&item(), 1, 1, 180);
        assert!(msg.contains("A plain summary."));

        let mut bare = item();
        bare.summary = None;
        let msg = format_message(&bare, 1, 1, 180);
        assert!(msg.contains(NO_SUMMARY));
    }

    #[test]
    fn escapes_html_in_title() {
        let msg = format_message(&item(), 2, 5, 180);
        assert!(msg.contains("Rust &lt;3 &amp; beyond"));
        assert!(msg.contains("<i>2 of 5</i>"));
    }

    #[test]
    fn truncates_long_summaries_with_ellipsis() {
        let mut it = item();
        it.summary = Some("x".repeat(300));
        let msg = format_message(&it, 1, 1, 180);
        assert!(msg.contains(&format!("{}...", "x".repeat(180))));
        assert!(!msg.contains(&"x".repeat(200)));
    }

    #[test]
    fn tier_labels_follow_thresholds() {
        assert_eq!(popularity_label(501), "🔥 Trending");
        assert_eq!(popularity_label(500), "⭐ High interest");
        assert_eq!(popularity_label(150), "📈 Rising");
        assert_eq!(popularity_label(10), "📊 Emerging");

        assert_eq!(discussion_label(101), "💬 Very active discussion");
        assert_eq!(discussion_label(51), "💭 Active discussion");
        assert_eq!(discussion_label(11), "📝 Some discussion");
        assert_eq!(discussion_label(0), "🔍 Quiet so far");
    }
}
