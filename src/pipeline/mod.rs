mod deliver;
mod ingest;

pub use deliver::Delivery;
pub use ingest::Ingest;

use crate::models::{DeliveryReport, IngestReport};

/// One full cycle: harvest and store, then drain the unsent backlog.
pub struct Pipeline {
    ingest: Ingest,
    delivery: Delivery,
}

impl Pipeline {
    pub fn new(ingest: Ingest, delivery: Delivery) -> Self {
        Self { ingest, delivery }
    }

    pub async fn run_cycle(&self) -> (IngestReport, DeliveryReport) {
        tracing::info!("cycle starting");
        let ingest_report = self.ingest.run().await;

        let delivery_report = match self.delivery.run().await {
            Ok(report) => report,
            Err(e) => {
                // a storage failure aborts delivery for this cycle only;
                // unsent items stay eligible
                tracing::error!(error = %e, "delivery cycle aborted");
                DeliveryReport::default()
            }
        };

        tracing::info!(
            new = ingest_report.new,
            updated = ingest_report.updated,
            failed = ingest_report.failed,
            sent = delivery_report.sent,
            unsent_total = delivery_report.total,
            "cycle finished"
        );
        (ingest_report, delivery_report)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::db::Store;
    use crate::enrich::Translator;
    use crate::models::Candidate;
    use crate::notify::{BatchMarker, Sink, SinkError};
    use crate::services::{CandidateSource, ContentSource};

    // ---- fakes -------------------------------------------------------

    struct ScriptedSource {
        batches: Mutex<VecDeque<Vec<Candidate>>>,
    }

    impl ScriptedSource {
        fn new(batches: Vec<Vec<Candidate>>) -> Arc<Self> {
            Arc::new(Self {
                batches: Mutex::new(batches.into()),
            })
        }
    }

    #[async_trait]
    impl CandidateSource for ScriptedSource {
        async fn fetch_candidates(&self) -> Vec<Candidate> {
            self.batches.lock().unwrap().pop_front().unwrap_or_default()
        }
    }

    struct StaticContent;

    #[async_trait]
    impl ContentSource for StaticContent {
        async fn fetch_raw_content(&self, _url: &str) -> Option<String> {
            Some(
                "The article opens with a reasonable first sentence. \
                 It follows up with a second sentence of similar length."
                    .to_string(),
            )
        }
    }

    /// Sink that fails according to a script of queued errors, then succeeds.
    #[derive(Default)]
    struct FakeSink {
        failures: Mutex<VecDeque<SinkError>>,
        sent: Mutex<Vec<String>>,
        markers: Mutex<Vec<&'static str>>,
    }

    impl FakeSink {
        fn with_failures(failures: Vec<SinkError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(failures.into()),
                ..Default::default()
            })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Sink for FakeSink {
        async fn send(&self, text: &str) -> Result<(), SinkError> {
            if let Some(err) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_batch_marker(&self, marker: BatchMarker) -> Result<(), SinkError> {
            let kind = match marker {
                BatchMarker::Start { .. } => "start",
                BatchMarker::Completion { .. } => "completion",
            };
            self.markers.lock().unwrap().push(kind);
            Ok(())
        }
    }

    // ---- wiring ------------------------------------------------------

    fn candidate(id: &str, score: i64) -> Candidate {
        Candidate {
            id: id.to_string(),
            title: format!("Story {id}"),
            url: format!("https://example.com/{id}"),
            source_url: format!("https://news.ycombinator.com/item?id={id}"),
            score,
            comments: 3,
            rank: 1,
        }
    }

    async fn store(dir: &tempfile::TempDir) -> Arc<Store> {
        let path = dir.path().join("items.db");
        Arc::new(
            Store::open(path.to_str().unwrap(), "2026-08-27")
                .await
                .unwrap(),
        )
    }

    fn translator_off() -> Arc<Translator> {
        Arc::new(Translator::new(
            "zh".to_string(),
            Duration::from_secs(1),
            400,
            1,
            "test-agent".to_string(),
            false,
        ))
    }

    fn ingest(store: Arc<Store>, source: Arc<dyn CandidateSource>) -> Ingest {
        Ingest::new(
            store,
            source,
            Arc::new(StaticContent),
            translator_off(),
            true,
            Duration::ZERO,
        )
    }

    fn delivery(store: Arc<Store>, sink: Arc<dyn Sink>, max_retries: u32) -> Delivery {
        Delivery::new(
            store,
            sink,
            max_retries,
            Duration::ZERO,
            Duration::ZERO,
            Duration::ZERO,
            180,
            5,
        )
    }

    // ---- tests -------------------------------------------------------

    #[tokio::test]
    async fn retrying_sink_marks_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let source = ScriptedSource::new(vec![vec![candidate("1", 10)]]);
        ingest(store.clone(), source).run().await;

        // two failures, then success; three attempts are allowed
        let sink = FakeSink::with_failures(vec![
            SinkError::Timeout,
            SinkError::Api("flaky".to_string()),
        ]);
        let report = delivery(store.clone(), sink.clone(), 2).run().await.unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(sink.sent_count(), 1);
        let item = store.get("1").await.unwrap().unwrap();
        assert!(item.is_sent);
        assert!(item.sent_at.is_some());
        // marking again is a no-op
        assert!(!store.mark_sent("1").await.unwrap());
    }

    #[tokio::test]
    async fn exhausted_retries_leave_item_eligible() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let source = ScriptedSource::new(vec![vec![candidate("1", 10)]]);
        ingest(store.clone(), source).run().await;

        let sink = FakeSink::with_failures(vec![
            SinkError::Timeout,
            SinkError::Timeout,
            SinkError::Timeout,
        ]);
        let report = delivery(store.clone(), sink.clone(), 2).run().await.unwrap();

        assert_eq!(report.sent, 0);
        assert_eq!(report.total, 1);
        assert_eq!(sink.sent_count(), 0);
        assert!(!store.get("1").await.unwrap().unwrap().is_sent);
        assert_eq!(store.list_unsent().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_backlog_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let sink: Arc<FakeSink> = Arc::new(FakeSink::default());

        let report = delivery(store, sink.clone(), 2).run().await.unwrap();
        assert_eq!(report, DeliveryReport::default());
        // no batch markers for an empty batch
        assert!(sink.markers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn end_to_end_two_stories_then_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let source = ScriptedSource::new(vec![
            vec![candidate("1", 10), candidate("2", 5)],
            vec![candidate("1", 50)],
        ]);
        let sink: Arc<FakeSink> = Arc::new(FakeSink::default());

        let pipeline = Pipeline::new(
            ingest(store.clone(), source),
            delivery(store.clone(), sink.clone(), 2),
        );

        // cycle 1: both stories ingested, enriched, delivered
        let (ingested, delivered) = pipeline.run_cycle().await;
        assert_eq!((ingested.new, ingested.updated, ingested.failed), (2, 0, 0));
        assert_eq!((delivered.sent, delivered.total), (2, 2));
        assert_eq!(sink.sent_count(), 2);
        assert_eq!(
            *sink.markers.lock().unwrap(),
            vec!["start", "completion"]
        );

        let one = store.get("1").await.unwrap().unwrap();
        let two = store.get("2").await.unwrap().unwrap();
        assert!(one.is_sent && two.is_sent);
        assert!(one.sent_at.is_some() && two.sent_at.is_some());
        assert!(one.summary.is_some());

        // cycle 2: story 1 reappears with a new score; nothing to deliver
        let (ingested, delivered) = pipeline.run_cycle().await;
        assert_eq!((ingested.new, ingested.updated), (0, 1));
        assert_eq!(delivered, DeliveryReport::default());
        assert_eq!(sink.sent_count(), 2);

        let one = store.get("1").await.unwrap().unwrap();
        let two = store.get("2").await.unwrap().unwrap();
        assert_eq!(one.score, 50);
        assert_eq!(two.score, 5);
        assert!(one.is_sent && two.is_sent);
        // immutable fields survived the update
        assert!(one.summary.is_some());
    }

    #[tokio::test]
    async fn one_bad_candidate_does_not_abort_the_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        // a duplicate id inside one batch takes the update path on its
        // second sighting instead of failing the cycle
        let source = ScriptedSource::new(vec![vec![
            candidate("1", 10),
            candidate("1", 12),
            candidate("2", 3),
        ]]);

        let report = ingest(store.clone(), source).run().await;
        assert_eq!((report.new, report.updated, report.failed), (2, 1, 0));
        assert_eq!(store.get("1").await.unwrap().unwrap().score, 12);
    }
}
