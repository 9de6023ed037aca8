use std::sync::Arc;
use std::time::Duration;

use crate::db::Store;
use crate::enrich::{summarize, Translator};
use crate::error::Result;
use crate::models::{Candidate, IngestReport, Item, UpsertOutcome};
use crate::services::{CandidateSource, ContentSource};

/// One harvest pass: classify each candidate as new or existing, enrich the
/// new ones, and let the store arbitrate. The store is the synchronization
/// point, so re-running an interrupted cycle re-derives the same partition
/// without duplicating work.
pub struct Ingest {
    store: Arc<Store>,
    source: Arc<dyn CandidateSource>,
    content: Arc<dyn ContentSource>,
    translator: Arc<Translator>,
    enable_content_summary: bool,
    request_interval: Duration,
}

impl Ingest {
    pub fn new(
        store: Arc<Store>,
        source: Arc<dyn CandidateSource>,
        content: Arc<dyn ContentSource>,
        translator: Arc<Translator>,
        enable_content_summary: bool,
        request_interval: Duration,
    ) -> Self {
        Self {
            store,
            source,
            content,
            translator,
            enable_content_summary,
            request_interval,
        }
    }

    pub async fn run(&self) -> IngestReport {
        let candidates = self.source.fetch_candidates().await;
        if candidates.is_empty() {
            tracing::warn!("no candidates this cycle");
            return IngestReport::default();
        }

        let total = candidates.len();
        let mut report = IngestReport::default();

        for (index, candidate) in candidates.iter().enumerate() {
            match self.process(candidate).await {
                Ok(UpsertOutcome::Inserted) => {
                    report.new += 1;
                    tracing::info!(
                        id = %candidate.id,
                        title = %candidate.title,
                        rank = candidate.rank,
                        progress = format!("{}/{total}", index + 1),
                        "stored new story"
                    );
                    // pace the enrichment calls, not the local updates
                    if index + 1 < total {
                        tokio::time::sleep(self.request_interval).await;
                    }
                }
                Ok(UpsertOutcome::Updated) => {
                    report.updated += 1;
                    tracing::debug!(id = %candidate.id, "refreshed score/comments");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(id = %candidate.id, error = %e, "failed to process candidate");
                }
            }
        }

        tracing::info!(
            new = report.new,
            updated = report.updated,
            failed = report.failed,
            "ingest cycle complete"
        );
        report
    }

    async fn process(&self, candidate: &Candidate) -> Result<UpsertOutcome> {
        let mut candidate = candidate.clone();
        candidate.id = candidate.id.trim().to_string();

        // existing stories only get their volatile fields refreshed; no
        // enrichment, so popularity churn costs no external calls
        if self.store.contains(&candidate.id).await? {
            let refresh = Item::from_candidate(&candidate, None, None, None);
            return self.store.upsert(&refresh).await;
        }

        let summary = if self.enable_content_summary {
            self.content
                .fetch_raw_content(&candidate.url)
                .await
                .and_then(|raw| summarize(&raw))
        } else {
            None
        };

        let summary_translated = match &summary {
            Some(s) => self.translator.translate(s).await,
            None => None,
        };
        let title_translated = self.translator.translate(&candidate.title).await;

        let item = Item::from_candidate(
            &candidate,
            title_translated,
            summary,
            summary_translated,
        );
        self.store.upsert(&item).await
    }
}
