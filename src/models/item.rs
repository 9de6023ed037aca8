use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A raw front-page row before enrichment and storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// HN item id, already normalized to its canonical string form.
    pub id: String,
    pub title: String,
    /// Link target of the story; points back at HN for Ask/Show threads.
    pub url: String,
    /// Discussion permalink on HN.
    pub source_url: String,
    pub score: i64,
    pub comments: i64,
    /// 1-based position on the front page when observed.
    pub rank: usize,
}

/// One stored story. `title_translated` and `summary_translated` are `None`
/// when translation was skipped or failed; formatting falls back to the
/// original text. `summary` is `None` when no qualifying sentence was found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub title: String,
    pub title_translated: Option<String>,
    pub url: String,
    pub source_url: String,
    pub score: i64,
    pub comments: i64,
    pub summary: Option<String>,
    pub summary_translated: Option<String>,
    pub discovered_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub is_sent: bool,
}

impl Item {
    /// A fresh, unsent item built from a candidate plus enrichment output.
    pub fn from_candidate(
        candidate: &Candidate,
        title_translated: Option<String>,
        summary: Option<String>,
        summary_translated: Option<String>,
    ) -> Self {
        Self {
            id: candidate.id.clone(),
            title: candidate.title.clone(),
            title_translated,
            url: candidate.url.clone(),
            source_url: candidate.source_url.clone(),
            score: candidate.score,
            comments: candidate.comments,
            summary,
            summary_translated,
            discovered_at: Utc::now(),
            sent_at: None,
            is_sent: false,
        }
    }
}

/// Outcome of a store upsert: either a brand-new row or a score/comments
/// refresh of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}
