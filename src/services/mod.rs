mod content_fetcher;
mod frontpage;

pub use content_fetcher::ContentFetcher;
pub use frontpage::FrontPage;

use async_trait::async_trait;

use crate::models::Candidate;

/// Where candidates come from. A transport or parse failure yields an empty
/// list; the pipeline treats that as "nothing to ingest this cycle".
#[async_trait]
pub trait CandidateSource: Send + Sync {
    async fn fetch_candidates(&self) -> Vec<Candidate>;
}

/// Raw article text for summarization. `None` means the page was
/// unreachable or had nothing worth summarizing; never an error.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch_raw_content(&self, url: &str) -> Option<String>;
}
