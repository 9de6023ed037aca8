use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::Result;
use crate::models::Candidate;

use super::CandidateSource;

fn row_selector() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("tr.athing").unwrap())
}

fn title_selector() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("span.titleline > a").unwrap())
}

fn score_selector() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("span.score").unwrap())
}

fn subtext_link_selector() -> &'static Selector {
    static S: OnceLock<Selector> = OnceLock::new();
    S.get_or_init(|| Selector::parse("td.subtext a").unwrap())
}

/// Scrapes the Hacker News front page into candidates. Whatever the page
/// lists is what one cycle ingests; there is no artificial cap.
pub struct FrontPage {
    client: Client,
    base_url: String,
}

impl FrontPage {
    pub fn new(base_url: String, timeout: Duration, user_agent: String) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .expect("Failed to create HTTP client");
        Self { client, base_url }
    }

    pub async fn fetch(&self) -> Result<Vec<Candidate>> {
        let response = self
            .client
            .get(&self.base_url)
            .send()
            .await?
            .error_for_status()?;
        let html = response.text().await?;
        Ok(parse_front_page(&html, &self.base_url))
    }

    /// Pre-flight reachability probe; the daemon refuses to start a loop it
    /// knows cannot fetch anything.
    pub async fn check_reachable(&self, timeout: Duration) -> Result<()> {
        self.client
            .get(&self.base_url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl CandidateSource for FrontPage {
    async fn fetch_candidates(&self) -> Vec<Candidate> {
        match self.fetch().await {
            Ok(candidates) => {
                tracing::info!(count = candidates.len(), "fetched front page");
                candidates
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch front page");
                Vec::new()
            }
        }
    }
}

/// Parse the front-page HTML. Story rows carry the item id; score spans and
/// comment links live in the sibling subtext row and are matched back to
/// their story through the id embedded in their own markup.
pub fn parse_front_page(html: &str, base_url: &str) -> Vec<Candidate> {
    let document = Html::parse_document(html);

    let scores = collect_scores(&document);
    let comments = collect_comments(&document);

    let mut candidates = Vec::new();
    for (index, row) in document.select(row_selector()).enumerate() {
        let Some(id) = row.value().attr("id").map(|s| s.trim().to_string()) else {
            continue;
        };
        if id.is_empty() {
            continue;
        }

        let Some(link) = row.select(title_selector()).next() else {
            tracing::debug!(id, "story row without a title link");
            continue;
        };
        let title = element_text(&link);
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let url = resolve_url(href, base_url);
        let source_url = format!("{base_url}/item?id={id}");

        candidates.push(Candidate {
            score: scores.get(&id).copied().unwrap_or(0),
            comments: comments.get(&id).copied().unwrap_or(0),
            id,
            title,
            url,
            source_url,
            rank: index + 1,
        });
    }
    candidates
}

/// `span.score` elements have ids of the form `score_<item id>` and text
/// like "123 points".
fn collect_scores(document: &Html) -> HashMap<String, i64> {
    document
        .select(score_selector())
        .filter_map(|span| {
            let id = span.value().attr("id")?.strip_prefix("score_")?.to_string();
            let score = leading_number(&element_text(&span))?;
            Some((id, score))
        })
        .collect()
}

/// Comment links point at `item?id=<item id>` and read "45 comments" (or
/// "discuss" when there are none yet, which we skip).
fn collect_comments(document: &Html) -> HashMap<String, i64> {
    document
        .select(subtext_link_selector())
        .filter_map(|link| {
            let href = link.value().attr("href")?;
            let id = href.strip_prefix("item?id=")?.to_string();
            let text = element_text(&link);
            if !text.contains("comment") {
                return None;
            }
            Some((id, leading_number(&text)?))
        })
        .collect()
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn leading_number(text: &str) -> Option<i64> {
    text.split_whitespace().next()?.parse().ok()
}

fn resolve_url(href: &str, base_url: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Ok(base) = url::Url::parse(base_url) {
        if let Ok(resolved) = base.join(href) {
            return resolved.to_string();
        }
    }
    href.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://news.ycombinator.com";

    const PAGE: &str = r#"
        <table>
          <tr class="athing" id="101">
            <td class="title"><span class="titleline">
              <a href="https://example.com/post">Example story</a>
            </span></td>
          </tr>
          <tr>
            <td class="subtext">
              <span class="score" id="score_101">321 points</span>
              <a href="item?id=101">45&nbsp;comments</a>
            </td>
          </tr>
          <tr class="athing" id="102">
            <td class="title"><span class="titleline">
              <a href="item?id=102">Ask HN: Internal story</a>
            </span></td>
          </tr>
          <tr>
            <td class="subtext">
              <span class="score" id="score_102">12 points</span>
              <a href="item?id=102">discuss</a>
            </td>
          </tr>
        </table>
    "#;

    #[test]
    fn parses_stories_scores_and_comments() {
        let candidates = parse_front_page(PAGE, BASE);
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.id, "101");
        assert_eq!(first.title, "Example story");
        assert_eq!(first.url, "https://example.com/post");
        assert_eq!(first.source_url, "https://news.ycombinator.com/item?id=101");
        assert_eq!(first.score, 321);
        assert_eq!(first.comments, 45);
        assert_eq!(first.rank, 1);

        let second = &candidates[1];
        assert_eq!(second.id, "102");
        // relative item? links resolve against the base url
        assert_eq!(second.url, "https://news.ycombinator.com/item?id=102");
        assert_eq!(second.score, 12);
        // "discuss" means no comments yet
        assert_eq!(second.comments, 0);
        assert_eq!(second.rank, 2);
    }

    #[test]
    fn rows_without_title_links_are_skipped() {
        let html =
            r#"<table><tr class="athing" id="7"><td>no link here</td></tr></table>"#;
        assert!(parse_front_page(html, BASE).is_empty());
    }

    #[test]
    fn empty_page_parses_to_no_candidates() {
        assert!(parse_front_page("", BASE).is_empty());
        assert!(parse_front_page("<html><body>nothing</body></html>", BASE).is_empty());
    }

    #[test]
    fn score_without_matching_story_is_ignored() {
        let html = r#"<table>
            <tr class="athing" id="5">
              <td><span class="titleline"><a href="https://e.com/a">Story</a></span></td>
            </tr>
            <tr>
              <td class="subtext"><span class="score" id="score_999">7 points</span></td>
            </tr>
        </table>"#;
        let candidates = parse_front_page(html, BASE);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].score, 0);
    }
}
