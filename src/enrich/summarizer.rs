use regex::Regex;
use std::sync::OnceLock;

const MIN_SENTENCE_CHARS: usize = 20;
const MAX_SENTENCE_CHARS: usize = 120;
const MAX_SENTENCES: usize = 2;

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap())
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+\s+").unwrap())
}

/// Extract up to two well-formed sentences from free text. Returns `None`
/// when the content is missing, too short, or yields no qualifying sentence;
/// the "no summary available" wording belongs to the message formatter.
pub fn summarize(content: &str) -> Option<String> {
    if content.len() < 30 {
        return None;
    }

    let stripped = tag_re().replace_all(content, "");

    let good: Vec<&str> = sentence_re()
        .split(&stripped)
        .map(str::trim)
        .filter(|s| qualifies(s))
        .take(MAX_SENTENCES)
        .collect();

    if good.is_empty() {
        return None;
    }

    let mut summary = good.join(". ");
    if !summary.ends_with('.') {
        summary.push('.');
    }
    Some(summary)
}

fn qualifies(sentence: &str) -> bool {
    let len = sentence.chars().count();
    if !(MIN_SENTENCE_CHARS..=MAX_SENTENCE_CHARS).contains(&len) {
        return false;
    }
    // skip URL-ish and mention-ish fragments
    for prefix in ["http", "www", "@", "#"] {
        if sentence.starts_with(prefix) {
            return false;
        }
    }
    sentence.matches(' ').count() >= 2
}
