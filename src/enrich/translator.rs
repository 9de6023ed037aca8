use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;

const TRANSLATE_URL: &str = "https://translate.googleapis.com/translate_a/single";

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

/// Best-effort text translation via the public Google Translate endpoint.
///
/// `translate` never fails to the caller: any transport error, malformed
/// payload, or low-quality result degrades to `None`, which readers treat as
/// "use the original text".
pub struct Translator {
    client: Client,
    target_lang: String,
    max_chars: usize,
    max_attempts: u32,
    enabled: bool,
}

impl Translator {
    pub fn new(
        target_lang: String,
        timeout: Duration,
        max_chars: usize,
        max_attempts: u32,
        user_agent: String,
        enabled: bool,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .expect("Failed to create HTTP client");
        Self {
            client,
            target_lang,
            max_chars,
            max_attempts: max_attempts.max(1),
            enabled,
        }
    }

    pub async fn translate(&self, text: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }

        let text = text.trim();
        if text.chars().count() < 3 {
            return None;
        }

        let mut text = whitespace_re().replace_all(text, " ").into_owned();
        if text.chars().count() > self.max_chars {
            text = text.chars().take(self.max_chars).collect::<String>() + "...";
        }

        if self.already_in_target_lang(&text) {
            return None;
        }

        for attempt in 1..=self.max_attempts {
            match self.request(&text).await {
                Ok(Some(translated)) => return Some(translated),
                // a parseable but unusable response is permanent; stop retrying
                Ok(None) => return None,
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max = self.max_attempts,
                        error = %e,
                        "translation request failed"
                    );
                }
            }
        }
        None
    }

    async fn request(&self, text: &str) -> Result<Option<String>, reqwest::Error> {
        let response = self
            .client
            .get(TRANSLATE_URL)
            .query(&[
                ("client", "gtx"),
                ("sl", "auto"),
                ("tl", self.target_lang.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        // 5xx is transient and worth another attempt; anything else
        // non-success is permanent and falls back to the original text
        let response = if response.status().is_server_error() {
            response.error_for_status()?
        } else {
            response
        };
        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "translation endpoint rejected request");
            return Ok(None);
        }

        let payload: serde_json::Value = response.json().await?;
        Ok(extract_translation(&payload, text))
    }

    /// Crude same-language check; a text that is already mostly CJK does not
    /// need a round trip to the translation endpoint.
    fn already_in_target_lang(&self, text: &str) -> bool {
        if self.target_lang != "zh" {
            return false;
        }
        let total = text.chars().count();
        if total == 0 {
            return true;
        }
        let cjk = text
            .chars()
            .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
            .count();
        cjk * 10 > total * 3
    }
}

/// The gtx endpoint answers with nested arrays: the first element is a list
/// of segments whose first element is the translated chunk.
fn extract_translation(payload: &serde_json::Value, original: &str) -> Option<String> {
    let segments = payload.get(0)?.as_array()?;
    let mut translated = String::new();
    for segment in segments {
        if let Some(chunk) = segment.get(0).and_then(|v| v.as_str()) {
            translated.push_str(chunk);
        }
    }

    let translated = whitespace_re()
        .replace_all(translated.trim(), " ")
        .into_owned();

    // quality gate: reject empty, trivially short, or unchanged results
    if translated.chars().count() > 5 && translated != original {
        Some(translated)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translator(enabled: bool) -> Translator {
        Translator::new(
            "zh".to_string(),
            Duration::from_secs(1),
            400,
            1,
            "test-agent".to_string(),
            enabled,
        )
    }

    #[tokio::test]
    async fn disabled_translator_degrades_to_none() {
        let t = translator(false);
        assert_eq!(t.translate("A headline worth translating").await, None);
    }

    #[tokio::test]
    async fn too_short_input_is_skipped() {
        let t = translator(true);
        assert_eq!(t.translate("ab").await, None);
        assert_eq!(t.translate("  a ").await, None);
    }

    #[tokio::test]
    async fn chinese_input_is_left_alone() {
        let t = translator(true);
        assert_eq!(t.translate("这是一条中文新闻标题").await, None);
    }

    #[test]
    fn detects_mostly_cjk_text() {
        let t = translator(true);
        assert!(t.already_in_target_lang("完全是中文的句子"));
        assert!(!t.already_in_target_lang("Mostly English with 中文 sprinkled in"));
    }

    #[test]
    fn extracts_segments_from_gtx_payload() {
        let payload: serde_json::Value = serde_json::from_str(
            r#"[[["你好，","Hello, ",null],["世界","world",null]],null,"en"]"#,
        )
        .unwrap();
        assert_eq!(
            extract_translation(&payload, "Hello, world"),
            Some("你好，世界".to_string())
        );
    }

    #[test]
    fn rejects_unchanged_or_trivial_results() {
        let unchanged: serde_json::Value =
            serde_json::from_str(r#"[[["Hello, world","Hello, world",null]]]"#).unwrap();
        assert_eq!(extract_translation(&unchanged, "Hello, world"), None);

        let trivial: serde_json::Value =
            serde_json::from_str(r#"[[["你好",null,null]]]"#).unwrap();
        assert_eq!(extract_translation(&trivial, "Hello, world"), None);

        let malformed: serde_json::Value = serde_json::from_str(r#"{"err":1}"#).unwrap();
        assert_eq!(extract_translation(&malformed, "Hello"), None);
    }
}
