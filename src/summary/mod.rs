//! Meeting summary generation.
//!
//! Builds a fixed-template prompt around the transcript, submits it to a
//! chat-completions endpoint, and extracts tag-delimited fields from the
//! response. A failed call degrades to empty fields; losing the meeting
//! record entirely is the worse failure, so the report always goes out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use crate::config::SummaryConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Structured fields extracted from the generated summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryFields {
    pub title: String,
    pub summary: String,
    pub action_items: String,
}

/// Text-generation backend.
#[async_trait]
pub trait SummaryService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

pub fn build_prompt(transcript: &str) -> String {
    format!(
        "Please create a title, summary, and list of action items from the following transcript:\
         \n<transcript>{}</transcript>\
         \nPlease output the title in <title></title> tags, the summary in <summary></summary> tags,\
         \u{20}and the action items in <action items></action items> tags.",
        transcript
    )
}

/// First-match tag-pair search; empty string when the tag is absent.
fn extract_tag(text: &str, tag: &str) -> String {
    let pattern = format!(r"(?s)<{0}>(.*?)</{0}>", regex::escape(tag));
    Regex::new(&pattern)
        .ok()
        .and_then(|re| re.captures(text))
        .map(|captures| captures[1].trim().to_string())
        .unwrap_or_default()
}

pub fn extract_fields(completion: &str) -> SummaryFields {
    SummaryFields {
        title: extract_tag(completion, "title"),
        summary: extract_tag(completion, "summary"),
        action_items: extract_tag(completion, "action items"),
    }
}

/// Generate and extract summary fields for a transcript. Request failures
/// are logged and treated as an empty completion.
pub async fn summarize(transcript: &str, service: &dyn SummaryService) -> SummaryFields {
    let prompt = build_prompt(transcript);
    let completion = match service.generate(&prompt).await {
        Ok(completion) => {
            info!("summary generated: {} chars", completion.len());
            completion
        }
        Err(err) => {
            error!("summary generation failed: {:#}", err);
            String::new()
        }
    };
    extract_fields(&completion)
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatRequestMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequestMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct ChatCompletionSummarizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl ChatCompletionSummarizer {
    pub fn new(config: &SummaryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl SummaryService for ChatCompletionSummarizer {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatRequestMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("Failed to send summary request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Summary request failed with status {}: {}", status, text);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse summary response")?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("Summary response contained no choices")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedService(&'static str);

    #[async_trait]
    impl SummaryService for CannedService {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingService;

    #[async_trait]
    impl SummaryService for FailingService {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            anyhow::bail!("model unavailable")
        }
    }

    #[test]
    fn test_prompt_embeds_transcript() {
        let prompt = build_prompt("Alice: hello");
        assert!(prompt.contains("<transcript>Alice: hello</transcript>"));
        assert!(prompt.contains("<title></title>"));
        assert!(prompt.contains("<action items></action items>"));
    }

    #[test]
    fn test_extract_fields() {
        let completion = "<title> Standup </title>\n<summary>Short sync.</summary>\
                          <action items>- ship it</action items>";
        let fields = extract_fields(completion);
        assert_eq!(fields.title, "Standup");
        assert_eq!(fields.summary, "Short sync.");
        assert_eq!(fields.action_items, "- ship it");
    }

    #[test]
    fn test_extract_first_match_wins() {
        let completion = "<title>One</title><title>Two</title>";
        assert_eq!(extract_fields(completion).title, "One");
    }

    #[test]
    fn test_extract_missing_tags_yield_empty() {
        let fields = extract_fields("no tags here");
        assert_eq!(fields, SummaryFields::default());
    }

    #[test]
    fn test_extract_multiline_field() {
        let completion = "<summary>line one\nline two</summary>";
        assert_eq!(extract_fields(completion).summary, "line one\nline two");
    }

    #[tokio::test]
    async fn test_summarize_happy_path() {
        let service = CannedService("<title>Sync</title><summary>ok</summary>");
        let fields = summarize("Alice: hi", &service).await;
        assert_eq!(fields.title, "Sync");
        assert_eq!(fields.summary, "ok");
        assert_eq!(fields.action_items, "");
    }

    #[tokio::test]
    async fn test_summarize_fails_soft() {
        let fields = summarize("Alice: hi", &FailingService).await;
        assert_eq!(fields, SummaryFields::default());
    }
}
