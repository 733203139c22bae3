//! End-to-end report synthesis and delivery against mock collaborators.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;

use scribe::captions::CaptionLog;
use scribe::report::{self, Mailer, Report};
use scribe::session::{ChatLog, ChatMessage};
use scribe::summary::SummaryService;

struct CannedSummarizer(&'static str);

#[async_trait]
impl SummaryService for CannedSummarizer {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

struct FailingSummarizer;

#[async_trait]
impl SummaryService for FailingSummarizer {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        anyhow::bail!("generation service unreachable")
    }
}

#[derive(Default)]
struct CapturingMailer {
    delivered: Mutex<Vec<(String, String, Report)>>,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, from: &str, to: &str, report: &Report) -> Result<()> {
        self.delivered
            .lock()
            .unwrap()
            .push((from.to_string(), to.to_string(), report.clone()));
        Ok(())
    }
}

fn chat_message(timestamp: &str, sender: &str, body: &str) -> ChatMessage {
    ChatMessage {
        timestamp: timestamp.to_string(),
        sender: sender.to_string(),
        body: body.to_string(),
        attachment: None,
    }
}

#[tokio::test]
async fn report_flows_from_logs_to_mailer() {
    let mut captions = CaptionLog::new();
    captions.commit("good morning", "Alice");
    captions.commit("good morning everyone", "Alice");
    captions.commit("hi Alice", "Bob");

    let mut chat = ChatLog::default();
    chat.push(chat_message("09:00", "Bob", "hello"));
    chat.push(chat_message("09:01", "Bob", "agenda attached"));

    let summarizer = CannedSummarizer(
        "<title>Morning Sync</title><summary>Quick hello.</summary><action items>- none</action items>",
    );

    let chat_lines: Vec<String> = chat.messages().iter().map(ChatMessage::format_line).collect();
    let transcript = captions.render_transcript();
    let report = report::synthesize(
        "Weekly Sync",
        &["Alice".to_string(), "Bob".to_string()],
        &chat_lines,
        &transcript,
        &summarizer,
    )
    .await;

    assert_eq!(report.subject, "Weekly Sync | Morning Sync");
    // The refined utterance collapsed into a single transcript block.
    assert_eq!(
        report.attachments[0].content,
        "Alice: good morning everyone\n\nBob: hi Alice"
    );
    assert_eq!(
        report.attachments[1].content,
        "[09:00] Bob: hello\n[09:01] Bob: agenda attached"
    );

    let mailer = CapturingMailer::default();
    mailer
        .send("Scribe <me+scribe@example.com>", "me@example.com", &report)
        .await
        .unwrap();

    let delivered = mailer.delivered.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1, "me@example.com");
    assert_eq!(delivered[0].2.subject, "Weekly Sync | Morning Sync");
}

#[tokio::test]
async fn generation_failure_never_blocks_delivery() {
    let mut captions = CaptionLog::new();
    captions.commit("the only utterance", "Alice");

    let transcript = captions.render_transcript();
    let report = report::synthesize(
        "Weekly Sync",
        &["Alice".to_string()],
        &[],
        &transcript,
        &FailingSummarizer,
    )
    .await;

    // Empty fields, bare subject, attachments intact.
    assert_eq!(report.subject, "Weekly Sync");
    assert_eq!(report.attachments.len(), 2);
    assert_eq!(report.attachments[0].content, "Alice: the only utterance");

    let mailer = CapturingMailer::default();
    mailer
        .send("Scribe <me+scribe@example.com>", "me@example.com", &report)
        .await
        .unwrap();
    assert_eq!(mailer.delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn empty_meeting_yields_minimal_report() {
    let report = report::synthesize("Weekly Sync", &[], &[], "", &FailingSummarizer).await;

    assert_eq!(report.subject, "Weekly Sync");
    assert_eq!(report.body_text, "No meeting details were saved.");
    assert_eq!(report.body_html, "No meeting details were saved.");
    assert!(report.attachments.is_empty());
}
