//! Post-meeting report synthesis and delivery.
//!
//! Built once, at shutdown, from the final attendance, chat, and caption
//! state. The email is multipart: a plain/HTML alternative body plus the
//! raw transcript and chat as named attachments.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use crate::config::MailConfig;
use crate::summary::{self, SummaryService};

const MINIMAL_BODY: &str = "No meeting details were saved.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAttachment {
    pub filename: String,
    pub content: String,
}

/// Write-once snapshot of everything the delivery email needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub attachments: Vec<ReportAttachment>,
}

fn html_block(text: &str) -> String {
    text.replace('\n', "<br>")
}

/// Build the report from the rendered meeting logs.
///
/// `transcript` is the double-newline-joined `speaker: text` rendering and
/// `chat_lines` the formatted chat lines. When both are empty the meeting
/// saved nothing and a minimal report is produced instead.
pub async fn synthesize(
    meeting_name: &str,
    attendees: &[String],
    chat_lines: &[String],
    transcript: &str,
    summarizer: &dyn SummaryService,
) -> Report {
    if transcript.is_empty() && chat_lines.is_empty() {
        return Report {
            subject: meeting_name.to_string(),
            body_text: MINIMAL_BODY.to_string(),
            body_html: MINIMAL_BODY.to_string(),
            attachments: Vec::new(),
        };
    }

    let attendance = attendees.join("\n");
    let chat = chat_lines.join("\n");

    let fields = summary::summarize(transcript, summarizer).await;

    let subject = if fields.title.is_empty() {
        meeting_name.to_string()
    } else {
        format!("{} | {}", meeting_name, fields.title)
    };

    let body_text = format!(
        "Attendees:\n{}\nSummary:\n{}\n\nAction Items:\n{}",
        attendance, fields.summary, fields.action_items
    );
    let body_html = format!(
        "<html><body>\
         <h4>Attendees</h4><p>{}</p>\
         <h4>Summary</h4><p>{}</p>\
         <h4>Action Items</h4><p>{}</p>\
         </body></html>",
        html_block(&attendance),
        html_block(&fields.summary),
        html_block(&fields.action_items)
    );

    Report {
        subject,
        body_text,
        body_html,
        attachments: vec![
            ReportAttachment {
                filename: "transcript.txt".to_string(),
                content: transcript.to_string(),
            },
            ReportAttachment {
                filename: "chat.txt".to_string(),
                content: chat,
            },
        ],
    }
}

/// Outbound delivery transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, from: &str, to: &str, report: &Report) -> Result<()>;
}

fn compose_message(from: &str, to: &str, report: &Report) -> Result<Message> {
    let from: Mailbox = from.parse().context("Invalid source address")?;
    let to: Mailbox = to.parse().context("Invalid recipient address")?;

    let mut body = MultiPart::mixed().multipart(MultiPart::alternative_plain_html(
        report.body_text.clone(),
        report.body_html.clone(),
    ));
    for attachment in &report.attachments {
        body = body.singlepart(
            Attachment::new(attachment.filename.clone())
                .body(attachment.content.clone(), ContentType::TEXT_PLAIN),
        );
    }

    Message::builder()
        .from(from)
        .to(to)
        .subject(report.subject.clone())
        .multipart(body)
        .context("Failed to compose report email")
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .context("Invalid SMTP relay host")?
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();
        Ok(Self { transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, from: &str, to: &str, report: &Report) -> Result<()> {
        let message = compose_message(from, to, report)?;
        self.transport
            .send(message)
            .await
            .context("Failed to deliver report email")?;
        info!("report delivered: {}", report.subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::SummaryService;

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
            anyhow::bail!("service unavailable")
        }
    }

    #[tokio::test]
    async fn test_minimal_report_when_nothing_saved() {
        let report = synthesize("Weekly Sync", &[], &[], "", &FailingService).await;

        assert_eq!(report.subject, "Weekly Sync");
        assert_eq!(report.body_text, "No meeting details were saved.");
        assert!(report.attachments.is_empty());
    }

    #[tokio::test]
    async fn test_full_report() {
        let service =
            CannedService("<title>Planning</title><summary>We planned.</summary>\
                           <action items>- follow up</action items>");
        let attendees = vec!["Alice".to_string(), "Bob".to_string()];
        let chat = vec!["[09:30] Bob: hello".to_string()];
        let report = synthesize("Weekly Sync", &attendees, &chat, "Alice: hi", &service).await;

        assert_eq!(report.subject, "Weekly Sync | Planning");
        assert!(report.body_text.contains("Attendees:\nAlice\nBob"));
        assert!(report.body_text.contains("Summary:\nWe planned."));
        assert!(report.body_html.contains("Alice<br>Bob"));
        assert_eq!(report.attachments.len(), 2);
        assert_eq!(report.attachments[0].filename, "transcript.txt");
        assert_eq!(report.attachments[0].content, "Alice: hi");
        assert_eq!(report.attachments[1].filename, "chat.txt");
        assert_eq!(report.attachments[1].content, "[09:30] Bob: hello");
    }

    #[tokio::test]
    async fn test_generation_failure_still_produces_report() {
        let attendees = vec!["Alice".to_string()];
        let report = synthesize("Weekly Sync", &attendees, &[], "Alice: hi", &FailingService).await;

        // Subject falls back to the bare meeting name; attachments survive.
        assert_eq!(report.subject, "Weekly Sync");
        assert!(report.body_text.contains("Summary:\n\n"));
        assert_eq!(report.attachments.len(), 2);
    }

    #[tokio::test]
    async fn test_compose_message() {
        let service = CannedService("<title>Sync</title>");
        let report = synthesize(
            "Weekly",
            &["Alice".to_string()],
            &[],
            "Alice: hi",
            &service,
        )
        .await;

        let message = compose_message(
            "Scribe <me+scribe@example.com>",
            "me@example.com",
            &report,
        );
        assert!(message.is_ok());
    }

    #[test]
    fn test_compose_rejects_bad_addresses() {
        let report = Report {
            subject: "s".to_string(),
            body_text: "t".to_string(),
            body_html: "h".to_string(),
            attachments: Vec::new(),
        };
        assert!(compose_message("not an address", "me@example.com", &report).is_err());
    }
}
