//! Top-level wiring: one process, one meeting.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::audio::MicCapture;
use crate::config::Config;
use crate::platform::{MeetingPlatform, Platform, WsBridge};
use crate::recognition::WsRecognitionClient;
use crate::report::{self, Mailer, SmtpMailer};
use crate::session::{self, MeetingEnd, Session};
use crate::summary::ChatCompletionSummarizer;

/// Join the configured meeting, run the session until it ends, then
/// deliver the report. Only a delivery failure propagates out of here once
/// the meeting has been joined.
pub async fn run_meeting() -> Result<()> {
    let config = Config::load()?;
    let platform_kind = Platform::parse(&config.meeting.platform)?;

    let (bridge, events) = tokio::time::timeout(
        Duration::from_secs(config.timeouts.waiting_seconds),
        WsBridge::connect(&config.bridge.url, platform_kind),
    )
    .await
    .context("Timed out waiting for the platform bridge")??;

    info!(
        meeting = %config.meeting.name,
        platform = platform_kind.as_str(),
        "joining meeting"
    );
    bridge
        .join(
            &config.meeting.id,
            &config.meeting.password,
            &config.scribe.identity(),
        )
        .await?;

    for line in session::intro_messages(&config.commands) {
        if let Err(err) = bridge.send_chat_message(&line).await {
            warn!("failed to send introduction message: {:#}", err);
        }
    }

    let recognizer = Arc::new(WsRecognitionClient::new(&config.recognition));
    let capture = Box::new(MicCapture::new(config.recognition.sample_rate)?);

    let mut session = Session::new(
        bridge.clone() as Arc<dyn MeetingPlatform>,
        recognizer,
        capture,
        platform_kind,
        config.commands.clone(),
        config.scribe.name.clone(),
        Duration::from_secs(config.timeouts.meeting_seconds),
    );

    match session.run(events).await? {
        MeetingEnd::Ended => info!("meeting ended, composing report"),
        MeetingEnd::TimedOut => warn!("meeting timed out, composing report from partial logs"),
    }

    let summarizer = ChatCompletionSummarizer::new(&config.summary);
    let chat_lines: Vec<String> = session
        .chat()
        .messages()
        .iter()
        .map(|message| message.format_line())
        .collect();
    let transcript = session.captions().render_transcript();
    let report = report::synthesize(
        &config.meeting.name,
        session.attendees(),
        &chat_lines,
        &transcript,
        &summarizer,
    )
    .await;

    let mailer = SmtpMailer::new(&config.mail)?;
    mailer
        .send(&config.scribe.email_source(), &config.scribe.email, &report)
        .await?;
    info!("report delivered to {}", config.scribe.email);

    Ok(())
}
