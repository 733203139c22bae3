//! Meeting session engine.
//!
//! One `Session` exists per meeting process. Chat text drives the recording
//! state (`Idle` → `Recording` ⇄ `Paused` → `Ended`), attendance is tracked
//! unconditionally, and each `Recording` interval owns its own recognition
//! stream fed by the audio relay.
//!
//! All session state is mutated on the single task that runs the event
//! loop; the relay and the recognition reader communicate with it only
//! through channels.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::audio::{relay, AudioCapture, FrameQueue};
use crate::captions::CaptionLog;
use crate::config::CommandConfig;
use crate::platform::{MeetingEvent, MeetingPlatform, Platform};
use crate::recognition::RecognitionClient;

const AUDIO_QUEUE_FRAMES: usize = 64;
const SEGMENT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);
const FINAL_RESULT_WINDOW: Duration = Duration::from_secs(5);

/// Recording phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Recording,
    Paused,
    Ended,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Ended => "ended",
        }
    }
}

/// How the session terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingEnd {
    /// The meeting-ended signal arrived (or the END command was received).
    Ended,
    /// No end signal arrived within the meeting timeout.
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatAttachment {
    pub title: String,
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Wall-clock HH:MM at admission time.
    pub timestamp: String,
    pub sender: String,
    pub body: String,
    pub attachment: Option<ChatAttachment>,
}

impl ChatMessage {
    pub fn format_line(&self) -> String {
        let content = match &self.attachment {
            Some(attachment) if self.body.is_empty() => attachment.title.clone(),
            Some(attachment) => format!("{} | {}", self.body, attachment.title),
            None => self.body.clone(),
        };
        format!("[{}] {}: {}", self.timestamp, self.sender, content)
    }
}

/// Append-only chat transcript plus the attachment title → link index
/// accumulated as a side effect.
#[derive(Debug, Default)]
pub struct ChatLog {
    messages: Vec<ChatMessage>,
    attachments: Vec<(String, String)>,
}

impl ChatLog {
    pub fn push(&mut self, message: ChatMessage) {
        if let Some(attachment) = &message.attachment {
            match self
                .attachments
                .iter_mut()
                .find(|(title, _)| title == &attachment.title)
            {
                Some((_, href)) => *href = attachment.href.clone(),
                None => self
                    .attachments
                    .push((attachment.title.clone(), attachment.href.clone())),
            }
        }
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn attachments(&self) -> &[(String, String)] {
        &self.attachments
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render the chat as newline-joined formatted lines.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(ChatMessage::format_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Events produced by the tasks of the active recording segment.
#[derive(Debug)]
pub enum SegmentEvent {
    /// One recognition result arrived.
    Caption(String),
    /// The segment's stream or relay failed; the segment is dead.
    Failed(String),
    /// The recognition result reader drained the stream and exited.
    Closed,
}

struct Segment {
    recording: watch::Sender<bool>,
    relay: tokio::task::JoinHandle<()>,
    stream_id: u64,
}

pub struct Session {
    platform: Arc<dyn MeetingPlatform>,
    recognizer: Arc<dyn RecognitionClient>,
    capture: Box<dyn AudioCapture>,
    commands: CommandConfig,
    scribe_name: String,
    system_sender: &'static str,
    meeting_timeout: Duration,
    phase: Phase,
    current_speaker: String,
    last_sender: String,
    attendees: Vec<String>,
    chat: ChatLog,
    captions: CaptionLog,
    segment: Option<Segment>,
    pending_drain: bool,
}

impl Session {
    pub fn new(
        platform: Arc<dyn MeetingPlatform>,
        recognizer: Arc<dyn RecognitionClient>,
        capture: Box<dyn AudioCapture>,
        platform_kind: Platform,
        commands: CommandConfig,
        scribe_name: String,
        meeting_timeout: Duration,
    ) -> Self {
        Self {
            platform,
            recognizer,
            capture,
            commands,
            scribe_name,
            system_sender: platform_kind.system_sender(),
            meeting_timeout,
            phase: Phase::Idle,
            current_speaker: "First Speaker".to_string(),
            last_sender: String::new(),
            attendees: Vec::new(),
            chat: ChatLog::default(),
            captions: CaptionLog::new(),
            segment: None,
            pending_drain: false,
        }
    }

    /// Drive the session until the meeting ends or the meeting timeout
    /// elapses. Returns how the meeting terminated; the accumulated logs
    /// stay on the session for report synthesis.
    pub async fn run(&mut self, mut events: mpsc::Receiver<MeetingEvent>) -> Result<MeetingEnd> {
        let (segment_tx, mut segment_rx) = mpsc::channel::<SegmentEvent>(256);
        let deadline = tokio::time::sleep(self.meeting_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event, &segment_tx).await;
                        if self.phase == Phase::Ended {
                            self.drain_segment_events(&mut segment_rx).await;
                            return Ok(MeetingEnd::Ended);
                        }
                    }
                    None => {
                        warn!("event bridge closed before meeting end");
                        self.end_meeting().await;
                        self.drain_segment_events(&mut segment_rx).await;
                        return Ok(MeetingEnd::Ended);
                    }
                },
                Some(event) = segment_rx.recv() => self.handle_segment_event(event),
                _ = &mut deadline => {
                    warn!(
                        "no meeting-end signal within {}s, closing session",
                        self.meeting_timeout.as_secs()
                    );
                    self.end_meeting().await;
                    self.drain_segment_events(&mut segment_rx).await;
                    return Ok(MeetingEnd::TimedOut);
                }
            }
        }
    }

    pub async fn handle_event(
        &mut self,
        event: MeetingEvent,
        segment_events: &mpsc::Sender<SegmentEvent>,
    ) {
        match event {
            MeetingEvent::SpeakerChanged { name } => self.speaker_changed(name),
            MeetingEvent::MessageChanged {
                sender,
                text,
                attachment_title,
                attachment_href,
            } => {
                self.message_changed(sender, text, attachment_title, attachment_href, segment_events)
                    .await
            }
            MeetingEvent::MeetingEnded => self.end_meeting().await,
        }
    }

    /// Attendance is tracked in every phase so latecomer introductions
    /// before START still count.
    fn speaker_changed(&mut self, name: String) {
        debug!("speaker changed: {}", name);
        if !self.attendees.contains(&name) {
            self.attendees.push(name.clone());
        }
        self.current_speaker = name;
    }

    async fn message_changed(
        &mut self,
        sender: String,
        text: String,
        attachment_title: Option<String>,
        attachment_href: Option<String>,
        segment_events: &mpsc::Sender<SegmentEvent>,
    ) {
        // Continuation lines omit the sender label; the last seen sender
        // applies, resolved before any filtering.
        let sender = if sender.is_empty() {
            self.last_sender.clone()
        } else {
            sender
        };
        self.last_sender = sender.clone();

        if text == self.commands.end {
            self.end_meeting().await;
            return;
        }

        match self.phase {
            Phase::Recording if text == self.commands.pause => self.pause_recording().await,
            Phase::Idle | Phase::Paused if text == self.commands.start => {
                self.start_recording(segment_events).await
            }
            Phase::Recording if !self.is_own_sender(&sender) => {
                let attachment = match (attachment_title, attachment_href) {
                    (Some(title), Some(href)) => Some(ChatAttachment { title, href }),
                    _ => None,
                };
                let message = ChatMessage {
                    timestamp: chrono::Local::now().format("%H:%M").to_string(),
                    sender,
                    body: text,
                    attachment,
                };
                info!("new message: {}", message.format_line());
                self.chat.push(message);
            }
            _ => {}
        }
    }

    fn is_own_sender(&self, sender: &str) -> bool {
        sender.contains(&self.scribe_name) || sender == self.system_sender
    }

    async fn start_recording(&mut self, segment_events: &mpsc::Sender<SegmentEvent>) {
        for line in start_messages(&self.commands) {
            if let Err(err) = self.platform.send_chat_message(&line).await {
                warn!("failed to send start acknowledgement: {:#}", err);
            }
        }
        match self.open_segment(segment_events).await {
            Ok(stream_id) => {
                self.phase = Phase::Recording;
                info!(stream_id, "recording started");
            }
            Err(err) => error!("failed to open recording segment: {:#}", err),
        }
    }

    async fn open_segment(&mut self, segment_events: &mpsc::Sender<SegmentEvent>) -> Result<u64> {
        let (mut stream, mut results) = self.recognizer.open_stream().await?;
        let stream_id = stream.id();

        let frames = FrameQueue::new(AUDIO_QUEUE_FRAMES);
        if let Err(err) = self.capture.start(frames.clone()) {
            let _ = stream.end_stream().await;
            return Err(err);
        }

        let (recording_tx, recording_rx) = watch::channel(true);

        let failures = segment_events.clone();
        let relay = tokio::spawn(async move {
            if let Err(err) = relay::run(stream, frames, recording_rx).await {
                let _ = failures.send(SegmentEvent::Failed(err.to_string())).await;
            }
        });

        let captions = segment_events.clone();
        tokio::spawn(async move {
            while let Some(text) = results.recv().await {
                if captions.send(SegmentEvent::Caption(text)).await.is_err() {
                    return;
                }
            }
            let _ = captions.send(SegmentEvent::Closed).await;
        });

        self.segment = Some(Segment {
            recording: recording_tx,
            relay,
            stream_id,
        });
        Ok(stream_id)
    }

    async fn pause_recording(&mut self) {
        self.phase = Phase::Paused;
        for line in pause_messages(&self.commands) {
            if let Err(err) = self.platform.send_chat_message(&line).await {
                warn!("failed to send pause acknowledgement: {:#}", err);
            }
        }
        self.close_segment().await;
    }

    /// Close the active segment gracefully: stop capture, clear the
    /// recording flag, and wait for the relay to finish the end-of-stream
    /// handshake before returning.
    async fn close_segment(&mut self) {
        if let Some(segment) = self.segment.take() {
            let stream_id = segment.stream_id;
            self.capture.stop();
            let _ = segment.recording.send(false);
            match tokio::time::timeout(SEGMENT_CLOSE_TIMEOUT, segment.relay).await {
                Ok(Ok(())) => debug!(stream_id, "segment closed"),
                Ok(Err(err)) => warn!(stream_id, "relay task failed: {}", err),
                Err(_) => warn!(stream_id, "timed out waiting for recognition stream to close"),
            }
            self.pending_drain = true;
        }
    }

    async fn end_meeting(&mut self) {
        if self.phase == Phase::Ended {
            return;
        }
        self.close_segment().await;
        if let Err(err) = self.platform.leave().await {
            warn!("failed to leave meeting: {:#}", err);
        }
        self.phase = Phase::Ended;
        info!("meeting ended");
    }

    pub fn handle_segment_event(&mut self, event: SegmentEvent) {
        match event {
            SegmentEvent::Caption(text) => {
                info!("new caption: {}", text);
                self.captions.commit(&text, &self.current_speaker);
            }
            SegmentEvent::Failed(err) => {
                error!("recognition segment failed: {}", err);
                if self.phase == Phase::Recording {
                    self.phase = Phase::Paused;
                    self.capture.stop();
                    self.segment = None;
                }
            }
            SegmentEvent::Closed => {
                debug!("recognition results drained");
                self.pending_drain = false;
            }
        }
    }

    /// After the final segment closed, give the recognition reader a short
    /// window to flush its remaining results into the caption log.
    async fn drain_segment_events(&mut self, events: &mut mpsc::Receiver<SegmentEvent>) {
        if !self.pending_drain {
            return;
        }
        let deadline = tokio::time::Instant::now() + FINAL_RESULT_WINDOW;
        loop {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(event)) => {
                    let closed = matches!(event, SegmentEvent::Closed);
                    self.handle_segment_event(event);
                    if closed {
                        break;
                    }
                }
                _ => break,
            }
        }
        self.pending_drain = false;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attendees(&self) -> &[String] {
        &self.attendees
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn captions(&self) -> &CaptionLog {
        &self.captions
    }
}

/// Introduction posted to the chat right after joining.
pub fn intro_messages(commands: &CommandConfig) -> Vec<String> {
    vec![
        "Hello! I am an AI-assisted meeting scribe.".to_string(),
        format!(
            "If all attendees consent to my use, send \"{}\" in the chat \
             to start saving new speakers, messages, and machine-generated captions.",
            commands.start
        ),
        format!(
            "Send \"{}\" in the chat to pause saving meeting details.",
            commands.pause
        ),
        format!(
            "If you do not consent to my use, send \"{}\" in the chat \
             to remove me from this meeting.",
            commands.end
        ),
    ]
}

pub fn start_messages(commands: &CommandConfig) -> Vec<String> {
    vec![
        "Saving new speakers, messages, and machine-generated captions.".to_string(),
        format!(
            "Send \"{}\" in the chat to stop saving meeting details.",
            commands.pause
        ),
    ]
}

pub fn pause_messages(commands: &CommandConfig) -> Vec<String> {
    vec![
        "Not saving speakers, messages, or machine-generated captions.".to_string(),
        format!(
            "Send \"{}\" in the chat to start saving meeting details.",
            commands.start
        ),
    ]
}
