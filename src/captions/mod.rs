//! Ordered caption log fed by a streaming recognition service.
//!
//! Streaming recognizers resend a lengthening hypothesis for the same
//! utterance, so consecutive results are collapsed by containment before
//! they land in the transcript.

/// One committed caption, attributed to whoever was speaking when the
/// utterance started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub speaker: String,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct CaptionLog {
    entries: Vec<Caption>,
}

/// Lowercase and strip ASCII punctuation for containment comparison.
fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_ascii_punctuation())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

impl CaptionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit one recognition result.
    ///
    /// If the normalized text of the last caption is a substring of the
    /// normalized incoming result, the result is a refinement of the same
    /// utterance: the last caption's text is replaced in place and its
    /// speaker is left untouched. Otherwise a new caption is appended for
    /// the current speaker.
    ///
    /// Two genuinely different utterances where one is a textual substring
    /// of the other are merged by this heuristic. That false positive is
    /// accepted.
    pub fn commit(&mut self, raw_text: &str, current_speaker: &str) {
        if let Some(last) = self.entries.last_mut() {
            if normalize(raw_text).contains(&normalize(&last.text)) {
                last.text = raw_text.to_string();
                return;
            }
        }
        self.entries.push(Caption {
            speaker: current_speaker.to_string(),
            text: raw_text.to_string(),
        });
    }

    pub fn entries(&self) -> &[Caption] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Render the transcript as double-newline-separated `speaker: text` blocks.
    pub fn render_transcript(&self) -> String {
        self.entries
            .iter()
            .map(|caption| format!("{}: {}", caption.speaker, caption.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_case_and_punctuation() {
        assert_eq!(normalize("Hello, World!"), "hello world");
        assert_eq!(normalize("it's done."), "its done");
    }

    #[test]
    fn test_refinement_merges_into_one_caption() {
        let mut log = CaptionLog::new();
        log.commit("let's get", "Alice");
        log.commit("Let's get started", "Alice");
        log.commit("Let's get started with the agenda.", "Alice");

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].text, "Let's get started with the agenda.");
    }

    #[test]
    fn test_new_utterance_appends() {
        let mut log = CaptionLog::new();
        log.commit("good morning everyone", "Alice");
        log.commit("any updates on the release", "Alice");

        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[1].text, "any updates on the release");
    }

    #[test]
    fn test_refinement_keeps_original_speaker() {
        let mut log = CaptionLog::new();
        log.commit("the deadline is", "Alice");
        // Bob became the current speaker mid-utterance; attribution stays.
        log.commit("the deadline is Friday", "Bob");

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].speaker, "Alice");
        assert_eq!(log.entries()[0].text, "the deadline is Friday");
    }

    #[test]
    fn test_repeated_commit_is_idempotent_on_speaker() {
        let mut log = CaptionLog::new();
        log.commit("same text", "Alice");
        log.commit("same text", "Bob");

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].speaker, "Alice");
        assert_eq!(log.entries()[0].text, "same text");
    }

    #[test]
    fn test_punctuation_differences_still_merge() {
        let mut log = CaptionLog::new();
        log.commit("well that works", "Alice");
        log.commit("Well, that works!", "Alice");

        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].text, "Well, that works!");
    }

    #[test]
    fn test_render_transcript() {
        let mut log = CaptionLog::new();
        log.commit("hello", "Alice");
        log.commit("welcome back", "Bob");

        assert_eq!(log.render_transcript(), "Alice: hello\n\nBob: welcome back");
    }

    #[test]
    fn test_empty_log_renders_empty() {
        let log = CaptionLog::new();
        assert!(log.is_empty());
        assert_eq!(log.render_transcript(), "");
    }
}
