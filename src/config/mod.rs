use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub meeting: MeetingConfig,
    pub scribe: ScribeConfig,
    pub commands: CommandConfig,
    pub timeouts: TimeoutConfig,
    pub bridge: BridgeConfig,
    pub recognition: RecognitionConfig,
    pub summary: SummaryConfig,
    pub mail: MailConfig,
}

/// Identity of the meeting this process joins. The launch scheduler injects
/// these as environment variables, which override the config file.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingConfig {
    pub platform: String,
    pub id: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    pub name: String,
    /// Recipient address for the post-meeting report. Also the basis of the
    /// scribe's identity and the report's source address.
    pub email: String,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            name: "Scribe".to_string(),
            email: String::new(),
        }
    }
}

impl ScribeConfig {
    /// Display identity shown to meeting attendees, e.g. `Scribe (me@example.com)`.
    pub fn identity(&self) -> String {
        format!("{} ({})", self.name, self.email)
    }

    /// Source address for the report email, e.g. `Scribe <me+scribe@example.com>`.
    pub fn email_source(&self) -> String {
        let address = match self.email.split_once('@') {
            Some((user, domain)) => format!("{}+scribe@{}", user, domain),
            None => self.email.clone(),
        };
        format!("{} <{}>", self.name, address)
    }
}

/// Chat tokens that drive the recording state. Matched case-sensitively
/// against the full message body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub start: String,
    pub pause: String,
    pub end: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            start: "START".to_string(),
            pause: "PAUSE".to_string(),
            end: "END".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long to wait for admission into the meeting.
    pub waiting_seconds: u64,
    /// Upper bound on the whole meeting. If no meeting-ended signal arrives
    /// within this window, the session is closed and the report delivered.
    pub meeting_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            waiting_seconds: 300,
            meeting_seconds: 43_200,
        }
    }
}

/// Local websocket endpoint the browser-automation sidecar listens on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8765".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub endpoint: String,
    pub language: String,
    pub sample_rate: u32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:9090/stream".to_string(),
            language: "en-US".to_string(),
            sample_rate: 16_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            api_key: String::new(),
            model: "anthropic/claude-3.5-sonnet".to_string(),
            max_tokens: 4096,
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_username: String,
    pub smtp_password: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let mut config = if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
            info!("Loaded config from {:?}", config_path);
            config
        } else {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            config
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Overlay the per-meeting identity injected by the launch scheduler.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(platform) = std::env::var("MEETING_PLATFORM") {
            self.meeting.platform = platform;
        }
        if let Ok(id) = std::env::var("MEETING_ID") {
            self.meeting.id = id;
        }
        if let Ok(password) = std::env::var("MEETING_PASSWORD") {
            self.meeting.password = password;
        }
        if let Ok(name) = std::env::var("MEETING_NAME") {
            self.meeting.name = name;
        }
        if let Ok(email) = std::env::var("EMAIL") {
            self.scribe.email = email;
        }
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.commands.start, "START");
        assert_eq!(config.commands.pause, "PAUSE");
        assert_eq!(config.commands.end, "END");
        assert_eq!(config.timeouts.meeting_seconds, 43_200);
        assert_eq!(config.recognition.sample_rate, 16_000);
        assert_eq!(config.scribe.name, "Scribe");
    }

    #[test]
    fn test_scribe_identity() {
        let scribe = ScribeConfig {
            name: "Scribe".to_string(),
            email: "me@example.com".to_string(),
        };
        assert_eq!(scribe.identity(), "Scribe (me@example.com)");
        assert_eq!(scribe.email_source(), "Scribe <me+scribe@example.com>");
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("MEETING_PLATFORM", "Chime");
        std::env::set_var("MEETING_ID", "1234567890");
        std::env::set_var("MEETING_NAME", "Weekly Sync");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.meeting.platform, "Chime");
        assert_eq!(config.meeting.id, "1234567890");
        assert_eq!(config.meeting.name, "Weekly Sync");

        std::env::remove_var("MEETING_PLATFORM");
        std::env::remove_var("MEETING_ID");
        std::env::remove_var("MEETING_NAME");
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.commands.start, config.commands.start);
        assert_eq!(parsed.bridge.url, config.bridge.url);
    }
}
