//! Run configuration.
//!
//! A [`Config`] is built once at start-up and passed by reference to the
//! resolver, the generator and the service adapters. Values are layered:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. An optional YAML file (`--config podcaster.yaml`)
//! 3. Command-line flags and environment variables
//!
//! # Example file
//!
//! ```yaml
//! base_dir: /srv/podcast
//! news_source_url: https://today_arweave.ar.io/
//! enable_video: false
//! tts_voice: Puck
//! ```

use crate::cli::Cli;
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

pub const DEFAULT_NEWS_SOURCE_URL: &str = "https://today_arweave.ar.io/";
pub const DEFAULT_FALLBACK_URL: &str =
    "https://raw.githubusercontent.com/ArweaveTeam/arweave-today/main/data/today.json";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding `data/` and `output/`.
    pub base_dir: PathBuf,
    pub news_source_url: String,
    pub fallback_url: String,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout_secs: u64,
    /// Prefix of every artifact file name.
    pub base_filename: String,
    pub audio_extension: String,
    pub enable_enhancement: bool,
    pub enable_audio: bool,
    pub enable_video: bool,
    pub video_concurrency: usize,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub transcription_model: String,
    /// Path to the chat client config; the client's default location when unset.
    pub enhancer_config: Option<PathBuf>,
    pub enhancer_template: String,
    pub enhancer_max_retries: usize,
    pub yt_dlp_path: String,
    /// Upper bound on one `yt-dlp` download; the child is killed past it.
    pub video_download_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            news_source_url: DEFAULT_NEWS_SOURCE_URL.to_string(),
            fallback_url: DEFAULT_FALLBACK_URL.to_string(),
            request_timeout_secs: 30,
            base_filename: "ArweaveToday".to_string(),
            audio_extension: "wav".to_string(),
            enable_enhancement: true,
            enable_audio: true,
            enable_video: true,
            video_concurrency: 1,
            gemini_api_key: None,
            gemini_base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            tts_model: "gemini-2.5-flash-preview-tts".to_string(),
            tts_voice: "Puck".to_string(),
            transcription_model: "gemini-2.5-flash".to_string(),
            enhancer_config: None,
            enhancer_template: "podcast_enhancer".to_string(),
            enhancer_max_retries: 2,
            yt_dlp_path: "yt-dlp".to_string(),
            video_download_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Build the run configuration from the parsed command line.
    #[instrument(level = "info", skip_all)]
    pub fn load(cli: &Cli) -> Result<Self, Box<dyn Error>> {
        let base = match &cli.config {
            Some(path) => {
                let config = Self::from_yaml_file(path)?;
                info!(path = %path.display(), "Loaded configuration file");
                config
            }
            None => Self::default(),
        };
        Ok(base.with_overrides(cli))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, Box<dyn Error>> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {e}", path.display()))?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, Box<dyn Error>> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Apply command-line flags on top of `self`.
    pub fn with_overrides(mut self, cli: &Cli) -> Self {
        if let Some(dir) = &cli.base_dir {
            self.base_dir = dir.clone();
        }
        if let Some(url) = &cli.news_source_url {
            self.news_source_url = url.clone();
        }
        if let Some(url) = &cli.fallback_url {
            self.fallback_url = url.clone();
        }
        if let Some(key) = cli.gemini_api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            self.gemini_api_key = Some(key.clone());
        }
        if let Some(n) = cli.video_concurrency {
            self.video_concurrency = n;
        }
        if cli.no_enhance {
            self.enable_enhancement = false;
        }
        if cli.no_audio {
            self.enable_audio = false;
        }
        if cli.no_video {
            self.enable_video = false;
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn video_download_timeout(&self) -> Duration {
        Duration::from_secs(self.video_download_timeout_secs)
    }

    /// The Gemini key, when one is set and non-blank.
    pub fn gemini_key(&self) -> Option<&str> {
        self.gemini_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
