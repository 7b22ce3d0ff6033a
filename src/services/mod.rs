//! Adapters for the external services a run depends on.
//!
//! The pipeline talks to three collaborators through the traits below. Each one
//! is fallible; the generator decides what a failure means for the run.
//!
//! | Trait | Adapter | Backend |
//! |-------|---------|---------|
//! | [`ScriptEnhancer`] | [`crate::api::AjEnhancer`] | OpenAI-compatible chat endpoint |
//! | [`SpeechSynthesizer`] | [`gemini::GeminiClient`] | Gemini `generateContent` with audio output |
//! | [`Transcriber`] | [`video::VideoTranscriber`] | `yt-dlp` or direct download, then Gemini |
//!
//! # Common Patterns
//!
//! Adapters share one `reqwest::Client` built with the configured timeout, return
//! `Box<dyn Error>` like the rest of the I/O layer, and log their own timings.

use std::error::Error;

pub mod gemini;
pub mod video;
pub mod wav;

/// Polishes a raw script into a spoken-word script.
pub trait ScriptEnhancer {
    /// Rewrite `raw_script` for the episode dated `date_label`.
    async fn enhance(&self, raw_script: &str, date_label: &str) -> Result<String, Box<dyn Error>>;
}

/// A complete audio file returned by a [`SpeechSynthesizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    /// File extension matching `bytes`; `None` leaves the configured one.
    pub extension: Option<String>,
}

/// Produces audio for a finished script.
pub trait SpeechSynthesizer {
    /// Synthesize `text` into a playable audio file.
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, Box<dyn Error>>;
}

/// Turns the spoken content of a video into text.
pub trait Transcriber {
    async fn transcribe(&self, video_url: &str) -> Result<String, Box<dyn Error>>;
}

impl<E: ScriptEnhancer> ScriptEnhancer for &E {
    async fn enhance(&self, raw_script: &str, date_label: &str) -> Result<String, Box<dyn Error>> {
        (**self).enhance(raw_script, date_label).await
    }
}

impl<S: SpeechSynthesizer> SpeechSynthesizer for &S {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, Box<dyn Error>> {
        (**self).synthesize(text).await
    }
}

impl<T: Transcriber> Transcriber for &T {
    async fn transcribe(&self, video_url: &str) -> Result<String, Box<dyn Error>> {
        (**self).transcribe(video_url).await
    }
}
