//! Gemini REST client for speech synthesis and media transcription.
//!
//! Both features go through `POST {base}/models/{model}:generateContent`:
//!
//! - Speech: the request asks for the `AUDIO` response modality with a prebuilt
//!   voice; the reply carries base64 `inlineData` chunks that are joined and, when
//!   they are raw PCM, wrapped in a WAV header.
//! - Transcription: the media file is sent inline next to a short instruction;
//!   the reply's text parts are the transcript.

use crate::config::Config;
use crate::services::{SpeechSynthesizer, SynthesizedAudio};
use crate::services::wav::{is_raw_pcm, parse_audio_mime_type, pcm_to_wav};
use crate::utils::truncate_for_log;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde_json::{Value, json};
use std::error::Error;
use std::time::Instant;
use tracing::{info, instrument, warn};

const TRANSCRIBE_INSTRUCTION: &str = "Transcribe the spoken content of this recording in English. \
Return only the transcript text, without timestamps, speaker labels, or commentary.";

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    tts_model: String,
    voice: String,
    transcription_model: String,
}

impl GeminiClient {
    /// Build a client from the run configuration; `None` without an API key.
    pub fn from_config(config: &Config, http: Client) -> Option<Self> {
        let api_key = config.gemini_key()?;
        Some(Self {
            http,
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            tts_model: config.tts_model.clone(),
            voice: config.tts_voice.clone(),
            transcription_model: config.transcription_model.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{model}:generateContent", self.base_url)
    }

    #[instrument(level = "info", skip_all, fields(%model))]
    async fn generate_content(&self, model: &str, body: &Value) -> Result<Value, Box<dyn Error>> {
        let t0 = Instant::now();
        let endpoint = self.endpoint(model);
        let response = self
            .http
            .post(&endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        let elapsed_ms = t0.elapsed().as_millis();
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| truncate_for_log(&raw, 300));
            warn!(%status, elapsed_ms, "Gemini request failed");
            return Err(format!("Gemini API error ({status}): {message}").into());
        }
        info!(elapsed_ms, bytes = raw.len(), "Gemini request succeeded");
        Ok(serde_json::from_str(&raw)?)
    }

    /// Transcribe an audio or video file sent inline.
    #[instrument(level = "info", skip_all, fields(%mime_type, bytes = media.len()))]
    pub async fn transcribe_media(&self, media: &[u8], mime_type: &str) -> Result<String, Box<dyn Error>> {
        let body = json!({
            "contents": [{
                "role": "user",
                "parts": [
                    { "inlineData": { "mimeType": mime_type, "data": STANDARD.encode(media) } },
                    { "text": TRANSCRIBE_INSTRUCTION },
                ],
            }],
        });
        let value = self.generate_content(&self.transcription_model, &body).await?;
        let text = extract_text(&value);
        if text.trim().is_empty() {
            return Err("Gemini returned an empty transcript".into());
        }
        Ok(text.trim().to_string())
    }
}

impl SpeechSynthesizer for GeminiClient {
    #[instrument(level = "info", skip_all, fields(chars = text.len(), voice = %self.voice))]
    async fn synthesize(&self, text: &str) -> Result<SynthesizedAudio, Box<dyn Error>> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": text }] }],
            "generationConfig": {
                "temperature": 1,
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": self.voice } },
                },
            },
        });
        let value = self.generate_content(&self.tts_model, &body).await?;
        let audio = extract_audio(&value)?;
        info!(bytes = audio.bytes.len(), extension = ?audio.extension, "Synthesized podcast audio");
        Ok(audio)
    }
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    Some(value.get("error")?.get("message")?.as_str()?.to_owned())
}

fn parts(value: &Value) -> impl Iterator<Item = &Value> {
    value
        .get("candidates")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|candidate| candidate.pointer("/content/parts").and_then(Value::as_array))
        .flatten()
}

/// Concatenated text parts of a `generateContent` reply.
pub fn extract_text(value: &Value) -> String {
    parts(value)
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

/// Joined `inlineData` audio of a reply, as a playable file.
///
/// Raw PCM is wrapped into WAV. Other containers are passed through, with the
/// extension taken from their mime type when it is a known one.
pub fn extract_audio(value: &Value) -> Result<SynthesizedAudio, Box<dyn Error>> {
    let mut audio = Vec::new();
    let mut mime_type: Option<String> = None;
    for inline in parts(value).filter_map(|part| part.get("inlineData")) {
        let Some(data) = inline.get("data").and_then(Value::as_str) else {
            continue;
        };
        audio.extend(STANDARD.decode(data)?);
        if mime_type.is_none() {
            mime_type = inline
                .get("mimeType")
                .and_then(Value::as_str)
                .map(str::to_string);
        }
    }

    if audio.is_empty() {
        return Err("no audio data received".into());
    }
    match mime_type.as_deref() {
        Some(mime) if is_raw_pcm(mime) => Ok(SynthesizedAudio {
            bytes: pcm_to_wav(&audio, parse_audio_mime_type(mime))?,
            extension: Some("wav".to_string()),
        }),
        mime => Ok(SynthesizedAudio {
            bytes: audio,
            extension: mime.and_then(extension_for_mime).map(str::to_string),
        }),
    }
}

/// File extension for an encoded audio mime type.
pub fn extension_for_mime(mime_type: &str) -> Option<&'static str> {
    let essence = mime_type.split(';').next().unwrap_or(mime_type).trim();
    match essence.to_ascii_lowercase().as_str() {
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/ogg" | "audio/opus" => Some("ogg"),
        "audio/flac" => Some("flac"),
        "audio/aac" => Some("aac"),
        "audio/mp4" => Some("m4a"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;
    use std::io::{Cursor, Read as _};
    use std::sync::mpsc;
    use std::thread;

    fn wav_samples(bytes: &[u8]) -> Vec<i16> {
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        reader.samples::<i16>().map(Result::unwrap).collect()
    }

    fn reply_with_audio(chunks: &[&[u8]], mime: &str) -> Value {
        let parts: Vec<Value> = chunks
            .iter()
            .map(|c| json!({ "inlineData": { "mimeType": mime, "data": STANDARD.encode(c) } }))
            .collect();
        json!({ "candidates": [{ "content": { "parts": parts } }] })
    }

    #[test]
    fn test_extract_text() {
        let value = json!({
            "candidates": [{ "content": { "parts": [{ "text": "hello " }, { "text": "world" }] } }]
        });
        assert_eq!(extract_text(&value), "hello world");
        assert_eq!(extract_text(&json!({})), "");
    }

    #[test]
    fn test_extract_audio_wraps_pcm() {
        let value = reply_with_audio(&[&[1, 0], &[2, 0]], "audio/L16;codec=pcm;rate=24000");
        let audio = extract_audio(&value).unwrap();
        assert_eq!(audio.extension.as_deref(), Some("wav"));
        assert_eq!(wav_samples(&audio.bytes), vec![1, 2]);
    }

    #[test]
    fn test_extract_audio_keeps_containers() {
        let value = reply_with_audio(&[b"ID3mp3"], "audio/mpeg");
        let audio = extract_audio(&value).unwrap();
        assert_eq!(audio.bytes, b"ID3mp3".to_vec());
        assert_eq!(audio.extension.as_deref(), Some("mp3"));
    }

    #[test]
    fn test_unknown_container_keeps_configured_extension() {
        let value = reply_with_audio(&[b"????"], "application/octet-stream");
        assert_eq!(extract_audio(&value).unwrap().extension, None);
        assert_eq!(extension_for_mime("audio/ogg; codecs=opus"), Some("ogg"));
    }

    #[test]
    fn test_extract_audio_empty_is_error() {
        let value = json!({ "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }] });
        assert!(extract_audio(&value).is_err());
    }

    #[test]
    fn test_parse_error_message() {
        let raw = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(parse_error_message(raw).as_deref(), Some("API key not valid"));
        assert_eq!(parse_error_message("<html>"), None);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = Config::default();
        assert!(GeminiClient::from_config(&config, Client::new()).is_none());
    }

    #[tokio::test]
    async fn test_synthesize_against_stub() {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/v1beta", server.server_addr());
        let (body_tx, body_rx) = mpsc::channel::<(String, String)>();
        let handle = thread::spawn(move || {
            let mut request = server.recv().unwrap();
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).unwrap();
            body_tx.send((request.url().to_string(), body)).unwrap();
            let reply = reply_with_audio(&[&[9, 0, 7, 0]], "audio/L16;codec=pcm;rate=24000");
            let _ = request.respond(tiny_http::Response::from_string(reply.to_string()));
        });

        let config = Config {
            gemini_api_key: Some("test-key".to_string()),
            gemini_base_url: base_url,
            ..Config::default()
        };
        let client = GeminiClient::from_config(&config, Client::new()).unwrap();
        let audio = client.synthesize("Hello listeners").await.unwrap();
        handle.join().unwrap();

        assert_eq!(audio.extension.as_deref(), Some("wav"));
        assert_eq!(wav_samples(&audio.bytes), vec![9, 7]);
        let (url, body) = body_rx.recv().unwrap();
        assert_eq!(url, "/v1beta/models/gemini-2.5-flash-preview-tts:generateContent");
        let sent: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(sent.pointer("/contents/0/parts/0/text").unwrap(), "Hello listeners");
        assert_eq!(
            sent.pointer("/generationConfig/speechConfig/voiceConfig/prebuiltVoiceConfig/voiceName")
                .unwrap(),
            "Puck"
        );
    }
}
