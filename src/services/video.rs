//! Video transcription: fetch a video's audio, then ask Gemini for the words.
//!
//! Links that already point at a media file (by extension, or on Twitter's
//! media CDN) are downloaded directly. Everything else goes through `yt-dlp`,
//! which extracts an mp3 into a throwaway directory.

use crate::config::Config;
use crate::services::Transcriber;
use crate::services::gemini::GeminiClient;
use reqwest::Client;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};
use url::Url;

const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mp3", "m4a", "wav", "ogg"];
const DIRECT_MEDIA_HOSTS: &[&str] = &["video.twimg.com", "pbs.twimg.com"];

#[derive(Debug, Clone)]
pub struct VideoTranscriber {
    http: Client,
    gemini: GeminiClient,
    yt_dlp_path: String,
    /// Whole-process bound for one `yt-dlp` run.
    download_timeout: Duration,
    /// Passed to `yt-dlp --socket-timeout`.
    socket_timeout: Duration,
}

impl VideoTranscriber {
    /// Build a transcriber that shares `http` and transcribes through `gemini`.
    ///
    /// # Arguments
    ///
    /// * `config` - Supplies the `yt-dlp` binary, its download time limit and
    ///   the per-socket timeout (the run's request timeout)
    /// * `http` - Client used for direct media downloads
    /// * `gemini` - Client that turns the downloaded media into text
    pub fn from_config(config: &Config, http: Client, gemini: GeminiClient) -> Self {
        Self {
            http,
            gemini,
            yt_dlp_path: config.yt_dlp_path.clone(),
            download_timeout: config.video_download_timeout(),
            socket_timeout: config.request_timeout(),
        }
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn download_direct(&self, url: &Url) -> Result<(Vec<u8>, String), Box<dyn Error>> {
        let response = self.http.get(url.as_str()).send().await?.error_for_status()?;
        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("audio/") || v.starts_with("video/"));
        let bytes = response.bytes().await?.to_vec();
        let mime = header_mime.unwrap_or_else(|| guess_mime_type(url.path()).to_string());
        Ok((bytes, mime))
    }

    #[instrument(level = "info", skip_all, fields(%url))]
    async fn download_with_yt_dlp(&self, url: &Url) -> Result<(Vec<u8>, String), Box<dyn Error>> {
        let workdir = tempfile::TempDir::new()?;
        let template = workdir.path().join("audio.%(ext)s");
        let mut command = Command::new(&self.yt_dlp_path);
        command
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--socket-timeout")
            .arg(self.socket_timeout.as_secs().max(1).to_string())
            .args(["-x", "--audio-format", "mp3"])
            .arg("-o")
            .arg(&template)
            .arg(url.as_str())
            .kill_on_drop(true);

        let output = match timeout(self.download_timeout, command.output()).await {
            Ok(result) => result.map_err(|e| format!("failed to run {}: {e}", self.yt_dlp_path))?,
            Err(_) => {
                warn!(timeout = ?self.download_timeout, "yt-dlp exceeded its time limit; killed");
                return Err(format!(
                    "Audio download failed: yt-dlp timed out after {}s",
                    self.download_timeout.as_secs()
                )
                .into());
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("Audio download failed: {}", stderr.trim()).into());
        }

        let audio_path = find_downloaded_audio(workdir.path())
            .await?
            .ok_or("Audio download failed: yt-dlp produced no file")?;
        debug!(path = %audio_path.display(), "yt-dlp finished");
        let bytes = tokio::fs::read(&audio_path).await?;
        let mime = guess_mime_type(&audio_path.to_string_lossy()).to_string();
        Ok((bytes, mime))
    }
}

impl Transcriber for VideoTranscriber {
    async fn transcribe(&self, video_url: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let url = Url::parse(video_url.trim()).map_err(|e| format!("invalid video URL: {e}"))?;
        let (media, mime) = if is_direct_media_url(&url) {
            self.download_direct(&url).await?
        } else {
            self.download_with_yt_dlp(&url).await?
        };
        if media.is_empty() {
            return Err("Audio download failed: empty file".into());
        }
        info!(bytes = media.len(), %mime, elapsed_ms = t0.elapsed().as_millis(), "Downloaded video audio");
        self.gemini.transcribe_media(&media, &mime).await
    }
}

/// Whether `url` can be fetched as a media file without `yt-dlp`.
pub fn is_direct_media_url(url: &Url) -> bool {
    if url
        .host_str()
        .is_some_and(|host| DIRECT_MEDIA_HOSTS.contains(&host))
    {
        return true;
    }
    extension_of(url.path()).is_some_and(|ext| MEDIA_EXTENSIONS.contains(&ext.as_str()))
}

/// Mime type for a media path, by extension.
pub fn guess_mime_type(path: &str) -> &'static str {
    match extension_of(path).as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
}

fn extension_of(path: &str) -> Option<String> {
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

async fn find_downloaded_audio(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_audio = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("audio."));
        if is_audio {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_direct_media_detection() {
        assert!(is_direct_media_url(&url("https://cdn.example.com/clips/launch.MP4")));
        assert!(is_direct_media_url(&url("https://cdn.example.com/a.mp3?sig=1")));
        assert!(is_direct_media_url(&url("https://video.twimg.com/ext_tw_video/123/pu/vid/abc")));
        assert!(!is_direct_media_url(&url("https://www.youtube.com/watch?v=xyz")));
        assert!(!is_direct_media_url(&url("https://x.com/arweave/status/1")));
    }

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(guess_mime_type("/tmp/x/audio.mp3"), "audio/mpeg");
        assert_eq!(guess_mime_type("/clips/a.webm"), "video/webm");
        assert_eq!(guess_mime_type("/clips/a.M4A"), "audio/mp4");
        assert_eq!(guess_mime_type("/ext_tw_video/abc"), "video/mp4");
    }

    #[tokio::test]
    async fn test_find_downloaded_audio() {
        let temp = tempfile::TempDir::new().unwrap();
        assert_eq!(find_downloaded_audio(temp.path()).await.unwrap(), None);

        std::fs::write(temp.path().join("audio.mp3"), b"ID3").unwrap();
        assert_eq!(
            find_downloaded_audio(temp.path()).await.unwrap(),
            Some(temp.path().join("audio.mp3"))
        );
    }

    fn transcriber(config: Config) -> VideoTranscriber {
        let config = Config {
            gemini_api_key: Some("k".to_string()),
            ..config
        };
        let gemini = GeminiClient::from_config(&config, Client::new()).unwrap();
        VideoTranscriber::from_config(&config, Client::new(), gemini)
    }

    #[tokio::test]
    async fn test_invalid_url_is_an_error() {
        let err = transcriber(Config::default())
            .transcribe("not a url")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid video URL"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stalled_yt_dlp_is_killed() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let fake = temp.path().join("yt-dlp");
        std::fs::write(&fake, "#!/bin/sh\nexec sleep 600\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        let transcriber = transcriber(Config {
            yt_dlp_path: fake.to_string_lossy().into_owned(),
            video_download_timeout_secs: 1,
            ..Config::default()
        });

        let t0 = Instant::now();
        let err = transcriber
            .transcribe("https://www.youtube.com/watch?v=x")
            .await
            .unwrap_err();

        assert!(t0.elapsed() < Duration::from_secs(30));
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stalled_yt_dlp_leaves_failure_marker() {
        use crate::enrich::{DiskTranscriptCache, enrich, is_failure_marker};
        use crate::models::Topic;
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let fake = temp.path().join("yt-dlp");
        std::fs::write(&fake, "#!/bin/sh\nexec sleep 600\n").unwrap();
        std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).unwrap();
        let transcriber = transcriber(Config {
            yt_dlp_path: fake.to_string_lossy().into_owned(),
            video_download_timeout_secs: 1,
            ..Config::default()
        });
        let cache = DiskTranscriptCache::new(temp.path().join("out"));
        let topics = vec![Topic {
            headline: "H".to_string(),
            body: "B".to_string(),
            nature: "news".to_string(),
            video: Some("https://www.youtube.com/watch?v=x".to_string()),
        }];

        let outcome = enrich(&topics, &transcriber, &cache, 1).await;

        assert_eq!(outcome.topics[0].body, "B");
        assert_eq!(outcome.failures.len(), 1);
        let marker = std::fs::read_to_string(cache.path_for("topic_1")).unwrap();
        assert!(is_failure_marker(&marker));
        assert!(marker.contains("timed out"));
    }
}
