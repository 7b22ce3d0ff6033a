//! Video enrichment: append each topic's video transcript to its body.
//!
//! For every topic with a video link, at 1-based position `i`:
//!
//! 1. The artifact key is `topic_{i}`.
//! 2. A cached transcript for that key is reused unless it is a failure marker.
//! 3. Otherwise the [`Transcriber`] is called. Successes are cached; failures are
//!    cached as a `[TRANSCRIPTION FAILED: ...]` marker so the next run retries
//!    them and a human can see what went wrong.
//! 4. The transcript is appended to a *copy* of the topic as a
//!    `Video content:` paragraph. Source topics are never modified.
//!
//! Topics may be transcribed concurrently; results are written into slots
//! indexed by topic position, so the output order is always the input order.

use crate::error::Degradation;
use crate::models::Topic;
use crate::services::Transcriber;
use crate::utils::{load_text_file, save_text_file, truncate_for_log};
use futures::stream::{self, StreamExt};
use std::io;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Leading text of a cached entry that records a failed attempt.
pub const FAILURE_MARKER: &str = "[TRANSCRIPTION FAILED";

/// Label of the paragraph appended to an enriched topic body.
pub const TRANSCRIPT_LABEL: &str = "Video content:";

/// Artifact key for the topic at 1-based `position`.
pub fn topic_key(position: usize) -> String {
    format!("topic_{position}")
}

pub fn is_failure_marker(content: &str) -> bool {
    content.starts_with(FAILURE_MARKER)
}

fn failure_marker(reason: &str) -> String {
    format!("{FAILURE_MARKER}: {reason}]")
}

/// Storage for per-topic transcripts.
///
/// `put` with `is_failure = true` stores a failure marker carrying `value` as
/// the reason; `get` returns the stored text as-is, markers included.
pub trait TranscriptCache {
    async fn has(&self, key: &str) -> bool;
    async fn get(&self, key: &str) -> Option<String>;
    async fn put(&self, key: &str, value: &str, is_failure: bool) -> io::Result<()>;
}

/// Transcript cache backed by `{key}_video_transcript.txt` files in a run's
/// output directory.
#[derive(Debug, Clone)]
pub struct DiskTranscriptCache {
    dir: PathBuf,
}

impl DiskTranscriptCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}_video_transcript.txt"))
    }
}

impl TranscriptCache for DiskTranscriptCache {
    async fn has(&self, key: &str) -> bool {
        tokio::fs::try_exists(self.path_for(key)).await.unwrap_or(false)
    }

    async fn get(&self, key: &str) -> Option<String> {
        load_text_file(&self.path_for(key)).await
    }

    async fn put(&self, key: &str, value: &str, is_failure: bool) -> io::Result<()> {
        let content = if is_failure {
            failure_marker(value)
        } else {
            value.to_string()
        };
        save_text_file(&content, &self.path_for(key)).await
    }
}

/// Where a topic's transcript came from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TranscriptSource {
    Cached(String),
    Fresh(String),
    Failed(String),
}

/// Result of enriching one batch of topics.
#[derive(Debug, Default)]
pub struct EnrichmentOutcome {
    /// Derived topics, same length and order as the input.
    pub topics: Vec<Topic>,
    /// Keys of topics whose body gained a transcript.
    pub enriched: Vec<String>,
    /// Keys served from the cache without calling the transcriber.
    pub cache_hits: Vec<String>,
    /// One entry per topic whose transcription failed.
    pub failures: Vec<Degradation>,
}

/// Enrich `topics` with video transcripts, running up to `concurrency`
/// transcriptions at a time.
#[instrument(level = "info", skip_all, fields(topics = topics.len(), concurrency = concurrency))]
pub async fn enrich<T, C>(
    topics: &[Topic],
    transcriber: &T,
    cache: &C,
    concurrency: usize,
) -> EnrichmentOutcome
where
    T: Transcriber,
    C: TranscriptCache,
{
    let with_video: Vec<(usize, &str)> = topics
        .iter()
        .enumerate()
        .filter_map(|(idx, topic)| topic.video.as_deref().map(|url| (idx, url)))
        .collect();
    info!(videos = with_video.len(), "Starting video enrichment");

    let results: Vec<(usize, TranscriptSource)> = stream::iter(with_video)
        .map(|(idx, url)| async move {
            let key = topic_key(idx + 1);
            (idx, transcript_for(&key, url, transcriber, cache).await)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut slots: Vec<Option<TranscriptSource>> = vec![None; topics.len()];
    for (idx, source) in results {
        slots[idx] = Some(source);
    }

    let mut outcome = EnrichmentOutcome::default();
    for (idx, (topic, slot)) in topics.iter().zip(slots).enumerate() {
        let key = topic_key(idx + 1);
        let derived = match slot {
            Some(TranscriptSource::Cached(text)) => {
                outcome.cache_hits.push(key.clone());
                outcome.enriched.push(key);
                topic.with_appended_paragraph(&format!("{TRANSCRIPT_LABEL} {text}"))
            }
            Some(TranscriptSource::Fresh(text)) => {
                outcome.enriched.push(key);
                topic.with_appended_paragraph(&format!("{TRANSCRIPT_LABEL} {text}"))
            }
            Some(TranscriptSource::Failed(reason)) => {
                outcome.failures.push(Degradation::EnrichmentFailed { topic: key, reason });
                topic.clone()
            }
            None => topic.clone(),
        };
        outcome.topics.push(derived);
    }

    info!(
        enriched = outcome.enriched.len(),
        cache_hits = outcome.cache_hits.len(),
        failed = outcome.failures.len(),
        "Video enrichment complete"
    );
    outcome
}

#[instrument(level = "info", skip_all, fields(%key, %url))]
async fn transcript_for<T, C>(key: &str, url: &str, transcriber: &T, cache: &C) -> TranscriptSource
where
    T: Transcriber,
    C: TranscriptCache,
{
    if cache.has(key).await {
        match cache.get(key).await {
            Some(existing) if !is_failure_marker(&existing) && !existing.trim().is_empty() => {
                info!("Using cached transcript");
                return TranscriptSource::Cached(existing);
            }
            Some(existing) => {
                debug!(previous = %truncate_for_log(&existing, 120), "Cached transcript is a failure marker; retrying");
            }
            None => debug!("Cached transcript unreadable; retrying"),
        }
    }

    let reason = match transcriber.transcribe(url).await {
        Ok(text) if !text.trim().is_empty() => {
            let text = text.trim().to_string();
            if let Err(e) = cache.put(key, &text, false).await {
                warn!(error = %e, "Could not cache transcript");
            }
            info!(chars = text.len(), "Transcribed video");
            return TranscriptSource::Fresh(text);
        }
        Ok(_) => "Transcription resulted in empty text".to_string(),
        Err(e) => e.to_string(),
    };

    warn!(%reason, "Video transcription failed; topic keeps its original body");
    if let Err(e) = cache.put(key, &reason, true).await {
        warn!(error = %e, "Could not record transcription failure");
    }
    TranscriptSource::Failed(reason)
}
