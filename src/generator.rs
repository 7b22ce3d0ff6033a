//! Episode generation: one news record in, scripts and audio out.
//!
//! A run walks a fixed sequence of steps:
//!
//! 1. Derive the date keys from `ts` and check the output directory is writable
//! 2. Enrich topics with video transcripts
//! 3. Assemble the raw script
//! 4. Enhance it into the final script
//! 5. Persist both scripts
//! 6. Clean the final script for narration
//! 7. Synthesize and persist the audio
//!
//! Only the output directory and the two script files are required. Every
//! collaborator failure becomes a [`Degradation`] in the [`GenerationReport`]
//! and the run carries on.

use crate::cleaner::clean;
use crate::config::Config;
use crate::enrich::{DiskTranscriptCache, enrich};
use crate::error::{Degradation, PipelineError};
use crate::layout::{date_folder, datestamp, formatted_date, output_dir, output_filename};
use crate::models::NewsRecord;
use crate::script::assemble;
use crate::services::{ScriptEnhancer, SpeechSynthesizer, Transcriber};
use crate::utils::{ensure_writable_dir, save_bytes_file, save_text_file};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// What a finished run produced and what it had to skip.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    pub date_label: String,
    pub output_dir: PathBuf,
    pub raw_script: PathBuf,
    pub final_script: PathBuf,
    /// `None` when synthesis failed or was skipped.
    pub audio: Option<PathBuf>,
    /// Whether the final script came from the enhancer rather than being a copy of the raw one.
    pub enhanced: bool,
    pub enriched_topics: Vec<String>,
    pub degradations: Vec<Degradation>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl fmt::Display for GenerationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Arweave Today episode for {} written to {}",
            self.date_label,
            self.output_dir.display()
        )?;
        writeln!(f, "  raw script:   {}", file_name(&self.raw_script))?;
        writeln!(
            f,
            "  final script: {} ({})",
            file_name(&self.final_script),
            if self.enhanced { "enhanced" } else { "same as raw" }
        )?;
        match &self.audio {
            Some(path) => writeln!(f, "  audio:        {}", file_name(path))?,
            None => writeln!(f, "  audio:        not produced")?,
        }
        if self.enriched_topics.is_empty() {
            writeln!(f, "  videos:       none transcribed")?;
        } else {
            writeln!(f, "  videos:       {}", self.enriched_topics.join(", "))?;
        }
        if !self.degradations.is_empty() {
            writeln!(f, "Skipped or degraded steps:")?;
            for degradation in &self.degradations {
                writeln!(f, "  - {degradation}")?;
            }
        }
        Ok(())
    }
}

/// Runs the generation steps with whichever collaborators are available.
pub struct Generator<'a, E, S, T> {
    config: &'a Config,
    enhancer: Option<E>,
    synthesizer: Option<S>,
    transcriber: Option<T>,
}

impl<'a, E, S, T> Generator<'a, E, S, T>
where
    E: ScriptEnhancer,
    S: SpeechSynthesizer,
    T: Transcriber,
{
    pub fn new(
        config: &'a Config,
        enhancer: Option<E>,
        synthesizer: Option<S>,
        transcriber: Option<T>,
    ) -> Self {
        Self {
            config,
            enhancer,
            synthesizer,
            transcriber,
        }
    }

    /// Produce the episode for `record`.
    ///
    /// # Arguments
    ///
    /// * `record` - The resolved news record; it is never modified
    /// * `prior` - Degradations from earlier stages (such as data resolution),
    ///   carried into the report
    ///
    /// # Returns
    ///
    /// A [`GenerationReport`] listing the written artifacts and every step that
    /// was skipped or failed along the way.
    ///
    /// # Errors
    ///
    /// Only storage problems are fatal: the output directory and both scripts
    /// must be written. Failures of the optional steps only add degradations.
    #[instrument(level = "info", skip_all, fields(ts = record.ts, topics = record.topics.len()))]
    pub async fn run(
        &self,
        record: &NewsRecord,
        prior: Vec<Degradation>,
    ) -> Result<GenerationReport, PipelineError> {
        let t0 = Instant::now();
        let mut degradations = prior;

        let folder = date_folder(record.ts);
        let date_label = formatted_date(record.ts);
        let stamp = datestamp(record.ts);
        let out_dir = output_dir(&self.config.base_dir, &folder);
        ensure_writable_dir(&out_dir)
            .await
            .map_err(|e| PipelineError::storage(&out_dir, e))?;

        let (record, enriched_topics) = self.enrich_topics(record, &out_dir, &mut degradations).await;
        let raw_script = assemble(&record, &date_label);
        info!(chars = raw_script.len(), "Assembled raw script");

        let (final_script, enhanced) = self.enhance(&raw_script, &date_label, &mut degradations).await;

        let base = &self.config.base_filename;
        let raw_path = out_dir.join(output_filename(base, &format!("{stamp}-raw"), "txt"));
        let final_path = out_dir.join(output_filename(base, &stamp, "txt"));
        save_text_file(&raw_script, &raw_path)
            .await
            .map_err(|e| PipelineError::storage(&raw_path, e))?;
        save_text_file(&final_script, &final_path)
            .await
            .map_err(|e| PipelineError::storage(&final_path, e))?;
        info!(raw = %raw_path.display(), final_script = %final_path.display(), "Saved scripts");

        let narration = clean(&final_script);
        let audio = self.synthesize(&narration, &out_dir, &stamp, &mut degradations).await;

        info!(
            elapsed_ms = t0.elapsed().as_millis(),
            enhanced,
            audio = audio.is_some(),
            degraded = degradations.len(),
            "Generation finished"
        );
        Ok(GenerationReport {
            date_label,
            output_dir: out_dir,
            raw_script: raw_path,
            final_script: final_path,
            audio,
            enhanced,
            enriched_topics,
            degradations,
        })
    }

    async fn enrich_topics(
        &self,
        record: &NewsRecord,
        out_dir: &Path,
        degradations: &mut Vec<Degradation>,
    ) -> (NewsRecord, Vec<String>) {
        if !record.topics.iter().any(|t| t.video.is_some()) {
            return (record.clone(), Vec::new());
        }
        let transcriber = match &self.transcriber {
            _ if !self.config.enable_video => Err("disabled by configuration"),
            None => Err("no transcriber available (set GEMINI_API_KEY)"),
            Some(t) => Ok(t),
        };
        let transcriber = match transcriber {
            Ok(t) => t,
            Err(reason) => {
                warn!(%reason, "Topics with videos keep their original bodies");
                degradations.push(Degradation::EnrichmentUnavailable(reason.to_string()));
                return (record.clone(), Vec::new());
            }
        };

        let cache = DiskTranscriptCache::new(out_dir);
        let outcome = enrich(&record.topics, transcriber, &cache, self.config.video_concurrency).await;
        degradations.extend(outcome.failures);
        let enriched = NewsRecord {
            topics: outcome.topics,
            ..record.clone()
        };
        (enriched, outcome.enriched)
    }

    async fn enhance(
        &self,
        raw_script: &str,
        date_label: &str,
        degradations: &mut Vec<Degradation>,
    ) -> (String, bool) {
        let reason = match &self.enhancer {
            _ if !self.config.enable_enhancement => "disabled by configuration".to_string(),
            None => "no enhancer available".to_string(),
            Some(enhancer) => match enhancer.enhance(raw_script, date_label).await {
                Ok(text) if !text.trim().is_empty() => return (text, true),
                Ok(_) => "enhancer returned an empty script".to_string(),
                Err(e) => e.to_string(),
            },
        };
        warn!(%reason, "Using raw script as final script");
        degradations.push(Degradation::EnhancementUnavailable(reason));
        (raw_script.to_string(), false)
    }

    /// Synthesize `narration` and save it as `{base}-{stamp}.{ext}` in `out_dir`.
    ///
    /// The extension is the one reported by the synthesizer, or the configured
    /// `audio_extension` when it reports none.
    async fn synthesize(
        &self,
        narration: &str,
        out_dir: &Path,
        stamp: &str,
        degradations: &mut Vec<Degradation>,
    ) -> Option<PathBuf> {
        let reason = match &self.synthesizer {
            _ if !self.config.enable_audio => "disabled by configuration".to_string(),
            None => "no speech synthesizer available (set GEMINI_API_KEY)".to_string(),
            Some(synthesizer) => match synthesizer.synthesize(narration).await {
                Ok(audio) if audio.bytes.is_empty() => "synthesizer returned no audio".to_string(),
                Ok(audio) => {
                    let ext = audio
                        .extension
                        .as_deref()
                        .unwrap_or(&self.config.audio_extension);
                    let audio_path = out_dir.join(output_filename(&self.config.base_filename, stamp, ext));
                    match save_bytes_file(&audio.bytes, &audio_path).await {
                        Ok(()) => {
                            info!(path = %audio_path.display(), bytes = audio.bytes.len(), "Saved audio");
                            return Some(audio_path);
                        }
                        Err(e) => format!("cannot write {}: {e}", audio_path.display()),
                    }
                }
                Err(e) => e.to_string(),
            },
        };
        warn!(%reason, "No audio for this episode");
        degradations.push(Degradation::SynthesisUnavailable(reason));
        None
    }
}
