//! Error and degradation types for a podcast generation run.
//!
//! Two families exist:
//! - [`PipelineError`]: failures that end the run (no data, no place to write it).
//! - [`Degradation`]: failures of optional steps that the run recovers from. They are
//!   collected into the run report instead of being raised.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A failure that aborts the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Every data source for the requested strategy was exhausted.
    #[error("no news data available: {0}")]
    SourceUnavailable(String),

    /// A news document was found but does not describe a valid record.
    #[error("invalid news record: {0}")]
    InvalidRecord(String),

    /// A required local file or directory could not be read or written.
    #[error("storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Storage {
            path: path.into(),
            source,
        }
    }
}

/// An optional step that failed or was skipped; the run continues without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// The raw script was used because enhancement failed or is disabled.
    EnhancementUnavailable(String),
    /// No audio artifact was produced.
    SynthesisUnavailable(String),
    /// Topics with videos were narrated without transcripts because transcription
    /// is disabled or has no backend.
    EnrichmentUnavailable(String),
    /// One topic's video could not be transcribed.
    EnrichmentFailed { topic: String, reason: String },
    /// A freshly fetched record could not be copied into the local data store.
    BackupFailed(String),
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::EnhancementUnavailable(reason) => {
                write!(f, "script enhancement skipped: {reason}")
            }
            Degradation::SynthesisUnavailable(reason) => {
                write!(f, "audio synthesis skipped: {reason}")
            }
            Degradation::EnrichmentUnavailable(reason) => {
                write!(f, "video enrichment skipped: {reason}")
            }
            Degradation::EnrichmentFailed { topic, reason } => {
                write!(f, "video enrichment failed for {topic}: {reason}")
            }
            Degradation::BackupFailed(reason) => {
                write!(f, "local backup of fetched data failed: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_names_path() {
        let err = PipelineError::storage(
            "/tmp/out",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tmp/out"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_degradation_display() {
        let d = Degradation::EnrichmentFailed {
            topic: "topic_2".to_string(),
            reason: "timeout".to_string(),
        };
        assert_eq!(d.to_string(), "video enrichment failed for topic_2: timeout");
        let d = Degradation::EnrichmentUnavailable("disabled by configuration".to_string());
        assert_eq!(d.to_string(), "video enrichment skipped: disabled by configuration");
    }
}
