//! News source resolution.
//!
//! [`NewsSource::resolve`] obtains one [`NewsRecord`] according to a
//! [`Strategy`]:
//!
//! | Strategy | Chain |
//! |----------|-------|
//! | `remote` | primary URL → alternate endpoints → fallback URL |
//! | `local`  | `data/today.json` → newest `data/DD-MM-YYYY/today.json` |
//! | `auto`   | `remote` chain, then the `local` chain |
//!
//! # Remote fetching
//!
//! - A transport or TLS error on the primary URL is retried once with
//!   certificate verification disabled. The downgrade is logged and the relaxed
//!   client is then used for the rest of the chain.
//! - A primary response that is not JSON (or not a valid record) triggers a
//!   request to `{url}/data.json`, `{url}/today.json`, `{url}/api/today`, and the
//!   configured fallback URL, in that order. When the primary host could not be
//!   reached at all, only the fallback URL is tried.
//! - A fetched record is copied to `data/DD-MM-YYYY/today.json`. Failing to do so
//!   is reported but never fails the resolution.
//!
//! Nothing here prompts or panics; exhausting a chain yields `None`.

use crate::config::Config;
use crate::error::{Degradation, PipelineError};
use crate::layout::{DATE_FOLDER_FORMAT, RECORD_FILENAME, data_dir, date_folder};
use crate::models::NewsRecord;
use crate::utils::{load_json_file, save_json_file, truncate_for_log};
use chrono::NaiveDate;
use clap::ValueEnum;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

static STRICT_DATE_FOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2}-\d{2}-\d{4}$").unwrap());

/// Where the news record should come from.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Fetch from the news source (with alternate endpoints).
    Remote,
    /// Use `data/today.json`, then the most recent dated snapshot.
    Local,
    /// Remote first, then the full local chain. Never prompts.
    #[default]
    Auto,
}

/// Where a resolved record was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOrigin {
    Remote(String),
    CurrentFile(PathBuf),
    Snapshot(PathBuf),
}

/// A resolved record plus any non-fatal problems met on the way.
#[derive(Debug)]
pub struct Resolution {
    pub record: NewsRecord,
    pub origin: RecordOrigin,
    pub warnings: Vec<Degradation>,
}

/// Outcome of one HTTP attempt against the primary URL.
enum PrimaryFetch {
    Record(serde_json::Value, NewsRecord),
    /// The host answered, but not with a usable record.
    NotARecord,
    /// The host could not be reached, even with relaxed TLS.
    Unreachable,
}

#[derive(Debug, Clone)]
pub struct NewsSource {
    client: Client,
    relaxed_client: Client,
    source_url: String,
    fallback_url: String,
    data_dir: PathBuf,
}

impl NewsSource {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;
        let relaxed_client = Client::builder()
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self {
            client,
            relaxed_client,
            source_url: config.news_source_url.clone(),
            fallback_url: config.fallback_url.clone(),
            data_dir: data_dir(&config.base_dir),
        })
    }

    /// Resolve a record following `strategy`.
    ///
    /// # Arguments
    ///
    /// * `strategy` - `Remote` only fetches, `Local` only reads `data/`, and
    ///   `Auto` reads `data/` when every remote endpoint failed
    ///
    /// # Returns
    ///
    /// The record with where it came from and any recovered problems (such as
    /// a failed local backup), or `None` once every source failed. Never prompts.
    #[instrument(level = "info", skip(self))]
    pub async fn resolve(&self, strategy: Strategy) -> Option<Resolution> {
        let resolved = match strategy {
            Strategy::Remote => self.resolve_remote().await,
            Strategy::Local => self.resolve_local().await,
            Strategy::Auto => match self.resolve_remote().await {
                Some(resolution) => Some(resolution),
                None => {
                    warn!("Remote fetch failed; falling back to local data");
                    self.resolve_local().await
                }
            },
        };
        if resolved.is_none() {
            error!(?strategy, "All data sources failed");
        }
        resolved
    }

    /// Fetch from the network and keep a dated local copy.
    #[instrument(level = "info", skip_all, fields(url = %self.source_url))]
    pub async fn resolve_remote(&self) -> Option<Resolution> {
        let (value, record, url) = self.fetch_remote().await?;
        let mut warnings = Vec::new();
        if let Err(reason) = self.save_snapshot(&value, record.ts).await {
            warnings.push(Degradation::BackupFailed(reason));
        }
        Some(Resolution {
            record,
            origin: RecordOrigin::Remote(url),
            warnings,
        })
    }

    /// `data/today.json`, then the newest dated snapshot.
    #[instrument(level = "info", skip_all, fields(data_dir = %self.data_dir.display()))]
    pub async fn resolve_local(&self) -> Option<Resolution> {
        let current = self.data_dir.join(RECORD_FILENAME);
        if let Some(record) = load_record(&current).await {
            info!(path = %current.display(), "Using local data file");
            return Some(Resolution {
                record,
                origin: RecordOrigin::CurrentFile(current),
                warnings: Vec::new(),
            });
        }

        warn!("Standard local file not usable; trying most recent date directory");
        for (date, path) in self.dated_snapshots().await {
            if let Some(record) = load_record(&path).await {
                info!(%date, path = %path.display(), "Using most recent dated snapshot");
                return Some(Resolution {
                    record,
                    origin: RecordOrigin::Snapshot(path),
                    warnings: Vec::new(),
                });
            }
            warn!(%date, "Snapshot is not a valid record; trying an older one");
        }
        None
    }

    /// Strictly named `DD-MM-YYYY` folders holding a record file, newest first.
    pub async fn dated_snapshots(&self) -> Vec<(NaiveDate, PathBuf)> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(error = %e, "Data directory not readable");
                return Vec::new();
            }
        };

        let mut found = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !STRICT_DATE_FOLDER.is_match(&name) {
                continue;
            }
            let Ok(date) = NaiveDate::parse_from_str(&name, DATE_FOLDER_FORMAT) else {
                continue;
            };
            let record_path = entry.path().join(RECORD_FILENAME);
            if tokio::fs::try_exists(&record_path).await.unwrap_or(false) {
                found.push((date, record_path));
            }
        }
        found
            .into_iter()
            .sorted_by(|a, b| b.0.cmp(&a.0))
            .collect()
    }

    async fn fetch_remote(&self) -> Option<(serde_json::Value, NewsRecord, String)> {
        info!("Fetching latest news data");
        let (primary, client) = self.fetch_primary().await;
        let candidates = match primary {
            PrimaryFetch::Record(value, record) => {
                info!(ts = record.ts, "Online news data fetched");
                return Some((value, record, self.source_url.clone()));
            }
            PrimaryFetch::NotARecord => {
                info!("Primary response is not a news record; probing alternate endpoints");
                alternate_urls(&self.source_url, &self.fallback_url)
            }
            PrimaryFetch::Unreachable => {
                info!("Primary source unreachable; probing fallback URL only");
                vec![self.fallback_url.clone()]
            }
        };
        for url in candidates {
            if let Some((value, record)) = try_endpoint(client, &url).await {
                info!(%url, ts = record.ts, "Found JSON data at alternate endpoint");
                return Some((value, record, url));
            }
        }
        warn!("Could not find JSON data at any endpoint");
        None
    }

    /// Returns the outcome and the client later requests should use.
    async fn fetch_primary(&self) -> (PrimaryFetch, &Client) {
        let url = self.source_url.as_str();
        let (response, client) = match self.client.get(url).send().await {
            Ok(response) => (response, &self.client),
            Err(e) => {
                warn!(error = %e, %url, "Request failed; retrying with certificate verification disabled");
                match self.relaxed_client.get(url).send().await {
                    Ok(response) => {
                        warn!(%url, "Connected without certificate verification");
                        (response, &self.relaxed_client)
                    }
                    Err(e) => {
                        warn!(error = %e, %url, "Network error fetching news data");
                        return (PrimaryFetch::Unreachable, &self.relaxed_client);
                    }
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%status, %url, "News source returned an error status");
            return (PrimaryFetch::NotARecord, client);
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
            || url.ends_with(".json");

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, %url, "Could not read response body");
                return (PrimaryFetch::NotARecord, client);
            }
        };
        if !is_json {
            debug!(preview = %truncate_for_log(&body, 200), "Non-JSON response");
            return (PrimaryFetch::NotARecord, client);
        }

        match parse_record(&body) {
            Ok((value, record)) => (PrimaryFetch::Record(value, record), client),
            Err(e) => {
                warn!(error = %e, %url, "Response is not a valid news record");
                (PrimaryFetch::NotARecord, client)
            }
        }
    }

    #[instrument(level = "info", skip_all, fields(ts = ts))]
    async fn save_snapshot(&self, value: &serde_json::Value, ts: i64) -> Result<(), String> {
        let folder = date_folder(ts);
        let path = self.data_dir.join(&folder).join(RECORD_FILENAME);
        match save_json_file(value, &path).await {
            Ok(()) => {
                info!(path = %path.display(), "News data saved in date directory");
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not save news data locally");
                Err(format!("{}: {e}", path.display()))
            }
        }
    }
}

/// Read, validate and return the record stored at `path`.
///
/// Used for the direct-file override, which bypasses [`NewsSource`] entirely.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_record_file(path: &Path) -> Result<NewsRecord, PipelineError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PipelineError::SourceUnavailable(format!("{}: {e}", path.display())))?;
    let record = NewsRecord::from_json_str(&text)
        .map_err(|e| PipelineError::InvalidRecord(format!("{}: {e}", path.display())))?;
    info!(ts = record.ts, topics = record.topics.len(), "Loaded news data from file");
    Ok(record)
}

/// Same-host JSON endpoints to try, then the fallback URL.
pub fn alternate_urls(base_url: &str, fallback_url: &str) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    vec![
        format!("{base}/data.json"),
        format!("{base}/today.json"),
        format!("{base}/api/today"),
        fallback_url.to_string(),
    ]
}

async fn try_endpoint(client: &Client, url: &str) -> Option<(serde_json::Value, NewsRecord)> {
    debug!(%url, "Trying endpoint");
    let response = client.get(url).send().await.ok()?;
    if response.status() != reqwest::StatusCode::OK {
        debug!(%url, status = %response.status(), "Endpoint did not answer 200");
        return None;
    }
    let body = response.text().await.ok()?;
    match parse_record(&body) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            debug!(%url, error = %e, "Endpoint did not return a news record");
            None
        }
    }
}

fn parse_record(body: &str) -> Result<(serde_json::Value, NewsRecord), serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let record = NewsRecord::from_value(value.clone())?;
    Ok((value, record))
}

async fn load_record(path: &Path) -> Option<NewsRecord> {
    let value = load_json_file(path).await?;
    match NewsRecord::from_value(value) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "File is not a valid news record");
            None
        }
    }
}
