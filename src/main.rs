//! # Arweave Podcaster
//!
//! Turns the daily Arweave Today news bulletin into a narrated podcast episode.
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... arweave_podcaster --strategy auto --base-dir /srv/podcast
//! ```
//!
//! ## Architecture
//!
//! 1. **Resolve**: obtain one news record (remote, local, or a file given on the command line)
//! 2. **Enrich**: append transcripts of linked videos to their topics
//! 3. **Write**: assemble the raw script and optionally polish it with an LLM
//! 4. **Narrate**: clean the script and synthesize audio
//!
//! Artifacts land in `output/DD-MM-YYYY/` under the base directory; fetched
//! records are kept in `data/DD-MM-YYYY/today.json`.

use clap::Parser;
use reqwest::Client;
use std::error::Error;
use std::process::ExitCode;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod cleaner;
mod cli;
mod config;
mod enrich;
mod error;
mod generator;
mod layout;
mod models;
mod script;
mod services;
mod source;
mod utils;

use api::AjEnhancer;
use cli::{Cli, confirm_local_fallback};
use config::Config;
use error::{Degradation, PipelineError};
use generator::{GenerationReport, Generator};
use models::NewsRecord;
use services::gemini::GeminiClient;
use services::video::VideoTranscriber;
use source::{NewsSource, Strategy, load_record_file};

#[tokio::main]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("arweave_podcaster starting up");

    let args = Cli::parse();
    debug!(strategy = ?args.strategy, json_file = ?args.json_file, "Parsed CLI arguments");

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match run(&args, &config).await {
        Ok(report) => {
            println!("{report}");
            info!(
                elapsed_ms = start_time.elapsed().as_millis(),
                audio = report.audio.is_some(),
                "Podcast generation completed"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, elapsed_ms = start_time.elapsed().as_millis(), "Podcast generation failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Cli, config: &Config) -> Result<GenerationReport, Box<dyn Error>> {
    let (record, warnings) = resolve_record(args, config).await?;
    info!(ts = record.ts, topics = record.topics.len(), "News record ready");

    let http = Client::builder().timeout(config.request_timeout()).build()?;
    let enhancer = load_enhancer(config).await;
    let gemini = GeminiClient::from_config(config, http.clone());
    if gemini.is_none() {
        warn!("GEMINI_API_KEY not set; audio synthesis and video transcription are unavailable");
    }
    let transcriber = gemini
        .clone()
        .map(|g| VideoTranscriber::from_config(config, http.clone(), g));

    let generator = Generator::new(config, enhancer, gemini, transcriber);
    Ok(generator.run(&record, warnings).await?)
}

#[instrument(level = "info", skip_all)]
async fn resolve_record(
    args: &Cli,
    config: &Config,
) -> Result<(NewsRecord, Vec<Degradation>), PipelineError> {
    if let Some(path) = &args.json_file {
        info!(path = %path.display(), "Using news data from file");
        return Ok((load_record_file(path).await?, Vec::new()));
    }

    let source = NewsSource::new(config)
        .map_err(|e| PipelineError::SourceUnavailable(format!("cannot build HTTP client: {e}")))?;
    let mut resolution = source.resolve(args.strategy).await;

    if resolution.is_none() && args.strategy == Strategy::Remote {
        let fall_back = args.local_fallback
            || tokio::task::spawn_blocking(confirm_local_fallback)
                .await
                .unwrap_or(false);
        if fall_back {
            info!("Falling back to local data");
            resolution = source.resolve_local().await;
        }
    }

    let resolution = resolution.ok_or_else(|| {
        PipelineError::SourceUnavailable(format!(
            "every source for strategy {:?} failed",
            args.strategy
        ))
    })?;
    info!(origin = ?resolution.origin, "Resolved news data");
    Ok((resolution.record, resolution.warnings))
}

async fn load_enhancer(config: &Config) -> Option<AjEnhancer> {
    if !config.enable_enhancement {
        return None;
    }
    match AjEnhancer::load(
        config.enhancer_config.as_deref(),
        &config.enhancer_template,
        config.enhancer_max_retries,
    )
    .await
    {
        Ok(enhancer) => Some(enhancer),
        Err(e) => {
            warn!(error = %e, "Script enhancer unavailable; the raw script will be narrated");
            None
        }
    }
}
