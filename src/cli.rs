//! Command-line interface definitions for the Arweave Today podcaster.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can also be provided via environment variables and all of them
//! override values from the optional YAML config file.

use crate::source::Strategy;
use clap::Parser;
use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

/// Command-line arguments for the podcaster.
///
/// # Examples
///
/// ```sh
/// # Remote first, local fallback
/// arweave_podcaster
///
/// # Only local data, no audio
/// arweave_podcaster --strategy local --no-audio
///
/// # Skip the resolver and narrate a specific file
/// arweave_podcaster --json-file ./today.json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Data source strategy
    #[arg(short, long, value_enum, default_value_t = Strategy::Auto)]
    pub strategy: Strategy,

    /// Narrate this JSON file directly instead of resolving a data source
    #[arg(short, long)]
    pub json_file: Option<PathBuf>,

    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Project directory holding data/ and output/
    #[arg(short, long, env = "PODCASTER_BASE_DIR")]
    pub base_dir: Option<PathBuf>,

    /// Primary news source URL
    #[arg(long, env = "NEWS_SOURCE_URL")]
    pub news_source_url: Option<String>,

    /// Last-resort JSON URL tried when the primary source is not JSON
    #[arg(long, env = "GITHUB_FALLBACK_URL")]
    pub fallback_url: Option<String>,

    /// Gemini API key (text-to-speech and video transcription)
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Skip the script enhancement step
    #[arg(long)]
    pub no_enhance: bool,

    /// Skip audio synthesis
    #[arg(long)]
    pub no_audio: bool,

    /// Skip video transcription
    #[arg(long)]
    pub no_video: bool,

    /// Number of videos transcribed at the same time
    #[arg(long)]
    pub video_concurrency: Option<usize>,

    /// Fall back to local data without asking when --strategy remote fails
    #[arg(long)]
    pub local_fallback: bool,
}

/// Ask the operator whether to use local data after a failed remote fetch.
///
/// Blocks on stdin. Anything other than a terminal counts as "no"; an empty
/// answer counts as "yes".
pub fn confirm_local_fallback() -> bool {
    let stdin = io::stdin();
    if !stdin.is_terminal() {
        return false;
    }
    print!("Remote fetch failed. Fall back to local data? [Y/n] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match stdin.lock().read_line(&mut answer) {
        Ok(0) | Err(_) => false,
        Ok(_) => is_yes(&answer),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "" | "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_answers() {
        assert!(is_yes("\n"));
        assert!(is_yes("Y\n"));
        assert!(is_yes(" yes "));
        assert!(!is_yes("n\n"));
        assert!(!is_yes("nope"));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["arweave_podcaster"]);

        assert_eq!(cli.strategy, Strategy::Auto);
        assert!(cli.json_file.is_none());
        assert!(!cli.no_enhance);
        assert!(!cli.local_fallback);
    }

    #[test]
    fn test_cli_strategy_and_overrides() {
        let cli = Cli::parse_from([
            "arweave_podcaster",
            "--strategy",
            "remote",
            "--no-audio",
            "--video-concurrency",
            "3",
            "--local-fallback",
        ]);

        assert_eq!(cli.strategy, Strategy::Remote);
        assert!(cli.no_audio);
        assert_eq!(cli.video_concurrency, Some(3));
        assert!(cli.local_fallback);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "arweave_podcaster",
            "-s",
            "local",
            "-j",
            "/tmp/today.json",
            "-b",
            "/srv/podcast",
        ]);

        assert_eq!(cli.strategy, Strategy::Local);
        assert_eq!(cli.json_file, Some(PathBuf::from("/tmp/today.json")));
        assert_eq!(cli.base_dir, Some(PathBuf::from("/srv/podcast")));
    }

    #[test]
    fn test_cli_rejects_unknown_strategy() {
        assert!(Cli::try_parse_from(["arweave_podcaster", "--strategy", "online"]).is_err());
    }
}
