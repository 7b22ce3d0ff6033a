//! Script enhancement through an OpenAI-compatible chat API, with
//! exponential backoff retry logic.
//!
//! # Architecture
//!
//! - [`AskAsync`]: core trait for one async request/response exchange
//! - [`AskFnWrapper`]: adapts `awful_aj::api::ask` to [`AskAsync`]
//! - [`RetryAsk`]: decorator that retries any [`AskAsync`] with backoff
//! - [`AjEnhancer`]: the [`ScriptEnhancer`] built from the pieces above
//!
//! # Retry Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), 30s) + random_jitter(0..250ms)
//! ```

use crate::services::ScriptEnhancer;
use awful_aj::api::ask;
use awful_aj::{config, config::AwfulJadeConfig, config_dir, template, template::ChatTemplate};
use rand::{Rng, rng};
use std::error::Error;
use std::fmt;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// Trait for async LLM interaction.
pub trait AskAsync {
    type Response;

    /// Send `text` and wait for the reply.
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>>;
}

/// Adds exponential backoff retry logic to any [`AskAsync`] implementation.
///
/// `max_retries` counts retries after the first attempt, so a value of 2 means
/// at most three requests.
pub struct RetryAsk<T> {
    inner: T,
    max_retries: usize,
    base_delay: StdDuration,
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: AskAsync,
{
    /// Creates a new retry wrapper.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying [`AskAsync`] implementation
    /// * `max_retries` - Retries allowed after the first attempt
    /// * `base_delay` - Delay before the first retry; doubles each time up to 30s
    ///
    /// # Returns
    ///
    /// A `RetryAsk` that forwards to `inner` and backs off on each error.
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        self.base_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }
}

impl<T> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> AskAsync for RetryAsk<T>
where
    T: AskAsync + fmt::Debug,
{
    type Response = T::Response;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.ask(text).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "ask() exhausted retries"
                        );
                        return Err(e);
                    }

                    let jitter_ms: u64 = rng().random_range(0..=250);
                    let delay = self.backoff(attempt) + StdDuration::from_millis(jitter_ms);

                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "ask() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Wrapper around `awful_aj::api::ask` that implements [`AskAsync`].
#[derive(Debug)]
pub struct AskFnWrapper<'a> {
    pub config: &'a AwfulJadeConfig,
    pub template: &'a ChatTemplate,
}

impl AskAsync for AskFnWrapper<'_> {
    type Response = String;

    #[instrument(level = "info", skip_all)]
    async fn ask(&self, text: &str) -> Result<Self::Response, Box<dyn Error>> {
        let t0 = Instant::now();
        let res = ask(self.config, text.to_string(), self.template, None, None).await;
        if let Err(e) = &res {
            warn!(elapsed_ms = t0.elapsed().as_millis(), error = %e, "API call failed");
        }
        res
    }
}

/// Build the rewrite request for one episode's raw script.
pub fn build_prompt(raw_script: &str, date_label: &str) -> String {
    format!(
        "You are the script editor for \"Arweave Today\", a short daily audio news show \
about the Arweave ecosystem, read aloud by a single host with an upbeat, friendly voice.\n\
\n\
Rewrite the raw script below for the episode of {date_label} so it sounds natural when spoken:\n\
- keep every news item and every fact, name and number; do not invent anything\n\
- add smooth transitions between segments\n\
- briefly explain technical terms a general listener may not know\n\
- aim for 450 to 750 words\n\
- output only the words the host says: no headings, markdown, speaker labels, \
stage directions or sound cues\n\
\n\
RAW SCRIPT:\n\
{raw_script}\n"
    )
}

/// [`ScriptEnhancer`] backed by an `awful_aj` chat client.
#[derive(Debug)]
pub struct AjEnhancer {
    config: AwfulJadeConfig,
    template: ChatTemplate,
    max_retries: usize,
    base_delay: StdDuration,
}

impl AjEnhancer {
    /// Load the chat client configuration and the named template.
    ///
    /// # Arguments
    ///
    /// * `config_path` - Chat client YAML; defaults to `config.yaml` in the
    ///   client's config directory
    /// * `template_name` - Name of the chat template to load
    /// * `max_retries` - Retries per rewrite request after the first attempt
    ///
    /// # Errors
    ///
    /// Returns an error when the template or the configuration cannot be read.
    /// Callers treat that as "no enhancer" and narrate the raw script.
    #[instrument(level = "info", skip_all, fields(%template_name))]
    pub async fn load(
        config_path: Option<&Path>,
        template_name: &str,
        max_retries: usize,
    ) -> Result<Self, Box<dyn Error>> {
        let template = template::load_template(template_name).await?;
        let conf_file = match config_path {
            Some(path) => path.to_path_buf(),
            None => config_dir()?.join("config.yaml"),
        };
        let conf_str = conf_file
            .to_str()
            .ok_or_else(|| format!("not a valid config filename: {}", conf_file.display()))?;
        let config = config::load_config(conf_str)
            .map_err(|e| format!("cannot load chat config {conf_str}: {e}"))?;
        info!(config_path = conf_str, "Loaded enhancer configuration");
        Ok(Self {
            config,
            template,
            max_retries,
            base_delay: StdDuration::from_secs(1),
        })
    }
}

impl ScriptEnhancer for AjEnhancer {
    #[instrument(level = "info", skip_all, fields(%date_label, chars = raw_script.len()))]
    async fn enhance(&self, raw_script: &str, date_label: &str) -> Result<String, Box<dyn Error>> {
        let t0 = Instant::now();
        let client = AskFnWrapper {
            config: &self.config,
            template: &self.template,
        };
        let api = RetryAsk::new(client, self.max_retries, self.base_delay);
        let reply = api.ask(&build_prompt(raw_script, date_label)).await?;
        let reply = reply.trim();
        if reply.is_empty() {
            return Err("enhancer returned an empty script".into());
        }
        info!(elapsed_ms_total = t0.elapsed().as_millis(), chars = reply.len(), "Enhanced script");
        Ok(reply.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then echoes the input.
    #[derive(Debug)]
    struct Flaky {
        failures: usize,
        calls: AtomicUsize,
    }

    impl AskAsync for Flaky {
        type Response = String;

        async fn ask(&self, text: &str) -> Result<String, Box<dyn Error>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(format!("transient {n}").into())
            } else {
                Ok(text.to_uppercase())
            }
        }
    }

    fn flaky(failures: usize) -> Flaky {
        Flaky {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let api = RetryAsk::new(flaky(2), 3, StdDuration::from_millis(1));
        assert_eq!(api.ask("ok").await.unwrap(), "OK");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let api = RetryAsk::new(flaky(10), 1, StdDuration::from_millis(1));
        let err = api.ask("ok").await.unwrap_err();
        assert_eq!(err.to_string(), "transient 1");
        assert_eq!(api.inner.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let api = RetryAsk::new(flaky(0), 10, StdDuration::from_secs(1));
        assert_eq!(api.backoff(1), StdDuration::from_secs(1));
        assert_eq!(api.backoff(3), StdDuration::from_secs(4));
        assert_eq!(api.backoff(9), StdDuration::from_secs(30));
    }

    #[test]
    fn test_prompt_carries_script_and_date() {
        let prompt = build_prompt("Welcome to Arweave Today.", "July 03, 2024");
        assert!(prompt.contains("July 03, 2024"));
        assert!(prompt.ends_with("RAW SCRIPT:\nWelcome to Arweave Today.\n"));
        assert!(prompt.contains("no headings"));
    }
}
