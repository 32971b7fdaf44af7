// =============================================================================
// fetcher.rs - THE ONLY DOOR TO THE OUTSIDE WORLD
// =============================================================================
//
// Every byte this engine reads from the SEC comes through `Fetcher::fetch`.
// That makes it the one place where we have to be polite, and the SEC's
// definition of polite is written down:
//
//   1. Identify yourself. A descriptive User-Agent goes on every request.
//   2. Do not exceed ten requests per second. We sleep 100 ms before EVERY
//      request, the first one included. It is not clever, but it is honest.
//   3. When told to slow down (HTTP 429), slow down for as long as the
//      Retry-After header says.
//
// On top of that, a small retry budget: three attempts in total, with an
// exponential backoff of 1 s, 2 s, ... after transport failures and 5xx
// responses. A 404 is an answer, not a failure, so it is never retried.
// Anything else unexpected (403, 400, ...) goes straight back to the caller.
//
// A 429 on the last attempt is not waited out: nothing would follow the
// wait, so the caller gets its Upstream error straight away.
//
// The retry loop blocks the calling task for its sleeps. There is no
// end-to-end deadline and no cancellation; each attempt has its own 30 s
// timeout and that is the whole story.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::{debug, error, warn, Span};

use crate::config::Config;
use crate::error::{HoldingsError, Result};
use crate::metrics::{FetchMetrics, FetchMetricsSnapshot};

/// Rate-limited, retrying HTTP GET against the upstream document source.
pub struct Fetcher {
    client: reqwest::Client,
    config: Arc<Config>,
    metrics: FetchMetrics,
    span: Span,
}

impl Fetcher {
    /// Build a fetcher. The HTTP client is created once and reused for every
    /// call, with the User-Agent and per-attempt timeout baked in.
    ///
    /// # Errors
    /// `Client` if reqwest refuses the configuration (for instance a
    /// User-Agent that is not a valid header value).
    pub fn new(config: Arc<Config>, span: Span) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| HoldingsError::Client(e.to_string()))?;

        debug!(
            parent: &span,
            user_agent = config.user_agent.as_str(),
            request_delay_ms = config.request_delay.as_millis() as u64,
            timeout_secs = config.request_timeout.as_secs(),
            max_attempts = config.max_attempts,
            "Fetcher ready"
        );

        Ok(Self {
            client,
            config,
            metrics: FetchMetrics::new(),
            span,
        })
    }

    /// GET `url` (with optional query parameters) and return the raw body.
    ///
    /// # Errors
    /// * `NotFound` on HTTP 404, after exactly one request.
    /// * `Upstream` on an unexpected status, or once the attempt budget is
    ///   spent, carrying the last failure cause.
    pub async fn fetch(&self, url: &str, params: &[(&str, &str)]) -> Result<Vec<u8>> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut last_cause = String::from("no attempt was made");

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.config.request_delay).await;
            self.metrics.increment_requests();

            debug!(parent: &self.span, url, attempt, max_attempts, "Requesting upstream document");

            let mut request = self.client.get(url);
            if !params.is_empty() {
                request = request.query(params);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        match response.bytes().await {
                            Ok(body) => {
                                self.metrics.increment_successes();
                                debug!(parent: &self.span, url, attempt, bytes = body.len(), "Upstream document received");
                                return Ok(body.to_vec());
                            }
                            Err(e) => {
                                last_cause = format!("failed to read response body: {e}");
                            }
                        }
                    } else if status == StatusCode::NOT_FOUND {
                        self.metrics.increment_not_found();
                        warn!(parent: &self.span, url, "Upstream says 404, not retrying");
                        return Err(HoldingsError::NotFound(format!("resource not found: {url}")));
                    } else if status == StatusCode::TOO_MANY_REQUESTS {
                        // The wait replaces the backoff, the attempt still counts.
                        let wait = retry_after_delay(response.headers(), self.config.retry_after_fallback);
                        self.metrics.increment_rate_limited();
                        warn!(
                            parent: &self.span,
                            url,
                            attempt,
                            wait_secs = wait.as_secs(),
                            "Rate limited (HTTP 429), waiting {} s as instructed",
                            wait.as_secs()
                        );
                        last_cause = format!("HTTP {status}");
                        if attempt < max_attempts {
                            tokio::time::sleep(wait).await;
                        }
                        continue;
                    } else if status.is_server_error() {
                        last_cause = format!("HTTP {status}");
                    } else {
                        self.metrics.increment_failures();
                        error!(parent: &self.span, url, status = status.as_u16(), "Unexpected upstream status");
                        return Err(HoldingsError::upstream(url, format!("unexpected HTTP {status}")));
                    }
                }
                Err(e) => {
                    last_cause = e.to_string();
                }
            }

            if attempt < max_attempts {
                let backoff = backoff_delay(self.config.initial_backoff, attempt);
                self.metrics.increment_retries();
                warn!(
                    parent: &self.span,
                    url,
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    cause = last_cause.as_str(),
                    "Transient upstream failure, backing off"
                );
                tokio::time::sleep(backoff).await;
            }
        }

        self.metrics.increment_failures();
        error!(
            parent: &self.span,
            url,
            attempts = max_attempts,
            cause = last_cause.as_str(),
            "Upstream fetch failed, retry budget exhausted"
        );
        Err(HoldingsError::upstream(url, last_cause))
    }

    pub fn metrics(&self) -> FetchMetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Backoff slept after failed attempt number `attempt` (1-based):
/// `initial`, `2 * initial`, `4 * initial`, ...
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    initial.saturating_mul(1u32 << exponent)
}

/// How long a 429 asks us to wait. Only the delta-seconds form of
/// `Retry-After` is understood; anything else means `fallback`.
pub fn retry_after_delay(headers: &HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}
