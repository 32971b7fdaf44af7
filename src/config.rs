// =============================================================================
// config.rs - THE KNOBS
// =============================================================================
//
// Every tunable parameter of the holdings engine lives here. There are not
// many: two upstream URLs, one User-Agent, and the numbers that decide how
// patient we are with the SEC.
//
// All values can be overridden via HOLDINGS_ENGINE_* environment variables.
// The defaults are the SEC's own fair-access numbers: at most ten requests a
// second (we wait 100 ms before each one), a descriptive User-Agent, and
// thirty seconds before we give up on a single attempt.
// =============================================================================

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Runtime configuration for the fetch layer and the upstream endpoints.
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // UPSTREAM ENDPOINTS
    // =========================================================================

    /// Base URL of the EDGAR submissions API. The filing history for a CIK
    /// lives at `{submissions_base_url}/CIK##########.json`.
    pub submissions_base_url: String,

    /// Base URL of the EDGAR archives. Filing documents live at
    /// `{archives_base_url}/{cik}/{accession}/{document}`.
    pub archives_base_url: String,

    /// The SEC insists on a User-Agent with contact details. Without one
    /// you get throttled, and deservedly so.
    pub user_agent: String,

    // =========================================================================
    // FETCH BEHAVIOUR
    // =========================================================================

    /// Delay slept before EVERY outbound request, first attempt included.
    pub request_delay: Duration,

    /// Per-attempt timeout. There is no end-to-end deadline across retries.
    pub request_timeout: Duration,

    /// Total attempts per fetch, the first one included.
    pub max_attempts: u32,

    /// Backoff after the first transient failure; doubles every attempt.
    pub initial_backoff: Duration,

    /// How long to wait on HTTP 429 when the upstream forgets to send a
    /// usable `Retry-After` header.
    pub retry_after_fallback: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            submissions_base_url: "https://data.sec.gov/submissions".to_string(),
            archives_base_url: "https://www.sec.gov/Archives/edgar/data".to_string(),
            user_agent: "HoldingsEngine/1.0 (research@example.com)".to_string(),
            request_delay: Duration::from_millis(100),
            request_timeout: Duration::from_secs(30),
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1000),
            retry_after_fallback: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// [`Config::default`] for anything unset or unparseable.
    ///
    /// A `.env` file is honoured if present and ignored if not.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`Config::from_env`], reading variables through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let lookup = &lookup;

        Config {
            submissions_base_url: trim_base(env_or_default(
                lookup,
                "HOLDINGS_ENGINE_SUBMISSIONS_URL",
                &defaults.submissions_base_url,
            )),
            archives_base_url: trim_base(env_or_default(
                lookup,
                "HOLDINGS_ENGINE_ARCHIVES_URL",
                &defaults.archives_base_url,
            )),
            user_agent: env_or_default(lookup, "HOLDINGS_ENGINE_USER_AGENT", &defaults.user_agent),

            request_delay: Duration::from_millis(env_parse(
                lookup,
                "HOLDINGS_ENGINE_REQUEST_DELAY_MS",
                millis(defaults.request_delay),
            )),
            request_timeout: Duration::from_secs(env_parse(
                lookup,
                "HOLDINGS_ENGINE_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )),
            // Zero attempts would mean never asking. We always ask at least once.
            max_attempts: env_parse(lookup, "HOLDINGS_ENGINE_MAX_ATTEMPTS", defaults.max_attempts).max(1),
            initial_backoff: Duration::from_millis(env_parse(
                lookup,
                "HOLDINGS_ENGINE_INITIAL_BACKOFF_MS",
                millis(defaults.initial_backoff),
            )),
            retry_after_fallback: Duration::from_secs(env_parse(
                lookup,
                "HOLDINGS_ENGINE_RETRY_AFTER_FALLBACK_SECS",
                defaults.retry_after_fallback.as_secs(),
            )),
        }
    }

    /// URL of the filing-history document for an already-normalized CIK.
    pub fn submissions_url(&self, cik: &str) -> String {
        format!("{}/CIK{}.json", trim_slash(&self.submissions_base_url), cik)
    }

    /// Archive folder of one filing. The accession number is expected with
    /// its dashes already removed.
    pub fn filing_folder_url(&self, cik: &str, accession_compact: &str) -> String {
        format!("{}/{}/{}", trim_slash(&self.archives_base_url), cik, accession_compact)
    }
}

/// Read an environment variable, or fall back to a default.
fn env_or_default(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key).unwrap_or_else(|| default.to_string())
}

/// Read and parse an environment variable. Garbage in means default out.
fn env_parse<T: FromStr>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn trim_base(url: String) -> String {
    trim_slash(&url).to_string()
}

fn trim_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}
