// ██╗  ██╗ ██████╗ ██╗     ██████╗ ██╗███╗   ██╗ ██████╗ ███████╗
// ██║  ██║██╔═══██╗██║     ██╔══██╗██║████╗  ██║██╔════╝ ██╔════╝
// ███████║██║   ██║██║     ██║  ██║██║██╔██╗ ██║██║  ███╗███████╗
// ██╔══██║██║   ██║██║     ██║  ██║██║██║╚██╗██║██║   ██║╚════██║
// ██║  ██║╚██████╔╝███████╗██████╔╝██║██║ ╚████║╚██████╔╝███████║
// ╚═╝  ╚═╝ ╚═════╝ ╚══════╝╚═════╝ ╚═╝╚═╝  ╚═══╝ ╚═════╝ ╚══════╝
//
// E N G I N E
//
// What did the big money own last year? Ask EDGAR, politely, one request
// every hundred milliseconds.
//
//   holdings-engine 1067983 2024 --pretty
//   holdings-engine 1067983 2024 --filings
//
// JSON goes to stdout. Logs and the banner go to stderr, so the output can
// be piped straight into jq.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, info_span};
use tracing_subscriber::{fmt, EnvFilter};

use holdings_engine::{Config, HoldingsError, HoldingsService};

#[derive(Debug, Parser)]
#[command(name = "holdings-engine", version, about = "Fetch and enrich 13F institutional holdings from SEC EDGAR")]
struct Cli {
    /// Fund CIK. Anything that is not a digit is ignored, so "CIK0001067983" works.
    cik: String,

    /// Filing year (1993 up to the current year).
    year: i32,

    /// List the year's 13F filings instead of reading the newest one.
    #[arg(long)]
    filings: bool,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,
}

fn print_banner() {
    let banner = r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║   ██╗  ██╗ ██╗ ██████╗     ███████╗███╗   ██╗ ██████╗        ║
    ║   ███║ ╚═██║ ██╔════╝     ██╔════╝████╗  ██║██╔════╝         ║
    ║   ╚██║ ████║ █████╗       █████╗  ██╔██╗ ██║██║  ███╗        ║
    ║    ██║ ╚═██║ ██╔══╝       ██╔══╝  ██║╚██╗██║██║   ██║        ║
    ║    ██║ ████║ ██║          ███████╗██║ ╚████║╚██████╔╝        ║
    ║    ╚═╝ ╚═══╝ ╚═╝          ╚══════╝╚═╝  ╚═══╝ ╚═════╝         ║
    ║                                                              ║
    ║        📈 INSTITUTIONAL HOLDINGS ENGINE 📈                   ║
    ║                                                              ║
    ║   Source:   SEC EDGAR (submissions + 13F information tables) ║
    ║   Parsing:  namespace-tolerant, all-or-nothing               ║
    ║   Manners:  100 ms between requests, Retry-After obeyed      ║
    ║                                                              ║
    ║   "Forty-five days late, but never wrong."                   ║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
    "#;
    eprintln!("{}", banner);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_ansi(true)
        .init();

    print_banner();

    let config = Arc::new(Config::from_env());
    info!(
        submissions = config.submissions_base_url.as_str(),
        archives = config.archives_base_url.as_str(),
        user_agent = config.user_agent.as_str(),
        "✅ Configuration loaded"
    );

    let service = HoldingsService::new(config, info_span!("holdings_engine"))
        .context("failed to start the holdings engine")?;

    let output = if cli.filings {
        let filings = service
            .list_filings(&cli.cik, cli.year)
            .await
            .map_err(|e| failure(e, &cli))?;
        info!(filings = filings.len(), "📄 Filings listed");
        to_json(&filings, cli.pretty)?
    } else {
        let report = service
            .get_report(&cli.cik, cli.year)
            .await
            .map_err(|e| failure(e, &cli))?;
        info!(
            fund = report.fund.as_str(),
            filing = %report.filing,
            holdings = report.summary.total_holdings,
            "📈 Holdings report ready"
        );
        to_json(&report, cli.pretty)?
    };

    println!("{output}");
    debug!(metrics = ?service.metrics(), "Fetch metrics");

    Ok(())
}

fn failure(err: HoldingsError, cli: &Cli) -> anyhow::Error {
    let kind = err.kind();
    anyhow::Error::new(err).context(format!("{kind}: CIK {} / {}", cli.cik, cli.year))
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> anyhow::Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    json.context("failed to serialize output")
}
