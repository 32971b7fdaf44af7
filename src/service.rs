// =============================================================================
// service.rs - ONE CIK, ONE YEAR, ONE FILING, ONE TABLE
// =============================================================================
//
// The public face of the engine. A request goes through four steps, strictly
// in order and never in parallel:
//
//   1. SubmissionIndex  which 13Fs did this fund file that year?
//   2. select_latest    the newest one, and only that one
//   3. FilingParser     fetch its information table and read it
//   4. Enricher         prices, weights, ranks, buckets
//
// Amendments are not merged into originals. If a 13F-HR/A is the newest
// filing of the year, that is the table you get.
//
// Nothing is cached between requests. Two identical requests fetch
// everything twice.
// =============================================================================

use std::sync::Arc;

use tracing::{info, info_span, Span};

use crate::config::Config;
use crate::enricher::Enricher;
use crate::error::{HoldingsError, Result};
use crate::fetcher::Fetcher;
use crate::metrics::FetchMetricsSnapshot;
use crate::models::{
    validate_year, FilingDescriptor, HoldingRecord, HoldingsReport, Identifier,
    PortfolioSummary,
};
use crate::parser::FilingParser;
use crate::submissions::SubmissionIndex;

pub struct HoldingsService {
    fetcher: Arc<Fetcher>,
    index: SubmissionIndex,
    parser: FilingParser,
    enricher: Enricher,
    span: Span,
}

impl HoldingsService {
    /// Wire up the pipeline. Each component logs under its own child span of
    /// `span`.
    ///
    /// # Errors
    /// `Client` if the HTTP client cannot be built.
    pub fn new(config: Arc<Config>, span: Span) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(
            config.clone(),
            info_span!(parent: &span, "fetcher"),
        )?);

        Ok(Self {
            index: SubmissionIndex::new(
                fetcher.clone(),
                config,
                info_span!(parent: &span, "submission_index"),
            ),
            parser: FilingParser::new(info_span!(parent: &span, "filing_parser")),
            enricher: Enricher::new(info_span!(parent: &span, "enricher")),
            fetcher,
            span,
        })
    }

    /// 13F filings for `identifier` in `year`, newest first. Empty is not an
    /// error here.
    pub async fn list_filings(&self, identifier: &str, year: i32) -> Result<Vec<FilingDescriptor>> {
        self.index.list_filings(identifier, year).await
    }

    /// Fully enriched holdings from the newest 13F filed in `year`.
    ///
    /// # Errors
    /// `Validation` on bad input, `NotFound` when nothing was filed that
    /// year, and whatever the fetcher or parser raised, unchanged.
    pub async fn get_holdings(&self, identifier: &str, year: i32) -> Result<Vec<HoldingRecord>> {
        let (_, _, holdings, _) = self.load(identifier, year).await?;
        Ok(holdings)
    }

    /// Holdings plus the filing they came from and a portfolio summary.
    pub async fn get_report(&self, identifier: &str, year: i32) -> Result<HoldingsReport> {
        let (fund, filing, holdings, summary) = self.load(identifier, year).await?;

        Ok(HoldingsReport {
            fund,
            year,
            filing,
            summary,
            holdings,
        })
    }

    pub fn metrics(&self) -> FetchMetricsSnapshot {
        self.fetcher.metrics()
    }

    async fn load(
        &self,
        identifier: &str,
        year: i32,
    ) -> Result<(Identifier, FilingDescriptor, Vec<HoldingRecord>, PortfolioSummary)> {
        // Validate before anything touches the network.
        let fund = Identifier::parse(identifier)?;
        validate_year(year)?;

        let filings = self.index.list_filings(fund.as_str(), year).await?;
        let filing = select_latest(&filings)
            .cloned()
            .ok_or_else(|| HoldingsError::NotFound(format!("no 13F filings for CIK {fund} in {year}")))?;

        info!(
            parent: &self.span,
            cik = fund.as_str(),
            year,
            accession = filing.accession_number.as_str(),
            filed = %filing.date,
            amended = filing.is_amended,
            candidates = filings.len(),
            "Selected filing"
        );

        let document = self.fetcher.fetch(&filing.document_url, &[]).await?;
        let mut holdings = self.parser.parse(&document)?;

        for holding in &mut holdings {
            holding.filing_date = Some(filing.date);
            holding.is_amended = filing.is_amended;
            holding.fund_identifier = Some(fund.clone());
        }

        let (holdings, summary) = self.enricher.enrich_with_summary(holdings);
        Ok((fund, filing, holdings, summary))
    }
}

/// The filing to read: latest date wins. On a same-day tie the original
/// beats the amendment, then the greatest accession number wins.
pub fn select_latest(filings: &[FilingDescriptor]) -> Option<&FilingDescriptor> {
    filings.iter().max_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| b.is_amended.cmp(&a.is_amended))
            .then_with(|| a.accession_number.cmp(&b.accession_number))
    })
}
