// =============================================================================
// submissions.rs - WHAT DID THIS FUND FILE, AND WHEN?
// =============================================================================
//
// data.sec.gov keeps a filing history per CIK. It is a big JSON document
// whose interesting part is a block of parallel arrays: position i of
// `form`, `filingDate`, `accessionNumber` and `primaryDocument` together
// describe filing i. Hundreds of them, most of which are not 13Fs.
//
// We walk the arrays once, keep the 13F-HR and 13F-HR/A rows filed in the
// requested year, resolve where their documents live, and hand them back
// newest first. An empty answer is a perfectly good answer here; whether
// "nothing filed" is an error is the caller's call.
// =============================================================================

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn, Span};

use crate::config::Config;
use crate::error::{HoldingsError, Result};
use crate::fetcher::Fetcher;
use crate::models::{
    validate_year, FilingDescriptor, Identifier, SubmissionHistory, FORM_13F_HR, FORM_13F_HR_AMENDED,
};

pub struct SubmissionIndex {
    fetcher: Arc<Fetcher>,
    config: Arc<Config>,
    span: Span,
}

impl SubmissionIndex {
    pub fn new(fetcher: Arc<Fetcher>, config: Arc<Config>, span: Span) -> Self {
        Self { fetcher, config, span }
    }

    /// All 13F-HR / 13F-HR/A filings for `identifier` dated in `year`,
    /// sorted by filing date descending.
    ///
    /// # Errors
    /// `Validation` for a bad CIK or year (before any request is made),
    /// whatever the fetcher returns, and `Parse` if the history is not JSON
    /// of the expected shape.
    pub async fn list_filings(&self, identifier: &str, year: i32) -> Result<Vec<FilingDescriptor>> {
        let cik = Identifier::parse(identifier)?;
        let year = validate_year(year)?;

        let url = self.config.submissions_url(cik.as_str());
        info!(parent: &self.span, cik = cik.as_str(), year, url = url.as_str(), "Fetching filing history");

        let body = self.fetcher.fetch(&url, &[]).await?;
        let history: SubmissionHistory = serde_json::from_slice(&body).map_err(|e| {
            HoldingsError::Parse(format!("unreadable filing history for CIK {cik}: {e}"))
        })?;

        let filings = filings_from_history(&history, &cik, year, &self.config, &self.span);

        info!(
            parent: &self.span,
            cik = cik.as_str(),
            year,
            filings = filings.len(),
            "Filing history reduced to 13F filings"
        );

        Ok(filings)
    }
}

/// Reduce a filing history to the 13F filings of one year. Pure; no I/O.
///
/// Rows with a missing column or an unreadable date are skipped with a
/// warning on `span`. The sort is stable, so same-day filings keep their
/// history order.
pub fn filings_from_history(
    history: &SubmissionHistory,
    cik: &Identifier,
    year: i32,
    config: &Config,
    span: &Span,
) -> Vec<FilingDescriptor> {
    let Some(recent) = history.recent() else {
        return Vec::new();
    };

    let mut filings = Vec::new();

    for (i, form) in recent.form.iter().enumerate() {
        let is_amended = match form.as_str() {
            FORM_13F_HR => false,
            FORM_13F_HR_AMENDED => true,
            _ => continue,
        };

        let (Some(raw_date), Some(accession), Some(document)) = (
            recent.filing_date.get(i),
            recent.accession_number.get(i),
            recent.primary_document.get(i),
        ) else {
            warn!(parent: span, cik = cik.as_str(), index = i, "Skipping filing row with missing columns");
            continue;
        };

        let date = match NaiveDate::parse_from_str(raw_date, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                warn!(
                    parent: span,
                    cik = cik.as_str(),
                    index = i,
                    filing_date = raw_date.as_str(),
                    error = %e,
                    "Skipping filing row with unreadable date"
                );
                continue;
            }
        };

        if date.year() != year {
            continue;
        }

        let form_url = config.filing_folder_url(cik.as_str(), &accession.replace('-', ""));
        let document_url = format!("{form_url}/{document}");

        filings.push(FilingDescriptor {
            date,
            accession_number: accession.clone(),
            primary_document: document.clone(),
            document_url,
            form_url,
            is_amended,
        });
    }

    filings.sort_by(|a, b| b.date.cmp(&a.date));
    filings
}
