// =============================================================================
// models.rs - THE SHAPES OF A 13F
// =============================================================================
//
// The data structures that flow through the engine, leaf-first:
//
//   Identifier        a CIK, normalized to ten zero-padded digits
//   SubmissionHistory what data.sec.gov hands back: parallel arrays, lots of them
//   FilingDescriptor  one 13F-HR (or 13F-HR/A) we might want to read
//   HoldingRecord     one row of the information table, later enriched
//   PortfolioSummary  the headline numbers for the whole table
//
// Field names serialize in camelCase because that is what every consumer of
// this data has been reading since the spreadsheet days.
// =============================================================================

use std::fmt;

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HoldingsError, Result};

/// EDGAR did not exist in a searchable form before this.
pub const FIRST_FILING_YEAR: i32 = 1993;

/// CIKs never exceed ten digits.
pub const IDENTIFIER_WIDTH: usize = 10;

/// The original holdings-disclosure form.
pub const FORM_13F_HR: &str = "13F-HR";

/// The amended variant of the holdings-disclosure form.
pub const FORM_13F_HR_AMENDED: &str = "13F-HR/A";

// =============================================================================
// Identifier
// =============================================================================

/// A normalized institution key (SEC CIK): always exactly ten ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Normalize user input into a CIK.
    ///
    /// Everything that is not a digit is thrown away, and what is left is
    /// left-padded with zeros. `"CIK 1067983"` and `"0001067983"` are the
    /// same fund.
    ///
    /// # Errors
    /// `Validation` if no digits remain, or if more than ten remain.
    pub fn parse(raw: &str) -> Result<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

        if digits.is_empty() {
            return Err(HoldingsError::Validation(format!(
                "CIK must contain digits, got {raw:?}"
            )));
        }
        if digits.len() > IDENTIFIER_WIDTH {
            return Err(HoldingsError::Validation(format!(
                "CIK cannot be longer than {IDENTIFIER_WIDTH} digits, got {}",
                digits.len()
            )));
        }

        Ok(Identifier(format!("{digits:0>width$}", width = IDENTIFIER_WIDTH)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Check a filing year against `[1993, current calendar year]`.
pub fn validate_year(year: i32) -> Result<i32> {
    validate_year_at(year, Utc::now().year())
}

/// Same as [`validate_year`], with the current year supplied by the caller.
pub fn validate_year_at(year: i32, current_year: i32) -> Result<i32> {
    if year < FIRST_FILING_YEAR || year > current_year {
        return Err(HoldingsError::Validation(format!(
            "year must be between {FIRST_FILING_YEAR} and {current_year}, got {year}"
        )));
    }
    Ok(year)
}

// =============================================================================
// Filing history wire format (data.sec.gov/submissions/CIK##########.json)
// =============================================================================
// The submissions API describes recent filings as a set of same-length
// parallel arrays: form[i], filingDate[i], accessionNumber[i] and
// primaryDocument[i] all describe filing i. Every level is optional here
// because a brand-new filer gets a document with nothing in it.
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionHistory {
    #[serde(default)]
    pub filings: Option<FilingsSection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilingsSection {
    #[serde(default)]
    pub recent: Option<RecentFilings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecentFilings {
    pub form: Vec<String>,
    pub filing_date: Vec<String>,
    pub accession_number: Vec<String>,
    pub primary_document: Vec<String>,
}

impl SubmissionHistory {
    /// The recent-filings block, if the document has one.
    pub fn recent(&self) -> Option<&RecentFilings> {
        self.filings.as_ref().and_then(|f| f.recent.as_ref())
    }
}

// =============================================================================
// FilingDescriptor
// =============================================================================

/// One holdings-disclosure filing, resolved to fetchable URLs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilingDescriptor {
    pub date: NaiveDate,
    /// Unique per filing, e.g. `0000950123-24-002518`.
    pub accession_number: String,
    pub primary_document: String,
    pub document_url: String,
    pub form_url: String,
    pub is_amended: bool,
}

impl fmt::Display for FilingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} filed {}",
            if self.is_amended { FORM_13F_HR_AMENDED } else { FORM_13F_HR },
            self.accession_number,
            self.date
        )
    }
}

// =============================================================================
// HoldingRecord
// =============================================================================

/// Quartile bucket of a holding's value within its own portfolio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
    #[serde(rename = "Very Large")]
    VeryLarge,
}

impl fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeCategory::Small => write!(f, "Small"),
            SizeCategory::Medium => write!(f, "Medium"),
            SizeCategory::Large => write!(f, "Large"),
            SizeCategory::VeryLarge => write!(f, "Very Large"),
        }
    }
}

/// One position from a 13F information table.
///
/// The parser fills the base fields and sets `rank` to document order. The
/// service stamps the filing fields. The enricher overwrites `rank` and fills
/// the derived ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRecord {
    pub rank: u32,
    pub name_of_issuer: String,
    pub title_of_class: String,
    /// Emitted verbatim. Nine characters when the filer did its job.
    pub cusip: String,
    /// Market value in THOUSANDS of dollars, as reported.
    pub value: u64,
    pub shares: f64,
    pub share_type: String,
    pub investment_discretion: String,
    pub other_manager: Option<String>,
    pub put_call: Option<String>,
    pub sole_voting: u64,
    pub shared_voting: u64,
    pub no_voting: u64,

    pub filing_date: Option<NaiveDate>,
    pub is_amended: bool,
    #[serde(rename = "fundCik")]
    pub fund_identifier: Option<Identifier>,

    pub average_price: f64,
    pub percent_of_portfolio: f64,
    pub size_category: Option<SizeCategory>,
}

impl fmt::Display for HoldingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} ({}) {}k USD, {} {}",
            self.rank, self.name_of_issuer, self.cusip, self.value, self.shares, self.share_type
        )
    }
}

// =============================================================================
// Portfolio-level output
// =============================================================================

/// Headline numbers for one enriched holdings table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_holdings: usize,
    /// Thousands of dollars, like every other `value` in here.
    pub total_value: u64,
    pub largest_position: Option<String>,
    /// Issuer names of the ten largest positions, largest first.
    pub top_holdings: Vec<String>,
    /// Percent of the portfolio held in the ten largest positions.
    pub top10_concentration: f64,
}

/// Everything the engine knows about one (CIK, year) request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingsReport {
    pub fund: Identifier,
    pub year: i32,
    pub filing: FilingDescriptor,
    pub summary: PortfolioSummary,
    pub holdings: Vec<HoldingRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_identifier_pads_to_ten_digits() {
        assert_eq!(Identifier::parse("1234567").unwrap().as_str(), "0001234567");
        assert_eq!(Identifier::parse("0001234567").unwrap().as_str(), "0001234567");
    }

    #[test]
    fn test_identifier_strips_non_digits() {
        assert_eq!(Identifier::parse("CIK 1067-983").unwrap().as_str(), "0001067983");
    }

    #[test]
    fn test_identifier_rejects_empty_and_overlong() {
        assert_eq!(Identifier::parse("").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(Identifier::parse("abc").unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(
            Identifier::parse("12345678901").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_year_bounds() {
        let current = Utc::now().year();
        assert!(validate_year(1992).is_err());
        assert!(validate_year(current + 1).is_err());
        assert_eq!(validate_year(1993).unwrap(), 1993);
        assert_eq!(validate_year(current).unwrap(), current);
        assert!(validate_year_at(2024, 2023).is_err());
    }

    #[test]
    fn test_submission_history_tolerates_missing_blocks() {
        let empty: SubmissionHistory = serde_json::from_str("{}").unwrap();
        assert!(empty.recent().is_none());

        let partial: SubmissionHistory =
            serde_json::from_str(r#"{"filings": {"recent": {"form": ["13F-HR"]}}}"#).unwrap();
        let recent = partial.recent().unwrap();
        assert_eq!(recent.form, vec!["13F-HR"]);
        assert!(recent.filing_date.is_empty());
    }

    #[test]
    fn test_holding_serializes_camel_case() {
        let holding = HoldingRecord {
            name_of_issuer: "APPLE INC".into(),
            fund_identifier: Some(Identifier::parse("1067983").unwrap()),
            size_category: Some(SizeCategory::VeryLarge),
            ..Default::default()
        };
        let json = serde_json::to_value(&holding).unwrap();
        assert_eq!(json["nameOfIssuer"], "APPLE INC");
        assert_eq!(json["fundCik"], "0001067983");
        assert_eq!(json["sizeCategory"], "Very Large");
        assert!(json.get("percentOfPortfolio").is_some());
    }
}
