// =============================================================================
// HOLDINGS ENGINE
// =============================================================================
//
// Give it a CIK and a year. It asks SEC EDGAR what that fund filed, picks the
// newest 13F of the year, reads the information table no matter how the
// filer software chose to prefix its tags, and hands back every position
// ranked, weighted and bucketed.
//
//   fetcher      the only code that talks to the network
//   submissions  filing history -> candidate 13F filings
//   parser       information table XML -> holdings
//   enricher     holdings -> prices, weights, ranks, size buckets
//   service      the four of the above, in that order
// =============================================================================

pub mod config;
pub mod enricher;
pub mod error;
pub mod fetcher;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod service;
pub mod submissions;

pub use config::Config;
pub use error::{ErrorKind, HoldingsError, Result};
pub use models::{
    FilingDescriptor, HoldingRecord, HoldingsReport, Identifier, PortfolioSummary, SizeCategory,
};
pub use service::HoldingsService;
