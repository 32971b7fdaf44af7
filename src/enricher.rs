// =============================================================================
// enricher.rs - TURNING A LIST OF POSITIONS INTO A PORTFOLIO
// =============================================================================
//
// The parser is strict. This module is the opposite: it never fails. Given
// whatever holdings came out of the parser it fills in what it can:
//
//   averagePrice        value * 1000 / shares    (value is in thousands)
//   percentOfPortfolio  value / total * 100
//   rank                1..N by value, largest first, ties keep their order
//   sizeCategory        quartile of value within this portfolio
//
// A holding with zero shares just keeps an average price of 0. A portfolio
// worth zero keeps percentages of 0. Warnings get logged, nothing is raised.
//
// Quartile cut points use linear interpolation between order statistics
// (h = (n - 1) * p), so the buckets are reproducible by hand with a
// calculator. A holding goes into the first bucket whose cut point is at or
// above its value, which keeps ties and tiny portfolios deterministic: one
// holding, or all-equal holdings, are all Small.
// =============================================================================

use tracing::{info, warn, Span};

use crate::models::{HoldingRecord, PortfolioSummary, SizeCategory};

/// How many positions count toward the concentration figure.
pub const TOP_HOLDINGS: usize = 10;

pub struct Enricher {
    span: Span,
}

impl Enricher {
    pub fn new(span: Span) -> Self {
        Self { span }
    }

    /// Fill derived fields, re-rank by value and bucket by quartile.
    /// Empty input comes back as is.
    pub fn enrich(&self, holdings: Vec<HoldingRecord>) -> Vec<HoldingRecord> {
        self.enrich_with_summary(holdings).0
    }

    /// [`Enricher::enrich`], plus the summary of the enriched table.
    pub fn enrich_with_summary(
        &self,
        mut holdings: Vec<HoldingRecord>,
    ) -> (Vec<HoldingRecord>, PortfolioSummary) {
        if holdings.is_empty() {
            return (holdings, PortfolioSummary::default());
        }

        let total_value = total_value(&holdings);
        let mut zero_share_positions = 0usize;

        for holding in &mut holdings {
            if holding.shares > 0.0 && holding.shares.is_finite() {
                holding.average_price = round2(holding.value as f64 * 1000.0 / holding.shares);
            } else {
                holding.average_price = 0.0;
                zero_share_positions += 1;
            }

            holding.percent_of_portfolio = if total_value > 0 {
                round2(holding.value as f64 / total_value as f64 * 100.0)
            } else {
                0.0
            };
        }

        if zero_share_positions > 0 {
            warn!(
                parent: &self.span,
                positions = zero_share_positions,
                "Positions without a share count, average price left at 0"
            );
        }
        if total_value == 0 {
            warn!(parent: &self.span, "Portfolio value is zero, percentages left at 0");
        }

        // sort_by is stable: equal values keep their document order.
        holdings.sort_by(|a, b| b.value.cmp(&a.value));
        for (i, holding) in holdings.iter_mut().enumerate() {
            holding.rank = u32::try_from(i + 1).unwrap_or(u32::MAX);
        }

        let cuts = QuartileCuts::from_values(holdings.iter().map(|h| h.value as f64));
        for holding in &mut holdings {
            holding.size_category = Some(cuts.classify(holding.value as f64));
        }

        let summary = self.summarize(&holdings);
        info!(
            parent: &self.span,
            total_holdings = summary.total_holdings,
            total_value_thousands = summary.total_value,
            largest_position = summary.largest_position.as_deref().unwrap_or("-"),
            top10_concentration = summary.top10_concentration,
            "Portfolio enriched"
        );

        (holdings, summary)
    }

    /// Headline numbers for a holdings table, in any order.
    pub fn summarize(&self, holdings: &[HoldingRecord]) -> PortfolioSummary {
        let total_value = total_value(holdings);

        let mut by_value: Vec<&HoldingRecord> = holdings.iter().collect();
        by_value.sort_by(|a, b| b.value.cmp(&a.value));

        let top: Vec<&HoldingRecord> = by_value.into_iter().take(TOP_HOLDINGS).collect();
        let top_value = total_value_of(top.iter().copied());

        PortfolioSummary {
            total_holdings: holdings.len(),
            total_value,
            largest_position: top.first().map(|h| h.name_of_issuer.clone()),
            top_holdings: top.iter().map(|h| h.name_of_issuer.clone()).collect(),
            top10_concentration: if total_value > 0 {
                round2(top_value as f64 / total_value as f64 * 100.0)
            } else {
                0.0
            },
        }
    }
}

fn total_value(holdings: &[HoldingRecord]) -> u64 {
    total_value_of(holdings.iter())
}

fn total_value_of<'a>(holdings: impl Iterator<Item = &'a HoldingRecord>) -> u64 {
    holdings.fold(0u64, |acc, h| acc.saturating_add(h.value))
}

/// Round half away from zero to two decimal places.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Quantile of already-sorted (ascending) data by linear interpolation
/// between order statistics. Empty data gives 0.
pub fn quantile(sorted: &[f64], p: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };

    let h = last as f64 * p.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(last);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// The three quartile cut points of one portfolio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuartileCuts {
    pub q1: f64,
    pub q2: f64,
    pub q3: f64,
}

impl QuartileCuts {
    pub fn from_values(values: impl Iterator<Item = f64>) -> Self {
        let mut sorted: Vec<f64> = values.collect();
        sorted.sort_by(f64::total_cmp);
        Self {
            q1: quantile(&sorted, 0.25),
            q2: quantile(&sorted, 0.50),
            q3: quantile(&sorted, 0.75),
        }
    }

    pub fn classify(&self, value: f64) -> SizeCategory {
        if value <= self.q1 {
            SizeCategory::Small
        } else if value <= self.q2 {
            SizeCategory::Medium
        } else if value <= self.q3 {
            SizeCategory::Large
        } else {
            SizeCategory::VeryLarge
        }
    }
}
