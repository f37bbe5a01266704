//! Opportunity score and implementation priority.
//!
//! The score rewards pages that are seen often but clicked rarely:
//! `0.6 * norm(impressions - clicks) + 0.4 * (1 - norm(ctr))`, where `norm`
//! divides by the maximum over the whole table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::opportunity::OpportunityRow;

const UNREALIZED_WEIGHT: f64 = 0.6;
const CTR_WEIGHT: f64 = 0.4;

/// Upper bound (inclusive) of the `Low` tier.
pub const LOW_MAX: f64 = 0.33;
/// Upper bound (inclusive) of the `Medium` tier.
pub const MEDIUM_MAX: f64 = 0.66;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PriorityTier {
    Low,
    Medium,
    High,
}

impl PriorityTier {
    pub fn from_score(score: f64) -> Self {
        if score <= LOW_MAX {
            PriorityTier::Low
        } else if score <= MEDIUM_MAX {
            PriorityTier::Medium
        } else {
            PriorityTier::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PriorityTier::Low => "Low",
            PriorityTier::Medium => "Medium",
            PriorityTier::High => "High",
        }
    }
}

impl fmt::Display for PriorityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opportunity row with its score columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    #[serde(flatten)]
    pub row: OpportunityRow,
    pub ctr: f64,
    pub opp_score: f64,
    pub priority: PriorityTier,
}

/// Click-through rate; zero when there are no impressions.
pub fn ctr(clicks: u64, impressions: u64) -> f64 {
    if impressions == 0 {
        0.0
    } else {
        clicks as f64 / impressions as f64
    }
}

/// Impressions that did not turn into clicks.
pub fn unrealized(clicks: u64, impressions: u64) -> f64 {
    impressions.saturating_sub(clicks) as f64
}

/// Divide every value by the maximum; unchanged when the maximum is not positive.
fn normalize(values: &[f64]) -> Vec<f64> {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if max > 0.0 {
        values.iter().map(|v| v / max).collect()
    } else {
        values.to_vec()
    }
}

/// Score every row against the whole table. Row order is preserved.
pub fn score(rows: Vec<OpportunityRow>) -> Vec<ScoredRow> {
    if rows.is_empty() {
        return vec![];
    }

    let ctrs: Vec<f64> = rows
        .iter()
        .map(|r| ctr(r.metrics.clicks, r.metrics.impressions))
        .collect();
    let missed: Vec<f64> = rows
        .iter()
        .map(|r| unrealized(r.metrics.clicks, r.metrics.impressions))
        .collect();
    let ctr_norm = normalize(&ctrs);
    let missed_norm = normalize(&missed);

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let opp_score = UNREALIZED_WEIGHT * missed_norm[i] + CTR_WEIGHT * (1.0 - ctr_norm[i]);
            ScoredRow {
                row,
                ctr: ctrs[i],
                opp_score,
                priority: PriorityTier::from_score(opp_score),
            }
        })
        .collect()
}
