//! Per-page search performance: totals and top keywords.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// One row of a search performance export: a (page, query) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub page: String,
    pub query: String,
    pub clicks: u64,
    pub impressions: u64,
    #[serde(default)]
    pub ctr: Option<f64>,
    #[serde(default)]
    pub position: Option<f64>,
}

impl PerformanceRecord {
    pub fn new(page: &str, query: &str, clicks: u64, impressions: u64) -> Self {
        Self {
            page: page.to_string(),
            query: query.to_string(),
            clicks,
            impressions,
            ctr: None,
            position: None,
        }
    }
}

/// Aggregated totals for one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Distinct non-empty queries.
    pub queries: u64,
    pub clicks: u64,
    pub impressions: u64,
}

/// Group records by page and total them. Pages without records get no entry.
pub fn aggregate(records: &[PerformanceRecord]) -> HashMap<String, PageMetrics> {
    let mut seen: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut out: HashMap<String, PageMetrics> = HashMap::new();

    for r in records {
        let m = out.entry(r.page.clone()).or_default();
        m.clicks += r.clicks;
        m.impressions += r.impressions;
        if !r.query.is_empty() && seen.entry(&r.page).or_default().insert(&r.query) {
            m.queries += 1;
        }
    }

    debug!(records = records.len(), pages = out.len(), "aggregated page metrics");
    out
}

/// The best-performing queries of every page.
///
/// Queries are ranked by clicks, or by impressions when no record in the
/// whole log has a click. A query's rank is one more than the number of the
/// page's records with a strictly larger value, and every query ranked within
/// `top_n` is kept, so ties at the boundary can return more than `top_n`
/// queries. Lists are ordered best first, then by record order; repeated
/// queries appear once.
pub fn top_keywords(records: &[PerformanceRecord], top_n: usize) -> HashMap<String, Vec<String>> {
    if top_n == 0 {
        return HashMap::new();
    }

    let by_clicks = records.iter().any(|r| r.clicks > 0);
    let value = |r: &PerformanceRecord| if by_clicks { r.clicks } else { r.impressions };

    let mut pages: Vec<&str> = Vec::new();
    let mut grouped: HashMap<&str, Vec<&PerformanceRecord>> = HashMap::new();
    for r in records {
        grouped
            .entry(&r.page)
            .or_insert_with(|| {
                pages.push(&r.page);
                Vec::new()
            })
            .push(r);
    }

    let mut out = HashMap::new();
    for page in pages {
        let group = &grouped[page];
        let mut values: Vec<u64> = group.iter().map(|&r| value(r)).collect();
        values.sort_unstable_by(|a, b| b.cmp(a));
        let Some(&cutoff) = values.get(top_n - 1).or(values.last()) else {
            continue;
        };

        let mut kept: Vec<&PerformanceRecord> =
            group.iter().copied().filter(|&r| value(r) >= cutoff).collect();
        kept.sort_by(|&a, &b| value(b).cmp(&value(a)));

        let mut seen = HashSet::new();
        let queries: Vec<String> = kept
            .into_iter()
            .filter(|&r| !r.query.is_empty() && seen.insert(r.query.as_str()))
            .map(|r| r.query.clone())
            .collect();
        if !queries.is_empty() {
            out.insert(page.to_string(), queries);
        }
    }

    debug!(pages = out.len(), top_n, by_clicks, "selected top keywords");
    out
}
