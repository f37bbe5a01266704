//! Joins related pages, performance and demand into the opportunity table.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::embeddings::RelatedPages;
use crate::metrics::PageMetrics;

/// A hyperlink observed on the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEdge {
    pub source: String,
    pub destination: String,
    #[serde(default)]
    pub anchor: Option<String>,
}

impl LinkEdge {
    pub fn new(source: &str, destination: &str) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            anchor: None,
        }
    }
}

/// Whether a page already links to one of its related pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Exists,
    Missing,
    /// Empty slot: the page has fewer related pages than the table has columns.
    #[serde(rename = "")]
    Blank,
}

impl LinkStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkStatus::Exists => "Exists",
            LinkStatus::Missing => "Missing",
            LinkStatus::Blank => "",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedSlot {
    /// Empty when the slot is unused.
    pub url: String,
    pub status: LinkStatus,
}

/// One row of the opportunity table, before scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityRow {
    pub target_url: String,
    pub metrics: PageMetrics,
    /// Best single-keyword monthly search volume.
    pub demand: u64,
    pub related: Vec<RelatedSlot>,
}

/// Existing (source, destination) pairs for O(1) membership tests.
struct LinkSet<'a> {
    pairs: HashSet<(&'a str, &'a str)>,
}

impl<'a> LinkSet<'a> {
    fn new(edges: &'a [LinkEdge]) -> Self {
        Self {
            pairs: edges
                .iter()
                .map(|e| (e.source.as_str(), e.destination.as_str()))
                .collect(),
        }
    }

    fn status(&self, source: &str, destination: &str) -> LinkStatus {
        if source.is_empty() || destination.is_empty() {
            LinkStatus::Blank
        } else if self.pairs.contains(&(source, destination)) {
            LinkStatus::Exists
        } else {
            LinkStatus::Missing
        }
    }
}

/// Build one row per page of `related`, in its iteration order, with exactly
/// `top_related` neighbour slots each.
pub fn compose(
    related: &RelatedPages,
    page_metrics: &HashMap<String, PageMetrics>,
    demand: &HashMap<String, u64>,
    link_edges: &[LinkEdge],
    top_related: usize,
) -> Vec<OpportunityRow> {
    let links = LinkSet::new(link_edges);

    let rows: Vec<OpportunityRow> = related
        .iter()
        .map(|(target, neighbours)| {
            let slots = (0..top_related)
                .map(|i| {
                    let url = neighbours.get(i).cloned().unwrap_or_default();
                    let status = links.status(target, &url);
                    RelatedSlot { url, status }
                })
                .collect();
            OpportunityRow {
                target_url: target.to_string(),
                metrics: page_metrics.get(target).copied().unwrap_or_default(),
                demand: demand.get(target).copied().unwrap_or(0),
                related: slots,
            }
        })
        .collect();

    debug!(rows = rows.len(), top_related, edges = link_edges.len(), "composed opportunity rows");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn related(entries: &[(&str, &[&str])]) -> RelatedPages {
        entries
            .iter()
            .map(|(u, n)| (*u, n.iter().map(|s| s.to_string()).collect::<Vec<_>>()))
            .collect()
    }

    #[test]
    fn test_link_status_exists_and_missing() {
        let rel = related(&[("A", &["B", "C"])]);
        let rows = compose(
            &rel,
            &HashMap::new(),
            &HashMap::new(),
            &[LinkEdge::new("A", "B")],
            2,
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].target_url, "A");
        assert_eq!(
            rows[0].related,
            vec![
                RelatedSlot { url: "B".into(), status: LinkStatus::Exists },
                RelatedSlot { url: "C".into(), status: LinkStatus::Missing },
            ]
        );
    }

    #[test]
    fn test_link_direction_matters() {
        let rel = related(&[("A", &["B"])]);
        let rows = compose(&rel, &HashMap::new(), &HashMap::new(), &[LinkEdge::new("B", "A")], 1);
        assert_eq!(rows[0].related[0].status, LinkStatus::Missing);
    }

    #[test]
    fn test_short_neighbour_lists_are_padded() {
        let rel = related(&[("A", &["B"])]);
        let rows = compose(&rel, &HashMap::new(), &HashMap::new(), &[], 3);
        assert_eq!(rows[0].related.len(), 3);
        assert_eq!(rows[0].related[1].url, "");
        assert_eq!(rows[0].related[1].status, LinkStatus::Blank);
        assert_eq!(rows[0].related[2].status.to_string(), "");
    }

    #[test]
    fn test_extra_neighbours_are_truncated() {
        let rel = related(&[("A", &["B", "C", "D"])]);
        let rows = compose(&rel, &HashMap::new(), &HashMap::new(), &[], 2);
        let urls: Vec<&str> = rows[0].related.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(urls, vec!["B", "C"]);
    }

    #[test]
    fn test_missing_metrics_and_demand_default_to_zero() {
        let rel = related(&[("A", &[]), ("B", &[])]);
        let mut metrics = HashMap::new();
        metrics.insert(
            "A".to_string(),
            PageMetrics { queries: 1, clicks: 10, impressions: 20 },
        );
        // Metrics for pages outside the related map do not create rows.
        metrics.insert("Z".to_string(), PageMetrics::default());
        let mut demand = HashMap::new();
        demand.insert("A".to_string(), 90);

        let rows = compose(&rel, &metrics, &demand, &[], 0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].metrics.clicks, 10);
        assert_eq!(rows[0].demand, 90);
        assert_eq!(rows[1].metrics, PageMetrics::default());
        assert_eq!(rows[1].demand, 0);
        assert!(rows[1].related.is_empty());
    }

    #[test]
    fn test_rows_follow_related_map_order() {
        let rel = related(&[("z", &[]), ("a", &[]), ("m", &[])]);
        let rows = compose(&rel, &HashMap::new(), &HashMap::new(), &[], 1);
        let order: Vec<&str> = rows.iter().map(|r| r.target_url.as_str()).collect();
        assert_eq!(order, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_link_status_strings() {
        assert_eq!(LinkStatus::Exists.to_string(), "Exists");
        assert_eq!(LinkStatus::Missing.to_string(), "Missing");
        assert_eq!(serde_json::to_string(&LinkStatus::Blank).unwrap(), "\"\"");
    }
}
