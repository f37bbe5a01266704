//! End-to-end analysis: embeddings and performance in, scored table out.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::embeddings::{EmbeddingSet, RelatedPages, VectorIndex};
use crate::error::Result;
use crate::metrics::{self, PageMetrics, PerformanceRecord};
use crate::opportunity::{self, LinkEdge};
use crate::scoring::{self, ScoredRow};
use crate::volume;

/// Tunables for one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisParams {
    /// Neighbours per page, and neighbour columns in the table.
    pub top_related: usize,
    /// Keywords per page used for demand lookup.
    pub top_keywords: usize,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            top_related: 10,
            top_keywords: 3,
        }
    }
}

/// Everything the collaborators hand to the core.
#[derive(Debug, Clone, Default)]
pub struct PipelineInput {
    pub links: Vec<LinkEdge>,
    pub embeddings: EmbeddingSet,
    /// `None` when no performance export was supplied.
    pub performance: Option<Vec<PerformanceRecord>>,
    /// Lower-cased keyword → monthly search volume. May be empty.
    pub volumes: HashMap<String, u64>,
}

/// Result of one run. Intermediate maps are kept for downstream consumers.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub related: RelatedPages,
    pub metrics: HashMap<String, PageMetrics>,
    pub keywords: HashMap<String, Vec<String>>,
    pub demand: HashMap<String, u64>,
    pub rows: Vec<ScoredRow>,
}

/// Run the whole pipeline. Pure: the same input always yields the same output.
pub fn run(input: &PipelineInput, params: &AnalysisParams) -> Result<Analysis> {
    let index = VectorIndex::build(&input.embeddings)?;
    let related = index.related_pages(params.top_related);

    let records = input.performance.as_deref().unwrap_or(&[]);
    let page_metrics = metrics::aggregate(records);
    let keywords = metrics::top_keywords(records, params.top_keywords);
    let demand = volume::resolve(&keywords, &input.volumes);

    let rows = opportunity::compose(
        &related,
        &page_metrics,
        &demand,
        &input.links,
        params.top_related,
    );
    let rows = scoring::score(rows);

    info!(
        pages = index.len(),
        dimension = index.dimension(),
        rows = rows.len(),
        records = records.len(),
        "analysis complete"
    );

    Ok(Analysis {
        related,
        metrics: page_metrics,
        keywords,
        demand,
        rows,
    })
}
