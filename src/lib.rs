//! Internal link opportunity finder.
//!
//! Pages are related by the cosine similarity of their content embeddings,
//! then each page's neighbours are joined with search performance (clicks,
//! impressions, keyword demand) and whether the link already exists, and the
//! resulting table is scored and tiered for implementation priority.
//!
//! The core ([`embeddings`], [`metrics`], [`volume`], [`opportunity`],
//! [`scoring`], tied together by [`pipeline`]) is pure and synchronous. File
//! parsing lives in [`ingest`], output in [`export`], and the single-page
//! fetch helper in [`crawler`].

pub mod config;
pub mod crawler;
pub mod embeddings;
pub mod error;
pub mod export;
pub mod ingest;
pub mod metrics;
pub mod opportunity;
pub mod pipeline;
pub mod scoring;
pub mod volume;

pub use embeddings::{EmbeddingSet, RelatedPages, VectorIndex};
pub use error::{Error, Result};
pub use metrics::{PageMetrics, PerformanceRecord};
pub use opportunity::{LinkEdge, LinkStatus, OpportunityRow, RelatedSlot};
pub use pipeline::{Analysis, AnalysisParams, PipelineInput};
pub use scoring::{PriorityTier, ScoredRow};
