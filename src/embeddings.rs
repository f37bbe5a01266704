//! Dense page embeddings, cosine similarity and top-K related-page retrieval.
//!
//! Vectors are L2-normalised once at build time; similarity rows are computed
//! on demand as dot products, so memory stays linear in the number of pages
//! while every call still sees the full all-pairs ranking.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::debug;

use crate::error::{Error, Result};

/// Added to the norm before dividing so that zero vectors normalise to zero
/// instead of faulting.
pub const NORM_EPSILON: f32 = 1e-8;

// ---------------------------------------------------------------------------
// Embedding set
// ---------------------------------------------------------------------------

/// Page URL → embedding vector, keeping insertion order.
///
/// Re-inserting a URL replaces its vector but keeps its original position.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingSet {
    urls: Vec<String>,
    vectors: Vec<Vec<f32>>,
    positions: HashMap<String, usize>,
}

impl EmbeddingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, vector: Vec<f32>) {
        let url = url.into();
        if let Some(&idx) = self.positions.get(&url) {
            self.vectors[idx] = vector;
            return;
        }
        self.positions.insert(url.clone(), self.urls.len());
        self.urls.push(url);
        self.vectors.push(vector);
    }

    pub fn get(&self, url: &str) -> Option<&[f32]> {
        self.positions
            .get(url)
            .map(|&idx| self.vectors[idx].as_slice())
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f32])> {
        self.urls
            .iter()
            .map(String::as_str)
            .zip(self.vectors.iter().map(Vec::as_slice))
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<f32>)> for EmbeddingSet {
    fn from_iter<I: IntoIterator<Item = (S, Vec<f32>)>>(iter: I) -> Self {
        let mut set = EmbeddingSet::new();
        for (url, vector) in iter {
            set.insert(url, vector);
        }
        set
    }
}

// ---------------------------------------------------------------------------
// Related pages map
// ---------------------------------------------------------------------------

/// Page URL → neighbour URLs ordered by descending similarity.
///
/// Iteration follows insertion order, which is what the opportunity table
/// uses as its row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelatedPages {
    entries: Vec<(String, Vec<String>)>,
    positions: HashMap<String, usize>,
}

impl RelatedPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, related: Vec<String>) {
        let url = url.into();
        if let Some(&idx) = self.positions.get(&url) {
            self.entries[idx].1 = related;
            return;
        }
        self.positions.insert(url.clone(), self.entries.len());
        self.entries.push((url, related));
    }

    pub fn get(&self, url: &str) -> Option<&[String]> {
        self.positions
            .get(url)
            .map(|&idx| self.entries[idx].1.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(url, related)| (url.as_str(), related.as_slice()))
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for RelatedPages {
    fn from_iter<I: IntoIterator<Item = (S, Vec<String>)>>(iter: I) -> Self {
        let mut map = RelatedPages::new();
        for (url, related) in iter {
            map.insert(url, related);
        }
        map
    }
}

impl Serialize for RelatedPages {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (url, related) in &self.entries {
            map.serialize_entry(url, related)?;
        }
        map.end()
    }
}

// ---------------------------------------------------------------------------
// Vector index
// ---------------------------------------------------------------------------

/// L2-normalise with the epsilon-stabilised denominator.
fn normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    let denom = norm + NORM_EPSILON;
    v.iter().map(|x| x / denom).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Descending order with NaN ranked last.
fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// All-pairs cosine similarity over a fixed set of page embeddings.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    urls: Vec<String>,
    positions: HashMap<String, usize>,
    unit: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Normalise every vector in `embeddings`.
    ///
    /// All vectors must share one non-zero dimensionality; the first vector
    /// fixes it. An empty set builds an empty index.
    pub fn build(embeddings: &EmbeddingSet) -> Result<Self> {
        let dimension = embeddings.iter().next().map_or(0, |(_, v)| v.len());
        let mut unit = Vec::with_capacity(embeddings.len());

        for (url, vector) in embeddings.iter() {
            if vector.is_empty() {
                return Err(Error::InputShape {
                    collaborator: "embeddings",
                    field: format!("vector for {url}"),
                    message: "embedding has no components".to_string(),
                });
            }
            if vector.len() != dimension {
                return Err(Error::InputShape {
                    collaborator: "embeddings",
                    field: format!("vector for {url}"),
                    message: format!(
                        "expected {dimension} dimensions, found {}",
                        vector.len()
                    ),
                });
            }
            unit.push(normalize(vector));
        }

        debug!(pages = unit.len(), dimension, "built vector index");

        Ok(Self {
            urls: embeddings.urls().to_vec(),
            positions: embeddings
                .urls()
                .iter()
                .enumerate()
                .map(|(i, u)| (u.clone(), i))
                .collect(),
            unit,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Cosine similarity between two indexed pages.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f32> {
        let i = *self.positions.get(a)?;
        let j = *self.positions.get(b)?;
        Some(dot(&self.unit[i], &self.unit[j]))
    }

    /// Every other page ranked by descending similarity to page `i`.
    /// `sort_by` is stable, so ties keep input order.
    fn ranked(&self, i: usize) -> Vec<(usize, f32)> {
        let query = &self.unit[i];
        let mut scored: Vec<(usize, f32)> = self
            .unit
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(j, v)| (j, dot(query, v)))
            .collect();
        scored.sort_by(|a, b| descending(a.1, b.1));
        scored
    }

    /// Up to `k` most similar pages to `url`, with their similarity.
    pub fn neighbors_with_scores(&self, url: &str, k: usize) -> Vec<(String, f32)> {
        let Some(&i) = self.positions.get(url) else {
            return vec![];
        };
        self.ranked(i)
            .into_iter()
            .take(k)
            .map(|(j, sim)| (self.urls[j].clone(), sim))
            .collect()
    }

    /// Up to `k` most similar pages to `url`. Unknown URLs yield nothing.
    pub fn neighbors(&self, url: &str, k: usize) -> Vec<String> {
        self.neighbors_with_scores(url, k)
            .into_iter()
            .map(|(u, _)| u)
            .collect()
    }

    /// Top-`k` neighbour list for every page, in index order.
    pub fn related_pages(&self, k: usize) -> RelatedPages {
        let related: RelatedPages = (0..self.urls.len())
            .map(|i| {
                let neighbours = self
                    .ranked(i)
                    .into_iter()
                    .take(k)
                    .map(|(j, _)| self.urls[j].clone())
                    .collect();
                (self.urls[i].clone(), neighbours)
            })
            .collect();
        debug!(pages = related.len(), k, "computed related pages");
        related
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn set_from(entries: &[(&str, &[f32])]) -> EmbeddingSet {
        entries.iter().map(|(u, v)| (*u, v.to_vec())).collect()
    }

    /// A, B, C on the unit sphere with sim(A,B)=0.9, sim(A,C)=0.1, sim(B,C)=0.2.
    fn triangle() -> EmbeddingSet {
        let by = (1.0f32 - 0.81).sqrt();
        let cy = (0.2 - 0.09) / by;
        let cz = (1.0 - 0.01 - cy * cy).sqrt();
        set_from(&[
            ("A", &[1.0, 0.0, 0.0]),
            ("B", &[0.9, by, 0.0]),
            ("C", &[0.1, cy, cz]),
        ])
    }

    #[test]
    fn test_normalize_unit_length() {
        let v = normalize(&[3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector() {
        let v = normalize(&[0.0, 0.0, 0.0]);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_similarity_identical_and_orthogonal() {
        let index = VectorIndex::build(&set_from(&[
            ("a", &[1.0, 2.0]),
            ("b", &[2.0, 4.0]),
            ("c", &[-2.0, 1.0]),
        ]))
        .unwrap();
        assert!((index.similarity("a", "b").unwrap() - 1.0).abs() < 1e-5);
        assert!(index.similarity("a", "c").unwrap().abs() < 1e-6);
        assert!(index.similarity("a", "missing").is_none());
    }

    #[test]
    fn test_zero_vector_similarity_is_finite() {
        let index =
            VectorIndex::build(&set_from(&[("a", &[0.0, 0.0]), ("b", &[1.0, 0.0])])).unwrap();
        let sim = index.similarity("a", "b").unwrap();
        assert!(sim.is_finite());
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let err = VectorIndex::build(&set_from(&[("a", &[1.0, 0.0]), ("b", &[1.0, 0.0, 0.0])]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("embeddings"));
        assert!(msg.contains("vector for b"));
        assert!(msg.contains("expected 2 dimensions, found 3"));
    }

    #[test]
    fn test_empty_vector_is_error() {
        let err = VectorIndex::build(&set_from(&[("a", &[])])).unwrap_err();
        assert!(matches!(err, Error::InputShape { .. }));
    }

    #[test]
    fn test_empty_set() {
        let index = VectorIndex::build(&EmbeddingSet::new()).unwrap();
        assert!(index.is_empty());
        assert!(index.related_pages(5).is_empty());
        assert!(index.neighbors("a", 5).is_empty());
    }

    #[test]
    fn test_neighbors_exclude_self_and_cap_at_available() {
        let index = VectorIndex::build(&triangle()).unwrap();
        let n = index.neighbors("A", 10);
        assert_eq!(n, vec!["B".to_string(), "C".to_string()]);
        assert!(index.neighbors("unknown", 3).is_empty());
        assert!(index.neighbors("A", 0).is_empty());
    }

    #[test]
    fn test_duplicate_vectors_still_exclude_self() {
        let index =
            VectorIndex::build(&set_from(&[("a", &[1.0, 1.0]), ("b", &[1.0, 1.0])])).unwrap();
        assert_eq!(index.neighbors("a", 5), vec!["b".to_string()]);
        assert_eq!(index.neighbors("b", 5), vec!["a".to_string()]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let index = VectorIndex::build(&set_from(&[
            ("q", &[1.0, 0.0]),
            ("x", &[0.0, 1.0]),
            ("y", &[0.0, 2.0]),
            ("z", &[0.0, 3.0]),
        ]))
        .unwrap();
        assert_eq!(
            index.neighbors("q", 3),
            vec!["x".to_string(), "y".to_string(), "z".to_string()]
        );
    }

    #[test]
    fn test_triangle_related_pages() {
        let index = VectorIndex::build(&triangle()).unwrap();
        assert!((index.similarity("A", "B").unwrap() - 0.9).abs() < 1e-4);
        assert!((index.similarity("A", "C").unwrap() - 0.1).abs() < 1e-4);
        assert!((index.similarity("B", "C").unwrap() - 0.2).abs() < 1e-4);

        let related = index.related_pages(1);
        let got: Vec<(&str, &[String])> = related.iter().collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], ("A", &["B".to_string()][..]));
        assert_eq!(got[1], ("B", &["A".to_string()][..]));
        assert_eq!(got[2], ("C", &["B".to_string()][..]));
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let mut set = EmbeddingSet::new();
        set.insert("a", vec![1.0]);
        set.insert("b", vec![2.0]);
        set.insert("a", vec![3.0]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.urls(), &["a".to_string(), "b".to_string()]);
        assert_eq!(set.get("a"), Some(&[3.0][..]));
    }

    #[test]
    fn test_related_pages_serialize_in_order() {
        let related: RelatedPages = vec![
            ("z", vec!["a".to_string()]),
            ("a", vec!["z".to_string()]),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&related).unwrap();
        assert_eq!(json, r#"{"z":["a"],"a":["z"]}"#);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let set = triangle();
        let a = VectorIndex::build(&set).unwrap().related_pages(2);
        let b = VectorIndex::build(&set).unwrap().related_pages(2);
        assert_eq!(a, b);
    }

    fn embedding_sets() -> impl Strategy<Value = EmbeddingSet> {
        prop::collection::vec(prop::collection::vec(-10.0f32..10.0, 4), 2..10).prop_map(
            |vectors| {
                vectors
                    .into_iter()
                    .enumerate()
                    .map(|(i, v)| (format!("https://site.test/{i}"), v))
                    .collect()
            },
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_similarity_is_symmetric(set in embedding_sets()) {
            let index = VectorIndex::build(&set).unwrap();
            for a in set.urls() {
                for b in set.urls() {
                    let ab = index.similarity(a, b).unwrap();
                    let ba = index.similarity(b, a).unwrap();
                    prop_assert!((ab - ba).abs() < 1e-6, "sim({a},{b})={ab} != {ba}");
                }
            }
        }

        #[test]
        fn prop_neighbors_exclude_self_and_descend(set in embedding_sets(), k in 1usize..12) {
            let index = VectorIndex::build(&set).unwrap();
            for url in set.urls() {
                let scored = index.neighbors_with_scores(url, k);
                prop_assert_eq!(scored.len(), k.min(set.len() - 1));
                prop_assert!(scored.iter().all(|(n, _)| n != url));
                for pair in scored.windows(2) {
                    prop_assert!(pair[0].1 >= pair[1].1);
                }
            }
        }
    }
}
