//! Keyword search volume joined onto page keyword lists.

use std::collections::HashMap;

use tracing::debug;

/// Volume of a single keyword: lower-cased key first, then the original
/// casing, then zero.
fn lookup(volume_by_keyword: &HashMap<String, u64>, keyword: &str) -> u64 {
    volume_by_keyword
        .get(&keyword.to_lowercase())
        .or_else(|| volume_by_keyword.get(keyword))
        .copied()
        .unwrap_or(0)
}

/// Demand per page: the largest single-keyword volume among its keywords.
///
/// Pages with no keywords, or none with known volume, resolve to 0.
pub fn resolve(
    keywords_by_url: &HashMap<String, Vec<String>>,
    volume_by_keyword: &HashMap<String, u64>,
) -> HashMap<String, u64> {
    let demand: HashMap<String, u64> = keywords_by_url
        .iter()
        .map(|(url, keywords)| {
            let best = keywords
                .iter()
                .map(|kw| lookup(volume_by_keyword, kw))
                .max()
                .unwrap_or(0);
            (url.clone(), best)
        })
        .collect();
    debug!(
        pages = demand.len(),
        keywords = volume_by_keyword.len(),
        "resolved keyword demand"
    );
    demand
}

/// Lower-case the keys of a volume table. Colliding keys keep the larger volume.
pub fn lowercase_keys<I>(volumes: I) -> HashMap<String, u64>
where
    I: IntoIterator<Item = (String, u64)>,
{
    let mut out: HashMap<String, u64> = HashMap::new();
    for (keyword, volume) in volumes {
        let slot = out.entry(keyword.trim().to_lowercase()).or_insert(0);
        *slot = (*slot).max(volume);
    }
    out
}
