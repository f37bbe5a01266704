//! CSV readers for the analysis inputs.
//!
//! Exports from crawlers and search consoles name their columns loosely, so
//! headers are matched by keyword rather than exact name. Rows that cannot be
//! parsed are dropped and counted; only a missing required column is an error.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, info};

use crate::embeddings::EmbeddingSet;
use crate::error::{Error, Result};
use crate::metrics::PerformanceRecord;
use crate::opportunity::LinkEdge;
use crate::volume;

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Lower-cased, trimmed header names.
fn headers<R: Read>(
    rdr: &mut csv::Reader<R>,
    collaborator: &'static str,
) -> Result<Vec<String>> {
    let headers = rdr
        .headers()
        .map_err(|source| Error::Csv {
            collaborator,
            source,
        })?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_lowercase())
        .collect();
    Ok(headers)
}

fn find(headers: &[String], pred: impl Fn(&str) -> bool) -> Option<usize> {
    headers.iter().position(|h| pred(h.as_str()))
}

fn missing(collaborator: &'static str, column: &'static str, headers: &[String]) -> Error {
    Error::MissingColumn {
        collaborator,
        column,
        available: headers.join(", "),
    }
}

fn field(record: &StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("")
}

/// Non-negative integer from a loosely formatted cell (`1,234`, `12.0`);
/// anything unparseable counts as zero.
fn parse_count(raw: &str) -> u64 {
    raw.replace(',', "")
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
        .map(|v| v.round() as u64)
        .unwrap_or(0)
}

/// A rate given either as a fraction or as a percentage string (`5.2%`).
fn parse_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    match raw.strip_suffix('%') {
        Some(pct) => pct.trim().parse::<f64>().ok().map(|v| v / 100.0),
        None => raw.parse::<f64>().ok(),
    }
}

// ── links ──

pub fn read_links<R: Read>(reader: R) -> Result<Vec<LinkEdge>> {
    const WHO: &str = "links";
    let mut rdr = csv_reader(reader);
    let headers = headers(&mut rdr, WHO)?;

    let source = find(&headers, |h| matches!(h, "source" | "from" | "origin"))
        .ok_or_else(|| missing(WHO, "source", &headers))?;
    let destination = find(&headers, |h| {
        matches!(h, "destination" | "to" | "target" | "link")
    })
    .ok_or_else(|| missing(WHO, "destination", &headers))?;
    let anchor = find(&headers, |h| matches!(h, "anchor" | "anchor text" | "anchor_text"));

    let mut edges = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let Ok(record) = result else {
            skipped += 1;
            continue;
        };
        let (src, dst) = (field(&record, Some(source)), field(&record, Some(destination)));
        if src.is_empty() || dst.is_empty() {
            skipped += 1;
            continue;
        }
        let anchor = field(&record, anchor);
        edges.push(LinkEdge {
            source: src.to_string(),
            destination: dst.to_string(),
            anchor: (!anchor.is_empty()).then(|| anchor.to_string()),
        });
    }

    debug!(edges = edges.len(), skipped, "read link edges");
    Ok(edges)
}

pub fn load_links(path: &Path) -> Result<Vec<LinkEdge>> {
    let edges = read_links(open(path)?)?;
    info!(path = %path.display(), edges = edges.len(), "loaded links");
    Ok(edges)
}

// ── embeddings ──

/// Parse `[0.1, 0.2]`, `(0.1, 0.2)` or a bare `0.1, 0.2` list.
fn parse_vector(raw: &str) -> Option<Vec<f32>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if raw.starts_with('[') && raw.ends_with(']') {
        if let Ok(v) = serde_json::from_str::<Vec<f32>>(raw) {
            return (!v.is_empty()).then_some(v);
        }
    }
    let inner = raw
        .trim_start_matches(['[', '('])
        .trim_end_matches([']', ')']);
    let v = inner
        .split(',')
        .map(|x| x.trim().parse::<f32>().ok().filter(|f| f.is_finite()))
        .collect::<Option<Vec<f32>>>()?;
    (!v.is_empty()).then_some(v)
}

/// Numeric suffix of an `emb_N` header; headers without one sort first.
fn emb_index(header: &str) -> usize {
    header
        .strip_prefix("emb_")
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub fn read_embeddings<R: Read>(reader: R) -> Result<EmbeddingSet> {
    const WHO: &str = "embeddings";
    let mut rdr = csv_reader(reader);
    let headers = headers(&mut rdr, WHO)?;

    let url = find(&headers, |h| {
        h.contains("url") || h.contains("page") || h.contains("address")
    })
    .ok_or_else(|| missing(WHO, "url", &headers))?;
    let vector = headers.iter().enumerate().position(|(i, h)| {
        i != url
            && ["embedding", "vector", "extract embedding", "page content"]
                .iter()
                .any(|term| h.contains(term))
    });
    let mut emb_cols: Vec<usize> = (0..headers.len())
        .filter(|&i| headers[i].starts_with("emb_"))
        .collect();
    emb_cols.sort_by_key(|&i| emb_index(&headers[i]));

    let records: Vec<StringRecord> = rdr.records().filter_map(|r| r.ok()).collect();
    let mut set = EmbeddingSet::new();
    let mut skipped = 0usize;

    if let Some(col) = vector {
        for record in &records {
            let page = field(record, Some(url));
            match parse_vector(field(record, Some(col))) {
                Some(v) if !page.is_empty() => set.insert(page, v),
                _ => skipped += 1,
            }
        }
    }

    if set.is_empty() && !emb_cols.is_empty() {
        skipped = 0;
        for record in &records {
            let page = field(record, Some(url));
            let v = emb_cols
                .iter()
                .map(|&i| field(record, Some(i)).parse::<f32>().ok().filter(|f| f.is_finite()))
                .collect::<Option<Vec<f32>>>();
            match v {
                Some(v) if !page.is_empty() => set.insert(page, v),
                _ => skipped += 1,
            }
        }
    } else if vector.is_none() {
        return Err(missing(WHO, "embedding", &headers));
    }

    if set.is_empty() && !records.is_empty() {
        return Err(missing(WHO, "embedding", &headers));
    }

    debug!(pages = set.len(), skipped, "read embeddings");
    Ok(set)
}

pub fn load_embeddings(path: &Path) -> Result<EmbeddingSet> {
    let set = read_embeddings(open(path)?)?;
    info!(path = %path.display(), pages = set.len(), "loaded embeddings");
    Ok(set)
}

// ── performance ──

pub fn read_performance<R: Read>(reader: R) -> Result<Vec<PerformanceRecord>> {
    const WHO: &str = "performance";
    let mut rdr = csv_reader(reader);
    let headers = headers(&mut rdr, WHO)?;

    let page = find(&headers, |h| {
        ["page", "url", "address", "landing"].iter().any(|t| h.contains(t))
    })
    .ok_or_else(|| missing(WHO, "page", &headers))?;
    let query = find(&headers, |h| {
        matches!(
            h,
            "query" | "queries" | "top queries" | "keyword" | "keywords" | "search term"
                | "search query"
        )
    });
    let is_ctr = |h: &str| h.contains("ctr") || h.contains("click through") || h.contains("clickthrough");
    let ctr = find(&headers, is_ctr);
    let clicks = find(&headers, |h| h.contains("click") && !is_ctr(h));
    let impressions = find(&headers, |h| h.contains("impression"));
    let position = find(&headers, |h| {
        h.contains("position") || h.contains("ranking") || h.contains("rank")
    });

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let Ok(record) = result else {
            skipped += 1;
            continue;
        };
        let url = field(&record, Some(page));
        if url.is_empty() {
            skipped += 1;
            continue;
        }
        out.push(PerformanceRecord {
            page: url.to_string(),
            query: field(&record, query).to_string(),
            clicks: parse_count(field(&record, clicks)),
            impressions: parse_count(field(&record, impressions)),
            ctr: ctr.and_then(|i| parse_rate(field(&record, Some(i)))),
            position: position.and_then(|i| field(&record, Some(i)).parse::<f64>().ok()),
        });
    }

    debug!(records = out.len(), skipped, "read performance records");
    Ok(out)
}

pub fn load_performance(path: &Path) -> Result<Vec<PerformanceRecord>> {
    let records = read_performance(open(path)?)?;
    info!(path = %path.display(), records = records.len(), "loaded performance log");
    Ok(records)
}

// ── keyword volumes ──

/// Keyword → monthly volume table, keys lower-cased.
pub fn read_volumes<R: Read>(reader: R) -> Result<HashMap<String, u64>> {
    const WHO: &str = "volumes";
    let mut rdr = csv_reader(reader);
    let headers = headers(&mut rdr, WHO)?;

    let keyword = find(&headers, |h| h.contains("keyword") || h.contains("query")).unwrap_or(0);
    let vol = find(&headers, |h| h.contains("volume"))
        .or_else(|| (0..headers.len()).find(|&i| i != keyword))
        .ok_or_else(|| missing(WHO, "volume", &headers))?;

    let rows = rdr.records().filter_map(|r| r.ok()).filter_map(|record| {
        let kw = field(&record, Some(keyword));
        (!kw.is_empty()).then(|| (kw.to_string(), parse_count(field(&record, Some(vol)))))
    });
    let table = volume::lowercase_keys(rows);

    debug!(keywords = table.len(), "read keyword volumes");
    Ok(table)
}

pub fn load_volumes(path: &Path) -> Result<HashMap<String, u64>> {
    let table = read_volumes(open(path)?)?;
    info!(path = %path.display(), keywords = table.len(), "loaded keyword volumes");
    Ok(table)
}
