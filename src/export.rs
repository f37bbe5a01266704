use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::pipeline::Analysis;
use crate::scoring::ScoredRow;

fn csv_err(source: csv::Error) -> Error {
    Error::Csv {
        collaborator: "export",
        source,
    }
}

/// Column headers of the opportunity table.
pub fn header(top_related: usize) -> Vec<String> {
    let mut cols: Vec<String> = [
        "Target URL",
        "# of Queries",
        "Clicks",
        "Impressions",
        "Monthly Search Volume",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();
    for i in 1..=top_related {
        cols.push(format!("Related URL {i}"));
        cols.push(format!("URL {i} Status"));
    }
    cols.push("OppScore".to_string());
    cols.push("Implementation Priority".to_string());
    cols
}

/// Render scored rows as CSV, one line per page, `top_related` slot pairs each.
pub fn to_csv(rows: &[ScoredRow], top_related: usize) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(header(top_related)).map_err(csv_err)?;

    for r in rows {
        let m = &r.row.metrics;
        let mut record = vec![
            r.row.target_url.clone(),
            m.queries.to_string(),
            m.clicks.to_string(),
            m.impressions.to_string(),
            r.row.demand.to_string(),
        ];
        for i in 0..top_related {
            match r.row.related.get(i) {
                Some(slot) => {
                    record.push(slot.url.clone());
                    record.push(slot.status.to_string());
                }
                None => record.extend([String::new(), String::new()]),
            }
        }
        record.push(format!("{:.4}", r.opp_score));
        record.push(r.priority.to_string());
        wtr.write_record(&record).map_err(csv_err)?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| csv_err(e.into_error().into()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Pretty JSON with the scored rows and the related-pages map, in table order.
pub fn to_json(analysis: &Analysis) -> Result<String> {
    let rows: Vec<Value> = analysis
        .rows
        .iter()
        .map(|r| {
            json!({
                "target_url": r.row.target_url,
                "queries": r.row.metrics.queries,
                "clicks": r.row.metrics.clicks,
                "impressions": r.row.metrics.impressions,
                "monthly_search_volume": r.row.demand,
                "related": r.row.related,
                "ctr": r.ctr,
                "opp_score": r.opp_score,
                "priority": r.priority,
            })
        })
        .collect();
    let doc = json!({
        "rows": rows,
        "related_pages": analysis.related,
    });
    Ok(serde_json::to_string_pretty(&doc)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PageMetrics;
    use crate::opportunity::{LinkStatus, OpportunityRow, RelatedSlot};
    use crate::scoring::{self, PriorityTier};

    fn sample() -> Vec<ScoredRow> {
        scoring::score(vec![OpportunityRow {
            target_url: "https://s/a".to_string(),
            metrics: PageMetrics { queries: 2, clicks: 0, impressions: 100 },
            demand: 320,
            related: vec![
                RelatedSlot { url: "https://s/b".to_string(), status: LinkStatus::Exists },
                RelatedSlot { url: String::new(), status: LinkStatus::Blank },
            ],
        }])
    }

    #[test]
    fn test_header_layout() {
        assert_eq!(
            header(2),
            vec![
                "Target URL",
                "# of Queries",
                "Clicks",
                "Impressions",
                "Monthly Search Volume",
                "Related URL 1",
                "URL 1 Status",
                "Related URL 2",
                "URL 2 Status",
                "OppScore",
                "Implementation Priority",
            ]
        );
    }

    #[test]
    fn test_csv_rows() {
        let rows = sample();
        assert_eq!(rows[0].priority, PriorityTier::High);
        let csv = to_csv(&rows, 2).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "https://s/a,2,0,100,320,https://s/b,Exists,,,1.0000,High");
    }

    #[test]
    fn test_csv_pads_short_rows() {
        let csv = to_csv(&sample(), 3).unwrap();
        let last = csv.lines().nth(1).unwrap();
        assert_eq!(last.split(',').count(), 13);
    }

    #[test]
    fn test_csv_empty_table_has_header() {
        let csv = to_csv(&[], 1).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn test_json_shape() {
        let analysis = Analysis {
            related: vec![("https://s/a", vec!["https://s/b".to_string()])]
                .into_iter()
                .collect(),
            metrics: Default::default(),
            keywords: Default::default(),
            demand: Default::default(),
            rows: sample(),
        };
        let text = to_json(&analysis).unwrap();
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["rows"][0]["priority"], "High");
        assert_eq!(v["rows"][0]["related"][0]["status"], "Exists");
        assert_eq!(v["rows"][0]["related"][1]["status"], "");
        assert_eq!(v["related_pages"]["https://s/a"][0], "https://s/b");
    }
}
