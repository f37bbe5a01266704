use std::collections::{HashMap, HashSet};
use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::config::FetchConfig;

const SKIP_TAGS: [&str; 7] = ["script", "style", "noscript", "nav", "footer", "header", "iframe"];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "else", "when", "while", "for", "to", "of",
    "in", "on", "at", "by", "with", "from", "as", "is", "are", "was", "were", "be", "been",
    "being", "this", "that", "those", "these", "it", "its", "their", "your", "our", "we", "you",
    "i", "me", "my", "mine", "ours", "yours", "his", "her", "hers", "him", "them", "they", "he",
    "she", "what", "which", "who", "whom", "whose", "how", "why", "where",
];

/// Readable content of one fetched page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageData {
    pub text: String,
    pub headings: Vec<String>,
    pub keywords: Vec<String>,
}

fn client(cfg: &FetchConfig) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.as_str())
        .timeout(Duration::from_secs(cfg.timeout_secs))
        .build()
        .context("building http client")
}

/// Fetch a single URL, honouring robots.txt.
pub async fn fetch_html(cfg: &FetchConfig, url: &str) -> anyhow::Result<String> {
    let client = client(cfg)?;

    let parsed = Url::parse(url).with_context(|| format!("invalid url {url}"))?;
    let robots_url = format!(
        "{}://{}/robots.txt",
        parsed.scheme(),
        parsed.host_str().unwrap_or("")
    );
    if let Ok(resp) = client.get(&robots_url).send().await {
        if resp.status().is_success() {
            if let Ok(body) = resp.text().await {
                let robot = texting_robots::Robot::new("interlink", body.as_bytes())
                    .map_err(|e| anyhow::anyhow!("{e:?}"))?;
                if !robot.allowed(url) {
                    return Err(anyhow::anyhow!("Blocked by robots.txt: {url}"));
                }
            }
        }
    }

    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("fetching {url}"))?
        .error_for_status()
        .with_context(|| format!("fetching {url}"))?;
    Ok(resp.text().await?)
}

/// Fetch a page and extract its text, headings and keyword candidates.
pub async fn fetch_page_data(cfg: &FetchConfig, url: &str) -> anyhow::Result<PageData> {
    let html = fetch_html(cfg, url).await?;
    let (text, headings) = extract_text_and_headings(&html);
    let keywords = keyword_candidates(&text, cfg.keyword_candidates);
    debug!(url, headings = headings.len(), keywords = keywords.len(), "fetched page");
    Ok(PageData {
        text,
        headings,
        keywords,
    })
}

/// Visible text and h1-h3 headings of an HTML document.
pub fn extract_text_and_headings(html: &str) -> (String, Vec<String>) {
    let document = scraper::Html::parse_document(html);
    let skip: HashSet<&str> = SKIP_TAGS.iter().copied().collect();

    let mut text = String::new();
    for node in document.tree.nodes() {
        if let scraper::node::Node::Text(t) = node.value() {
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|el| skip.contains(el.name()))
            });
            if hidden {
                continue;
            }
            let s = t.text.trim();
            if !s.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(s);
            }
        }
    }

    let mut headings = Vec::new();
    if let Ok(selector) = scraper::Selector::parse("h1, h2, h3") {
        headings = document
            .select(&selector)
            .filter(|h| {
                !h.ancestors().any(|a| {
                    a.value()
                        .as_element()
                        .is_some_and(|el| skip.contains(el.name()))
                })
            })
            .map(|h| {
                h.text()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.is_empty())
            .collect();
    }

    (text, headings)
}

/// Most frequent content words, ties broken by first appearance.
pub fn keyword_candidates(text: &str, top_k: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let words = text
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .map(|w| w.trim_matches('-').to_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()));
    for (pos, w) in words.enumerate() {
        counts.entry(w).or_insert((0, pos)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(top_k).map(|(w, _)| w).collect()
}
