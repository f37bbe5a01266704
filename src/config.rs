use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::pipeline::AnalysisParams;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Related pages listed per target page.
    #[serde(default = "default_top_related")]
    pub top_related: usize,

    /// Top queries per page used to look up search volume.
    #[serde(default = "default_top_keywords")]
    pub top_keywords: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Keyword candidates extracted per fetched page.
    #[serde(default = "default_keyword_candidates")]
    pub keyword_candidates: usize,
}

// ── defaults ──

fn default_top_related() -> usize {
    10
}
fn default_top_keywords() -> usize {
    3
}
fn default_user_agent() -> String {
    "interlink/0.1 (internal-link-finder)".to_string()
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_keyword_candidates() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            analysis: AnalysisConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            top_related: default_top_related(),
            top_keywords: default_top_keywords(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            keyword_candidates: default_keyword_candidates(),
        }
    }
}

impl AnalysisConfig {
    pub fn params(&self) -> AnalysisParams {
        AnalysisParams {
            top_related: self.top_related,
            top_keywords: self.top_keywords,
        }
    }
}

impl Config {
    /// Default config file path: `~/.interlink/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".interlink")
            .join("config.toml")
    }

    /// Load config from the default path, falling back to defaults if the file
    /// does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path())
    }

    /// Load config from an explicit path (falls back to defaults when missing).
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            let cfg: Config =
                toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
            Ok(cfg)
        } else {
            Ok(Config::default())
        }
    }

    /// Write the default config to `path`, creating the directory if needed.
    pub fn write_default_to(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(&Config::default()).context("serialising default config")?;
        std::fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.analysis.top_related, cfg.analysis.top_related);
        assert_eq!(parsed.fetch.timeout_secs, cfg.fetch.timeout_secs);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = Config::load_from(Path::new("/tmp/__interlink_nonexistent__")).unwrap();
        assert_eq!(cfg.analysis.top_related, 10);
        assert_eq!(cfg.analysis.top_keywords, 3);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[analysis]\ntop_related = 4\n").unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.analysis.params(), AnalysisParams { top_related: 4, top_keywords: 3 });
        assert_eq!(cfg.fetch.timeout_secs, 20);
    }

    #[test]
    fn write_default_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        Config::write_default_to(&path).unwrap();
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.fetch.user_agent, default_user_agent());
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[analysis\n").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.toml"));
    }
}
