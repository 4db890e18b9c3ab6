//! Typed configuration loaded from a YAML file.
//!
//! Every recognised option is listed here with its default. Only the
//! `sources` map and the names in `selection.primary_pools` have no useful
//! default; [`Settings::validate`] checks that they line up.
//!
//! ```yaml
//! news:
//!   age_limit_days: 3
//! selection:
//!   primary_pools: [TravelLinks, NewsLinks]
//! sources:
//!   TravelLinks:
//!     url: https://travel.example.com/rss
//!     endpoints: [spain, italy]
//! fallback:
//!   url: https://news.example.com/travel
//! ```

use crate::error::ConfigError;
use crate::models::{NamedSource, SourcePool};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub news: NewsSettings,
    pub fetch: FetchSettings,
    pub selection: SelectionSettings,
    pub sources: BTreeMap<String, SourceSettings>,
    pub rss: RssSettings,
    pub fallback: FallbackSettings,
    pub state: StateSettings,
    pub image: ImageSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    /// Optional plain-text log file next to stdout output.
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSettings {
    /// Items this many whole days old or older are stale.
    pub age_limit_days: i64,
}

impl Default for NewsSettings {
    fn default() -> Self {
        Self { age_limit_days: 3 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self { timeout_secs: 60 }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectionSettings {
    /// Pools tried in order, each with a budget equal to its endpoint count.
    pub primary_pools: Vec<String>,
    /// Fixed seed for replayable selection.
    pub seed: Option<u64>,
}

impl Default for SelectionSettings {
    fn default() -> Self {
        Self {
            primary_pools: vec!["TravelLinks".to_string(), "NewsLinks".to_string()],
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    pub url: String,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RssSettings {
    /// CSS selector of the lead image on an article page.
    pub image_selector: String,
}

impl Default for RssSettings {
    fn default() -> Self {
        Self {
            image_selector: ".landmark-info__head-img".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackSettings {
    pub url: Option<String>,
    /// Pause before every page request against the scraped site.
    pub request_delay_secs: u64,
    pub selectors: HtmlSelectors,
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            url: None,
            request_delay_secs: 3,
            selectors: HtmlSelectors::default(),
        }
    }
}

impl FallbackSettings {
    pub fn request_delay(&self) -> Duration {
        Duration::from_secs(self.request_delay_secs)
    }
}

/// DOM contract of the scraped fallback page. Versioned by editing config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HtmlSelectors {
    pub container: String,
    pub block: String,
    pub title: String,
    pub image: String,
    pub link: String,
    pub description: String,
    pub paragraph: String,
    pub date_container: String,
    pub time: String,
}

impl Default for HtmlSelectors {
    fn default() -> Self {
        Self {
            container: "div.H6jWj.commercial-branding".to_string(),
            block: "div.VxecQ[data-travel_media-desktop^='top_news_block']".to_string(),
            title: "div.NS1jn > div.PtPn1".to_string(),
            image: "div.Q0hlD img.PNvWC".to_string(),
            link: "a.dnRo0".to_string(),
            description: "div.WSusQ.fontSize_0".to_string(),
            paragraph: "p".to_string(),
            date_container: "div.kqSy_".to_string(),
            time: "time[datetime]".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub path: PathBuf,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("last_news.json"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub dir: PathBuf,
    pub stem: String,
    pub default_extension: String,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            stem: "image_temp".to_string(),
            default_extension: "jpg".to_string(),
        }
    }
}

impl Settings {
    /// Read and validate a YAML config file.
    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml(&raw)?;
        debug!(
            sources = settings.sources.len(),
            pools = ?settings.selection.primary_pools,
            "Loaded configuration"
        );
        Ok(settings)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_yaml::from_str(raw)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Every primary pool must name a defined source that has endpoints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.selection.primary_pools.is_empty() {
            return Err(ConfigError::NoPrimaryPool);
        }
        for name in &self.selection.primary_pools {
            if self.section_links(name)?.is_empty() {
                return Err(ConfigError::EmptyPool(name.clone()));
            }
        }
        Ok(())
    }

    pub fn news_age_limit_days(&self) -> i64 {
        self.news.age_limit_days
    }

    pub fn sources(&self) -> Vec<NamedSource> {
        self.sources
            .iter()
            .map(|(name, s)| NamedSource {
                name: name.clone(),
                base_url: s.url.clone(),
                endpoints: s.endpoints.clone(),
            })
            .collect()
    }

    pub fn section_links(&self, name: &str) -> Result<&[String], ConfigError> {
        self.sources
            .get(name)
            .map(|s| s.endpoints.as_slice())
            .ok_or_else(|| ConfigError::UnknownSource(name.to_string()))
    }

    /// Resolve `selection.primary_pools` into source pools, in order.
    pub fn primary_pools(&self) -> Result<Vec<SourcePool>, ConfigError> {
        self.selection
            .primary_pools
            .iter()
            .map(|name| {
                let source = self
                    .sources
                    .get(name)
                    .ok_or_else(|| ConfigError::UnknownSource(name.clone()))?;
                Ok(SourcePool {
                    name: name.clone(),
                    sources: vec![NamedSource {
                        name: name.clone(),
                        base_url: source.url.clone(),
                        endpoints: source.endpoints.clone(),
                    }],
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
news:
  age_limit_days: 2
selection:
  primary_pools: [TravelLinks]
  seed: 7
sources:
  TravelLinks:
    url: https://travel.example.com/rss/
    endpoints: [spain, /italy]
fallback:
  url: https://news.example.com/travel
  request_delay_secs: 0
"#;

    #[test]
    fn test_parse_sample() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();
        assert_eq!(settings.news_age_limit_days(), 2);
        assert_eq!(settings.selection.seed, Some(7));
        assert_eq!(settings.section_links("TravelLinks").unwrap().len(), 2);
        assert_eq!(settings.fallback.request_delay(), Duration::ZERO);
        assert_eq!(
            settings.fallback.url.as_deref(),
            Some("https://news.example.com/travel")
        );
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let settings = Settings::from_yaml(SAMPLE).unwrap();
        assert_eq!(settings.fetch.timeout(), Duration::from_secs(60));
        assert_eq!(settings.state.path, PathBuf::from("last_news.json"));
        assert_eq!(settings.image.stem, "image_temp");
        assert_eq!(settings.rss.image_selector, ".landmark-info__head-img");
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.fallback.selectors.link, "a.dnRo0");
    }

    #[test]
    fn test_fallback_delay_defaults_to_three_seconds() {
        let yaml = r#"
sources:
  TravelLinks: { url: "https://t.example", endpoints: [a] }
  NewsLinks: { url: "https://n.example", endpoints: [b] }
fallback:
  url: https://news.example.com/travel
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.fallback.request_delay_secs, 3);
        assert_eq!(settings.fallback.request_delay(), Duration::from_secs(3));
        assert_eq!(FallbackSettings::default().request_delay(), Duration::from_secs(3));
    }

    #[test]
    fn test_primary_pools_in_order() {
        let yaml = r#"
selection:
  primary_pools: [NewsLinks, TravelLinks]
sources:
  TravelLinks: { url: "https://t.example", endpoints: [a, b] }
  NewsLinks: { url: "https://n.example", endpoints: [c] }
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        let pools = settings.primary_pools().unwrap();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0].name, "NewsLinks");
        assert_eq!(pools[0].size(), 1);
        assert_eq!(pools[1].size(), 2);
        assert_eq!(settings.sources().len(), 2);
    }

    #[test]
    fn test_unknown_pool_is_rejected() {
        let yaml = r#"
selection:
  primary_pools: [Missing]
sources:
  TravelLinks: { url: "https://t.example", endpoints: [a] }
"#;
        assert!(matches!(
            Settings::from_yaml(yaml),
            Err(ConfigError::UnknownSource(name)) if name == "Missing"
        ));
    }

    #[test]
    fn test_pool_without_endpoints_is_rejected() {
        let yaml = r#"
selection:
  primary_pools: [TravelLinks]
sources:
  TravelLinks: { url: "https://t.example" }
"#;
        assert!(matches!(
            Settings::from_yaml(yaml),
            Err(ConfigError::EmptyPool(_))
        ));
    }

    #[test]
    fn test_empty_primary_pool_list_is_rejected() {
        let yaml = r#"
selection:
  primary_pools: []
"#;
        assert!(matches!(
            Settings::from_yaml(yaml),
            Err(ConfigError::NoPrimaryPool)
        ));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            Settings::from_yaml("news: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_example_config_is_valid() {
        let settings = Settings::from_yaml(include_str!("../config.example.yaml")).unwrap();
        assert_eq!(settings.primary_pools().unwrap().len(), 2);
        assert_eq!(settings.fallback.request_delay(), Duration::from_secs(3));
        assert_eq!(settings.logging.file_path, Some(PathBuf::from("console.log")));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Settings::load(Path::new("/definitely/not/here.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
