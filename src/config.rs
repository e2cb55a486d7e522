use std::{collections::HashMap, path::PathBuf};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::Deserialize;

use crate::lotl::strategy::CountryFailureStrategy;

pub const DEFAULT_LOTL_URL: &str = "https://ec.europa.eu/tools/lotl/eu-lotl.xml";
pub const DEFAULT_JOURNAL_URI: &str =
    "https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=uriserv:OJ.C_.2019.276.01.0001.01.ENG";
/// Certificates published with `DEFAULT_JOURNAL_URI`, one PEM block each
pub const DEFAULT_EU_JOURNAL_CERTIFICATES: &str = "config/eu-journal.pem";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub lotl: LotlConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LotlConfig {
    pub url: String,
    /// Maximum age of a cached artifact, in milliseconds
    pub staleness_ms: i64,
    /// Refresh interval as a fraction of `staleness_ms`
    pub refresh_ratio: f64,
    #[serde(default)]
    pub include_countries: Vec<String>,
    #[serde(default)]
    pub exclude_countries: Vec<String>,
    /// Service type URIs to keep; empty keeps every service
    #[serde(default)]
    pub service_types: Vec<String>,
    pub failure_strategy: CountryFailureStrategy,
    /// PEM bundle with the certificates announced in the Official Journal
    #[serde(default)]
    pub eu_journal_certificates: Option<PathBuf>,
    pub current_journal_uri: String,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("lotl.url", DEFAULT_LOTL_URL)?
            .set_default("lotl.staleness_ms", 24 * 60 * 60 * 1000_i64)?
            .set_default("lotl.refresh_ratio", 0.7)?
            .set_default("lotl.failure_strategy", "ignore_with_info")?
            .set_default("lotl.current_journal_uri", DEFAULT_JOURNAL_URI)?
            .set_default("lotl.eu_journal_certificates", DEFAULT_EU_JOURNAL_CERTIFICATES)?
            .set_default("http.timeout_secs", 30)?
            .set_default("http.user_agent", concat!("lotl-trust/", env!("CARGO_PKG_VERSION")))?
            .add_source(File::with_name("config/settings").required(false));

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Should be in the format APP_LOTL__STALENESS_MS or APP_LOTL__INCLUDE_COUNTRIES=DE,FR
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("lotl.include_countries")
                    .with_list_parse_key("lotl.exclude_countries")
                    .with_list_parse_key("lotl.service_types"),
            );
        }

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::load_with_sources(Some(HashMap::new())).expect("Failed to load config");

        assert_eq!(config.lotl.url, DEFAULT_LOTL_URL);
        assert_eq!(config.lotl.staleness_ms, 86_400_000);
        assert!((config.lotl.refresh_ratio - 0.7).abs() < f64::EPSILON);
        assert_eq!(
            config.lotl.failure_strategy,
            CountryFailureStrategy::IgnoreWithInfo
        );
        assert!(config.lotl.include_countries.is_empty());
        assert_eq!(
            config.lotl.eu_journal_certificates,
            Some(PathBuf::from(DEFAULT_EU_JOURNAL_CERTIFICATES))
        );
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_env_config() {
        let mut env_vars = HashMap::new();
        env_vars.insert("lotl.staleness_ms".to_string(), "60000".to_string());
        env_vars.insert("lotl.failure_strategy".to_string(), "remove".to_string());
        env_vars.insert(
            "lotl.snapshot_path".to_string(),
            "/var/cache/lotl.json".to_string(),
        );
        env_vars.insert("http.timeout_secs".to_string(), "5".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.lotl.staleness_ms, 60_000);
        assert_eq!(config.lotl.failure_strategy, CountryFailureStrategy::Remove);
        assert_eq!(
            config.lotl.snapshot_path,
            Some(PathBuf::from("/var/cache/lotl.json"))
        );
        assert_eq!(config.http.timeout_secs, 5);
    }

    #[test]
    fn test_partial_env_override() {
        let mut env_vars = HashMap::new();
        env_vars.insert("lotl.url".to_string(), "http://localhost/lotl.xml".to_string());

        let config = Config::load_with_sources(Some(env_vars)).expect("Failed to load config");

        assert_eq!(config.lotl.url, "http://localhost/lotl.xml");
        // The other values should use default
        assert_eq!(config.lotl.current_journal_uri, DEFAULT_JOURNAL_URI);
        assert_eq!(config.http.timeout_secs, 30);
    }
}
