use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::errors::{LotlError, LotlResult};
use super::strategy::{CountryFailureStrategy, OnCountryFailure};
use crate::config::LotlConfig;

pub const DEFAULT_STALENESS_MS: i64 = 24 * 60 * 60 * 1000;
pub const DEFAULT_REFRESH_RATIO: f64 = 0.7;

type RefreshIntervalFn = dyn Fn(Duration) -> Duration + Send + Sync;

/// Settings shared by the fetchers, the cache and the refresh task.
#[derive(Clone)]
pub struct LotlFetchingProperties {
    staleness: Duration,
    refresh_interval: Arc<RefreshIntervalFn>,
    include_countries: BTreeSet<String>,
    exclude_countries: BTreeSet<String>,
    service_types: BTreeSet<String>,
    failure_strategy: Arc<dyn OnCountryFailure>,
}

impl LotlFetchingProperties {
    pub fn new(failure_strategy: Arc<dyn OnCountryFailure>) -> Self {
        Self {
            staleness: Duration::from_millis(DEFAULT_STALENESS_MS as u64),
            refresh_interval: ratio_interval(DEFAULT_REFRESH_RATIO),
            include_countries: BTreeSet::new(),
            exclude_countries: BTreeSet::new(),
            service_types: BTreeSet::new(),
            failure_strategy,
        }
    }

    /// Build from configuration, rejecting inconsistent settings.
    pub fn from_config(config: &LotlConfig) -> LotlResult<Self> {
        if config.refresh_ratio.is_nan() || config.refresh_ratio <= 0.0 {
            return Err(LotlError::InvalidConfiguration(format!(
                "refresh ratio must be positive, got {}",
                config.refresh_ratio
            )));
        }
        let properties = Self::new(Arc::new(config.failure_strategy))
            .with_staleness_ms(config.staleness_ms)?
            .with_refresh_interval(ratio_interval(config.refresh_ratio))
            .with_countries_to_include(config.include_countries.iter().cloned())?
            .with_countries_to_exclude(config.exclude_countries.iter().cloned())?
            .with_service_types(config.service_types.iter().cloned());
        Ok(properties)
    }

    pub fn with_staleness_ms(mut self, staleness_ms: i64) -> LotlResult<Self> {
        if staleness_ms <= 0 {
            return Err(LotlError::InvalidConfiguration(format!(
                "staleness must be positive, got {staleness_ms} ms"
            )));
        }
        self.staleness = Duration::from_millis(staleness_ms as u64);
        Ok(self)
    }

    pub fn with_refresh_interval(
        mut self,
        calculator: Arc<dyn Fn(Duration) -> Duration + Send + Sync>,
    ) -> Self {
        self.refresh_interval = calculator;
        self
    }

    /// Countries to fetch; mutually exclusive with an exclude list.
    pub fn with_countries_to_include(
        mut self,
        countries: impl IntoIterator<Item = String>,
    ) -> LotlResult<Self> {
        self.include_countries = normalize(countries);
        self.check_country_lists()?;
        Ok(self)
    }

    /// Countries to skip; mutually exclusive with an include list.
    pub fn with_countries_to_exclude(
        mut self,
        countries: impl IntoIterator<Item = String>,
    ) -> LotlResult<Self> {
        self.exclude_countries = normalize(countries);
        self.check_country_lists()?;
        Ok(self)
    }

    pub fn with_service_types(mut self, service_types: impl IntoIterator<Item = String>) -> Self {
        self.service_types = service_types.into_iter().collect();
        self
    }

    pub fn with_failure_strategy(mut self, strategy: Arc<dyn OnCountryFailure>) -> Self {
        self.failure_strategy = strategy;
        self
    }

    fn check_country_lists(&self) -> LotlResult<()> {
        if !self.include_countries.is_empty() && !self.exclude_countries.is_empty() {
            return Err(LotlError::InvalidConfiguration(
                "countries to include and countries to exclude cannot both be set".into(),
            ));
        }
        Ok(())
    }

    pub fn staleness(&self) -> Duration {
        self.staleness
    }

    pub fn refresh_interval(&self) -> Duration {
        (self.refresh_interval)(self.staleness)
    }

    pub fn failure_strategy(&self) -> &Arc<dyn OnCountryFailure> {
        &self.failure_strategy
    }

    /// Countries a snapshot must contain to be accepted
    pub fn required_countries(&self) -> &BTreeSet<String> {
        &self.include_countries
    }

    pub fn should_process_country(&self, scheme_territory: &str) -> bool {
        let territory = scheme_territory.to_uppercase();
        if !self.include_countries.is_empty() {
            return self.include_countries.contains(&territory);
        }
        !self.exclude_countries.contains(&territory)
    }

    pub fn service_types(&self) -> &BTreeSet<String> {
        &self.service_types
    }

    /// An empty service type set keeps every service
    pub fn should_process_service_type(&self, service_type: &str) -> bool {
        self.service_types.is_empty() || self.service_types.contains(service_type)
    }
}

impl Default for LotlFetchingProperties {
    fn default() -> Self {
        Self::new(Arc::new(CountryFailureStrategy::default()))
    }
}

impl fmt::Debug for LotlFetchingProperties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LotlFetchingProperties")
            .field("staleness", &self.staleness)
            .field("refresh_interval", &self.refresh_interval())
            .field("include_countries", &self.include_countries)
            .field("exclude_countries", &self.exclude_countries)
            .field("service_types", &self.service_types)
            .field("failure_strategy", &self.failure_strategy)
            .finish()
    }
}

fn ratio_interval(ratio: f64) -> Arc<RefreshIntervalFn> {
    Arc::new(move |staleness: Duration| staleness.mul_f64(ratio))
}

fn normalize(countries: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    countries
        .into_iter()
        .map(|country| country.trim().to_uppercase())
        .filter(|country| !country.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let properties = LotlFetchingProperties::default();
        assert_eq!(properties.staleness(), Duration::from_secs(24 * 60 * 60));
        assert_eq!(
            properties.refresh_interval(),
            Duration::from_secs(24 * 60 * 60).mul_f64(0.7)
        );
        assert!(properties.should_process_country("DE"));
        assert!(properties.should_process_service_type("anything"));
    }

    #[test]
    fn test_non_positive_staleness_is_rejected() {
        for staleness in [0, -1] {
            let err = LotlFetchingProperties::default()
                .with_staleness_ms(staleness)
                .unwrap_err();
            assert!(matches!(err, LotlError::InvalidConfiguration(_)));
        }
    }

    #[test]
    fn test_include_and_exclude_are_exclusive() {
        let err = LotlFetchingProperties::default()
            .with_countries_to_include(["DE".to_string()])
            .unwrap()
            .with_countries_to_exclude(["FR".to_string()])
            .unwrap_err();
        assert!(matches!(err, LotlError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_country_filters() {
        let include = LotlFetchingProperties::default()
            .with_countries_to_include(["de".to_string()])
            .unwrap();
        assert!(include.should_process_country("DE"));
        assert!(!include.should_process_country("FR"));

        let exclude = LotlFetchingProperties::default()
            .with_countries_to_exclude(["FR".to_string()])
            .unwrap();
        assert!(exclude.should_process_country("DE"));
        assert!(!exclude.should_process_country("fr"));
    }

    #[test]
    fn test_custom_refresh_interval() {
        let properties = LotlFetchingProperties::default()
            .with_staleness_ms(10_000)
            .unwrap()
            .with_refresh_interval(Arc::new(|staleness| staleness / 2));
        assert_eq!(properties.refresh_interval(), Duration::from_secs(5));
    }
}
