use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::snapshot::LotlCacheDataV1;
use super::{EUROPEAN_RESOURCE_KEY, LOTL_KEY, LotlServiceCache};
use crate::lotl::errors::{LotlError, LotlResult};
use crate::lotl::fetcher::{
    CountrySpecificLotlFetcherResult, EuropeanLotlFetcherResult, EuropeanResourceFetcherResult,
    PivotFetcherResult,
};
use crate::lotl::properties::LotlFetchingProperties;
use crate::lotl::strategy::CountryFailureAction;

#[derive(Debug, Default)]
struct CacheState {
    lotl: Option<EuropeanLotlFetcherResult>,
    european_resource: Option<EuropeanResourceFetcherResult>,
    pivot: Option<PivotFetcherResult>,
    countries: BTreeMap<String, CountrySpecificLotlFetcherResult>,
    timestamps: BTreeMap<String, i64>,
}

impl CacheState {
    fn is_stale(&self, key: &str, now: i64, max_staleness_ms: i64) -> bool {
        self.timestamps
            .get(key)
            .is_none_or(|timestamp| now - timestamp > max_staleness_ms)
    }

    fn replace_pivot(&mut self, pivot: PivotFetcherResult, timestamp: i64) {
        if let Some(previous) = self.pivot.take() {
            self.timestamps.remove(&previous.cache_key());
        }
        self.timestamps.insert(pivot.cache_key(), timestamp);
        self.pivot = Some(pivot);
    }

    fn pivot_timestamp(&self) -> Option<i64> {
        let key = self.pivot.as_ref()?.cache_key();
        self.timestamps.get(&key).copied()
    }
}

/// [`LotlServiceCache`] guarded by a single mutex.
#[derive(Debug)]
pub struct InMemoryLotlServiceCache {
    state: Mutex<CacheState>,
    max_staleness_ms: i64,
    properties: LotlFetchingProperties,
}

impl InMemoryLotlServiceCache {
    pub fn new(properties: LotlFetchingProperties) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            max_staleness_ms: properties.staleness().as_millis() as i64,
            properties,
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn ensure_fresh(&self, state: &CacheState, key: &str, what: &str) -> LotlResult<()> {
        if state.is_stale(key, Self::now(), self.max_staleness_ms) {
            warn!("Cached {what} is stale");
            return Err(LotlError::StaleData(what.to_string()));
        }
        Ok(())
    }
}

impl LotlServiceCache for InMemoryLotlServiceCache {
    fn set_all_values(
        &self,
        lotl: EuropeanLotlFetcherResult,
        european_resource: EuropeanResourceFetcherResult,
        pivot: PivotFetcherResult,
        countries: BTreeMap<String, CountrySpecificLotlFetcherResult>,
    ) {
        let now = Self::now();
        let mut timestamps = BTreeMap::from([
            (LOTL_KEY.to_string(), now),
            (EUROPEAN_RESOURCE_KEY.to_string(), now),
            (pivot.cache_key(), now),
        ]);
        timestamps.extend(countries.keys().map(|key| (key.clone(), now)));

        let mut state = self.state();
        *state = CacheState {
            lotl: Some(lotl),
            european_resource: Some(european_resource),
            pivot: Some(pivot),
            countries,
            timestamps,
        };
        info!("Cache replaced with {} country results", state.countries.len());
    }

    fn get_lotl_result(&self) -> LotlResult<Option<EuropeanLotlFetcherResult>> {
        let state = self.state();
        if state.lotl.is_none() {
            return Ok(None);
        }
        self.ensure_fresh(&state, LOTL_KEY, "main LOTL")?;
        Ok(state.lotl.clone())
    }

    fn set_lotl_result(&self, result: EuropeanLotlFetcherResult) {
        let mut state = self.state();
        state.timestamps.insert(LOTL_KEY.to_string(), Self::now());
        state.lotl = Some(result);
    }

    fn get_european_resource_result(&self) -> LotlResult<Option<EuropeanResourceFetcherResult>> {
        let state = self.state();
        if state.european_resource.is_none() {
            return Ok(None);
        }
        self.ensure_fresh(&state, EUROPEAN_RESOURCE_KEY, "EU journal certificates")?;
        Ok(state.european_resource.clone())
    }

    fn set_european_resource_result(&self, result: EuropeanResourceFetcherResult) {
        let mut state = self.state();
        state
            .timestamps
            .insert(EUROPEAN_RESOURCE_KEY.to_string(), Self::now());
        state.european_resource = Some(result);
    }

    fn get_pivot_result(&self) -> LotlResult<Option<PivotFetcherResult>> {
        let state = self.state();
        let Some(pivot) = state.pivot.as_ref() else {
            return Ok(None);
        };
        self.ensure_fresh(&state, &pivot.cache_key(), "pivot result")?;
        Ok(Some(pivot.clone()))
    }

    fn set_pivot_result(&self, result: PivotFetcherResult) {
        self.state().replace_pivot(result, Self::now());
    }

    fn get_country_specific_lotls(&self) -> LotlResult<Vec<CountrySpecificLotlFetcherResult>> {
        let now = Self::now();
        let mut state = self.state();
        let keys: Vec<String> = state.countries.keys().cloned().collect();

        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let stale = state.is_stale(&key, now, self.max_staleness_ms);
            let Some(result) = state.countries.get_mut(&key) else {
                continue;
            };
            if !stale {
                results.push(result.clone());
                continue;
            }

            debug!("Country result {key} is stale");
            let action = self
                .properties
                .failure_strategy()
                .on_country_failure(result)?;
            match action {
                CountryFailureAction::Keep => results.push(result.clone()),
                CountryFailureAction::Remove => {
                    if let Some(removed) = state.countries.remove(&key) {
                        results.push(removed);
                    }
                    state.timestamps.remove(&key);
                }
            }
        }
        Ok(results)
    }

    fn set_country_specific_lotl_result(&self, result: CountrySpecificLotlFetcherResult) {
        let mut state = self.state();
        let key = result.unique_id();
        state.timestamps.insert(key.clone(), Self::now());
        state.countries.insert(key, result);
    }

    fn is_object_stale(&self, key: &str) -> bool {
        self.state().is_stale(key, Self::now(), self.max_staleness_ms)
    }

    fn serialize(&self, writer: &mut dyn Write) -> LotlResult<()> {
        let data = {
            let state = self.state();
            LotlCacheDataV1 {
                lotl_cache: state.lotl.clone(),
                european_resource_fetcher_cache: state.european_resource.clone(),
                pivot_cache: state.pivot.clone(),
                country_specific_lotl_cache: Some(state.countries.clone()),
                time_stamps: state.timestamps.clone(),
            }
        };
        serde_json::to_writer_pretty(writer, &data)?;
        Ok(())
    }

    fn deserialize_and_merge(&self, reader: &mut dyn Read) -> LotlResult<()> {
        let data: LotlCacheDataV1 = serde_json::from_reader(reader)?;
        let parts = data.into_parts(self.properties.required_countries())?;

        let mut state = self.state();
        let not_newer = |existing: Option<i64>, incoming: i64| existing.is_some_and(|ts| incoming <= ts);

        if not_newer(state.timestamps.get(LOTL_KEY).copied(), parts.lotl.1) {
            return Err(LotlError::InvalidSnapshot("main LOTL is not newer than the cached one".into()));
        }
        if not_newer(
            state.timestamps.get(EUROPEAN_RESOURCE_KEY).copied(),
            parts.european_resource.1,
        ) {
            return Err(LotlError::InvalidSnapshot(
                "EU journal certificates are not newer than the cached ones".into(),
            ));
        }
        if not_newer(state.pivot_timestamp(), parts.pivot.1) {
            return Err(LotlError::InvalidSnapshot("pivot result is not newer than the cached one".into()));
        }
        for (key, (_, timestamp)) in &parts.countries {
            if not_newer(state.timestamps.get(key).copied(), *timestamp) {
                return Err(LotlError::InvalidSnapshot(format!(
                    "country result {key} is not newer than the cached one"
                )));
            }
        }

        let (lotl, lotl_ts) = parts.lotl;
        let (european_resource, european_resource_ts) = parts.european_resource;
        let (pivot, pivot_ts) = parts.pivot;
        state.lotl = Some(lotl);
        state.timestamps.insert(LOTL_KEY.to_string(), lotl_ts);
        state.european_resource = Some(european_resource);
        state
            .timestamps
            .insert(EUROPEAN_RESOURCE_KEY.to_string(), european_resource_ts);
        state.replace_pivot(pivot, pivot_ts);
        let country_count = parts.countries.len();
        for (key, (result, timestamp)) in parts.countries {
            state.timestamps.insert(key.clone(), timestamp);
            state.countries.insert(key, result);
        }
        info!("Merged cache snapshot with {country_count} country results");
        Ok(())
    }
}
