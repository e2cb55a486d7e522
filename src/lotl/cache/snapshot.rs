use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{EUROPEAN_RESOURCE_KEY, LOTL_KEY};
use crate::lotl::errors::{LotlError, LotlResult};
use crate::lotl::fetcher::{
    CountrySpecificLotlFetcherResult, EuropeanLotlFetcherResult, EuropeanResourceFetcherResult,
    PivotFetcherResult,
};

/// Version 1 of the persisted cache. A change of the wire shape gets a new
/// versioned type instead of changing this one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotlCacheDataV1 {
    #[serde(default)]
    pub lotl_cache: Option<EuropeanLotlFetcherResult>,
    #[serde(default)]
    pub european_resource_fetcher_cache: Option<EuropeanResourceFetcherResult>,
    #[serde(default)]
    pub pivot_cache: Option<PivotFetcherResult>,
    #[serde(default)]
    pub country_specific_lotl_cache: Option<BTreeMap<String, CountrySpecificLotlFetcherResult>>,
    /// Epoch milliseconds of the last update, by cache key
    #[serde(default)]
    pub time_stamps: BTreeMap<String, i64>,
}

/// A snapshot that passed the completeness checks.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotParts {
    pub lotl: (EuropeanLotlFetcherResult, i64),
    pub european_resource: (EuropeanResourceFetcherResult, i64),
    pub pivot: (PivotFetcherResult, i64),
    pub countries: BTreeMap<String, (CountrySpecificLotlFetcherResult, i64)>,
}

impl LotlCacheDataV1 {
    /// Check that every category, every timestamp and every required
    /// country is present.
    pub(crate) fn into_parts(self, required_countries: &BTreeSet<String>) -> LotlResult<SnapshotParts> {
        let lotl = self.lotl_cache.ok_or_else(|| missing("lotlCache"))?;
        let european_resource = self
            .european_resource_fetcher_cache
            .ok_or_else(|| missing("europeanResourceFetcherCache"))?;
        let pivot = self.pivot_cache.ok_or_else(|| missing("pivotCache"))?;
        let countries = self
            .country_specific_lotl_cache
            .ok_or_else(|| missing("countrySpecificLotlCache"))?;

        for required in required_countries {
            let present = countries
                .values()
                .any(|result| result.country().scheme_territory().eq_ignore_ascii_case(required));
            if !present {
                return Err(LotlError::InvalidSnapshot(format!(
                    "required country {required} is missing"
                )));
            }
        }

        let timestamp = |key: &str| {
            self.time_stamps.get(key).copied().ok_or_else(|| {
                LotlError::InvalidSnapshot(format!("no timestamp for {key}"))
            })
        };

        let pivot_timestamp = timestamp(&pivot.cache_key())?;
        let mut country_parts = BTreeMap::new();
        for (key, result) in countries {
            let ts = timestamp(&key)?;
            country_parts.insert(key, (result, ts));
        }

        Ok(SnapshotParts {
            lotl: (lotl, timestamp(LOTL_KEY)?),
            european_resource: (european_resource, timestamp(EUROPEAN_RESOURCE_KEY)?),
            pivot: (pivot, pivot_timestamp),
            countries: country_parts,
        })
    }
}

fn missing(category: &str) -> LotlError {
    LotlError::InvalidSnapshot(format!("{category} is missing"))
}
