//! Cache of the fetch results the trusted-list pipeline works from.

pub mod in_memory;
pub mod snapshot;

use std::collections::BTreeMap;
use std::io::{Read, Write};

use super::errors::LotlResult;
use super::fetcher::{
    CountrySpecificLotlFetcherResult, EuropeanLotlFetcherResult, EuropeanResourceFetcherResult,
    PivotFetcherResult,
};

pub use in_memory::InMemoryLotlServiceCache;
pub use snapshot::LotlCacheDataV1;

pub const LOTL_KEY: &str = "LOTL";
pub const EUROPEAN_RESOURCE_KEY: &str = "EUROPEAN_RESOURCE";

/// Thread-safe store of the four fetch results, each tagged with the time
/// of its last update.
///
/// Singleton getters return `Ok(None)` for a cold entry and
/// [`LotlError::StaleData`](super::errors::LotlError::StaleData) for a stale
/// one. Country reads run the configured failure strategy on stale entries
/// instead.
pub trait LotlServiceCache: Send + Sync {
    fn set_all_values(
        &self,
        lotl: EuropeanLotlFetcherResult,
        european_resource: EuropeanResourceFetcherResult,
        pivot: PivotFetcherResult,
        countries: BTreeMap<String, CountrySpecificLotlFetcherResult>,
    );

    fn get_lotl_result(&self) -> LotlResult<Option<EuropeanLotlFetcherResult>>;

    fn set_lotl_result(&self, result: EuropeanLotlFetcherResult);

    fn get_european_resource_result(&self) -> LotlResult<Option<EuropeanResourceFetcherResult>>;

    fn set_european_resource_result(&self, result: EuropeanResourceFetcherResult);

    fn get_pivot_result(&self) -> LotlResult<Option<PivotFetcherResult>>;

    fn set_pivot_result(&self, result: PivotFetcherResult);

    fn get_country_specific_lotls(&self) -> LotlResult<Vec<CountrySpecificLotlFetcherResult>>;

    fn set_country_specific_lotl_result(&self, result: CountrySpecificLotlFetcherResult);

    fn is_object_stale(&self, key: &str) -> bool;

    /// Write the whole cache as a [`LotlCacheDataV1`] JSON document.
    fn serialize(&self, writer: &mut dyn Write) -> LotlResult<()>;

    /// Merge a snapshot written by [`serialize`](Self::serialize). All or nothing.
    fn deserialize_and_merge(&self, reader: &mut dyn Read) -> LotlResult<()>;
}
