use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::{LotlError, LotlResult};
use super::fetcher::country::CountrySpecificLotlFetcherResult;
use crate::report::ReportItem;

pub const COUNTRY_FAILURE_CHECK: &str = "COUNTRY_SPECIFIC_LOTL_FAILURE";

/// What the owner of a failed country result should do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountryFailureAction {
    Keep,
    Remove,
}

/// Decides how a failed or stale country trusted list is handled.
pub trait OnCountryFailure: Send + Sync + Debug {
    fn on_country_failure(
        &self,
        result: &mut CountrySpecificLotlFetcherResult,
    ) -> LotlResult<CountryFailureAction>;
}

/// Built-in country failure strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountryFailureStrategy {
    /// Abort the operation with [`LotlError::CountryFailure`]
    Throw,
    /// Keep the result and record an INFO item
    #[default]
    IgnoreWithInfo,
    /// Drop the country's service contexts
    Remove,
}

impl OnCountryFailure for CountryFailureStrategy {
    fn on_country_failure(
        &self,
        result: &mut CountrySpecificLotlFetcherResult,
    ) -> LotlResult<CountryFailureAction> {
        let country = result.country().to_string();
        match self {
            CountryFailureStrategy::Throw => Err(LotlError::CountryFailure(country)),
            CountryFailureStrategy::IgnoreWithInfo => {
                warn!("Country trusted list {country} failed or is stale, keeping it");
                record_failure(result, format!("Country trusted list {country} failed or is stale"));
                Ok(CountryFailureAction::Keep)
            }
            CountryFailureStrategy::Remove => {
                warn!("Country trusted list {country} failed or is stale, removing it");
                result.set_contexts(Vec::new());
                record_failure(
                    result,
                    format!("Country trusted list {country} failed or is stale and was removed"),
                );
                Ok(CountryFailureAction::Remove)
            }
        }
    }
}

/// A result handled more than once carries a single failure item.
fn record_failure(result: &mut CountrySpecificLotlFetcherResult, message: String) {
    if !result.local_report().has_check(COUNTRY_FAILURE_CHECK) {
        result.add_report_item(ReportItem::info(COUNTRY_FAILURE_CHECK, message));
    }
}
