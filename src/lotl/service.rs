use std::io::{Read, Write};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::adapters::{
    EnvelopedSignatureVerifier, HttpResourceRetriever, ResourceRetriever, XmlSignatureVerifier,
};
use crate::config::Config;
use crate::lotl::cache::{InMemoryLotlServiceCache, LotlServiceCache};
use crate::lotl::errors::{LotlError, LotlResult};
use crate::lotl::fetcher::{
    CountrySpecificLotlFetcher, CountrySpecificLotlFetcherResult, EuropeanLotlFetcher,
    EuropeanLotlFetcherResult, EuropeanResourceFetcher, EuropeanResourceFetcherResult,
    PivotFetcher, PivotFetcherResult,
};
use crate::lotl::properties::LotlFetchingProperties;
use crate::lotl::signature_validator::XmlSignatureValidator;
use crate::report::ValidationReport;

const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Orchestrates the fetchers and the cache of the trusted-list pipeline.
///
/// Build one per process and share it behind an [`Arc`].
pub struct LotlService {
    cache: Arc<dyn LotlServiceCache>,
    lotl_fetcher: EuropeanLotlFetcher,
    european_resource_fetcher: EuropeanResourceFetcher,
    pivot_fetcher: PivotFetcher,
    country_fetcher: CountrySpecificLotlFetcher,
    properties: LotlFetchingProperties,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl LotlService {
    /// Create a new service backed by an [`InMemoryLotlServiceCache`]
    pub fn new(
        retriever: Arc<dyn ResourceRetriever>,
        verifier: Arc<dyn XmlSignatureVerifier>,
        lotl_url: impl Into<String>,
        european_resource_fetcher: EuropeanResourceFetcher,
        properties: LotlFetchingProperties,
    ) -> Self {
        let validator = XmlSignatureValidator::new(verifier);
        Self {
            cache: Arc::new(InMemoryLotlServiceCache::new(properties.clone())),
            lotl_fetcher: EuropeanLotlFetcher::new(retriever.clone(), lotl_url),
            european_resource_fetcher,
            pivot_fetcher: PivotFetcher::new(retriever.clone(), validator.clone()),
            country_fetcher: CountrySpecificLotlFetcher::new(retriever, validator, properties.clone()),
            properties,
            refresh_task: Mutex::new(None),
        }
    }

    /// Create a new service with the HTTP retriever and the enveloped
    /// signature verifier
    pub fn from_config(config: &Config) -> LotlResult<Self> {
        let properties = LotlFetchingProperties::from_config(&config.lotl)?;
        let retriever = HttpResourceRetriever::new(&config.http)?;
        let european_resource_fetcher = EuropeanResourceFetcher::from_pem_file(
            config.lotl.eu_journal_certificates.clone(),
            config.lotl.current_journal_uri.clone(),
        );
        Ok(Self::new(
            Arc::new(retriever),
            Arc::new(EnvelopedSignatureVerifier::new()),
            config.lotl.url.clone(),
            european_resource_fetcher,
            properties,
        ))
    }

    pub fn with_cache(mut self, cache: Arc<dyn LotlServiceCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<dyn LotlServiceCache> {
        &self.cache
    }

    pub fn properties(&self) -> &LotlFetchingProperties {
        &self.properties
    }

    /// Fill the cache from a snapshot when one is given, from the network
    /// otherwise.
    ///
    /// The network bootstrap stops at a failed main LOTL or pivot chain.
    pub async fn initialize_cache(&self, snapshot: Option<&mut (dyn Read + Send)>) -> LotlResult<()> {
        if let Some(reader) = snapshot {
            info!("Initializing trusted-list cache from snapshot");
            return self.cache.deserialize_and_merge(reader);
        }

        info!("Initializing trusted-list cache from the network");
        let lotl = self.lotl_fetcher.fetch().await;
        if lotl.has_failed() {
            return Err(stage_failure("main LOTL", lotl.local_report()));
        }
        let european_resource = self.european_resource_fetcher.fetch().await;
        let pivot = self.fetch_pivot(&lotl, &european_resource).await;
        if pivot.has_failed() {
            return Err(stage_failure("pivot chain", pivot.local_report()));
        }
        let countries = self.country_fetcher.fetch(lotl.lotl_xml()).await?;
        self.cache
            .set_all_values(lotl, european_resource, pivot, countries);
        Ok(())
    }

    /// One refresh cycle. Returns whether the cache was replaced.
    ///
    /// Everything is fetched before the cache is touched, a failed stage
    /// leaves the current content in place.
    pub async fn try_and_refresh_cache(&self) -> LotlResult<bool> {
        let european_resource = self.european_resource_fetcher.fetch().await;
        if european_resource.has_failed() {
            warn!(
                "EU journal certificates unavailable, skipping refresh: {}",
                european_resource.local_report()
            );
            return Ok(false);
        }

        let lotl = self.lotl_fetcher.fetch().await;
        if lotl.has_failed() {
            warn!("Main LOTL unavailable, skipping refresh: {}", lotl.local_report());
            return Ok(false);
        }

        let pivot = self.fetch_pivot(&lotl, &european_resource).await;
        if pivot.has_failed() {
            warn!("Pivot chain invalid, skipping refresh: {}", pivot.local_report());
            return Ok(false);
        }

        let countries = self.country_fetcher.fetch(lotl.lotl_xml()).await?;
        self.cache
            .set_all_values(lotl, european_resource, pivot, countries);
        Ok(true)
    }

    /// Spawn the periodic refresh. A running task is replaced.
    ///
    /// The task holds a weak reference and ends once the service is gone.
    pub fn start_refresh_task(self: &Arc<Self>) {
        let period = self.properties.refresh_interval().max(MIN_REFRESH_INTERVAL);
        let service = Arc::downgrade(self);
        debug!("Starting trusted-list refresh every {period:?}");

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.tick().await; // First tick completes immediately

            loop {
                ticker.tick().await;
                let Some(service) = service.upgrade() else {
                    break;
                };
                match service.try_and_refresh_cache().await {
                    Ok(true) => info!("Trusted-list cache refreshed"),
                    Ok(false) => warn!("Trusted-list refresh skipped, keeping cached data"),
                    Err(e) => error!("Trusted-list refresh failed: {e}"),
                }
            }
        });

        let mut task = self.refresh_task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
    }

    /// Stop the refresh task if one is running
    pub fn close(&self) {
        let mut task = self.refresh_task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = task.take() {
            debug!("Stopping trusted-list refresh");
            handle.abort();
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresh_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Write the cache as a JSON snapshot
    pub fn write_snapshot(&self, writer: &mut dyn Write) -> LotlResult<()> {
        self.cache.serialize(writer)
    }

    pub async fn get_lotl_result(&self) -> LotlResult<EuropeanLotlFetcherResult> {
        if let Some(result) = self.cache.get_lotl_result()? {
            return Ok(result);
        }
        let result = self.lotl_fetcher.fetch().await;
        self.cache.set_lotl_result(result.clone());
        Ok(result)
    }

    pub async fn get_european_resource_result(&self) -> LotlResult<EuropeanResourceFetcherResult> {
        if let Some(result) = self.cache.get_european_resource_result()? {
            return Ok(result);
        }
        let result = self.european_resource_fetcher.fetch().await;
        self.cache.set_european_resource_result(result.clone());
        Ok(result)
    }

    pub async fn get_pivot_result(&self) -> LotlResult<PivotFetcherResult> {
        if let Some(result) = self.cache.get_pivot_result()? {
            return Ok(result);
        }
        let lotl = self.get_lotl_result().await?;
        let european_resource = self.get_european_resource_result().await?;
        let result = self.fetch_pivot(&lotl, &european_resource).await;
        self.cache.set_pivot_result(result.clone());
        Ok(result)
    }

    pub async fn get_country_specific_lotls(&self) -> LotlResult<Vec<CountrySpecificLotlFetcherResult>> {
        let cached = self.cache.get_country_specific_lotls()?;
        if !cached.is_empty() {
            return Ok(cached);
        }
        let lotl = self.get_lotl_result().await?;
        let results = self.country_fetcher.fetch(lotl.lotl_xml()).await?;
        for result in results.values() {
            self.cache.set_country_specific_lotl_result(result.clone());
        }
        Ok(results.into_values().collect())
    }

    async fn fetch_pivot(
        &self,
        lotl: &EuropeanLotlFetcherResult,
        european_resource: &EuropeanResourceFetcherResult,
    ) -> PivotFetcherResult {
        self.pivot_fetcher
            .fetch(
                lotl.lotl_xml(),
                european_resource.certificates(),
                european_resource.current_journal_uri(),
            )
            .await
    }
}

impl Drop for LotlService {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for LotlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LotlService")
            .field("lotl_url", &self.lotl_fetcher.url())
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

fn stage_failure(stage: &str, report: &ValidationReport) -> LotlError {
    let reason = report
        .failures()
        .next()
        .map(|item| item.to_string())
        .unwrap_or_else(|| "no result".to_string());
    error!("Fetching {stage} failed: {reason}");
    LotlError::FetchFailed {
        stage: stage.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lotl::testing::{self, MapRetriever};
    use crate::lotl::uris;
    use crate::pki::Certificate;

    use crate::lotl::testing::{JOURNAL_URI, LOTL_URL};

    const DE: &str = "https://tl.example/de.xml";

    struct Setup {
        journal_signer: Certificate,
        retriever: MapRetriever,
    }

    fn setup() -> Setup {
        let journal_signer = testing::certificate("journal signer");
        let de_signer = testing::certificate("DE signer");
        let service = testing::certificate("DE CA");
        let lotl = testing::lotl_document(
            &[JOURNAL_URI],
            &[("DE", DE, &de_signer)],
            Some((&journal_signer, true)),
        );
        let de = testing::country_document(
            &[testing::service(uris::SVC_TYPE_CA_QC, uris::STATUS_GRANTED, &service)],
            Some((&de_signer, true)),
        );
        let retriever = MapRetriever::new()
            .with(LOTL_URL, lotl.as_bytes())
            .with(DE, de.as_bytes());
        Setup {
            journal_signer,
            retriever,
        }
    }

    fn service(retriever: MapRetriever, journal_signer: Certificate) -> LotlService {
        testing::lotl_service(retriever, &journal_signer, LotlFetchingProperties::default())
    }

    #[tokio::test]
    async fn test_network_bootstrap() {
        let Setup {
            journal_signer,
            retriever,
        } = setup();
        let service = service(retriever, journal_signer);
        service.initialize_cache(None).await.unwrap();

        assert!(!service.get_pivot_result().await.unwrap().has_failed());
        let countries = service.get_country_specific_lotls().await.unwrap();
        assert_eq!(countries.len(), 1);
        assert_eq!(countries[0].contexts().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_aborts_on_missing_lotl() {
        let service = service(MapRetriever::new(), testing::certificate("journal signer"));
        let err = service.initialize_cache(None).await.unwrap_err();
        assert!(matches!(err, LotlError::FetchFailed { ref stage, .. } if stage == "main LOTL"));
        assert!(service.cache().get_lotl_result().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_aborts_on_untrusted_lotl() {
        let Setup { retriever, .. } = setup();
        let service = service(retriever, testing::certificate("another journal signer"));
        let err = service.initialize_cache(None).await.unwrap_err();
        assert!(matches!(err, LotlError::FetchFailed { ref stage, .. } if stage == "pivot chain"));
        assert!(service.cache().get_country_specific_lotls().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_cache() {
        let Setup {
            journal_signer,
            retriever,
        } = setup();
        let online = service(retriever, journal_signer.clone());
        online.initialize_cache(None).await.unwrap();
        let mut snapshot = Vec::new();
        online.write_snapshot(&mut snapshot).unwrap();

        let offline = service(MapRetriever::new(), journal_signer);
        let reader: &mut (dyn Read + Send) = &mut snapshot.as_slice();
        offline.initialize_cache(Some(reader)).await.unwrap();

        assert!(!offline.try_and_refresh_cache().await.unwrap());
        assert_eq!(
            offline.get_lotl_result().await.unwrap(),
            online.get_lotl_result().await.unwrap()
        );
        assert_eq!(offline.get_country_specific_lotls().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_cache() {
        let Setup {
            journal_signer,
            retriever,
        } = setup();
        let service = service(retriever, journal_signer);
        assert!(service.try_and_refresh_cache().await.unwrap());
        assert!(!service.cache().is_object_stale(crate::lotl::cache::LOTL_KEY));
    }

    #[tokio::test]
    async fn test_getters_fetch_on_cold_cache() {
        let Setup {
            journal_signer,
            retriever,
        } = setup();
        let service = service(retriever, journal_signer);
        let pivot = service.get_pivot_result().await.unwrap();
        assert!(!pivot.has_failed());
        assert!(service.cache().get_lotl_result().unwrap().is_some());
        assert!(service.cache().get_european_resource_result().unwrap().is_some());
    }

    #[tokio::test]
    async fn test_refresh_task_lifecycle() {
        let Setup {
            journal_signer,
            retriever,
        } = setup();
        let service = Arc::new(service(retriever, journal_signer));
        service.start_refresh_task();
        assert!(service.is_refreshing());
        service.close();
        assert!(!service.is_refreshing());
    }
}
