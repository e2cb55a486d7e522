use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::adapters::ResourceRetriever;
use crate::lotl::context::ServiceContext;
use crate::lotl::country_lotl::CountrySpecificLotl;
use crate::lotl::errors::LotlResult;
use crate::lotl::properties::LotlFetchingProperties;
use crate::lotl::signature_validator::{XML_SIGNATURE_INVALID, XmlSignatureValidator};
use crate::lotl::xml::{self, CountryServiceHandler, DefaultCertificateHandler, PointersHandler};
use crate::pki::TrustedCertificatesStore;
use crate::report::{ReportItem, ValidationReport};

pub const COULD_NOT_RESOLVE_URL: &str = "COULD_NOT_RESOLVE_URL";
pub const COUNTRY_PARSE_FAILURE: &str = "COUNTRY_SPECIFIC_LOTL_PARSING";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySpecificLotlFetcherResult {
    country: CountrySpecificLotl,
    contexts: Vec<ServiceContext>,
    local_report: ValidationReport,
}

impl CountrySpecificLotlFetcherResult {
    pub fn new(
        country: CountrySpecificLotl,
        contexts: Vec<ServiceContext>,
        local_report: ValidationReport,
    ) -> Self {
        Self {
            country,
            contexts,
            local_report,
        }
    }

    pub fn country(&self) -> &CountrySpecificLotl {
        &self.country
    }

    pub fn contexts(&self) -> &[ServiceContext] {
        &self.contexts
    }

    pub fn set_contexts(&mut self, contexts: Vec<ServiceContext>) {
        self.contexts = contexts;
    }

    pub fn into_contexts(self) -> Vec<ServiceContext> {
        self.contexts
    }

    pub fn local_report(&self) -> &ValidationReport {
        &self.local_report
    }

    pub fn add_report_item(&mut self, item: ReportItem) {
        self.local_report.add_report_item(item);
    }

    pub fn unique_id(&self) -> String {
        self.country.unique_id()
    }

    /// The list could not be fetched, verified or parsed.
    pub fn has_failed(&self) -> bool {
        [COULD_NOT_RESOLVE_URL, XML_SIGNATURE_INVALID, COUNTRY_PARSE_FAILURE]
            .iter()
            .any(|check| self.local_report.has_check(check))
    }
}

/// Fetches and validates the national trusted lists the list of trusted
/// lists points at.
#[derive(Debug, Clone)]
pub struct CountrySpecificLotlFetcher {
    retriever: Arc<dyn ResourceRetriever>,
    validator: XmlSignatureValidator,
    properties: LotlFetchingProperties,
}

impl CountrySpecificLotlFetcher {
    pub fn new(
        retriever: Arc<dyn ResourceRetriever>,
        validator: XmlSignatureValidator,
        properties: LotlFetchingProperties,
    ) -> Self {
        Self {
            retriever,
            validator,
            properties,
        }
    }

    /// Country pointers of the main LOTL after include/exclude filtering.
    pub fn country_pointers(&self, lotl_xml: &[u8]) -> LotlResult<Vec<CountrySpecificLotl>> {
        let mut handler = PointersHandler::new();
        xml::parse(lotl_xml, &mut handler)?;
        Ok(handler
            .into_pointers()
            .into_iter()
            .filter(|pointer| self.properties.should_process_country(pointer.scheme_territory()))
            .collect())
    }

    /// Fetch every country in parallel, keyed by `schemeTerritory_tslLocation`.
    ///
    /// Errors only when the main LOTL itself cannot be read; country failures
    /// end up in the respective result.
    pub async fn fetch(
        &self,
        lotl_xml: &[u8],
    ) -> LotlResult<BTreeMap<String, CountrySpecificLotlFetcherResult>> {
        let mut anchors = DefaultCertificateHandler::new();
        xml::parse(lotl_xml, &mut anchors)?;
        let trusted = TrustedCertificatesStore::from_certificates(anchors.certificates());

        let countries = self.country_pointers(lotl_xml)?;
        info!(
            "Fetching {} country trusted lists with {} trust anchors",
            countries.len(),
            trusted.len()
        );
        if countries.is_empty() {
            return Ok(BTreeMap::new());
        }

        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(countries.len());
        let semaphore = Arc::new(Semaphore::new(parallelism));
        let service_types = self.properties.service_types().clone();

        let mut tasks = JoinSet::new();
        for country in countries {
            let semaphore = semaphore.clone();
            let retriever = self.retriever.clone();
            let validator = self.validator.clone();
            let trusted = trusted.clone();
            let service_types = service_types.clone();
            tasks.spawn(async move {
                // The semaphore is never closed
                let _permit = semaphore.acquire_owned().await.ok();
                fetch_country(country, retriever.as_ref(), &validator, &trusted, service_types).await
            });
        }

        let mut results = BTreeMap::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    results.insert(result.unique_id(), result);
                }
                Err(e) => error!("Country trusted list task failed: {e}"),
            }
        }
        Ok(results)
    }
}

async fn fetch_country(
    country: CountrySpecificLotl,
    retriever: &dyn ResourceRetriever,
    validator: &XmlSignatureValidator,
    trusted: &TrustedCertificatesStore,
    service_types: BTreeSet<String>,
) -> CountrySpecificLotlFetcherResult {
    let mut report = ValidationReport::new();

    let body = match retriever.get_bytes(country.tsl_location()).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Unable to fetch trusted list of {country}: {e}");
            report.add_report_item(
                ReportItem::invalid(
                    COULD_NOT_RESOLVE_URL,
                    format!("Unable to retrieve trusted list of {country}"),
                )
                .with_cause(e),
            );
            return CountrySpecificLotlFetcherResult::new(country, Vec::new(), report);
        }
    };

    let outcome = validator.validate(&body, trusted, Utc::now());
    report.merge(&outcome.report);
    if !outcome.is_valid() {
        warn!("Trusted list of {country} has no valid trusted signature");
        report.downgrade_to_info();
        return CountrySpecificLotlFetcherResult::new(country, Vec::new(), report);
    }

    let mut handler = CountryServiceHandler::new(service_types);
    if let Err(e) = xml::parse(&body, &mut handler) {
        warn!("Unable to parse trusted list of {country}: {e}");
        report.add_report_item(
            ReportItem::info(
                COUNTRY_PARSE_FAILURE,
                format!("Unable to parse trusted list of {country}"),
            )
            .with_cause(e),
        );
        return CountrySpecificLotlFetcherResult::new(country, Vec::new(), report);
    }

    let contexts: Vec<ServiceContext> = handler
        .into_contexts()
        .into_iter()
        .map(ServiceContext::Country)
        .collect();
    debug!("{country}: {} trust services", contexts.len());
    CountrySpecificLotlFetcherResult::new(country, contexts, report)
}
