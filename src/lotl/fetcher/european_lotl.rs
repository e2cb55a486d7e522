use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::adapters::ResourceRetriever;
use crate::report::{ReportItem, ValidationReport};

pub const LOTL_FETCH_CHECK: &str = "LOTL_FETCH";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EuropeanLotlFetcherResult {
    #[serde(with = "super::base64_bytes")]
    lotl_xml: Vec<u8>,
    local_report: ValidationReport,
}

impl EuropeanLotlFetcherResult {
    pub fn new(lotl_xml: Vec<u8>, local_report: ValidationReport) -> Self {
        Self {
            lotl_xml,
            local_report,
        }
    }

    pub fn lotl_xml(&self) -> &[u8] {
        &self.lotl_xml
    }

    pub fn local_report(&self) -> &ValidationReport {
        &self.local_report
    }

    pub fn has_failed(&self) -> bool {
        self.lotl_xml.is_empty() || !self.local_report.is_valid()
    }
}

/// Downloads the list of trusted lists.
#[derive(Debug, Clone)]
pub struct EuropeanLotlFetcher {
    retriever: Arc<dyn ResourceRetriever>,
    url: String,
}

impl EuropeanLotlFetcher {
    pub fn new(retriever: Arc<dyn ResourceRetriever>, url: impl Into<String>) -> Self {
        Self {
            retriever,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn fetch(&self) -> EuropeanLotlFetcherResult {
        info!("Fetching list of trusted lists from {}", self.url);
        let mut report = ValidationReport::new();
        match self.retriever.get_bytes(&self.url).await {
            Ok(lotl_xml) => EuropeanLotlFetcherResult::new(lotl_xml, report),
            Err(e) => {
                error!("Unable to fetch list of trusted lists: {e}");
                report.add_report_item(
                    ReportItem::invalid(
                        LOTL_FETCH_CHECK,
                        format!("Unable to retrieve main LOTL file from {}", self.url),
                    )
                    .with_cause(e),
                );
                EuropeanLotlFetcherResult::new(Vec::new(), report)
            }
        }
    }
}
