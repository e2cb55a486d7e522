use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::adapters::ResourceRetriever;
use crate::lotl::errors::LotlResult;
use crate::lotl::signature_validator::XmlSignatureValidator;
use crate::lotl::uris::LOTL_PIVOT_MARKER;
use crate::lotl::xml::{self, DefaultCertificateHandler, PivotsHandler};
use crate::pki::{Certificate, TrustedCertificatesStore};
use crate::report::{ReportItem, ValidationReport};

pub const PIVOT_VALIDATION_CHECK: &str = "PIVOT_VALIDATION";
pub const PIVOT_CACHE_PREFIX: &str = "pivot:";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotFetcherResult {
    pivot_urls: Vec<String>,
    certificates: Vec<Certificate>,
    local_report: ValidationReport,
}

impl PivotFetcherResult {
    pub fn new(
        pivot_urls: Vec<String>,
        certificates: Vec<Certificate>,
        local_report: ValidationReport,
    ) -> Self {
        Self {
            pivot_urls,
            certificates,
            local_report,
        }
    }

    pub fn pivot_urls(&self) -> &[String] {
        &self.pivot_urls
    }

    /// Trust anchors of the current list of trusted lists
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn local_report(&self) -> &ValidationReport {
        &self.local_report
    }

    pub fn has_failed(&self) -> bool {
        !self.local_report.is_valid()
    }

    /// Ordered join of the processed pivot URLs. Any change in the chain
    /// yields a different identifier.
    pub fn generate_unique_identifier(&self) -> String {
        self.pivot_urls.join("|")
    }

    pub fn cache_key(&self) -> String {
        format!("{PIVOT_CACHE_PREFIX}{}", self.generate_unique_identifier())
    }
}

/// Walks the chain of pivot lists of trusted lists, from the oldest one not
/// covered by the Official Journal to the current list.
#[derive(Debug, Clone)]
pub struct PivotFetcher {
    retriever: Arc<dyn ResourceRetriever>,
    validator: XmlSignatureValidator,
}

impl PivotFetcher {
    pub fn new(retriever: Arc<dyn ResourceRetriever>, validator: XmlSignatureValidator) -> Self {
        Self {
            retriever,
            validator,
        }
    }

    /// Pivot URLs to process, oldest first.
    ///
    /// The scheme information lists the newest pivot first. Everything up to
    /// and including the current Official Journal publication is covered by
    /// the journal certificates. Without that publication every pivot is kept.
    pub fn pivot_urls(lotl_xml: &[u8], current_journal_uri: &str) -> LotlResult<Vec<String>> {
        let mut handler = PivotsHandler::new();
        xml::parse(lotl_xml, &mut handler)?;

        let mut uris = handler.into_uris();
        uris.reverse();
        if let Some(position) = uris.iter().rposition(|uri| uri == current_journal_uri) {
            uris.drain(..=position);
        }
        uris.retain(|uri| uri.contains(LOTL_PIVOT_MARKER));
        Ok(uris)
    }

    pub async fn fetch(
        &self,
        lotl_xml: &[u8],
        eu_journal_certificates: &[Certificate],
        current_journal_uri: &str,
    ) -> PivotFetcherResult {
        let pivot_urls = match Self::pivot_urls(lotl_xml, current_journal_uri) {
            Ok(urls) => urls,
            Err(e) => {
                let item = ReportItem::invalid(
                    PIVOT_VALIDATION_CHECK,
                    "Unable to read pivots from the main LOTL",
                )
                .with_cause(e);
                return fail_closed(Vec::new(), eu_journal_certificates, item);
            }
        };
        info!("Processing {} pivot(s)", pivot_urls.len());

        let mut trusted = eu_journal_certificates.to_vec();
        for url in &pivot_urls {
            debug!("Validating pivot {url}");
            let body = match self.retriever.get_bytes(url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!("Unable to fetch pivot {url}: {e}");
                    let item = ReportItem::invalid(
                        PIVOT_VALIDATION_CHECK,
                        format!("Unable to retrieve pivot file {url}"),
                    )
                    .with_cause(e);
                    return fail_closed(pivot_urls, eu_journal_certificates, item);
                }
            };
            match self.validate_step(&body, &trusted, url) {
                Ok((_, certificates)) => trusted = certificates,
                Err(item) => return fail_closed(pivot_urls, eu_journal_certificates, item),
            }
        }

        match self.validate_step(lotl_xml, &trusted, "main LOTL") {
            Ok((report, certificates)) => {
                info!("Pivot chain validated, {} trust anchors", certificates.len());
                PivotFetcherResult::new(pivot_urls, certificates, report)
            }
            Err(item) => fail_closed(pivot_urls, eu_journal_certificates, item),
        }
    }

    /// Validate one document against `trusted`, returning its report and the
    /// certificates it announces.
    fn validate_step(
        &self,
        body: &[u8],
        trusted: &[Certificate],
        name: &str,
    ) -> Result<(ValidationReport, Vec<Certificate>), ReportItem> {
        let store = TrustedCertificatesStore::from_certificates(trusted);
        let outcome = self.validator.validate(body, &store, Utc::now());
        if !outcome.is_valid() {
            warn!("Signature validation of {name} failed");
            let cause = outcome
                .report
                .failures()
                .next()
                .map(|item| item.message.clone())
                .unwrap_or_default();
            return Err(ReportItem::invalid(
                PIVOT_VALIDATION_CHECK,
                format!("Signature validation of {name} failed"),
            )
            .with_cause(cause));
        }

        let mut handler = DefaultCertificateHandler::new();
        if let Err(e) = xml::parse(body, &mut handler) {
            return Err(
                ReportItem::invalid(PIVOT_VALIDATION_CHECK, format!("Unable to parse {name}"))
                    .with_cause(e),
            );
        }
        Ok((outcome.report, handler.into_certificates()))
    }
}

fn fail_closed(
    pivot_urls: Vec<String>,
    eu_journal_certificates: &[Certificate],
    item: ReportItem,
) -> PivotFetcherResult {
    let mut report = ValidationReport::new();
    report.add_report_item(item);
    PivotFetcherResult::new(pivot_urls, eu_journal_certificates.to_vec(), report)
}
