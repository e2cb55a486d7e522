use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::pki::Certificate;
use crate::report::{ReportItem, ValidationReport};

pub const EU_JOURNAL_CHECK: &str = "EU_JOURNAL_CERTIFICATES";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EuropeanResourceFetcherResult {
    certificates: Vec<Certificate>,
    current_journal_uri: String,
    local_report: ValidationReport,
}

impl EuropeanResourceFetcherResult {
    pub fn new(
        certificates: Vec<Certificate>,
        current_journal_uri: impl Into<String>,
        local_report: ValidationReport,
    ) -> Self {
        Self {
            certificates,
            current_journal_uri: current_journal_uri.into(),
            local_report,
        }
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn current_journal_uri(&self) -> &str {
        &self.current_journal_uri
    }

    pub fn local_report(&self) -> &ValidationReport {
        &self.local_report
    }

    pub fn has_failed(&self) -> bool {
        self.certificates.is_empty() || !self.local_report.is_valid()
    }
}

#[derive(Debug, Clone)]
enum CertificateSource {
    PemFile(Option<PathBuf>),
    Fixed(Vec<Certificate>),
}

/// Provides the certificates published in the Official Journal of the EU,
/// the root of trust for the list of trusted lists.
#[derive(Debug, Clone)]
pub struct EuropeanResourceFetcher {
    source: CertificateSource,
    current_journal_uri: String,
}

impl EuropeanResourceFetcher {
    /// Read the certificates from a PEM bundle on every fetch.
    pub fn from_pem_file(path: Option<PathBuf>, current_journal_uri: impl Into<String>) -> Self {
        Self {
            source: CertificateSource::PemFile(path),
            current_journal_uri: current_journal_uri.into(),
        }
    }

    pub fn with_certificates(
        certificates: Vec<Certificate>,
        current_journal_uri: impl Into<String>,
    ) -> Self {
        Self {
            source: CertificateSource::Fixed(certificates),
            current_journal_uri: current_journal_uri.into(),
        }
    }

    pub async fn fetch(&self) -> EuropeanResourceFetcherResult {
        let mut report = ValidationReport::new();
        let certificates = match &self.source {
            CertificateSource::Fixed(certificates) => certificates.clone(),
            CertificateSource::PemFile(Some(path)) => {
                match Certificate::from_pem_file(path).await {
                    Ok(certificates) => certificates,
                    Err(e) => {
                        error!("Unable to load EU journal certificates from {}: {e}", path.display());
                        report.add_report_item(
                            ReportItem::invalid(
                                EU_JOURNAL_CHECK,
                                format!("Unable to load EU journal certificates from {}", path.display()),
                            )
                            .with_cause(e),
                        );
                        Vec::new()
                    }
                }
            }
            CertificateSource::PemFile(None) => Vec::new(),
        };

        if certificates.is_empty() && report.is_valid() {
            report.add_report_item(ReportItem::invalid(
                EU_JOURNAL_CHECK,
                "No EU journal certificates are configured",
            ));
        } else {
            info!("Loaded {} EU journal certificates", certificates.len());
        }
        EuropeanResourceFetcherResult::new(certificates, &self.current_journal_uri, report)
    }
}
