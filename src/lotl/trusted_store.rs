use chrono::{DateTime, Utc};
use tracing::debug;

use crate::lotl::context::{CountryServiceContext, ServiceContext};
use crate::lotl::errors::{LotlError, LotlResult};
use crate::lotl::uris;
use crate::lotl::validation_context::CertificateSource::{CrlIssuer, OcspIssuer, SignerCert, Timestamp};
use crate::lotl::validation_context::{CertificateSource, ValidationContext};
use crate::lotl::validator::LotlValidator;
use crate::pki::Certificate;
use crate::report::{ReportItem, ValidationReport};

pub const CERTIFICATE_TRUSTED: &str = "CERTIFICATE_TRUSTED";
pub const NOT_YET_VALID: &str = "NOT_YET_VALID";
pub const REVOKED_CERTIFICATE: &str = "REVOKED_CERTIFICATE";
pub const SCOPE_MISMATCH: &str = "SCOPE_MISMATCH";
pub const USAGE_MISMATCH: &str = "USAGE_MISMATCH";
pub const UNKNOWN_SERVICE_TYPE: &str = "UNKNOWN_SERVICE_TYPE";

/// Roles a certificate of the given service type may be trusted for.
pub fn allowed_sources(service_type: &str) -> Option<&'static [CertificateSource]> {
    let sources: &'static [CertificateSource] = match service_type {
        uris::SVC_TYPE_CA_QC => &[CrlIssuer, OcspIssuer, SignerCert],
        uris::SVC_TYPE_OCSP_QC => &[OcspIssuer],
        uris::SVC_TYPE_CRL_QC => &[CrlIssuer],
        uris::SVC_TYPE_TSA_QTST => &[Timestamp],
        uris::SVC_TYPE_EDS_Q
        | uris::SVC_TYPE_EDS_REM_Q
        | uris::SVC_TYPE_PSES_Q
        | uris::SVC_TYPE_QES_VALIDATION_Q
        | uris::SVC_TYPE_REMOTE_QSIGCD_Q
        | uris::SVC_TYPE_REMOTE_QSEALCD_Q
        | uris::SVC_TYPE_EAA_Q => &[SignerCert],
        _ => return None,
    };
    Some(sources)
}

/// Trust decisions backed by the service contexts of the national trusted
/// lists.
#[derive(Debug, Clone, Default)]
pub struct LotlTrustedStore {
    contexts: Vec<ServiceContext>,
}

impl LotlTrustedStore {
    pub fn new(contexts: Vec<ServiceContext>) -> Self {
        Self { contexts }
    }

    /// Run the pipeline and keep its contexts. An invalid pipeline report
    /// means there is nothing to trust.
    pub async fn build(validator: &LotlValidator) -> LotlResult<Self> {
        let outcome = validator.validate().await?;
        if !outcome.is_valid() {
            let reason = outcome
                .report
                .failures()
                .next()
                .map(|item| item.to_string())
                .unwrap_or_default();
            return Err(LotlError::FetchFailed {
                stage: "trusted-list validation".to_string(),
                reason,
            });
        }
        Ok(Self::new(outcome.contexts))
    }

    pub fn contexts(&self) -> &[ServiceContext] {
        &self.contexts
    }

    /// Country contexts that list `certificate` itself.
    pub fn matching_contexts(&self, certificate: &Certificate) -> Vec<&CountryServiceContext> {
        self.contexts
            .iter()
            .filter(|context| context.contains(certificate))
            .filter_map(ServiceContext::as_country)
            .collect()
    }

    /// Country contexts that list `certificate` or its direct issuer.
    pub fn issuing_contexts(&self, certificate: &Certificate) -> Vec<&CountryServiceContext> {
        self.contexts
            .iter()
            .filter_map(ServiceContext::as_country)
            .filter(|context| {
                context.certificates.iter().any(|candidate| {
                    candidate == certificate || certificate.is_signed_by(candidate)
                })
            })
            .collect()
    }

    /// Whether `certificate` is trusted for the usage described by `context`
    /// at `validation_date`. Every matching service is tried before giving up.
    pub fn check_if_cert_is_trusted(
        &self,
        report: &mut ValidationReport,
        context: &ValidationContext,
        certificate: &Certificate,
        validation_date: DateTime<Utc>,
    ) -> bool {
        let matches = self.matching_contexts(certificate);
        if matches.is_empty() {
            debug!("{certificate} is not listed in any trusted list");
            return false;
        }

        for service in matches {
            let Some(info) = service.current_chronological_info(validation_date) else {
                report.add_report_item(ReportItem::invalid(
                    NOT_YET_VALID,
                    format!(
                        "Trust service {} has no status at {validation_date}",
                        service.service_type
                    ),
                ));
                continue;
            };
            if !info.has_valid_status() {
                report.add_report_item(ReportItem::invalid(
                    REVOKED_CERTIFICATE,
                    format!(
                        "Trust service {} has status {} at {validation_date}",
                        service.service_type, info.service_status
                    ),
                ));
                continue;
            }
            if !info.is_scope_valid() {
                report.add_report_item(ReportItem::info(
                    SCOPE_MISMATCH,
                    format!("Trust service {} is out of scope", service.service_type),
                ));
                continue;
            }
            let Some(allowed) = allowed_sources(&service.service_type) else {
                report.add_report_item(ReportItem::info(
                    UNKNOWN_SERVICE_TYPE,
                    format!("Service type {} is not supported", service.service_type),
                ));
                continue;
            };
            if context.chain_contains(allowed) {
                report.add_report_item(
                    ReportItem::info(
                        CERTIFICATE_TRUSTED,
                        format!("Certificate is trusted through {}", service.service_type),
                    )
                    .with_certificate(certificate.clone()),
                );
                return true;
            }
            report.add_report_item(ReportItem::info(
                USAGE_MISMATCH,
                format!(
                    "Trust service {} does not cover {:?} certificates",
                    service.service_type,
                    context.certificate_source()
                ),
            ));
        }
        false
    }
}
