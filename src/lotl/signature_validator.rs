use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::adapters::XmlSignatureVerifier;
use crate::pki::{Certificate, TrustedCertificatesStore};
use crate::report::{ReportItem, ValidationReport};

pub const XML_SIGNATURE_VALID: &str = "XML_SIGNATURE_VALID";
pub const XML_SIGNATURE_INVALID: &str = "XML_SIGNATURE_INVALID";

/// Report and signer of one signed trusted-list document.
#[derive(Debug, Clone, Default)]
pub struct SignatureValidationOutcome {
    pub report: ValidationReport,
    pub signer: Option<Certificate>,
}

impl SignatureValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.report.is_valid()
    }
}

/// Validates the enveloped signature of a trusted list and checks that its
/// signer is trusted by a given certificate store.
#[derive(Clone)]
pub struct XmlSignatureValidator {
    verifier: Arc<dyn XmlSignatureVerifier>,
}

impl XmlSignatureValidator {
    pub fn new(verifier: Arc<dyn XmlSignatureVerifier>) -> Self {
        Self { verifier }
    }

    pub fn validate(
        &self,
        xml: &[u8],
        trusted: &TrustedCertificatesStore,
        validation_date: DateTime<Utc>,
    ) -> SignatureValidationOutcome {
        let mut outcome = SignatureValidationOutcome::default();

        let verification = match self.verifier.verify(xml) {
            Ok(verification) => verification,
            Err(e) => {
                warn!("XML signature could not be verified: {e}");
                outcome.report.add_report_item(
                    ReportItem::invalid(XML_SIGNATURE_INVALID, "XML signature could not be verified")
                        .with_cause(e),
                );
                return outcome;
            }
        };
        let signer = verification.signer;
        outcome.signer = Some(signer.clone());

        let failure = if !verification.signature_valid {
            Some(format!(
                "XML signature is not valid: {}",
                verification.failure.as_deref().unwrap_or("unknown reason")
            ))
        } else if !trusted.is_trusted(&signer, validation_date) {
            Some(format!("XML signer {} is not trusted", signer.subject()))
        } else if !signer.is_valid_at(validation_date) {
            Some(format!(
                "XML signer {} is not valid at {validation_date}",
                signer.subject()
            ))
        } else {
            None
        };

        match failure {
            Some(message) => {
                debug!("{message}");
                outcome.report.add_report_item(
                    ReportItem::invalid(XML_SIGNATURE_INVALID, message).with_certificate(signer),
                );
            }
            None => outcome.report.add_report_item(
                ReportItem::info(XML_SIGNATURE_VALID, "XML signature is valid and trusted")
                    .with_certificate(signer),
            ),
        }
        outcome
    }
}

impl std::fmt::Debug for XmlSignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlSignatureValidator").finish_non_exhaustive()
    }
}
