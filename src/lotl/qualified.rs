//! eIDAS qualification of signing certificates from matching trusted list entries.

pub mod conclusion;
pub mod rules;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::lotl::context::CountryServiceContext;
use crate::lotl::errors::{LotlError, LotlResult};
use crate::lotl::trusted_store::LotlTrustedStore;
use crate::lotl::uris;
use crate::pki::{Certificate, CertificateProfile};
use crate::report::{ReportItem, ValidationReport};

pub use conclusion::QualifiedValidationConclusion;

pub const QUALIFICATION_MISMATCH: &str = "QUALIFICATION_MISMATCH";
pub const QUALIFICATION_INCOHERENT: &str = "QUALIFICATION_INCOHERENT";

/// Qualification outcome of one signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureQualification {
    pub signature_name: String,
    pub conclusion: QualifiedValidationConclusion,
    pub report: ValidationReport,
}

impl SignatureQualification {
    fn new(signature_name: impl Into<String>) -> Self {
        Self {
            signature_name: signature_name.into(),
            conclusion: QualifiedValidationConclusion::NotCatching,
            report: ValidationReport::new(),
        }
    }

    /// Entries that do not catch the certificate are ignored. A second
    /// concrete conclusion that differs from the first makes the signature
    /// incoherent.
    fn record(&mut self, conclusion: QualifiedValidationConclusion) {
        use QualifiedValidationConclusion::{Incoherent, NotCatching};

        match (self.conclusion, conclusion) {
            (_, NotCatching) | (Incoherent, _) => {}
            (NotCatching, _) => self.conclusion = conclusion,
            (current, _) if current == conclusion => {}
            (current, _) => {
                self.report.add_report_item(ReportItem::info(
                    QUALIFICATION_INCOHERENT,
                    format!(
                        "Trusted list entries disagree on the qualification of {}: {current} and {conclusion}",
                        self.signature_name
                    ),
                ));
                self.conclusion = Incoherent;
            }
        }
    }
}

/// Collects qualification conclusions, one per signature of a document.
///
/// A validator serves a single document. [`ensure_validator_is_empty`]
/// guards against reuse before the results were collected.
///
/// [`ensure_validator_is_empty`]: QualifiedValidator::ensure_validator_is_empty
#[derive(Debug, Default)]
pub struct QualifiedValidator {
    current: Option<SignatureQualification>,
    finished: Vec<SignatureQualification>,
}

impl QualifiedValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure_validator_is_empty(&self) -> LotlResult<()> {
        match self.current.as_ref().or(self.finished.first()) {
            Some(pending) => Err(LotlError::ValidatorInUse(pending.signature_name.clone())),
            None => Ok(()),
        }
    }

    /// Close the running signature, if any, and start a new one.
    pub fn start_signature_validation(&mut self, signature_name: impl Into<String>) {
        let next = SignatureQualification::new(signature_name);
        debug!("Starting qualification of {}", next.signature_name);
        if let Some(previous) = self.current.replace(next) {
            self.finished.push(previous);
        }
    }

    pub fn current_conclusion(&self) -> Option<QualifiedValidationConclusion> {
        self.current.as_ref().map(|current| current.conclusion)
    }

    /// Qualify `signer` against the CA/QC entries among `entries`, at the
    /// signing time and at the start of the certificate validity.
    pub fn validate(
        &mut self,
        signer: &Certificate,
        entries: &[&CountryServiceContext],
        signing_time: DateTime<Utc>,
    ) -> LotlResult<QualifiedValidationConclusion> {
        let profile = signer.profile()?;
        let current = self
            .current
            .get_or_insert_with(|| SignatureQualification::new(signer.subject()));

        for entry in entries.iter().filter(|entry| entry.service_type == uris::SVC_TYPE_CA_QC) {
            let conclusion = entry_conclusion(
                entry,
                &profile,
                signing_time,
                signer.not_before(),
                &mut current.report,
            );
            debug!("{}: entry concludes {conclusion}", current.signature_name);
            current.record(conclusion);
        }

        info!(
            "Qualification of {}: {}",
            current.signature_name, current.conclusion
        );
        Ok(current.conclusion)
    }

    /// [`validate`](Self::validate) against the entries of `store` that list
    /// the signer or its issuer.
    pub fn validate_with_store(
        &mut self,
        signer: &Certificate,
        store: &LotlTrustedStore,
        signing_time: DateTime<Utc>,
    ) -> LotlResult<QualifiedValidationConclusion> {
        let entries = store.issuing_contexts(signer);
        self.validate(signer, &entries, signing_time)
    }

    /// Hand out every signature's result and reset the validator.
    pub fn obtain_all_signatures_validation_results(&mut self) -> Vec<SignatureQualification> {
        if let Some(current) = self.current.take() {
            self.finished.push(current);
        }
        std::mem::take(&mut self.finished)
    }
}

/// Both reference times must agree, otherwise the certificate is not
/// qualified for the type it claims.
fn entry_conclusion(
    entry: &CountryServiceContext,
    profile: &CertificateProfile,
    signing_time: DateTime<Utc>,
    not_before: DateTime<Utc>,
    report: &mut ValidationReport,
) -> QualifiedValidationConclusion {
    let at_signing = rules::conclusion_at(entry, profile, signing_time, report);
    let at_issuance = rules::conclusion_at(entry, profile, not_before, report);
    if at_signing == at_issuance {
        return at_signing;
    }

    report.add_report_item(ReportItem::info(
        QUALIFICATION_MISMATCH,
        format!(
            "Qualification at signing time ({at_signing}) differs from the one at issuance ({at_issuance})"
        ),
    ));
    [at_signing, at_issuance]
        .into_iter()
        .map(|conclusion| conclusion.without_qualification())
        .find(|conclusion| *conclusion != QualifiedValidationConclusion::NotQualified)
        .unwrap_or(QualifiedValidationConclusion::NotQualified)
}
