//! Qualification of one certificate by one trusted list entry at one point in time.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::conclusion::QualifiedValidationConclusion;
use crate::lotl::context::{CountryServiceContext, ServiceChronologicalInfo};
use crate::lotl::uris;
use crate::pki::qc_statements::{
    QCP_LEGAL_OID, QCP_LEGAL_QSCD_OID, QCP_NATURAL_OID, QCP_NATURAL_QSCD_OID, QCP_PUBLIC_OID,
    QCP_PUBLIC_WITH_SSCD_OID, QCP_WEB_OID, QcType,
};
use crate::pki::CertificateProfile;
use crate::report::{ReportItem, ValidationReport};

pub const QUALIFIER_CONTRADICTION: &str = "QUALIFIER_CONTRADICTION";

/// 2016-05-30T22:00:00Z, from here on the eIDAS regulation applies.
pub const EIDAS_START_TIMESTAMP: i64 = 1_464_645_600;

pub fn is_pre_eidas(date: DateTime<Utc>) -> bool {
    date.timestamp() < EIDAS_START_TIMESTAMP
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CertType {
    Esig,
    Eseal,
    Wsa,
    Unknown,
    Incoherent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Qscd {
    Yes,
    No,
    AsInCert,
}

/// A value a trusted list may impose on the certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Overrule<T> {
    NotSet,
    Set(T),
    Contradiction,
}

impl<T: Copy + PartialEq> Overrule<T> {
    fn record(self, value: T) -> Self {
        match self {
            Overrule::NotSet => Overrule::Set(value),
            Overrule::Set(current) if current == value => self,
            Overrule::Set(_) | Overrule::Contradiction => Overrule::Contradiction,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TlOverrules {
    pub cert_type: Overrule<CertType>,
    pub qualified: Overrule<bool>,
    pub qscd: Overrule<Qscd>,
}

impl TlOverrules {
    /// Fold the qualifier URIs that apply to the certificate. Before eIDAS the
    /// SSCD qualifiers speak for the signature device, after it the QSCD ones.
    pub fn from_qualifiers(qualifiers: &[String], pre_eidas: bool) -> Self {
        let mut overrules = TlOverrules {
            cert_type: Overrule::NotSet,
            qualified: Overrule::NotSet,
            qscd: Overrule::NotSet,
        };
        for qualifier in qualifiers {
            match qualifier.as_str() {
                uris::QC_FOR_ESIG => overrules.cert_type = overrules.cert_type.record(CertType::Esig),
                uris::QC_FOR_ESEAL | uris::QC_FOR_LEGAL_PERSON => {
                    overrules.cert_type = overrules.cert_type.record(CertType::Eseal)
                }
                uris::QC_FOR_WSA => overrules.cert_type = overrules.cert_type.record(CertType::Wsa),
                uris::QC_STATEMENT => overrules.qualified = overrules.qualified.record(true),
                uris::NOT_QUALIFIED => overrules.qualified = overrules.qualified.record(false),
                uris::QC_WITH_QSCD | uris::QC_QSCD_MANAGED_ON_BEHALF if !pre_eidas => {
                    overrules.qscd = overrules.qscd.record(Qscd::Yes)
                }
                uris::QC_NO_QSCD if !pre_eidas => overrules.qscd = overrules.qscd.record(Qscd::No),
                uris::QC_QSCD_STATUS_AS_IN_CERT if !pre_eidas => {
                    overrules.qscd = overrules.qscd.record(Qscd::AsInCert)
                }
                uris::QC_WITH_SSCD if pre_eidas => overrules.qscd = overrules.qscd.record(Qscd::Yes),
                uris::QC_NO_SSCD if pre_eidas => overrules.qscd = overrules.qscd.record(Qscd::No),
                uris::QC_SSCD_STATUS_AS_IN_CERT if pre_eidas => {
                    overrules.qscd = overrules.qscd.record(Qscd::AsInCert)
                }
                other => debug!("Ignoring qualifier {other}"),
            }
        }
        overrules
    }

    fn report_contradictions(&self, report: &mut ValidationReport) {
        let contradictions = [
            (self.cert_type == Overrule::Contradiction, "certificate type"),
            (self.qualified == Overrule::Contradiction, "qualification"),
            (self.qscd == Overrule::Contradiction, "signature creation device"),
        ];
        for (_, topic) in contradictions.iter().filter(|(contradicts, _)| *contradicts) {
            report.add_report_item(ReportItem::info(
                QUALIFIER_CONTRADICTION,
                format!("Trusted list qualifiers contradict each other on the {topic}"),
            ));
        }
    }
}

/// What the certificate says about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CertificateClaims {
    pub qualified: bool,
    pub qscd: bool,
    pub cert_type: CertType,
}

impl CertificateClaims {
    /// QcStatements when present, qualified certificate policies otherwise.
    pub fn from_profile(profile: &CertificateProfile, pre_eidas: bool) -> Self {
        match &profile.qc_statements {
            Some(statements) => {
                let esig = statements.types.contains(&QcType::Esign);
                let eseal = statements.types.contains(&QcType::Eseal);
                let web = statements.types.contains(&QcType::Web);
                let cert_type = match (esig, eseal, web) {
                    (true, false, false) => CertType::Esig,
                    (false, true, false) => CertType::Eseal,
                    (false, false, true) => CertType::Wsa,
                    (false, false, false) if pre_eidas => CertType::Esig,
                    (false, false, false) => CertType::Unknown,
                    _ => CertType::Incoherent,
                };
                CertificateClaims {
                    qualified: statements.compliance,
                    qscd: statements.sscd,
                    cert_type,
                }
            }
            None => {
                let has_any = |oids: &[&str]| oids.iter().any(|oid| profile.has_policy(oid));
                let cert_type = if has_any(&[QCP_NATURAL_OID, QCP_NATURAL_QSCD_OID, QCP_PUBLIC_OID, QCP_PUBLIC_WITH_SSCD_OID]) {
                    CertType::Esig
                } else if has_any(&[QCP_LEGAL_OID, QCP_LEGAL_QSCD_OID]) {
                    CertType::Eseal
                } else if has_any(&[QCP_WEB_OID]) {
                    CertType::Wsa
                } else {
                    CertType::Unknown
                };
                CertificateClaims {
                    qualified: has_any(&[
                        QCP_PUBLIC_OID,
                        QCP_PUBLIC_WITH_SSCD_OID,
                        QCP_NATURAL_OID,
                        QCP_LEGAL_OID,
                        QCP_NATURAL_QSCD_OID,
                        QCP_LEGAL_QSCD_OID,
                        QCP_WEB_OID,
                    ]),
                    qscd: has_any(&[QCP_PUBLIC_WITH_SSCD_OID, QCP_NATURAL_QSCD_OID, QCP_LEGAL_QSCD_OID]),
                    cert_type,
                }
            }
        }
    }
}

/// Certificate type as the additional service information of the entry
/// allows it. `None` when the entry does not cover that type.
fn type_within_service_scope(cert_type: CertType, info: &ServiceChronologicalInfo) -> Option<CertType> {
    let for_esig = info.has_extension(uris::ASI_FOR_E_SIGNATURES);
    let for_eseal = info.has_extension(uris::ASI_FOR_E_SEALS);
    if !for_esig && !for_eseal {
        return Some(cert_type);
    }
    match cert_type {
        CertType::Esig if !for_esig => None,
        CertType::Eseal if !for_eseal => None,
        CertType::Unknown if for_esig != for_eseal => {
            Some(if for_esig { CertType::Esig } else { CertType::Eseal })
        }
        other => Some(other),
    }
}

fn map_conclusion(qualified: Option<bool>, qscd: Option<bool>, cert_type: CertType) -> QualifiedValidationConclusion {
    use QualifiedValidationConclusion as C;

    match qualified {
        None => C::Unknown,
        Some(false) => match cert_type {
            CertType::Esig => C::NotQualifiedEsig,
            CertType::Eseal => C::NotQualifiedEseal,
            _ => C::NotQualified,
        },
        Some(true) => match (cert_type, qscd) {
            (CertType::Wsa, _) => C::NotQualified,
            (CertType::Incoherent, _) => C::Incoherent,
            (_, None) => C::Unknown,
            (CertType::Esig, Some(true)) => C::EsigWithQcAndQscd,
            (CertType::Esig, Some(false)) => C::EsigWithQc,
            (CertType::Eseal, Some(true)) => C::EsealWithQcAndQscd,
            (CertType::Eseal, Some(false)) => C::EsealWithQc,
            (CertType::Unknown, Some(true)) => C::UnknownQcAndQscd,
            (CertType::Unknown, Some(false)) => C::UnknownQc,
        },
    }
}

/// Conclusion of one CA/QC entry at `date`.
pub fn conclusion_at(
    service: &CountryServiceContext,
    profile: &CertificateProfile,
    date: DateTime<Utc>,
    report: &mut ValidationReport,
) -> QualifiedValidationConclusion {
    let Some(info) = service.current_chronological_info(date) else {
        return QualifiedValidationConclusion::NotCatching;
    };
    let pre_eidas = is_pre_eidas(date);
    let overrules = TlOverrules::from_qualifiers(&info.matching_qualifiers(profile), pre_eidas);
    overrules.report_contradictions(report);
    let claims = CertificateClaims::from_profile(profile, pre_eidas);

    // A service out of a granted status still types the certificate
    let qualified = match overrules.qualified {
        _ if !info.has_valid_status() => Some(false),
        Overrule::NotSet => Some(claims.qualified),
        Overrule::Set(value) => Some(value),
        Overrule::Contradiction => None,
    };
    let qscd = match overrules.qscd {
        Overrule::NotSet | Overrule::Set(Qscd::AsInCert) => Some(claims.qscd),
        Overrule::Set(Qscd::Yes) => Some(true),
        Overrule::Set(Qscd::No) => Some(false),
        Overrule::Contradiction => None,
    };
    let mut cert_type = match overrules.cert_type {
        Overrule::NotSet => claims.cert_type,
        Overrule::Set(value) => value,
        Overrule::Contradiction => CertType::Incoherent,
    };

    if !pre_eidas && qualified == Some(true) {
        match type_within_service_scope(cert_type, info) {
            Some(scoped) => cert_type = scoped,
            None => return QualifiedValidationConclusion::NotCatching,
        }
    }
    map_conclusion(qualified, qscd, cert_type)
}
