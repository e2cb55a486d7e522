//! ETSI TS 119 612 identifiers used by the trusted-list pipeline.

pub const LOTL_PIVOT_MARKER: &str = "eu-lotl-pivot";
pub const OFFICIAL_JOURNAL_MARKER: &str = "eur-lex.europa.eu";

/// MimeType of an `OtherTSLPointer` that points at an XML trusted list
pub const TSL_XML_MIME_TYPE: &str = "application/vnd.etsi.tsl+xml";

/// Scheme territory of the list of trusted lists itself
pub const EU_TERRITORY: &str = "EU";

pub const STATUS_GRANTED: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/granted";
pub const STATUS_WITHDRAWN: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/withdrawn";
pub const STATUS_RECOGNISED_AT_NATIONAL_LEVEL: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/recognisedatnationallevel";
pub const STATUS_DEPRECATED_AT_NATIONAL_LEVEL: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/deprecatedatnationallevel";
// Pre-eIDAS statuses
pub const STATUS_ACCREDITED: &str = "http://uri.etsi.org/TrstSvc/Svcstatus/accredited";
pub const STATUS_SET_BY_NATIONAL_LAW: &str = "http://uri.etsi.org/TrstSvc/Svcstatus/setbynationallaw";

/// Statuses under which a service may be relied upon
pub const VALID_STATUSES: [&str; 4] = [
    STATUS_GRANTED,
    STATUS_RECOGNISED_AT_NATIONAL_LEVEL,
    STATUS_ACCREDITED,
    STATUS_SET_BY_NATIONAL_LAW,
];

pub fn is_valid_status(status: &str) -> bool {
    VALID_STATUSES.contains(&status)
}

pub const SVC_TYPE_CA_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/CA/QC";
pub const SVC_TYPE_OCSP_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/Certstatus/OCSP/QC";
pub const SVC_TYPE_CRL_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/Certstatus/CRL/QC";
pub const SVC_TYPE_TSA_QTST: &str = "http://uri.etsi.org/TrstSvc/Svctype/TSA/QTST";
pub const SVC_TYPE_EDS_Q: &str = "http://uri.etsi.org/TrstSvc/Svctype/EDS/Q";
pub const SVC_TYPE_EDS_REM_Q: &str = "http://uri.etsi.org/TrstSvc/Svctype/EDS/REM/Q";
pub const SVC_TYPE_PSES_Q: &str = "http://uri.etsi.org/TrstSvc/Svctype/PSES/Q";
pub const SVC_TYPE_QES_VALIDATION_Q: &str = "http://uri.etsi.org/TrstSvc/Svctype/QESValidation/Q";
pub const SVC_TYPE_REMOTE_QSIGCD_Q: &str =
    "http://uri.etsi.org/TrstSvc/Svctype/RemoteQSigCDManagement/Q";
pub const SVC_TYPE_REMOTE_QSEALCD_Q: &str =
    "http://uri.etsi.org/TrstSvc/Svctype/RemoteQSealCDManagement/Q";
pub const SVC_TYPE_EAA_Q: &str = "http://uri.etsi.org/TrstSvc/Svctype/EAA/Q";

pub const ASI_FOR_E_SIGNATURES: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/ForeSignatures";
pub const ASI_FOR_E_SEALS: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/ForeSeals";
pub const ASI_FOR_WEB_SITE_AUTHENTICATION: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/ForWebSiteAuthentication";

pub const QC_WITH_SSCD: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCWithSSCD";
pub const QC_NO_SSCD: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCNoSSCD";
pub const QC_SSCD_STATUS_AS_IN_CERT: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCSSCDStatusAsInCert";
pub const QC_WITH_QSCD: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCWithQSCD";
pub const QC_NO_QSCD: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCNoQSCD";
pub const QC_QSCD_STATUS_AS_IN_CERT: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCQSCDStatusAsInCert";
pub const QC_QSCD_MANAGED_ON_BEHALF: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCQSCDManagedOnBehalf";
pub const QC_FOR_LEGAL_PERSON: &str =
    "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCForLegalPerson";
pub const QC_FOR_ESIG: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCForESig";
pub const QC_FOR_ESEAL: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCForESeal";
pub const QC_FOR_WSA: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCForWSA";
pub const NOT_QUALIFIED: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/NotQualified";
pub const QC_STATEMENT: &str = "http://uri.etsi.org/TrstSvc/TrustedList/SvcInfoExt/QCStatement";
