use thiserror::Error;

use crate::adapters::RetrieverError;
use crate::adapters::xml_signature::XmlSignatureError;
use crate::pki::CertificateError;

/// Trusted-list pipeline, cache and configuration errors
#[derive(Error, Debug)]
pub enum LotlError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cached {0} is stale, refresh the cache first")]
    StaleData(String),

    #[error("Country trusted list {0} failed")]
    CountryFailure(String),

    #[error("Fetching {stage} failed: {reason}")]
    FetchFailed { stage: String, reason: String },

    #[error("Snapshot rejected: {0}")]
    InvalidSnapshot(String),

    #[error("Qualification validator is still in use for signature {0}")]
    ValidatorInUse(String),

    #[error("Retriever error: {0}")]
    Retriever(#[from] RetrieverError),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("XML signature error: {0}")]
    XmlSignature(#[from] XmlSignatureError),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<quick_xml::Error> for LotlError {
    fn from(err: quick_xml::Error) -> Self {
        LotlError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for LotlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        LotlError::Xml(err.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for LotlError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        LotlError::Xml(err.to_string())
    }
}

/// Convenient Result type alias
pub type LotlResult<T> = Result<T, LotlError>;
