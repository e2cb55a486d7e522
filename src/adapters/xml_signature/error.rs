use crate::pki::certificate::CertificateError;

#[derive(Debug, thiserror::Error)]
pub enum XmlSignatureError {
    #[error("XML processing error: {0}")]
    Xml(String),

    #[error("Crypto error: {0}")]
    Crypto(#[from] openssl::error::ErrorStack),

    #[error("Certificate error: {0}")]
    Certificate(#[from] CertificateError),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid data: {0}")]
    Invalid(String),
}

impl From<quick_xml::Error> for XmlSignatureError {
    fn from(err: quick_xml::Error) -> Self {
        XmlSignatureError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for XmlSignatureError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        XmlSignatureError::Xml(err.to_string())
    }
}

impl From<quick_xml::escape::EscapeError> for XmlSignatureError {
    fn from(err: quick_xml::escape::EscapeError) -> Self {
        XmlSignatureError::Xml(err.to_string())
    }
}

impl From<std::io::Error> for XmlSignatureError {
    fn from(err: std::io::Error) -> Self {
        XmlSignatureError::Xml(err.to_string())
    }
}

impl From<std::string::FromUtf8Error> for XmlSignatureError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        XmlSignatureError::Utf8(err.utf8_error())
    }
}

pub type Result<T> = std::result::Result<T, XmlSignatureError>;
