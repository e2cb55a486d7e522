pub mod certificate;
pub mod qc_statements;
pub mod truststore;

pub use certificate::{Certificate, CertificateError, CertificateProfile};
pub use truststore::TrustedCertificatesStore;
