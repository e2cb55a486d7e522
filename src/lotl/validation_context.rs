use serde::{Deserialize, Serialize};

/// Role a certificate plays in the validation that asks about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CertificateSource {
    CertIssuer,
    CrlIssuer,
    OcspIssuer,
    SignerCert,
    Timestamp,
}

/// Usage of the certificate under test, linked to the usage of the
/// certificate that led to it (e.g. the issuer of a signer certificate).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationContext {
    source: CertificateSource,
    previous: Option<Box<ValidationContext>>,
}

impl ValidationContext {
    pub fn new(source: CertificateSource) -> Self {
        Self {
            source,
            previous: None,
        }
    }

    /// Context for the next certificate up the chain.
    pub fn then(&self, source: CertificateSource) -> Self {
        Self {
            source,
            previous: Some(Box::new(self.clone())),
        }
    }

    pub fn certificate_source(&self) -> CertificateSource {
        self.source
    }

    pub fn previous(&self) -> Option<&ValidationContext> {
        self.previous.as_deref()
    }

    /// Whether this context or any context it derives from has one of `sources`.
    pub fn chain_contains(&self, sources: &[CertificateSource]) -> bool {
        let mut current = Some(self);
        while let Some(context) = current {
            if sources.contains(&context.source) {
                return true;
            }
            current = context.previous();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_contains_previous_sources() {
        let issuer = ValidationContext::new(CertificateSource::SignerCert)
            .then(CertificateSource::CertIssuer);
        assert_eq!(issuer.certificate_source(), CertificateSource::CertIssuer);
        assert!(issuer.chain_contains(&[CertificateSource::SignerCert]));
        assert!(!issuer.chain_contains(&[CertificateSource::Timestamp]));
    }
}
