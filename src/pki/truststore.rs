use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::certificate::Certificate;

/// In-memory set of generally trusted certificates.
///
/// A fresh store is built for every validation round so that trust derived
/// from one trusted-list version never leaks into the next one.
#[derive(Debug, Clone, Default)]
pub struct TrustedCertificatesStore {
    cache: Arc<DashMap<String, Certificate>>,
}

impl TrustedCertificatesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_certificates<'a>(certificates: impl IntoIterator<Item = &'a Certificate>) -> Self {
        let store = Self::new();
        store.add_certificates(certificates);
        store
    }

    /// Add certificates, returns how many were not yet present.
    pub fn add_certificates<'a>(
        &self,
        certificates: impl IntoIterator<Item = &'a Certificate>,
    ) -> usize {
        certificates
            .into_iter()
            .filter(|certificate| {
                self.cache
                    .insert(certificate.fingerprint(), (*certificate).clone())
                    .is_none()
            })
            .count()
    }

    pub fn contains(&self, certificate: &Certificate) -> bool {
        self.cache.contains_key(&certificate.fingerprint())
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn certificates(&self) -> Vec<Certificate> {
        self.cache.iter().map(|e| e.value().clone()).collect()
    }

    // Trusted certificates whose key verifies the given certificate
    fn find_issuers(&self, certificate: &Certificate) -> Vec<Certificate> {
        self.cache
            .iter()
            .filter(|entry| entry.value().subject() == certificate.issuer())
            .filter(|entry| certificate.is_signed_by(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// A certificate is trusted when it is in the store or directly issued by
    /// a stored certificate that is valid at `date`.
    pub fn is_trusted(&self, certificate: &Certificate, date: DateTime<Utc>) -> bool {
        if self.contains(certificate) {
            return true;
        }
        let trusted = self
            .find_issuers(certificate)
            .iter()
            .any(|issuer| issuer.is_valid_at(date));
        if !trusted {
            tracing::debug!("No trusted issuer found for {certificate}");
        }
        trusted
    }
}
