use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use x509_parser::extensions::{ExtendedKeyUsage, ParsedExtension};
use x509_parser::pem::Pem;
use x509_parser::prelude::*;

use super::qc_statements::{self, QcStatements};

/// Error type for certificate decoding.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("X.509 error: {0}")]
    X509(#[from] X509Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("PEM error: {0}")]
    Pem(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid certificate: {0}")]
    Invalid(String),
}

/// An immutable DER encoded X.509 certificate with a few decoded fields.
///
/// Equality and hashing use the DER bytes only.
#[derive(Clone)]
pub struct Certificate {
    raw: Arc<Vec<u8>>,
    subject: String,
    issuer: String,
    serial_number: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl Certificate {
    /// Create a certificate from DER-encoded bytes
    pub fn from_der(der: impl AsRef<[u8]>) -> Result<Self, CertificateError> {
        let der_bytes = der.as_ref();
        let (_, cert) =
            X509Certificate::from_der(der_bytes).map_err(|e| CertificateError::X509(e.into()))?;

        let not_before = to_datetime(cert.validity().not_before.timestamp())?;
        let not_after = to_datetime(cert.validity().not_after.timestamp())?;

        Ok(Self {
            raw: Arc::new(der_bytes.to_vec()),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial_number: cert.tbs_certificate.serial.to_string(),
            not_before,
            not_after,
        })
    }

    /// Decode a base64 DER certificate, ignoring embedded whitespace.
    pub fn from_base64(encoded: &str) -> Result<Self, CertificateError> {
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let der = BASE64.decode(compact)?;
        Self::from_der(der)
    }

    /// Read every `CERTIFICATE` block of a PEM buffer.
    pub fn from_pem(data: &[u8]) -> Result<Vec<Self>, CertificateError> {
        let mut certificates = Vec::new();
        for pem in Pem::iter_from_buffer(data) {
            let pem = pem.map_err(|e| CertificateError::Pem(e.to_string()))?;
            if pem.label == "CERTIFICATE" {
                certificates.push(Self::from_der(&pem.contents)?);
            }
        }
        Ok(certificates)
    }

    pub async fn from_pem_file(path: impl AsRef<Path>) -> Result<Vec<Self>, CertificateError> {
        let data = tokio::fs::read(path).await?;
        Self::from_pem(&data)
    }

    pub fn der(&self) -> &[u8] {
        &self.raw
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.raw.as_slice())
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    pub fn is_valid_at(&self, date: DateTime<Utc>) -> bool {
        self.not_before <= date && date <= self.not_after
    }

    /// Hex encoded SHA-256 of the DER bytes.
    pub fn fingerprint(&self) -> String {
        hex::encode(openssl::sha::sha256(&self.raw))
    }

    /// Parse the certificate from stored DER bytes
    pub fn parse(&self) -> Result<X509Certificate<'_>, CertificateError> {
        let (_, cert) =
            X509Certificate::from_der(&self.raw).map_err(|e| CertificateError::X509(e.into()))?;
        Ok(cert)
    }

    /// Check that `issuer` names this certificate's issuer and its key verifies the signature.
    pub fn is_signed_by(&self, issuer: &Certificate) -> bool {
        let (Ok(cert), Ok(candidate)) = (self.parse(), issuer.parse()) else {
            return false;
        };
        cert.issuer() == candidate.subject()
            && cert.verify_signature(Some(candidate.public_key())).is_ok()
    }

    /// Decode the attributes qualification criteria and QC checks look at.
    pub fn profile(&self) -> Result<CertificateProfile, CertificateError> {
        let cert = self.parse()?;
        let mut profile = CertificateProfile {
            subject_attributes: cert
                .subject()
                .iter_attributes()
                .map(|attr| attr.attr_type().to_id_string())
                .collect(),
            ..CertificateProfile::default()
        };

        for extension in cert.extensions() {
            match extension.parsed_extension() {
                ParsedExtension::KeyUsage(key_usage) => profile.key_usage = Some(key_usage.flags),
                ParsedExtension::ExtendedKeyUsage(eku) => {
                    profile.extended_key_usages = extended_key_usage_oids(eku);
                }
                ParsedExtension::CertificatePolicies(policies) => {
                    profile.policies = policies
                        .iter()
                        .map(|policy| policy.policy_id.to_id_string())
                        .collect();
                }
                _ => {}
            }
        }

        profile.qc_statements = qc_statements::from_certificate(&cert)?;
        Ok(profile)
    }
}

fn to_datetime(timestamp: i64) -> Result<DateTime<Utc>, CertificateError> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| CertificateError::Invalid(format!("timestamp out of range: {timestamp}")))
}

fn extended_key_usage_oids(eku: &ExtendedKeyUsage<'_>) -> Vec<String> {
    let known = [
        (eku.any, "2.5.29.37.0"),
        (eku.server_auth, "1.3.6.1.5.5.7.3.1"),
        (eku.client_auth, "1.3.6.1.5.5.7.3.2"),
        (eku.code_signing, "1.3.6.1.5.5.7.3.3"),
        (eku.email_protection, "1.3.6.1.5.5.7.3.4"),
        (eku.time_stamping, "1.3.6.1.5.5.7.3.8"),
        (eku.ocsp_signing, "1.3.6.1.5.5.7.3.9"),
    ];
    known
        .into_iter()
        .filter(|(present, _)| *present)
        .map(|(_, oid)| oid.to_string())
        .chain(eku.other.iter().map(|oid| oid.to_id_string()))
        .collect()
}

/// Certificate attributes decoded once per evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateProfile {
    /// Raw KeyUsage bit string, bit 0 is `digitalSignature`.
    pub key_usage: Option<u16>,
    pub extended_key_usages: Vec<String>,
    pub policies: Vec<String>,
    pub subject_attributes: Vec<String>,
    pub qc_statements: Option<QcStatements>,
}

impl CertificateProfile {
    pub fn has_key_usage_bit(&self, bit: u8) -> bool {
        self.key_usage
            .is_some_and(|flags| bit < 16 && (flags >> bit) & 1 == 1)
    }

    pub fn has_policy(&self, oid: &str) -> bool {
        self.policies.iter().any(|p| p == oid)
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for Certificate {}

impl Hash for Certificate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("issuer", &self.issuer)
            .field("serial_number", &self.serial_number)
            .finish()
    }
}

impl fmt::Display for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (serial {})", self.subject, self.serial_number)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EncodedCertificate {
    base64_encoded: String,
}

impl Serialize for Certificate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EncodedCertificate {
            base64_encoded: self.to_base64(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Certificate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = EncodedCertificate::deserialize(deserializer)?;
        Certificate::from_base64(&encoded.base64_encoded).map_err(serde::de::Error::custom)
    }
}
