//! Qualifier criteria: a small predicate tree evaluated against one certificate.

use serde::{Deserialize, Serialize};

use crate::pki::CertificateProfile;

/// How the results of a criteria list combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Assert {
    #[default]
    All,
    AtLeastOne,
    None,
}

impl Assert {
    /// Parse the `assert` attribute, unknown values fall back to `all`.
    pub fn from_attribute(value: &str) -> Self {
        match value {
            "atLeastOne" => Assert::AtLeastOne,
            "none" => Assert::None,
            _ => Assert::All,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyUsageBit {
    /// Bit index in the KeyUsage bit string, 0 is `digitalSignature`
    pub bit: u8,
    pub value: bool,
}

impl KeyUsageBit {
    /// Map an RFC 5280 key usage name to its bit index.
    pub fn bit_for_name(name: &str) -> Option<u8> {
        let bit = match name {
            "digitalSignature" => 0,
            "nonRepudiation" | "contentCommitment" => 1,
            "keyEncipherment" => 2,
            "dataEncipherment" => 3,
            "keyAgreement" => 4,
            "keyCertSign" => 5,
            "crlSign" => 6,
            "encipherOnly" => 7,
            "decipherOnly" => 8,
            _ => return None,
        };
        Some(bit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Criterion {
    KeyUsage { bits: Vec<KeyUsageBit> },
    PolicySet { oids: Vec<String> },
    ExtendedKeyUsage { oids: Vec<String> },
    CertSubjectDnAttribute { oids: Vec<String> },
    List(CriteriaList),
}

impl Criterion {
    pub fn matches(&self, profile: &CertificateProfile) -> bool {
        match self {
            Criterion::KeyUsage { bits } => bits
                .iter()
                .all(|bit| profile.has_key_usage_bit(bit.bit) == bit.value),
            Criterion::PolicySet { oids } => oids.iter().all(|oid| profile.has_policy(oid)),
            Criterion::ExtendedKeyUsage { oids } => oids
                .iter()
                .all(|oid| profile.extended_key_usages.contains(oid)),
            Criterion::CertSubjectDnAttribute { oids } => oids
                .iter()
                .all(|oid| profile.subject_attributes.contains(oid)),
            Criterion::List(list) => list.matches(profile),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CriteriaList {
    pub assert: Assert,
    pub criteria: Vec<Criterion>,
}

impl CriteriaList {
    pub fn new(assert: Assert) -> Self {
        Self {
            assert,
            criteria: Vec::new(),
        }
    }

    pub fn add_criterion(&mut self, criterion: Criterion) {
        self.criteria.push(criterion);
    }

    pub fn matches(&self, profile: &CertificateProfile) -> bool {
        let mut results = self.criteria.iter().map(|c| c.matches(profile));
        match self.assert {
            Assert::All => results.all(|matched| matched),
            Assert::AtLeastOne => results.any(|matched| matched),
            Assert::None => !results.any(|matched| matched),
        }
    }
}
