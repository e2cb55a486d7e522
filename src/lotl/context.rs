//! Trust-service entries discovered in trusted lists.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::criteria::CriteriaList;
use super::uris;
use crate::pki::{Certificate, CertificateProfile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalServiceInformationExtension {
    pub uri: String,
}

impl AdditionalServiceInformationExtension {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }

    /// Website authentication is outside of what signature validation relies on.
    pub fn is_scope_valid(&self) -> bool {
        self.uri != uris::ASI_FOR_WEB_SITE_AUTHENTICATION
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifierExtension {
    pub qualifiers: Vec<String>,
    pub criteria_list: CriteriaList,
}

impl QualifierExtension {
    pub fn matches(&self, profile: &CertificateProfile) -> bool {
        self.criteria_list.matches(profile)
    }
}

/// One status interval of a trust service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceChronologicalInfo {
    pub service_status: String,
    pub status_starting_time: DateTime<Utc>,
    #[serde(default)]
    pub extensions: Vec<AdditionalServiceInformationExtension>,
    #[serde(default)]
    pub qualifiers: Vec<QualifierExtension>,
}

impl ServiceChronologicalInfo {
    pub fn new(service_status: impl Into<String>, status_starting_time: DateTime<Utc>) -> Self {
        Self {
            service_status: service_status.into(),
            status_starting_time,
            extensions: Vec::new(),
            qualifiers: Vec::new(),
        }
    }

    pub fn has_valid_status(&self) -> bool {
        uris::is_valid_status(&self.service_status)
    }

    /// False only when every additional service information extension is
    /// out of scope. No extensions means no restriction.
    pub fn is_scope_valid(&self) -> bool {
        self.extensions.is_empty() || self.extensions.iter().any(|e| e.is_scope_valid())
    }

    pub fn has_extension(&self, uri: &str) -> bool {
        self.extensions.iter().any(|e| e.uri == uri)
    }

    /// Qualifier URIs of every qualifier whose criteria match the certificate.
    pub fn matching_qualifiers(&self, profile: &CertificateProfile) -> Vec<String> {
        self.qualifiers
            .iter()
            .filter(|qualifier| qualifier.matches(profile))
            .flat_map(|qualifier| qualifier.qualifiers.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimpleServiceContext {
    pub certificates: Vec<Certificate>,
}

impl SimpleServiceContext {
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self { certificates }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountryServiceContext {
    pub certificates: Vec<Certificate>,
    pub service_type: String,
    /// Newest first
    service_chronological_infos: Vec<ServiceChronologicalInfo>,
}

impl CountryServiceContext {
    pub fn new(service_type: impl Into<String>) -> Self {
        Self {
            service_type: service_type.into(),
            ..Self::default()
        }
    }

    pub fn add_certificate(&mut self, certificate: Certificate) {
        self.certificates.push(certificate);
    }

    /// Insert keeping the list sorted descending by starting time.
    pub fn add_chronological_info(&mut self, info: ServiceChronologicalInfo) {
        let position = self
            .service_chronological_infos
            .iter()
            .position(|existing| existing.status_starting_time < info.status_starting_time)
            .unwrap_or(self.service_chronological_infos.len());
        self.service_chronological_infos.insert(position, info);
    }

    pub fn chronological_infos(&self) -> &[ServiceChronologicalInfo] {
        &self.service_chronological_infos
    }

    /// Status interval active at `date`: the newest one that started at or before it.
    pub fn current_chronological_info(
        &self,
        date: DateTime<Utc>,
    ) -> Option<&ServiceChronologicalInfo> {
        self.service_chronological_infos
            .iter()
            .find(|info| info.status_starting_time <= date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServiceContext {
    Simple(SimpleServiceContext),
    Country(CountryServiceContext),
}

impl ServiceContext {
    pub fn certificates(&self) -> &[Certificate] {
        match self {
            ServiceContext::Simple(context) => &context.certificates,
            ServiceContext::Country(context) => &context.certificates,
        }
    }

    pub fn contains(&self, certificate: &Certificate) -> bool {
        self.certificates().contains(certificate)
    }

    pub fn as_country(&self) -> Option<&CountryServiceContext> {
        match self {
            ServiceContext::Country(context) => Some(context),
            ServiceContext::Simple(_) => None,
        }
    }
}
