use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use tracing::warn;

use super::{ElementState, XmlAttributes, XmlTagHandler};
use crate::lotl::context::{
    AdditionalServiceInformationExtension, CountryServiceContext, QualifierExtension,
    ServiceChronologicalInfo,
};
use crate::lotl::criteria::{Assert, CriteriaList, Criterion, KeyUsageBit};
use crate::pki::Certificate;

#[derive(Debug, Default)]
struct InfoBuilder {
    status: Option<String>,
    starting_time: Option<DateTime<Utc>>,
    extensions: Vec<AdditionalServiceInformationExtension>,
    qualifiers: Vec<QualifierExtension>,
}

impl InfoBuilder {
    fn build(self) -> Option<ServiceChronologicalInfo> {
        Some(ServiceChronologicalInfo {
            service_status: self.status?,
            status_starting_time: self.starting_time?,
            extensions: self.extensions,
            qualifiers: self.qualifiers,
        })
    }
}

/// Criteria leaf being collected
#[derive(Debug)]
enum CriterionBuilder {
    KeyUsage(Vec<KeyUsageBit>),
    Oids(&'static str, Vec<String>),
}

/// Turns the `TSPService` entries of a national trusted list into
/// [`CountryServiceContext`]s.
#[derive(Debug, Default)]
pub struct CountryServiceHandler {
    state: ElementState,
    service_types: BTreeSet<String>,
    contexts: Vec<CountryServiceContext>,
    service: Option<CountryServiceContext>,
    info: Option<InfoBuilder>,
    qualification: Option<QualifierExtension>,
    criteria_stack: Vec<CriteriaList>,
    criterion: Option<CriterionBuilder>,
    key_usage_bit: Option<u8>,
}

impl CountryServiceHandler {
    /// Keep only services of the given types, an empty set keeps all of them.
    pub fn new(service_types: BTreeSet<String>) -> Self {
        Self {
            service_types,
            ..Self::default()
        }
    }

    pub fn into_contexts(self) -> Vec<CountryServiceContext> {
        self.contexts
    }

    fn end_service(&mut self) {
        let Some(service) = self.service.take() else {
            return;
        };
        if self.service_types.is_empty() || self.service_types.contains(&service.service_type) {
            self.contexts.push(service);
        }
    }

    fn end_info(&mut self) {
        let (Some(info), Some(service)) = (self.info.take(), self.service.as_mut()) else {
            return;
        };
        match info.build() {
            Some(info) => service.add_chronological_info(info),
            None => warn!(
                "Skipping status entry without status or starting time for {}",
                service.service_type
            ),
        }
    }

    fn end_criteria_list(&mut self) {
        let Some(list) = self.criteria_stack.pop() else {
            return;
        };
        if let Some(parent) = self.criteria_stack.last_mut() {
            parent.add_criterion(Criterion::List(list));
        } else if let Some(qualification) = self.qualification.as_mut() {
            qualification.criteria_list = list;
        }
    }

    fn end_criterion(&mut self) {
        let Some(builder) = self.criterion.take() else {
            return;
        };
        let criterion = match builder {
            CriterionBuilder::KeyUsage(bits) => Criterion::KeyUsage { bits },
            CriterionBuilder::Oids("PolicySet", oids) => Criterion::PolicySet { oids },
            CriterionBuilder::Oids("ExtendedKeyUsage", oids) => Criterion::ExtendedKeyUsage { oids },
            CriterionBuilder::Oids(_, oids) => Criterion::CertSubjectDnAttribute { oids },
        };
        if let Some(list) = self.criteria_stack.last_mut() {
            list.add_criterion(criterion);
        }
    }

    fn end_text_element(&mut self, name: &str, text: String) {
        match name {
            "ServiceTypeIdentifier" if self.state.parent() == Some("ServiceInformation") => {
                if let Some(service) = self.service.as_mut() {
                    service.service_type = text;
                }
            }
            "ServiceStatus" => {
                if let Some(info) = self.info.as_mut() {
                    info.status = Some(text);
                }
            }
            "StatusStartingTime" => {
                if let Some(info) = self.info.as_mut() {
                    match DateTime::parse_from_rfc3339(&text) {
                        Ok(time) => info.starting_time = Some(time.with_timezone(&Utc)),
                        Err(e) => warn!("Invalid StatusStartingTime '{text}': {e}"),
                    }
                }
            }
            "X509Certificate"
                if self.state.within("ServiceInformation")
                    && self.state.within("ServiceDigitalIdentity") =>
            {
                let Some(service) = self.service.as_mut() else {
                    return;
                };
                match Certificate::from_base64(&text) {
                    Ok(certificate) => service.add_certificate(certificate),
                    Err(e) => warn!("Skipping undecodable service certificate: {e}"),
                }
            }
            "URI" if self.state.parent() == Some("AdditionalServiceInformation") => {
                if let Some(info) = self.info.as_mut() {
                    info.extensions
                        .push(AdditionalServiceInformationExtension::new(text));
                }
            }
            "KeyUsageBit" => {
                if let (Some(bit), Some(CriterionBuilder::KeyUsage(bits))) =
                    (self.key_usage_bit.take(), self.criterion.as_mut())
                {
                    bits.push(KeyUsageBit {
                        bit,
                        value: text.eq_ignore_ascii_case("true"),
                    });
                }
            }
            "Identifier" => {
                if let Some(CriterionBuilder::Oids(_, oids)) = self.criterion.as_mut() {
                    let oid = text.strip_prefix("urn:oid:").unwrap_or(&text);
                    oids.push(oid.to_string());
                }
            }
            _ => {}
        }
    }
}

impl XmlTagHandler for CountryServiceHandler {
    fn start_element(&mut self, name: &str, attributes: &XmlAttributes) {
        match name {
            "TSPService" => self.service = Some(CountryServiceContext::default()),
            "ServiceInformation" | "ServiceHistoryInstance" if self.service.is_some() => {
                self.info = Some(InfoBuilder::default());
            }
            "QualificationElement" => self.qualification = Some(QualifierExtension::default()),
            "Qualifier" => {
                if let (Some(qualification), Some(uri)) =
                    (self.qualification.as_mut(), attributes.get("uri"))
                {
                    qualification.qualifiers.push(uri.to_string());
                }
            }
            "CriteriaList" => {
                let assert = attributes
                    .get("assert")
                    .map(Assert::from_attribute)
                    .unwrap_or_default();
                self.criteria_stack.push(CriteriaList::new(assert));
            }
            "KeyUsage" => self.criterion = Some(CriterionBuilder::KeyUsage(Vec::new())),
            "KeyUsageBit" => {
                self.key_usage_bit = attributes.get("name").and_then(KeyUsageBit::bit_for_name);
            }
            "PolicySet" => self.criterion = Some(CriterionBuilder::Oids("PolicySet", Vec::new())),
            "ExtendedKeyUsage" => {
                self.criterion = Some(CriterionBuilder::Oids("ExtendedKeyUsage", Vec::new()));
            }
            "CertSubjectDNAttribute" => {
                self.criterion = Some(CriterionBuilder::Oids("CertSubjectDNAttribute", Vec::new()));
            }
            _ => {}
        }
        self.state.start(name);
    }

    fn end_element(&mut self, name: &str) {
        let text = self.state.end();
        match name {
            "TSPService" => self.end_service(),
            "ServiceInformation" | "ServiceHistoryInstance" => self.end_info(),
            "QualificationElement" => {
                if let (Some(qualification), Some(info)) =
                    (self.qualification.take(), self.info.as_mut())
                {
                    info.qualifiers.push(qualification);
                }
                self.criteria_stack.clear();
            }
            "CriteriaList" => self.end_criteria_list(),
            "KeyUsage" | "PolicySet" | "ExtendedKeyUsage" | "CertSubjectDNAttribute" => {
                self.end_criterion()
            }
            _ => self.end_text_element(name, text),
        }
    }

    fn characters(&mut self, text: &str) {
        self.state.characters(text);
    }
}
