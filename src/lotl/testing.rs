//! Fixtures shared by the trusted-list unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

use crate::adapters::xml_signature::{Result as SignatureResult, XmlSignatureError};
use crate::adapters::{ResourceRetriever, RetrieverError, SignatureVerification, XmlSignatureVerifier};
use crate::lotl::fetcher::EuropeanResourceFetcher;
use crate::lotl::properties::LotlFetchingProperties;
use crate::lotl::service::LotlService;
use crate::pki::Certificate;

pub const LOTL_URL: &str = "https://lotl.example/eu-lotl.xml";
pub const JOURNAL_URI: &str = "https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=OJ:C:2019:276";

pub fn certificate(name: &str) -> Certificate {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    params.distinguished_name = dn;
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    Certificate::from_der(cert.der()).unwrap()
}

/// Serves fixed bodies by URL, anything else is a 404.
#[derive(Debug, Default)]
pub struct MapRetriever {
    responses: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

impl MapRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, body: &[u8]) -> Self {
        self.responses.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceRetriever for MapRetriever {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, RetrieverError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| RetrieverError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// Accepts a signature whose SignatureValue is `valid`; the signer is the
/// KeyInfo certificate.
#[derive(Debug, Clone, Copy)]
pub struct FakeVerifier;

impl XmlSignatureVerifier for FakeVerifier {
    fn verify(&self, xml: &[u8]) -> SignatureResult<SignatureVerification> {
        let xml = std::str::from_utf8(xml)?;
        let value = between(xml, "<ds:SignatureValue>", "</ds:SignatureValue>")
            .ok_or_else(|| XmlSignatureError::Xml("No XML signature found in document".into()))?;
        let signer = between(xml, "<ds:X509Certificate>", "</ds:X509Certificate>")
            .ok_or_else(|| XmlSignatureError::Invalid("Signature carries no X509Certificate".into()))?;
        let valid = value == "valid";
        Ok(SignatureVerification {
            signer: Certificate::from_base64(signer)?,
            signature_valid: valid,
            failure: (!valid).then(|| "broken signature".to_string()),
        })
    }
}

fn between<'a>(xml: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = xml.find(open)? + open.len();
    let end = start + xml[start..].find(close)?;
    Some(&xml[start..end])
}

fn signature(signer: Option<(&Certificate, bool)>) -> String {
    let Some((certificate, valid)) = signer else {
        return String::new();
    };
    format!(
        r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignatureValue>{}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#,
        if valid { "valid" } else { "broken" },
        certificate.to_base64()
    )
}

/// A list of trusted lists with the given scheme URIs and country pointers.
pub fn lotl_document(
    scheme_uris: &[&str],
    pointers: &[(&str, &str, &Certificate)],
    signer: Option<(&Certificate, bool)>,
) -> String {
    let uris: String = scheme_uris
        .iter()
        .map(|uri| format!("<tsl:URI xml:lang=\"en\">{}</tsl:URI>", uri.replace('&', "&amp;")))
        .collect();
    let pointers: String = pointers
        .iter()
        .map(|(territory, location, certificate)| {
            format!(
                r#"<tsl:OtherTSLPointer><tsl:ServiceDigitalIdentities><tsl:ServiceDigitalIdentity><tsl:DigitalId><tsl:X509Certificate>{}</tsl:X509Certificate></tsl:DigitalId></tsl:ServiceDigitalIdentity></tsl:ServiceDigitalIdentities><tsl:TSLLocation>{location}</tsl:TSLLocation><tsl:AdditionalInformation><tsl:OtherInformation><tsl:SchemeTerritory>{territory}</tsl:SchemeTerritory></tsl:OtherInformation><tsl:OtherInformation><ns3:MimeType xmlns:ns3="http://uri.etsi.org/02231/v2/additionaltypes#">application/vnd.etsi.tsl+xml</ns3:MimeType></tsl:OtherInformation></tsl:AdditionalInformation></tsl:OtherTSLPointer>"#,
                certificate.to_base64()
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><tsl:TrustServiceStatusList xmlns:tsl="http://uri.etsi.org/02231/v2#"><tsl:SchemeInformation><tsl:SchemeTerritory>EU</tsl:SchemeTerritory><tsl:SchemeInformationURI>{uris}</tsl:SchemeInformationURI><tsl:PointersToOtherTSL>{pointers}</tsl:PointersToOtherTSL></tsl:SchemeInformation>{}</tsl:TrustServiceStatusList>"#,
        signature(signer)
    )
}

/// One `TSPService` with a single status starting in 2016.
pub fn service(service_type: &str, status: &str, certificate: &Certificate) -> String {
    format!(
        r#"<tsl:TSPService><tsl:ServiceInformation><tsl:ServiceTypeIdentifier>{service_type}</tsl:ServiceTypeIdentifier><tsl:ServiceDigitalIdentity><tsl:DigitalId><tsl:X509Certificate>{}</tsl:X509Certificate></tsl:DigitalId></tsl:ServiceDigitalIdentity><tsl:ServiceStatus>{status}</tsl:ServiceStatus><tsl:StatusStartingTime>2016-06-30T22:00:00Z</tsl:StatusStartingTime></tsl:ServiceInformation></tsl:TSPService>"#,
        certificate.to_base64()
    )
}

pub fn country_document(services: &[String], signer: Option<(&Certificate, bool)>) -> String {
    format!(
        r#"<tsl:TrustServiceStatusList xmlns:tsl="http://uri.etsi.org/02231/v2#"><tsl:TrustServiceProviderList><tsl:TrustServiceProvider><tsl:TSPServices>{}</tsl:TSPServices></tsl:TrustServiceProvider></tsl:TrustServiceProviderList>{}</tsl:TrustServiceStatusList>"#,
        services.concat(),
        signature(signer)
    )
}

/// Service over `retriever` whose EU journal certificate is `journal_signer`.
pub fn lotl_service(
    retriever: MapRetriever,
    journal_signer: &Certificate,
    properties: LotlFetchingProperties,
) -> LotlService {
    LotlService::new(
        Arc::new(retriever),
        Arc::new(FakeVerifier),
        LOTL_URL,
        EuropeanResourceFetcher::with_certificates(vec![journal_signer.clone()], JOURNAL_URI),
        properties,
    )
}
