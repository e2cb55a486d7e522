use std::sync::Arc;

use axum::{Router, routing::get};
use lotl_trust::adapters::xml_signature::XmlSignatureError;
use lotl_trust::adapters::xml_signature::error::Result as SignatureResult;
use lotl_trust::adapters::{HttpResourceRetriever, SignatureVerification, XmlSignatureVerifier};
use lotl_trust::config::HttpConfig;
use lotl_trust::lotl::fetcher::EuropeanResourceFetcher;
use lotl_trust::lotl::{LotlFetchingProperties, LotlService};
use lotl_trust::pki::Certificate;
use lotl_trust::telemetry;
use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};
use tokio::net::TcpListener;

pub const JOURNAL_URI: &str = "https://eur-lex.europa.eu/legal-content/EN/TXT/?uri=OJ:C:2019:276";
pub const CA_QC: &str = "http://uri.etsi.org/TrstSvc/Svctype/CA/QC";
pub const GRANTED: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/granted";
#[allow(dead_code)]
pub const WITHDRAWN: &str = "http://uri.etsi.org/TrstSvc/TrustedList/Svcstatus/withdrawn";

pub fn certificate(name: &str) -> Certificate {
    let mut params = CertificateParams::default();
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, name);
    params.distinguished_name = dn;
    let key_pair = KeyPair::generate().unwrap();
    let cert = params.self_signed(&key_pair).unwrap();
    Certificate::from_der(cert.der()).unwrap()
}

/// Stands in for XML-DSig: a `SignatureValue` of `valid` verifies and the
/// signer is the KeyInfo certificate.
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

fn signature(signer: &Certificate, valid: bool) -> String {
    format!(
        r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignatureValue>{}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#,
        if valid { "valid" } else { "broken" },
        signer.to_base64()
    )
}

pub fn lotl_document(
    scheme_uris: &[&str],
    pointers: &[(&str, &str, &Certificate)],
    signer: &Certificate,
    valid: bool,
) -> String {
    let uris: String = scheme_uris
        .iter()
        .map(|uri| format!("<tsl:URI xml:lang=\"en\">{uri}</tsl:URI>"))
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
        signature(signer, valid)
    )
}

/// `TSPService` whose status history is `(status, starting time)` newest first.
pub fn service(service_type: &str, history: &[(&str, &str)], certificate: &Certificate) -> String {
    let digital_identity = format!(
        "<tsl:ServiceDigitalIdentity><tsl:DigitalId><tsl:X509Certificate>{}</tsl:X509Certificate></tsl:DigitalId></tsl:ServiceDigitalIdentity>",
        certificate.to_base64()
    );
    let (current, older) = history.split_first().expect("at least one status");
    let older: String = older
        .iter()
        .map(|(status, start)| {
            format!(
                "<tsl:ServiceHistoryInstance><tsl:ServiceTypeIdentifier>{service_type}</tsl:ServiceTypeIdentifier>{digital_identity}<tsl:ServiceStatus>{status}</tsl:ServiceStatus><tsl:StatusStartingTime>{start}</tsl:StatusStartingTime></tsl:ServiceHistoryInstance>"
            )
        })
        .collect();
    format!(
        "<tsl:TSPService><tsl:ServiceInformation><tsl:ServiceTypeIdentifier>{service_type}</tsl:ServiceTypeIdentifier>{digital_identity}<tsl:ServiceStatus>{}</tsl:ServiceStatus><tsl:StatusStartingTime>{}</tsl:StatusStartingTime></tsl:ServiceInformation><tsl:ServiceHistory>{older}</tsl:ServiceHistory></tsl:TSPService>",
        current.0, current.1
    )
}

pub fn country_document(services: &[String], signer: &Certificate) -> String {
    format!(
        r#"<tsl:TrustServiceStatusList xmlns:tsl="http://uri.etsi.org/02231/v2#"><tsl:TrustServiceProviderList><tsl:TrustServiceProvider><tsl:TSPServices>{}</tsl:TSPServices></tsl:TrustServiceProvider></tsl:TrustServiceProviderList>{}</tsl:TrustServiceStatusList>"#,
        services.concat(),
        signature(signer, true)
    )
}

/// Local HTTP server publishing trusted-list documents.
pub struct TrustListServer {
    listener: TcpListener,
    base: String,
    router: Router,
}

impl TrustListServer {
    pub async fn bind() -> Self {
        telemetry::init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        Self {
            listener,
            base,
            router: Router::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base)
    }

    pub fn publish(mut self, path: &str, body: String) -> Self {
        self.router = self.router.route(
            &format!("/{path}"),
            get(move || {
                let body = body.clone();
                async move { body }
            }),
        );
        self
    }

    /// Serve in the background; unpublished paths answer 404.
    pub fn spawn(self) {
        tokio::spawn(async move {
            axum::serve(self.listener, self.router).await.unwrap();
        });
    }
}

pub fn http_service(
    lotl_url: &str,
    journal_signer: &Certificate,
    properties: LotlFetchingProperties,
) -> LotlService {
    let retriever = HttpResourceRetriever::new(&HttpConfig {
        timeout_secs: 5,
        user_agent: "lotl-trust-test".to_string(),
    })
    .unwrap();
    LotlService::new(
        Arc::new(retriever),
        Arc::new(FakeVerifier),
        lotl_url,
        EuropeanResourceFetcher::with_certificates(vec![journal_signer.clone()], JOURNAL_URI),
        properties,
    )
}
