use tracing::warn;

use super::{ElementState, XmlAttributes, XmlTagHandler};
use crate::pki::Certificate;

/// Collects every `X509Certificate` of a trusted list, except the ones in
/// the list's own signature.
#[derive(Debug, Default)]
pub struct DefaultCertificateHandler {
    state: ElementState,
    certificates: Vec<Certificate>,
}

impl DefaultCertificateHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn into_certificates(self) -> Vec<Certificate> {
        self.certificates
    }
}

impl XmlTagHandler for DefaultCertificateHandler {
    fn start_element(&mut self, name: &str, _attributes: &XmlAttributes) {
        self.state.start(name);
    }

    fn end_element(&mut self, name: &str) {
        let text = self.state.end();
        if name != "X509Certificate" || self.state.within("Signature") {
            return;
        }
        match Certificate::from_base64(&text) {
            Ok(certificate) => {
                if !self.certificates.contains(&certificate) {
                    self.certificates.push(certificate);
                }
            }
            Err(e) => warn!("Skipping undecodable certificate: {e}"),
        }
    }

    fn characters(&mut self, text: &str) {
        self.state.characters(text);
    }
}
