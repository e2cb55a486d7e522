use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::hash::{MessageDigest, hash};
use openssl::rsa::Padding;
use openssl::sign::{RsaPssSaltlen, Verifier};
use openssl::x509::X509;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::debug;

use super::c14n::{self, C14nMethod};
use super::constants::*;
use super::error::{Result, XmlSignatureError};
use super::utils;
use crate::pki::certificate::Certificate;

/// Outcome of verifying the signature embedded in an XML document.
#[derive(Debug, Clone)]
pub struct SignatureVerification {
    pub signer: Certificate,
    pub signature_valid: bool,
    /// Why the signature did not verify, if it did not
    pub failure: Option<String>,
}

/// Core XML-DSig verification: find the signature, check it, name the signer.
///
/// Trust in the signer is decided by the caller.
pub trait XmlSignatureVerifier: Send + Sync {
    fn verify(&self, xml: &[u8]) -> Result<SignatureVerification>;
}

/// Verifies enveloped XML-DSig signatures such as the ones on ETSI trusted lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvelopedSignatureVerifier;

impl EnvelopedSignatureVerifier {
    pub fn new() -> Self {
        Self
    }
}

impl XmlSignatureVerifier for EnvelopedSignatureVerifier {
    fn verify(&self, xml: &[u8]) -> Result<SignatureVerification> {
        let document = std::str::from_utf8(xml)?;
        let signature_xml = utils::extract_signature(document)?;
        let signature = SignatureParts::parse(&signature_xml)?;

        let encoded_cert = signature.certificate.as_deref().ok_or_else(|| {
            XmlSignatureError::Invalid("Signature carries no X509Certificate".into())
        })?;
        let signer = Certificate::from_base64(encoded_cert)?;

        if let Some(failure) = verify_references(document, &signature.references)? {
            debug!("Reference check failed: {failure}");
            return Ok(SignatureVerification {
                signer,
                signature_valid: false,
                failure: Some(failure),
            });
        }

        let signed_info_xml = utils::extract_element(&signature_xml, SIGNED_INFO_ELEMENT)?;
        let method = C14nMethod::from_uri(&signature.canonicalization_method).ok_or_else(|| {
            XmlSignatureError::UnsupportedAlgorithm(signature.canonicalization_method.clone())
        })?;
        let prefixes: Option<Vec<&str>> = signature
            .canonicalization_prefixes
            .as_ref()
            .map(|list| list.split_whitespace().collect());
        let signed_info_c14n = c14n::canonicalize(&signed_info_xml, method, prefixes.as_deref())?;

        let signature_value = decode_base64(&signature.signature_value)?;
        let valid = verify_signature_value(
            &signature.signature_method,
            &signer,
            signed_info_c14n.as_bytes(),
            &signature_value,
        )?;

        Ok(SignatureVerification {
            signer,
            signature_valid: valid,
            failure: (!valid).then(|| "SignatureValue does not match SignedInfo".to_string()),
        })
    }
}

#[derive(Debug, Clone, Default)]
struct Transform {
    algorithm: String,
    inclusive_prefixes: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Reference {
    uri: String,
    transforms: Vec<Transform>,
    digest_method: String,
    digest_value: String,
}

#[derive(Debug, Clone, Default)]
struct SignatureParts {
    canonicalization_method: String,
    canonicalization_prefixes: Option<String>,
    signature_method: String,
    references: Vec<Reference>,
    signature_value: String,
    certificate: Option<String>,
}

impl SignatureParts {
    fn parse(signature_xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(signature_xml);
        reader.config_mut().expand_empty_elements = true;

        let mut parts = SignatureParts::default();
        let mut path: Vec<String> = Vec::new();
        let mut current_reference: Option<Reference> = None;
        let mut text = String::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    let parent = path.last().map(String::as_str);
                    match (name.as_str(), parent) {
                        (CANONICALIZATION_METHOD_ELEMENT, Some(SIGNED_INFO_ELEMENT)) => {
                            parts.canonicalization_method = algorithm(&e)?;
                        }
                        (SIGNATURE_METHOD_ELEMENT, _) => parts.signature_method = algorithm(&e)?,
                        (REFERENCE_ELEMENT, _) => {
                            current_reference = Some(Reference {
                                uri: attribute(&e, URI_ATTRIBUTE)?.unwrap_or_default(),
                                ..Reference::default()
                            });
                        }
                        (TRANSFORM_ELEMENT, _) => {
                            if let Some(reference) = current_reference.as_mut() {
                                reference.transforms.push(Transform {
                                    algorithm: algorithm(&e)?,
                                    inclusive_prefixes: None,
                                });
                            }
                        }
                        (INCLUSIVE_NAMESPACES_ELEMENT, Some(CANONICALIZATION_METHOD_ELEMENT)) => {
                            parts.canonicalization_prefixes =
                                attribute(&e, PREFIX_LIST_ATTRIBUTE)?;
                        }
                        (INCLUSIVE_NAMESPACES_ELEMENT, Some(TRANSFORM_ELEMENT)) => {
                            let prefixes = attribute(&e, PREFIX_LIST_ATTRIBUTE)?;
                            if let Some(transform) = current_reference
                                .as_mut()
                                .and_then(|reference| reference.transforms.last_mut())
                            {
                                transform.inclusive_prefixes = prefixes;
                            }
                        }
                        (DIGEST_METHOD_ELEMENT, _) => {
                            if let Some(reference) = current_reference.as_mut() {
                                reference.digest_method = algorithm(&e)?;
                            }
                        }
                        _ => {}
                    }
                    path.push(name);
                    text.clear();
                }
                Event::Text(e) => text.push_str(&e.unescape()?),
                Event::End(_) => {
                    let name = path.pop().unwrap_or_default();
                    match name.as_str() {
                        DIGEST_VALUE_ELEMENT => {
                            if let Some(reference) = current_reference.as_mut() {
                                reference.digest_value = text.trim().to_string();
                            }
                        }
                        REFERENCE_ELEMENT => {
                            if let Some(reference) = current_reference.take() {
                                parts.references.push(reference);
                            }
                        }
                        SIGNATURE_VALUE_ELEMENT => parts.signature_value = text.trim().to_string(),
                        X509_CERTIFICATE_ELEMENT
                            if parts.certificate.is_none()
                                && path.iter().any(|p| p == KEY_INFO_ELEMENT) =>
                        {
                            parts.certificate = Some(text.trim().to_string());
                        }
                        _ => {}
                    }
                    text.clear();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if parts.references.is_empty() {
            return Err(XmlSignatureError::Invalid("SignedInfo has no Reference".into()));
        }
        Ok(parts)
    }
}

fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn algorithm(e: &BytesStart) -> Result<String> {
    attribute(e, ALGORITHM_ATTRIBUTE)?.ok_or_else(|| {
        XmlSignatureError::Invalid(format!(
            "{} without Algorithm",
            String::from_utf8_lossy(e.local_name().as_ref())
        ))
    })
}

fn decode_base64(value: &str) -> Result<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(BASE64.decode(compact)?)
}

fn digest_algorithm(uri: &str) -> Result<MessageDigest> {
    match uri {
        SHA1 => Ok(MessageDigest::sha1()),
        SHA256 => Ok(MessageDigest::sha256()),
        SHA384 => Ok(MessageDigest::sha384()),
        SHA512 => Ok(MessageDigest::sha512()),
        alg => Err(XmlSignatureError::UnsupportedAlgorithm(alg.to_string())),
    }
}

/// Verify digest values for all references.
///
/// Returns a description of the first mismatch, `None` when all match.
fn verify_references(document: &str, references: &[Reference]) -> Result<Option<String>> {
    for reference in references {
        let data = if reference.uri.is_empty() {
            document.to_string()
        } else {
            let id = reference.uri.strip_prefix('#').ok_or_else(|| {
                XmlSignatureError::Invalid(format!("Unsupported reference URI: {}", reference.uri))
            })?;
            utils::extract_element_by_id(document, id)?
        };
        let transformed = apply_transforms(data, &reference.transforms)?;

        let computed_digest = hash(digest_algorithm(&reference.digest_method)?, transformed.as_bytes())?;
        let expected_digest = decode_base64(&reference.digest_value)?;

        if computed_digest[..] != expected_digest[..] {
            return Ok(Some(format!(
                "Digest mismatch for reference '{}'",
                reference.uri
            )));
        }
    }
    Ok(None)
}

fn apply_transforms(data: String, transforms: &[Transform]) -> Result<String> {
    let mut result = data;
    let mut canonical = false;

    for transform in transforms {
        if transform.algorithm == ENVELOPED_SIGNATURE {
            result = utils::remove_enveloped_signature(&result)?;
            canonical = false;
        } else if let Some(method) = C14nMethod::from_uri(&transform.algorithm) {
            let prefixes: Option<Vec<&str>> = transform
                .inclusive_prefixes
                .as_ref()
                .map(|list| list.split_whitespace().collect());
            result = c14n::canonicalize(&result, method, prefixes.as_deref())?;
            canonical = true;
        } else {
            return Err(XmlSignatureError::UnsupportedAlgorithm(
                transform.algorithm.clone(),
            ));
        }
    }

    // A node-set left by the transforms is serialized with Canonical XML 1.0
    if !canonical {
        result = c14n::canonicalize(&result, C14nMethod::INCLUSIVE, None)?;
    }
    Ok(result)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyKind {
    Rsa,
    RsaPss,
    Ecdsa,
}

fn signature_algorithm(uri: &str) -> Result<(MessageDigest, KeyKind)> {
    let algorithm = match uri {
        RSA_SHA1 => (MessageDigest::sha1(), KeyKind::Rsa),
        RSA_SHA256 => (MessageDigest::sha256(), KeyKind::Rsa),
        RSA_SHA384 => (MessageDigest::sha384(), KeyKind::Rsa),
        RSA_SHA512 => (MessageDigest::sha512(), KeyKind::Rsa),
        RSA_PSS_SHA256 => (MessageDigest::sha256(), KeyKind::RsaPss),
        RSA_PSS_SHA384 => (MessageDigest::sha384(), KeyKind::RsaPss),
        RSA_PSS_SHA512 => (MessageDigest::sha512(), KeyKind::RsaPss),
        ECDSA_SHA256 => (MessageDigest::sha256(), KeyKind::Ecdsa),
        ECDSA_SHA384 => (MessageDigest::sha384(), KeyKind::Ecdsa),
        ECDSA_SHA512 => (MessageDigest::sha512(), KeyKind::Ecdsa),
        alg => return Err(XmlSignatureError::UnsupportedAlgorithm(alg.to_string())),
    };
    Ok(algorithm)
}

/// XML-DSig carries ECDSA signatures as raw `r || s`, openssl wants DER.
fn ecdsa_raw_to_der(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.is_empty() || raw.len() % 2 != 0 {
        return Err(XmlSignatureError::Invalid(
            "ECDSA signature value has odd length".into(),
        ));
    }
    let (r, s) = raw.split_at(raw.len() / 2);
    let signature = EcdsaSig::from_private_components(BigNum::from_slice(r)?, BigNum::from_slice(s)?)?;
    Ok(signature.to_der()?)
}

fn verify_signature_value(
    algorithm_uri: &str,
    signer: &Certificate,
    data: &[u8],
    signature: &[u8],
) -> Result<bool> {
    let (digest, kind) = signature_algorithm(algorithm_uri)?;
    let public_key = X509::from_der(signer.der())?.public_key()?;

    let der_signature;
    let signature = if kind == KeyKind::Ecdsa {
        der_signature = ecdsa_raw_to_der(signature)?;
        der_signature.as_slice()
    } else {
        signature
    };

    let mut verifier = Verifier::new(digest, &public_key)?;
    if kind == KeyKind::RsaPss {
        verifier.set_rsa_padding(Padding::PKCS1_PSS)?;
        verifier.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
        verifier.set_rsa_mgf1_md(digest)?;
    }
    verifier.update(data)?;
    // openssl reports malformed signatures as errors, they are simply not valid
    Ok(verifier.verify(signature).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use openssl::asn1::Asn1Time;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::nid::Nid;
    use openssl::pkey::{PKey, Private};
    use openssl::rsa::Rsa;
    use openssl::sign::Signer;
    use openssl::x509::{X509Builder, X509NameBuilder};

    const UNSIGNED_OPEN: &str = r#"<tsl:TrustServiceStatusList xmlns:tsl="http://uri.etsi.org/02231/v2#" Id="tsl"><tsl:SchemeInformation><tsl:TSLSequenceNumber>42</tsl:TSLSequenceNumber></tsl:SchemeInformation>"#;
    const UNSIGNED_CLOSE: &str = "</tsl:TrustServiceStatusList>";
    const PLACEHOLDER: &str = "SIGNATURE_PLACEHOLDER";

    fn self_signed(key: &PKey<Private>, cn: &str) -> X509 {
        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_text("CN", cn).unwrap();
        let name = name.build();

        let mut builder = X509Builder::new().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(365).unwrap())
            .unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.sign(key, MessageDigest::sha256()).unwrap();
        builder.build()
    }

    fn rsa_key() -> PKey<Private> {
        PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap()
    }

    fn ec_key() -> PKey<Private> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
    }

    /// Sign the test list with an enveloped signature over the whole document.
    fn sign_document(key: &PKey<Private>, cert: &X509, signature_method: &str) -> String {
        let unsigned = format!("{UNSIGNED_OPEN}{UNSIGNED_CLOSE}");
        let canonical = c14n::canonicalize(&unsigned, C14nMethod::EXCLUSIVE, None).unwrap();
        let digest = BASE64.encode(hash(MessageDigest::sha256(), canonical.as_bytes()).unwrap());

        let signed_info = format!(
            r#"<ds:SignedInfo><ds:CanonicalizationMethod Algorithm="{EXCLUSIVE_C14N}"/><ds:SignatureMethod Algorithm="{signature_method}"/><ds:Reference URI=""><ds:Transforms><ds:Transform Algorithm="{ENVELOPED_SIGNATURE}"/><ds:Transform Algorithm="{EXCLUSIVE_C14N}"/></ds:Transforms><ds:DigestMethod Algorithm="{SHA256}"/><ds:DigestValue>{digest}</ds:DigestValue></ds:Reference></ds:SignedInfo>"#
        );
        let cert_b64 = BASE64.encode(cert.to_der().unwrap());
        let template = format!(
            r#"{UNSIGNED_OPEN}<ds:Signature xmlns:ds="{XMLDSIG_NAMESPACE}" Id="sig">{signed_info}<ds:SignatureValue>{PLACEHOLDER}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{cert_b64}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>{UNSIGNED_CLOSE}"#
        );

        let signed_info_xml = utils::extract_element(&template, SIGNED_INFO_ELEMENT).unwrap();
        let signed_info_c14n =
            c14n::canonicalize(&signed_info_xml, C14nMethod::EXCLUSIVE, None).unwrap();

        let mut signer = Signer::new(MessageDigest::sha256(), key).unwrap();
        if signature_method == RSA_PSS_SHA256 {
            signer.set_rsa_padding(Padding::PKCS1_PSS).unwrap();
            signer
                .set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)
                .unwrap();
            signer.set_rsa_mgf1_md(MessageDigest::sha256()).unwrap();
        }
        signer.update(signed_info_c14n.as_bytes()).unwrap();
        let mut signature = signer.sign_to_vec().unwrap();

        if signature_method == ECDSA_SHA256 {
            let der = EcdsaSig::from_der(&signature).unwrap();
            signature = der.r().to_vec_padded(32).unwrap();
            signature.extend(der.s().to_vec_padded(32).unwrap());
        }

        template.replace(PLACEHOLDER, &BASE64.encode(signature))
    }

    #[test]
    fn test_valid_rsa_signature() {
        let key = rsa_key();
        let cert = self_signed(&key, "LOTL Signer");
        let xml = sign_document(&key, &cert, RSA_SHA256);

        let result = EnvelopedSignatureVerifier::new().verify(xml.as_bytes()).unwrap();
        assert!(result.signature_valid, "{:?}", result.failure);
        assert_eq!(result.signer.der(), cert.to_der().unwrap().as_slice());
    }

    #[test]
    fn test_valid_rsa_pss_signature() {
        let key = rsa_key();
        let cert = self_signed(&key, "LOTL Signer");
        let xml = sign_document(&key, &cert, RSA_PSS_SHA256);

        let result = EnvelopedSignatureVerifier::new().verify(xml.as_bytes()).unwrap();
        assert!(result.signature_valid, "{:?}", result.failure);
    }

    #[test]
    fn test_valid_ecdsa_signature() {
        let key = ec_key();
        let cert = self_signed(&key, "LOTL Signer");
        let xml = sign_document(&key, &cert, ECDSA_SHA256);

        let result = EnvelopedSignatureVerifier::new().verify(xml.as_bytes()).unwrap();
        assert!(result.signature_valid, "{:?}", result.failure);
    }

    #[test]
    fn test_tampered_content_fails_digest() {
        let key = rsa_key();
        let cert = self_signed(&key, "LOTL Signer");
        let xml = sign_document(&key, &cert, RSA_SHA256).replace(">42<", ">43<");

        let result = EnvelopedSignatureVerifier::new().verify(xml.as_bytes()).unwrap();
        assert!(!result.signature_valid);
        assert!(result.failure.unwrap().contains("Digest mismatch"));
    }

    #[test]
    fn test_signature_by_other_key_is_invalid() {
        let key = rsa_key();
        let cert = self_signed(&key, "LOTL Signer");
        let other_cert = self_signed(&rsa_key(), "Impostor");
        let cert_b64 = BASE64.encode(cert.to_der().unwrap());
        let other_b64 = BASE64.encode(other_cert.to_der().unwrap());
        let xml = sign_document(&key, &cert, RSA_SHA256).replace(&cert_b64, &other_b64);

        let result = EnvelopedSignatureVerifier::new().verify(xml.as_bytes()).unwrap();
        assert!(!result.signature_valid);
        assert_eq!(result.signer.der(), other_cert.to_der().unwrap().as_slice());
    }

    #[test]
    fn test_unsigned_document_is_error() {
        let xml = format!("{UNSIGNED_OPEN}{UNSIGNED_CLOSE}");
        assert!(EnvelopedSignatureVerifier::new().verify(xml.as_bytes()).is_err());
    }

    #[test]
    fn test_unsupported_signature_method() {
        let key = rsa_key();
        let cert = self_signed(&key, "LOTL Signer");
        let xml = sign_document(&key, &cert, RSA_SHA256)
            .replace(RSA_SHA256, "http://example.com/unknown");

        let err = EnvelopedSignatureVerifier::new()
            .verify(xml.as_bytes())
            .unwrap_err();
        assert!(matches!(err, XmlSignatureError::UnsupportedAlgorithm(_)));
    }
}
