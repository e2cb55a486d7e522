//! ETSI EN 319 412-5 QcStatements and qualified certificate policy identifiers.

use x509_parser::der_parser::ber::BerObject;
use x509_parser::der_parser::der::parse_der;
use x509_parser::prelude::X509Certificate;

use super::certificate::CertificateError;

pub const QC_STATEMENTS_OID: &str = "1.3.6.1.5.5.7.1.3";

pub const QC_COMPLIANCE_OID: &str = "0.4.0.1862.1.1";
pub const QC_SSCD_OID: &str = "0.4.0.1862.1.4";
pub const QC_TYPE_OID: &str = "0.4.0.1862.1.6";
pub const QC_TYPE_ESIGN_OID: &str = "0.4.0.1862.1.6.1";
pub const QC_TYPE_ESEAL_OID: &str = "0.4.0.1862.1.6.2";
pub const QC_TYPE_WEB_OID: &str = "0.4.0.1862.1.6.3";

/// EU qualified certificate policies (ETSI EN 319 411-2).
pub const QCP_NATURAL_OID: &str = "0.4.0.194112.1.0";
pub const QCP_LEGAL_OID: &str = "0.4.0.194112.1.1";
pub const QCP_NATURAL_QSCD_OID: &str = "0.4.0.194112.1.2";
pub const QCP_LEGAL_QSCD_OID: &str = "0.4.0.194112.1.3";
pub const QCP_WEB_OID: &str = "0.4.0.194112.1.4";

/// Pre-eIDAS qualified certificate policies (ETSI TS 101 456).
pub const QCP_PUBLIC_OID: &str = "0.4.0.1456.1.2";
pub const QCP_PUBLIC_WITH_SSCD_OID: &str = "0.4.0.1456.1.1";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QcType {
    Esign,
    Eseal,
    Web,
    Other(String),
}

impl QcType {
    fn from_oid(oid: &str) -> Self {
        match oid {
            QC_TYPE_ESIGN_OID => QcType::Esign,
            QC_TYPE_ESEAL_OID => QcType::Eseal,
            QC_TYPE_WEB_OID => QcType::Web,
            other => QcType::Other(other.to_string()),
        }
    }
}

/// Decoded content of the QcStatements extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QcStatements {
    pub compliance: bool,
    pub sscd: bool,
    pub types: Vec<QcType>,
    /// Statement identifiers this module does not interpret.
    pub other_statements: Vec<String>,
}

/// Find and decode the QcStatements extension, `None` if the certificate has none.
pub fn from_certificate(
    cert: &X509Certificate<'_>,
) -> Result<Option<QcStatements>, CertificateError> {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid.to_id_string() == QC_STATEMENTS_OID)
        .map(|ext| parse(ext.value))
        .transpose()
}

/// Decode `QCStatements ::= SEQUENCE OF QCStatement`.
pub fn parse(der: &[u8]) -> Result<QcStatements, CertificateError> {
    let (_, outer) = parse_der(der).map_err(invalid)?;
    let mut statements = QcStatements::default();

    for statement in outer.as_sequence().map_err(invalid)? {
        let fields = statement.as_sequence().map_err(invalid)?;
        let Some(id) = fields.first() else {
            return Err(CertificateError::Invalid("empty QCStatement".into()));
        };
        let id = id.as_oid().map_err(invalid)?.to_id_string();

        match id.as_str() {
            QC_COMPLIANCE_OID => statements.compliance = true,
            QC_SSCD_OID => statements.sscd = true,
            QC_TYPE_OID => {
                if let Some(info) = fields.get(1) {
                    statements.types.extend(parse_qc_types(info)?);
                }
            }
            _ => statements.other_statements.push(id),
        }
    }
    Ok(statements)
}

fn parse_qc_types(info: &BerObject<'_>) -> Result<Vec<QcType>, CertificateError> {
    info.as_sequence()
        .map_err(invalid)?
        .iter()
        .map(|item| {
            item.as_oid()
                .map(|oid| QcType::from_oid(&oid.to_id_string()))
                .map_err(invalid)
        })
        .collect()
}

fn invalid(e: impl std::fmt::Display) -> CertificateError {
    CertificateError::Invalid(format!("malformed QcStatements: {e}"))
}

/// Minimal DER writers used to build QcStatements and policy extensions in tests.
#[cfg(test)]
pub(crate) mod der {
    pub fn oid(dotted: &str) -> Vec<u8> {
        let arcs: Vec<u64> = dotted.split('.').map(|a| a.parse().unwrap()).collect();
        let mut body = vec![(arcs[0] * 40 + arcs[1]) as u8];
        for &arc in &arcs[2..] {
            let mut chunk = vec![(arc & 0x7f) as u8];
            let mut rest = arc >> 7;
            while rest > 0 {
                chunk.push(((rest & 0x7f) as u8) | 0x80);
                rest >>= 7;
            }
            chunk.reverse();
            body.extend(chunk);
        }
        tlv(0x06, body)
    }

    pub fn sequence(items: Vec<Vec<u8>>) -> Vec<u8> {
        tlv(0x30, items.concat())
    }

    fn tlv(tag: u8, body: Vec<u8>) -> Vec<u8> {
        assert!(body.len() < 128);
        let mut out = vec![tag, body.len() as u8];
        out.extend(body);
        out
    }

    pub fn qc_statements(compliance: bool, sscd: bool, types: &[&str]) -> Vec<u8> {
        let mut statements = Vec::new();
        if compliance {
            statements.push(sequence(vec![oid(super::QC_COMPLIANCE_OID)]));
        }
        if sscd {
            statements.push(sequence(vec![oid(super::QC_SSCD_OID)]));
        }
        if !types.is_empty() {
            let type_oids = types.iter().map(|t| oid(t)).collect();
            statements.push(sequence(vec![oid(super::QC_TYPE_OID), sequence(type_oids)]));
        }
        sequence(statements)
    }

    pub fn certificate_policies(policies: &[&str]) -> Vec<u8> {
        sequence(policies.iter().map(|p| sequence(vec![oid(p)])).collect())
    }
}
