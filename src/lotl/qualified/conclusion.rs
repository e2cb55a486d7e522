use std::fmt;

use serde::{Deserialize, Serialize};

/// eIDAS qualification of a signing certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualifiedValidationConclusion {
    EsigWithQc,
    EsigWithQcAndQscd,
    EsealWithQc,
    EsealWithQcAndQscd,
    UnknownQc,
    UnknownQcAndQscd,
    NotQualifiedEsig,
    NotQualifiedEseal,
    NotQualified,
    Unknown,
    Incoherent,
    /// No trusted list entry applies
    NotCatching,
}

impl QualifiedValidationConclusion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EsigWithQc => "ESIG_WITH_QC",
            Self::EsigWithQcAndQscd => "ESIG_WITH_QC_AND_QSCD",
            Self::EsealWithQc => "ESEAL_WITH_QC",
            Self::EsealWithQcAndQscd => "ESEAL_WITH_QC_AND_QSCD",
            Self::UnknownQc => "UNKNOWN_QC",
            Self::UnknownQcAndQscd => "UNKNOWN_QC_AND_QSCD",
            Self::NotQualifiedEsig => "NOT_QUALIFIED_ESIG",
            Self::NotQualifiedEseal => "NOT_QUALIFIED_ESEAL",
            Self::NotQualified => "NOT_QUALIFIED",
            Self::Unknown => "UNKNOWN",
            Self::Incoherent => "INCOHERENT",
            Self::NotCatching => "NOT_CATCHING",
        }
    }

    pub fn is_qualified(&self) -> bool {
        matches!(
            self,
            Self::EsigWithQc
                | Self::EsigWithQcAndQscd
                | Self::EsealWithQc
                | Self::EsealWithQcAndQscd
                | Self::UnknownQc
                | Self::UnknownQcAndQscd
        )
    }

    /// Not qualified, keeping the certificate type this conclusion carries.
    pub fn without_qualification(&self) -> Self {
        match self {
            Self::EsigWithQc | Self::EsigWithQcAndQscd | Self::NotQualifiedEsig => {
                Self::NotQualifiedEsig
            }
            Self::EsealWithQc | Self::EsealWithQcAndQscd | Self::NotQualifiedEseal => {
                Self::NotQualifiedEseal
            }
            _ => Self::NotQualified,
        }
    }
}

impl fmt::Display for QualifiedValidationConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
