use std::fmt;

use serde::{Deserialize, Serialize};

/// Pointer from the list of trusted lists to one national trusted list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountrySpecificLotl {
    scheme_territory: String,
    tsl_location: String,
    mime_type: String,
}

impl CountrySpecificLotl {
    pub fn new(
        scheme_territory: impl Into<String>,
        tsl_location: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            scheme_territory: scheme_territory.into(),
            tsl_location: tsl_location.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn scheme_territory(&self) -> &str {
        &self.scheme_territory
    }

    pub fn tsl_location(&self) -> &str {
        &self.tsl_location
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Cache key of the country result, `schemeTerritory_tslLocation`.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.scheme_territory, self.tsl_location)
    }
}

impl fmt::Display for CountrySpecificLotl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.scheme_territory, self.tsl_location)
    }
}
