pub mod country;
pub mod european_lotl;
pub mod european_resource;
pub mod pivot;

pub use country::{CountrySpecificLotlFetcher, CountrySpecificLotlFetcherResult};
pub use european_lotl::{EuropeanLotlFetcher, EuropeanLotlFetcherResult};
pub use european_resource::{EuropeanResourceFetcher, EuropeanResourceFetcherResult};
pub use pivot::{PivotFetcher, PivotFetcherResult};

/// Raw document bytes as base64 in snapshots.
pub(crate) mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(D::Error::custom)
    }
}
