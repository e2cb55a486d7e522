//! EU List of Trusted Lists (LOTL) processing.
//!
//! The [`LotlService`] fetches the main LOTL, the Official Journal resource,
//! the pivot chain and every national trusted list, and keeps the results in
//! a [`cache::LotlServiceCache`]. [`LotlValidator`] turns the cached results
//! into service contexts which back the [`LotlTrustedStore`] and the
//! [`QualifiedValidator`].

pub mod cache;
pub mod context;
pub mod country_lotl;
pub mod criteria;
pub mod errors;
pub mod fetcher;
pub mod properties;
pub mod qualified;
pub mod service;
pub mod signature_validator;
pub mod strategy;
pub mod trusted_store;
pub mod uris;
pub mod validation_context;
pub mod validator;
pub mod xml;

#[cfg(test)]
mod testing;

pub use cache::{InMemoryLotlServiceCache, LotlCacheDataV1, LotlServiceCache};
pub use context::{CountryServiceContext, ServiceContext};
pub use country_lotl::CountrySpecificLotl;
pub use errors::{LotlError, LotlResult};
pub use properties::LotlFetchingProperties;
pub use qualified::{QualifiedValidationConclusion, QualifiedValidator};
pub use service::LotlService;
pub use strategy::{CountryFailureAction, CountryFailureStrategy, OnCountryFailure};
pub use trusted_store::LotlTrustedStore;
pub use validation_context::{CertificateSource, ValidationContext};
pub use validator::{LotlValidationOutcome, LotlValidator};
