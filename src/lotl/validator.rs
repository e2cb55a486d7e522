use std::sync::Arc;

use tracing::{info, warn};

use crate::lotl::context::ServiceContext;
use crate::lotl::errors::LotlResult;
use crate::lotl::service::LotlService;
use crate::lotl::strategy::CountryFailureAction;
use crate::report::ValidationReport;

/// Merged report and country service contexts of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct LotlValidationOutcome {
    pub report: ValidationReport,
    pub contexts: Vec<ServiceContext>,
}

impl LotlValidationOutcome {
    pub fn is_valid(&self) -> bool {
        self.report.is_valid()
    }
}

/// Runs the trusted-list pipeline once against the service's cache.
#[derive(Debug, Clone)]
pub struct LotlValidator {
    service: Arc<LotlService>,
}

impl LotlValidator {
    pub fn new(service: Arc<LotlService>) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &Arc<LotlService> {
        &self.service
    }

    /// Main LOTL and pivot failures end the run with an invalid report and no
    /// contexts. Failed countries are handed to the failure strategy and
    /// only contribute INFO items.
    pub async fn validate(&self) -> LotlResult<LotlValidationOutcome> {
        let mut outcome = LotlValidationOutcome::default();

        let lotl = self.service.get_lotl_result().await?;
        outcome.report.merge(lotl.local_report());
        if !outcome.report.is_valid() {
            warn!("Main LOTL is not usable, no trust services are available");
            return Ok(outcome);
        }

        let european_resource = self.service.get_european_resource_result().await?;
        outcome.report.merge(european_resource.local_report());
        let pivot = self.service.get_pivot_result().await?;
        outcome.report.merge(pivot.local_report());
        if !outcome.report.is_valid() {
            warn!("Pivot chain is not valid, no trust services are available");
            return Ok(outcome);
        }

        let strategy = self.service.properties().failure_strategy();
        for mut country in self.service.get_country_specific_lotls().await? {
            if country.has_failed() {
                let action = strategy.on_country_failure(&mut country)?;
                let mut report = country.local_report().clone();
                report.downgrade_to_info();
                outcome.report.merge(&report);
                if action == CountryFailureAction::Remove {
                    continue;
                }
            } else {
                outcome.report.merge(country.local_report());
            }
            outcome.contexts.extend(country.into_contexts());
        }

        info!(
            "Trusted-list validation finished with {} service contexts",
            outcome.contexts.len()
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lotl::fetcher::country::COULD_NOT_RESOLVE_URL;
    use crate::lotl::properties::LotlFetchingProperties;
    use crate::lotl::strategy::{COUNTRY_FAILURE_CHECK, CountryFailureStrategy};
    use crate::lotl::testing::{self, MapRetriever};
    use crate::lotl::uris;
    use crate::report::ReportItemStatus;

    const DE: &str = "https://tl.example/de.xml";
    const FR: &str = "https://tl.example/fr.xml";

    fn retriever(lotl_signer: &crate::pki::Certificate) -> MapRetriever {
        let de_signer = testing::certificate("DE signer");
        let fr_signer = testing::certificate("FR signer");
        let service = testing::certificate("DE CA");
        let lotl = testing::lotl_document(
            &[testing::JOURNAL_URI],
            &[("DE", DE, &de_signer), ("FR", FR, &fr_signer)],
            Some((lotl_signer, true)),
        );
        let de = testing::country_document(
            &[testing::service(uris::SVC_TYPE_CA_QC, uris::STATUS_GRANTED, &service)],
            Some((&de_signer, true)),
        );
        MapRetriever::new()
            .with(testing::LOTL_URL, lotl.as_bytes())
            .with(DE, de.as_bytes())
    }

    #[tokio::test]
    async fn test_failed_country_is_informational() {
        let journal_signer = testing::certificate("journal signer");
        let service = testing::lotl_service(
            retriever(&journal_signer),
            &journal_signer,
            LotlFetchingProperties::default(),
        );

        let outcome = LotlValidator::new(Arc::new(service)).validate().await.unwrap();
        assert!(outcome.is_valid(), "{}", outcome.report);
        assert_eq!(outcome.contexts.len(), 1);
        let unresolved: Vec<_> = outcome
            .report
            .items()
            .iter()
            .filter(|item| item.check_name == COULD_NOT_RESOLVE_URL)
            .collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].status, ReportItemStatus::Info);
        assert!(outcome.report.has_check(COUNTRY_FAILURE_CHECK));
    }

    #[tokio::test]
    async fn test_throw_strategy_aborts() {
        let journal_signer = testing::certificate("journal signer");
        let properties = LotlFetchingProperties::default()
            .with_failure_strategy(Arc::new(CountryFailureStrategy::Throw));
        let service = testing::lotl_service(retriever(&journal_signer), &journal_signer, properties);

        let result = LotlValidator::new(Arc::new(service)).validate().await;
        assert!(matches!(
            result,
            Err(crate::lotl::errors::LotlError::CountryFailure(_))
        ));
    }

    #[tokio::test]
    async fn test_untrusted_lotl_yields_no_contexts() {
        let journal_signer = testing::certificate("journal signer");
        let other_signer = testing::certificate("other signer");
        let service = testing::lotl_service(
            retriever(&other_signer),
            &journal_signer,
            LotlFetchingProperties::default(),
        );

        let outcome = LotlValidator::new(Arc::new(service)).validate().await.unwrap();
        assert!(!outcome.is_valid());
        assert!(outcome.contexts.is_empty());
    }

    #[tokio::test]
    async fn test_missing_lotl_yields_invalid_report() {
        let journal_signer = testing::certificate("journal signer");
        let service = testing::lotl_service(
            MapRetriever::new(),
            &journal_signer,
            LotlFetchingProperties::default(),
        );

        let outcome = LotlValidator::new(Arc::new(service)).validate().await.unwrap();
        assert!(!outcome.is_valid());
        assert!(outcome.contexts.is_empty());
    }
}
