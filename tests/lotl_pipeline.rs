mod common;

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::{CA_QC, GRANTED, JOURNAL_URI, TrustListServer, WITHDRAWN};
use lotl_trust::lotl::fetcher::country::COULD_NOT_RESOLVE_URL;
use lotl_trust::lotl::trusted_store::{CERTIFICATE_TRUSTED, REVOKED_CERTIFICATE};
use lotl_trust::lotl::{
    CertificateSource, LotlError, LotlFetchingProperties, LotlTrustedStore, LotlValidator,
    ValidationContext,
};
use lotl_trust::pki::Certificate;
use lotl_trust::report::{ReportItemStatus, ValidationReport};

const SINCE_2016: &str = "2016-06-30T22:00:00Z";
const SINCE_2020: &str = "2020-01-01T00:00:00Z";

struct Fixture {
    granted_ca: Certificate,
    withdrawn_ca: Certificate,
    store: LotlTrustedStore,
    report: ValidationReport,
}

/// Publish an EU LOTL pointing at a DE list and an unreachable FR list, then
/// build the trusted store from it.
async fn trusted_store() -> Fixture {
    let journal_signer = common::certificate("journal signer");
    let de_signer = common::certificate("DE signer");
    let fr_signer = common::certificate("FR signer");
    let granted_ca = common::certificate("DE granted CA");
    let withdrawn_ca = common::certificate("DE withdrawn CA");

    let server = TrustListServer::bind().await;
    let lotl_url = server.url("eu-lotl.xml");
    let de_url = server.url("de.xml");
    let fr_url = server.url("fr.xml");

    let lotl = common::lotl_document(
        &[JOURNAL_URI],
        &[("DE", &de_url, &de_signer), ("FR", &fr_url, &fr_signer)],
        &journal_signer,
        true,
    );
    let de = common::country_document(
        &[
            common::service(CA_QC, &[(GRANTED, SINCE_2016)], &granted_ca),
            common::service(
                CA_QC,
                &[(WITHDRAWN, SINCE_2020), (GRANTED, SINCE_2016)],
                &withdrawn_ca,
            ),
        ],
        &de_signer,
    );
    server
        .publish("eu-lotl.xml", lotl)
        .publish("de.xml", de)
        .spawn();

    let service = Arc::new(common::http_service(
        &lotl_url,
        &journal_signer,
        LotlFetchingProperties::default(),
    ));
    service.initialize_cache(None).await.unwrap();

    let validator = LotlValidator::new(service);
    let report = validator.validate().await.unwrap().report;
    let store = LotlTrustedStore::build(&validator).await.unwrap();
    Fixture {
        granted_ca,
        withdrawn_ca,
        store,
        report,
    }
}

#[tokio::test]
async fn test_granted_service_certificate_is_trusted() {
    let fixture = trusted_store().await;
    let context = ValidationContext::new(CertificateSource::SignerCert);

    let mut report = ValidationReport::new();
    assert!(fixture.store.check_if_cert_is_trusted(&mut report, &context, &fixture.granted_ca, Utc::now()));
    assert!(report.has_check(CERTIFICATE_TRUSTED));
    assert!(report.is_valid());
}

#[tokio::test]
async fn test_withdrawn_service_is_not_trusted_after_withdrawal() {
    let fixture = trusted_store().await;
    let context = ValidationContext::new(CertificateSource::SignerCert);

    let mut report = ValidationReport::new();
    assert!(!fixture.store.check_if_cert_is_trusted(&mut report, &context, &fixture.withdrawn_ca, Utc::now()));
    assert!(report.has_check(REVOKED_CERTIFICATE));
    assert!(!report.is_valid());

    let before_withdrawal = Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap();
    let mut report = ValidationReport::new();
    assert!(fixture.store.check_if_cert_is_trusted(&mut report, &context, &fixture.withdrawn_ca, before_withdrawal));
}

#[tokio::test]
async fn test_unreachable_country_does_not_affect_others() {
    let fixture = trusted_store().await;
    let report = &fixture.report;

    let unresolved: Vec<_> = report
        .items()
        .iter()
        .filter(|item| item.check_name == COULD_NOT_RESOLVE_URL)
        .collect();
    assert_eq!(unresolved.len(), 1, "{report}");
    assert_eq!(unresolved[0].status, ReportItemStatus::Info);
    assert!(report.is_valid());

    assert_eq!(fixture.store.contexts().len(), 2);
    assert_eq!(fixture.store.matching_contexts(&fixture.granted_ca).len(), 1);
}

#[tokio::test]
async fn test_broken_pivot_fails_closed() {
    let journal_signer = common::certificate("journal signer");
    let rogue = common::certificate("rogue signer");
    let lotl_signer = common::certificate("lotl signer");

    let server = TrustListServer::bind().await;
    let pivot_url = server.url("eu-lotl-pivot-300.xml");
    let lotl_url = server.url("eu-lotl.xml");

    // Announces the new LOTL key but is not signed by the journal key
    let pivot = common::lotl_document(&[], &[("EU", &lotl_url, &lotl_signer)], &rogue, true);
    let lotl = common::lotl_document(&[&pivot_url, JOURNAL_URI], &[], &lotl_signer, true);
    server
        .publish("eu-lotl-pivot-300.xml", pivot)
        .publish("eu-lotl.xml", lotl)
        .spawn();

    let service = Arc::new(common::http_service(
        &lotl_url,
        &journal_signer,
        LotlFetchingProperties::default(),
    ));
    let err = service.initialize_cache(None).await.unwrap_err();
    assert!(matches!(err, LotlError::FetchFailed { ref stage, .. } if stage == "pivot chain"));

    let validator = LotlValidator::new(service);
    let outcome = validator.validate().await.unwrap();
    assert!(!outcome.is_valid());
    assert!(outcome.contexts.is_empty());
    assert!(LotlTrustedStore::build(&validator).await.is_err());
}
