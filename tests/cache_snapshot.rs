mod common;

use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use common::{CA_QC, GRANTED, JOURNAL_URI, TrustListServer};
use lotl_trust::lotl::{
    LotlError, LotlFetchingProperties, LotlService, LotlServiceCache as _, LotlValidator,
};
use lotl_trust::pki::Certificate;

async fn bootstrapped_service(journal_signer: &Certificate, ca: &Certificate) -> LotlService {
    let de_signer = common::certificate("DE signer");
    let server = TrustListServer::bind().await;
    let lotl_url = server.url("eu-lotl.xml");
    let lotl = common::lotl_document(
        &[JOURNAL_URI],
        &[("DE", &server.url("de.xml"), &de_signer)],
        journal_signer,
        true,
    );
    let de = common::country_document(
        &[common::service(CA_QC, &[(GRANTED, "2016-06-30T22:00:00Z")], ca)],
        &de_signer,
    );
    server
        .publish("eu-lotl.xml", lotl)
        .publish("de.xml", de)
        .spawn();

    let service = common::http_service(&lotl_url, journal_signer, LotlFetchingProperties::default());
    service.initialize_cache(None).await.unwrap();
    service
}

/// A service whose network has nothing to offer.
fn offline_service(journal_signer: &Certificate) -> LotlService {
    common::http_service(
        "http://127.0.0.1:9/eu-lotl.xml",
        journal_signer,
        LotlFetchingProperties::default(),
    )
}

#[tokio::test]
async fn test_snapshot_bootstraps_offline_service() {
    let journal_signer = common::certificate("journal signer");
    let ca = common::certificate("DE CA");
    let online = bootstrapped_service(&journal_signer, &ca).await;

    let mut snapshot = tempfile::NamedTempFile::new().unwrap();
    online.write_snapshot(snapshot.as_file_mut()).unwrap();

    let offline = Arc::new(offline_service(&journal_signer));
    let mut file = File::open(snapshot.path()).unwrap();
    let reader: &mut (dyn Read + Send) = &mut file;
    offline.initialize_cache(Some(reader)).await.unwrap();

    let outcome = LotlValidator::new(offline).validate().await.unwrap();
    assert!(outcome.is_valid(), "{}", outcome.report);
    assert_eq!(outcome.contexts.len(), 1);
    assert!(outcome.contexts[0].contains(&ca));
}

#[tokio::test]
async fn test_snapshot_not_newer_than_cache_is_rejected() {
    let journal_signer = common::certificate("journal signer");
    let ca = common::certificate("DE CA");
    let online = bootstrapped_service(&journal_signer, &ca).await;

    let mut snapshot = tempfile::NamedTempFile::new().unwrap();
    online.write_snapshot(snapshot.as_file_mut()).unwrap();

    let offline = offline_service(&journal_signer);
    for attempt in 0..2 {
        let mut file = File::open(snapshot.path()).unwrap();
        let reader: &mut (dyn Read + Send) = &mut file;
        let result = offline.initialize_cache(Some(reader)).await;
        if attempt == 0 {
            result.unwrap();
        } else {
            assert!(matches!(result, Err(LotlError::InvalidSnapshot(_))));
        }
    }
}

#[tokio::test]
async fn test_corrupt_snapshot_is_rejected() {
    let journal_signer = common::certificate("journal signer");
    let offline = offline_service(&journal_signer);

    let mut reader: &[u8] = b"{ not json";
    let reader: &mut (dyn Read + Send) = &mut reader;
    assert!(offline.initialize_cache(Some(reader)).await.is_err());
    assert!(offline.cache().get_lotl_result().unwrap().is_none());
}
