use dossier_core::table::{COLUMN_DISPLAY_NAME, COLUMN_IDENTIFIER};
use dossier_core::{
    access_link, AccessError, AccessService, CapabilityCodec, MaxAge, MemoryTable, RecordFilter,
    RecordStore, RecordValidationError, TableRow,
};
use url::Url;

fn service_with(max_age: MaxAge) -> AccessService<MemoryTable> {
    let table = MemoryTable::with_rows(vec![
        TableRow::new()
            .with(COLUMN_IDENTIFIER, "A123")
            .with(COLUMN_DISPLAY_NAME, "Juan Perez"),
        TableRow::new()
            .with(COLUMN_IDENTIFIER, "A1234")
            .with(COLUMN_DISPLAY_NAME, "Rosa Diaz"),
        TableRow::new()
            .with(COLUMN_IDENTIFIER, "B200")
            .with(COLUMN_DISPLAY_NAME, "Ana Lopez"),
    ]);
    let store = RecordStore::open(table).unwrap();
    let codec = CapabilityCodec::from_secret("service-secret").unwrap();
    AccessService::new(store, codec, max_age)
}

fn service() -> AccessService<MemoryTable> {
    service_with(MaxAge::default())
}

#[test]
fn redeem_returns_identifier_of_minted_token() {
    let service = service();
    let token = service.request_access_token("B200", "Ana Lopez").unwrap();
    assert_eq!(service.redeem(&token).unwrap(), "B200");
}

#[test]
fn redeem_and_search_requeries_store_by_identifier() {
    let service = service();
    service.append_note("B200", "Prof", "checked in").unwrap();

    let token = service.request_access_token("B200", "Ana Lopez").unwrap();
    let records = service.redeem_and_search(&token).unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0].notes.as_str().contains("checked in"));
}

#[test]
fn redeemed_token_reaches_only_its_own_record() {
    let service = service();
    let token = service.request_access_token("A123", "Juan Perez").unwrap();
    let records = service.redeem_and_search(&token).unwrap();
    let ids = records
        .iter()
        .map(|record| record.identifier.as_str())
        .collect::<Vec<_>>();
    assert_eq!(ids, vec!["A123"]);

    let substring_hits = service.search(Some("A123"), None).unwrap();
    assert_eq!(substring_hits.len(), 2);
}

#[test]
fn short_identifier_token_does_not_widen_to_containing_identifiers() {
    let table = MemoryTable::with_rows(vec![
        TableRow::new().with(COLUMN_IDENTIFIER, "A1"),
        TableRow::new().with(COLUMN_IDENTIFIER, "A10"),
        TableRow::new().with(COLUMN_IDENTIFIER, "XA1Y"),
    ]);
    let codec = CapabilityCodec::from_secret("service-secret").unwrap();
    let service = AccessService::new(RecordStore::open(table).unwrap(), codec, MaxAge::default());

    let token = service.request_access_token("A1", "Ana").unwrap();
    let records = service.redeem_and_search(&token).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identifier, "A1");
}

#[test]
fn token_for_unknown_identifier_redeems_to_empty_results() {
    let service = service();
    let token = service.request_access_token("Z999", "Ghost").unwrap();
    assert_eq!(service.redeem(&token).unwrap(), "Z999");
    assert!(service.redeem_and_search(&token).unwrap().is_empty());
}

#[test]
fn every_token_failure_is_the_same_invalid_token_outcome() {
    let service = service();
    let token = service.request_access_token("A123", "Juan").unwrap();
    let mut tampered = token.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'Q' } else { 'A' });

    let foreign = CapabilityCodec::from_secret("other-secret")
        .unwrap()
        .mint("A123", "Juan", None)
        .unwrap();

    for presented in [tampered.as_str(), "garbage", "", foreign.as_str()] {
        let err = service.redeem(presented).unwrap_err();
        assert!(matches!(err, AccessError::InvalidToken));
        assert_eq!(err.to_string(), "invalid token");
    }
}

#[test]
fn expired_token_is_reported_as_invalid_token() {
    let service = service_with(MaxAge::from_secs(0));
    let codec = CapabilityCodec::from_secret("service-secret").unwrap();
    let issued = chrono::Utc::now() - chrono::Duration::seconds(120);
    let token = codec.mint_at("A123", "Juan", None, issued).unwrap();

    let err = service.redeem(&token).unwrap_err();
    assert!(matches!(err, AccessError::InvalidToken));
}

#[test]
fn blank_identifier_token_request_is_a_validation_error() {
    let err = service().request_access_token("  ", "Juan").unwrap_err();
    assert!(matches!(
        err,
        AccessError::Validation(RecordValidationError::EmptyIdentifier)
    ));
}

#[test]
fn browse_distinguishes_no_search_from_empty_results() {
    let service = service();
    assert!(service.browse(None).unwrap().is_none());

    let empty = service
        .browse(Some(&RecordFilter::by_identifier("nope")))
        .unwrap();
    assert_eq!(empty, Some(Vec::new()));

    let everything = service.browse(Some(&RecordFilter::all())).unwrap().unwrap();
    assert_eq!(everything.len(), service.store().count().unwrap());
}

#[test]
fn search_and_append_errors_surface_verbatim() {
    let service = service();
    let hits = service.search(Some("b2"), Some("ANA")).unwrap();
    assert_eq!(hits.len(), 1);

    let err = service.append_note("A123", "", "hi").unwrap_err();
    assert!(matches!(
        err,
        AccessError::Validation(RecordValidationError::EmptyAuthor)
    ));
    let err = service.append_note("Z999", "Prof", "note").unwrap_err();
    assert!(matches!(err, AccessError::NotFound(ref id) if id == "Z999"));
    assert!(err.to_string().contains("Z999"));
}

#[test]
fn access_link_carries_redeemable_token() {
    let service = service();
    let token = service.request_access_token("A123", "Juan Perez").unwrap();
    let base = Url::parse("https://records.example.edu/").unwrap();

    let link = access_link(&base, &token).unwrap();
    let (_, carried) = link
        .query_pairs()
        .find(|(key, _)| key == "token")
        .unwrap();
    assert_eq!(service.redeem(&carried).unwrap(), "A123");
}
