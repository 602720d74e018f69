//! Contract tests for the domain verbs against a wiremock VPP service.
//!
//! | Operation key | Test |
//! |---------------|------|
//! | `getUsersSrvUrl` | `list_users_*` |
//! | `registerUserSrvUrl` | `register_user_*` |
//! | `retireUserSrvUrl` / `editUserSrvUrl` | `retire_*`, `edit_*` |
//! | `getLicensesSrvUrl` | `list_licenses_*` |
//! | `manageVPPLicensesByAdamIdSrvUrl` | `manage_*` |
//! | `associateLicenseSrvUrl` | `associate_*` |
//! | `getVPPAssetsSrvUrl` | `list_assets_*` |
//! | `clientConfigSrvUrl` | `context_*` |

use std::time::Duration;

use serde_json::{json, Value};
use vpp_client::context::ClientContext;
use vpp_client::licenses::{GetLicensesOptions, LicenseOperations, PricingParam, VppLicense};
use vpp_client::users::{GetUsersOptions, RegistrationStatus, VppUser};
use vpp_client::assets::GetAssetsOptions;
use vpp_client::{BatchCursor, CursorState, VppClient, VppConfig, VppError};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OPERATIONS: [(&str, &str); 11] = [
    ("registerUserSrvUrl", "registerVPPUserSrv"),
    ("getUserSrvUrl", "getVPPUserSrv"),
    ("getUsersSrvUrl", "getVPPUsersSrv"),
    ("retireUserSrvUrl", "retireVPPUserSrv"),
    ("editUserSrvUrl", "editVPPUserSrv"),
    ("getLicensesSrvUrl", "getVPPLicensesSrv"),
    ("associateLicenseSrvUrl", "associateVPPLicenseWithVPPUserSrv"),
    ("disassociateLicenseSrvUrl", "disassociateVPPLicenseFromVPPUserSrv"),
    ("manageVPPLicensesByAdamIdSrvUrl", "manageVPPLicensesByAdamIdSrv"),
    ("getVPPAssetsSrvUrl", "getVPPAssetsSrv"),
    ("clientConfigSrvUrl", "VPPClientConfigSrv"),
];

/// Build a bootstrapped client whose every operation points at `mock_server`.
async fn test_client(mock_server: &MockServer) -> VppClient {
    let mut body = serde_json::Map::new();
    body.insert("status".into(), json!(0));
    for (key, route) in OPERATIONS {
        body.insert(key.into(), json!(format!("{}/{route}", mock_server.uri())));
    }
    body.insert("maxBatchAssociateLicenseCount".into(), json!(2));

    Mock::given(method("GET"))
        .and(path("/VPPServiceConfigSrv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Value::Object(body)))
        .mount(mock_server)
        .await;

    let mut config = VppConfig::new(&mock_server.uri(), "test-token").unwrap();
    config.default_retry_delay = Duration::from_millis(20);
    let client = VppClient::connect(config).await.unwrap();
    assert!(client.service_config().unwrap().missing_operations().is_empty());
    client
}

fn users(ids: &[&str]) -> Value {
    Value::Array(
        ids.iter()
            .map(|id| json!({"clientUserIdStr": id, "status": "Registered"}))
            .collect(),
    )
}

async fn request_bodies(mock_server: &MockServer, route: &str) -> Vec<Value> {
    mock_server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == route)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ── getVPPUsersSrv ───────────────────────────────────────────────────

#[tokio::test]
async fn list_users_pages_until_caught_up() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPUsersSrv"))
        .and(body_partial_json(json!({"batchToken": "B1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "users": users(&["d", "e"]),
            "sinceModifiedToken": "S1",
            "totalCount": 5
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/getVPPUsersSrv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "users": users(&["a", "b", "c"]),
            "batchToken": "B1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut cursor = BatchCursor::new();
    let options = GetUsersOptions::new();

    let first = client.users().list(&options, &mut cursor).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(cursor.state(), CursorState::InProgress);
    assert_eq!(cursor.batch_token(), Some("B1"));
    assert!(cursor.has_next());

    let second = client.users().list(&options, &mut cursor).await.unwrap();
    assert_eq!(second.len(), 2);
    assert_eq!(second.total_count, Some(5));
    assert_eq!(cursor.state(), CursorState::CaughtUp);
    assert_eq!(cursor.since_modified_token(), Some("S1"));
    assert!(!cursor.has_next());

    let sent = request_bodies(&mock_server, "/getVPPUsersSrv").await;
    assert_eq!(sent.len(), 2);
    assert!(sent[0].get("batchToken").is_none());
    assert!(sent[0].get("sinceModifiedToken").is_none());
    assert_eq!(sent[0]["includeRetired"], json!(0));
    assert_eq!(sent[1]["batchToken"], json!("B1"));
    assert!(sent[1].get("sinceModifiedToken").is_none());
}

#[tokio::test]
async fn list_users_all_collects_every_page() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPUsersSrv"))
        .and(body_partial_json(json!({"batchToken": "B1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "users": users(&["d", "e"]),
            "sinceModifiedToken": "S1"
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/getVPPUsersSrv"))
        .and(body_partial_json(json!({"includeRetired": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "users": users(&["a", "b", "c"]),
            "batchToken": "B1"
        })))
        .mount(&mock_server)
        .await;

    let mut cursor = BatchCursor::new();
    let all = client
        .users()
        .list_all(&GetUsersOptions::new().include_retired(true), &mut cursor)
        .await
        .unwrap();
    let ids: Vec<_> = all.iter().filter_map(|u| u.client_user_id_str.as_deref()).collect();
    assert_eq!(ids, ["a", "b", "c", "d", "e"]);
    assert_eq!(cursor.since_modified_token(), Some("S1"));
}

#[tokio::test]
async fn list_users_failure_leaves_cursor_untouched() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPUsersSrv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": -1,
            "errorNumber": 9625,
            "errorMessage": "Invalid sToken"
        })))
        .mount(&mock_server)
        .await;

    let mut cursor = BatchCursor::resume("B7").unwrap();
    let err = client
        .users()
        .list(&GetUsersOptions::new(), &mut cursor)
        .await
        .unwrap_err();
    assert_eq!(err.domain().map(|d| d.code), Some(9625));
    assert_eq!(cursor.batch_token(), Some("B7"));
}

#[tokio::test]
async fn list_users_all_stops_on_repeated_batch_token() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPUsersSrv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "users": users(&["a"]),
            "batchToken": "B1"
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let mut cursor = BatchCursor::new();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client.users().list_all(&GetUsersOptions::new(), &mut cursor),
    )
    .await
    .expect("list_all must terminate");
    match result {
        Err(VppError::PagingCycle { operation, batch_token }) => {
            assert_eq!(operation, "getUsersSrvUrl");
            assert_eq!(batch_token, "B1");
        }
        other => panic!("expected PagingCycle, got {other:?}"),
    }
}

#[tokio::test]
async fn list_licenses_all_stops_when_resumed_token_comes_back() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPLicensesSrv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "licenses": [{"licenseIdStr": "L1", "adamIdStr": "1"}],
            "batchToken": "B9"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut cursor = BatchCursor::resume("B9").unwrap();
    let err = client
        .licenses()
        .list_all(&GetLicensesOptions::new(), &mut cursor)
        .await
        .unwrap_err();
    assert!(matches!(err, VppError::PagingCycle { ref batch_token, .. } if batch_token == "B9"));
}

#[tokio::test]
async fn caught_up_cursor_requests_changes_only() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPUsersSrv"))
        .and(body_partial_json(json!({"sinceModifiedToken": "S1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "users": users(&["b"]),
            "sinceModifiedToken": "S2"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut cursor = BatchCursor::since_modified("S1").unwrap();
    let page = client.users().list(&GetUsersOptions::new(), &mut cursor).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(cursor.since_modified_token(), Some("S2"));
}

// ── registerVPPUserSrv / retireVPPUserSrv / editVPPUserSrv ───────────

#[tokio::test]
async fn register_user_sends_client_id_and_email() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/registerVPPUserSrv"))
        .and(body_partial_json(json!({
            "clientUserIdStr": "u-1",
            "email": "a@example.com",
            "sToken": "test-token"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "user": {
                "userId": 100,
                "clientUserIdStr": "u-1",
                "email": "a@example.com",
                "status": "Registered",
                "inviteUrl": "https://vpp.example.com/invite/abc",
                "inviteCode": "abc"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let user = client
        .users()
        .register(&VppUser::new("a@example.com", Some("u-1")))
        .await
        .unwrap();
    assert_eq!(user.user_id, Some(100));
    assert_eq!(user.status, Some(RegistrationStatus::Registered));
    assert_eq!(user.invite_code.as_deref(), Some("abc"));
}

#[tokio::test]
async fn register_user_without_client_id_is_rejected_locally() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    let err = client.users().register(&VppUser::default()).await.unwrap_err();
    assert!(matches!(err, VppError::InvalidRequest(_)));
    assert!(request_bodies(&mock_server, "/registerVPPUserSrv").await.is_empty());
}

#[tokio::test]
async fn retire_user_prefers_service_user_id() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/retireVPPUserSrv"))
        .and(body_partial_json(json!({"userId": 100})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "user": {"userId": 100, "status": "Retired"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let user = VppUser {
        user_id: Some(100),
        client_user_id_str: Some("u-1".into()),
        ..VppUser::default()
    };
    let retired = client.users().retire(&user).await.unwrap();
    assert_eq!(retired.and_then(|u| u.status), Some(RegistrationStatus::Retired));

    let sent = request_bodies(&mock_server, "/retireVPPUserSrv").await;
    assert!(sent[0].get("clientUserIdStr").is_none());
}

#[tokio::test]
async fn edit_user_sends_new_email() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/editVPPUserSrv"))
        .and(body_partial_json(json!({"clientUserIdStr": "u-1", "email": "new@example.com"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 0})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let user = VppUser::new("new@example.com", Some("u-1"));
    assert_eq!(client.users().edit(&user).await.unwrap(), None);
}

// ── getVPPLicensesSrv / manage / associate ───────────────────────────

#[tokio::test]
async fn list_licenses_sends_filters() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPLicensesSrv"))
        .and(body_partial_json(json!({"adamId": "408709785", "assignedOnly": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "licenses": [
                {"licenseIdStr": "L1", "adamIdStr": "408709785", "pricingParam": "STDQ", "clientUserIdStr": "u-1"},
                {"licenseIdStr": "L2", "adamIdStr": "408709785", "pricingParam": "STDQ", "serialNumber": "C02X"}
            ],
            "sinceModifiedToken": "S1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let options = GetLicensesOptions::new()
        .adam_id("408709785")
        .unwrap()
        .assigned_only(true);
    let mut cursor = BatchCursor::new();
    let licenses = client.licenses().list_all(&options, &mut cursor).await.unwrap();
    assert_eq!(licenses.len(), 2);
    assert!(licenses.iter().all(VppLicense::is_assigned));
    assert_eq!(licenses[0].pricing_param, Some(PricingParam::Standard));
}

#[tokio::test]
async fn manage_sends_bulk_request() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/manageVPPLicensesByAdamIdSrv"))
        .and(body_partial_json(json!({
            "adamIdStr": "408709785",
            "pricingParam": "STDQ",
            "associateSerialNumbers": ["C02A", "C02B"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "adamIdStr": "408709785",
            "productTypeId": 8,
            "isIrrevocable": false,
            "associations": [
                {"serialNumber": "C02A", "licenseIdStr": "L1"},
                {"serialNumber": "C02B", "errorNumber": 9616, "errorMessage": "No licenses available"}
            ]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut ops = LicenseOperations::new("408709785", PricingParam::Standard).unwrap();
    ops.assign_serial_number("C02A").unwrap().assign_serial_number("C02B").unwrap();
    let result = client.licenses().manage(&ops).await.unwrap();
    assert_eq!(result.associations.len(), 2);
    assert_eq!(result.failures().count(), 1);
}

#[tokio::test]
async fn manage_over_published_limit_never_reaches_service() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    let mut ops = LicenseOperations::new("408709785", PricingParam::Standard).unwrap();
    for serial in ["A", "B", "C"] {
        ops.assign_serial_number(serial).unwrap();
    }
    let err = client.licenses().manage(&ops).await.unwrap_err();
    assert!(matches!(err, VppError::InvalidRequest(_)));
    assert!(request_bodies(&mock_server, "/manageVPPLicensesByAdamIdSrv").await.is_empty());
}

#[tokio::test]
async fn associate_by_adam_id_when_license_id_unknown() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/associateVPPLicenseWithVPPUserSrv"))
        .and(body_partial_json(json!({
            "clientUserIdStr": "u-1",
            "adamId": "408709785",
            "pricingParam": "PLUS"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "license": {"licenseIdStr": "L9", "adamIdStr": "408709785"},
            "user": {"clientUserIdStr": "u-1", "status": "Associated"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let license = VppLicense {
        adam_id_str: Some("408709785".into()),
        pricing_param: Some(PricingParam::Plus),
        ..VppLicense::default()
    };
    let user = VppUser::new("a@example.com", Some("u-1"));
    let result = client.licenses().associate(&user, &license).await.unwrap();
    assert_eq!(result.license.and_then(|l| l.license_id_str).as_deref(), Some("L9"));
}

// ── getVPPAssetsSrv ──────────────────────────────────────────────────

#[tokio::test]
async fn list_assets_with_counts() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/getVPPAssetsSrv"))
        .and(body_partial_json(json!({"includeLicenseCounts": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "assets": [{
                "adamIdStr": "408709785",
                "pricingParam": "STDQ",
                "productTypeId": 8,
                "productTypeName": "Software",
                "totalCount": 10,
                "assignedCount": 4,
                "availableCount": 6,
                "retiredCount": 0
            }]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let assets = client
        .assets()
        .list(&GetAssetsOptions::new().include_license_counts(true))
        .await
        .unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].available_count, Some(6));
}

// ── VPPClientConfigSrv ───────────────────────────────────────────────

#[tokio::test]
async fn context_claim_round_trip() {
    let mock_server = MockServer::start().await;
    let client = test_client(&mock_server).await;
    let local = ClientContext::new("mdm-1");
    let stored = serde_json::to_string(&local).unwrap();

    Mock::given(method("POST"))
        .and(path("/VPPClientConfigSrv"))
        .and(body_partial_json(json!({"clientContext": stored.clone(), "verbose": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "clientContext": stored,
            "countryCode": "US",
            "facilitatorMemberId": "F-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/VPPClientConfigSrv"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 0,
            "clientContext": "{\"hostname\":\"mdm-2\",\"guid\":\"other\"}",
            "countryCode": "US"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let written = client.context().update(&local).await.unwrap();
    assert_eq!(written.country_code.as_deref(), Some("US"));
    assert!(!written.conflicts_with(&local));

    let current = client.context().get().await.unwrap();
    assert!(current.conflicts_with(&local));
}
