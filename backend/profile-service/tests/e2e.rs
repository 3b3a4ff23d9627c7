//! End-to-end tests: HTTP adapter -> authorization pipeline -> handlers

use actix_web::{test, web, App};
use chrono::Utc;
use grpc_auth_pipeline::{AuthConfig, PolicyRuleConfig};
use jsonwebtoken::{encode, EncodingKey, Header};
use profile_service::models::{Address, Profile};
use profile_service::{build_pipeline, http, ProfileStore};
use serde_json::{json, Value};
use std::sync::Arc;

const SECRET: &str = "e2e-test-secret";

fn token(claims: Value) -> String {
    let mut claims = claims;
    if let Some(map) = claims.as_object_mut() {
        map.insert("iss".into(), json!("example"));
        map.insert("exp".into(), json!(Utc::now().timestamp() + 3600));
    }
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .expect("sign test token")
}

fn auth_config() -> AuthConfig {
    let mut config = AuthConfig::hs256("example", SECRET);
    config.skip = vec!["example.v1.ProfileService/Ping".to_string()];
    config.rules = vec![
        PolicyRuleConfig {
            name: "profile-directory".to_string(),
            methods: vec!["example.v1.ProfileService/ListProfiles".to_string()],
            effect: Default::default(),
            public: false,
            roles: vec!["support".to_string()],
        },
        PolicyRuleConfig {
            name: "profile-self-service".to_string(),
            methods: vec!["example.v1.ProfileService/*".to_string()],
            effect: Default::default(),
            public: false,
            roles: Vec::new(),
        },
    ];
    config
}

fn seeded_store() -> Arc<ProfileStore> {
    let store = Arc::new(ProfileStore::new());
    store.insert(Profile {
        subject: "user-123".to_string(),
        name: None,
        email: Some("alice@example.com".to_string()),
        address: Some(Address {
            city: "Oslo".to_string(),
            street: "Karl Johans gate 1".to_string(),
        }),
    });
    store
}

macro_rules! app {
    ($store:expr) => {{
        let pipeline = build_pipeline(&auth_config(), $store).expect("pipeline builds");
        test::init_service(
            App::new()
                .app_data(web::Data::new(pipeline))
                .configure(http::configure),
        )
        .await
    }};
}

fn post(method: &str, token: Option<&str>, body: Value) -> actix_web::test::TestRequest {
    let mut req = test::TestRequest::post()
        .uri(&format!("/example.v1.ProfileService/{method}"))
        .set_json(body);
    if let Some(token) = token {
        req = req.insert_header(("authorization", format!("Bearer {token}")));
    }
    req
}

#[actix_web::test]
async fn test_get_profile_returns_identity_without_sensitive_fields() {
    let app = app!(seeded_store());
    let alice = token(json!({ "sub": "user-123", "name": "Alice" }));

    let resp = test::call_service(&app, post("GetProfile", Some(&alice), json!({})).to_request()).await;
    assert_eq!(resp.status(), 200);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["subject"], "user-123");
    assert_eq!(body["name"], "Alice");
    assert!(body.get("email").is_none());
    assert_eq!(body["address"], json!({ "city": "Oslo" }));
}

#[actix_web::test]
async fn test_missing_credential_is_401() {
    let app = app!(seeded_store());

    let resp = test::call_service(&app, post("GetProfile", None, json!({})).to_request()).await;
    assert_eq!(resp.status(), 401);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({ "code": "unauthenticated", "message": "missing credential" })
    );
}

#[actix_web::test]
async fn test_admin_only_method() {
    let app = app!(seeded_store());

    let alice = token(json!({ "sub": "user-123", "name": "Alice" }));
    let resp = test::call_service(
        &app,
        post("DeleteProfile", Some(&alice), json!({ "subject": "user-123" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 403);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "permission_denied");

    let admin = token(json!({ "sub": "admin-1", "roles": ["admin"] }));
    let resp = test::call_service(
        &app,
        post("DeleteProfile", Some(&admin), json!({ "subject": "user-123" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "subject": "user-123", "deleted": true }));
}

#[actix_web::test]
async fn test_skip_listed_ping_ignores_bad_credentials() {
    let app = app!(seeded_store());

    for token in [None, Some("not-a-token")] {
        let resp = test::call_service(&app, post("Ping", token, json!({})).to_request()).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "status": "ok" }));
    }
}

#[actix_web::test]
async fn test_invalid_and_expired_credentials_are_401() {
    let app = app!(seeded_store());

    let expired = encode(
        &Header::default(),
        &json!({ "iss": "example", "sub": "user-123", "exp": Utc::now().timestamp() - 5 }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    for token in [expired.as_str(), "a.b.c"] {
        let resp =
            test::call_service(&app, post("GetProfile", Some(token), json!({})).to_request()).await;
        assert_eq!(resp.status(), 401);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "invalid credential");
    }
}

#[actix_web::test]
async fn test_update_profile_validation_and_redaction() {
    let app = app!(Arc::new(ProfileStore::new()));
    let bob = token(json!({ "sub": "user-456" }));

    let resp = test::call_service(
        &app,
        post("UpdateProfile", Some(&bob), json!({ "email": "not-an-email" })).to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);

    let resp = test::call_service(
        &app,
        post(
            "UpdateProfile",
            Some(&bob),
            json!({ "name": "Bob", "email": "bob@example.com" }),
        )
        .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({ "subject": "user-456", "name": "Bob" }));
}

#[actix_web::test]
async fn test_streaming_list_keeps_fields_when_streaming_is_skipped() {
    let app = app!(seeded_store());

    let plain = token(json!({ "sub": "user-123" }));
    let resp = test::call_service(&app, post("ListProfiles", Some(&plain), json!({})).to_request()).await;
    assert_eq!(resp.status(), 403);

    let support = token(json!({ "sub": "support-1", "roles": ["support"] }));
    let resp =
        test::call_service(&app, post("ListProfiles", Some(&support), json!({})).to_request()).await;
    assert_eq!(resp.status(), 200);

    let body = test::read_body(resp).await;
    let lines: Vec<Value> = std::str::from_utf8(&body)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["email"], "alice@example.com");
}

#[actix_web::test]
async fn test_unknown_method_and_bad_body() {
    let app = app!(seeded_store());
    let alice = token(json!({ "sub": "user-123" }));

    // unknown methods fall to the default policy after authentication
    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/example.v1.Unknown/Nope")
            .insert_header(("authorization", format!("Bearer {alice}")))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 403);

    let resp = test::call_service(&app, post("Missing", Some(&alice), json!({})).to_request()).await;
    assert_eq!(resp.status(), 404);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], "unimplemented");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/example.v1.ProfileService/GetProfile")
            .insert_header(("authorization", format!("Bearer {alice}")))
            .set_payload("{not json")
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), 400);
}
