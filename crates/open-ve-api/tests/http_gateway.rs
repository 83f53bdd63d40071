//! End-to-end scenarios from §8 (S1-S3, S5, S6), driven directly
//! against the assembled axum `Router` with `tower::ServiceExt::oneshot`
//! — no real socket, matching the teacher's preference for
//! in-process testing over spinning up a live listener.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use open_ve_api::{AppState, Mode};
use open_ve_core::{AuthnConfig, SlaveNode};
use open_ve_service::{Evaluator, NoopAuthenticator, PresharedKeyAuthenticator, SchemaRegistrar, SlaveRegistry};
use open_ve_store::{MemoryStore, Store};

fn state_with_store(store: Arc<MemoryStore>) -> AppState {
    AppState::new(
        Mode::Master,
        Arc::new(SchemaRegistrar::new(store.clone())),
        Arc::new(Evaluator::new(store.clone())),
        Arc::new(NoopAuthenticator),
        None,
    )
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn s1_and_s2_price_validation() {
    let store = Arc::new(MemoryStore::new("n"));
    let state = state_with_store(store);
    let router = open_ve_api::build_router(state.clone(), &[], &[]);

    let register_body = json!({
        "validations": [{
            "id": "x-price",
            "expressions": ["num > 0"],
            "variables": [{"name": "num", "type": "int"}]
        }]
    });
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/dsl/register")
                .header("content-type", "application/json")
                .body(Body::from(register_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // S1: passing check
    let check_body = json!({ "validations": [{ "id": "x-price", "variables": { "num": 100 } }] });
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .body(Body::from(check_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["results"][0]["is_valid"], json!(true));
    assert_eq!(body["results"][0]["message"], json!(""));

    // S2: failing check
    let check_body = json!({ "validations": [{ "id": "x-price", "variables": { "num": -5 } }] });
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .body(Body::from(check_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(resp).await;
    assert_eq!(body["results"][0]["is_valid"], json!(false));
    assert_eq!(
        body["results"][0]["message"],
        json!("failed validations: num > 0")
    );
}

#[tokio::test]
async fn s3_unknown_unit_is_not_found() {
    let store = Arc::new(MemoryStore::new("n"));
    let state = state_with_store(store);
    let router = open_ve_api::build_router(state, &[], &[]);

    let register_body = json!({ "validations": [] });
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/dsl/register")
                .header("content-type", "application/json")
                .body(Body::from(register_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let check_body = json!({ "validations": [{ "id": "unknown", "variables": {} }] });
    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .body(Body::from(check_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn s5_two_expressions_both_directions_fail() {
    let store = Arc::new(MemoryStore::new("n"));
    let state = state_with_store(store);
    let router = open_ve_api::build_router(state, &[], &[]);

    let register_body = json!({
        "validations": [{
            "id": "x",
            "expressions": ["a > 0", "a < 10"],
            "variables": [{"name": "a", "type": "int"}]
        }]
    });
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/dsl/register")
                .header("content-type", "application/json")
                .body(Body::from(register_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let check = |a: i64| {
        let router = router.clone();
        async move {
            let body = json!({ "validations": [{ "id": "x", "variables": { "a": a } }] });
            let resp = router
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/v1/check")
                        .header("content-type", "application/json")
                        .body(Body::from(body.to_string()))
                        .unwrap(),
                )
                .await
                .unwrap();
            body_json(resp).await
        }
    };

    let ok = check(5).await;
    assert_eq!(ok["results"][0]["is_valid"], json!(true));

    let low = check(-1).await;
    assert_eq!(low["results"][0]["is_valid"], json!(false));
    assert!(low["results"][0]["message"]
        .as_str()
        .unwrap()
        .contains("a > 0"));

    let high = check(20).await;
    assert_eq!(high["results"][0]["is_valid"], json!(false));
    assert!(high["results"][0]["message"]
        .as_str()
        .unwrap()
        .contains("a < 10"));
}

#[tokio::test]
async fn type_mismatch_at_the_wire_is_a_bad_request() {
    let store = Arc::new(MemoryStore::new("n"));
    let state = state_with_store(store);
    let router = open_ve_api::build_router(state, &[], &[]);

    let register_body = json!({
        "validations": [{
            "id": "x-price",
            "expressions": ["num > 0"],
            "variables": [{"name": "num", "type": "int"}]
        }]
    });
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/dsl/register")
                .header("content-type", "application/json")
                .body(Body::from(register_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    // `num` is declared `int` but the wire supplies a string
    let check_body = json!({ "validations": [{ "id": "x-price", "variables": { "num": "abc" } }] });
    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .body(Body::from(check_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["kind"], json!("RequestParameterInvalid"));
}

#[tokio::test]
async fn s4_master_forwards_unowned_unit_to_its_slave() {
    // a slave owning "x-price" answers its own /v1/check as if it had
    // the unit registered locally
    let slave_server = wiremock::MockServer::start().await;
    wiremock::Mock::given(wiremock::matchers::method("POST"))
        .and(wiremock::matchers::path("/v1/check"))
        .respond_with(wiremock::ResponseTemplate::new(200).set_body_json(json!({
            "results": [{ "id": "x-price", "is_valid": true, "message": "" }]
        })))
        .mount(&slave_server)
        .await;

    // master has no local schema at all
    let store = Arc::new(MemoryStore::new("n"));
    let slave_registry = Arc::new(SlaveRegistry::new());
    slave_registry.register_slave(SlaveNode {
        id: "slave-1".to_string(),
        http_address: slave_server.uri(),
        tls_enabled: false,
        validation_ids: vec!["x-price".to_string()],
        authn: AuthnConfig::default(),
    });
    let state = AppState::new(
        Mode::Master,
        Arc::new(SchemaRegistrar::new(store.clone())),
        Arc::new(Evaluator::new(store.clone())),
        Arc::new(NoopAuthenticator),
        Some(slave_registry),
    );
    let router = open_ve_api::build_router(state, &[], &[]);

    // master's own schema is empty; the forward middleware still needs
    // a registered (if empty) schema to read before it can tell "not
    // local" apart from "no schema at all"
    router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/dsl/register")
                .header("content-type", "application/json")
                .body(Body::from(json!({ "validations": [] }).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let check_body = json!({ "validations": [{ "id": "x-price", "variables": { "num": 1 } }] });
    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .body(Body::from(check_body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["results"][0]["id"], json!("x-price"));
    assert_eq!(body["results"][0]["is_valid"], json!(true));
}

#[tokio::test]
async fn s6_preshared_key_authentication() {
    let store = Arc::new(MemoryStore::new("n"));
    let state = AppState::new(
        Mode::Master,
        Arc::new(SchemaRegistrar::new(store.clone())),
        Arc::new(Evaluator::new(store.clone())),
        Arc::new(PresharedKeyAuthenticator::new("k")),
        None,
    );
    let router = open_ve_api::build_router(state, &[], &[]);

    let body = json!({ "validations": [] });

    // without header
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    // with correct key
    let resp = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .header("authorization", "Bearer k")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // with wrong key
    let resp = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/v1/check")
                .header("content-type", "application/json")
                .header("authorization", "Bearer x")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}
