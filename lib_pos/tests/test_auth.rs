//! # PIN Login Integration Tests
//!
//! The login flow against a local stand-in for the `verify_pin_user` RPC.

mod common;

use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use lib_pos::auth::{LoginFlow, LoginOutcome, SupabasePinVerifier, VERIFY_PIN_RPC_PATH};
use lib_pos::menu::source::supabase_client;
use lib_pos::PosConfig;

#[derive(Clone)]
struct Rpc {
    answer: Value,
    pins: Arc<Mutex<Vec<String>>>,
    keys: Arc<Mutex<Vec<String>>>,
}

async fn verify(State(rpc): State<Rpc>, headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
    rpc.pins
        .lock()
        .unwrap()
        .push(body["p_pin"].as_str().unwrap_or_default().to_string());
    if let Some(key) = headers.get("apikey").and_then(|v| v.to_str().ok()) {
        rpc.keys.lock().unwrap().push(key.to_string());
    }
    Json(rpc.answer.clone())
}

async fn flow_answering(answer: Value) -> (LoginFlow, Rpc) {
    let rpc = Rpc {
        answer,
        pins: Arc::default(),
        keys: Arc::default(),
    };
    let app = Router::new()
        .route(&format!("/{}", VERIFY_PIN_RPC_PATH), post(verify))
        .with_state(rpc.clone());
    let base = common::serve(app).await;
    let client = supabase_client(&base, "anon", common::quick_options(2000)).unwrap();
    (LoginFlow::new(Arc::new(SupabasePinVerifier::new(Arc::new(client)))), rpc)
}

#[tokio::test]
async fn one_row_array_signs_the_staff_member_in() {
    let (mut flow, rpc) = flow_answering(json!([{ "ok": true, "user_name": "Tia" }])).await;
    flow.input_mut().set_text("2580");

    let outcome = flow.submit().await.expect("complete pin is submitted");
    assert_eq!(
        outcome,
        LoginOutcome::Authenticated {
            staff_name: "Tia".into()
        }
    );
    assert_eq!(*rpc.pins.lock().unwrap(), vec!["2580".to_string()]);
    assert_eq!(*rpc.keys.lock().unwrap(), vec!["anon".to_string()]);
    assert!(flow.input().is_empty());
}

#[tokio::test]
async fn object_answer_with_lockout_is_rejected() {
    let (mut flow, _rpc) =
        flow_answering(json!({ "ok": false, "locked_until": "2026-10-15T10:00:00+00:00" })).await;
    flow.input_mut().set_text("1111");

    match flow.submit().await.expect("complete pin is submitted") {
        LoginOutcome::Rejected { locked_until, feedback } => {
            assert!(locked_until.is_some());
            assert_eq!(feedback.alert_title, "Invalid PIN");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_answer_counts_as_wrong_pin() {
    let (mut flow, _rpc) = flow_answering(json!([])).await;
    flow.input_mut().set_text("0000");
    let outcome = flow.submit().await.expect("complete pin is submitted");
    assert!(matches!(outcome, LoginOutcome::Rejected { locked_until: None, .. }));
}

#[tokio::test]
async fn incomplete_pin_makes_no_request() {
    let (mut flow, rpc) = flow_answering(json!([{ "ok": true }])).await;
    flow.input_mut().set_text("314");
    assert!(flow.submit().await.is_none());
    assert!(rpc.pins.lock().unwrap().is_empty());
}

#[tokio::test]
async fn failing_pin_check_is_sent_once() {
    let hits: Arc<Mutex<u32>> = Arc::default();
    let app = Router::new()
        .route(
            &format!("/{}", VERIFY_PIN_RPC_PATH),
            post(|State(hits): State<Arc<Mutex<u32>>>| async move {
                *hits.lock().unwrap() += 1;
                StatusCode::BAD_GATEWAY
            }),
        )
        .with_state(hits.clone());
    let base = common::serve(app).await;
    let config = PosConfig {
        supabase_url: Some(base),
        supabase_anon_key: Some("anon".into()),
        max_retries: Some(2),
        ..PosConfig::defaults()
    };
    let mut flow = LoginFlow::new(config.build_pin_verifier().unwrap());
    flow.input_mut().set_text("2580");

    let outcome = flow.submit().await.expect("complete pin is submitted");
    assert!(matches!(outcome, LoginOutcome::Failed { .. }));
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;
    assert_eq!(*hits.lock().unwrap(), 1);
}
