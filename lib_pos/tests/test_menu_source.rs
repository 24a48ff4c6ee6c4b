//! # Menu Source Integration Tests
//!
//! Both backends against a local server: lenient decoding, the hosted-table
//! query and headers, and error propagation.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use lib_pos::cart::Money;
use lib_pos::menu::source::supabase_client;
use lib_pos::menu::{Category, HttpMenuSource, MenuSource, SupabaseMenuSource};
use lib_pos::retrieve::ky_http::FetchError;

#[tokio::test]
async fn http_source_keeps_good_rows_and_skips_bad_ones() {
    let app = Router::new().route(
        "/api/menu",
        get(|| async {
            Json(json!([
                { "id": "1", "name": "Udon", "price_cents": 1200, "category": "Mains" },
                { "id": 7, "name": "Miso Soup", "price": 3.5, "currency": "EUR", "category": "sides" },
                { "name": "No id" },
                { "id": "9", "name": "No price" }
            ]))
        }),
    );
    let base = common::serve(app).await;
    let source = HttpMenuSource::new(common::client(&base));

    let items = source.fetch_menu().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "1");
    assert_eq!(items[0].price, Money::from_cents(1200));
    assert_eq!(items[0].currency, "USD");
    assert_eq!(items[0].category, Some(Category::Mains));
    assert_eq!(items[1].id, "7");
    assert_eq!(items[1].price, Money::from_cents(350));
    assert_eq!(items[1].currency, "EUR");
    assert_eq!(items[1].category, Some(Category::Sides));
}

#[tokio::test]
async fn non_array_body_is_an_empty_menu() {
    let app = Router::new()
        .route("/api/menu", get(|| async { Json(json!({ "items": [] })) }));
    let base = common::serve(app).await;
    let source = HttpMenuSource::new(common::client(&base));
    assert!(source.fetch_menu().await.unwrap().is_empty());
}

#[tokio::test]
async fn server_error_is_reported_not_swallowed() {
    let app = Router::new().route("/api/menu", get(|| async { StatusCode::BAD_GATEWAY }));
    let base = common::serve(app).await;
    let source = HttpMenuSource::new(common::client(&base));
    let err = source.fetch_menu().await.unwrap_err();
    assert!(matches!(err, FetchError::HttpStatus { status: 502, .. }), "got {:?}", err);
    assert_eq!(err.describe(), "Server error (HTTP 502).");
}

#[derive(Clone, Default)]
struct Seen {
    last: Arc<Mutex<Option<(HashMap<String, String>, HeaderMap)>>>,
}

#[tokio::test]
async fn supabase_source_filters_orders_and_authenticates() {
    let seen = Seen::default();
    let app = Router::new()
        .route(
            "/rest/v1/menus",
            get(
                |State(seen): State<Seen>, Query(q): Query<HashMap<String, String>>, headers: HeaderMap| async move {
                    *seen.last.lock().unwrap() = Some((q, headers));
                    Json(json!([{ "id": 3, "name": "Salmon Nigiri", "price": 6.0, "category": "Sushi", "is_available": true }]))
                },
            ),
        )
        .with_state(seen.clone());
    let base = common::serve(app).await;
    let client = supabase_client(&base, "anon-key-123", common::quick_options(2000)).unwrap();
    let source = SupabaseMenuSource::new(Arc::new(client));

    let items = source.fetch_menu().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "3");
    assert_eq!(items[0].category, Some(Category::Sushi));

    let (query, headers) = seen.last.lock().unwrap().clone().expect("request recorded");
    assert_eq!(query.get("select").map(String::as_str), Some("*"));
    assert_eq!(query.get("is_available").map(String::as_str), Some("eq.true"));
    assert_eq!(query.get("order").map(String::as_str), Some("category.asc"));
    // PostgREST would read any extra parameter as a column filter
    assert_eq!(query.len(), 3);
    assert!(!query.contains_key("t"));
    assert_eq!(headers.get("cache-control").unwrap(), "no-store");
    assert_eq!(headers.get("apikey").unwrap(), "anon-key-123");
    assert_eq!(headers.get("authorization").unwrap(), "Bearer anon-key-123");
}
