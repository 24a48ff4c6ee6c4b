//! # Menu Sources
//!
//! The remote side of the catalog. Two backends are supported:
//!
//! - **`HttpMenuSource`**: the custom menu server, `GET {base}/api/menu`.
//! - **`SupabaseMenuSource`**: the hosted `menus` table through its REST
//!   interface, only rows with `is_available = true`, ordered by category.
//!
//! Both go through [`ApiClient`], so both are deadline-bound, cache-busted
//! and report failures as [`FetchError`]. A body that is not a JSON array is
//! treated as an empty menu rather than an error.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde_json::Value;

use crate::menu::model::MenuItem;
use crate::retrieve::ky_http::{ApiClient, ApiResponse, ClientOptions, FetchError};

/// Path of the custom menu endpoint, relative to its base URL.
pub const MENU_PATH: &str = "api/menu";

/// Path of the hosted menu table.
pub const MENUS_TABLE_PATH: &str = "rest/v1/menus";

/// Anything that can produce the current list of menu items.
#[async_trait]
pub trait MenuSource: Send + Sync {
    /// Fetches the full menu. The result replaces whatever the caller held.
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, FetchError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// # HTTP Menu Source
///
/// Fetches from the terminal's own menu server.
pub struct HttpMenuSource {
    client: Arc<ApiClient>,
}

impl HttpMenuSource {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MenuSource for HttpMenuSource {
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, FetchError> {
        let response = self.client.get_fresh(MENU_PATH, &[]).await?.error_for_status()?;
        Ok(decode_menu_body(&response))
    }

    fn describe(&self) -> String {
        format!("http menu at {}{}", self.client.base_url(), MENU_PATH)
    }
}

/// # Supabase Menu Source
///
/// Reads the `menus` table of the hosted database using the anon key.
pub struct SupabaseMenuSource {
    client: Arc<ApiClient>,
}

impl SupabaseMenuSource {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MenuSource for SupabaseMenuSource {
    async fn fetch_menu(&self) -> Result<Vec<MenuItem>, FetchError> {
        let query = [
            ("select", "*"),
            ("is_available", "eq.true"),
            ("order", "category.asc"),
        ];
        let response = self
            .client
            .get_no_store(MENUS_TABLE_PATH, &query)
            .await?
            .error_for_status()?;
        Ok(decode_menu_body(&response))
    }

    fn describe(&self) -> String {
        format!("supabase table at {}{}", self.client.base_url(), MENUS_TABLE_PATH)
    }
}

/// Builds an [`ApiClient`] for the hosted database: every request carries
/// the anon key both as `apikey` and as a Bearer token.
pub fn supabase_client(url: &str, anon_key: &str, mut options: ClientOptions) -> Result<ApiClient, FetchError> {
    let key = HeaderValue::from_str(anon_key)
        .map_err(|e| FetchError::InvalidUrl(format!("anon key is not a valid header value: {}", e)))?;
    options.default_headers.insert("apikey", key);
    options.auth_token = Some(anon_key.to_string());
    ApiClient::new(url, options)
}

/// Decodes a menu body leniently.
///
/// - not JSON, or JSON that is not an array → empty list
/// - array elements that do not decode → skipped
pub fn decode_menu_body(response: &ApiResponse) -> Vec<MenuItem> {
    let value: Value = match serde_json::from_str(&response.body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("Menu body from {} is not JSON ({}); using an empty menu", response.url, e);
            return Vec::new();
        }
    };

    let Value::Array(rows) = value else {
        log::warn!("Menu body from {} is not an array; using an empty menu", response.url);
        return Vec::new();
    };

    let total = rows.len();
    let items: Vec<MenuItem> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(idx, row)| match serde_json::from_value::<MenuItem>(row) {
            Ok(item) => Some(item),
            Err(e) => {
                log::warn!("Skipping menu row {} from {}: {}", idx, response.url, e);
                None
            }
        })
        .collect();

    if items.len() < total {
        log::warn!("Kept {} of {} menu rows from {}", items.len(), total, response.url);
    } else {
        log::debug!("Decoded {} menu rows from {}", total, response.url);
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;

    fn response(body: &str) -> ApiResponse {
        ApiResponse {
            body: body.to_string(),
            status: 200,
            success: true,
            headers: HeaderMap::new(),
            url: "http://pos.local/api/menu".to_string(),
        }
    }

    #[test]
    fn object_body_becomes_empty_menu() {
        assert!(decode_menu_body(&response(r#"{"items": []}"#)).is_empty());
    }

    #[test]
    fn non_json_body_becomes_empty_menu() {
        assert!(decode_menu_body(&response("<html>gateway</html>")).is_empty());
    }

    #[test]
    fn bad_rows_are_dropped_and_good_rows_kept_in_order() {
        let body = r#"[
            {"id": "1", "name": "Udon", "price_cents": 1200},
            {"id": "2", "name": "No price"},
            {"id": "3", "name": "Gyoza", "price_cents": 800}
        ]"#;
        let items = decode_menu_body(&response(body));
        let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn supabase_client_rejects_unprintable_key() {
        let res = supabase_client("https://abc.supabase.co", "bad\nkey", ClientOptions::default());
        assert!(res.is_err());
    }
}
