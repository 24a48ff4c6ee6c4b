use chrono::{DateTime, Utc};

/// Milliseconds since the unix epoch, UTC.
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current UTC time.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Keeps the first 18 characters of a secret and replaces the rest with `…`.
///
/// Empty or missing values render as `EMPTY` so a missing key is obvious in logs.
pub fn mask_secret(secret: Option<&str>) -> String {
    match secret {
        Some(s) if !s.is_empty() => {
            let head: String = s.chars().take(18).collect();
            format!("{}…", head)
        }
        _ => "EMPTY".to_string(),
    }
}
