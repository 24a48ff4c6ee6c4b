//! # Staff PIN Login
//!
//! The login screen's logic without the screen: a 4-digit PIN buffer, a
//! remote verifier and the flow that ties them together.
//!
//! Whatever the verifier answers (or if the attempt is cancelled midway),
//! the PIN buffer is wiped, the submitting flag is reset and the input asks
//! for focus again.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::retrieve::ky_http::{ApiClient, FetchError};

/// Number of digits in a staff PIN.
pub const PIN_LENGTH: usize = 4;

/// RPC endpoint of the verification function on the hosted database.
pub const VERIFY_PIN_RPC_PATH: &str = "rest/v1/rpc/verify_pin_user";

/// Staff name used when the verifier does not return one.
pub const DEFAULT_STAFF_NAME: &str = "User";

/// Length of the haptic pulse on a failed attempt.
pub const HAPTIC_PULSE_MS: u64 = 50;

/// # PIN Input
///
/// Digits only, never more than [`PIN_LENGTH`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinInput {
    digits: String,
    submitting: bool,
    focus_requested: bool,
}

impl PinInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the buffer with the digits of `raw`, truncated to the PIN length.
    pub fn set_text(&mut self, raw: &str) {
        self.digits = raw.chars().filter(char::is_ascii_digit).take(PIN_LENGTH).collect();
    }

    /// Appends one character if it is a digit and there is room.
    pub fn push(&mut self, c: char) {
        if c.is_ascii_digit() && self.digits.len() < PIN_LENGTH {
            self.digits.push(c);
        }
    }

    pub fn backspace(&mut self) {
        self.digits.pop();
    }

    pub fn value(&self) -> &str {
        &self.digits
    }

    pub fn len(&self) -> usize {
        self.digits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digits.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.digits.len() == PIN_LENGTH
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// The login button is enabled only for a full PIN with no attempt running.
    pub fn can_submit(&self) -> bool {
        self.is_complete() && !self.submitting
    }

    /// True once after an attempt finished; the input should take focus.
    pub fn take_focus_request(&mut self) -> bool {
        std::mem::take(&mut self.focus_requested)
    }

    fn finish_attempt(&mut self) {
        self.digits.clear();
        self.submitting = false;
        self.focus_requested = true;
    }
}

/// Result of one verification call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PinVerdict {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub user_name: Option<String>,
    /// Set while the account is locked out after too many attempts.
    #[serde(default)]
    pub locked_until: Option<DateTime<Utc>>,
}

/// Anything that can check a PIN.
#[async_trait]
pub trait PinVerifier: Send + Sync {
    async fn verify(&self, pin: &str) -> Result<PinVerdict, FetchError>;
}

/// # Supabase PIN Verifier
///
/// Calls the `verify_pin_user` database function. The function may answer
/// with a single object or a one-row array; an empty answer counts as a
/// rejection.
pub struct SupabasePinVerifier {
    client: Arc<ApiClient>,
}

impl SupabasePinVerifier {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PinVerifier for SupabasePinVerifier {
    async fn verify(&self, pin: &str) -> Result<PinVerdict, FetchError> {
        let response = self
            .client
            .post_json(VERIFY_PIN_RPC_PATH, &json!({ "p_pin": pin }))
            .await?
            .error_for_status()?;

        let value: Value = response.json()?;
        let row = match value {
            Value::Array(mut rows) => {
                if rows.is_empty() {
                    Value::Null
                } else {
                    rows.swap_remove(0)
                }
            }
            other => other,
        };
        if row.is_null() {
            return Ok(PinVerdict::default());
        }

        serde_json::from_value(row).map_err(|e| FetchError::MalformedResponse {
            url: response.url.clone(),
            message: e.to_string(),
        })
    }
}

/// User-visible cues for a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub shake: bool,
    pub haptic_ms: u64,
    pub alert_title: String,
    pub alert_body: String,
}

impl Feedback {
    fn alert(title: &str, body: String) -> Self {
        Self {
            shake: true,
            haptic_ms: HAPTIC_PULSE_MS,
            alert_title: title.to_string(),
            alert_body: body,
        }
    }
}

/// How a submitted PIN attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Go to the menu as this staff member.
    Authenticated { staff_name: String },
    /// Wrong PIN, or locked out.
    Rejected {
        locked_until: Option<DateTime<Utc>>,
        feedback: Feedback,
    },
    /// The verifier could not be reached or answered nonsense.
    Failed { message: String, feedback: Feedback },
}

/// Resets the input when an attempt ends, including by cancellation.
struct AttemptGuard<'a>(&'a mut PinInput);

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.0.finish_attempt();
    }
}

/// # Login Flow
pub struct LoginFlow {
    verifier: Arc<dyn PinVerifier>,
    input: PinInput,
}

impl LoginFlow {
    pub fn new(verifier: Arc<dyn PinVerifier>) -> Self {
        Self {
            verifier,
            input: PinInput::new(),
        }
    }

    pub fn input(&self) -> &PinInput {
        &self.input
    }

    pub fn input_mut(&mut self) -> &mut PinInput {
        &mut self.input
    }

    /// Verifies the current PIN.
    ///
    /// Returns `None`, without calling the verifier, when the PIN is not
    /// complete or an attempt is already running.
    pub async fn submit(&mut self) -> Option<LoginOutcome> {
        if !self.input.can_submit() {
            return None;
        }
        let pin = self.input.value().to_string();
        self.input.submitting = true;

        let verifier = Arc::clone(&self.verifier);
        let _guard = AttemptGuard(&mut self.input);

        let outcome = match verifier.verify(&pin).await {
            Ok(verdict) if verdict.ok => {
                let staff_name = verdict
                    .user_name
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_STAFF_NAME.to_string());
                log::info!("Staff {} signed in", staff_name);
                LoginOutcome::Authenticated { staff_name }
            }
            Ok(verdict) => {
                let body = match verdict.locked_until {
                    Some(until) => format!("Try again.\nlocked_until: {}", until.to_rfc3339()),
                    None => "Try again.".to_string(),
                };
                log::warn!("PIN rejected (locked_until: {:?})", verdict.locked_until);
                LoginOutcome::Rejected {
                    locked_until: verdict.locked_until,
                    feedback: Feedback::alert("Invalid PIN", body),
                }
            }
            Err(e) => {
                log::error!("PIN verification failed: {}", e);
                LoginOutcome::Failed {
                    message: e.describe(),
                    feedback: Feedback::alert("Login failed", e.describe()),
                }
            }
        };
        Some(outcome)
    }
}
