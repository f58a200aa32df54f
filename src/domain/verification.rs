use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Codes expire this many minutes after being issued.
pub const VERIFICATION_CODE_TTL_MINUTES: i64 = 10;

/// What the code proves control of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationPurpose {
    Email,
    #[serde(alias = "telefone")]
    Phone,
}

impl VerificationPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationPurpose::Email => "email",
            VerificationPurpose::Phone => "phone",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "email" => Some(VerificationPurpose::Email),
            "phone" | "telefone" => Some(VerificationPurpose::Phone),
            _ => None,
        }
    }
}

impl std::fmt::Display for VerificationPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A short-lived code keyed by (email, purpose). Issuing a new code for the
/// same key replaces the previous one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCode {
    pub email: String,
    pub purpose: VerificationPurpose,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    /// Registration data held until the final verification step
    pub pending_payload: Option<Value>,
}

impl VerificationCode {
    /// Issue a fresh random code expiring `ttl` after `now`.
    pub fn issue(
        email: impl Into<String>,
        purpose: VerificationPurpose,
        pending_payload: Option<Value>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            email: email.into(),
            purpose,
            code: generate_code(),
            expires_at: now + ttl,
            pending_payload,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// A submitted code matches if it is this code and it has not expired.
    pub fn matches(&self, code: &str, now: DateTime<Utc>) -> bool {
        self.code == code.trim() && !self.is_expired(now)
    }
}

/// Uniformly random six-digit code in `100000..=999999`.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999u32).to_string()
}

/// Default time-to-live for issued codes.
pub fn default_code_ttl() -> Duration {
    Duration::minutes(VERIFICATION_CODE_TTL_MINUTES)
}
