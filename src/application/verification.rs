use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{Broker, SignupForm, VerificationCode, VerificationPurpose};

use super::service::hash_form_password;
use super::{AppError, PortalService};

/// Registration data as stored alongside a code. The plaintext password is
/// replaced by its hash before anything is written.
#[derive(Debug, Serialize, Deserialize)]
struct PendingSignup {
    #[serde(flatten)]
    form: SignupForm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password_hash: Option<String>,
}

impl PendingSignup {
    fn from_payload(payload: Value) -> Result<Self, AppError> {
        let mut form: SignupForm = serde_json::from_value(payload)
            .map_err(|e| AppError::Validation(format!("Invalid registration data: {}", e)))?;
        let password_hash = hash_form_password(&form)?;
        form.password = None;
        Ok(Self {
            form,
            password_hash,
        })
    }
}

/// Outcome of checking a submitted code.
#[derive(Debug, Clone)]
pub struct Verification {
    pub valid: bool,
    /// Registration data stored with the code, returned only when valid
    pub pending_payload: Option<Value>,
}

impl Verification {
    fn invalid() -> Self {
        Self {
            valid: false,
            pending_payload: None,
        }
    }
}

impl PortalService {
    /// Issue a new code for (email, purpose), replacing any previous one.
    pub async fn issue_code(
        &self,
        email: &str,
        purpose: VerificationPurpose,
        pending_payload: Option<Value>,
    ) -> Result<VerificationCode, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::MissingField("email"));
        }

        let pending_payload = match pending_payload {
            Some(payload) if !payload.is_null() => {
                let pending = PendingSignup::from_payload(payload)?;
                Some(serde_json::to_value(&pending).map_err(anyhow::Error::from)?)
            }
            _ => None,
        };

        let code = VerificationCode::issue(
            email,
            purpose,
            pending_payload,
            Utc::now(),
            self.config.code_ttl,
        );
        self.repo.save_verification_code(&code).await?;

        info!(email, purpose = %purpose, expires_at = %code.expires_at, "issued verification code");
        Ok(code)
    }

    /// Check a code against the clock. The code is not consumed.
    pub async fn verify_code(
        &self,
        email: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<Verification, AppError> {
        self.verify_code_at(email, code, purpose, Utc::now()).await
    }

    /// Check a code as of `now`.
    pub async fn verify_code_at(
        &self,
        email: &str,
        code: &str,
        purpose: VerificationPurpose,
        now: DateTime<Utc>,
    ) -> Result<Verification, AppError> {
        let stored = self.repo.get_verification_code(email.trim(), purpose).await?;

        Ok(match stored {
            Some(stored) if stored.matches(code, now) => Verification {
                valid: true,
                pending_payload: stored.pending_payload,
            },
            _ => {
                debug!(email = email.trim(), purpose = %purpose, "verification code rejected");
                Verification::invalid()
            }
        })
    }

    /// Delete any code for (email, purpose).
    pub async fn clear_code(&self, email: &str, purpose: VerificationPurpose) -> Result<(), AppError> {
        self.repo.delete_verification_code(email.trim(), purpose).await?;
        Ok(())
    }

    /// Signup confirmation step. An invalid code is an error. A valid phone
    /// code carrying registration data creates the broker and clears both of
    /// the email's codes; anything else just confirms.
    pub async fn confirm_code(
        &self,
        email: &str,
        code: &str,
        purpose: VerificationPurpose,
    ) -> Result<Option<Broker>, AppError> {
        let verification = self.verify_code(email, code, purpose).await?;
        if !verification.valid {
            return Err(AppError::InvalidOrExpiredCode);
        }

        let payload = match (purpose, verification.pending_payload) {
            (VerificationPurpose::Phone, Some(payload)) if !payload.is_null() => payload,
            _ => return Ok(None),
        };

        let PendingSignup {
            mut form,
            password_hash,
        } = serde_json::from_value(payload)
            .map_err(|e| AppError::Validation(format!("Invalid registration data: {}", e)))?;
        if form.email.trim().is_empty() {
            form.email = email.trim().to_string();
        }

        let broker = match password_hash {
            Some(hash) => self.register_with_hash(form, Some(hash)).await?,
            None => self.register_broker(form).await?,
        };
        self.clear_code(email, VerificationPurpose::Email).await?;
        self.clear_code(email, VerificationPurpose::Phone).await?;

        Ok(Some(broker))
    }
}
