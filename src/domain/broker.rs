use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type BrokerId = Uuid;

/// Payout destination for withdrawals. Every field is mandatory; absent
/// fields deserialize as empty so validation can name them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BankDetails {
    #[serde(alias = "nome_completo")]
    pub full_name: String,
    pub cpf: String,
    #[serde(alias = "banco")]
    pub bank_name: String,
    #[serde(alias = "codigo_banco")]
    pub bank_code: String,
    #[serde(alias = "agencia")]
    pub branch: String,
    #[serde(alias = "conta")]
    pub account: String,
    #[serde(alias = "chave_pix")]
    pub pix_key: String,
}

impl BankDetails {
    /// Returns the name of the first blank field, if any.
    pub fn first_missing_field(&self) -> Option<&'static str> {
        [
            ("full_name", &self.full_name),
            ("cpf", &self.cpf),
            ("bank_name", &self.bank_name),
            ("bank_code", &self.bank_code),
            ("branch", &self.branch),
            ("account", &self.account),
            ("pix_key", &self.pix_key),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// A registered sales agent.
///
/// Balances are only ever written by the ledger operations in the
/// application layer; [`ProfileUpdate`] has no way to touch them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    /// Externally visible sequential code (`BCTCR-00042`). Brokers that signed up
    /// through an identity provider get one only after verifying their phone.
    pub broker_code: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub cpf: String,
    pub address: String,
    pub social_handle: String,
    /// Broker licence number, optional
    pub creci: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub google_id: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub available_balance_cents: Cents,
    pub pending_balance_cents: Cents,
    pub bank_details: Option<BankDetails>,
    pub needs_completion: bool,
    pub created_at: DateTime<Utc>,
}

impl Broker {
    /// A broker with empty profile fields and zero balances.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            broker_code: None,
            name: name.into(),
            email: email.into(),
            phone: String::new(),
            cpf: String::new(),
            address: String::new(),
            social_handle: String::new(),
            creci: None,
            password_hash: None,
            google_id: None,
            email_verified: false,
            phone_verified: false,
            available_balance_cents: 0,
            pending_balance_cents: 0,
            bank_details: None,
            needs_completion: false,
            created_at: Utc::now(),
        }
    }

    /// Build a broker from a completed signup form. The caller has already
    /// verified email and phone, and hashes the password separately.
    pub fn from_signup(form: &SignupForm) -> Self {
        let mut broker = Self::new(form.name.trim(), form.email.trim());
        broker.phone = form.phone.clone();
        broker.cpf = form.cpf.clone();
        broker.address = form.address.clone();
        broker.social_handle = form.social_handle.clone();
        broker.creci = form.creci.clone().filter(|c| !c.trim().is_empty());
        broker.email_verified = true;
        broker.phone_verified = true;
        broker
    }

    /// A broker created from an identity provider login: email is trusted,
    /// everything else must be filled in later.
    pub fn from_identity_provider(
        name: impl Into<String>,
        email: impl Into<String>,
        google_id: Option<String>,
    ) -> Self {
        let mut broker = Self::new(name, email);
        broker.google_id = google_id;
        broker.email_verified = true;
        broker.needs_completion = true;
        broker
    }

    pub fn with_broker_code(mut self, code: impl Into<String>) -> Self {
        self.broker_code = Some(code.into());
        self
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Profile is complete once contact data is in, the phone is verified and
    /// a broker code has been assigned.
    pub fn has_complete_profile(&self) -> bool {
        !self.phone.trim().is_empty()
            && !self.cpf.trim().is_empty()
            && !self.address.trim().is_empty()
            && self.phone_verified
            && self.broker_code.is_some()
    }

    /// Merge the provided fields; absent fields are left untouched.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(phone) = &update.phone {
            self.phone = phone.clone();
        }
        if let Some(cpf) = &update.cpf {
            self.cpf = cpf.clone();
        }
        if let Some(address) = &update.address {
            self.address = address.clone();
        }
        if let Some(social_handle) = &update.social_handle {
            self.social_handle = social_handle.clone();
        }
        if let Some(creci) = &update.creci {
            self.creci = Some(creci.clone()).filter(|c| !c.trim().is_empty());
        }
        if let Some(email_verified) = update.email_verified {
            self.email_verified = email_verified;
        }
        if let Some(phone_verified) = update.phone_verified {
            self.phone_verified = phone_verified;
        }
    }
}

/// Fields accepted by the signup form and by the pending payload stored with
/// a verification code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupForm {
    #[serde(alias = "nome")]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, alias = "telefone")]
    pub phone: String,
    #[serde(default)]
    pub cpf: String,
    #[serde(default, alias = "endereco")]
    pub address: String,
    #[serde(default, alias = "rede_social")]
    pub social_handle: String,
    #[serde(default)]
    pub creci: Option<String>,
    #[serde(default, alias = "senha", skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Partial profile update. Only fields that are `Some` are applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, alias = "nome")]
    pub name: Option<String>,
    #[serde(default, alias = "telefone")]
    pub phone: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default, alias = "endereco")]
    pub address: Option<String>,
    #[serde(default, alias = "rede_social")]
    pub social_handle: Option<String>,
    #[serde(default)]
    pub creci: Option<String>,
    #[serde(default, alias = "email_verificado")]
    pub email_verified: Option<bool>,
    #[serde(default, alias = "telefone_verificado")]
    pub phone_verified: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_bank_details() -> BankDetails {
        BankDetails {
            full_name: "Ana Souza".into(),
            cpf: "123.456.789-00".into(),
            bank_name: "Banco do Brasil".into(),
            bank_code: "001".into(),
            branch: "1234".into(),
            account: "56789-0".into(),
            pix_key: "ana@example.com".into(),
        }
    }

    #[test]
    fn test_new_broker_starts_with_zero_balances() {
        let broker = Broker::new("Ana", "ana@example.com");
        assert_eq!(broker.available_balance_cents, 0);
        assert_eq!(broker.pending_balance_cents, 0);
        assert!(broker.broker_code.is_none());
        assert!(!broker.has_password());
    }

    #[test]
    fn test_identity_provider_broker_needs_completion() {
        let broker = Broker::from_identity_provider("Ana", "ana@example.com", Some("g-1".into()));
        assert!(broker.email_verified);
        assert!(!broker.phone_verified);
        assert!(broker.needs_completion);
        assert!(!broker.has_complete_profile());
    }

    #[test]
    fn test_complete_profile_requires_code_and_verified_phone() {
        let mut broker = Broker::new("Ana", "ana@example.com");
        broker.apply(&ProfileUpdate {
            phone: Some("+55 11 99999-0000".into()),
            cpf: Some("123".into()),
            address: Some("Rua A, 1".into()),
            ..Default::default()
        });
        assert!(!broker.has_complete_profile());

        broker.phone_verified = true;
        assert!(!broker.has_complete_profile());

        let broker = broker.with_broker_code("BCTCR-00001");
        assert!(broker.has_complete_profile());
    }

    #[test]
    fn test_apply_leaves_absent_fields_untouched() {
        let mut broker = Broker::new("Ana", "ana@example.com");
        broker.phone = "111".into();
        broker.apply(&ProfileUpdate {
            name: Some("Ana Souza".into()),
            ..Default::default()
        });
        assert_eq!(broker.name, "Ana Souza");
        assert_eq!(broker.phone, "111");
        assert_eq!(broker.email, "ana@example.com");
    }

    #[test]
    fn test_bank_details_missing_field() {
        assert_eq!(complete_bank_details().first_missing_field(), None);

        let mut details = complete_bank_details();
        details.branch = "  ".into();
        assert_eq!(details.first_missing_field(), Some("branch"));
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let mut broker = Broker::new("Ana", "ana@example.com");
        broker.password_hash = Some("$argon2id$secret".into());
        let json = serde_json::to_value(&broker).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_signup_form_accepts_portuguese_field_names() {
        let form: SignupForm = serde_json::from_str(
            r#"{"nome": "Ana", "email": "ana@example.com", "telefone": "119", "senha": "segredo"}"#,
        )
        .unwrap();
        assert_eq!(form.name, "Ana");
        assert_eq!(form.phone, "119");
        assert_eq!(form.password.as_deref(), Some("segredo"));
    }
}
