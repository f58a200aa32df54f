use chrono::Duration;
use tracing::{info, warn};

use crate::domain::{
    default_code_ttl, BankDetails, Broker, BrokerId, Cents, Listing, ProfileUpdate, SignupForm,
    DEFAULT_BROKER_CODE_PREFIX,
};
use crate::storage::{BrokerInsert, Repository};

use super::password::{hash_password, validate_password, verify_password};
use super::AppError;

/// Settings the service needs from the outside world.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    /// Prefix for sequential broker codes (`PREFIX-00001`)
    pub broker_code_prefix: String,
    /// Lifetime of issued verification codes
    pub code_ttl: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            broker_code_prefix: DEFAULT_BROKER_CODE_PREFIX.to_string(),
            code_ttl: default_code_ttl(),
        }
    }
}

impl PortalConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.broker_code_prefix = prefix.into();
        self
    }
}

/// Application service providing every portal operation.
/// This is the primary interface for any client (HTTP, CLI, tests).
pub struct PortalService {
    pub(super) repo: Repository,
    pub(super) config: PortalConfig,
}

/// Result of an identity-provider login
#[derive(Debug)]
pub struct GoogleLoginOutcome {
    pub broker: Broker,
    pub is_new_user: bool,
    pub needs_completion: bool,
}

/// Fields for a new property listing
#[derive(Debug, Clone, Default)]
pub struct NewListing {
    pub broker_id: BrokerId,
    pub name: String,
    pub city: String,
    pub state: String,
    pub price_cents: Cents,
    pub description: String,
    pub photos: Vec<String>,
}

impl PortalService {
    /// Create a new service with the given repository.
    pub fn new(repo: Repository, config: PortalConfig) -> Self {
        Self { repo, config }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, config: PortalConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo, config))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, config: PortalConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo, config))
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    // ========================
    // Broker directory
    // ========================

    /// Register a broker from a completed signup form, assigning the next
    /// broker code.
    pub async fn register_broker(&self, form: SignupForm) -> Result<Broker, AppError> {
        check_signup(&form)?;
        let password_hash = hash_form_password(&form)?;
        self.register_with_hash(form, password_hash).await
    }

    /// Register a broker whose password, if any, has already been hashed.
    pub(super) async fn register_with_hash(
        &self,
        form: SignupForm,
        password_hash: Option<String>,
    ) -> Result<Broker, AppError> {
        check_signup(&form)?;

        let mut broker = Broker::from_signup(&form);
        broker.password_hash = password_hash;

        let inserted = self
            .repo
            .save_broker_with_code(&mut broker, &self.config.broker_code_prefix)
            .await?;
        if inserted == BrokerInsert::EmailTaken {
            return Err(AppError::EmailAlreadyRegistered(broker.email));
        }

        info!(
            broker_id = %broker.id,
            broker_code = broker.broker_code.as_deref().unwrap_or_default(),
            "registered broker"
        );
        Ok(broker)
    }

    /// Get a broker by ID.
    pub async fn get_broker(&self, id: BrokerId) -> Result<Broker, AppError> {
        self.repo
            .get_broker(id)
            .await?
            .ok_or_else(|| AppError::BrokerNotFound(id.to_string()))
    }

    /// Find a broker by email.
    pub async fn find_broker_by_email(&self, email: &str) -> Result<Option<Broker>, AppError> {
        Ok(self.repo.get_broker_by_email(email.trim()).await?)
    }

    /// List all brokers.
    pub async fn list_brokers(&self) -> Result<Vec<Broker>, AppError> {
        Ok(self.repo.list_brokers().await?)
    }

    /// Merge the provided profile fields into a broker.
    pub async fn update_profile(
        &self,
        id: BrokerId,
        update: &ProfileUpdate,
    ) -> Result<Broker, AppError> {
        let mut broker = self.get_broker(id).await?;
        broker.apply(update);
        self.repo.update_broker(&broker).await?;
        Ok(broker)
    }

    /// Save the payout destination for a broker.
    pub async fn save_bank_details(
        &self,
        id: BrokerId,
        details: BankDetails,
    ) -> Result<Broker, AppError> {
        if let Some(field) = details.first_missing_field() {
            return Err(AppError::MissingField(field));
        }

        let mut broker = self.get_broker(id).await?;
        broker.bank_details = Some(details);
        self.repo.update_broker(&broker).await?;

        info!(broker_id = %broker.id, "saved bank details");
        Ok(broker)
    }

    // ========================
    // Authentication
    // ========================

    /// Email/password login.
    pub async fn login(&self, email: &str, password: &str) -> Result<Broker, AppError> {
        let broker = self.repo.get_broker_by_email(email.trim()).await?;

        match broker {
            Some(broker) if verify_password(password, broker.password_hash.as_deref()) => {
                info!(broker_id = %broker.id, "login succeeded");
                Ok(broker)
            }
            _ => {
                warn!(email = email.trim(), "login failed");
                Err(AppError::InvalidCredentials)
            }
        }
    }

    /// Login through an identity provider that has already verified the email.
    /// Unknown emails get a new broker that must complete its profile.
    pub async fn google_login(
        &self,
        email: &str,
        name: &str,
        google_id: Option<String>,
    ) -> Result<GoogleLoginOutcome, AppError> {
        let email = email.trim();
        let name = name.trim();
        if email.is_empty() {
            return Err(AppError::MissingField("email"));
        }
        if name.is_empty() {
            return Err(AppError::MissingField("name"));
        }

        if let Some(broker) = self.repo.get_broker_by_email(email).await? {
            return self.returning_google_login(broker, google_id).await;
        }

        let broker = Broker::from_identity_provider(name, email, google_id.clone());
        if self.repo.save_broker(&broker).await? == BrokerInsert::EmailTaken {
            // Another request registered the email since the lookup above.
            let existing = self
                .repo
                .get_broker_by_email(email)
                .await?
                .ok_or_else(|| AppError::EmailAlreadyRegistered(email.to_string()))?;
            return self.returning_google_login(existing, google_id).await;
        }
        info!(broker_id = %broker.id, "created broker from identity provider");

        Ok(GoogleLoginOutcome {
            broker,
            is_new_user: true,
            needs_completion: true,
        })
    }

    async fn returning_google_login(
        &self,
        mut broker: Broker,
        google_id: Option<String>,
    ) -> Result<GoogleLoginOutcome, AppError> {
        if broker.google_id.is_none() {
            broker.google_id = google_id;
        }
        broker.needs_completion = !broker.has_complete_profile();
        self.repo.update_broker(&broker).await?;

        let needs_completion = broker.needs_completion;
        Ok(GoogleLoginOutcome {
            broker,
            is_new_user: false,
            needs_completion,
        })
    }

    /// Fill in the profile of a broker created through an identity provider.
    /// A broker code is assigned once the phone is verified.
    pub async fn complete_profile(
        &self,
        id: BrokerId,
        update: &ProfileUpdate,
    ) -> Result<Broker, AppError> {
        let mut broker = self.get_broker(id).await?;
        broker.apply(update);
        broker.needs_completion = false;
        self.repo.update_broker(&broker).await?;

        if broker.broker_code.is_none() && update.phone_verified == Some(true) {
            broker.broker_code = self
                .repo
                .assign_broker_code(id, &self.config.broker_code_prefix)
                .await?;
            info!(
                broker_id = %broker.id,
                broker_code = broker.broker_code.as_deref().unwrap_or_default(),
                "assigned broker code"
            );
        }

        Ok(broker)
    }

    /// Set or replace a broker's password.
    pub async fn set_password(&self, id: BrokerId, password: &str) -> Result<(), AppError> {
        let mut broker = self.get_broker(id).await?;
        validate_password(password)?;

        broker.password_hash = Some(hash_password(password)?);
        self.repo.update_broker(&broker).await?;

        info!(broker_id = %broker.id, "password set");
        Ok(())
    }

    // ========================
    // Listings
    // ========================

    /// Create a property listing for an existing broker.
    pub async fn create_listing(&self, new: NewListing) -> Result<Listing, AppError> {
        if new.name.trim().is_empty() {
            return Err(AppError::MissingField("name"));
        }
        if new.price_cents < 0 {
            return Err(AppError::InvalidAmount(
                "Price cannot be negative".to_string(),
            ));
        }
        self.get_broker(new.broker_id).await?;

        let listing = Listing::new(new.broker_id, new.name.trim(), new.price_cents)
            .with_location(new.city, new.state)
            .with_description(new.description)
            .with_photos(new.photos);

        self.repo.save_listing(&listing).await?;
        Ok(listing)
    }

    /// List a broker's listings.
    pub async fn list_listings(&self, broker_id: BrokerId) -> Result<Vec<Listing>, AppError> {
        Ok(self.repo.list_listings_for_broker(broker_id).await?)
    }
}

fn check_signup(form: &SignupForm) -> Result<(), AppError> {
    if form.name.trim().is_empty() {
        return Err(AppError::MissingField("name"));
    }
    if form.email.trim().is_empty() {
        return Err(AppError::MissingField("email"));
    }
    Ok(())
}

/// Validate and hash the form's password. An absent or empty password
/// yields no hash.
pub(super) fn hash_form_password(form: &SignupForm) -> Result<Option<String>, AppError> {
    match form.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) => {
            validate_password(password)?;
            Ok(Some(hash_password(password)?))
        }
        None => Ok(None),
    }
}
