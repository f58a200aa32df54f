use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    next_broker_code, BankDetails, Broker, BrokerId, Cents, Commission, CommissionId,
    CommissionStatus, Listing, VerificationCode, VerificationPurpose, Withdrawal, WithdrawalId,
    WithdrawalStatus,
};

use super::MIGRATION_001_INITIAL;

const BROKER_COLUMNS: &str = "id, broker_code, name, email, phone, cpf, address, social_handle, creci, password_hash, google_id, email_verified, phone_verified, available_balance_cents, pending_balance_cents, bank_details, needs_completion, created_at";

const COMMISSION_COLUMNS: &str =
    "id, broker_id, sale_amount_cents, percentage_bps, commission_cents, status, created_at";

const WITHDRAWAL_COLUMNS: &str = "id, broker_id, amount_cents, destination_key, status, created_at";

const LISTING_COLUMNS: &str =
    "id, broker_id, name, city, state, price_cents, description, photos, created_at";

/// Outcome of a withdrawal debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceWrite {
    Applied,
    BrokerNotFound,
    InsufficientFunds { available: Cents },
}

/// Outcome of crediting a commission or releasing it to the available balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditWrite {
    Applied,
    BrokerNotFound,
    /// Only pending commissions can be released
    NotPending,
    /// The resulting balance would not fit in `Cents`
    BalanceOverflow,
}

/// Outcome of inserting a broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerInsert {
    Inserted,
    EmailTaken,
}

/// Repository for persisting and querying brokers, ledger records,
/// verification codes and listings.
///
/// The pool holds a single connection, so transactions are serialized and a
/// balance read-modify-write can never interleave with another one.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Broker operations
    // ========================

    /// Save a new broker as-is, unless its email is already registered.
    /// The email check and the insert share one transaction.
    pub async fn save_broker(&self, broker: &Broker) -> Result<BrokerInsert> {
        let mut tx = self.pool.begin().await?;

        if Self::email_taken(&mut *tx, &broker.email).await? {
            tx.rollback().await?;
            return Ok(BrokerInsert::EmailTaken);
        }
        Self::insert_broker(&mut *tx, broker).await?;

        tx.commit().await.context("Failed to commit broker")?;
        Ok(BrokerInsert::Inserted)
    }

    /// Save a new broker, assigning it the next broker code for `prefix`.
    /// Email check, code lookup and insert share one transaction.
    pub async fn save_broker_with_code(
        &self,
        broker: &mut Broker,
        prefix: &str,
    ) -> Result<BrokerInsert> {
        let mut tx = self.pool.begin().await?;

        if Self::email_taken(&mut *tx, &broker.email).await? {
            tx.rollback().await?;
            return Ok(BrokerInsert::EmailTaken);
        }
        let code = Self::next_code(&mut *tx, prefix).await?;
        broker.broker_code = Some(code);
        Self::insert_broker(&mut *tx, broker).await?;

        tx.commit().await.context("Failed to commit broker")?;
        Ok(BrokerInsert::Inserted)
    }

    async fn email_taken(conn: &mut sqlx::SqliteConnection, email: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM brokers WHERE email = ?")
            .bind(email)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to check broker email")?;
        Ok(row.is_some())
    }

    async fn broker_exists(conn: &mut sqlx::SqliteConnection, id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM brokers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
            .context("Failed to check broker")?;
        Ok(row.is_some())
    }

    /// Assign the next broker code to a broker that has none.
    /// Returns the broker's code afterwards, or `None` if the broker does not exist.
    pub async fn assign_broker_code(&self, id: BrokerId, prefix: &str) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<Option<String>> =
            sqlx::query("SELECT broker_code FROM brokers WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to fetch broker code")?
                .map(|row| row.get("broker_code"));

        let code = match existing {
            None => return Ok(None),
            Some(Some(code)) => code,
            Some(None) => {
                let code = Self::next_code(&mut *tx, prefix).await?;
                sqlx::query("UPDATE brokers SET broker_code = ? WHERE id = ? AND broker_code IS NULL")
                    .bind(&code)
                    .bind(id.to_string())
                    .execute(&mut *tx)
                    .await
                    .context("Failed to assign broker code")?;
                code
            }
        };

        tx.commit().await.context("Failed to commit broker code")?;
        Ok(Some(code))
    }

    async fn next_code(conn: &mut sqlx::SqliteConnection, prefix: &str) -> Result<String> {
        let codes: Vec<String> = sqlx::query(
            "SELECT broker_code FROM brokers WHERE broker_code IS NOT NULL AND broker_code LIKE ?",
        )
        .bind(format!("{}-%", prefix))
        .fetch_all(&mut *conn)
        .await
        .context("Failed to list broker codes")?
        .iter()
        .map(|row| row.get("broker_code"))
        .collect();

        Ok(next_broker_code(prefix, codes.iter().map(String::as_str)))
    }

    async fn insert_broker(conn: &mut sqlx::SqliteConnection, broker: &Broker) -> Result<()> {
        let bank_details_json = broker
            .bank_details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO brokers (id, broker_code, name, email, phone, cpf, address, social_handle, creci, password_hash, google_id, email_verified, phone_verified, available_balance_cents, pending_balance_cents, bank_details, needs_completion, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(broker.id.to_string())
        .bind(&broker.broker_code)
        .bind(&broker.name)
        .bind(&broker.email)
        .bind(&broker.phone)
        .bind(&broker.cpf)
        .bind(&broker.address)
        .bind(&broker.social_handle)
        .bind(&broker.creci)
        .bind(&broker.password_hash)
        .bind(&broker.google_id)
        .bind(broker.email_verified)
        .bind(broker.phone_verified)
        .bind(broker.available_balance_cents)
        .bind(broker.pending_balance_cents)
        .bind(&bank_details_json)
        .bind(broker.needs_completion)
        .bind(broker.created_at.to_rfc3339())
        .execute(&mut *conn)
        .await
        .context("Failed to save broker")?;
        Ok(())
    }

    /// Persist profile, credential, verification and bank fields.
    /// Balances and the broker code are not written here.
    pub async fn update_broker(&self, broker: &Broker) -> Result<bool> {
        let bank_details_json = broker
            .bank_details
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = sqlx::query(
            r#"
            UPDATE brokers
            SET name = ?, phone = ?, cpf = ?, address = ?, social_handle = ?, creci = ?,
                password_hash = ?, google_id = ?, email_verified = ?, phone_verified = ?,
                bank_details = ?, needs_completion = ?
            WHERE id = ?
            "#,
        )
        .bind(&broker.name)
        .bind(&broker.phone)
        .bind(&broker.cpf)
        .bind(&broker.address)
        .bind(&broker.social_handle)
        .bind(&broker.creci)
        .bind(&broker.password_hash)
        .bind(&broker.google_id)
        .bind(broker.email_verified)
        .bind(broker.phone_verified)
        .bind(&bank_details_json)
        .bind(broker.needs_completion)
        .bind(broker.id.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to update broker")?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a broker by ID.
    pub async fn get_broker(&self, id: BrokerId) -> Result<Option<Broker>> {
        let sql = format!("SELECT {} FROM brokers WHERE id = ?", BROKER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch broker")?;

        row.as_ref().map(Self::row_to_broker).transpose()
    }

    /// Get a broker by email.
    pub async fn get_broker_by_email(&self, email: &str) -> Result<Option<Broker>> {
        let sql = format!("SELECT {} FROM brokers WHERE email = ?", BROKER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch broker by email")?;

        row.as_ref().map(Self::row_to_broker).transpose()
    }

    /// List all brokers, oldest first.
    pub async fn list_brokers(&self) -> Result<Vec<Broker>> {
        let sql = format!(
            "SELECT {} FROM brokers ORDER BY created_at, broker_code",
            BROKER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list brokers")?;

        rows.iter().map(Self::row_to_broker).collect()
    }

    fn row_to_broker(row: &SqliteRow) -> Result<Broker> {
        let id_str: String = row.get("id");
        let bank_details_json: Option<String> = row.get("bank_details");
        let created_at_str: String = row.get("created_at");

        Ok(Broker {
            id: Uuid::parse_str(&id_str).context("Invalid broker ID")?,
            broker_code: row.get("broker_code"),
            name: row.get("name"),
            email: row.get("email"),
            phone: row.get("phone"),
            cpf: row.get("cpf"),
            address: row.get("address"),
            social_handle: row.get("social_handle"),
            creci: row.get("creci"),
            password_hash: row.get("password_hash"),
            google_id: row.get("google_id"),
            email_verified: row.get::<i32, _>("email_verified") != 0,
            phone_verified: row.get::<i32, _>("phone_verified") != 0,
            available_balance_cents: row.get("available_balance_cents"),
            pending_balance_cents: row.get("pending_balance_cents"),
            bank_details: bank_details_json
                .map(|json| serde_json::from_str::<BankDetails>(&json))
                .transpose()
                .context("Invalid bank details")?,
            needs_completion: row.get::<i32, _>("needs_completion") != 0,
            created_at: parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    // ========================
    // Ledger operations
    // ========================

    /// Insert a commission and credit the broker bucket matching its status,
    /// in one transaction. The credit is refused if the bucket would overflow.
    pub async fn save_commission(&self, commission: &Commission) -> Result<CreditWrite> {
        let mut tx = self.pool.begin().await?;
        let broker_id = commission.broker_id.to_string();

        let sql = match commission.status {
            CommissionStatus::Pending => {
                r#"
                UPDATE brokers SET pending_balance_cents = pending_balance_cents + ?
                WHERE id = ? AND pending_balance_cents <= ?
                "#
            }
            CommissionStatus::Available => {
                r#"
                UPDATE brokers SET available_balance_cents = available_balance_cents + ?
                WHERE id = ? AND available_balance_cents <= ?
                "#
            }
        };
        let credited = sqlx::query(sql)
            .bind(commission.commission_cents)
            .bind(&broker_id)
            .bind(Cents::MAX - commission.commission_cents)
            .execute(&mut *tx)
            .await
            .context("Failed to credit broker balance")?;

        if credited.rows_affected() == 0 {
            let exists = Self::broker_exists(&mut *tx, &broker_id).await?;
            tx.rollback().await?;
            return Ok(if exists {
                CreditWrite::BalanceOverflow
            } else {
                CreditWrite::BrokerNotFound
            });
        }

        sqlx::query(
            r#"
            INSERT INTO commissions (id, broker_id, sale_amount_cents, percentage_bps, commission_cents, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(commission.id.to_string())
        .bind(commission.broker_id.to_string())
        .bind(commission.sale_amount_cents)
        .bind(commission.percentage_bps)
        .bind(commission.commission_cents)
        .bind(commission.status.as_str())
        .bind(commission.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save commission")?;

        tx.commit().await.context("Failed to commit commission")?;
        Ok(CreditWrite::Applied)
    }

    /// Move a pending commission to available, shifting its amount between
    /// the broker's buckets.
    pub async fn release_commission(&self, id: CommissionId) -> Result<CreditWrite> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE commissions
            SET status = 'available'
            WHERE id = ? AND status = 'pending'
            RETURNING broker_id, commission_cents
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to release commission")?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(CreditWrite::NotPending);
        };
        let broker_id: String = row.get("broker_id");
        let amount: Cents = row.get("commission_cents");

        let moved = sqlx::query(
            r#"
            UPDATE brokers
            SET pending_balance_cents = pending_balance_cents - ?,
                available_balance_cents = available_balance_cents + ?
            WHERE id = ? AND available_balance_cents <= ?
            "#,
        )
        .bind(amount)
        .bind(amount)
        .bind(&broker_id)
        .bind(Cents::MAX - amount)
        .execute(&mut *tx)
        .await
        .context("Failed to move released commission")?;

        if moved.rows_affected() == 0 {
            let exists = Self::broker_exists(&mut *tx, &broker_id).await?;
            tx.rollback().await?;
            return Ok(if exists {
                CreditWrite::BalanceOverflow
            } else {
                CreditWrite::BrokerNotFound
            });
        }

        tx.commit().await.context("Failed to commit release")?;
        Ok(CreditWrite::Applied)
    }

    /// Get a commission by ID.
    pub async fn get_commission(&self, id: CommissionId) -> Result<Option<Commission>> {
        let sql = format!("SELECT {} FROM commissions WHERE id = ?", COMMISSION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch commission")?;

        row.as_ref().map(Self::row_to_commission).transpose()
    }

    /// List commissions, optionally for a single broker, oldest first.
    pub async fn list_commissions(&self, broker_id: Option<BrokerId>) -> Result<Vec<Commission>> {
        let rows = match broker_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM commissions WHERE broker_id = ? ORDER BY created_at",
                    COMMISSION_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(id.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {} FROM commissions ORDER BY created_at", COMMISSION_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .context("Failed to list commissions")?;

        rows.iter().map(Self::row_to_commission).collect()
    }

    fn row_to_commission(row: &SqliteRow) -> Result<Commission> {
        let id_str: String = row.get("id");
        let broker_id_str: String = row.get("broker_id");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Commission {
            id: Uuid::parse_str(&id_str).context("Invalid commission ID")?,
            broker_id: Uuid::parse_str(&broker_id_str).context("Invalid broker ID")?,
            sale_amount_cents: row.get("sale_amount_cents"),
            percentage_bps: row.get("percentage_bps"),
            commission_cents: row.get("commission_cents"),
            status: CommissionStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid commission status: {}", status_str))?,
            created_at: parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    /// Debit the broker's available balance and insert the withdrawal, in one
    /// transaction. The debit is conditional on sufficient funds, so it can
    /// never take the balance below zero.
    pub async fn save_withdrawal(&self, withdrawal: &Withdrawal) -> Result<BalanceWrite> {
        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE brokers
            SET available_balance_cents = available_balance_cents - ?
            WHERE id = ? AND available_balance_cents >= ?
            "#,
        )
        .bind(withdrawal.amount_cents)
        .bind(withdrawal.broker_id.to_string())
        .bind(withdrawal.amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to debit broker balance")?;

        if debited.rows_affected() == 0 {
            let available: Option<Cents> =
                sqlx::query("SELECT available_balance_cents FROM brokers WHERE id = ?")
                    .bind(withdrawal.broker_id.to_string())
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to fetch broker balance")?
                    .map(|row| row.get("available_balance_cents"));
            tx.rollback().await?;

            return Ok(match available {
                Some(available) => BalanceWrite::InsufficientFunds { available },
                None => BalanceWrite::BrokerNotFound,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO withdrawals (id, broker_id, amount_cents, destination_key, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(withdrawal.id.to_string())
        .bind(withdrawal.broker_id.to_string())
        .bind(withdrawal.amount_cents)
        .bind(&withdrawal.destination_key)
        .bind(withdrawal.status.as_str())
        .bind(withdrawal.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save withdrawal")?;

        tx.commit().await.context("Failed to commit withdrawal")?;
        Ok(BalanceWrite::Applied)
    }

    /// Change a withdrawal's status if it currently has `from`.
    /// Never touches balances.
    pub async fn update_withdrawal_status(
        &self,
        id: WithdrawalId,
        from: WithdrawalStatus,
        to: WithdrawalStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE withdrawals SET status = ? WHERE id = ? AND status = ?")
            .bind(to.as_str())
            .bind(id.to_string())
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to update withdrawal status")?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a withdrawal by ID.
    pub async fn get_withdrawal(&self, id: WithdrawalId) -> Result<Option<Withdrawal>> {
        let sql = format!("SELECT {} FROM withdrawals WHERE id = ?", WITHDRAWAL_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch withdrawal")?;

        row.as_ref().map(Self::row_to_withdrawal).transpose()
    }

    /// List withdrawals, optionally for a single broker, oldest first.
    pub async fn list_withdrawals(&self, broker_id: Option<BrokerId>) -> Result<Vec<Withdrawal>> {
        let rows = match broker_id {
            Some(id) => {
                let sql = format!(
                    "SELECT {} FROM withdrawals WHERE broker_id = ? ORDER BY created_at",
                    WITHDRAWAL_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(id.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                let sql = format!("SELECT {} FROM withdrawals ORDER BY created_at", WITHDRAWAL_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .context("Failed to list withdrawals")?;

        rows.iter().map(Self::row_to_withdrawal).collect()
    }

    fn row_to_withdrawal(row: &SqliteRow) -> Result<Withdrawal> {
        let id_str: String = row.get("id");
        let broker_id_str: String = row.get("broker_id");
        let status_str: String = row.get("status");
        let created_at_str: String = row.get("created_at");

        Ok(Withdrawal {
            id: Uuid::parse_str(&id_str).context("Invalid withdrawal ID")?,
            broker_id: Uuid::parse_str(&broker_id_str).context("Invalid broker ID")?,
            amount_cents: row.get("amount_cents"),
            destination_key: row.get("destination_key"),
            status: WithdrawalStatus::from_str(&status_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid withdrawal status: {}", status_str))?,
            created_at: parse_timestamp(&created_at_str, "created_at")?,
        })
    }

    // ========================
    // Verification code operations
    // ========================

    /// Store a code, replacing any previous code for the same (email, purpose).
    pub async fn save_verification_code(&self, code: &VerificationCode) -> Result<()> {
        let payload_json = code
            .pending_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO verification_codes (email, purpose, code, expires_at, pending_payload)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (email, purpose) DO UPDATE SET
                code = excluded.code,
                expires_at = excluded.expires_at,
                pending_payload = excluded.pending_payload
            "#,
        )
        .bind(&code.email)
        .bind(code.purpose.as_str())
        .bind(&code.code)
        .bind(code.expires_at.to_rfc3339())
        .bind(&payload_json)
        .execute(&self.pool)
        .await
        .context("Failed to save verification code")?;
        Ok(())
    }

    /// Get the live code for (email, purpose), if any.
    pub async fn get_verification_code(
        &self,
        email: &str,
        purpose: VerificationPurpose,
    ) -> Result<Option<VerificationCode>> {
        let row = sqlx::query(
            r#"
            SELECT email, purpose, code, expires_at, pending_payload
            FROM verification_codes
            WHERE email = ? AND purpose = ?
            "#,
        )
        .bind(email)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch verification code")?;

        row.as_ref().map(Self::row_to_verification_code).transpose()
    }

    /// Delete the code for (email, purpose).
    pub async fn delete_verification_code(
        &self,
        email: &str,
        purpose: VerificationPurpose,
    ) -> Result<()> {
        sqlx::query("DELETE FROM verification_codes WHERE email = ? AND purpose = ?")
            .bind(email)
            .bind(purpose.as_str())
            .execute(&self.pool)
            .await
            .context("Failed to delete verification code")?;
        Ok(())
    }

    fn row_to_verification_code(row: &SqliteRow) -> Result<VerificationCode> {
        let purpose_str: String = row.get("purpose");
        let expires_at_str: String = row.get("expires_at");
        let payload_json: Option<String> = row.get("pending_payload");

        Ok(VerificationCode {
            email: row.get("email"),
            purpose: VerificationPurpose::from_str(&purpose_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid verification purpose: {}", purpose_str))?,
            code: row.get("code"),
            expires_at: parse_timestamp(&expires_at_str, "expires_at")?,
            pending_payload: payload_json
                .map(|json| serde_json::from_str(&json))
                .transpose()
                .context("Invalid pending payload")?,
        })
    }

    // ========================
    // Listing operations
    // ========================

    /// Save a new listing.
    pub async fn save_listing(&self, listing: &Listing) -> Result<()> {
        let photos_json = serde_json::to_string(&listing.photos)?;

        sqlx::query(
            r#"
            INSERT INTO listings (id, broker_id, name, city, state, price_cents, description, photos, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(listing.id.to_string())
        .bind(listing.broker_id.to_string())
        .bind(&listing.name)
        .bind(&listing.city)
        .bind(&listing.state)
        .bind(listing.price_cents)
        .bind(&listing.description)
        .bind(&photos_json)
        .bind(listing.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save listing")?;
        Ok(())
    }

    /// List a broker's listings, oldest first.
    pub async fn list_listings_for_broker(&self, broker_id: BrokerId) -> Result<Vec<Listing>> {
        let sql = format!(
            "SELECT {} FROM listings WHERE broker_id = ? ORDER BY created_at",
            LISTING_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(broker_id.to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to list listings")?;

        rows.iter().map(Self::row_to_listing).collect()
    }

    fn row_to_listing(row: &SqliteRow) -> Result<Listing> {
        let id_str: String = row.get("id");
        let broker_id_str: String = row.get("broker_id");
        let photos_json: String = row.get("photos");
        let created_at_str: String = row.get("created_at");

        Ok(Listing {
            id: Uuid::parse_str(&id_str).context("Invalid listing ID")?,
            broker_id: Uuid::parse_str(&broker_id_str).context("Invalid broker ID")?,
            name: row.get("name"),
            city: row.get("city"),
            state: row.get("state"),
            price_cents: row.get("price_cents"),
            description: row.get("description"),
            photos: serde_json::from_str(&photos_json).context("Invalid listing photos")?,
            created_at: parse_timestamp(&created_at_str, "created_at")?,
        })
    }
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {} timestamp", column))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_repo() -> Result<Repository> {
        Repository::init("sqlite::memory:").await
    }

    #[tokio::test]
    async fn test_corrupt_listing_photos_is_an_error() -> Result<()> {
        let repo = memory_repo().await?;
        let broker = Broker::new("Ana", "ana@example.com");
        repo.save_broker(&broker).await?;
        let listing = Listing::new(broker.id, "Casa", 100).with_photos(vec!["a.jpg".into()]);
        repo.save_listing(&listing).await?;

        sqlx::query("UPDATE listings SET photos = 'not json'")
            .execute(&repo.pool)
            .await?;

        let err = repo.list_listings_for_broker(broker.id).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid listing photos"));

        Ok(())
    }

    #[tokio::test]
    async fn test_save_broker_reports_taken_email() -> Result<()> {
        let repo = memory_repo().await?;

        let first = Broker::new("Ana", "ana@example.com");
        assert_eq!(repo.save_broker(&first).await?, BrokerInsert::Inserted);

        let second = Broker::new("Other Ana", "ana@example.com");
        assert_eq!(repo.save_broker(&second).await?, BrokerInsert::EmailTaken);

        let mut third = Broker::new("Ana Again", "ana@example.com");
        assert_eq!(
            repo.save_broker_with_code(&mut third, "BCTCR").await?,
            BrokerInsert::EmailTaken
        );
        assert_eq!(repo.list_brokers().await?.len(), 1);

        Ok(())
    }
}
