// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use corretora::application::{PortalConfig, PortalService};
use corretora::domain::{BankDetails, Broker, CommissionStatus, SignupForm};
use tempfile::TempDir;

pub const TEST_PASSWORD: &str = "segredo123";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(PortalService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = PortalService::init(db_path.to_str().unwrap(), PortalConfig::default()).await?;
    Ok((service, temp_dir))
}

pub fn signup_form(name: &str, email: &str) -> SignupForm {
    SignupForm {
        name: name.to_string(),
        email: email.to_string(),
        phone: "+55 11 99999-0000".to_string(),
        cpf: "123.456.789-00".to_string(),
        address: "Rua das Flores, 10".to_string(),
        ..Default::default()
    }
}

pub fn bank_details(pix_key: &str) -> BankDetails {
    BankDetails {
        full_name: "Ana Souza".to_string(),
        cpf: "123.456.789-00".to_string(),
        bank_name: "Banco do Brasil".to_string(),
        bank_code: "001".to_string(),
        branch: "1234".to_string(),
        account: "56789-0".to_string(),
        pix_key: pix_key.to_string(),
    }
}

/// Test fixture: registered brokers ready to use the portal
pub struct Fixtures;

impl Fixtures {
    /// Broker with a password and bank details.
    pub async fn broker_with_payout(service: &PortalService, email: &str) -> Result<Broker> {
        let mut form = signup_form("Ana Souza", email);
        form.password = Some(TEST_PASSWORD.to_string());
        let broker = service.register_broker(form).await?;
        let broker = service.save_bank_details(broker.id, bank_details(email)).await?;
        Ok(broker)
    }

    /// Broker with payout details and `available` cents credited.
    pub async fn funded_broker(
        service: &PortalService,
        email: &str,
        available: i64,
    ) -> Result<Broker> {
        let broker = Self::broker_with_payout(service, email).await?;
        // 100% of the sale lands in the available balance.
        service
            .record_commission(broker.id, available, 10_000, CommissionStatus::Available)
            .await?;
        Ok(service.get_broker(broker.id).await?)
    }
}
