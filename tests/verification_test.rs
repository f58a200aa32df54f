mod common;

use anyhow::Result;
use chrono::{Duration, Utc};
use common::test_service;
use corretora::application::AppError;
use corretora::domain::VerificationPurpose;
use serde_json::json;

#[tokio::test]
async fn test_issued_code_verifies() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let issued = service
        .issue_code("ana@example.com", VerificationPurpose::Email, None)
        .await?;
    assert_eq!(issued.code.len(), 6);
    assert!(issued.code.chars().all(|c| c.is_ascii_digit()));

    let result = service
        .verify_code("ana@example.com", &issued.code, VerificationPurpose::Email)
        .await?;
    assert!(result.valid);

    // Verification does not consume the code
    let again = service
        .verify_code("ana@example.com", &issued.code, VerificationPurpose::Email)
        .await?;
    assert!(again.valid);

    Ok(())
}

#[tokio::test]
async fn test_wrong_code_or_purpose_is_invalid() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let issued = service
        .issue_code("ana@example.com", VerificationPurpose::Email, None)
        .await?;

    let wrong = if issued.code == "123456" { "654321" } else { "123456" };
    let result = service
        .verify_code("ana@example.com", wrong, VerificationPurpose::Email)
        .await?;
    assert!(!result.valid);

    let result = service
        .verify_code("ana@example.com", &issued.code, VerificationPurpose::Phone)
        .await?;
    assert!(!result.valid);

    let result = service
        .verify_code("other@example.com", &issued.code, VerificationPurpose::Email)
        .await?;
    assert!(!result.valid);

    Ok(())
}

#[tokio::test]
async fn test_reissue_invalidates_previous_code() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let first = service
        .issue_code("ana@example.com", VerificationPurpose::Email, None)
        .await?;
    let mut second = service
        .issue_code("ana@example.com", VerificationPurpose::Email, None)
        .await?;
    // Codes are random; make sure the second one differs from the first
    while second.code == first.code {
        second = service
            .issue_code("ana@example.com", VerificationPurpose::Email, None)
            .await?;
    }

    let old = service
        .verify_code("ana@example.com", &first.code, VerificationPurpose::Email)
        .await?;
    assert!(!old.valid);

    let new = service
        .verify_code("ana@example.com", &second.code, VerificationPurpose::Email)
        .await?;
    assert!(new.valid);

    Ok(())
}

#[tokio::test]
async fn test_code_expires_after_ten_minutes() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let issued = service
        .issue_code("ana@example.com", VerificationPurpose::Phone, None)
        .await?;

    let just_before = issued.expires_at - Duration::seconds(1);
    let result = service
        .verify_code_at(
            "ana@example.com",
            &issued.code,
            VerificationPurpose::Phone,
            just_before,
        )
        .await?;
    assert!(result.valid);

    let later = Utc::now() + Duration::minutes(11);
    let result = service
        .verify_code_at("ana@example.com", &issued.code, VerificationPurpose::Phone, later)
        .await?;
    assert!(!result.valid);

    let at_expiry = service
        .verify_code_at(
            "ana@example.com",
            &issued.code,
            VerificationPurpose::Phone,
            issued.expires_at,
        )
        .await?;
    assert!(!at_expiry.valid);

    Ok(())
}

#[tokio::test]
async fn test_clear_code() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let issued = service
        .issue_code("ana@example.com", VerificationPurpose::Email, None)
        .await?;

    service
        .clear_code("ana@example.com", VerificationPurpose::Email)
        .await?;
    let result = service
        .verify_code("ana@example.com", &issued.code, VerificationPurpose::Email)
        .await?;
    assert!(!result.valid);

    // Clearing a missing code is fine
    service
        .clear_code("ana@example.com", VerificationPurpose::Email)
        .await?;

    Ok(())
}

#[tokio::test]
async fn test_pending_payload_returned_when_valid() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let payload = json!({ "nome": "Ana", "email": "ana@example.com" });

    let issued = service
        .issue_code("ana@example.com", VerificationPurpose::Email, Some(payload))
        .await?;
    let result = service
        .verify_code("ana@example.com", &issued.code, VerificationPurpose::Email)
        .await?;
    let stored = result.pending_payload.unwrap();
    assert_eq!(stored["name"], "Ana");
    assert_eq!(stored["email"], "ana@example.com");
    assert!(stored.get("password_hash").is_none());

    Ok(())
}

#[tokio::test]
async fn test_pending_password_stored_only_as_hash() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let payload = json!({
        "nome": "Ana Souza",
        "email": "ana@example.com",
        "telefone": "+55 11 99999-0000",
        "senha": "segredo123"
    });

    let ana_code = service
        .issue_code("ana@example.com", VerificationPurpose::Phone, Some(payload))
        .await?;
    let result = service
        .verify_code("ana@example.com", &ana_code.code, VerificationPurpose::Phone)
        .await?;
    let stored = result.pending_payload.unwrap();
    assert!(!stored.to_string().contains("segredo123"));
    assert!(stored.get("senha").is_none());
    assert!(stored.get("password").is_none());
    assert!(stored["password_hash"].as_str().unwrap().starts_with("$argon2"));

    // A hash smuggled in by the client is ignored
    let eve_code = service
        .issue_code(
            "eve@example.com",
            VerificationPurpose::Phone,
            Some(json!({ "nome": "Eve", "email": "eve@example.com", "password_hash": "x" })),
        )
        .await?;
    let result = service
        .verify_code("eve@example.com", &eve_code.code, VerificationPurpose::Phone)
        .await?;
    assert!(result.pending_payload.unwrap().get("password_hash").is_none());

    // The stored hash is the one the registered broker logs in with
    service
        .confirm_code("ana@example.com", &ana_code.code, VerificationPurpose::Phone)
        .await?;
    service.login("ana@example.com", "segredo123").await?;

    Ok(())
}

#[tokio::test]
async fn test_phone_confirmation_registers_broker() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let payload = json!({
        "nome": "Ana Souza",
        "email": "ana@example.com",
        "telefone": "+55 11 99999-0000",
        "cpf": "123.456.789-00",
        "endereco": "Rua das Flores, 10",
        "senha": "segredo123"
    });

    let email_code = service
        .issue_code("ana@example.com", VerificationPurpose::Email, None)
        .await?;
    service
        .confirm_code("ana@example.com", &email_code.code, VerificationPurpose::Email)
        .await?;

    let phone_code = service
        .issue_code("ana@example.com", VerificationPurpose::Phone, Some(payload))
        .await?;
    let broker = service
        .confirm_code("ana@example.com", &phone_code.code, VerificationPurpose::Phone)
        .await?
        .expect("phone confirmation with payload creates a broker");

    assert_eq!(broker.name, "Ana Souza");
    assert_eq!(broker.broker_code.as_deref(), Some("BCTCR-00001"));
    assert!(broker.phone_verified);
    service.login("ana@example.com", "segredo123").await?;

    // Both codes are gone once registration completes
    for (purpose, code) in [
        (VerificationPurpose::Email, &email_code.code),
        (VerificationPurpose::Phone, &phone_code.code),
    ] {
        let result = service.verify_code("ana@example.com", code, purpose).await?;
        assert!(!result.valid);
    }

    Ok(())
}

#[tokio::test]
async fn test_phone_confirmation_fills_missing_email() -> Result<()> {
    let (service, _temp) = test_service().await?;
    let payload = json!({ "nome": "Ana Souza", "telefone": "+55 11 99999-0000" });

    let phone_code = service
        .issue_code("ana@example.com", VerificationPurpose::Phone, Some(payload))
        .await?;
    let broker = service
        .confirm_code("ana@example.com", &phone_code.code, VerificationPurpose::Phone)
        .await?
        .expect("registration data creates a broker");

    assert_eq!(broker.email, "ana@example.com");
    assert_eq!(broker.name, "Ana Souza");

    Ok(())
}

#[tokio::test]
async fn test_issue_rejects_malformed_registration_data() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .issue_code(
            "ana@example.com",
            VerificationPurpose::Phone,
            Some(json!({ "email": "ana@example.com" })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = service
        .issue_code(
            "ana@example.com",
            VerificationPurpose::Phone,
            Some(json!({ "nome": "Ana", "senha": "123" })),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    Ok(())
}

#[tokio::test]
async fn test_confirm_invalid_code_is_error() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .confirm_code("ana@example.com", "000000", VerificationPurpose::Email)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidOrExpiredCode));

    Ok(())
}

#[tokio::test]
async fn test_issue_requires_email() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let err = service
        .issue_code("  ", VerificationPurpose::Email, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingField("email")));

    Ok(())
}
