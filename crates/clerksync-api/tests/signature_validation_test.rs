//! Webhook signature verification through the router and as properties of
//! the signing scheme.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use anyhow::Result;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use clerksync_api::crypto::{sign_payload, verify_webhook_at, SignatureError};
use clerksync_testing::{TestEnv, UserCreatedBuilder, TEST_SIGNING_SECRET};
use proptest::prelude::*;

#[tokio::test]
async fn signed_delivery_is_accepted() -> Result<()> {
    let env = TestEnv::builder().with_signing_secret().build().await?;
    env.mock_metadata_success().await;

    let response = env.post_signed_webhook(UserCreatedBuilder::with_defaults().build_bytes()).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(env.store.count().await, 1);
    Ok(())
}

#[tokio::test]
async fn unsigned_delivery_is_rejected_when_secret_configured() -> Result<()> {
    let env = TestEnv::builder().with_signing_secret().build().await?;
    env.mock_metadata_success().await;

    let response = env.post_webhook(UserCreatedBuilder::with_defaults().build_bytes()).await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.error_code().as_deref(), Some("E1001"));
    assert_eq!(response.json()["error"]["message"], "Invalid token");
    assert_eq!(env.store.count().await, 0);
    Ok(())
}

#[tokio::test]
async fn wrong_signature_is_rejected() -> Result<()> {
    let env = TestEnv::builder().with_signing_secret().build().await?;
    let timestamp = chrono::Utc::now().timestamp().to_string();

    let response = env
        .post_webhook_with_headers(UserCreatedBuilder::with_defaults().build_bytes(), &[
            ("svix-id", "msg_forged"),
            ("svix-timestamp", timestamp.as_str()),
            ("svix-signature", "v1,Zm9yZ2VkIHNpZ25hdHVyZQ=="),
        ])
        .await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(env.store.count().await, 0);
    Ok(())
}

#[tokio::test]
async fn stale_signature_is_rejected() -> Result<()> {
    let env = TestEnv::builder().with_signing_secret().build().await?;
    let an_hour_ago = chrono::Utc::now().timestamp() - 3600;

    let response = env
        .post_signed_webhook_at(UserCreatedBuilder::with_defaults().build_bytes(), an_hour_ago)
        .await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn wider_tolerance_accepts_older_signature() -> Result<()> {
    let env = TestEnv::builder()
        .with_signing_secret()
        .tolerance(Duration::from_secs(7200))
        .build()
        .await?;
    env.mock_metadata_success().await;
    let an_hour_ago = chrono::Utc::now().timestamp() - 3600;

    let response = env
        .post_signed_webhook_at(UserCreatedBuilder::with_defaults().build_bytes(), an_hour_ago)
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn signature_checked_before_payload() -> Result<()> {
    let env = TestEnv::builder().with_signing_secret().build().await?;

    let response = env.post_webhook("not json").await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

fn headers_for(id: &str, timestamp: i64, signature: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("svix-id", HeaderValue::from_str(id).unwrap());
    headers.insert("svix-timestamp", HeaderValue::from_str(&timestamp.to_string()).unwrap());
    headers.insert("svix-signature", HeaderValue::from_str(signature).unwrap());
    headers
}

const TOLERANCE: Duration = Duration::from_secs(300);

proptest! {
    #[test]
    fn signed_payloads_verify(
        id in "msg_[a-zA-Z0-9]{1,24}",
        timestamp in 1_000_000_000i64..2_000_000_000,
        skew in -300i64..=300,
        body in proptest::collection::vec(any::<u8>(), 0..512),
    ) {
        let signature = sign_payload(&id, timestamp, &body, TEST_SIGNING_SECRET).unwrap();
        let headers = headers_for(&id, timestamp, &signature);

        prop_assert_eq!(
            verify_webhook_at(&headers, &body, TEST_SIGNING_SECRET, TOLERANCE, timestamp + skew),
            Ok(())
        );
    }

    #[test]
    fn tampered_payloads_fail(
        id in "msg_[a-zA-Z0-9]{1,24}",
        timestamp in 1_000_000_000i64..2_000_000_000,
        body in proptest::collection::vec(any::<u8>(), 1..512),
        flip_index in any::<prop::sample::Index>(),
        flip_bit in 0u8..8,
    ) {
        let signature = sign_payload(&id, timestamp, &body, TEST_SIGNING_SECRET).unwrap();
        let headers = headers_for(&id, timestamp, &signature);

        let mut tampered = body.clone();
        let index = flip_index.index(tampered.len());
        tampered[index] ^= 1 << flip_bit;

        prop_assert_eq!(
            verify_webhook_at(&headers, &tampered, TEST_SIGNING_SECRET, TOLERANCE, timestamp),
            Err(SignatureError::VerificationFailed)
        );
    }

    #[test]
    fn signatures_do_not_transfer_between_messages(
        timestamp in 1_000_000_000i64..2_000_000_000,
        body in proptest::collection::vec(any::<u8>(), 0..256),
    ) {
        let signature = sign_payload("msg_original", timestamp, &body, TEST_SIGNING_SECRET).unwrap();
        let headers = headers_for("msg_replayed", timestamp, &signature);

        prop_assert_eq!(
            verify_webhook_at(&headers, &body, TEST_SIGNING_SECRET, TOLERANCE, timestamp),
            Err(SignatureError::VerificationFailed)
        );
    }
}
