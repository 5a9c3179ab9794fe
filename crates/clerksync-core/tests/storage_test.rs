//! Tests for the storage seam using the in-memory store.
//!
//! Exercises `UserStore` through a trait object the same way the HTTP layer
//! does, without a database.

use std::sync::Arc;

use clerksync_core::{
    storage::{mock::MockUserStore, UserStore},
    CoreError, NewUser,
};

fn new_user(external_id: &str) -> NewUser {
    NewUser {
        external_id: external_id.to_string(),
        first_name: "Grace".to_string(),
        last_name: "Hopper".to_string(),
        email: "grace@example.com".to_string(),
        image_url: "https://img.example.com/grace.png".to_string(),
    }
}

#[tokio::test]
async fn created_user_is_returned_and_findable() {
    let mock = MockUserStore::new();
    let store: Arc<dyn UserStore> = Arc::new(mock.clone());

    let created = store.create_user(new_user("user_grace")).await.unwrap();

    assert_eq!(created.external_id, "user_grace");
    assert_eq!(created.email, "grace@example.com");

    let found = store.find_by_external_id("user_grace").await.unwrap();
    assert_eq!(found, vec![created]);
    assert_eq!(mock.count().await, 1);
}

#[tokio::test]
async fn same_user_twice_creates_two_rows() {
    let store = MockUserStore::new();

    let first = store.create_user(new_user("user_dup")).await.unwrap();
    let second = store.create_user(new_user("user_dup")).await.unwrap();

    assert_ne!(first.id, second.id);
    assert_eq!(store.find_by_external_id("user_dup").await.unwrap().len(), 2);
}

#[tokio::test]
async fn lookup_only_returns_matching_rows() {
    let store = MockUserStore::new();
    store.create_user(new_user("user_a")).await.unwrap();
    store.create_user(new_user("user_b")).await.unwrap();

    let found = store.find_by_external_id("user_b").await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].external_id, "user_b");
    assert!(store.find_by_external_id("user_c").await.unwrap().is_empty());
}

#[tokio::test]
async fn injected_create_error_fails_once() {
    let store = MockUserStore::new();
    store.inject_create_error("connection reset").await;

    let err = store.create_user(new_user("user_err")).await.unwrap_err();
    assert!(matches!(err, CoreError::Database(ref msg) if msg == "connection reset"));
    assert_eq!(store.count().await, 0);

    store.create_user(new_user("user_err")).await.unwrap();
    assert_eq!(store.count().await, 1);
}

#[tokio::test]
async fn health_check_reflects_injected_error() {
    let store = MockUserStore::new();
    assert!(store.health_check().await.is_ok());

    store.set_health_error(Some("database unreachable".to_string())).await;
    assert!(store.health_check().await.is_err());

    store.set_health_error(None).await;
    assert!(store.health_check().await.is_ok());
}
