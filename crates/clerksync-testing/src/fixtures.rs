//! Payload builders for identity provider webhooks.
//!
//! Produces `user.created` envelopes shaped like the provider's deliveries,
//! with knobs for the malformed variants the receiver has to reject.

use bytes::Bytes;
use serde_json::{json, Value};
use uuid::Uuid;

/// Builder for `user.created` webhook payloads.
#[derive(Debug, Clone)]
pub struct UserCreatedBuilder {
    event_type: Option<String>,
    id: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    emails: Option<Vec<(String, String)>>,
    primary_email_id: Option<String>,
    image_url: Option<String>,
    profile_image_url: Option<String>,
}

impl UserCreatedBuilder {
    /// Creates a builder with every optional field absent.
    pub fn new() -> Self {
        Self {
            event_type: Some(clerksync_core::USER_CREATED.to_string()),
            id: None,
            first_name: None,
            last_name: None,
            emails: Some(Vec::new()),
            primary_email_id: None,
            image_url: None,
            profile_image_url: None,
        }
    }

    /// Creates a builder for a complete user with a unique id.
    pub fn with_defaults() -> Self {
        let email_id = format!("idn_{}", Uuid::new_v4().simple());
        Self {
            id: Some(format!("user_{}", Uuid::new_v4().simple())),
            first_name: Some("Ada".to_string()),
            last_name: Some("Lovelace".to_string()),
            emails: Some(vec![(email_id.clone(), "ada@example.com".to_string())]),
            primary_email_id: Some(email_id),
            image_url: Some("https://img.example.com/ada.png".to_string()),
            ..Self::new()
        }
    }

    /// Sets the envelope `type`.
    #[must_use]
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Removes the envelope `type`.
    #[must_use]
    pub fn without_event_type(mut self) -> Self {
        self.event_type = None;
        self
    }

    /// Sets the provider user id.
    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Removes the provider user id.
    #[must_use]
    pub fn without_id(mut self) -> Self {
        self.id = None;
        self
    }

    /// Sets the first name.
    #[must_use]
    pub fn first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    /// Sets the last name.
    #[must_use]
    pub fn last_name(mut self, name: impl Into<String>) -> Self {
        self.last_name = Some(name.into());
        self
    }

    /// Appends an email address; `primary` marks it as the primary one.
    #[must_use]
    pub fn email(mut self, id: impl Into<String>, address: impl Into<String>, primary: bool) -> Self {
        let id = id.into();
        if primary {
            self.primary_email_id = Some(id.clone());
        }
        self.emails.get_or_insert_with(Vec::new).push((id, address.into()));
        self
    }

    /// Removes the `email_addresses` list entirely.
    #[must_use]
    pub fn without_email_addresses(mut self) -> Self {
        self.emails = None;
        self.primary_email_id = None;
        self
    }

    /// Sets `image_url`.
    #[must_use]
    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    /// Sets `profile_image_url`.
    #[must_use]
    pub fn profile_image_url(mut self, url: impl Into<String>) -> Self {
        self.profile_image_url = Some(url.into());
        self
    }

    /// Builds the payload as JSON.
    pub fn build(self) -> Value {
        let mut data = json!({
            "object": "user",
            "id": self.id,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "primary_email_address_id": self.primary_email_id,
            "image_url": self.image_url,
            "profile_image_url": self.profile_image_url,
            "created_at": 1_654_012_591_514_i64,
        });

        if let Some(emails) = self.emails {
            data["email_addresses"] = emails
                .into_iter()
                .map(|(id, address)| {
                    json!({
                        "id": id,
                        "object": "email_address",
                        "email_address": address,
                        "linked_to": [],
                    })
                })
                .collect();
        }

        let mut envelope = json!({ "object": "event", "data": data });
        if let Some(event_type) = self.event_type {
            envelope["type"] = Value::String(event_type);
        }
        envelope
    }

    /// Builds the payload as a request body.
    pub fn build_bytes(self) -> Bytes {
        Bytes::from(self.build().to_string())
    }
}

impl Default for UserCreatedBuilder {
    fn default() -> Self {
        Self::with_defaults()
    }
}
