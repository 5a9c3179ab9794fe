//! Inbound webhook payload model.
//!
//! Typed view of the identity provider's `user.*` event envelope. Scalar
//! fields are optional and tolerate `null`; only the envelope's `data` object
//! and the user's `email_addresses` list are structurally required.

use serde::{Deserialize, Serialize};

use crate::models::NewUser;

/// Event type this service acts on.
pub const USER_CREATED: &str = "user.created";

/// Webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookEvent {
    /// Event type, e.g. `user.created`.
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    /// Envelope object kind, `event` for provider webhooks.
    #[serde(default)]
    pub object: Option<String>,
    /// The user the event is about.
    pub data: UserData,
}

impl WebhookEvent {
    /// Returns the event type, or `""` when absent.
    pub fn event_type(&self) -> &str {
        self.event_type.as_deref().unwrap_or_default()
    }

    /// Whether this is a user creation event.
    pub fn is_user_created(&self) -> bool {
        self.event_type() == USER_CREATED
    }
}

/// User fields carried in the event's `data` object.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct UserData {
    /// Provider-assigned user id.
    #[serde(default)]
    pub id: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Id of the entry in `email_addresses` marked primary.
    #[serde(default)]
    pub primary_email_address_id: Option<String>,
    /// All email addresses attached to the user.
    pub email_addresses: Vec<EmailAddress>,
    /// Profile image URL (older payloads).
    #[serde(default)]
    pub profile_image_url: Option<String>,
    /// Profile image URL (newer payloads).
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One email address entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EmailAddress {
    /// Provider-assigned id of this address.
    #[serde(default)]
    pub id: Option<String>,
    /// The address itself.
    #[serde(default)]
    pub email_address: Option<String>,
}

impl UserData {
    /// Returns the provider user id when present and non-empty.
    pub fn external_id(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    /// Picks the primary email address.
    ///
    /// Prefers the entry whose id matches `primary_email_address_id`, then the
    /// first entry, then `""`.
    pub fn primary_email(&self) -> &str {
        let primary = self.primary_email_address_id.as_deref().and_then(|primary_id| {
            self.email_addresses.iter().find(|entry| entry.id.as_deref() == Some(primary_id))
        });

        primary
            .or_else(|| self.email_addresses.first())
            .and_then(|entry| entry.email_address.as_deref())
            .unwrap_or_default()
    }

    /// Maps the payload onto a row, substituting `""` for anything missing.
    pub fn to_new_user(&self) -> NewUser {
        let image_url = self
            .profile_image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or(self.image_url.as_deref())
            .unwrap_or_default();

        NewUser {
            external_id: self.id.clone().unwrap_or_default(),
            first_name: self.first_name.clone().unwrap_or_default(),
            last_name: self.last_name.clone().unwrap_or_default(),
            email: self.primary_email().to_string(),
            image_url: image_url.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn parse(value: serde_json::Value) -> serde_json::Result<WebhookEvent> {
        serde_json::from_value(value)
    }

    #[test]
    fn full_payload_maps_every_field() {
        let event = parse(json!({
            "object": "event",
            "type": "user.created",
            "data": {
                "id": "user_29w83sxmDNGwOuEthce5gg56FcC",
                "first_name": "Example",
                "last_name": "Person",
                "primary_email_address_id": "idn_2",
                "email_addresses": [
                    {"id": "idn_1", "email_address": "secondary@example.org"},
                    {"id": "idn_2", "email_address": "primary@example.org"}
                ],
                "profile_image_url": "https://img.example.org/p.png",
                "image_url": "https://img.example.org/i.png"
            }
        }))
        .unwrap();

        assert!(event.is_user_created());
        let user = event.data.to_new_user();
        assert_eq!(user.external_id, "user_29w83sxmDNGwOuEthce5gg56FcC");
        assert_eq!(user.first_name, "Example");
        assert_eq!(user.last_name, "Person");
        assert_eq!(user.email, "primary@example.org");
        assert_eq!(user.image_url, "https://img.example.org/p.png");
    }

    #[test]
    fn nulls_and_absent_fields_become_empty_strings() {
        let event = parse(json!({
            "type": "user.created",
            "data": {
                "id": "user_1",
                "first_name": null,
                "email_addresses": []
            }
        }))
        .unwrap();

        let user = event.data.to_new_user();
        assert_eq!(user.first_name, "");
        assert_eq!(user.last_name, "");
        assert_eq!(user.email, "");
        assert_eq!(user.image_url, "");
    }

    #[test]
    fn first_email_used_when_primary_unknown() {
        let data = UserData {
            primary_email_address_id: Some("idn_missing".to_string()),
            email_addresses: vec![
                EmailAddress {
                    id: Some("idn_1".to_string()),
                    email_address: Some("first@example.org".to_string()),
                },
                EmailAddress {
                    id: Some("idn_2".to_string()),
                    email_address: Some("second@example.org".to_string()),
                },
            ],
            ..UserData::default()
        };

        assert_eq!(data.primary_email(), "first@example.org");
    }

    #[test]
    fn image_url_used_when_profile_image_absent() {
        let data = UserData {
            image_url: Some("https://img.example.org/i.png".to_string()),
            ..UserData::default()
        };

        assert_eq!(data.to_new_user().image_url, "https://img.example.org/i.png");
    }

    #[test]
    fn missing_email_list_is_rejected() {
        let result = parse(json!({
            "type": "user.created",
            "data": {"id": "user_1", "first_name": "No", "last_name": "Email"}
        }));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("email_addresses"));
    }

    #[test]
    fn missing_data_is_rejected() {
        assert!(parse(json!({"type": "user.created"})).is_err());
    }

    #[test]
    fn empty_id_is_not_an_external_id() {
        let data = UserData { id: Some(String::new()), ..UserData::default() };
        assert_eq!(data.external_id(), None);

        let data = UserData { id: Some("user_1".to_string()), ..UserData::default() };
        assert_eq!(data.external_id(), Some("user_1"));
    }

    #[test]
    fn other_event_types_are_not_user_created() {
        let event =
            parse(json!({"type": "user.updated", "data": {"email_addresses": []}})).unwrap();
        assert!(!event.is_user_created());

        let event = parse(json!({"data": {"email_addresses": []}})).unwrap();
        assert_eq!(event.event_type(), "");
        assert!(!event.is_user_created());
    }
}
