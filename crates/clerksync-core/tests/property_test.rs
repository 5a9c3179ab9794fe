//! Property-based tests for payload-to-row mapping.
//!
//! Whatever subset of fields the provider sends, mapping never fails and
//! absent values always land as empty strings.

use clerksync_core::{EmailAddress, UserData};
use proptest::{prelude::*, test_runner::Config as ProptestConfig};

fn proptest_config() -> ProptestConfig {
    ProptestConfig { cases: 64, failure_persistence: None, ..ProptestConfig::default() }
}

fn optional_text() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-zA-Z0-9 ._@-]{0,24}")
}

fn email_entry() -> impl Strategy<Value = EmailAddress> {
    (optional_text(), optional_text()).prop_map(|(id, email_address)| EmailAddress { id, email_address })
}

fn user_data() -> impl Strategy<Value = UserData> {
    (
        optional_text(),
        optional_text(),
        optional_text(),
        optional_text(),
        prop::collection::vec(email_entry(), 0..4),
        optional_text(),
        optional_text(),
    )
        .prop_map(
            |(id, first_name, last_name, primary_email_address_id, email_addresses, profile_image_url, image_url)| {
                UserData {
                    id,
                    first_name,
                    last_name,
                    primary_email_address_id,
                    email_addresses,
                    profile_image_url,
                    image_url,
                }
            },
        )
}

proptest! {
    #![proptest_config(proptest_config())]

    #[test]
    fn scalar_fields_fall_back_to_empty(data in user_data()) {
        let user = data.to_new_user();

        prop_assert_eq!(user.external_id, data.id.clone().unwrap_or_default());
        prop_assert_eq!(user.first_name, data.first_name.clone().unwrap_or_default());
        prop_assert_eq!(user.last_name, data.last_name.clone().unwrap_or_default());
    }

    #[test]
    fn email_comes_from_the_list(data in user_data()) {
        let user = data.to_new_user();

        let listed = data
            .email_addresses
            .iter()
            .any(|entry| entry.email_address.as_deref().unwrap_or_default() == user.email);
        prop_assert!(listed || user.email.is_empty());
        if data.email_addresses.is_empty() {
            prop_assert_eq!(user.email, "");
        }
    }

    #[test]
    fn matching_primary_id_always_wins(
        mut data in user_data(),
        address in "[a-z]{1,10}@example\\.org",
    ) {
        data.email_addresses.push(EmailAddress {
            id: Some("idn_primary_marker".to_string()),
            email_address: Some(address.clone()),
        });
        data.primary_email_address_id = Some("idn_primary_marker".to_string());

        prop_assert_eq!(data.primary_email(), address.as_str());
    }
}
