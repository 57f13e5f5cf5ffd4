//! Personalized donation link
//!
//! The link is only displayed to the visitor; nothing here performs a request.

use crate::state_machine::{DonorField, DonorRecord};
use url::form_urlencoded;

/// Donation page the link points at
pub const DONATION_BASE_URL: &str = "https://secure.winred.com/tom-emmer/emmer-for-congress";

/// Source tag attributed to links generated by the chat widget
pub const SOURCE_CODE: &str = "winred-directory";

/// Build the donation link for `record`.
///
/// Empty fields are passed through as empty parameters.
pub fn donation_link(record: &DonorRecord) -> String {
    let mut params = vec![
        ("sc", form_value(SOURCE_CODE)),
        ("money_bomb", "false".to_string()),
        ("recurring", "false".to_string()),
    ];
    params.extend(
        DonorField::ALL
            .into_iter()
            .map(|field| (field.query_key(), encode_field(field, record.get(field)))),
    );

    let query = params
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");

    format!("{DONATION_BASE_URL}?{query}")
}

fn encode_field(field: DonorField, value: &str) -> String {
    match field {
        // Spaces as %20; a literal '+' is already %2B at this point
        DonorField::Address => form_value(value).replace('+', "%20"),
        _ => form_value(value),
    }
}

fn form_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
