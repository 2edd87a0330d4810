//! Typed shapes for the `*Data` / `headers` / `attachments` / `references`
//! JSON columns on `structured_email` and `sent_email`.
//!
//! Each of these derives `FromJsonQueryResult` so sea-orm can read/write them
//! straight off a `Json` column instead of going through `serde_json::Value`
//! at every call site.

use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single parsed RFC-5322 mailbox.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddressData {
    pub name: Option<String>,
    pub address: String,
}

/// The shape of `fromData`/`toData`/`ccData`/`bccData`/`replyToData`: the
/// parser's structured address list plus the raw header text it was derived
/// from.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
#[serde(rename_all = "camelCase")]
pub struct AddressList {
    pub addresses: Vec<EmailAddressData>,
    pub text: Option<String>,
}

impl AddressList {
    pub fn new(addresses: Vec<EmailAddressData>) -> Self {
        let text = if addresses.is_empty() {
            None
        } else {
            Some(
                addresses
                    .iter()
                    .map(|a| a.address.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        };

        AddressList { addresses, text }
    }

    pub fn lowercased_addresses(&self) -> Vec<String> {
        self.addresses
            .iter()
            .map(|a| a.address.to_lowercase())
            .collect()
    }
}

/// An ordered list of normalized RFC-5322 Message-IDs, used for the
/// `references` column. Entries are stored without the surrounding `<` `>`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct MessageIdList(pub Vec<String>);

impl MessageIdList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A set of lowercased participant addresses on an `email_thread`, stored
/// as a JSON array rather than a relational table since membership is only
/// ever read or unioned wholesale, never queried by address.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct ParticipantSet(pub Vec<String>);

impl ParticipantSet {
    pub fn union_with(&mut self, addresses: impl IntoIterator<Item = String>) {
        for address in addresses {
            if !self.0.contains(&address) {
                self.0.push(address);
            }
        }
    }
}

/// Case-insensitive-by-convention header map. Keys are stored as received;
/// lookups should go through [`Headers::get_ignore_case`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct Headers(pub HashMap<String, String>);

impl Headers {
    pub fn get_ignore_case(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A single MIME attachment, body stored as base64.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub content_base64: String,
}

/// Ordered list of attachments stored on `structured_email.attachments`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct AttachmentList(pub Vec<Attachment>);

impl AttachmentList {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}
