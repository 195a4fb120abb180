//! Core domain model for the DOMC operator console.

use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "domc-core";

/// One configured matching rule ("condition set") as the backend stores it.
///
/// `id` is server-assigned and unique within the collection; `0` marks a
/// record that has not been created yet. Once assigned it never changes for
/// the lifetime of the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionRecord {
    #[serde(default)]
    pub id: i64,
    pub service_class: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub count: u32,
    /// Ordered, opaque, read-only display data.
    #[serde(default)]
    pub matched_offer_ids: Vec<String>,
}

impl ConditionRecord {
    pub fn is_persisted(&self) -> bool {
        self.id != 0
    }

    /// Copy the editable fields into a draft. The draft owns its data, so
    /// edits on it never touch the stored record.
    pub fn to_draft(&self) -> ConditionDraft {
        ConditionDraft {
            service_class: self.service_class.clone(),
            pickup_address: self.pickup_address.clone(),
            dropoff_address: self.dropoff_address.clone(),
            status: self.status.clone(),
            count: self.count,
        }
    }
}

/// Id-less request body sent on create and update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionDraft {
    pub service_class: String,
    pub pickup_address: String,
    pub dropoff_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default)]
    pub count: u32,
}

/// Pagination cursor for the condition table.
///
/// Invariant: `1 <= current_page <= total_pages`. Page requests outside that
/// range are no-ops at the store level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    pub current_page: u32,
    pub total_pages: u32,
    pub per_page: u32,
}

impl PageState {
    pub fn new(per_page: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            per_page: per_page.max(1),
        }
    }

    pub fn contains(&self, page: u32) -> bool {
        page >= 1 && page <= self.total_pages
    }
}

/// Pickup/dropoff address on an incoming offer, localized per display language.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedAddress {
    #[serde(rename = "DE")]
    pub de: String,
    #[serde(rename = "EN")]
    pub en: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferLanguage {
    De,
    En,
}

impl LocalizedAddress {
    pub fn localized(&self, language: OfferLanguage) -> &str {
        match language {
            OfferLanguage::De => &self.de,
            OfferLanguage::En => &self.en,
        }
    }
}

/// An incoming ride request awaiting operator or rule-based acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub service_class: String,
    pub pickup_address: LocalizedAddress,
    pub dropoff_address: LocalizedAddress,
}
