//! HubSpot-shaped CRM access for the quote wizard.
//!
//! The wizard reads contacts, deals and deal line items, and writes deal
//! stage transitions and contact address corrections. Everything else the
//! CRM exposes is out of scope. [`fixtures::FixtureCrm`] stands in for the
//! remote API in development and tests.

pub mod client;
pub mod fixtures;
pub mod types;

use voltquote_core::verify::ContactProfile;

pub use client::HubSpotClient;
pub use fixtures::FixtureCrm;
pub use types::{AddressUpdate, CrmLineItem, Deal, QuoteBundle};

/// Quote-related CRM operations consumed by the API layer. Returns `None`
/// when no contact exists for the email; CRM transport failures bubble up
/// unretried.
#[async_trait::async_trait]
pub trait CrmQuotes: Send + Sync {
    async fn quotes_by_email(&self, email: &str) -> anyhow::Result<Option<QuoteBundle>>;
    async fn update_deal_stage(&self, deal_id: &str, stage_id: &str) -> anyhow::Result<()>;
    async fn update_contact_address(
        &self,
        email: &str,
        update: &AddressUpdate,
    ) -> anyhow::Result<()>;
    /// Writes pre-formatted installation dates to the deal. The caller owns
    /// the `DD-MM-YYYY HH:MM` formatting; the CRM stores the joined list.
    async fn update_deal_installation_dates(
        &self,
        deal_id: &str,
        formatted_dates: &[String],
    ) -> anyhow::Result<()>;
}

pub(crate) fn profile_from_properties(
    properties: &serde_json::Map<String, serde_json::Value>,
) -> ContactProfile {
    let text = |key: &str| {
        properties
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    let first = text("firstname").unwrap_or_default();
    let last = text("lastname").unwrap_or_default();
    let name = format!("{first} {last}").trim().to_string();

    ContactProfile {
        // Mobile numbers take precedence: WhatsApp delivery needs one.
        phone: text("mobilephone").or_else(|| text("phone")),
        name: (!name.is_empty()).then_some(name),
        address: text("address"),
        zip: text("zip"),
        city: text("city"),
    }
}
