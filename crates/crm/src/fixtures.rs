//! In-memory stand-in for the remote CRM, used when no API token is
//! configured and by tests.

use std::sync::Mutex;

use serde_json::{json, Value};

use voltquote_core::verify::{ContactDirectory, ContactProfile};

use crate::types::{CrmLineItem, CrmObject, Deal, QuoteBundle};
use crate::{AddressUpdate, CrmQuotes};

/// Serves one development contact with a won kitchen-installation deal and
/// its four line items. Writes are recorded so tests can assert on them.
pub struct FixtureCrm {
    pub stage_updates: Mutex<Vec<(String, String)>>,
    pub address_updates: Mutex<Vec<(String, AddressUpdate)>>,
    pub installation_updates: Mutex<Vec<(String, Vec<String>)>>,
}

impl FixtureCrm {
    pub fn new() -> Self {
        Self {
            stage_updates: Mutex::new(Vec::new()),
            address_updates: Mutex::new(Vec::new()),
            installation_updates: Mutex::new(Vec::new()),
        }
    }

    fn line_item(id: &str, properties: Value) -> CrmLineItem {
        match properties {
            Value::Object(map) => CrmLineItem::from_object(CrmObject { id: id.to_string(), properties: map }),
            _ => unreachable!("fixture properties are objects"),
        }
    }
}

impl Default for FixtureCrm {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ContactDirectory for FixtureCrm {
    async fn find_by_email(&self, _email: &str) -> anyhow::Result<Option<ContactProfile>> {
        Ok(Some(ContactProfile {
            phone: Some("+31612345678".to_string()),
            name: Some("Dev User".to_string()),
            address: Some("Voorbeeldstraat 123".to_string()),
            zip: Some("1234 AB".to_string()),
            city: Some("Amsterdam".to_string()),
        }))
    }
}

#[async_trait::async_trait]
impl CrmQuotes for FixtureCrm {
    async fn quotes_by_email(&self, _email: &str) -> anyhow::Result<Option<QuoteBundle>> {
        let deals = vec![Deal {
            id: "fixture-deal-1".to_string(),
            name: Some("Elektrische installatie keuken".to_string()),
            amount: Some("2448.36".to_string()),
            stage: Some("2705156301".to_string()),
            close_date: Some("2025-11-01".to_string()),
        }];

        let line_items = vec![
            Self::line_item(
                "fixture-line-1",
                json!({
                    "hs_name": "HEP 3 fase groepenkast",
                    "hs_description": "10 groepen B220xH330 + installatie",
                    "hs_quantity": "1",
                    "hs_rate": "2023.44",
                    "hs_amount": "2023.44"
                }),
            ),
            Self::line_item(
                "fixture-line-2",
                json!({
                    "hs_name": "Inductie groep aanleg",
                    "hs_description": "Aanleg via kruipruimte",
                    "hs_quantity": "1",
                    "hs_rate": "150.00",
                    "hs_amount": "150.00"
                }),
            ),
            Self::line_item(
                "fixture-line-3",
                json!({
                    "hs_name": "4x Kabelroutes keuken",
                    "hs_description": "Oven, vaatwasser, Quooker, koelkast",
                    "hs_quantity": "1",
                    "hs_rate": "300.00",
                    "hs_amount": "300.00"
                }),
            ),
            Self::line_item(
                "fixture-line-4",
                json!({
                    "hs_name": "2x Kabelroutes wasmachine",
                    "hs_description": "Wasmachine en droger",
                    "hs_quantity": "1",
                    "hs_rate": "150.00",
                    "hs_amount": "150.00"
                }),
            ),
        ];

        Ok(Some(QuoteBundle { deals, line_items }))
    }

    async fn update_deal_stage(&self, deal_id: &str, stage_id: &str) -> anyhow::Result<()> {
        self.stage_updates
            .lock()
            .expect("fixture lock poisoned")
            .push((deal_id.to_string(), stage_id.to_string()));
        Ok(())
    }

    async fn update_contact_address(
        &self,
        email: &str,
        update: &AddressUpdate,
    ) -> anyhow::Result<()> {
        self.address_updates
            .lock()
            .expect("fixture lock poisoned")
            .push((email.to_string(), update.clone()));
        Ok(())
    }

    async fn update_deal_installation_dates(
        &self,
        deal_id: &str,
        formatted_dates: &[String],
    ) -> anyhow::Result<()> {
        self.installation_updates
            .lock()
            .expect("fixture lock poisoned")
            .push((deal_id.to_string(), formatted_dates.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use voltquote_core::verify::ContactDirectory;

    use super::FixtureCrm;
    use crate::{AddressUpdate, CrmQuotes};

    #[tokio::test]
    async fn fixture_contact_has_a_mobile_number() {
        let crm = FixtureCrm::new();
        let profile = crm.find_by_email("dev@example.com").await.expect("lookup");
        assert_eq!(profile.and_then(|p| p.phone).as_deref(), Some("+31612345678"));
    }

    #[tokio::test]
    async fn fixture_bundle_carries_the_kitchen_deal() {
        let crm = FixtureCrm::new();
        let bundle = crm.quotes_by_email("dev@example.com").await.expect("lookup").expect("bundle");

        assert_eq!(bundle.deals.len(), 1);
        assert_eq!(bundle.deals[0].name.as_deref(), Some("Elektrische installatie keuken"));
        assert_eq!(bundle.line_items.len(), 4);
    }

    #[tokio::test]
    async fn writes_are_recorded() {
        let crm = FixtureCrm::new();
        crm.update_deal_stage("fixture-deal-1", "stage-won").await.expect("stage update");
        crm.update_contact_address(
            "dev@example.com",
            &AddressUpdate {
                address: "Nieuwe straat 1".to_string(),
                zip: "9999 ZZ".to_string(),
                city: "Utrecht".to_string(),
            },
        )
        .await
        .expect("address update");
        crm.update_deal_installation_dates(
            "fixture-deal-1",
            &["01-11-2025 08:00".to_string(), "03-11-2025 13:00".to_string()],
        )
        .await
        .expect("installation dates update");

        assert_eq!(crm.stage_updates.lock().unwrap().len(), 1);
        assert_eq!(crm.address_updates.lock().unwrap()[0].0, "dev@example.com");
        assert_eq!(crm.installation_updates.lock().unwrap()[0].1.len(), 2);
    }
}
