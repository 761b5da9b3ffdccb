use anyhow::{bail, Context};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tracing::{debug, warn};

use voltquote_core::config::CrmConfig;
use voltquote_core::verify::{ContactDirectory, ContactProfile};

use crate::types::{
    CrmLineItem, CrmObject, Deal, Filter, FilterGroup, QuoteBundle, SearchRequest, SearchResults,
    CONTACT_PROPERTIES, DEAL_PROPERTIES, LINE_ITEM_PROPERTIES,
};
use crate::{profile_from_properties, AddressUpdate, CrmQuotes};

const CONTACT_SEARCH_LIMIT: u32 = 1;
const DEAL_SEARCH_LIMIT: u32 = 10;
const LINE_ITEM_SEARCH_LIMIT: u32 = 50;

/// CRM v3 HTTP client. One request per operation, no retries; a non-success
/// status surfaces as an error with a truncated response body.
pub struct HubSpotClient {
    http: reqwest::Client,
    base_url: String,
    api_token: SecretString,
    quote_stage_ids: Vec<String>,
}

impl HubSpotClient {
    pub fn new(base_url: impl Into<String>, api_token: SecretString, quote_stage_ids: Vec<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_token,
            quote_stage_ids,
        }
    }

    pub fn from_config(config: &CrmConfig) -> anyhow::Result<Self> {
        let api_token =
            config.api_token.clone().context("crm.api_token is required for the live client")?;
        Ok(Self::new(config.base_url.clone(), api_token, config.quote_stage_ids.clone()))
    }

    async fn search(&self, object_type: &str, request: &SearchRequest) -> anyhow::Result<Vec<CrmObject>> {
        let url = format!("{}/crm/v3/objects/{object_type}/search", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_token.expose_secret())
            .json(request)
            .send()
            .await
            .with_context(|| format!("crm {object_type} search request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "crm.search_failed",
                object_type,
                status = %status,
                "crm search returned an error status"
            );
            bail!("crm {object_type} search failed: {status} {}", truncate(&body));
        }

        let results: SearchResults =
            response.json().await.with_context(|| format!("crm {object_type} search body"))?;
        Ok(results.results)
    }

    async fn patch(&self, object_type: &str, id: &str, properties: Value) -> anyhow::Result<()> {
        let url = format!("{}/crm/v3/objects/{object_type}/{id}", self.base_url);
        let response = self
            .http
            .patch(&url)
            .bearer_auth(self.api_token.expose_secret())
            .json(&json!({ "properties": properties }))
            .send()
            .await
            .with_context(|| format!("crm {object_type} update request failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("crm {object_type} update failed: {status} {}", truncate(&body));
        }

        debug!(event_name = "crm.object_updated", object_type, id, "crm object updated");
        Ok(())
    }

    async fn find_contact(&self, email: &str) -> anyhow::Result<Option<CrmObject>> {
        let request = SearchRequest {
            filter_groups: vec![FilterGroup { filters: vec![Filter::eq("email", email)] }],
            properties: CONTACT_PROPERTIES.iter().map(|p| (*p).to_string()).collect(),
            limit: CONTACT_SEARCH_LIMIT,
        };
        let mut results = self.search("contacts", &request).await?;
        Ok((!results.is_empty()).then(|| results.remove(0)))
    }
}

#[async_trait::async_trait]
impl ContactDirectory for HubSpotClient {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<ContactProfile>> {
        let contact = self.find_contact(email).await?;
        Ok(contact.map(|object| profile_from_properties(&object.properties)))
    }
}

#[async_trait::async_trait]
impl CrmQuotes for HubSpotClient {
    async fn quotes_by_email(&self, email: &str) -> anyhow::Result<Option<QuoteBundle>> {
        let Some(contact) = self.find_contact(email).await? else {
            return Ok(None);
        };

        let deal_request = SearchRequest {
            filter_groups: vec![FilterGroup {
                filters: vec![
                    Filter::eq("associations.contact", contact.id.clone()),
                    Filter::in_values("dealstage", self.quote_stage_ids.clone()),
                ],
            }],
            properties: DEAL_PROPERTIES.iter().map(|p| (*p).to_string()).collect(),
            limit: DEAL_SEARCH_LIMIT,
        };
        let deal_objects = self.search("deals", &deal_request).await?;
        let deals: Vec<Deal> = deal_objects.iter().map(Deal::from_object).collect();

        if deals.is_empty() {
            return Ok(Some(QuoteBundle::default()));
        }

        let line_item_request = SearchRequest {
            filter_groups: vec![FilterGroup {
                filters: vec![Filter::in_values(
                    "associations.deal",
                    deals.iter().map(|deal| deal.id.clone()).collect(),
                )],
            }],
            properties: LINE_ITEM_PROPERTIES.iter().map(|p| (*p).to_string()).collect(),
            limit: LINE_ITEM_SEARCH_LIMIT,
        };
        let line_items = self
            .search("line_items", &line_item_request)
            .await?
            .into_iter()
            .map(CrmLineItem::from_object)
            .collect();

        Ok(Some(QuoteBundle { deals, line_items }))
    }

    async fn update_deal_stage(&self, deal_id: &str, stage_id: &str) -> anyhow::Result<()> {
        self.patch("deals", deal_id, json!({ "dealstage": stage_id })).await
    }

    async fn update_contact_address(
        &self,
        email: &str,
        update: &AddressUpdate,
    ) -> anyhow::Result<()> {
        let contact =
            self.find_contact(email).await?.with_context(|| format!("no contact for `{email}`"))?;
        self.patch(
            "contacts",
            &contact.id,
            json!({ "address": update.address, "zip": update.zip, "city": update.city }),
        )
        .await
    }

    async fn update_deal_installation_dates(
        &self,
        deal_id: &str,
        formatted_dates: &[String],
    ) -> anyhow::Result<()> {
        self.patch(
            "deals",
            deal_id,
            json!({ "datum_weken_installatie": formatted_dates.join(", ") }),
        )
        .await
    }
}

fn truncate(body: &str) -> &str {
    let limit = body.char_indices().nth(200).map_or(body.len(), |(index, _)| index);
    &body[..limit]
}
