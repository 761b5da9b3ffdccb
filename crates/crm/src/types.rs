use serde::{Deserialize, Serialize};
use serde_json::Value;

use voltquote_core::pricing::LineItemRecord;

/// Contact search properties. `mobilephone` is requested alongside `phone`
/// because WhatsApp verification prefers the mobile number.
pub const CONTACT_PROPERTIES: &[&str] =
    &["email", "firstname", "lastname", "phone", "mobilephone", "address", "zip", "city"];

pub const DEAL_PROPERTIES: &[&str] = &["dealname", "amount", "dealstage", "closedate"];

/// Every alias the amount calculator knows how to read, so the CRM returns
/// whichever variants the portal happens to populate.
pub const LINE_ITEM_PROPERTIES: &[&str] = &[
    "hs_name",
    "hs_description",
    "name",
    "description",
    "hs_quantity",
    "hs_rate",
    "quantity",
    "price",
    "hs_amount",
    "amount",
    "hs_discount_amount",
    "discount_amount",
    "hs_discount",
    "discount",
    "hs_discount_percentage",
    "discount_percentage",
    "hs_tax_rate",
    "tax_rate",
    "hs_tax_amount",
    "tax_amount",
];

/// CRM v3 search request body.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub filter_groups: Vec<FilterGroup>,
    pub properties: Vec<String>,
    pub limit: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct FilterGroup {
    pub filters: Vec<Filter>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    pub property_name: String,
    pub operator: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

impl Filter {
    pub fn eq(property: &str, value: impl Into<String>) -> Self {
        Self {
            property_name: property.to_string(),
            operator: "EQ",
            value: Some(value.into()),
            values: None,
        }
    }

    pub fn in_values(property: &str, values: Vec<String>) -> Self {
        Self { property_name: property.to_string(), operator: "IN", value: None, values: Some(values) }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<CrmObject>,
}

/// One object from a search response: an id plus an open property bag.
#[derive(Clone, Debug, Deserialize)]
pub struct CrmObject {
    pub id: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, Value>,
}

impl CrmObject {
    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

/// Typed view of the deal fields the wizard reads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deal {
    pub id: String,
    pub name: Option<String>,
    pub amount: Option<String>,
    pub stage: Option<String>,
    pub close_date: Option<String>,
}

impl Deal {
    pub fn from_object(object: &CrmObject) -> Self {
        Self {
            id: object.id.clone(),
            name: object.text("dealname").map(str::to_string),
            amount: object.text("amount").map(str::to_string),
            stage: object.text("dealstage").map(str::to_string),
            close_date: object.text("closedate").map(str::to_string),
        }
    }
}

/// One deal line item: the id plus the raw record the amount calculator
/// consumes untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CrmLineItem {
    pub id: String,
    pub record: LineItemRecord,
}

impl CrmLineItem {
    pub fn from_object(object: CrmObject) -> Self {
        Self { id: object.id, record: LineItemRecord(object.properties) }
    }
}

/// Everything the quote overview needs for one customer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteBundle {
    pub deals: Vec<Deal>,
    pub line_items: Vec<CrmLineItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressUpdate {
    pub address: String,
    pub zip: String,
    pub city: String,
}
