//! Quote overview and CRM write-back routes.
//!
//! Endpoints:
//! - `GET  /api/quotes?email=`              — deals + line items, amounts computed server-side
//! - `POST /api/accept-quote`               — move a deal to the configured won stage
//! - `POST /api/update-deal-stage`          — move a deal to an arbitrary stage
//! - `POST /api/update-address`             — correct the contact's address
//! - `POST /api/update-installation-dates`  — write confirmed dates back to the deal

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use voltquote_core::pricing::{
    compute_line_amounts, parse_description_lines, quote_totals, DescriptionLine, LineAmounts,
    QuoteTotals, DEFAULT_TAX_PCT,
};
use voltquote_crm::{AddressUpdate, Deal};

use crate::bootstrap::AppState;

#[derive(Debug, Deserialize)]
struct QuotesQuery {
    email: Option<String>,
}

/// One line item as the wizard consumes it: identity, display text and the
/// computed amounts, never the raw CRM property bag.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuoteLineView {
    id: String,
    name: Option<String>,
    description: Option<String>,
    description_lines: Vec<DescriptionLine>,
    amounts: LineAmounts,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuotesResponse {
    ok: bool,
    /// Quote documents are never fetched from the CRM; the field stays in
    /// the payload for wire compatibility and is always empty.
    quotes: Vec<serde_json::Value>,
    deals: Vec<Deal>,
    line_items: Vec<QuoteLineView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    totals: Option<QuoteTotals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl QuotesResponse {
    fn empty(ok: bool, error: Option<String>) -> Self {
        Self {
            ok,
            quotes: Vec::new(),
            deals: Vec::new(),
            line_items: Vec::new(),
            totals: None,
            error,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AcceptQuoteRequest {
    email: Option<String>,
    deal_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDealStageRequest {
    email: Option<String>,
    deal_id: Option<String>,
    stage_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateInstallationDatesRequest {
    deal_id: Option<String>,
    installation_dates: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct UpdateAddressRequest {
    email: Option<String>,
    address: Option<String>,
    zip: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteResponse {
    ok: bool,
    message: String,
}

#[derive(Debug, Serialize)]
struct WriteError {
    ok: bool,
    message: String,
}

fn invalid(message: &str) -> (StatusCode, Json<WriteError>) {
    (StatusCode::BAD_REQUEST, Json(WriteError { ok: false, message: message.to_string() }))
}

fn upstream(context: &str, error: anyhow::Error) -> (StatusCode, Json<WriteError>) {
    error!(event_name = "crm.write_failed", context, error = %error, "crm write failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(WriteError { ok: false, message: format!("Interne fout bij {context}") }),
    )
}

fn required(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/quotes", get(quotes))
        .route("/api/accept-quote", post(accept_quote))
        .route("/api/update-deal-stage", post(update_deal_stage))
        .route("/api/update-address", post(update_address))
        .route("/api/update-installation-dates", post(update_installation_dates))
}

/// The CRM stores installation dates as `DD-MM-YYYY HH:MM`; the wizard sends
/// ISO 8601 timestamps or bare dates, which become midnight.
fn format_installation_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed = chrono::DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.naive_local())
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|date| date.and_time(chrono::NaiveTime::MIN))
        })
        .ok()?;
    Some(parsed.format("%d-%m-%Y %H:%M").to_string())
}

async fn quotes(
    State(state): State<AppState>,
    Query(query): Query<QuotesQuery>,
) -> Result<Json<QuotesResponse>, (StatusCode, Json<WriteError>)> {
    let Some(email) = query.email.as_deref().map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty())
    else {
        return Err(invalid("email parameter verplicht"));
    };

    // A CRM outage degrades to an empty overview; the wizard renders it as
    // "no quotes" rather than a hard failure.
    let bundle = match state.crm.quotes_by_email(&email).await {
        Ok(Some(bundle)) => bundle,
        Ok(None) => return Ok(Json(QuotesResponse::empty(true, None))),
        Err(crm_error) => {
            error!(event_name = "quotes.lookup_failed", error = %crm_error, "crm quote lookup failed");
            return Ok(Json(QuotesResponse::empty(false, Some(crm_error.to_string()))));
        }
    };

    let line_items: Vec<QuoteLineView> = bundle
        .line_items
        .into_iter()
        .map(|item| {
            let amounts = compute_line_amounts(&item.record, DEFAULT_TAX_PCT);
            let description = item.record.description().map(str::to_string);
            QuoteLineView {
                name: item.record.name().map(str::to_string),
                description_lines: description
                    .as_deref()
                    .map(parse_description_lines)
                    .unwrap_or_default(),
                description,
                amounts,
                id: item.id,
            }
        })
        .collect();

    let amounts: Vec<LineAmounts> = line_items.iter().map(|line| line.amounts.clone()).collect();
    let totals = quote_totals(&amounts, DEFAULT_TAX_PCT);

    info!(
        event_name = "quotes.listed",
        deal_count = bundle.deals.len(),
        line_item_count = line_items.len(),
        "quote overview served"
    );

    Ok(Json(QuotesResponse {
        ok: true,
        quotes: Vec::new(),
        deals: bundle.deals,
        line_items,
        totals: Some(totals),
        error: None,
    }))
}

async fn accept_quote(
    State(state): State<AppState>,
    Json(body): Json<AcceptQuoteRequest>,
) -> Result<Json<WriteResponse>, (StatusCode, Json<WriteError>)> {
    let (Some(email), Some(deal_id)) = (required(&body.email), required(&body.deal_id)) else {
        return Err(invalid("email en dealId zijn verplicht"));
    };

    state
        .crm
        .update_deal_stage(&deal_id, &state.won_stage_id)
        .await
        .map_err(|e| upstream("accepteren offerte", e))?;

    info!(event_name = "quotes.accepted", email = %email, deal_id = %deal_id, "quote accepted");

    Ok(Json(WriteResponse {
        ok: true,
        message: "Offerte succesvol geaccepteerd en deal status bijgewerkt".to_string(),
    }))
}

async fn update_deal_stage(
    State(state): State<AppState>,
    Json(body): Json<UpdateDealStageRequest>,
) -> Result<Json<WriteResponse>, (StatusCode, Json<WriteError>)> {
    let (Some(email), Some(deal_id), Some(stage_id)) =
        (required(&body.email), required(&body.deal_id), required(&body.stage_id))
    else {
        return Err(invalid("email, dealId en stageId zijn verplicht"));
    };

    state
        .crm
        .update_deal_stage(&deal_id, &stage_id)
        .await
        .map_err(|e| upstream("bijwerken deal status", e))?;

    info!(event_name = "quotes.stage_updated", email = %email, deal_id = %deal_id, stage_id = %stage_id, "deal stage updated");

    Ok(Json(WriteResponse { ok: true, message: "Deal status succesvol bijgewerkt".to_string() }))
}

async fn update_address(
    State(state): State<AppState>,
    Json(body): Json<UpdateAddressRequest>,
) -> Result<Json<WriteResponse>, (StatusCode, Json<WriteError>)> {
    let (Some(email), Some(address), Some(zip), Some(city)) = (
        required(&body.email).map(|e| e.to_lowercase()),
        required(&body.address),
        required(&body.zip),
        required(&body.city),
    ) else {
        return Err(invalid("email, address, zip en city zijn verplicht"));
    };

    state
        .crm
        .update_contact_address(&email, &AddressUpdate { address, zip, city })
        .await
        .map_err(|e| upstream("bijwerken adres", e))?;

    info!(event_name = "quotes.address_updated", email = %email, "contact address updated");

    Ok(Json(WriteResponse { ok: true, message: "Adres succesvol bijgewerkt".to_string() }))
}

async fn update_installation_dates(
    State(state): State<AppState>,
    Json(body): Json<UpdateInstallationDatesRequest>,
) -> Result<Json<WriteResponse>, (StatusCode, Json<WriteError>)> {
    let Some(deal_id) = required(&body.deal_id) else {
        return Err(invalid("dealId en installationDates array zijn verplicht"));
    };
    let dates = body.installation_dates.as_deref().unwrap_or_default();
    if dates.is_empty() {
        return Err(invalid("dealId en installationDates array zijn verplicht"));
    }

    let formatted: Vec<String> = dates
        .iter()
        .map(|raw| format_installation_date(raw))
        .collect::<Option<_>>()
        .ok_or_else(|| invalid("installationDates bevat een ongeldige datum"))?;

    state
        .crm
        .update_deal_installation_dates(&deal_id, &formatted)
        .await
        .map_err(|e| upstream("bijwerken installatie datums", e))?;

    info!(
        event_name = "quotes.installation_dates_updated",
        deal_id = %deal_id,
        date_count = formatted.len(),
        "deal installation dates updated"
    );

    Ok(Json(WriteResponse {
        ok: true,
        message: "Installatie datums succesvol bijgewerkt".to_string(),
    }))
}
