//! Appointment scheduling proxy.
//!
//! The wizard never picks installation slots itself; it forwards the
//! customer's date preferences to an external workflow engine and translates
//! the engine's answers back into the wizard contract. The engine speaks two
//! dialects: a two-phase `suggestions`/`manual` flow and a legacy
//! `success`/`alternatives` flow. Both are mapped here.
//!
//! Endpoints:
//! - `POST /api/schedule-request`     — request slots for the preferences
//! - `POST /api/confirm-alternative`  — confirm one slot, or ask for manual contact

use anyhow::{bail, Context};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use voltquote_core::config::WorkflowConfig;

use crate::bootstrap::AppState;

const DEFAULT_DURATION_MINUTES: i64 = 180;

/// Workflow engine seam. Both calls take an already-shaped JSON payload and
/// return the engine's raw JSON answer; the handlers own the translation.
#[async_trait::async_trait]
pub trait WorkflowClient: Send + Sync {
    async fn request_slots(&self, payload: &Value) -> anyhow::Result<Value>;
    async fn confirm(&self, payload: &Value) -> anyhow::Result<Value>;
}

/// HTTP client for the real workflow engine. Confirmation goes to a separate
/// webhook when one is configured, otherwise to the main webhook.
pub struct HttpWorkflowClient {
    http: reqwest::Client,
    webhook_url: String,
    confirm_webhook_url: Option<String>,
}

impl HttpWorkflowClient {
    pub fn from_config(config: &WorkflowConfig) -> anyhow::Result<Self> {
        let webhook_url =
            config.webhook_url.clone().context("workflow.webhook_url is required for the live client")?;
        Ok(Self {
            http: reqwest::Client::new(),
            webhook_url,
            confirm_webhook_url: config.confirm_webhook_url.clone(),
        })
    }

    async fn post(&self, url: &str, payload: &Value) -> anyhow::Result<Value> {
        let response = self
            .http
            .post(url)
            .json(payload)
            .send()
            .await
            .context("workflow webhook request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("workflow webhook returned {status}: {body}");
        }

        response.json().await.context("workflow webhook body")
    }
}

#[async_trait::async_trait]
impl WorkflowClient for HttpWorkflowClient {
    async fn request_slots(&self, payload: &Value) -> anyhow::Result<Value> {
        self.post(&self.webhook_url, payload).await
    }

    async fn confirm(&self, payload: &Value) -> anyhow::Result<Value> {
        let url = self.confirm_webhook_url.as_deref().unwrap_or(&self.webhook_url);
        self.post(url, payload).await
    }
}

/// Development engine. Answers in the legacy dialect so the handler mapping
/// stays exercised: the first preference is always bookable.
pub struct FixtureWorkflow;

#[async_trait::async_trait]
impl WorkflowClient for FixtureWorkflow {
    async fn request_slots(&self, payload: &Value) -> anyhow::Result<Value> {
        let first = payload
            .get("preferences")
            .and_then(Value::as_array)
            .and_then(|preferences| preferences.first())
            .cloned()
            .unwrap_or_else(|| json!({ "date": "", "timeSlot": "09:00" }));
        let time = first.get("timeSlot").and_then(Value::as_str).unwrap_or("09:00");

        Ok(json!({
            "success": true,
            "booking": {
                "date": first.get("date").cloned().unwrap_or(Value::Null),
                "time": time,
                "endTime": calculate_end_time(time, DEFAULT_DURATION_MINUTES),
                "monteur": "Jan van der Berg"
            }
        }))
    }

    async fn confirm(&self, payload: &Value) -> anyhow::Result<Value> {
        if payload.get("contactMe").and_then(Value::as_bool).unwrap_or(false) {
            return Ok(json!({
                "status": "manual_confirmed",
                "message": "Uw verzoek is ontvangen. Ons team neemt contact met u op."
            }));
        }

        let slot = payload.get("confirmedSlot").cloned().unwrap_or_else(|| json!({}));
        let time = slot.get("timeSlot").and_then(Value::as_str).unwrap_or("09:00");
        let duration = payload
            .get("installatieDuurMinuten")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_DURATION_MINUTES);

        Ok(json!({
            "status": "success",
            "confirmedAppointment": {
                "date": slot.get("date").cloned().unwrap_or(Value::Null),
                "timeSlot": time,
                "endTime": calculate_end_time(time, duration),
                "period": day_period(time),
                "monteur": { "id": slot.get("monteurId").cloned().unwrap_or(Value::Null), "naam": "Jan van der Berg" }
            },
            "message": "Afspraak succesvol ingepland!"
        }))
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preference {
    pub date: String,
    pub time_slot: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    deal_id: Option<String>,
    contact_email: Option<String>,
    customer_address: Option<String>,
    preferences: Option<Vec<Preference>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedSlot {
    date: String,
    time_slot: String,
    monteur_id: String,
    period: Option<String>,
    calendar_id: Option<String>,
    end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    deal_id: Option<String>,
    contact_email: Option<String>,
    customer_address: Option<String>,
    contact_me: Option<bool>,
    preferences: Option<Vec<Preference>>,
    selected_slot: Option<SelectedSlot>,
    installatie_duur_minuten: Option<i64>,
}

#[derive(Debug, Serialize)]
struct SchedulingError {
    ok: bool,
    message: String,
}

fn invalid(message: &str) -> (StatusCode, Json<SchedulingError>) {
    (StatusCode::BAD_REQUEST, Json(SchedulingError { ok: false, message: message.to_string() }))
}

// ---------------------------------------------------------------------------
// Router and handlers
// ---------------------------------------------------------------------------

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/schedule-request", post(schedule_request))
        .route("/api/confirm-alternative", post(confirm_alternative))
}

async fn schedule_request(
    State(state): State<AppState>,
    Json(body): Json<ScheduleRequest>,
) -> Result<Json<Value>, (StatusCode, Json<SchedulingError>)> {
    let deal_id = body.deal_id.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let contact_email =
        body.contact_email.as_deref().map(|v| v.trim().to_lowercase()).filter(|v| !v.is_empty());
    let preferences = body.preferences.unwrap_or_default();

    let (Some(deal_id), Some(contact_email)) = (deal_id, contact_email) else {
        return Err(invalid("dealId, contactEmail en preferences zijn verplicht"));
    };
    if preferences.is_empty() {
        return Err(invalid("dealId, contactEmail en preferences zijn verplicht"));
    }

    let customer_address = body
        .customer_address
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("Adres niet beschikbaar");

    let payload = json!({
        "dealId": deal_id,
        "contactEmail": contact_email,
        "customerAddress": customer_address,
        "preferences": preferences.iter().map(|p| json!({
            "date": p.date,
            "timeSlot": p.time_slot,
            "period": p.period.clone().unwrap_or_else(|| day_period(&p.time_slot).to_string()),
        })).collect::<Vec<_>>(),
    });

    info!(
        event_name = "schedule.request",
        deal_id,
        preference_count = preferences.len(),
        "forwarding scheduling request to workflow engine"
    );

    match state.workflow.request_slots(&payload).await {
        Ok(raw) => Ok(Json(map_schedule_response(raw))),
        Err(error) => {
            // The engine being down must not strand the wizard; the team
            // picks these requests up by hand.
            warn!(event_name = "schedule.webhook_failed", deal_id, error = %error, "workflow engine unreachable");
            Ok(Json(json!({
                "ok": true,
                "status": "manual",
                "message": "We konden de planning niet automatisch verwerken. Ons team neemt binnen 24 uur contact met je op."
            })))
        }
    }
}

async fn confirm_alternative(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<Value>, (StatusCode, Json<SchedulingError>)> {
    let deal_id = body.deal_id.as_deref().map(str::trim).filter(|v| !v.is_empty());
    let contact_me = body.contact_me.unwrap_or(false);

    let Some(deal_id) = deal_id else {
        return Err(invalid("dealId en (selectedSlot of contactMe) zijn verplicht"));
    };
    let contact_email = body.contact_email.as_deref().map(str::trim).unwrap_or("");
    let customer_address = body.customer_address.as_deref().map(str::trim).unwrap_or("");

    let payload = if contact_me {
        json!({
            "dealId": deal_id,
            "contactEmail": contact_email,
            "customerAddress": customer_address,
            "contactMe": true,
            "preferences": body.preferences.unwrap_or_default(),
        })
    } else if let Some(slot) = body.selected_slot.as_ref() {
        json!({
            "dealId": deal_id,
            "contactEmail": contact_email,
            "customerAddress": customer_address,
            "confirmedSlot": {
                "date": slot.date,
                "timeSlot": slot.time_slot,
                "monteurId": slot.monteur_id,
                "period": slot.period,
                "calendarId": slot.calendar_id,
            },
            "installatieDuurMinuten": body.installatie_duur_minuten.unwrap_or(DEFAULT_DURATION_MINUTES),
        })
    } else {
        return Err(invalid("dealId en (selectedSlot of contactMe) zijn verplicht"));
    };

    info!(event_name = "schedule.confirm", deal_id, contact_me, "forwarding confirmation to workflow engine");

    match state.workflow.confirm(&payload).await {
        Ok(raw) => Ok(Json(map_confirm_response(raw))),
        Err(error) => {
            warn!(event_name = "schedule.confirm_failed", deal_id, error = %error, "workflow confirmation failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SchedulingError { ok: false, message: "Bevestiging mislukt".to_string() }),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Response mapping
// ---------------------------------------------------------------------------

/// Translates a raw engine answer into the wizard contract. Unknown shapes
/// pass through with an `ok` flag so the frontend can still inspect them.
fn map_schedule_response(raw: Value) -> Value {
    if raw.get("status").and_then(Value::as_str) == Some("suggestions")
        && raw.get("suggestions").is_some()
    {
        return json!({
            "ok": true,
            "status": "suggestions",
            "suggestions": raw.get("suggestions"),
            "message": raw.get("message"),
            "deal": raw.get("deal"),
            "installatieDuurMinuten": raw.get("installatieDuurMinuten"),
        });
    }

    if raw.get("status").and_then(Value::as_str) == Some("manual") {
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Ons team neemt binnen 24 uur contact met je op.");
        return json!({ "ok": true, "status": "manual", "message": message });
    }

    if raw.get("success").and_then(Value::as_bool) == Some(true) {
        if let Some(booking) = raw.get("booking") {
            let time = booking.get("time").and_then(Value::as_str).unwrap_or("");
            return json!({
                "ok": true,
                "status": "success",
                "confirmedAppointment": {
                    "date": booking.get("date"),
                    "timeSlot": time,
                    "endTime": booking.get("endTime"),
                    "period": day_period(time),
                    "monteur": { "id": "legacy", "naam": booking.get("monteur") }
                }
            });
        }
    }

    if raw.get("success").and_then(Value::as_bool) == Some(false)
        && raw.get("hasAlternatives").and_then(Value::as_bool) == Some(true)
    {
        if let Some(alternatives) = raw.get("alternatives").and_then(Value::as_array) {
            let mapped: Vec<Value> = alternatives
                .iter()
                .map(|alt| {
                    let time = alt.get("time").and_then(Value::as_str).unwrap_or("");
                    json!({
                        "date": alt.get("date"),
                        "timeSlot": time,
                        "period": day_period(time),
                        "monteur": {
                            "id": alt.get("monteurId").and_then(Value::as_str).unwrap_or("unknown"),
                            "naam": alt.get("monteur")
                        }
                    })
                })
                .collect();
            return json!({ "ok": true, "status": "alternatives", "alternatives": mapped });
        }
    }

    merge_ok(raw)
}

fn map_confirm_response(raw: Value) -> Value {
    if raw.get("status").and_then(Value::as_str) == Some("success")
        && raw.get("confirmedAppointment").is_some()
    {
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Afspraak succesvol ingepland!");
        return json!({
            "ok": true,
            "status": "success",
            "confirmedAppointment": raw.get("confirmedAppointment"),
            "message": message,
        });
    }

    merge_ok(raw)
}

fn merge_ok(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) => {
            map.insert("ok".to_string(), Value::Bool(true));
            Value::Object(map)
        }
        other => json!({ "ok": true, "result": other }),
    }
}

/// A slot starting before noon is a morning (`ochtend`) appointment.
pub fn day_period(time_slot: &str) -> &'static str {
    let hour: u32 = time_slot.split(':').next().and_then(|h| h.parse().ok()).unwrap_or(0);
    if hour < 12 {
        "ochtend"
    } else {
        "middag"
    }
}

/// `"HH:MM"` start plus a duration, formatted the same way. Rolls past
/// midnight without wrapping, matching the engine's own arithmetic.
pub fn calculate_end_time(start_time: &str, duration_minutes: i64) -> String {
    let mut parts = start_time.split(':');
    let hours: i64 = parts.next().and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i64 = parts.next().and_then(|m| m.parse().ok()).unwrap_or(0);

    let end = hours * 60 + minutes + duration_minutes;
    format!("{:02}:{:02}", end / 60, end % 60)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{calculate_end_time, day_period, map_confirm_response, map_schedule_response};

    #[test]
    fn end_time_adds_the_duration() {
        assert_eq!(calculate_end_time("09:00", 180), "12:00");
        assert_eq!(calculate_end_time("10:30", 45), "11:15");
        assert_eq!(calculate_end_time("23:30", 60), "24:30");
    }

    #[test]
    fn periods_split_at_noon() {
        assert_eq!(day_period("09:00"), "ochtend");
        assert_eq!(day_period("11:59"), "ochtend");
        assert_eq!(day_period("12:00"), "middag");
        assert_eq!(day_period("14:30"), "middag");
    }

    #[test]
    fn suggestions_answers_pass_through() {
        let mapped = map_schedule_response(json!({
            "status": "suggestions",
            "suggestions": [{ "date": "2026-09-01", "timeSlot": "09:00" }],
            "message": "Kies een voorstel",
            "installatieDuurMinuten": 240
        }));

        assert_eq!(mapped["ok"], true);
        assert_eq!(mapped["status"], "suggestions");
        assert_eq!(mapped["installatieDuurMinuten"], 240);
        assert_eq!(mapped["suggestions"][0]["timeSlot"], "09:00");
    }

    #[test]
    fn manual_answers_get_a_default_message() {
        let mapped = map_schedule_response(json!({ "status": "manual" }));

        assert_eq!(mapped["status"], "manual");
        assert_eq!(mapped["message"], "Ons team neemt binnen 24 uur contact met je op.");
    }

    #[test]
    fn legacy_booking_becomes_a_confirmed_appointment() {
        let mapped = map_schedule_response(json!({
            "success": true,
            "booking": { "date": "2026-09-01", "time": "13:00", "endTime": "16:00", "monteur": "Piet Jansen" }
        }));

        assert_eq!(mapped["status"], "success");
        let appointment = &mapped["confirmedAppointment"];
        assert_eq!(appointment["timeSlot"], "13:00");
        assert_eq!(appointment["period"], "middag");
        assert_eq!(appointment["monteur"]["id"], "legacy");
        assert_eq!(appointment["monteur"]["naam"], "Piet Jansen");
    }

    #[test]
    fn legacy_alternatives_are_reshaped_per_slot() {
        let mapped = map_schedule_response(json!({
            "success": false,
            "hasAlternatives": true,
            "alternatives": [
                { "date": "2026-09-02", "time": "09:00", "monteur": "Jan van der Berg", "monteurId": "m-1" },
                { "date": "2026-09-03", "time": "14:00", "monteur": "Klaas de Vries" }
            ]
        }));

        assert_eq!(mapped["status"], "alternatives");
        let alternatives = mapped["alternatives"].as_array().expect("alternatives");
        assert_eq!(alternatives[0]["period"], "ochtend");
        assert_eq!(alternatives[0]["monteur"]["id"], "m-1");
        assert_eq!(alternatives[1]["monteur"]["id"], "unknown");
    }

    #[test]
    fn unknown_schedule_shapes_pass_through_with_ok() {
        let mapped = map_schedule_response(json!({ "custom": "shape" }));

        assert_eq!(mapped["ok"], true);
        assert_eq!(mapped["custom"], "shape");
    }

    #[test]
    fn confirm_success_keeps_the_appointment_and_defaults_the_message() {
        let mapped = map_confirm_response(json!({
            "status": "success",
            "confirmedAppointment": { "date": "2026-09-01", "timeSlot": "09:00" }
        }));

        assert_eq!(mapped["status"], "success");
        assert_eq!(mapped["message"], "Afspraak succesvol ingepland!");
        assert_eq!(mapped["confirmedAppointment"]["date"], "2026-09-01");
    }
}
