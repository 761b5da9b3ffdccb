//! WhatsApp verification routes for the wizard's identity step.
//!
//! Endpoints:
//! - `POST /api/verify/start`    — look up the contact, issue and send a code
//! - `POST /api/verify/confirm`  — check a submitted code
//! - `POST /api/verify/resend`   — fresh code, optionally to another number

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::error;

use voltquote_core::VerifyError;

use crate::bootstrap::AppState;

#[derive(Debug, Deserialize)]
struct StartRequest {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfirmRequest {
    email: Option<String>,
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResendRequest {
    email: Option<String>,
    phone: Option<String>,
}

#[derive(Debug, Serialize)]
struct ContactInfo {
    address: Option<String>,
    zip: Option<String>,
    city: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartResponse {
    ok: bool,
    masked_phone: String,
    full_phone: Option<String>,
    contact_name: Option<String>,
    contact_info: ContactInfo,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmResponse {
    ok: bool,
    phone_number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResendResponse {
    ok: bool,
    masked_phone: String,
}

#[derive(Debug, Serialize)]
struct VerifyErrorBody {
    message: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/verify/start", post(start))
        .route("/api/verify/confirm", post(confirm))
        .route("/api/verify/resend", post(resend))
}

async fn start(
    State(state): State<AppState>,
    Json(body): Json<StartRequest>,
) -> Result<Json<StartResponse>, (StatusCode, Json<VerifyErrorBody>)> {
    let email = body.email.as_deref().unwrap_or_default();

    let started = state.verification.start(email).await.map_err(error_response)?;

    Ok(Json(StartResponse {
        ok: true,
        masked_phone: started.phone_e164,
        full_phone: started.contact.phone,
        contact_name: started.contact.name,
        contact_info: ContactInfo {
            address: started.contact.address,
            zip: started.contact.zip,
            city: started.contact.city,
        },
    }))
}

async fn confirm(
    State(state): State<AppState>,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, (StatusCode, Json<VerifyErrorBody>)> {
    let email = body.email.as_deref().unwrap_or_default();
    let code = body.code.as_deref().unwrap_or_default();

    let phone_number = state.verification.confirm(email, code).await.map_err(error_response)?;

    Ok(Json(ConfirmResponse { ok: true, phone_number }))
}

async fn resend(
    State(state): State<AppState>,
    Json(body): Json<ResendRequest>,
) -> Result<Json<ResendResponse>, (StatusCode, Json<VerifyErrorBody>)> {
    let email = body.email.as_deref().unwrap_or_default();

    let masked_phone = state
        .verification
        .resend(email, body.phone.as_deref())
        .await
        .map_err(error_response)?;

    Ok(Json(ResendResponse { ok: true, masked_phone }))
}

fn error_response(error: VerifyError) -> (StatusCode, Json<VerifyErrorBody>) {
    let status = match &error {
        VerifyError::Validation(_) | VerifyError::NoActiveVerification | VerifyError::Expired => {
            StatusCode::BAD_REQUEST
        }
        VerifyError::InvalidCode => StatusCode::UNAUTHORIZED,
        VerifyError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        VerifyError::PhoneNotFound(_) => StatusCode::NOT_FOUND,
        VerifyError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
        VerifyError::SendFailed(_) => StatusCode::BAD_GATEWAY,
    };

    if status.is_server_error() {
        error!(event_name = "verify.upstream_failed", error = %error, "verification upstream failure");
    }

    (status, Json(VerifyErrorBody { message: error.user_message().to_string() }))
}
