use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use tracing::{instrument, warn};

use super::{
    dto::{ForgotPasswordRequest, StatusResponse, UpdatePasswordRequest},
    services::PasswordResetWorkflow,
};
use crate::{
    error::{AuthError, AuthResult},
    state::AppState,
};

pub fn reset_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/update-password", post(update_password))
}

/// Both reset endpoints answer 200 with `{status, message}`; failures are not
/// surfaced as HTTP errors.
fn failure(e: AuthError) -> Json<StatusResponse> {
    warn!(error = %e, "password reset step failed");
    let message = match e {
        AuthError::NotFound(_) => "Invalid email address".to_string(),
        other => other.public_message(),
    };
    Json(StatusResponse::failed(message))
}

fn unreadable(rejection: JsonRejection) -> Json<StatusResponse> {
    warn!(error = %rejection.body_text(), "password reset body rejected");
    Json(StatusResponse::failed("The request body is invalid"))
}

#[instrument(skip_all)]
pub async fn forgot_password(
    State(workflow): State<PasswordResetWorkflow>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Json<StatusResponse> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return unreadable(rejection),
    };
    let email = payload.email.unwrap_or_default();
    match workflow.request_reset(&email).await {
        Ok(()) => Json(StatusResponse::ok("Password reset link has been sent")),
        Err(e) => failure(e),
    }
}

#[instrument(skip_all)]
pub async fn update_password(
    State(workflow): State<PasswordResetWorkflow>,
    payload: Result<Json<UpdatePasswordRequest>, JsonRejection>,
) -> AuthResult<Json<StatusResponse>> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return Ok(unreadable(rejection)),
    };
    let update = payload.validate().map_err(AuthError::Validation)?;
    let res = workflow
        .complete_reset(&update.encrypted_email, &update.token, &update.password)
        .await;
    Ok(match res {
        Ok(()) => Json(StatusResponse::ok("Password updated")),
        Err(AuthError::NotFound(_)) => Json(StatusResponse::failed("Invalid email address or token")),
        Err(e) => failure(e),
    })
}
