use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{LoginRequest, MessageResponse, RegisterRequest, RegisterResponse, TokenResponse},
        extractors::{AuthUser, BearerToken},
        jwt::JwtKeys,
        repo_types::User,
        services::{authenticate, create_user},
    },
    error::{body_errors, AuthError, AuthResult},
    state::AppState,
    verification::VerificationWorkflow,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/user-profile", get(user_profile))
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> AuthResult<(StatusCode, Json<RegisterResponse>)> {
    let Json(payload) = payload.map_err(|r| AuthError::InvalidRegistration(body_errors(&r)))?;
    let input = payload.validate().map_err(|errs| {
        warn!("registration rejected by validation");
        AuthError::InvalidRegistration(errs)
    })?;

    let user = create_user(state.users.as_ref(), &input.name, &input.email, &input.password).await?;

    // The account and its pending token are stored either way.
    if let Err(e) = VerificationWorkflow::from_ref(&state).initiate(&user).await {
        warn!(user_id = %user.id, error = %e, "could not start email verification");
    }

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "User successfully registered",
            user,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AuthResult<Json<TokenResponse>> {
    let Json(payload) = payload.map_err(|r| AuthError::Validation(body_errors(&r)))?;
    let input = payload.validate().map_err(AuthError::Validation)?;
    let user = authenticate(state.users.as_ref(), &input.email, &input.password).await?;
    let issued = keys.issue(user.id)?;
    Ok(Json(TokenResponse::bearer(issued, user)))
}

/// Tokens are stateless; the client discards its copy.
#[instrument(skip_all)]
pub async fn logout(AuthUser(user_id): AuthUser) -> Json<MessageResponse> {
    info!(user_id = %user_id, "user signed out");
    Json(MessageResponse {
        message: "User successfully signed out",
    })
}

/// Accepts a token past its expiry as long as it is inside the refresh window.
#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    State(keys): State<JwtKeys>,
    BearerToken(token): BearerToken,
) -> AuthResult<Json<TokenResponse>> {
    let (user_id, issued) = keys.refresh(&token)?;
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AuthError::Unauthorized)?;
    info!(user_id = %user.id, "token refreshed");
    Ok(Json(TokenResponse::bearer(issued, user)))
}

#[instrument(skip_all)]
pub async fn user_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> AuthResult<Json<User>> {
    let user = state.users.find_by_id(user_id).await?.ok_or_else(|| {
        warn!(user_id = %user_id, "token refers to a missing user");
        AuthError::Unauthorized
    })?;
    Ok(Json(user))
}
