use std::collections::BTreeMap;

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::notify::SinkError;

/// Per-field validation messages, rendered as `{ "field": ["message", ...] }`.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when no field failed, otherwise the collected errors.
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

/// Field errors for a request body that could not be read as JSON.
pub fn body_errors(rejection: &JsonRejection) -> FieldErrors {
    let mut errs = FieldErrors::new();
    errs.add("body", rejection.body_text());
    errs
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("The given data was invalid")]
    Validation(FieldErrors),

    #[error("The given data was invalid")]
    InvalidRegistration(FieldErrors),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("The email has already been taken")]
    DuplicateEmail,

    #[error("The payload is invalid")]
    Decryption,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Invalid email address or token")]
    InvalidResetToken,

    #[error("Password reset token expired")]
    ExpiredResetToken,

    #[error("Notification could not be queued: {0}")]
    Notification(#[from] SinkError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AuthError::InvalidRegistration(_) | AuthError::DuplicateEmail => StatusCode::BAD_REQUEST,
            AuthError::Unauthorized | AuthError::InvalidToken | AuthError::ExpiredToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::Decryption
            | AuthError::InvalidResetToken
            | AuthError::ExpiredResetToken => StatusCode::BAD_REQUEST,
            AuthError::Notification(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client. Internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AuthError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Internal(anyhow::Error::new(err).context("database"))
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            AuthError::Validation(fields) | AuthError::InvalidRegistration(fields) => {
                (status, Json(fields)).into_response()
            }
            AuthError::DuplicateEmail => {
                let mut fields = FieldErrors::new();
                fields.add("email", "The email has already been taken.");
                (status, Json(fields)).into_response()
            }
            AuthError::Internal(e) => {
                error!(error = ?e, "internal error");
                (status, Json(json!({ "status": false, "message": "Internal server error" })))
                    .into_response()
            }
            other => (
                status,
                Json(json!({ "status": false, "message": other.public_message() })),
            )
                .into_response(),
        }
    }
}
