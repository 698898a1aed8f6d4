use serde::{Deserialize, Serialize};

use crate::auth::dto::check_password;
use crate::error::FieldErrors;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

/// `email` is the encrypted value from the reset link.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdatePasswordRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug)]
pub struct PasswordUpdate {
    pub encrypted_email: String,
    pub password: String,
    pub token: String,
}

impl UpdatePasswordRequest {
    pub fn validate(&self) -> Result<PasswordUpdate, FieldErrors> {
        let mut errs = FieldErrors::new();
        let mut present = |field: &'static str, value: &Option<String>| match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Some(v.to_string()),
            _ => {
                errs.add(field, format!("The {} field is required.", field));
                None
            }
        };
        let encrypted_email = present("email", &self.email);
        let token = present("token", &self.token);
        let password = check_password(&mut errs, &self.password);

        match (encrypted_email, password, token) {
            (Some(encrypted_email), Some(password), Some(token)) => Ok(PasswordUpdate {
                encrypted_email,
                password,
                token,
            }),
            _ => Err(errs),
        }
    }
}

/// `{ "status": bool, "message": "..." }`
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: bool,
    pub message: String,
}

impl StatusResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
        }
    }
}
