use serde::{Deserialize, Serialize};

use super::{jwt::IssuedToken, repo_types::User, services::is_valid_email};
use crate::error::FieldErrors;

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_EMAIL_LEN: usize = 100;

/// Request body for login.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Request body for user registration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

/// Validated login input.
#[derive(Debug)]
pub struct Login {
    pub email: String,
    pub password: String,
}

/// Validated registration input.
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
}

fn required<'a>(errs: &mut FieldErrors, field: &'static str, value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errs.add(field, format!("The {} field is required.", field));
            None
        }
    }
}

pub(crate) fn check_email(errs: &mut FieldErrors, value: &Option<String>) -> Option<String> {
    let email = required(errs, "email", value)?.to_lowercase();
    if !is_valid_email(&email) {
        errs.add("email", "The email must be a valid email address.");
        return None;
    }
    Some(email)
}

pub(crate) fn check_password(errs: &mut FieldErrors, value: &Option<String>) -> Option<String> {
    // Passwords are not trimmed; only emptiness is checked on the trimmed view.
    required(errs, "password", value)?;
    let password = value.clone().unwrap_or_default();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errs.add(
            "password",
            format!("The password must be at least {} characters.", MIN_PASSWORD_LEN),
        );
        return None;
    }
    Some(password)
}

impl LoginRequest {
    pub fn validate(&self) -> Result<Login, FieldErrors> {
        let mut errs = FieldErrors::new();
        let email = check_email(&mut errs, &self.email);
        let password = check_password(&mut errs, &self.password);
        match (email, password) {
            (Some(email), Some(password)) => Ok(Login { email, password }),
            _ => Err(errs),
        }
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<Registration, FieldErrors> {
        let mut errs = FieldErrors::new();

        let name = required(&mut errs, "name", &self.name).and_then(|n| {
            let len = n.chars().count();
            if (2..=100).contains(&len) {
                Some(n.to_string())
            } else {
                errs.add("name", "The name must be between 2 and 100 characters.");
                None
            }
        });

        let email = check_email(&mut errs, &self.email).and_then(|e| {
            if e.chars().count() > MAX_EMAIL_LEN {
                errs.add("email", "The email must not be greater than 100 characters.");
                None
            } else {
                Some(e)
            }
        });

        let password = check_password(&mut errs, &self.password).and_then(|p| {
            if self.password_confirmation.as_deref() != Some(p.as_str()) {
                errs.add("password", "The password confirmation does not match.");
                None
            } else {
                Some(p)
            }
        });

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) => Ok(Registration {
                name,
                email,
                password,
            }),
            _ => Err(errs),
        }
    }
}

/// Response returned after login or refresh.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
}

impl TokenResponse {
    pub fn bearer(issued: IssuedToken, user: User) -> Self {
        Self {
            access_token: issued.token,
            token_type: "bearer",
            expires_in: issued.expires_in,
            user,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
