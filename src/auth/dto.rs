use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::jwt::AccessToken;
use crate::errors::AuthError;

pub const MIN_PASSWORD_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn check_email(field: &'static str, email: &str) -> Result<(), AuthError> {
    if email.is_empty() {
        return Err(AuthError::validation(field, format!("The {} field is required.", field.replace('_', " "))));
    }
    if !is_valid_email(email) {
        return Err(AuthError::validation(
            field,
            format!("The {} field must be a valid email address.", field.replace('_', " ")),
        ));
    }
    Ok(())
}

fn check_new_password(password: &str, confirmation: &str) -> Result<(), AuthError> {
    if password.is_empty() {
        return Err(AuthError::validation("password", "The password field is required."));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::validation(
            "password",
            format!("The password field must be at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    if password != confirmation {
        return Err(AuthError::validation(
            "password",
            "The password field confirmation does not match.",
        ));
    }
    Ok(())
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

impl RegisterRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.email = normalize_email(&self.email);
        check_email("email", &self.email)?;
        check_new_password(&self.password, &self.password_confirmation)?;
        Ok(self)
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl LoginRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.email = normalize_email(&self.email);
        check_email("email", &self.email)?;
        if self.password.is_empty() {
            return Err(AuthError::validation("password", "The password field is required."));
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    #[serde(default)]
    pub email: String,
}

impl ForgotPasswordRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.email = normalize_email(&self.email);
        check_email("email", &self.email)?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
}

impl ResetPasswordRequest {
    pub fn validate(mut self) -> Result<Self, AuthError> {
        self.token = self.token.trim().to_string();
        if self.token.is_empty() {
            return Err(AuthError::validation("token", "The token field is required."));
        }
        check_new_password(&self.password, &self.password_confirmation)?;
        Ok(self)
    }
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: AccessToken,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}
