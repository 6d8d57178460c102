use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routes::user::model::User;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub email_confirmed: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub roles: Vec<String>,
}

impl UserDto {
    pub fn from_user(user: &User, roles: Vec<String>) -> Self {
        UserDto {
            id: user.id,
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            phone: user.phone.clone(),
            is_active: user.is_active,
            email_confirmed: user.email_confirmed,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
            updated_at: user.updated_at,
            roles,
        }
    }
}

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_NAME_LEN: usize = 100;

pub fn validate_email(email: &str, errors: &mut Vec<String>) {
    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if !well_formed {
        errors.push("Email address is not valid".into());
    }
}

pub fn validate_password_pair(password: &str, confirm: &str, errors: &mut Vec<String>) {
    if password.len() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        ));
    }
    if password != confirm {
        errors.push("Password and confirmation do not match".into());
    }
}

pub fn validate_name(value: &str, field: &str, errors: &mut Vec<String>) {
    if value.trim().is_empty() {
        errors.push(format!("{field} is required"));
    } else if value.len() > MAX_NAME_LEN {
        errors.push(format!("{field} must be at most {MAX_NAME_LEN} characters"));
    }
}

impl RegisterRequest {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        validate_email(&self.email, &mut errors);
        validate_password_pair(&self.password, &self.confirm_password, &mut errors);
        validate_name(&self.first_name, "First name", &mut errors);
        validate_name(&self.last_name, "Last name", &mut errors);
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            email: "jane.doe@example.com".into(),
            password: "hunter22".into(),
            confirm_password: "hunter22".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            phone: None,
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(request().validate().is_empty());
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let mut req = request();
        req.confirm_password = "hunter23".into();
        let errors = req.validate();
        assert_eq!(errors, vec!["Password and confirmation do not match"]);
    }

    #[test]
    fn short_password_is_rejected() {
        let mut req = request();
        req.password = "abc".into();
        req.confirm_password = "abc".into();
        assert!(!req.validate().is_empty());
    }

    #[test]
    fn malformed_email_is_rejected() {
        for email in ["", "no-at-sign", "@nodomain", "a@b"] {
            let mut req = request();
            req.email = email.into();
            assert!(!req.validate().is_empty(), "accepted {email:?}");
        }
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut req = request();
        req.first_name = "  ".into();
        assert!(req.validate().iter().any(|e| e.contains("First name")));
    }
}
