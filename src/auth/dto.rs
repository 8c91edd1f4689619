use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    repo_types::User,
    services::{AuthOutcome, Registration},
};
use crate::validation::{is_valid_username, Validate, ValidationReport};

const MAX_NAME_CHARS: usize = 50;
const MIN_PASSWORD_CHARS: usize = 6;

/// Request body for user registration.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl RegisterRequest {
    /// Trims identifiers and drops blank names. Case is kept as typed.
    pub fn normalize(&mut self) {
        self.email = self.email.trim().to_string();
        self.username = self.username.trim().to_string();
        self.first_name = trimmed_or_none(self.first_name.take());
        self.last_name = trimmed_or_none(self.last_name.take());
    }
}

fn trimmed_or_none(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Validate for RegisterRequest {
    fn validate(&self, report: &mut ValidationReport) {
        report.email("email", &self.email);
        if !is_valid_username(&self.username) {
            report.add_error(
                "username",
                "Username must be 3-20 characters of letters, numbers and underscores",
            );
        }
        report.min_chars("password", &self.password, MIN_PASSWORD_CHARS);
        if let Some(name) = &self.first_name {
            report.max_chars("firstName", name, MAX_NAME_CHARS);
        }
        if let Some(name) = &self.last_name {
            report.max_chars("lastName", name, MAX_NAME_CHARS);
        }
    }
}

impl From<RegisterRequest> for Registration {
    fn from(r: RegisterRequest) -> Self {
        Registration {
            email: r.email,
            username: r.username,
            password: r.password,
            first_name: r.first_name,
            last_name: r.last_name,
        }
    }
}

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    fn validate(&self, report: &mut ValidationReport) {
        report.email("email", &self.email);
        report.required("password", &self.password);
    }
}

/// User as returned to clients; never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_email_verified: bool,
    pub is_premium: bool,
    pub max_nodes: i32,
    pub max_tasks: i32,
    pub login_count: i32,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login: Option<OffsetDateTime>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            username: u.username.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            avatar_url: u.avatar_url.clone(),
            is_email_verified: u.is_email_verified,
            is_premium: u.is_premium,
            max_nodes: u.max_nodes,
            max_tasks: u.max_tasks,
            login_count: u.login_count,
            last_login: u.last_login,
            is_active: u.is_active,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Response returned after login or register.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: PublicUser,
    pub token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl From<&AuthOutcome> for AuthResponse {
    fn from(o: &AuthOutcome) -> Self {
        Self {
            user: PublicUser::from(&o.user),
            token: o.token.clone(),
            expires_at: o.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: PublicUser,
}
