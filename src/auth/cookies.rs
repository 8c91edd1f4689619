use axum_extra::extract::cookie::{Cookie, SameSite};
use time::{Duration, OffsetDateTime};

use crate::config::CookieConfig;

/// HTTP-only cookie carrying the session token until `expires_at`.
pub fn session_cookie(cfg: &CookieConfig, token: String, expires_at: OffsetDateTime) -> Cookie<'static> {
    Cookie::build((cfg.name.clone(), token))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .expires(expires_at)
        .build()
}

/// Empty, already expired cookie that makes the browser drop the token.
pub fn expired_cookie(cfg: &CookieConfig) -> Cookie<'static> {
    Cookie::build((cfg.name.clone(), String::new()))
        .http_only(true)
        .secure(cfg.secure)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}
