use std::convert::Infallible;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::{debug, warn};

use super::{cookies::expired_cookie, repo_types::User};
use crate::{error::AppError, state::AppState};

/// Token from the auth cookie, else from `Authorization: Bearer`.
pub fn token_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let from_cookie = CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    if from_cookie.is_some() {
        return from_cookie;
    }

    let auth = headers.get(AUTHORIZATION)?.to_str().ok()?;
    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Whatever token the client sent, verified or not.
pub struct PresentedToken(pub Option<String>);

#[async_trait]
impl FromRequestParts<AppState> for PresentedToken {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(PresentedToken(token_from_headers(
            &parts.headers,
            &state.config.cookie.name,
        )))
    }
}

/// Authenticated caller: resolved user plus the token that proved it.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

/// Auth failure that also clears the cookie when the token was bad.
pub struct AuthRejection {
    error: AppError,
    clear: Option<Cookie<'static>>,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self.clear {
            Some(cookie) => (CookieJar::new().add(cookie), self.error).into_response(),
            None => self.error.into_response(),
        }
    }
}

impl From<AppError> for AuthRejection {
    fn from(error: AppError) -> Self {
        Self { error, clear: None }
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie_cfg = &state.config.cookie;
        let token = token_from_headers(&parts.headers, &cookie_cfg.name)
            .ok_or(AppError::AuthenticationRequired)?;

        match state.auth.get_user_by_token(&token).await? {
            Some(user) => Ok(AuthUser { user, token }),
            None => {
                debug!("presented token did not resolve");
                Err(AuthRejection {
                    error: AppError::InvalidOrExpiredToken,
                    clear: Some(expired_cookie(cookie_cfg)),
                })
            }
        }
    }
}

/// Never rejects; `None` when there is no usable token.
pub struct OptionalAuthUser(pub Option<AuthUser>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = token_from_headers(&parts.headers, &state.config.cookie.name) else {
            return Ok(OptionalAuthUser(None));
        };
        match state.auth.get_user_by_token(&token).await {
            Ok(user) => Ok(OptionalAuthUser(user.map(|user| AuthUser { user, token }))),
            Err(e) => {
                warn!(error = %e, "optional auth lookup failed");
                Ok(OptionalAuthUser(None))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::COOKIE, HeaderValue};

    fn headers(pairs: &[(axum::http::HeaderName, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (name, value) in pairs {
            h.append(name.clone(), HeaderValue::from_str(value).unwrap());
        }
        h
    }

    #[test]
    fn reads_bearer_header() {
        let h = headers(&[(AUTHORIZATION, "Bearer abc.def")]);
        assert_eq!(token_from_headers(&h, "auth-token").as_deref(), Some("abc.def"));
    }

    #[test]
    fn cookie_wins_over_header() {
        let h = headers(&[
            (AUTHORIZATION, "Bearer from-header"),
            (COOKIE, "other=1; auth-token=from-cookie"),
        ]);
        assert_eq!(
            token_from_headers(&h, "auth-token").as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn empty_cookie_falls_back_to_header() {
        let h = headers(&[(AUTHORIZATION, "Bearer tok"), (COOKIE, "auth-token=")]);
        assert_eq!(token_from_headers(&h, "auth-token").as_deref(), Some("tok"));
    }

    #[test]
    fn other_schemes_are_ignored() {
        let h = headers(&[(AUTHORIZATION, "Basic dXNlcjpwYXNz")]);
        assert_eq!(token_from_headers(&h, "auth-token"), None);
        assert_eq!(token_from_headers(&HeaderMap::new(), "auth-token"), None);
    }
}
