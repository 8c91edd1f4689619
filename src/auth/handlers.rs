use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, instrument, warn};

use super::{
    cookies::{expired_cookie, session_cookie},
    dto::{AuthResponse, LoginRequest, MeResponse, MessageResponse, PublicUser, RegisterRequest},
    extractors::{AuthUser, PresentedToken},
};
use crate::{
    error::AppResult,
    state::AppState,
    validation::{validate, AppJson},
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
}

#[instrument(skip(state, jar, payload))]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(mut payload): AppJson<RegisterRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    payload.normalize();
    validate(&payload)?;

    let outcome = state.auth.register(payload.into()).await?;
    let cookie = session_cookie(
        &state.config.cookie,
        outcome.token.clone(),
        outcome.expires_at,
    );

    info!(user_id = %outcome.user.id, "register response issued");
    Ok((jar.add(cookie), Json(AuthResponse::from(&outcome))))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    AppJson(mut payload): AppJson<LoginRequest>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    payload.email = payload.email.trim().to_string();
    validate(&payload)?;

    let outcome = state.auth.login(&payload.email, &payload.password).await?;
    let cookie = session_cookie(
        &state.config.cookie,
        outcome.token.clone(),
        outcome.expires_at,
    );
    Ok((jar.add(cookie), Json(AuthResponse::from(&outcome))))
}

/// Always succeeds and always clears the cookie.
#[instrument(skip(state, jar, token))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    PresentedToken(token): PresentedToken,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(token) = token {
        if let Err(e) = state.auth.logout(&token).await {
            warn!(error = %e, "logout could not remove session");
        }
    }
    (
        jar.add(expired_cookie(&state.config.cookie)),
        Json(MessageResponse {
            message: "Logged out successfully",
        }),
    )
}

#[instrument(skip(auth), fields(user_id = %auth.user.id))]
pub async fn get_me(auth: AuthUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: PublicUser::from(&auth.user),
    })
}
