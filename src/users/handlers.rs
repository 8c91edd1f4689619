use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{ChangePasswordRequest, ProfileResponse, UpdateProfileRequest, UserResponse};
use crate::{
    auth::{dto::MessageResponse, dto::PublicUser, extractors::AuthUser},
    error::{AppError, AppResult},
    state::AppState,
    validation::{validate, AppJson},
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/password", post(change_password))
        .route("/user/profile", get(get_profile).put(update_profile))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user.id))]
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    validate(&payload)?;
    state
        .auth
        .change_password(
            auth.user.id,
            &payload.current_password,
            &payload.new_password,
            Some(&auth.token),
        )
        .await?;
    Ok(Json(MessageResponse {
        message: "Password changed successfully",
    }))
}

#[instrument(skip(state, auth), fields(user_id = %auth.user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> AppResult<Json<ProfileResponse>> {
    let profile = state
        .credentials
        .find_profile(auth.user.id)
        .await?
        .ok_or(AppError::NotFound("Profile"))?;
    let stats = state.resources.summary_for(auth.user.id).await?;

    Ok(Json(ProfileResponse {
        user: PublicUser::from(&auth.user),
        profile,
        stats,
    }))
}

#[instrument(skip(state, auth, payload), fields(user_id = %auth.user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    AppJson(payload): AppJson<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    validate(&payload)?;
    let user = state
        .auth
        .update_profile(auth.user.id, payload.into())
        .await?;
    info!("profile saved");
    Ok(Json(UserResponse {
        user: PublicUser::from(&user),
    }))
}
