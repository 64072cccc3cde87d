use validator::Validate;

use crate::{
    dto::settings::UpdateSettingsRequest,
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::Settings,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn get_settings(state: &AppState) -> AppResult<ApiResponse<Settings>> {
    let settings = state.store.settings().await?;
    Ok(ApiResponse::success("Settings", settings, Some(Meta::empty())))
}

pub async fn update_settings(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateSettingsRequest,
) -> AppResult<ApiResponse<Settings>> {
    ensure_admin(user)?;
    payload.validate()?;

    let settings = state.store.update_settings(payload.into()).await?;
    tracing::info!(
        user_id = %user.user_id,
        email_verification = settings.email_verification_enabled,
        resend_interval = settings.otp_resend_interval_seconds,
        max_per_hour = settings.otp_max_per_email_per_hour,
        "settings changed"
    );
    Ok(ApiResponse::success(
        "Settings updated",
        settings,
        Some(Meta::empty()),
    ))
}
