use std::sync::LazyLock;

use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::Utc;
use password_hash::rand_core::OsRng;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::auth::{
        LoginRequest, LoginResponse, RegisterRequest, RegisteredUser, SendOtpRequest,
        UpdateProfileRequest, UserProfile,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{ProfilePatch, Role, User},
    otp::{DeliveryOutcome, OtpPolicy},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Verified against when the email is unknown so both login failures cost
/// one argon2 run.
static DUMMY_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("not-a-real-password").ok());

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string())
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<RegisteredUser>> {
    payload.validate()?;
    let RegisterRequest {
        email,
        password,
        name,
        phone,
        address,
        otp,
    } = payload;
    let email = email.trim().to_string();

    let settings = state.store.settings().await?;
    if settings.email_verification_enabled {
        let code = otp.as_deref().map(str::trim).unwrap_or_default();
        if code.is_empty() || !state.otp.verify(&email, code, Utc::now()) {
            tracing::info!(email = %email, "registration refused: invalid otp");
            return Err(AppError::InvalidOtp);
        }
    }

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let role = if email == state.admin_email.as_ref() {
        Role::Admin
    } else {
        Role::User
    };

    let user = User {
        id: Uuid::new_v4(),
        email,
        password_hash: hash_password(&password)?,
        name,
        role,
        phone: phone.filter(|p| !p.is_empty()),
        address: address.filter(|a| !a.is_empty()),
    };
    let user = state.store.insert_user(user).await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user registered");
    Ok(ApiResponse::success(
        "User registered",
        RegisteredUser { user_id: user.id },
        Some(Meta::empty()),
    ))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    payload.validate()?;
    let LoginRequest { email, password } = payload;
    let user = match state.store.find_user_by_email(email.trim()).await? {
        Some(u) => u,
        None => {
            if let Some(parsed) = DUMMY_HASH.as_deref().and_then(|h| PasswordHash::new(h).ok()) {
                let _ = Argon2::default().verify_password(password.as_bytes(), &parsed);
            }
            return Err(AppError::Unauthorized("Invalid email or password".into()));
        }
    };

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;

    let argon2 = Argon2::default();
    if argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_err()
    {
        tracing::info!(user_id = %user.id, "login refused");
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }

    let token = state.tokens.issue(&user)?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token,
            user: user.into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn current_user(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<UserProfile>> {
    let stored = state
        .store
        .find_user(user.user_id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Ok", stored.into(), Some(Meta::empty())))
}

/// Self-service profile edit. Role, email and password are not reachable here.
pub async fn update_profile(
    state: &AppState,
    user: &AuthUser,
    payload: UpdateProfileRequest,
) -> AppResult<ApiResponse<UserProfile>> {
    payload.validate()?;
    let patch = ProfilePatch {
        name: payload.name,
        phone: payload.phone,
        address: payload.address,
    };
    let updated = state.store.update_profile(user.user_id, patch).await?;
    tracing::info!(user_id = %updated.id, "profile updated");
    Ok(ApiResponse::success(
        "Profile updated",
        updated.into(),
        Some(Meta::empty()),
    ))
}

pub async fn send_otp(
    state: &AppState,
    payload: SendOtpRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    payload.validate()?;
    let email = payload.email.trim().to_string();

    let settings = state.store.settings().await?;
    if !settings.email_verification_enabled {
        return Err(AppError::BadRequest(
            "Email verification is disabled".into(),
        ));
    }

    let code = match state
        .otp
        .issue(&email, OtpPolicy::from(&settings), Utc::now())
    {
        Ok(code) => code,
        Err(err) => {
            tracing::info!(email = %email, reason = %err, "otp refused");
            return Err(err);
        }
    };

    let outcome = state
        .otp_sender
        .send(&settings.otp_api_url, &email, &code)
        .await
        .map_err(AppError::Delivery)?;

    tracing::info!(email = %email, outcome = ?outcome, "otp issued");
    let message = match outcome {
        DeliveryOutcome::Confirmed => "OTP sent successfully",
        DeliveryOutcome::Accepted => "OTP sent",
    };
    Ok(ApiResponse::success(
        message,
        json!({ "email": email }),
        Some(Meta::empty()),
    ))
}
