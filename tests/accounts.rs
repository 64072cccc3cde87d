mod common;

use std::sync::Arc;

use noir_storefront::{
    dto::{
        auth::{LoginRequest, RegisterRequest, SendOtpRequest, UpdateProfileRequest},
        settings::UpdateSettingsRequest,
    },
    error::AppError,
    models::Role,
    services::{auth_service, settings_service},
    state::AppState,
    storage::FileStore,
};

use common::{ADMIN_EMAIL, RecordingSender, principal, state_with, test_state};

fn registration(email: &str, otp: Option<String>) -> RegisterRequest {
    RegisterRequest {
        email: email.into(),
        password: "hunter22".into(),
        name: "Vera".into(),
        phone: Some("0812345678".into()),
        address: None,
        otp,
    }
}

async fn enable_verification(state: &AppState) {
    let admin = principal("Admin", Role::Admin);
    settings_service::update_settings(
        state,
        &admin,
        UpdateSettingsRequest {
            email_verification_enabled: Some(true),
            otp_resend_interval_seconds: Some(0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn register_then_login_returns_verifiable_token() {
    let (state, _) = test_state();

    let user_id = auth_service::register_user(&state, registration("vera@example.com", None))
        .await
        .unwrap()
        .data
        .unwrap()
        .user_id;

    let login = auth_service::login_user(
        &state,
        LoginRequest {
            email: "vera@example.com".into(),
            password: "hunter22".into(),
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();

    assert_eq!(login.user.id, user_id);
    assert_eq!(login.user.role, Role::User);
    let principal = state.tokens.authenticate(&login.token).unwrap();
    assert_eq!(principal.user_id, user_id);
    assert_eq!(principal.name, "Vera");
}

#[tokio::test]
async fn reserved_address_registers_as_admin() {
    let (state, _) = test_state();
    let id = auth_service::register_user(&state, registration(ADMIN_EMAIL, None))
        .await
        .unwrap()
        .data
        .unwrap()
        .user_id;

    let stored = state.store.find_user(id).await.unwrap().unwrap();
    assert_eq!(stored.role, Role::Admin);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let (state, _) = test_state();
    auth_service::register_user(&state, registration("vera@example.com", None))
        .await
        .unwrap();

    let err = auth_service::register_user(&state, registration("vera@example.com", None))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn malformed_email_is_rejected() {
    let (state, _) = test_state();
    let err = auth_service::register_user(&state, registration("not-an-email", None))
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert!(msg.starts_with("email")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn wrong_password_and_unknown_email_look_the_same() {
    let (state, _) = test_state();
    auth_service::register_user(&state, registration("vera@example.com", None))
        .await
        .unwrap();

    for (email, password) in [
        ("vera@example.com", "wrong"),
        ("nobody@example.com", "hunter22"),
    ] {
        let err = auth_service::login_user(
            &state,
            LoginRequest {
                email: email.into(),
                password: password.into(),
            },
        )
        .await
        .unwrap_err();
        match err {
            AppError::Unauthorized(msg) => assert_eq!(msg, "Invalid email or password"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}

#[tokio::test]
async fn verification_requires_the_delivered_code() {
    let (state, sender) = test_state();
    enable_verification(&state).await;

    let missing = auth_service::register_user(&state, registration("vera@example.com", None))
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::InvalidOtp));

    auth_service::send_otp(
        &state,
        SendOtpRequest {
            email: "vera@example.com".into(),
        },
    )
    .await
    .unwrap();
    let code = sender.last_code("vera@example.com").unwrap();

    let wrong = auth_service::register_user(
        &state,
        registration("vera@example.com", Some("000000".into())),
    )
    .await
    .unwrap_err();
    assert!(matches!(wrong, AppError::InvalidOtp));

    auth_service::register_user(&state, registration("vera@example.com", Some(code.clone())))
        .await
        .unwrap();

    // The code is single use.
    let again = auth_service::register_user(&state, registration("vera@example.com", Some(code)))
        .await
        .unwrap_err();
    assert!(matches!(again, AppError::InvalidOtp));
}

#[tokio::test]
async fn send_otp_refused_while_verification_disabled() {
    let (state, sender) = test_state();
    let err = auth_service::send_otp(
        &state,
        SendOtpRequest {
            email: "vera@example.com".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert!(sender.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn delivery_failure_keeps_the_quota_spent() {
    let sender = Arc::new(RecordingSender {
        fail: true,
        ..Default::default()
    });
    let state = state_with(Arc::new(FileStore::in_memory()), sender);
    enable_verification(&state).await;

    let err = auth_service::send_otp(
        &state,
        SendOtpRequest {
            email: "vera@example.com".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Delivery(_)));
    assert_eq!(state.otp.pending("vera@example.com").unwrap().send_count, 1);
}

#[tokio::test]
async fn profile_update_touches_only_profile_fields() {
    let (state, _) = test_state();
    let id = auth_service::register_user(&state, registration("vera@example.com", None))
        .await
        .unwrap()
        .data
        .unwrap()
        .user_id;
    let caller = state
        .tokens
        .authenticate(
            &state
                .tokens
                .issue(&state.store.find_user(id).await.unwrap().unwrap())
                .unwrap(),
        )
        .unwrap();

    let updated = auth_service::update_profile(
        &state,
        &caller,
        UpdateProfileRequest {
            name: Some("Vera Noir".into()),
            phone: None,
            address: Some("12 Rue Noire".into()),
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();

    assert_eq!(updated.name, "Vera Noir");
    assert_eq!(updated.phone.as_deref(), Some("0812345678"));
    assert_eq!(updated.address.as_deref(), Some("12 Rue Noire"));
    assert_eq!(updated.email, "vera@example.com");
    assert_eq!(updated.role, Role::User);

    let me = auth_service::current_user(&state, &caller)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(me.name, "Vera Noir");
}
