use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    middleware::auth::TokenService,
    otp::{OtpLimiter, OtpSender},
    storage::Storage,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Storage>,
    pub tokens: Arc<TokenService>,
    pub otp: Arc<OtpLimiter>,
    pub otp_sender: Arc<dyn OtpSender>,
    /// Registering with this address yields an admin account.
    pub admin_email: Arc<str>,
}

impl FromRef<AppState> for Arc<TokenService> {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl AppState {
    pub fn new(
        store: Arc<dyn Storage>,
        tokens: TokenService,
        otp_sender: Arc<dyn OtpSender>,
        admin_email: &str,
    ) -> Self {
        Self {
            store,
            tokens: Arc::new(tokens),
            otp: Arc::new(OtpLimiter::new()),
            otp_sender,
            admin_email: Arc::from(admin_email),
        }
    }
}
