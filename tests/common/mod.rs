#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use noir_storefront::{
    middleware::auth::{AuthUser, TokenService},
    models::{OrderLine, Product, ProductDraft, Role, User},
    otp::{DeliveryOutcome, OtpSender},
    services::auth_service::hash_password,
    state::AppState,
    storage::{FileStore, Storage},
};
use uuid::Uuid;

pub const SECRET: &str = "test-secret";
pub const ADMIN_EMAIL: &str = "admin@example.com";

/// Records every code it is asked to deliver.
#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingSender {
    pub fn last_code(&self, email: &str) -> Option<String> {
        let sent = self.sent.lock().unwrap();
        sent.iter()
            .rev()
            .find(|(e, _)| e == email)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl OtpSender for RecordingSender {
    async fn send(
        &self,
        _endpoint: &str,
        email: &str,
        code: &str,
    ) -> anyhow::Result<DeliveryOutcome> {
        if self.fail {
            anyhow::bail!("delivery endpoint unreachable");
        }
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), code.to_string()));
        Ok(DeliveryOutcome::Confirmed)
    }
}

pub fn state_with(store: Arc<dyn Storage>, sender: Arc<RecordingSender>) -> AppState {
    AppState::new(store, TokenService::new(SECRET, 24), sender, ADMIN_EMAIL)
}

pub fn test_state() -> (AppState, Arc<RecordingSender>) {
    let sender = Arc::new(RecordingSender::default());
    let state = state_with(Arc::new(FileStore::in_memory()), sender.clone());
    (state, sender)
}

pub fn principal(name: &str, role: Role) -> AuthUser {
    AuthUser {
        user_id: Uuid::new_v4(),
        email: format!("{}@example.com", name.to_lowercase()),
        name: name.to_string(),
        role,
    }
}

/// Stores an account for `principal` so login-dependent paths can find it.
pub async fn store_user(state: &AppState, principal: &AuthUser, password: &str) -> User {
    let user = User {
        id: principal.user_id,
        email: principal.email.clone(),
        password_hash: hash_password(password).unwrap(),
        name: principal.name.clone(),
        role: principal.role,
        phone: None,
        address: None,
    };
    state.store.insert_user(user).await.unwrap()
}

pub async fn add_product(
    state: &AppState,
    name: &str,
    price: i64,
    discount: u8,
    stock: i32,
) -> Product {
    let draft = ProductDraft {
        name: name.to_string(),
        description: format!("{name} description"),
        original_price: price,
        discount,
        images: vec![],
        colors: vec!["Black".into()],
        sizes: vec!["M".into()],
        stock,
        enabled: true,
    };
    state
        .store
        .insert_product(Product::from_draft(Uuid::new_v4(), draft))
        .await
        .unwrap()
}

pub fn line(product_id: Uuid, quantity: i32) -> OrderLine {
    OrderLine {
        product_id,
        quantity,
        color: "Black".into(),
        size: "M".into(),
        product_url: None,
    }
}
