//! Persistence capability shared by the file store and the Postgres store.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::AppResult,
    middleware::auth::AuthUser,
    models::{
        Order, OrderDraft, OrderStatus, Product, ProductPatch, ProfilePatch, Review, ReviewPatch,
        Settings, SettingsPatch, User,
    },
};

pub mod file;
pub mod postgres;

pub use file::FileStore;
pub use postgres::PostgresStore;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Returns the global settings, creating the defaults on first read.
    async fn settings(&self) -> AppResult<Settings>;
    async fn update_settings(&self, patch: SettingsPatch) -> AppResult<Settings>;

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    /// Fails with `Conflict` when the email is taken.
    async fn insert_user(&self, user: User) -> AppResult<User>;
    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> AppResult<User>;

    /// All products, or those matching `query` (see `Product::matches`).
    async fn list_products(&self, query: Option<&str>) -> AppResult<Vec<Product>>;
    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>>;
    async fn insert_product(&self, product: Product) -> AppResult<Product>;
    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> AppResult<Product>;
    /// Fails with `NotFound` when the product is absent.
    async fn delete_product(&self, id: Uuid) -> AppResult<()>;

    /// Prices the draft against the live catalog, reserves stock, assigns the
    /// next order number and stores the order, all atomically.
    async fn place_order(&self, draft: OrderDraft) -> AppResult<Order>;
    async fn find_order(&self, id: &str) -> AppResult<Option<Order>>;
    /// Newest first.
    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>>;
    /// Newest first.
    async fn list_orders(&self) -> AppResult<Vec<Order>>;
    /// Applies `policy::check_cancel`, then puts every item back in stock.
    async fn cancel_order(&self, id: &str, actor: &AuthUser) -> AppResult<Order>;
    /// Administrative override with no transition rules. Entering `Cancelled`
    /// releases the order's stock and leaving it takes the stock again.
    async fn set_order_status(&self, id: &str, status: OrderStatus) -> AppResult<Order>;

    /// Fails with `Conflict` when the author already reviewed the product.
    async fn insert_review(&self, review: Review) -> AppResult<Review>;
    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>>;
    /// Newest first.
    async fn list_reviews_for_product(&self, product_id: Uuid) -> AppResult<Vec<Review>>;
    async fn update_review(&self, id: Uuid, patch: ReviewPatch) -> AppResult<Review>;
    async fn delete_review(&self, id: Uuid) -> AppResult<()>;
}

/// Escapes `%`, `_` and `\` so `query` matches literally inside a LIKE pattern.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for ch in query.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}
