use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const ORDER_ID_PREFIX: &str = "C10-ORD-";
pub const FIRST_ORDER_NUMBER: i64 = 1001;
pub const SETTINGS_ID: &str = "global";
pub const DEFAULT_OTP_API_URL: &str = "https://script.google.com/macros/s/AKfycbyLHd4SIL2D4NApu3cEP3DIMDFjAbgd2nrSjVcEFSJOn4elC-CKeSNNRP7KOwHOxPSO/exec";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(format!("unknown role {other}")),
        }
    }
}

/// Stored account. Never serialized to callers directly, see `dto::auth::UserProfile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl User {
    pub fn apply(&mut self, patch: ProfilePatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(phone) = patch.phone {
            self.phone = Some(phone);
        }
        if let Some(address) = patch.address {
            self.address = Some(address);
        }
    }
}

/// `round(original * (1 - discount / 100))`, halves rounded away from zero.
///
/// Computed in `i128`; the result never exceeds `original_price` in magnitude,
/// so the narrowing back to `i64` is lossless.
pub fn final_price(original_price: i64, discount: u8) -> i64 {
    let scaled = i128::from(original_price) * i128::from(100 - discount.min(100));
    let (quotient, remainder) = (scaled / 100, scaled % 100);
    let rounded = if remainder.abs() * 2 >= 100 {
        quotient + scaled.signum()
    } else {
        quotient
    };
    rounded as i64
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub original_price: i64,
    pub discount: u8,
    pub final_price: i64,
    pub images: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub stock: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub name: String,
    pub description: String,
    pub original_price: i64,
    pub discount: u8,
    pub images: Vec<String>,
    pub colors: Vec<String>,
    pub sizes: Vec<String>,
    pub stock: i32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub original_price: Option<i64>,
    pub discount: Option<u8>,
    pub images: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub stock: Option<i32>,
    pub enabled: Option<bool>,
}

impl Product {
    pub fn from_draft(id: Uuid, draft: ProductDraft) -> Self {
        Self {
            id,
            final_price: final_price(draft.original_price, draft.discount),
            name: draft.name,
            description: draft.description,
            original_price: draft.original_price,
            discount: draft.discount,
            images: draft.images,
            colors: draft.colors,
            sizes: draft.sizes,
            stock: draft.stock,
            enabled: draft.enabled,
        }
    }

    /// Merges `patch` and re-derives `final_price` from the merged price and discount.
    pub fn apply(&mut self, patch: ProductPatch) {
        let reprice = patch.original_price.is_some() || patch.discount.is_some();
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(original_price) = patch.original_price {
            self.original_price = original_price;
        }
        if let Some(discount) = patch.discount {
            self.discount = discount;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(colors) = patch.colors {
            self.colors = colors;
        }
        if let Some(sizes) = patch.sizes {
            self.sizes = sizes;
        }
        if let Some(stock) = patch.stock {
            self.stock = stock;
        }
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if reprice {
            self.final_price = final_price(self.original_price, self.discount);
        }
    }

    /// Case-insensitive substring match on name, description and colors.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.name.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self
                .colors
                .iter()
                .any(|c| c.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum OrderStatus {
    Pending,
    Accepted,
    #[serde(rename = "Out for Delivery")]
    OutForDelivery,
    Delivered,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Failed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Accepted => "Accepted",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Failed => "Failed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }

    /// Whether a customer (not an admin) may still cancel from this status.
    pub fn customer_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Accepted)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub product_url: Option<String>,
    pub quantity: i32,
    pub color: String,
    pub size: String,
    pub price: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub items: Vec<OrderItem>,
    pub total: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

pub fn order_id(number: i64) -> String {
    format!("{ORDER_ID_PREFIX}{number}")
}

pub fn order_number(id: &str) -> Option<i64> {
    id.strip_prefix(ORDER_ID_PREFIX)?.parse().ok()
}

/// A requested line before it is priced against the live catalog.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub color: String,
    pub size: String,
    pub product_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub user_id: Uuid,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub product_id: Uuid,
    pub rating: u8,
    pub comment: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ReviewPatch {
    pub rating: Option<u8>,
    pub comment: Option<String>,
}

impl Review {
    pub fn apply(&mut self, patch: ReviewPatch) {
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        if let Some(comment) = patch.comment {
            self.comment = comment;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub id: String,
    pub email_verification_enabled: bool,
    pub otp_api_url: String,
    pub otp_resend_interval_seconds: u32,
    pub otp_max_per_email_per_hour: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            id: SETTINGS_ID.to_string(),
            email_verification_enabled: false,
            otp_api_url: DEFAULT_OTP_API_URL.to_string(),
            otp_resend_interval_seconds: 60,
            otp_max_per_email_per_hour: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub email_verification_enabled: Option<bool>,
    pub otp_api_url: Option<String>,
    pub otp_resend_interval_seconds: Option<u32>,
    pub otp_max_per_email_per_hour: Option<u32>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(enabled) = patch.email_verification_enabled {
            self.email_verification_enabled = enabled;
        }
        if let Some(url) = patch.otp_api_url {
            self.otp_api_url = url;
        }
        if let Some(interval) = patch.otp_resend_interval_seconds {
            self.otp_resend_interval_seconds = interval;
        }
        if let Some(max) = patch.otp_max_per_email_per_hour {
            self.otp_max_per_email_per_hour = max.max(1);
        }
    }
}
