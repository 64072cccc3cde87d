use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::{Order, OrderLine, OrderStatus};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub customer_name: String,
    #[validate(length(min = 1, message = "is required"))]
    pub customer_phone: String,
    #[validate(length(min = 1, message = "is required"))]
    pub customer_address: String,
    #[validate(length(min = 1, message = "must not be empty"), nested)]
    pub items: Vec<CreateOrderItem>,
}

/// A cart line. `name` and `price` are accepted for compatibility with the
/// client's cart but ignored; both are read from the live catalog.
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub name: Option<String>,
    pub product_url: Option<String>,
    #[validate(range(min = 1, max = 10000, message = "must be between 1 and 10000"))]
    pub quantity: i32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
    pub price: Option<i64>,
}

impl From<&CreateOrderItem> for OrderLine {
    fn from(item: &CreateOrderItem) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            color: item.color.clone(),
            size: item.size.clone(),
            product_url: item.product_url.clone(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
