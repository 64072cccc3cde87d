use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::models::{Product, ProductDraft, ProductPatch};

#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(range(min = 0i64, max = 100000000000i64, message = "must be between 0 and 100000000000"))]
    pub original_price: i64,
    #[serde(default)]
    #[validate(range(max = 100, message = "must be between 0 and 100"))]
    pub discount: u8,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[validate(range(min = 0, max = 1000000000, message = "must be between 0 and 1000000000"))]
    pub stock: Option<i32>,
    pub enabled: Option<bool>,
}

impl From<CreateProductRequest> for ProductDraft {
    fn from(req: CreateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            original_price: req.original_price,
            discount: req.discount,
            images: req.images,
            colors: req.colors,
            sizes: req.sizes,
            stock: req.stock.unwrap_or(0),
            enabled: req.enabled.unwrap_or(true),
        }
    }
}

/// Partial update. `finalPrice` is not accepted; it is always derived.
#[derive(Debug, Default, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, message = "must not be empty"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0i64, max = 100000000000i64, message = "must be between 0 and 100000000000"))]
    pub original_price: Option<i64>,
    #[validate(range(max = 100, message = "must be between 0 and 100"))]
    pub discount: Option<u8>,
    pub images: Option<Vec<String>>,
    pub colors: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    #[validate(range(min = 0, max = 1000000000, message = "must be between 0 and 1000000000"))]
    pub stock: Option<i32>,
    pub enabled: Option<bool>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(req: UpdateProductRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            original_price: req.original_price,
            discount: req.discount,
            images: req.images,
            colors: req.colors,
            sizes: req.sizes,
            stock: req.stock,
            enabled: req.enabled,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductQuery {
    /// Matches name, description or any color, case-insensitively.
    pub q: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ProductList {
    #[schema(value_type = Vec<Product>)]
    pub items: Vec<Product>,
}
