use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            LoginRequest, LoginResponse, RegisterRequest, RegisteredUser, SendOtpRequest,
            UpdateProfileRequest, UserProfile,
        },
        orders::{CreateOrderItem, CreateOrderRequest, OrderList, UpdateOrderStatusRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
        reviews::{CreateReviewRequest, ReviewList, UpdateReviewRequest},
        settings::UpdateSettingsRequest,
    },
    models::{Order, OrderItem, OrderStatus, Product, Review, Role, Settings},
    response::{ApiResponse, Meta},
    routes::{admin, auth, health, orders, products, reviews, settings},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::update_user,
        auth::send_otp,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_product_reviews,
        reviews::create_review,
        reviews::update_review,
        reviews::delete_review,
        orders::create_order,
        orders::list_orders,
        orders::get_order,
        orders::cancel_order,
        admin::list_all_orders,
        admin::update_order_status,
        settings::get_settings,
        settings::update_settings
    ),
    components(
        schemas(
            Role,
            UserProfile,
            Product,
            Order,
            OrderItem,
            OrderStatus,
            Review,
            Settings,
            RegisterRequest,
            RegisteredUser,
            LoginRequest,
            LoginResponse,
            UpdateProfileRequest,
            SendOtpRequest,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateOrderRequest,
            CreateOrderItem,
            UpdateOrderStatusRequest,
            OrderList,
            CreateReviewRequest,
            UpdateReviewRequest,
            ReviewList,
            UpdateSettingsRequest,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Order>,
            ApiResponse<OrderList>,
            ApiResponse<Review>,
            ApiResponse<ReviewList>,
            ApiResponse<Settings>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Accounts, sessions and OTP"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Reviews", description = "Product reviews"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Settings", description = "Storefront settings"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
