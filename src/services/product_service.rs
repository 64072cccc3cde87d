use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::products::{CreateProductRequest, ProductList, ProductQuery, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, ProductDraft},
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let search = query.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let items = state.store.list_products(search).await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = state
        .store
        .find_product(id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;

    let product = Product::from_draft(Uuid::new_v4(), ProductDraft::from(payload));
    let product = state.store.insert_product(product).await?;

    tracing::info!(
        user_id = %user.user_id,
        product_id = %product.id,
        final_price = product.final_price,
        "product created"
    );
    Ok(ApiResponse::success(
        "Product created",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    payload.validate()?;

    let product = state.store.update_product(id, payload.into()).await?;

    tracing::info!(
        user_id = %user.user_id,
        product_id = %product.id,
        final_price = product.final_price,
        "product updated"
    );
    Ok(ApiResponse::success(
        "Updated",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    ensure_admin(user)?;
    state.store.delete_product(id).await?;
    tracing::info!(user_id = %user.user_id, product_id = %id, "product deleted");
    Ok(())
}
