use validator::Validate;

use crate::{
    dto::orders::{CreateOrderRequest, OrderList, UpdateOrderStatusRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderDraft, OrderLine},
    response::{ApiResponse, Meta},
    state::AppState,
};

/// Places an order for the caller. Prices and stock come from the live
/// catalog, see `policy::price_order`.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<Order>> {
    payload.validate()?;

    for item in payload.items.iter().filter(|i| i.price.is_some()) {
        tracing::debug!(
            product_id = %item.product_id,
            client_price = item.price,
            "ignoring client-supplied price"
        );
    }

    let draft = OrderDraft {
        user_id: user.user_id,
        customer_name: payload.customer_name.trim().to_string(),
        customer_phone: payload.customer_phone.trim().to_string(),
        customer_address: payload.customer_address.trim().to_string(),
        lines: payload.items.iter().map(OrderLine::from).collect(),
    };
    let order = state.store.place_order(draft).await?;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %order.id,
        total = order.total,
        items = order.items.len(),
        "order placed"
    );
    Ok(ApiResponse::success(
        "Order placed",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_orders(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<OrderList>> {
    let items = state.store.list_orders_for_user(user.user_id).await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<Order>> {
    let order = state.store.find_order(id).await?.ok_or(AppError::NotFound)?;
    if !user.can_access(order.user_id) {
        return Err(AppError::Forbidden);
    }
    Ok(ApiResponse::success("OK", order, Some(Meta::empty())))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: &str,
) -> AppResult<ApiResponse<Order>> {
    let order = state.store.cancel_order(id, user).await?;
    tracing::info!(
        user_id = %user.user_id,
        order_id = %order.id,
        admin = user.is_admin(),
        "order cancelled"
    );
    Ok(ApiResponse::success(
        "Order cancelled",
        order,
        Some(Meta::empty()),
    ))
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let items = state.store.list_orders().await?;
    let meta = Meta::total(items.len());
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

/// Administrative override: any status may be set from any status.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;
    let order = state.store.set_order_status(id, payload.status).await?;

    tracing::info!(
        user_id = %user.user_id,
        order_id = %order.id,
        status = %order.status,
        "order status set"
    );
    Ok(ApiResponse::success(
        "Order updated",
        order,
        Some(Meta::empty()),
    ))
}
