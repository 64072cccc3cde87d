//! Order rules shared by every storage backend.
//!
//! Stores call these while holding their write lock (file store) or inside
//! the transaction (Postgres store), so the checks and the write that
//! follows them are one atomic unit.

use std::collections::HashMap;

use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderDraft, OrderItem, OrderStatus, Product},
};

/// An order priced against the live catalog, plus the stock it consumes.
#[derive(Debug, Clone)]
pub struct PricedOrder {
    pub items: Vec<OrderItem>,
    pub total: i64,
    /// Quantity to take from each product, one entry per distinct product.
    pub reservations: Vec<(Uuid, i32)>,
}

/// Prices every line at the product's current `final_price` and checks
/// that the product is enabled and has enough stock for the whole order.
pub fn price_order(draft: &OrderDraft, catalog: &[Product]) -> AppResult<PricedOrder> {
    if draft.lines.is_empty() {
        return Err(AppError::BadRequest("items: must not be empty".into()));
    }

    let by_id: HashMap<Uuid, &Product> = catalog.iter().map(|p| (p.id, p)).collect();
    let mut reservations: Vec<(Uuid, i32)> = Vec::new();
    let mut items = Vec::with_capacity(draft.lines.len());
    let mut total: i64 = 0;

    for line in &draft.lines {
        if line.quantity < 1 {
            return Err(AppError::BadRequest("quantity: must be at least 1".into()));
        }
        let product = by_id.get(&line.product_id).ok_or_else(|| {
            AppError::BadRequest(format!("Product {} does not exist", line.product_id))
        })?;
        if !product.enabled {
            return Err(AppError::BadRequest(format!(
                "Product {} is not available",
                product.name
            )));
        }

        match reservations.iter_mut().find(|(id, _)| *id == product.id) {
            Some((_, qty)) => *qty = qty.checked_add(line.quantity).ok_or_else(too_large)?,
            None => reservations.push((product.id, line.quantity)),
        }

        total = product
            .final_price
            .checked_mul(i64::from(line.quantity))
            .and_then(|subtotal| total.checked_add(subtotal))
            .ok_or_else(too_large)?;
        items.push(OrderItem {
            product_id: product.id,
            name: product.name.clone(),
            product_url: line.product_url.clone(),
            quantity: line.quantity,
            color: line.color.clone(),
            size: line.size.clone(),
            price: product.final_price,
        });
    }

    for (product_id, wanted) in &reservations {
        if let Some(product) = by_id.get(product_id) {
            if product.stock < *wanted {
                return Err(AppError::BadRequest(format!(
                    "Insufficient stock for product {}",
                    product.name
                )));
            }
        }
    }

    Ok(PricedOrder {
        items,
        total,
        reservations,
    })
}

fn too_large() -> AppError {
    AppError::BadRequest("Order total is too large".into())
}

/// Who may cancel, and from which status.
///
/// Owners may cancel while the order is `Pending` or `Accepted`; admins may
/// cancel from any non-terminal status.
pub fn check_cancel(order: &Order, actor: &AuthUser) -> AppResult<()> {
    if !actor.can_access(order.user_id) {
        return Err(AppError::Forbidden);
    }

    let allowed = if actor.is_admin() {
        !order.status.is_terminal()
    } else {
        order.status.customer_cancellable()
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(format!(
            "Cannot cancel order when status is {}",
            order.status
        )))
    }
}

/// Stock an order holds, grouped per product.
///
/// Every order that is not `Cancelled` holds its items' stock.
pub fn held_stock(order: &Order) -> Vec<(Uuid, i32)> {
    let mut out: Vec<(Uuid, i32)> = Vec::new();
    for item in &order.items {
        match out.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, qty)) => *qty = qty.saturating_add(item.quantity),
            None => out.push((item.product_id, item.quantity)),
        }
    }
    out
}

/// What a status change does to the stock an order holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockMove {
    Keep,
    /// Entering `Cancelled`: hand the items back.
    Release,
    /// Leaving `Cancelled`: take the items again.
    Reserve,
}

pub fn stock_move(from: OrderStatus, to: OrderStatus) -> StockMove {
    match (from == OrderStatus::Cancelled, to == OrderStatus::Cancelled) {
        (false, true) => StockMove::Release,
        (true, false) => StockMove::Reserve,
        _ => StockMove::Keep,
    }
}

/// Checks that reopening a cancelled order can take its stock back.
/// Products deleted since the order was placed are skipped.
pub fn check_reserve(held: &[(Uuid, i32)], catalog: &[Product]) -> AppResult<()> {
    for (product_id, wanted) in held {
        if let Some(product) = catalog.iter().find(|p| p.id == *product_id) {
            if product.stock < *wanted {
                return Err(AppError::BadRequest(format!(
                    "Insufficient stock for product {}",
                    product.name
                )));
            }
        }
    }
    Ok(())
}
