mod common;

use noir_storefront::{
    dto::orders::{CreateOrderItem, CreateOrderRequest, UpdateOrderStatusRequest},
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderDraft, OrderStatus, Role},
    services::order_service,
    state::AppState,
};
use uuid::Uuid;

use common::{add_product, line, principal, test_state};

fn draft(user: &AuthUser, lines: Vec<noir_storefront::models::OrderLine>) -> OrderDraft {
    OrderDraft {
        user_id: user.user_id,
        customer_name: user.name.clone(),
        customer_phone: "0812345678".into(),
        customer_address: "12 Rue Noire".into(),
        lines,
    }
}

fn request(items: Vec<CreateOrderItem>) -> CreateOrderRequest {
    CreateOrderRequest {
        customer_name: "Vera".into(),
        customer_phone: "0812345678".into(),
        customer_address: "12 Rue Noire".into(),
        items,
    }
}

fn item(product_id: Uuid, quantity: i32, price: Option<i64>) -> CreateOrderItem {
    CreateOrderItem {
        product_id,
        name: Some("whatever the cart said".into()),
        product_url: None,
        quantity,
        color: "Black".into(),
        size: "L".into(),
        price,
    }
}

async fn stock_of(state: &AppState, id: Uuid) -> i32 {
    state.store.find_product(id).await.unwrap().unwrap().stock
}

#[tokio::test]
async fn order_total_uses_live_final_price() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let hoodie = add_product(&state, "Hoodie", 4500, 10, 10).await;
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;

    let resp = order_service::create_order(
        &state,
        &vera,
        request(vec![item(hoodie.id, 2, Some(1)), item(tee.id, 1, None)]),
    )
    .await
    .unwrap();
    let order = resp.data.unwrap();

    assert_eq!(order.total, 4050 * 2 + 1500);
    assert_eq!(order.items[0].price, 4050);
    assert_eq!(order.items[0].name, "Hoodie");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.user_id, vera.user_id);
}

#[tokio::test]
async fn order_ids_are_sequential_from_1001() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;

    let first = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 1)]))
        .await
        .unwrap();
    let second = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 1)]))
        .await
        .unwrap();

    assert_eq!(first.id, "C10-ORD-1001");
    assert_eq!(second.id, "C10-ORD-1002");
}

#[tokio::test]
async fn placing_an_order_takes_stock_and_cancel_returns_it() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let pants = add_product(&state, "Pants", 3800, 5, 5).await;

    let order = state
        .store
        .place_order(draft(&vera, vec![line(pants.id, 2), line(pants.id, 1)]))
        .await
        .unwrap();
    assert_eq!(stock_of(&state, pants.id).await, 2);

    let cancelled = order_service::cancel_order(&state, &vera, &order.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, pants.id).await, 5);
}

#[tokio::test]
async fn insufficient_stock_leaves_nothing_behind() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let jacket = add_product(&state, "Jacket", 6500, 15, 3).await;

    let err = state
        .store
        .place_order(draft(&vera, vec![line(jacket.id, 2), line(jacket.id, 2)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, jacket.id).await, 3);
    assert!(state.store.list_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn unknown_or_disabled_products_are_rejected() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;
    state
        .store
        .update_product(
            tee.id,
            noir_storefront::models::ProductPatch {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let unknown = order_service::create_order(
        &state,
        &vera,
        request(vec![item(Uuid::new_v4(), 1, None)]),
    )
    .await
    .unwrap_err();
    assert!(matches!(unknown, AppError::BadRequest(_)));

    let disabled = order_service::create_order(&state, &vera, request(vec![item(tee.id, 1, None)]))
        .await
        .unwrap_err();
    assert!(matches!(disabled, AppError::BadRequest(_)));
}

#[tokio::test]
async fn empty_items_and_zero_quantity_fail_validation() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;

    let empty = order_service::create_order(&state, &vera, request(vec![]))
        .await
        .unwrap_err();
    assert!(matches!(empty, AppError::BadRequest(_)));

    let zero = order_service::create_order(&state, &vera, request(vec![item(tee.id, 0, None)]))
        .await
        .unwrap_err();
    assert!(matches!(zero, AppError::BadRequest(_)));
}

#[tokio::test]
async fn only_owner_or_admin_may_read_or_cancel() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let mallory = principal("Mallory", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;
    let order = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 1)]))
        .await
        .unwrap();

    let read = order_service::get_order(&state, &mallory, &order.id)
        .await
        .unwrap_err();
    assert!(matches!(read, AppError::Forbidden));
    let cancel = order_service::cancel_order(&state, &mallory, &order.id)
        .await
        .unwrap_err();
    assert!(matches!(cancel, AppError::Forbidden));

    assert!(order_service::get_order(&state, &admin, &order.id).await.is_ok());
    let missing = order_service::get_order(&state, &vera, "C10-ORD-9999")
        .await
        .unwrap_err();
    assert!(matches!(missing, AppError::NotFound));
}

#[tokio::test]
async fn customer_cannot_cancel_once_out_for_delivery() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;
    let order = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 1)]))
        .await
        .unwrap();

    order_service::update_order_status(
        &state,
        &admin,
        &order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::OutForDelivery,
        },
    )
    .await
    .unwrap();

    let err = order_service::cancel_order(&state, &vera, &order.id)
        .await
        .unwrap_err();
    match err {
        AppError::InvalidTransition(msg) => {
            assert_eq!(msg, "Cannot cancel order when status is Out for Delivery")
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let cancelled = order_service::cancel_order(&state, &admin, &order.id)
        .await
        .unwrap()
        .data
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, tee.id).await, 10);
}

#[tokio::test]
async fn cancelled_order_cannot_be_cancelled_again() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;
    let order = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 2)]))
        .await
        .unwrap();

    order_service::cancel_order(&state, &vera, &order.id)
        .await
        .unwrap();
    let err = order_service::cancel_order(&state, &admin, &order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidTransition(_)));
    assert_eq!(stock_of(&state, tee.id).await, 10);
}

#[tokio::test]
async fn admin_status_override_skips_steps_and_keeps_stock() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;
    let order = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 3)]))
        .await
        .unwrap();

    let delivered = order_service::update_order_status(
        &state,
        &admin,
        &order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Delivered,
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);

    let reopened = order_service::update_order_status(
        &state,
        &admin,
        &order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Pending,
        },
    )
    .await
    .unwrap()
    .data
    .unwrap();
    assert_eq!(reopened.status, OrderStatus::Pending);
    assert_eq!(stock_of(&state, tee.id).await, 7);

    let err = order_service::update_order_status(
        &state,
        &vera,
        &order.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Accepted,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

#[tokio::test]
async fn listings_are_scoped_and_newest_first() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let other = principal("Other", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;

    for user in [&vera, &other, &vera] {
        state
            .store
            .place_order(draft(user, vec![line(tee.id, 1)]))
            .await
            .unwrap();
    }

    let mine = order_service::list_orders(&state, &vera).await.unwrap();
    let ids: Vec<String> = mine.data.unwrap().items.into_iter().map(|o| o.id).collect();
    assert_eq!(ids, vec!["C10-ORD-1003", "C10-ORD-1001"]);

    let all = order_service::list_all_orders(&state, &admin).await.unwrap();
    assert_eq!(all.meta.unwrap().total, Some(3));

    let err = order_service::list_all_orders(&state, &vera).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden));
}

async fn set_status(state: &AppState, admin: &AuthUser, id: &str, status: OrderStatus) {
    order_service::update_order_status(state, admin, id, UpdateOrderStatusRequest { status })
        .await
        .unwrap();
}

#[tokio::test]
async fn reopening_a_cancelled_order_takes_stock_again() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;
    let order = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 3)]))
        .await
        .unwrap();
    assert_eq!(stock_of(&state, tee.id).await, 7);

    order_service::cancel_order(&state, &vera, &order.id)
        .await
        .unwrap();
    assert_eq!(stock_of(&state, tee.id).await, 10);

    set_status(&state, &admin, &order.id, OrderStatus::Pending).await;
    assert_eq!(stock_of(&state, tee.id).await, 7);

    order_service::cancel_order(&state, &vera, &order.id)
        .await
        .unwrap();
    assert_eq!(stock_of(&state, tee.id).await, 10);
}

#[tokio::test]
async fn admin_override_to_cancelled_returns_stock_once() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;
    let order = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 2), line(tee.id, 1)]))
        .await
        .unwrap();

    set_status(&state, &admin, &order.id, OrderStatus::Cancelled).await;
    assert_eq!(stock_of(&state, tee.id).await, 10);

    // Already cancelled: a second override moves nothing.
    set_status(&state, &admin, &order.id, OrderStatus::Cancelled).await;
    assert_eq!(stock_of(&state, tee.id).await, 10);

    set_status(&state, &admin, &order.id, OrderStatus::Delivered).await;
    assert_eq!(stock_of(&state, tee.id).await, 7);
}

#[tokio::test]
async fn reopening_fails_when_stock_has_been_sold() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let admin = principal("Admin", Role::Admin);
    let tee = add_product(&state, "Tee", 1500, 0, 4).await;
    let first = state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 3)]))
        .await
        .unwrap();
    order_service::cancel_order(&state, &vera, &first.id)
        .await
        .unwrap();
    state
        .store
        .place_order(draft(&vera, vec![line(tee.id, 2)]))
        .await
        .unwrap();

    let err = order_service::update_order_status(
        &state,
        &admin,
        &first.id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Accepted,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let unchanged = state.store.find_order(&first.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&state, tee.id).await, 2);
}

#[tokio::test]
async fn oversized_quantities_and_totals_are_rejected() {
    let (state, _) = test_state();
    let vera = principal("Vera", Role::User);
    let tee = add_product(&state, "Tee", 1500, 0, 10).await;

    let err = order_service::create_order(&state, &vera, request(vec![item(tee.id, 10_001, None)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let pricey = add_product(&state, "Vault", i64::MAX / 2, 0, i32::MAX).await;
    let err = state
        .store
        .place_order(draft(&vera, vec![line(pricey.id, 3)]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    assert_eq!(stock_of(&state, pricey.id).await, i32::MAX);
}
