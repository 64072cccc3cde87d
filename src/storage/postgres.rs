use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, LockType, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, DbBackend,
    DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, Statement,
    TransactionTrait,
};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::{
    db::{create_orm_conn, run_migrations},
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products, Model as ProductModel},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews, Model as ReviewModel},
        settings::{ActiveModel as SettingsActive, Column as SettingsCol, Entity as SettingsRecords, Model as SettingsModel},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{
        Order, OrderDraft, OrderItem, OrderStatus, Product, ProductPatch, ProfilePatch, Review,
        ReviewPatch, SETTINGS_ID, Settings, SettingsPatch, User, order_id,
    },
    policy::{self, StockMove},
    storage::{Storage, like_pattern},
};

pub struct PostgresStore {
    conn: DatabaseConnection,
}

impl PostgresStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Connects and applies pending migrations.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let conn = create_orm_conn(database_url).await?;
        run_migrations(&conn).await?;
        Ok(Self::new(conn))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    async fn lock_order(
        &self,
        txn: &DatabaseTransaction,
        id: &str,
    ) -> AppResult<(OrderModel, Order)> {
        let model = Orders::find_by_id(id.to_string())
            .lock(LockType::Update)
            .one(txn)
            .await?
            .ok_or(AppError::NotFound)?;
        let order = self
            .load_orders(txn, vec![model.clone()])
            .await?
            .pop()
            .ok_or(AppError::NotFound)?;
        Ok((model, order))
    }

    /// Writes the new status and moves the order's stock when it enters or
    /// leaves `Cancelled`, inside the caller's transaction.
    async fn move_status(
        &self,
        txn: &DatabaseTransaction,
        model: OrderModel,
        mut order: Order,
        status: OrderStatus,
    ) -> AppResult<Order> {
        let held = policy::held_stock(&order);
        match policy::stock_move(order.status, status) {
            StockMove::Keep => {}
            StockMove::Release => {
                for (product_id, quantity) in &held {
                    Products::update_many()
                        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(*quantity))
                        .filter(ProdCol::Id.eq(*product_id))
                        .exec(txn)
                        .await?;
                }
            }
            StockMove::Reserve => {
                let ids: Vec<Uuid> = held.iter().map(|(id, _)| *id).collect();
                let catalog = Products::find()
                    .filter(ProdCol::Id.is_in(ids))
                    .lock(LockType::Update)
                    .all(txn)
                    .await?
                    .into_iter()
                    .map(product_from_entity)
                    .collect::<AppResult<Vec<Product>>>()?;
                policy::check_reserve(&held, &catalog)?;
                for (product_id, quantity) in &held {
                    Products::update_many()
                        .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(*quantity))
                        .filter(ProdCol::Id.eq(*product_id))
                        .exec(txn)
                        .await?;
                }
            }
        }

        let mut active: OrderActive = model.into();
        active.status = Set(status.as_str().to_string());
        active.update(txn).await?;
        order.status = status;
        Ok(order)
    }

    async fn load_orders<C: ConnectionTrait>(
        &self,
        conn: &C,
        models: Vec<OrderModel>,
    ) -> AppResult<Vec<Order>> {
        let ids: Vec<String> = models.iter().map(|o| o.id.clone()).collect();
        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        if !ids.is_empty() {
            let rows = OrderItems::find()
                .filter(OrderItemCol::OrderId.is_in(ids))
                .order_by_asc(OrderItemCol::Position)
                .all(conn)
                .await?;
            for row in rows {
                items
                    .entry(row.order_id.clone())
                    .or_default()
                    .push(order_item_from_entity(row));
            }
        }

        models
            .into_iter()
            .map(|model| {
                let lines = items.remove(&model.id).unwrap_or_default();
                order_from_entity(model, lines)
            })
            .collect()
    }
}

fn conflict_on_unique(err: DbErr, message: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(message.to_string()),
        _ => AppError::OrmError(err),
    }
}

fn corrupt(what: impl std::fmt::Display) -> AppError {
    AppError::Internal(anyhow::anyhow!("corrupt row: {what}"))
}

fn strings(value: Json) -> AppResult<Vec<String>> {
    serde_json::from_value(value).map_err(corrupt)
}

fn json(values: &[String]) -> Json {
    Json::from(values.to_vec())
}

fn user_from_entity(model: UserModel) -> AppResult<User> {
    Ok(User {
        id: model.id,
        email: model.email,
        password_hash: model.password_hash,
        name: model.name,
        role: model.role.parse().map_err(corrupt)?,
        phone: model.phone,
        address: model.address,
    })
}

fn product_from_entity(model: ProductModel) -> AppResult<Product> {
    Ok(Product {
        id: model.id,
        name: model.name,
        description: model.description,
        original_price: model.original_price,
        discount: u8::try_from(model.discount).map_err(corrupt)?,
        final_price: model.final_price,
        images: strings(model.images)?,
        colors: strings(model.colors)?,
        sizes: strings(model.sizes)?,
        stock: model.stock,
        enabled: model.enabled,
    })
}

fn product_to_active(product: &Product) -> ProductActive {
    ProductActive {
        id: Set(product.id),
        name: Set(product.name.clone()),
        description: Set(product.description.clone()),
        original_price: Set(product.original_price),
        discount: Set(i16::from(product.discount)),
        final_price: Set(product.final_price),
        images: Set(json(&product.images)),
        colors: Set(json(&product.colors)),
        sizes: Set(json(&product.sizes)),
        stock: Set(product.stock),
        enabled: Set(product.enabled),
        ..Default::default()
    }
}

fn order_from_entity(model: OrderModel, items: Vec<OrderItem>) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        user_id: model.user_id,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        customer_address: model.customer_address,
        items,
        total: model.total,
        status: model.status.parse::<OrderStatus>().map_err(corrupt)?,
        created_at: model.created_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        product_id: model.product_id,
        name: model.name,
        product_url: model.product_url,
        quantity: model.quantity,
        color: model.color,
        size: model.size,
        price: model.price,
    }
}

fn review_from_entity(model: ReviewModel) -> AppResult<Review> {
    Ok(Review {
        id: model.id,
        user_id: model.user_id,
        user_name: model.user_name,
        product_id: model.product_id,
        rating: u8::try_from(model.rating).map_err(corrupt)?,
        comment: model.comment,
        date: model.created_at.with_timezone(&Utc),
    })
}

fn settings_from_entity(model: SettingsModel) -> Settings {
    Settings {
        id: model.id,
        email_verification_enabled: model.email_verification_enabled,
        otp_api_url: model.otp_api_url,
        otp_resend_interval_seconds: u32::try_from(model.otp_resend_interval_seconds)
            .unwrap_or_default(),
        otp_max_per_email_per_hour: u32::try_from(model.otp_max_per_email_per_hour)
            .unwrap_or(1)
            .max(1),
    }
}

fn settings_to_active(settings: &Settings) -> SettingsActive {
    SettingsActive {
        id: Set(settings.id.clone()),
        email_verification_enabled: Set(settings.email_verification_enabled),
        otp_api_url: Set(settings.otp_api_url.clone()),
        otp_resend_interval_seconds: Set(
            i32::try_from(settings.otp_resend_interval_seconds).unwrap_or(i32::MAX),
        ),
        otp_max_per_email_per_hour: Set(
            i32::try_from(settings.otp_max_per_email_per_hour).unwrap_or(i32::MAX),
        ),
    }
}

#[async_trait]
impl Storage for PostgresStore {
    async fn settings(&self) -> AppResult<Settings> {
        if let Some(model) = SettingsRecords::find_by_id(SETTINGS_ID.to_string())
            .one(&self.conn)
            .await?
        {
            return Ok(settings_from_entity(model));
        }

        SettingsRecords::insert(settings_to_active(&Settings::default()))
            .on_conflict(OnConflict::column(SettingsCol::Id).do_nothing().to_owned())
            .exec_without_returning(&self.conn)
            .await?;

        let model = SettingsRecords::find_by_id(SETTINGS_ID.to_string())
            .one(&self.conn)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("settings row missing")))?;
        Ok(settings_from_entity(model))
    }

    async fn update_settings(&self, patch: SettingsPatch) -> AppResult<Settings> {
        let txn = self.conn.begin().await?;
        let existing = SettingsRecords::find_by_id(SETTINGS_ID.to_string())
            .lock(LockType::Update)
            .one(&txn)
            .await?;
        let exists = existing.is_some();
        let mut settings = existing.map(settings_from_entity).unwrap_or_default();
        settings.apply(patch);

        let active = settings_to_active(&settings);
        if exists {
            active.update(&txn).await?;
        } else {
            active.insert(&txn).await?;
        }
        txn.commit().await?;
        Ok(settings)
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        Users::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(user_from_entity)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Users::find()
            .filter(UserCol::Email.eq(email))
            .one(&self.conn)
            .await?
            .map(user_from_entity)
            .transpose()
    }

    async fn insert_user(&self, user: User) -> AppResult<User> {
        let active = UserActive {
            id: Set(user.id),
            email: Set(user.email.clone()),
            password_hash: Set(user.password_hash.clone()),
            name: Set(user.name.clone()),
            role: Set(user.role.as_str().to_string()),
            phone: Set(user.phone.clone()),
            address: Set(user.address.clone()),
            created_at: Set(Utc::now().into()),
        };
        let model = active
            .insert(&self.conn)
            .await
            .map_err(|e| conflict_on_unique(e, "Email already registered"))?;
        user_from_entity(model)
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> AppResult<User> {
        let existing = Users::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: UserActive = existing.into();
        if let Some(name) = patch.name {
            active.name = Set(name);
        }
        if let Some(phone) = patch.phone {
            active.phone = Set(Some(phone));
        }
        if let Some(address) = patch.address {
            active.address = Set(Some(address));
        }
        user_from_entity(active.update(&self.conn).await?)
    }

    async fn list_products(&self, query: Option<&str>) -> AppResult<Vec<Product>> {
        let mut condition = Condition::all();
        if let Some(search) = query.filter(|s| !s.is_empty()) {
            let pattern = like_pattern(search);
            condition = condition.add(
                Condition::any()
                    .add(Expr::col(ProdCol::Name).ilike(pattern.clone()))
                    .add(Expr::col(ProdCol::Description).ilike(pattern.clone()))
                    .add(Expr::cust_with_values(
                        "EXISTS (SELECT 1 FROM jsonb_array_elements_text(colors) AS c WHERE c ILIKE ?)",
                        [pattern],
                    )),
            );
        }

        Products::find()
            .filter(condition)
            .order_by_asc(ProdCol::CreatedAt)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect()
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        Products::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(product_from_entity)
            .transpose()
    }

    async fn insert_product(&self, product: Product) -> AppResult<Product> {
        let mut active = product_to_active(&product);
        active.created_at = Set(Utc::now().into());
        product_from_entity(active.insert(&self.conn).await?)
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> AppResult<Product> {
        let txn = self.conn.begin().await?;
        let existing = Products::find_by_id(id)
            .lock(LockType::Update)
            .one(&txn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut product = product_from_entity(existing)?;
        product.apply(patch);
        let updated = product_to_active(&product).update(&txn).await?;
        txn.commit().await?;
        product_from_entity(updated)
    }

    async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        let result = Products::delete_by_id(id).exec(&self.conn).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn place_order(&self, draft: OrderDraft) -> AppResult<Order> {
        let txn = self.conn.begin().await?;

        let ids: Vec<Uuid> = draft.lines.iter().map(|l| l.product_id).collect();
        let catalog = Products::find()
            .filter(ProdCol::Id.is_in(ids))
            .lock(LockType::Update)
            .all(&txn)
            .await?
            .into_iter()
            .map(product_from_entity)
            .collect::<AppResult<Vec<Product>>>()?;
        let priced = policy::price_order(&draft, &catalog)?;

        let row = txn
            .query_one(Statement::from_string(
                DbBackend::Postgres,
                "SELECT nextval('order_number_seq') AS number",
            ))
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order sequence unavailable")))?;
        let number: i64 = row.try_get("", "number")?;

        let order = OrderActive {
            id: Set(order_id(number)),
            number: Set(number),
            user_id: Set(draft.user_id),
            customer_name: Set(draft.customer_name),
            customer_phone: Set(draft.customer_phone),
            customer_address: Set(draft.customer_address),
            total: Set(priced.total),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            created_at: Set(Utc::now().into()),
        }
        .insert(&txn)
        .await?;

        for (position, item) in priced.items.iter().enumerate() {
            OrderItemActive {
                id: Set(Uuid::new_v4()),
                order_id: Set(order.id.clone()),
                position: Set(position as i32),
                product_id: Set(item.product_id),
                name: Set(item.name.clone()),
                product_url: Set(item.product_url.clone()),
                quantity: Set(item.quantity),
                color: Set(item.color.clone()),
                size: Set(item.size.clone()),
                price: Set(item.price),
            }
            .insert(&txn)
            .await?;
        }

        for (product_id, quantity) in &priced.reservations {
            Products::update_many()
                .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(*quantity))
                .filter(ProdCol::Id.eq(*product_id))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        order_from_entity(order, priced.items)
    }

    async fn find_order(&self, id: &str) -> AppResult<Option<Order>> {
        let Some(model) = Orders::find_by_id(id.to_string()).one(&self.conn).await? else {
            return Ok(None);
        };
        Ok(self.load_orders(&self.conn, vec![model]).await?.pop())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let models = Orders::find()
            .filter(OrderCol::UserId.eq(user_id))
            .order_by_desc(OrderCol::CreatedAt)
            .order_by_desc(OrderCol::Number)
            .all(&self.conn)
            .await?;
        self.load_orders(&self.conn, models).await
    }

    async fn list_orders(&self) -> AppResult<Vec<Order>> {
        let models = Orders::find()
            .order_by_desc(OrderCol::CreatedAt)
            .order_by_desc(OrderCol::Number)
            .all(&self.conn)
            .await?;
        self.load_orders(&self.conn, models).await
    }

    async fn cancel_order(&self, id: &str, actor: &AuthUser) -> AppResult<Order> {
        let txn = self.conn.begin().await?;
        let (model, order) = self.lock_order(&txn, id).await?;
        policy::check_cancel(&order, actor)?;
        let order = self
            .move_status(&txn, model, order, OrderStatus::Cancelled)
            .await?;
        txn.commit().await?;
        Ok(order)
    }

    async fn set_order_status(&self, id: &str, status: OrderStatus) -> AppResult<Order> {
        let txn = self.conn.begin().await?;
        let (model, order) = self.lock_order(&txn, id).await?;
        let order = self.move_status(&txn, model, order, status).await?;
        txn.commit().await?;
        Ok(order)
    }

    async fn insert_review(&self, review: Review) -> AppResult<Review> {
        let active = ReviewActive {
            id: Set(review.id),
            user_id: Set(review.user_id),
            user_name: Set(review.user_name.clone()),
            product_id: Set(review.product_id),
            rating: Set(i16::from(review.rating)),
            comment: Set(review.comment.clone()),
            created_at: Set(review.date.into()),
        };
        let model = active
            .insert(&self.conn)
            .await
            .map_err(|e| conflict_on_unique(e, "You have already reviewed this product"))?;
        review_from_entity(model)
    }

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        Reviews::find_by_id(id)
            .one(&self.conn)
            .await?
            .map(review_from_entity)
            .transpose()
    }

    async fn list_reviews_for_product(&self, product_id: Uuid) -> AppResult<Vec<Review>> {
        Reviews::find()
            .filter(ReviewCol::ProductId.eq(product_id))
            .order_by_desc(ReviewCol::CreatedAt)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(review_from_entity)
            .collect()
    }

    async fn update_review(&self, id: Uuid, patch: ReviewPatch) -> AppResult<Review> {
        let existing = Reviews::find_by_id(id)
            .one(&self.conn)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut active: ReviewActive = existing.into();
        if let Some(rating) = patch.rating {
            active.rating = Set(i16::from(rating));
        }
        if let Some(comment) = patch.comment {
            active.comment = Set(comment);
        }
        review_from_entity(active.update(&self.conn).await?)
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<()> {
        let result = Reviews::delete_by_id(id).exec(&self.conn).await?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
