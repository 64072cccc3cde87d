use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::{fs, sync::RwLock};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{
        FIRST_ORDER_NUMBER, Order, OrderDraft, OrderStatus, Product, ProductPatch, ProfilePatch,
        Review, ReviewPatch, Settings, SettingsPatch, User, order_id, order_number,
    },
    policy::{self, StockMove},
    storage::Storage,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Dataset {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    orders: Vec<Order>,
    #[serde(default)]
    reviews: Vec<Review>,
    #[serde(default)]
    settings: Option<Settings>,
    /// Last order number handed out.
    #[serde(default)]
    order_sequence: i64,
}

impl Dataset {
    fn next_order_number(&mut self) -> i64 {
        let highest = self
            .orders
            .iter()
            .filter_map(|o| order_number(&o.id))
            .max()
            .unwrap_or(FIRST_ORDER_NUMBER - 1);
        self.order_sequence = self.order_sequence.max(highest).max(FIRST_ORDER_NUMBER - 1) + 1;
        self.order_sequence
    }

    fn product_mut(&mut self, id: Uuid) -> Option<&mut Product> {
        self.products.iter_mut().find(|p| p.id == id)
    }

    /// Sets the status of `orders[index]`, releasing or re-taking its stock
    /// when the order enters or leaves `Cancelled`.
    fn move_status(&mut self, index: usize, status: OrderStatus) -> AppResult<Order> {
        let held = policy::held_stock(&self.orders[index]);
        match policy::stock_move(self.orders[index].status, status) {
            StockMove::Keep => {}
            StockMove::Release => {
                for (product_id, quantity) in &held {
                    if let Some(product) = self.product_mut(*product_id) {
                        product.stock = product.stock.saturating_add(*quantity);
                    }
                }
            }
            StockMove::Reserve => {
                policy::check_reserve(&held, &self.products)?;
                for (product_id, quantity) in &held {
                    if let Some(product) = self.product_mut(*product_id) {
                        product.stock -= quantity;
                    }
                }
            }
        }
        self.orders[index].status = status;
        Ok(self.orders[index].clone())
    }
}

/// Whole dataset held in memory and mirrored to a JSON file after each write.
pub struct FileStore {
    path: Option<PathBuf>,
    data: RwLock<Dataset>,
}

impl FileStore {
    /// Loads `path` if it exists, otherwise writes an empty dataset there.
    pub async fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Dataset>(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Dataset::default(),
            Err(err) => return Err(err.into()),
        };
        tracing::info!(path = %path.display(), products = data.products.len(), orders = data.orders.len(), "file store loaded");

        let store = Self {
            path: Some(path),
            data: RwLock::new(data),
        };
        {
            let data = store.data.read().await;
            store.persist(&data).await?;
        }
        Ok(store)
    }

    /// A store that never touches the disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(Dataset::default()),
        }
    }

    async fn persist(&self, data: &Dataset) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(data).map_err(anyhow::Error::from)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).await.map_err(anyhow::Error::from)?;
        fs::rename(&tmp, path).await.map_err(anyhow::Error::from)?;
        Ok(())
    }

    /// Applies `change` to a copy of the dataset and swaps the copy in only
    /// once it has been written out.
    async fn commit<T, F>(&self, change: F) -> AppResult<T>
    where
        T: Send,
        F: FnOnce(&mut Dataset) -> AppResult<T> + Send,
    {
        let mut data = self.data.write().await;
        let mut next = data.clone();
        let out = change(&mut next)?;
        self.persist(&next).await?;
        *data = next;
        Ok(out)
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| order_number(&b.id).cmp(&order_number(&a.id)))
    });
}

#[async_trait]
impl Storage for FileStore {
    async fn settings(&self) -> AppResult<Settings> {
        if let Some(settings) = self.data.read().await.settings.clone() {
            return Ok(settings);
        }
        self.commit(|data| Ok(data.settings.get_or_insert_with(Settings::default).clone()))
            .await
    }

    async fn update_settings(&self, patch: SettingsPatch) -> AppResult<Settings> {
        self.commit(|data| {
            let settings = data.settings.get_or_insert_with(Settings::default);
            settings.apply(patch);
            Ok(settings.clone())
        })
        .await
    }

    async fn find_user(&self, id: Uuid) -> AppResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let data = self.data.read().await;
        Ok(data.users.iter().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&self, user: User) -> AppResult<User> {
        self.commit(|data| {
            if data.users.iter().any(|u| u.email == user.email) {
                return Err(AppError::Conflict("Email already registered".into()));
            }
            data.users.push(user.clone());
            Ok(user)
        })
        .await
    }

    async fn update_profile(&self, id: Uuid, patch: ProfilePatch) -> AppResult<User> {
        self.commit(|data| {
            let user = data
                .users
                .iter_mut()
                .find(|u| u.id == id)
                .ok_or(AppError::NotFound)?;
            user.apply(patch);
            Ok(user.clone())
        })
        .await
    }

    async fn list_products(&self, query: Option<&str>) -> AppResult<Vec<Product>> {
        let data = self.data.read().await;
        let products = match query.filter(|q| !q.is_empty()) {
            Some(q) => data.products.iter().filter(|p| p.matches(q)).cloned().collect(),
            None => data.products.clone(),
        };
        Ok(products)
    }

    async fn find_product(&self, id: Uuid) -> AppResult<Option<Product>> {
        let data = self.data.read().await;
        Ok(data.products.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_product(&self, product: Product) -> AppResult<Product> {
        self.commit(|data| {
            data.products.push(product.clone());
            Ok(product)
        })
        .await
    }

    async fn update_product(&self, id: Uuid, patch: ProductPatch) -> AppResult<Product> {
        self.commit(|data| {
            let product = data.product_mut(id).ok_or(AppError::NotFound)?;
            product.apply(patch);
            Ok(product.clone())
        })
        .await
    }

    /// Removes the product together with its reviews.
    async fn delete_product(&self, id: Uuid) -> AppResult<()> {
        self.commit(|data| {
            let before = data.products.len();
            data.products.retain(|p| p.id != id);
            if data.products.len() == before {
                return Err(AppError::NotFound);
            }
            data.reviews.retain(|r| r.product_id != id);
            Ok(())
        })
        .await
    }

    async fn place_order(&self, draft: OrderDraft) -> AppResult<Order> {
        self.commit(|data| {
            let priced = policy::price_order(&draft, &data.products)?;
            for (product_id, quantity) in &priced.reservations {
                if let Some(product) = data.product_mut(*product_id) {
                    product.stock -= quantity;
                }
            }

            let number = data.next_order_number();
            let order = Order {
                id: order_id(number),
                user_id: draft.user_id,
                customer_name: draft.customer_name,
                customer_phone: draft.customer_phone,
                customer_address: draft.customer_address,
                items: priced.items,
                total: priced.total,
                status: OrderStatus::Pending,
                created_at: Utc::now(),
            };
            data.orders.push(order.clone());
            Ok(order)
        })
        .await
    }

    async fn find_order(&self, id: &str) -> AppResult<Option<Order>> {
        let data = self.data.read().await;
        Ok(data.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_orders_for_user(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let data = self.data.read().await;
        let mut orders: Vec<Order> = data
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn list_orders(&self) -> AppResult<Vec<Order>> {
        let mut orders = self.data.read().await.orders.clone();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn cancel_order(&self, id: &str, actor: &AuthUser) -> AppResult<Order> {
        self.commit(|data| {
            let index = data
                .orders
                .iter()
                .position(|o| o.id == id)
                .ok_or(AppError::NotFound)?;
            policy::check_cancel(&data.orders[index], actor)?;
            data.move_status(index, OrderStatus::Cancelled)
        })
        .await
    }

    async fn set_order_status(&self, id: &str, status: OrderStatus) -> AppResult<Order> {
        self.commit(|data| {
            let index = data
                .orders
                .iter()
                .position(|o| o.id == id)
                .ok_or(AppError::NotFound)?;
            data.move_status(index, status)
        })
        .await
    }

    async fn insert_review(&self, review: Review) -> AppResult<Review> {
        self.commit(|data| {
            if data
                .reviews
                .iter()
                .any(|r| r.user_id == review.user_id && r.product_id == review.product_id)
            {
                return Err(AppError::Conflict(
                    "You have already reviewed this product".into(),
                ));
            }
            data.reviews.push(review.clone());
            Ok(review)
        })
        .await
    }

    async fn find_review(&self, id: Uuid) -> AppResult<Option<Review>> {
        let data = self.data.read().await;
        Ok(data.reviews.iter().find(|r| r.id == id).cloned())
    }

    async fn list_reviews_for_product(&self, product_id: Uuid) -> AppResult<Vec<Review>> {
        let data = self.data.read().await;
        let mut reviews: Vec<Review> = data
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(reviews)
    }

    async fn update_review(&self, id: Uuid, patch: ReviewPatch) -> AppResult<Review> {
        self.commit(|data| {
            let review = data
                .reviews
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(AppError::NotFound)?;
            review.apply(patch);
            Ok(review.clone())
        })
        .await
    }

    async fn delete_review(&self, id: Uuid) -> AppResult<()> {
        self.commit(|data| {
            let before = data.reviews.len();
            data.reviews.retain(|r| r.id != id);
            if data.reviews.len() == before {
                return Err(AppError::NotFound);
            }
            Ok(())
        })
        .await
    }
}
