use std::sync::Arc;

use noir_storefront::{
    config::{AppConfig, StorageBackend},
    models::Role,
    seed::{ensure_account, seed_catalog},
    storage::{FileStore, PostgresStore, Storage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let store: Arc<dyn Storage> = match config.backend {
        StorageBackend::File => Arc::new(FileStore::open(&config.data_file).await?),
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().unwrap_or_default();
            Arc::new(PostgresStore::connect(url).await?)
        }
    };

    let admin_id = ensure_account(
        store.as_ref(),
        &config.admin_email,
        "admin123",
        "Admin",
        Role::Admin,
    )
    .await?;
    let user_id = ensure_account(
        store.as_ref(),
        "user@example.com",
        "user123",
        "Demo User",
        Role::User,
    )
    .await?;
    let seeded = seed_catalog(store.as_ref()).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}, products added: {seeded}");
    Ok(())
}
