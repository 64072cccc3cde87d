use std::{net::SocketAddr, sync::Arc, time::Duration};

use chrono::Utc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use noir_storefront::{
    config::{AppConfig, StorageBackend},
    middleware::auth::TokenService,
    otp::HttpOtpSender,
    routes,
    seed::seed_catalog,
    state::AppState,
    storage::{FileStore, PostgresStore, Storage},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,noir_storefront=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn Storage> = match config.backend {
        StorageBackend::File => Arc::new(FileStore::open(&config.data_file).await?),
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().unwrap_or_default();
            Arc::new(PostgresStore::connect(url).await?)
        }
    };
    tracing::info!(backend = ?config.backend, "storage ready");

    if config.seed_catalog {
        seed_catalog(store.as_ref()).await?;
    }

    let state = AppState::new(
        store,
        TokenService::new(&config.jwt_secret, config.token_ttl_hours),
        Arc::new(HttpOtpSender::new()?),
        &config.admin_email,
    );

    let otp = state.otp.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(300));
        loop {
            ticker.tick().await;
            let purged = otp.purge_stale(Utc::now());
            if purged > 0 {
                tracing::debug!(purged, "stale otp records dropped");
            }
        }
    });

    let app = routes::app(state);

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    tracing::info!("listening on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;

    Ok(())
}
