use std::{net::SocketAddr, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use watchlist_api::{
    api::{create_router, AppState, Pagination},
    config::{Config, StorageBackend},
    db::{
        create_pool, create_redis_client, postgres::run_migrations, EntityStore,
        IdentityProvider, MemoryStore, PgStore, RedisCounters,
    },
    services::throttle::Throttle,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watchlist_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (store, identity): (Arc<dyn EntityStore>, Arc<dyn IdentityProvider>) = match config
        .storage
    {
        StorageBackend::Postgres => {
            let pool = create_pool(&config.database_url, config.db_max_connections).await?;
            run_migrations(&pool).await?;
            let store = Arc::new(PgStore::new(pool));
            (store.clone(), store)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data will not survive a restart");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
    };

    let rates = config.throttle_rates();
    let throttle = match &config.redis_url {
        Some(url) => {
            let counters = RedisCounters::connect(create_redis_client(url)?).await?;
            Arc::new(Throttle::fixed_window(Arc::new(counters), rates))
        }
        None => Arc::new(Throttle::in_memory(rates)),
    };
    tracing::info!(rates = ?throttle.rates(), "Throttle configured");

    let state = AppState::new(
        store,
        identity,
        throttle,
        Pagination {
            page_size: config.page_size,
            max_page_size: config.max_page_size,
        },
    );
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
