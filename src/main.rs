use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use household_expenses::config::{AppConfig, LogFormat, StorageBackend};
use household_expenses::repositories::JsonStore;
use household_expenses::routes::router;
use household_expenses::state::{AppState, Repositories};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(config.log_format);

    let repositories = match &config.storage {
        StorageBackend::Postgres {
            database_url,
            max_connections,
        } => {
            let pool = PgPoolOptions::new()
                .max_connections(*max_connections)
                .connect(database_url)
                .await?;
            tracing::info!("Connected to database");

            sqlx::migrate!("./migrations").run(&pool).await?;
            tracing::info!("Migrations completed");

            Repositories::postgres(pool)
        }
        StorageBackend::Json { data_dir } => {
            let store = JsonStore::open(data_dir).await?;
            tracing::info!(dir = %store.dir().display(), "Using JSON file storage");

            Repositories::json(Arc::new(store))
        }
    };

    let state = AppState::new(
        repositories,
        config.session_secret.clone(),
        config.bcrypt_cost,
    );
    let app = router(state, &config.static_dir);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        address = %addr,
        static_dir = %config.static_dir.display(),
        "Server running, API docs at /api/docs/openapi.json"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
