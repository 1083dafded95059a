use lodge_store::{app_config::Config, DbClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let config = Config::load().expect("Failed to load config");

    let default_filter = config
        .log
        .filter
        .clone()
        .unwrap_or_else(|| "lodge_store=debug,sqlx=warn".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Connecting to database");
    let db = DbClient::new(&config.database)
        .await
        .expect("Failed to connect to database");

    db.migrate().await.expect("Failed to run migrations");
}
