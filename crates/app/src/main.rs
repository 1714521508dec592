mod aggregates;
mod api;
mod problem;
mod recorder;
mod router;
mod telemetry;

use std::net::SocketAddr;

use tracing::{info, warn};

use bizadmin_core::history::parse_timezone;
use bizadmin_storage::Database;
use bizadmin_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    if config.operator.is_default() && !config.environment.is_development() {
        warn!(
            stage = "app",
            env = %config.environment.as_str(),
            "operator credentials are the built-in defaults; set APP_ADMIN_USER and APP_ADMIN_PASSWORD"
        );
    }
    let timezone = parse_timezone(&config.timezone)?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", database = %config.database_url, "database ready");

    let state = router::AppState::new(metrics, database, config.operator.clone(), timezone);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), %timezone, "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
