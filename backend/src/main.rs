//! Speaker request service entry point.

use actix_web::web;
use color_eyre::eyre::{Result, WrapErr};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use speaker_requests::inbound::http::health::HealthState;
use speaker_requests::outbound::persistence::{DbPool, apply_pending_migrations};
use speaker_requests::server::{ServerConfig, ServiceSettings, create_server};

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServiceSettings::load().wrap_err("load settings")?;
    let mut config = ServerConfig::from_settings(&settings).wrap_err("validate settings")?;

    if let Some(pool_config) = settings.pool_config() {
        if settings.run_migrations {
            let applied = apply_pending_migrations(pool_config.database_url().to_owned())
                .await
                .wrap_err("apply migrations")?;
            info!(applied, "database migrations complete");
        }
        let pool = DbPool::new(pool_config)
            .await
            .wrap_err("build database pool")?;
        config = config.with_db_pool(pool);
    }

    let health_state = web::Data::new(HealthState::new());
    let server = create_server(health_state, config).wrap_err("start server")?;
    server.await.wrap_err("server terminated")
}
