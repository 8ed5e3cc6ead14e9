mod cli;
mod config;
mod http;
mod state;
mod wiring;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::config::{AppConfig, ConfigError};
use crate::http::HttpError;
use crate::wiring::WiringError;
use codeforum_core::types::UserId;
use codeforum_infra::auth::{TokenError, TokenVerifier};
use codeforum_infra::db::run_migrations;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid cli: {0}")]
    InvalidCli(String),
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),
    #[error("db error: {0}")]
    Db(#[from] codeforum_infra::db::DbPoolError),
    #[error("http error: {0}")]
    Http(#[from] HttpError),
    #[error("token error: {0}")]
    Token(#[from] TokenError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    config::load_dotenv()?;
    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Serve { skip_migrations } => serve(config, skip_migrations).await,
        Command::Migrate => {
            let pool = wiring::connect(&config)?;
            run_migrations(&pool).await?;
            info!("migrations applied");
            Ok(())
        }
        Command::IssueToken { user, days } => {
            if days <= 0 {
                return Err(AppError::InvalidCli("days must be positive".to_string()));
            }
            let verifier = TokenVerifier::new(config.require_jwt_secret()?);
            let token = verifier.issue(UserId::from_uuid(user), chrono::Duration::days(days))?;
            println!("{token}");
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, skip_migrations: bool) -> Result<(), AppError> {
    let state = wiring::build_state(config)?;
    if let Some(pool) = state.db.as_ref() {
        if skip_migrations {
            info!("skipping migrations");
        } else {
            run_migrations(pool).await?;
        }
    }

    let addr = state.config.http_addr;
    http::serve(addr, state, shutdown_signal()).await?;
    info!("http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => {
            error!(error = %err, "failed to install ctrl-c handler");
            std::future::pending::<()>().await;
        }
    }
}
