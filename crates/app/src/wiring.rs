use std::sync::Arc;

use thiserror::Error;

use crate::config::{AppConfig, ConfigError};
use crate::state::AppState;
use codeforum_core::collaborators::{IdentityResolver, SolutionDirectory, UserStats};
use codeforum_core::service::CommentService;
use codeforum_core::store::CommentStore;
use codeforum_infra::auth::TokenVerifier;
use codeforum_infra::db::{connect_lazy, DbPool, DbPoolError, PgCommentStore, PgDirectory};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("db pool error: {0}")]
    Db(#[from] DbPoolError),
}

/// The collaborators a running service is assembled from.
pub struct Backends {
    pub store: Arc<dyn CommentStore>,
    pub solutions: Arc<dyn SolutionDirectory>,
    pub identities: Arc<dyn IdentityResolver>,
    pub stats: Arc<dyn UserStats>,
    pub db: Option<DbPool>,
}

pub fn connect(config: &AppConfig) -> Result<DbPool, WiringError> {
    let database_url = config.require_database_url()?;
    Ok(connect_lazy(database_url, config.db_max_connections)?)
}

pub fn build_state(config: AppConfig) -> Result<AppState, WiringError> {
    let pool = connect(&config)?;
    let directory = Arc::new(PgDirectory::new(pool.clone()));
    let backends = Backends {
        store: Arc::new(PgCommentStore::new(pool.clone())),
        solutions: directory.clone(),
        identities: directory.clone(),
        stats: directory,
        db: Some(pool),
    };
    assemble(config, backends)
}

pub fn assemble(config: AppConfig, backends: Backends) -> Result<AppState, WiringError> {
    let tokens = TokenVerifier::new(config.require_jwt_secret()?);
    let comments = CommentService::new(
        backends.store,
        backends.solutions,
        backends.identities.clone(),
        backends.stats,
    );
    Ok(AppState {
        config: Arc::new(config),
        comments: Arc::new(comments),
        identities: backends.identities,
        tokens: Arc::new(tokens),
        db: backends.db,
    })
}
