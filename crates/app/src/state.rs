use std::sync::Arc;

use crate::config::AppConfig;
use codeforum_core::collaborators::IdentityResolver;
use codeforum_core::service::CommentService;
use codeforum_infra::auth::TokenVerifier;
use codeforum_infra::db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub comments: Arc<CommentService>,
    pub identities: Arc<dyn IdentityResolver>,
    pub tokens: Arc<TokenVerifier>,
    pub db: Option<DbPool>,
}
