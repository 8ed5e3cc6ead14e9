pub mod comments_repo;
pub mod directory_repo;
pub mod migrations;
pub mod pool;

pub use comments_repo::{CommentsRepoError, PgCommentStore};
pub use directory_repo::{DirectoryRepoError, PgDirectory};
pub use migrations::run_migrations;
pub use pool::{connect_lazy, DbPool, DbPoolError};
