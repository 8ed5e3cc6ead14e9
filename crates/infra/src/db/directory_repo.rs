//! Read-only views onto the `solutions` and `users` tables, plus the user
//! statistics counters they carry.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use codeforum_core::collaborators::{IdentityResolver, SolutionDirectory, UserStat, UserStats};
use codeforum_core::domain::identity::UserIdentity;
use codeforum_core::types::{SolutionId, UserId};
use codeforum_core::CoreError;

#[derive(Debug, Error)]
pub enum DirectoryRepoError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl From<DirectoryRepoError> for CoreError {
    fn from(err: DirectoryRepoError) -> Self {
        error!(error = %err, "directory query failed");
        CoreError::unavailable("user directory")
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    is_active: bool,
}

impl From<UserRow> for UserIdentity {
    fn from(row: UserRow) -> Self {
        UserIdentity {
            id: UserId::from_uuid(row.id),
            display_name: row.name,
            email: row.email,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        PgDirectory { pool }
    }

    async fn find_solution(&self, id: SolutionId) -> Result<bool, DirectoryRepoError> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (SELECT 1 FROM solutions WHERE id = $1)
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<UserIdentity>, DirectoryRepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, is_active
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(UserIdentity::from))
    }

    async fn find_users(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, UserIdentity>, DirectoryRepoError> {
        let uuids: Vec<Uuid> = ids.iter().map(UserId::as_uuid).collect();
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, email, is_active
            FROM users
            WHERE id = ANY($1)
            "#,
        )
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(UserIdentity::from)
            .map(|identity| (identity.id, identity))
            .collect())
    }

    async fn bump(&self, user_id: UserId, stat: UserStat) -> Result<(), DirectoryRepoError> {
        let query = match stat {
            UserStat::CommentsPosted => {
                "UPDATE users SET comments_posted = comments_posted + 1 WHERE id = $1"
            }
            UserStat::UpvotesReceived => {
                "UPDATE users SET upvotes_received = upvotes_received + 1 WHERE id = $1"
            }
        };
        sqlx::query(query)
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl SolutionDirectory for PgDirectory {
    async fn solution_exists(&self, id: SolutionId) -> Result<bool, CoreError> {
        Ok(self.find_solution(id).await?)
    }
}

#[async_trait]
impl IdentityResolver for PgDirectory {
    async fn resolve_identity(&self, id: UserId) -> Result<Option<UserIdentity>, CoreError> {
        Ok(self.find_user(id).await?)
    }

    async fn resolve_identities(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, UserIdentity>, CoreError> {
        Ok(self.find_users(ids).await?)
    }
}

#[async_trait]
impl UserStats for PgDirectory {
    async fn increment(&self, user_id: UserId, stat: UserStat) -> Result<(), CoreError> {
        Ok(self.bump(user_id, stat).await?)
    }
}
