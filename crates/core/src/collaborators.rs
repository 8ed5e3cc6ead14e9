//! Narrow interfaces onto the subsystems that own solutions and users.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::identity::UserIdentity;
use crate::error::CoreError;
use crate::types::{SolutionId, UserId};

#[async_trait]
pub trait SolutionDirectory: Send + Sync {
    async fn solution_exists(&self, id: SolutionId) -> Result<bool, CoreError>;
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve_identity(&self, id: UserId) -> Result<Option<UserIdentity>, CoreError>;

    async fn resolve_identities(
        &self,
        ids: &[UserId],
    ) -> Result<HashMap<UserId, UserIdentity>, CoreError> {
        let mut resolved = HashMap::with_capacity(ids.len());
        for id in ids {
            if resolved.contains_key(id) {
                continue;
            }
            if let Some(identity) = self.resolve_identity(*id).await? {
                resolved.insert(*id, identity);
            }
        }
        Ok(resolved)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserStat {
    CommentsPosted,
    UpvotesReceived,
}

impl UserStat {
    pub fn as_str(self) -> &'static str {
        match self {
            UserStat::CommentsPosted => "comments_posted",
            UserStat::UpvotesReceived => "upvotes_received",
        }
    }
}

#[async_trait]
pub trait UserStats: Send + Sync {
    async fn increment(&self, user_id: UserId, stat: UserStat) -> Result<(), CoreError>;
}
