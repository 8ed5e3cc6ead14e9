use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use codeforum_core::collaborators::{IdentityResolver, SolutionDirectory, UserStat, UserStats};
use codeforum_core::domain::identity::UserIdentity;
use codeforum_core::types::{SolutionId, UserId};
use codeforum_core::CoreError;

/// Solutions, users and their counters held in memory.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    solutions: RwLock<HashSet<SolutionId>>,
    users: RwLock<HashMap<UserId, UserIdentity>>,
    stats: RwLock<HashMap<(UserId, UserStat), u64>>,
    stats_offline: AtomicBool,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_solution(&self, id: SolutionId) {
        self.solutions.write().await.insert(id);
    }

    pub async fn add_user(&self, identity: UserIdentity) {
        self.users.write().await.insert(identity.id, identity);
    }

    pub async fn stat(&self, user_id: UserId, stat: UserStat) -> u64 {
        self.stats
            .read()
            .await
            .get(&(user_id, stat))
            .copied()
            .unwrap_or(0)
    }

    /// While offline every stat increment fails.
    pub fn set_stats_offline(&self, offline: bool) {
        self.stats_offline.store(offline, Ordering::Relaxed);
    }
}

#[async_trait]
impl SolutionDirectory for MemoryDirectory {
    async fn solution_exists(&self, id: SolutionId) -> Result<bool, CoreError> {
        Ok(self.solutions.read().await.contains(&id))
    }
}

#[async_trait]
impl IdentityResolver for MemoryDirectory {
    async fn resolve_identity(&self, id: UserId) -> Result<Option<UserIdentity>, CoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl UserStats for MemoryDirectory {
    async fn increment(&self, user_id: UserId, stat: UserStat) -> Result<(), CoreError> {
        if self.stats_offline.load(Ordering::Relaxed) {
            return Err(CoreError::unavailable("user stats"));
        }
        *self.stats.write().await.entry((user_id, stat)).or_insert(0) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryDirectory;
    use codeforum_core::collaborators::{IdentityResolver, UserStat, UserStats};
    use codeforum_core::domain::identity::UserIdentity;
    use codeforum_core::types::UserId;

    #[tokio::test]
    async fn resolve_identities_skips_unknown_users() {
        let directory = MemoryDirectory::new();
        let known = UserId::new();
        directory
            .add_user(UserIdentity {
                id: known,
                display_name: "Ada".to_string(),
                email: "ada@example.com".to_string(),
                is_active: true,
            })
            .await;
        let resolved = directory
            .resolve_identities(&[known, UserId::new(), known])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[&known].display_name, "Ada");
    }

    #[tokio::test]
    async fn offline_stats_fail_without_counting() {
        let directory = MemoryDirectory::new();
        let user = UserId::new();
        directory.increment(user, UserStat::CommentsPosted).await.unwrap();
        directory.set_stats_offline(true);
        assert!(directory.increment(user, UserStat::CommentsPosted).await.is_err());
        assert_eq!(directory.stat(user, UserStat::CommentsPosted).await, 1);
    }
}
