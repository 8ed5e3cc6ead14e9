use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::comments::{Comment, DeleteOutcome};
use crate::domain::votes::{VoteKind, VoteTransition};
use crate::error::CoreError;
use crate::types::{CommentContent, CommentId, PageRequest, SolutionId, UserId};

#[derive(Debug, Clone)]
pub struct NewComment {
    pub solution_id: SolutionId,
    pub author_id: UserId,
    pub content: CommentContent,
    pub parent_id: Option<CommentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VoteOutcome {
    pub comment: Comment,
    pub transition: VoteTransition,
}

/// Storage for comments and their vote ledgers.
///
/// Mutations on one comment are serialized by the implementation; parent
/// checks and the reply append happen inside the same critical section as
/// the insert.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn create(&self, new: NewComment) -> Result<Comment, CoreError>;

    /// Raw lookup, deleted comments included.
    async fn get(&self, id: CommentId) -> Result<Option<Comment>, CoreError>;

    /// Comments for `ids` in the given order; unknown ids are skipped.
    async fn get_many(&self, ids: &[CommentId]) -> Result<Vec<Comment>, CoreError>;

    async fn edit(
        &self,
        id: CommentId,
        caller: UserId,
        content: CommentContent,
        at: DateTime<Utc>,
    ) -> Result<Comment, CoreError>;

    async fn soft_delete(
        &self,
        id: CommentId,
        caller: UserId,
        at: DateTime<Utc>,
    ) -> Result<DeleteOutcome, CoreError>;

    async fn cast_vote(
        &self,
        id: CommentId,
        user_id: UserId,
        kind: VoteKind,
        at: DateTime<Utc>,
    ) -> Result<VoteOutcome, CoreError>;

    async fn user_votes(
        &self,
        user_id: UserId,
        ids: &[CommentId],
    ) -> Result<HashMap<CommentId, VoteKind>, CoreError>;

    async fn user_vote(&self, id: CommentId, user_id: UserId) -> Result<Option<VoteKind>, CoreError> {
        let mut votes = self.user_votes(user_id, &[id]).await?;
        Ok(votes.remove(&id))
    }

    /// Visible top-level comments of a solution, newest first, plus their total.
    async fn list_top_level(
        &self,
        solution_id: SolutionId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CoreError>;

    /// Visible comments written by `author_id`, newest first, plus their total.
    async fn list_by_author(
        &self,
        author_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CoreError>;
}
