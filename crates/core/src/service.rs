use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::collaborators::{IdentityResolver, SolutionDirectory, UserStat, UserStats};
use crate::compose::ThreadComposer;
use crate::domain::comments::{CommentPage, DecoratedComment, DeleteOutcome};
use crate::domain::identity::UserIdentity;
use crate::domain::votes::VoteKind;
use crate::error::CoreError;
use crate::store::{CommentStore, NewComment};
use crate::types::{CommentContent, CommentId, PageRequest, Pagination, SolutionId, UserId};

pub const SOLUTION_PAGE_SIZE: u32 = 20;
pub const AUTHOR_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone)]
pub struct CreateComment {
    pub solution_id: SolutionId,
    pub content: String,
    pub parent_id: Option<CommentId>,
}

#[derive(Clone)]
pub struct CommentService {
    store: Arc<dyn CommentStore>,
    solutions: Arc<dyn SolutionDirectory>,
    stats: Arc<dyn UserStats>,
    composer: ThreadComposer,
}

impl CommentService {
    pub fn new(
        store: Arc<dyn CommentStore>,
        solutions: Arc<dyn SolutionDirectory>,
        identities: Arc<dyn IdentityResolver>,
        stats: Arc<dyn UserStats>,
    ) -> Self {
        let composer = ThreadComposer::new(store.clone(), identities);
        CommentService {
            store,
            solutions,
            stats,
            composer,
        }
    }

    pub async fn create(
        &self,
        caller: &UserIdentity,
        request: CreateComment,
    ) -> Result<DecoratedComment, CoreError> {
        let content = CommentContent::try_from(request.content.as_str())?;
        self.ensure_solution(request.solution_id).await?;
        let comment = self
            .store
            .create(NewComment {
                solution_id: request.solution_id,
                author_id: caller.id,
                content,
                parent_id: request.parent_id,
                created_at: Utc::now(),
            })
            .await?;
        info!(
            comment_id = %comment.id,
            solution_id = %comment.solution_id,
            parent_id = ?comment.parent_id,
            "comment created"
        );
        self.bump_stat(caller.id, UserStat::CommentsPosted).await;
        Ok(self.composer.compose_written(comment, caller, None).await)
    }

    pub async fn list_for_solution(
        &self,
        solution_id: SolutionId,
        page: PageRequest,
        viewer: Option<UserId>,
    ) -> Result<CommentPage, CoreError> {
        self.ensure_solution(solution_id).await?;
        self.composer.compose_page(solution_id, page, viewer).await
    }

    pub async fn get(
        &self,
        id: CommentId,
        viewer: Option<UserId>,
    ) -> Result<DecoratedComment, CoreError> {
        self.composer.compose_single(id, viewer).await
    }

    pub async fn update(
        &self,
        id: CommentId,
        caller: &UserIdentity,
        content: &str,
    ) -> Result<DecoratedComment, CoreError> {
        let content = CommentContent::try_from(content)?;
        let comment = self.store.edit(id, caller.id, content, Utc::now()).await?;
        info!(comment_id = %id, "comment updated");
        let own_vote = match self.store.user_vote(id, caller.id).await {
            Ok(vote) => vote,
            Err(err) => {
                warn!(error = %err, comment_id = %id, "own vote lookup failed after update");
                None
            }
        };
        Ok(self.composer.compose_written(comment, caller, own_vote).await)
    }

    pub async fn delete(&self, id: CommentId, caller: &UserIdentity) -> Result<(), CoreError> {
        match self.store.soft_delete(id, caller.id, Utc::now()).await? {
            DeleteOutcome::Deleted => info!(comment_id = %id, "comment deleted"),
            DeleteOutcome::AlreadyDeleted => info!(comment_id = %id, "comment already deleted"),
        }
        Ok(())
    }

    pub async fn vote(
        &self,
        id: CommentId,
        caller: &UserIdentity,
        vote_type: &str,
    ) -> Result<DecoratedComment, CoreError> {
        let kind: VoteKind = vote_type.parse()?;
        let outcome = self.store.cast_vote(id, caller.id, kind, Utc::now()).await?;
        info!(
            comment_id = %id,
            transition = ?outcome.transition,
            upvotes = outcome.comment.votes.upvotes,
            downvotes = outcome.comment.votes.downvotes,
            "vote cast"
        );
        if outcome.transition.awards_upvote() {
            self.bump_stat(outcome.comment.author_id, UserStat::UpvotesReceived)
                .await;
        }
        let own_vote = outcome.transition.resulting_vote();
        Ok(self
            .composer
            .compose_written(outcome.comment, caller, own_vote)
            .await)
    }

    pub async fn list_mine(
        &self,
        caller: &UserIdentity,
        page: PageRequest,
    ) -> Result<CommentPage, CoreError> {
        let (comments, total) = self.store.list_by_author(caller.id, page).await?;
        let data = self.composer.compose_flat(comments, Some(caller.id)).await?;
        Ok(CommentPage {
            data,
            pagination: Pagination::new(page, total),
        })
    }

    async fn ensure_solution(&self, solution_id: SolutionId) -> Result<(), CoreError> {
        if !self.solutions.solution_exists(solution_id).await? {
            return Err(CoreError::NotFound("solution"));
        }
        Ok(())
    }

    async fn bump_stat(&self, user_id: UserId, stat: UserStat) {
        if let Err(err) = self.stats.increment(user_id, stat).await {
            warn!(
                error = %err,
                user_id = %user_id,
                stat = stat.as_str(),
                "user stat increment failed"
            );
        }
    }
}
