use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::identity::AuthorView;
use crate::domain::votes::{VoteKind, VoteTally};
use crate::error::CoreError;
use crate::types::{CommentContent, CommentId, Pagination, SolutionId, UserId};

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: CommentId,
    pub solution_id: SolutionId,
    pub author_id: UserId,
    pub content: String,
    pub parent_id: Option<CommentId>,
    pub reply_ids: Vec<CommentId>,
    pub votes: VoteTally,
    pub is_edited: bool,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyDeleted,
}

impl Comment {
    pub fn new(
        solution_id: SolutionId,
        author_id: UserId,
        content: CommentContent,
        parent_id: Option<CommentId>,
        at: DateTime<Utc>,
    ) -> Self {
        Comment {
            id: CommentId::new(),
            solution_id,
            author_id,
            content: content.into_inner(),
            parent_id,
            reply_ids: Vec::new(),
            votes: VoteTally::default(),
            is_edited: false,
            is_deleted: false,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Checks that a new comment on `solution_id` may hang below this one.
    pub fn accepts_reply(&self, solution_id: SolutionId) -> Result<(), CoreError> {
        if self.is_deleted {
            return Err(CoreError::NotFound("parent comment"));
        }
        if self.is_reply() {
            return Err(CoreError::validation("cannot reply to a reply"));
        }
        if self.solution_id != solution_id {
            return Err(CoreError::validation(
                "parent comment belongs to a different solution",
            ));
        }
        Ok(())
    }

    pub fn apply_edit(
        &mut self,
        caller: UserId,
        content: CommentContent,
        at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.ensure_author(caller, "not authorized to update this comment")?;
        if self.is_deleted {
            return Err(CoreError::invalid_state("cannot update deleted comment"));
        }
        let content = content.into_inner();
        if content != self.content {
            self.content = content;
            self.is_edited = true;
        }
        self.updated_at = at;
        Ok(())
    }

    pub fn mark_deleted(&mut self, caller: UserId, at: DateTime<Utc>) -> Result<DeleteOutcome, CoreError> {
        self.ensure_author(caller, "not authorized to delete this comment")?;
        if self.is_deleted {
            return Ok(DeleteOutcome::AlreadyDeleted);
        }
        self.is_deleted = true;
        self.updated_at = at;
        Ok(DeleteOutcome::Deleted)
    }

    pub fn ensure_votable(&self) -> Result<(), CoreError> {
        if self.is_deleted {
            return Err(CoreError::invalid_state("cannot vote on deleted comment"));
        }
        Ok(())
    }

    fn ensure_author(&self, caller: UserId, message: &str) -> Result<(), CoreError> {
        if self.author_id != caller {
            return Err(CoreError::forbidden(message));
        }
        Ok(())
    }
}

/// A comment as served to clients: author fields, viewer vote and visible replies.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecoratedComment {
    pub id: CommentId,
    pub solution_id: SolutionId,
    pub author: Option<AuthorView>,
    pub content: String,
    pub parent_comment_id: Option<CommentId>,
    pub replies: Vec<DecoratedComment>,
    pub upvotes: u32,
    pub downvotes: u32,
    pub score: i64,
    pub vote_ratio: f64,
    pub user_vote: Option<VoteKind>,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DecoratedComment {
    pub fn new(comment: &Comment, author: Option<AuthorView>, user_vote: Option<VoteKind>) -> Self {
        DecoratedComment {
            id: comment.id,
            solution_id: comment.solution_id,
            author,
            content: comment.content.clone(),
            parent_comment_id: comment.parent_id,
            replies: Vec::new(),
            upvotes: comment.votes.upvotes,
            downvotes: comment.votes.downvotes,
            score: comment.votes.score(),
            vote_ratio: comment.votes.ratio(),
            user_vote,
            is_edited: comment.is_edited,
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentPage {
    pub data: Vec<DecoratedComment>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Comment, DeleteOutcome};
    use crate::error::CoreError;
    use crate::types::{CommentContent, CommentId, SolutionId, UserId};

    fn comment(author: UserId) -> Comment {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Comment::new(
            SolutionId::new(),
            author,
            CommentContent::try_from("nice").unwrap(),
            None,
            at,
        )
    }

    #[test]
    fn edit_by_author_marks_edited() {
        let author = UserId::new();
        let mut comment = comment(author);
        let later = comment.created_at + Duration::minutes(1);
        comment
            .apply_edit(author, CommentContent::try_from("nicer").unwrap(), later)
            .unwrap();
        assert_eq!(comment.content, "nicer");
        assert!(comment.is_edited);
        assert_eq!(comment.updated_at, later);
    }

    #[test]
    fn edit_by_other_user_is_forbidden() {
        let mut comment = comment(UserId::new());
        let err = comment
            .apply_edit(UserId::new(), CommentContent::try_from("x").unwrap(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
        assert!(!comment.is_edited);
    }

    #[test]
    fn deleted_comment_rejects_edit_and_votes() {
        let author = UserId::new();
        let mut comment = comment(author);
        assert_eq!(
            comment.mark_deleted(author, Utc::now()).unwrap(),
            DeleteOutcome::Deleted
        );
        let err = comment
            .apply_edit(author, CommentContent::try_from("x").unwrap(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert!(matches!(comment.ensure_votable(), Err(CoreError::InvalidState(_))));
    }

    #[test]
    fn repeated_delete_is_a_no_op() {
        let author = UserId::new();
        let mut comment = comment(author);
        comment.mark_deleted(author, Utc::now()).unwrap();
        let stamp = comment.updated_at;
        assert_eq!(
            comment.mark_deleted(author, Utc::now()).unwrap(),
            DeleteOutcome::AlreadyDeleted
        );
        assert!(comment.is_deleted);
        assert_eq!(comment.updated_at, stamp);
    }

    #[test]
    fn replies_cannot_be_parents() {
        let mut reply = comment(UserId::new());
        reply.parent_id = Some(CommentId::new());
        let err = reply.accepts_reply(reply.solution_id).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn deleted_parent_reads_as_missing() {
        let author = UserId::new();
        let mut parent = comment(author);
        parent.mark_deleted(author, Utc::now()).unwrap();
        let err = parent.accepts_reply(parent.solution_id).unwrap_err();
        assert!(matches!(err, CoreError::NotFound("parent comment")));
    }

    #[test]
    fn parent_must_share_solution() {
        let parent = comment(UserId::new());
        let err = parent.accepts_reply(SolutionId::new()).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
