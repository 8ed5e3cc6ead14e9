use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use codeforum_core::domain::comments::{Comment, DeleteOutcome};
use codeforum_core::domain::votes::{VoteKind, VoteTally, VoteTransition};
use codeforum_core::store::{CommentStore, NewComment, VoteOutcome};
use codeforum_core::types::{CommentContent, CommentId, PageRequest, SolutionId, UserId};
use codeforum_core::CoreError;

#[derive(Debug, Error)]
pub enum CommentsRepoError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Rejected(#[from] CoreError),
}

impl From<CommentsRepoError> for CoreError {
    fn from(err: CommentsRepoError) -> Self {
        match err {
            CommentsRepoError::Rejected(err) => err,
            CommentsRepoError::Sqlx(err) => {
                error!(error = %err, "comments repo query failed");
                CoreError::unavailable("comment storage")
            }
        }
    }
}

const COMMENT_COLUMNS: &str = r#"
    c.id,
    c.solution_id,
    c.author_id,
    c.content,
    c.parent_id,
    ARRAY(SELECT r.id FROM comments r WHERE r.parent_id = c.id ORDER BY r.seq) AS reply_ids,
    c.upvote_count,
    c.downvote_count,
    c.is_edited,
    c.is_deleted,
    c.created_at,
    c.updated_at
"#;

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: Uuid,
    solution_id: Uuid,
    author_id: Uuid,
    content: String,
    parent_id: Option<Uuid>,
    reply_ids: Vec<Uuid>,
    upvote_count: i32,
    downvote_count: i32,
    is_edited: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: CommentId::from_uuid(row.id),
            solution_id: SolutionId::from_uuid(row.solution_id),
            author_id: UserId::from_uuid(row.author_id),
            content: row.content,
            parent_id: row.parent_id.map(CommentId::from_uuid),
            reply_ids: row.reply_ids.into_iter().map(CommentId::from_uuid).collect(),
            votes: VoteTally::new(
                u32::try_from(row.upvote_count).unwrap_or(0),
                u32::try_from(row.downvote_count).unwrap_or(0),
            ),
            is_edited: row.is_edited,
            is_deleted: row.is_deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Postgres-backed store. Every mutation locks the affected comment rows
/// with `FOR UPDATE` inside a single transaction.
#[derive(Debug, Clone)]
pub struct PgCommentStore {
    pool: PgPool,
}

impl PgCommentStore {
    pub fn new(pool: PgPool) -> Self {
        PgCommentStore { pool }
    }

    async fn create_comment(&self, new: NewComment) -> Result<Comment, CommentsRepoError> {
        let mut tx = self.pool.begin().await?;
        if let Some(parent_id) = new.parent_id {
            let parent = lock_comment(&mut tx, parent_id)
                .await?
                .ok_or(CoreError::NotFound("parent comment"))?;
            parent.accepts_reply(new.solution_id)?;
        }
        let comment = Comment::new(
            new.solution_id,
            new.author_id,
            new.content,
            new.parent_id,
            new.created_at,
        );
        insert_comment(&mut tx, &comment).await?;
        tx.commit().await?;
        Ok(comment)
    }

    async fn edit_comment(
        &self,
        id: CommentId,
        caller: UserId,
        content: CommentContent,
        at: DateTime<Utc>,
    ) -> Result<Comment, CommentsRepoError> {
        let mut tx = self.pool.begin().await?;
        let mut comment = lock_comment(&mut tx, id)
            .await?
            .ok_or(CoreError::NotFound("comment"))?;
        comment.apply_edit(caller, content, at)?;
        sqlx::query(
            r#"
            UPDATE comments
            SET content = $2,
                is_edited = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(comment.id.as_uuid())
        .bind(&comment.content)
        .bind(comment.is_edited)
        .bind(comment.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(comment)
    }

    async fn delete_comment(
        &self,
        id: CommentId,
        caller: UserId,
        at: DateTime<Utc>,
    ) -> Result<DeleteOutcome, CommentsRepoError> {
        let mut tx = self.pool.begin().await?;
        let mut comment = lock_comment(&mut tx, id)
            .await?
            .ok_or(CoreError::NotFound("comment"))?;
        let outcome = comment.mark_deleted(caller, at)?;
        if outcome == DeleteOutcome::Deleted {
            sqlx::query(
                r#"
                UPDATE comments
                SET is_deleted = TRUE,
                    updated_at = $2
                WHERE id = $1
                "#,
            )
            .bind(comment.id.as_uuid())
            .bind(comment.updated_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(outcome)
    }

    async fn vote_comment(
        &self,
        id: CommentId,
        user_id: UserId,
        kind: VoteKind,
        at: DateTime<Utc>,
    ) -> Result<VoteOutcome, CommentsRepoError> {
        let mut tx = self.pool.begin().await?;
        let mut comment = lock_comment(&mut tx, id)
            .await?
            .ok_or(CoreError::NotFound("comment"))?;
        comment.ensure_votable()?;

        let existing = find_vote(&mut tx, id, user_id).await?;
        let transition = VoteTransition::plan(existing, kind);
        match transition.resulting_vote() {
            Some(kind) => upsert_vote(&mut tx, id, user_id, kind, at).await?,
            None => delete_vote(&mut tx, id, user_id).await?,
        }
        comment.votes.apply(transition);
        comment.updated_at = at;
        sqlx::query(
            r#"
            UPDATE comments
            SET upvote_count = $2,
                downvote_count = $3,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(comment.id.as_uuid())
        .bind(i32::try_from(comment.votes.upvotes).unwrap_or(i32::MAX))
        .bind(i32::try_from(comment.votes.downvotes).unwrap_or(i32::MAX))
        .bind(comment.updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(VoteOutcome {
            comment,
            transition,
        })
    }

    async fn find_comment(&self, id: CommentId) -> Result<Option<Comment>, CommentsRepoError> {
        let row = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Comment::from))
    }

    async fn find_comments(&self, ids: &[CommentId]) -> Result<Vec<Comment>, CommentsRepoError> {
        let uuids: Vec<Uuid> = ids.iter().map(CommentId::as_uuid).collect();
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = ANY($1)"
        ))
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;
        let mut by_id: HashMap<CommentId, Comment> = rows
            .into_iter()
            .map(Comment::from)
            .map(|comment| (comment.id, comment))
            .collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn find_user_votes(
        &self,
        user_id: UserId,
        ids: &[CommentId],
    ) -> Result<HashMap<CommentId, VoteKind>, CommentsRepoError> {
        let uuids: Vec<Uuid> = ids.iter().map(CommentId::as_uuid).collect();
        let rows = sqlx::query(
            r#"
            SELECT comment_id, kind
            FROM comment_votes
            WHERE user_id = $1 AND comment_id = ANY($2)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(&uuids)
        .fetch_all(&self.pool)
        .await?;
        let mut votes: HashMap<CommentId, VoteKind> = HashMap::with_capacity(rows.len());
        for row in rows {
            let comment_id: Uuid = row.try_get("comment_id")?;
            let kind: String = row.try_get("kind")?;
            votes.insert(CommentId::from_uuid(comment_id), kind.parse::<VoteKind>()?);
        }
        Ok(votes)
    }

    async fn page_top_level(
        &self,
        solution_id: SolutionId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CommentsRepoError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM comments
            WHERE solution_id = $1 AND parent_id IS NULL AND NOT is_deleted
            "#,
        )
        .bind(solution_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments c
            WHERE c.solution_id = $1 AND c.parent_id IS NULL AND NOT c.is_deleted
            ORDER BY c.created_at DESC, c.seq DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(solution_id.as_uuid())
        .bind(i64::from(page.limit()))
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await?;
        Ok((rows.into_iter().map(Comment::from).collect(), total_count(total)))
    }

    async fn page_by_author(
        &self,
        author_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CommentsRepoError> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM comments
            WHERE author_id = $1 AND NOT is_deleted
            "#,
        )
        .bind(author_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, CommentRow>(&format!(
            r#"
            SELECT {COMMENT_COLUMNS}
            FROM comments c
            WHERE c.author_id = $1 AND NOT c.is_deleted
            ORDER BY c.created_at DESC, c.seq DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(author_id.as_uuid())
        .bind(i64::from(page.limit()))
        .bind(offset(page))
        .fetch_all(&self.pool)
        .await?;
        Ok((rows.into_iter().map(Comment::from).collect(), total_count(total)))
    }
}

#[async_trait]
impl CommentStore for PgCommentStore {
    async fn create(&self, new: NewComment) -> Result<Comment, CoreError> {
        Ok(self.create_comment(new).await?)
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>, CoreError> {
        Ok(self.find_comment(id).await?)
    }

    async fn get_many(&self, ids: &[CommentId]) -> Result<Vec<Comment>, CoreError> {
        Ok(self.find_comments(ids).await?)
    }

    async fn edit(
        &self,
        id: CommentId,
        caller: UserId,
        content: CommentContent,
        at: DateTime<Utc>,
    ) -> Result<Comment, CoreError> {
        Ok(self.edit_comment(id, caller, content, at).await?)
    }

    async fn soft_delete(
        &self,
        id: CommentId,
        caller: UserId,
        at: DateTime<Utc>,
    ) -> Result<DeleteOutcome, CoreError> {
        Ok(self.delete_comment(id, caller, at).await?)
    }

    async fn cast_vote(
        &self,
        id: CommentId,
        user_id: UserId,
        kind: VoteKind,
        at: DateTime<Utc>,
    ) -> Result<VoteOutcome, CoreError> {
        Ok(self.vote_comment(id, user_id, kind, at).await?)
    }

    async fn user_votes(
        &self,
        user_id: UserId,
        ids: &[CommentId],
    ) -> Result<HashMap<CommentId, VoteKind>, CoreError> {
        Ok(self.find_user_votes(user_id, ids).await?)
    }

    async fn list_top_level(
        &self,
        solution_id: SolutionId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CoreError> {
        Ok(self.page_top_level(solution_id, page).await?)
    }

    async fn list_by_author(
        &self,
        author_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CoreError> {
        Ok(self.page_by_author(author_id, page).await?)
    }
}

async fn lock_comment(
    tx: &mut Transaction<'_, Postgres>,
    id: CommentId,
) -> Result<Option<Comment>, CommentsRepoError> {
    let locked = sqlx::query(
        r#"
        SELECT id
        FROM comments
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await?;
    if locked.is_none() {
        return Ok(None);
    }
    let row = sqlx::query_as::<_, CommentRow>(&format!(
        "SELECT {COMMENT_COLUMNS} FROM comments c WHERE c.id = $1"
    ))
    .bind(id.as_uuid())
    .fetch_one(&mut **tx)
    .await?;
    Ok(Some(Comment::from(row)))
}

async fn insert_comment(
    tx: &mut Transaction<'_, Postgres>,
    comment: &Comment,
) -> Result<(), CommentsRepoError> {
    sqlx::query(
        r#"
        INSERT INTO comments (
            id,
            solution_id,
            author_id,
            content,
            parent_id,
            created_at,
            updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(comment.id.as_uuid())
    .bind(comment.solution_id.as_uuid())
    .bind(comment.author_id.as_uuid())
    .bind(&comment.content)
    .bind(comment.parent_id.map(|id| id.as_uuid()))
    .bind(comment.created_at)
    .bind(comment.updated_at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn find_vote(
    tx: &mut Transaction<'_, Postgres>,
    comment_id: CommentId,
    user_id: UserId,
) -> Result<Option<VoteKind>, CommentsRepoError> {
    let kind: Option<String> = sqlx::query_scalar(
        r#"
        SELECT kind
        FROM comment_votes
        WHERE comment_id = $1 AND user_id = $2
        "#,
    )
    .bind(comment_id.as_uuid())
    .bind(user_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await?;
    Ok(kind.map(|kind| kind.parse::<VoteKind>()).transpose()?)
}

async fn upsert_vote(
    tx: &mut Transaction<'_, Postgres>,
    comment_id: CommentId,
    user_id: UserId,
    kind: VoteKind,
    at: DateTime<Utc>,
) -> Result<(), CommentsRepoError> {
    sqlx::query(
        r#"
        INSERT INTO comment_votes (comment_id, user_id, kind, cast_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (comment_id, user_id)
        DO UPDATE SET
            kind = EXCLUDED.kind,
            cast_at = EXCLUDED.cast_at
        "#,
    )
    .bind(comment_id.as_uuid())
    .bind(user_id.as_uuid())
    .bind(kind.as_str())
    .bind(at)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn delete_vote(
    tx: &mut Transaction<'_, Postgres>,
    comment_id: CommentId,
    user_id: UserId,
) -> Result<(), CommentsRepoError> {
    sqlx::query(
        r#"
        DELETE FROM comment_votes
        WHERE comment_id = $1 AND user_id = $2
        "#,
    )
    .bind(comment_id.as_uuid())
    .bind(user_id.as_uuid())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn offset(page: PageRequest) -> i64 {
    i64::try_from(page.offset()).unwrap_or(i64::MAX)
}

fn total_count(total: i64) -> u64 {
    u64::try_from(total).unwrap_or(0)
}
