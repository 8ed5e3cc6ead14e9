//! Read side: turns stored comments into the threads served to clients.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::warn;

use crate::collaborators::IdentityResolver;
use crate::domain::comments::{Comment, CommentPage, DecoratedComment};
use crate::domain::identity::{AuthorView, UserIdentity};
use crate::domain::votes::VoteKind;
use crate::error::CoreError;
use crate::store::CommentStore;
use crate::types::{CommentId, PageRequest, Pagination, SolutionId, UserId};

#[derive(Clone)]
pub struct ThreadComposer {
    store: Arc<dyn CommentStore>,
    identities: Arc<dyn IdentityResolver>,
}

impl ThreadComposer {
    pub fn new(store: Arc<dyn CommentStore>, identities: Arc<dyn IdentityResolver>) -> Self {
        ThreadComposer { store, identities }
    }

    pub async fn compose_page(
        &self,
        solution_id: SolutionId,
        page: PageRequest,
        viewer: Option<UserId>,
    ) -> Result<CommentPage, CoreError> {
        let (roots, total) = self.store.list_top_level(solution_id, page).await?;
        let data = self.compose_threads(roots, viewer, Lookup::Strict).await?;
        Ok(CommentPage {
            data,
            pagination: Pagination::new(page, total),
        })
    }

    /// Deleted comments are treated as absent.
    pub async fn compose_single(
        &self,
        id: CommentId,
        viewer: Option<UserId>,
    ) -> Result<DecoratedComment, CoreError> {
        let comment = self
            .store
            .get(id)
            .await?
            .filter(|comment| !comment.is_deleted)
            .ok_or(CoreError::NotFound("comment"))?;
        self.compose_thread(comment, viewer).await
    }

    pub async fn compose_thread(
        &self,
        comment: Comment,
        viewer: Option<UserId>,
    ) -> Result<DecoratedComment, CoreError> {
        let mut threads = self
            .compose_threads(vec![comment], viewer, Lookup::Strict)
            .await?;
        threads.pop().ok_or(CoreError::NotFound("comment"))
    }

    /// Renders a comment the writer has just committed. Lookup failures leave
    /// fields blank instead of failing, and the writer's own vote and author
    /// fields come from the caller rather than from storage.
    pub async fn compose_written(
        &self,
        comment: Comment,
        writer: &UserIdentity,
        writer_vote: Option<VoteKind>,
    ) -> DecoratedComment {
        let own_comment = comment.author_id == writer.id;
        let fallback = DecoratedComment::new(&comment, None, None);
        let threads = self
            .compose_threads(vec![comment], Some(writer.id), Lookup::BestEffort)
            .await;
        let mut decorated = threads
            .ok()
            .and_then(|mut threads| threads.pop())
            .unwrap_or(fallback);
        decorated.user_vote = writer_vote;
        if own_comment && decorated.author.is_none() {
            decorated.author = Some(AuthorView::from(writer));
        }
        decorated
    }

    /// Decorates comments without loading their replies.
    pub async fn compose_flat(
        &self,
        comments: Vec<Comment>,
        viewer: Option<UserId>,
    ) -> Result<Vec<DecoratedComment>, CoreError> {
        let context = self.load_context(&comments, viewer, Lookup::Strict).await?;
        Ok(comments
            .iter()
            .map(|comment| context.decorate(comment))
            .collect())
    }

    async fn compose_threads(
        &self,
        roots: Vec<Comment>,
        viewer: Option<UserId>,
        lookup: Lookup,
    ) -> Result<Vec<DecoratedComment>, CoreError> {
        let reply_ids: Vec<CommentId> = roots
            .iter()
            .flat_map(|root| root.reply_ids.iter().copied())
            .collect();
        let replies: HashMap<CommentId, Comment> = if reply_ids.is_empty() {
            HashMap::new()
        } else {
            lookup
                .settle(self.store.get_many(&reply_ids).await, "replies")?
                .into_iter()
                .filter(|reply| !reply.is_deleted)
                .map(|reply| (reply.id, reply))
                .collect()
        };

        let mut everything: Vec<Comment> = roots.clone();
        everything.extend(replies.values().cloned());
        let context = self.load_context(&everything, viewer, lookup).await?;

        let mut threads = Vec::with_capacity(roots.len());
        for root in &roots {
            let mut decorated = context.decorate(root);
            for reply_id in &root.reply_ids {
                if let Some(reply) = replies.get(reply_id) {
                    decorated.replies.push(context.decorate(reply));
                }
            }
            threads.push(decorated);
        }
        Ok(threads)
    }

    async fn load_context(
        &self,
        comments: &[Comment],
        viewer: Option<UserId>,
        lookup: Lookup,
    ) -> Result<DecorationContext, CoreError> {
        let mut seen = HashSet::new();
        let author_ids: Vec<UserId> = comments
            .iter()
            .map(|comment| comment.author_id)
            .filter(|id| seen.insert(*id))
            .collect();
        let authors = if author_ids.is_empty() {
            HashMap::new()
        } else {
            lookup.settle(
                self.identities.resolve_identities(&author_ids).await,
                "authors",
            )?
        };
        let votes = match viewer {
            Some(viewer) if !comments.is_empty() => {
                let ids: Vec<CommentId> = comments.iter().map(|comment| comment.id).collect();
                lookup.settle(self.store.user_votes(viewer, &ids).await, "viewer votes")?
            }
            _ => HashMap::new(),
        };
        Ok(DecorationContext { authors, votes })
    }
}

#[derive(Debug, Clone, Copy)]
enum Lookup {
    Strict,
    BestEffort,
}

impl Lookup {
    /// Under `BestEffort` a failed lookup is logged and treated as empty.
    fn settle<T: Default>(
        self,
        result: Result<T, CoreError>,
        what: &'static str,
    ) -> Result<T, CoreError> {
        match (self, result) {
            (_, Ok(value)) => Ok(value),
            (Lookup::Strict, Err(err)) => Err(err),
            (Lookup::BestEffort, Err(err)) => {
                warn!(error = %err, lookup = what, "lookup failed while rendering a committed write");
                Ok(T::default())
            }
        }
    }
}

struct DecorationContext {
    authors: HashMap<UserId, UserIdentity>,
    votes: HashMap<CommentId, VoteKind>,
}

impl DecorationContext {
    fn decorate(&self, comment: &Comment) -> DecoratedComment {
        let author = self.authors.get(&comment.author_id).map(AuthorView::from);
        let user_vote = self.votes.get(&comment.id).copied();
        DecoratedComment::new(comment, author, user_vote)
    }
}
