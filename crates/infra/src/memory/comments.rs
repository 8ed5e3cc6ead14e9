use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};

use codeforum_core::domain::comments::{Comment, DeleteOutcome};
use codeforum_core::domain::votes::{VoteKind, VoteLedger};
use codeforum_core::store::{CommentStore, NewComment, VoteOutcome};
use codeforum_core::types::{CommentContent, CommentId, PageRequest, SolutionId, UserId};
use codeforum_core::CoreError;

#[derive(Debug)]
struct Entry {
    seq: u64,
    comment: Comment,
    ledger: VoteLedger,
}

type Slot = Arc<Mutex<Entry>>;

/// Comment store kept in process memory.
///
/// The index lock is only held long enough to clone a slot handle; all
/// read-modify-write work happens under the per-comment mutex. Replies are
/// inserted while the parent's mutex is held.
#[derive(Debug, Default)]
pub struct MemoryCommentStore {
    entries: RwLock<HashMap<CommentId, Slot>>,
    next_seq: AtomicU64,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: CommentId) -> Option<Slot> {
        self.entries.read().await.get(&id).cloned()
    }

    async fn require(&self, id: CommentId) -> Result<Slot, CoreError> {
        self.slot(id).await.ok_or(CoreError::NotFound("comment"))
    }

    async fn slots(&self, ids: &[CommentId]) -> Vec<(CommentId, Slot)> {
        let entries = self.entries.read().await;
        ids.iter()
            .filter_map(|id| entries.get(id).map(|slot| (*id, slot.clone())))
            .collect()
    }

    /// Comments matching `keep`, newest first.
    async fn collect_visible<F>(&self, keep: F) -> Vec<Comment>
    where
        F: Fn(&Comment) -> bool + Send + Sync,
    {
        let slots: Vec<Slot> = self.entries.read().await.values().cloned().collect();
        let mut matched = Vec::new();
        for slot in slots {
            let entry = slot.lock().await;
            if keep(&entry.comment) {
                matched.push((entry.seq, entry.comment.clone()));
            }
        }
        matched.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });
        matched.into_iter().map(|(_, comment)| comment).collect()
    }
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn create(&self, new: NewComment) -> Result<Comment, CoreError> {
        let parent_slot = match new.parent_id {
            Some(parent_id) => Some(
                self.slot(parent_id)
                    .await
                    .ok_or(CoreError::NotFound("parent comment"))?,
            ),
            None => None,
        };
        let mut parent = match parent_slot.as_ref() {
            Some(slot) => Some(slot.lock().await),
            None => None,
        };
        if let Some(parent) = parent.as_ref() {
            parent.comment.accepts_reply(new.solution_id)?;
        }

        let comment = Comment::new(
            new.solution_id,
            new.author_id,
            new.content,
            new.parent_id,
            new.created_at,
        );
        let entry = Entry {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            comment: comment.clone(),
            ledger: VoteLedger::default(),
        };
        let mut entries = self.entries.write().await;
        entries.insert(comment.id, Arc::new(Mutex::new(entry)));
        if let Some(parent) = parent.as_mut() {
            parent.comment.reply_ids.push(comment.id);
        }
        Ok(comment)
    }

    async fn get(&self, id: CommentId) -> Result<Option<Comment>, CoreError> {
        let Some(slot) = self.slot(id).await else {
            return Ok(None);
        };
        let entry = slot.lock().await;
        Ok(Some(entry.comment.clone()))
    }

    async fn get_many(&self, ids: &[CommentId]) -> Result<Vec<Comment>, CoreError> {
        let mut comments = Vec::with_capacity(ids.len());
        for (_, slot) in self.slots(ids).await {
            comments.push(slot.lock().await.comment.clone());
        }
        Ok(comments)
    }

    async fn edit(
        &self,
        id: CommentId,
        caller: UserId,
        content: CommentContent,
        at: DateTime<Utc>,
    ) -> Result<Comment, CoreError> {
        let slot = self.require(id).await?;
        let mut entry = slot.lock().await;
        entry.comment.apply_edit(caller, content, at)?;
        Ok(entry.comment.clone())
    }

    async fn soft_delete(
        &self,
        id: CommentId,
        caller: UserId,
        at: DateTime<Utc>,
    ) -> Result<DeleteOutcome, CoreError> {
        let slot = self.require(id).await?;
        let mut entry = slot.lock().await;
        entry.comment.mark_deleted(caller, at)
    }

    async fn cast_vote(
        &self,
        id: CommentId,
        user_id: UserId,
        kind: VoteKind,
        at: DateTime<Utc>,
    ) -> Result<VoteOutcome, CoreError> {
        let slot = self.require(id).await?;
        let mut entry = slot.lock().await;
        entry.comment.ensure_votable()?;
        let Entry {
            comment, ledger, ..
        } = &mut *entry;
        let transition = ledger.cast(user_id, kind, at);
        comment.votes = ledger.tally();
        comment.updated_at = at;
        Ok(VoteOutcome {
            comment: comment.clone(),
            transition,
        })
    }

    async fn user_votes(
        &self,
        user_id: UserId,
        ids: &[CommentId],
    ) -> Result<HashMap<CommentId, VoteKind>, CoreError> {
        let mut votes = HashMap::new();
        for (id, slot) in self.slots(ids).await {
            if let Some(kind) = slot.lock().await.ledger.vote_of(user_id) {
                votes.insert(id, kind);
            }
        }
        Ok(votes)
    }

    async fn list_top_level(
        &self,
        solution_id: SolutionId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CoreError> {
        let visible = self
            .collect_visible(|comment| {
                comment.solution_id == solution_id && !comment.is_reply() && !comment.is_deleted
            })
            .await;
        Ok((page.window(&visible), visible.len() as u64))
    }

    async fn list_by_author(
        &self,
        author_id: UserId,
        page: PageRequest,
    ) -> Result<(Vec<Comment>, u64), CoreError> {
        let visible = self
            .collect_visible(|comment| comment.author_id == author_id && !comment.is_deleted)
            .await;
        Ok((page.window(&visible), visible.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use chrono::{Duration, TimeZone, Utc};

    use super::MemoryCommentStore;
    use codeforum_core::domain::comments::Comment;
    use codeforum_core::domain::votes::{VoteKind, VoteTally};
    use codeforum_core::store::{CommentStore, NewComment};
    use codeforum_core::types::{CommentContent, CommentId, PageRequest, SolutionId, UserId};
    use codeforum_core::CoreError;

    fn new_comment(
        solution_id: SolutionId,
        author_id: UserId,
        parent_id: Option<CommentId>,
        minute: i64,
    ) -> NewComment {
        NewComment {
            solution_id,
            author_id,
            content: CommentContent::try_from("nice").unwrap(),
            parent_id,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    async fn top_level(store: &MemoryCommentStore, solution_id: SolutionId, minute: i64) -> Comment {
        store
            .create(new_comment(solution_id, UserId::new(), None, minute))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reply_is_appended_to_parent() {
        let store = MemoryCommentStore::new();
        let solution_id = SolutionId::new();
        let parent = top_level(&store, solution_id, 0).await;
        let first = store
            .create(new_comment(solution_id, UserId::new(), Some(parent.id), 1))
            .await
            .unwrap();
        let second = store
            .create(new_comment(solution_id, UserId::new(), Some(parent.id), 2))
            .await
            .unwrap();
        let parent = store.get(parent.id).await.unwrap().unwrap();
        assert_eq!(parent.reply_ids, vec![first.id, second.id]);
    }

    #[tokio::test]
    async fn reply_to_reply_is_rejected() {
        let store = MemoryCommentStore::new();
        let solution_id = SolutionId::new();
        let parent = top_level(&store, solution_id, 0).await;
        let reply = store
            .create(new_comment(solution_id, UserId::new(), Some(parent.id), 1))
            .await
            .unwrap();
        let err = store
            .create(new_comment(solution_id, UserId::new(), Some(reply.id), 2))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        let reply = store.get(reply.id).await.unwrap().unwrap();
        assert!(reply.reply_ids.is_empty());
    }

    #[tokio::test]
    async fn missing_or_deleted_parent_is_not_found() {
        let store = MemoryCommentStore::new();
        let solution_id = SolutionId::new();
        let err = store
            .create(new_comment(solution_id, UserId::new(), Some(CommentId::new()), 0))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("parent comment")));

        let parent = top_level(&store, solution_id, 0).await;
        store
            .soft_delete(parent.id, parent.author_id, Utc::now())
            .await
            .unwrap();
        let err = store
            .create(new_comment(solution_id, UserId::new(), Some(parent.id), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("parent comment")));
    }

    #[tokio::test]
    async fn listing_skips_deleted_and_replies_newest_first() {
        let store = MemoryCommentStore::new();
        let solution_id = SolutionId::new();
        let mut created = Vec::new();
        for minute in 0..7 {
            created.push(top_level(&store, solution_id, minute).await);
        }
        store
            .create(new_comment(solution_id, UserId::new(), Some(created[0].id), 10))
            .await
            .unwrap();
        top_level(&store, SolutionId::new(), 3).await;
        for index in [1, 4] {
            let comment = &created[index];
            store
                .soft_delete(comment.id, comment.author_id, Utc::now())
                .await
                .unwrap();
        }

        let expected: Vec<CommentId> = [6, 5, 3, 2, 0].iter().map(|i| created[*i].id).collect();
        let mut paged = Vec::new();
        for page in 1..=3 {
            let request = PageRequest::resolve(Some(page), Some(2), 20, 100);
            let (comments, total) = store.list_top_level(solution_id, request).await.unwrap();
            assert_eq!(total, 5);
            paged.extend(comments.into_iter().map(|comment| comment.id));
        }
        assert_eq!(paged, expected);

        let request = PageRequest::resolve(Some(9), Some(2), 20, 100);
        let (comments, total) = store.list_top_level(solution_id, request).await.unwrap();
        assert!(comments.is_empty());
        assert_eq!(total, 5);
    }

    #[tokio::test]
    async fn list_by_author_spans_solutions_and_replies() {
        let store = MemoryCommentStore::new();
        let author = UserId::new();
        let solution_a = SolutionId::new();
        let parent = top_level(&store, solution_a, 0).await;
        let reply = store
            .create(new_comment(solution_a, author, Some(parent.id), 1))
            .await
            .unwrap();
        let other = store
            .create(new_comment(SolutionId::new(), author, None, 2))
            .await
            .unwrap();
        let gone = store
            .create(new_comment(SolutionId::new(), author, None, 3))
            .await
            .unwrap();
        store.soft_delete(gone.id, author, Utc::now()).await.unwrap();

        let request = PageRequest::resolve(None, None, 10, 100);
        let (comments, total) = store.list_by_author(author, request).await.unwrap();
        assert_eq!(total, 2);
        let ids: Vec<CommentId> = comments.into_iter().map(|comment| comment.id).collect();
        assert_eq!(ids, vec![other.id, reply.id]);
    }

    #[tokio::test]
    async fn vote_on_deleted_comment_is_invalid_state() {
        let store = MemoryCommentStore::new();
        let comment = top_level(&store, SolutionId::new(), 0).await;
        store
            .soft_delete(comment.id, comment.author_id, Utc::now())
            .await
            .unwrap();
        let err = store
            .cast_vote(comment.id, UserId::new(), VoteKind::Up, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn user_votes_reports_only_active_votes() {
        let store = MemoryCommentStore::new();
        let solution_id = SolutionId::new();
        let a = top_level(&store, solution_id, 0).await;
        let b = top_level(&store, solution_id, 1).await;
        let voter = UserId::new();
        store.cast_vote(a.id, voter, VoteKind::Down, Utc::now()).await.unwrap();
        store.cast_vote(b.id, voter, VoteKind::Up, Utc::now()).await.unwrap();
        store.cast_vote(b.id, voter, VoteKind::Up, Utc::now()).await.unwrap();
        let votes = store.user_votes(voter, &[a.id, b.id]).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes.get(&a.id), Some(&VoteKind::Down));
        assert_eq!(store.user_vote(b.id, voter).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_votes_keep_exact_counts() {
        let store = Arc::new(MemoryCommentStore::new());
        let comment_id = top_level(&store, SolutionId::new(), 0).await.id;
        let voters: Vec<UserId> = (0..64).map(|_| UserId::new()).collect();

        let mut handles = Vec::new();
        for (index, voter) in voters.iter().copied().enumerate() {
            let store = store.clone();
            let kind = if index % 4 == 0 { VoteKind::Down } else { VoteKind::Up };
            handles.push(tokio::spawn(async move {
                store.cast_vote(comment_id, voter, kind, Utc::now()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let stored = store.get(comment_id).await.unwrap().unwrap();
        assert_eq!(stored.votes, VoteTally::new(48, 16));

        let mut handles = Vec::new();
        for voter in voters.iter().copied() {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.cast_vote(comment_id, voter, VoteKind::Up, Utc::now()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        // up-voters retracted, down-voters switched
        let stored = store.get(comment_id).await.unwrap().unwrap();
        assert_eq!(stored.votes, VoteTally::new(16, 0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_replies_are_all_recorded() {
        let store = Arc::new(MemoryCommentStore::new());
        let solution_id = SolutionId::new();
        let parent_id = top_level(&store, solution_id, 0).await.id;

        let mut handles = Vec::new();
        for minute in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .create(new_comment(solution_id, UserId::new(), Some(parent_id), minute))
                    .await
            }));
        }
        let mut created = HashSet::new();
        for handle in handles {
            created.insert(handle.await.unwrap().unwrap().id);
        }
        let parent = store.get(parent_id).await.unwrap().unwrap();
        assert_eq!(parent.reply_ids.len(), 32);
        let recorded: HashSet<CommentId> = parent.reply_ids.into_iter().collect();
        assert_eq!(recorded, created);
    }
}
