//! Per-comment vote bookkeeping.
//!
//! Every backend runs the same toggle policy: a first vote is added, repeating
//! the same kind retracts it and the opposite kind switches it. The policy is
//! computed by [`VoteTransition::plan`] and applied to the counters with
//! [`VoteTally::apply`], so counters never move independently of the entries.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteKind {
    Up,
    Down,
}

impl VoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VoteKind::Up => "up",
            VoteKind::Down => "down",
        }
    }
}

impl FromStr for VoteKind {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "up" => Ok(VoteKind::Up),
            "down" => Ok(VoteKind::Down),
            _ => Err(CoreError::validation(
                "vote type must be either \"up\" or \"down\"",
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub user_id: UserId,
    pub kind: VoteKind,
    pub cast_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    Added(VoteKind),
    Retracted(VoteKind),
    Switched { from: VoteKind, to: VoteKind },
}

impl VoteTransition {
    pub fn plan(existing: Option<VoteKind>, requested: VoteKind) -> Self {
        match existing {
            None => VoteTransition::Added(requested),
            Some(current) if current == requested => VoteTransition::Retracted(current),
            Some(current) => VoteTransition::Switched {
                from: current,
                to: requested,
            },
        }
    }

    /// The vote the user holds once this transition is applied.
    pub fn resulting_vote(self) -> Option<VoteKind> {
        match self {
            VoteTransition::Added(kind) => Some(kind),
            VoteTransition::Retracted(_) => None,
            VoteTransition::Switched { to, .. } => Some(to),
        }
    }

    /// Net change to the (up, down) counters.
    pub fn counter_deltas(self) -> (i32, i32) {
        fn delta(kind: VoteKind, amount: i32) -> (i32, i32) {
            match kind {
                VoteKind::Up => (amount, 0),
                VoteKind::Down => (0, amount),
            }
        }
        match self {
            VoteTransition::Added(kind) => delta(kind, 1),
            VoteTransition::Retracted(kind) => delta(kind, -1),
            VoteTransition::Switched { from, to } => {
                let (up_a, down_a) = delta(from, -1);
                let (up_b, down_b) = delta(to, 1);
                (up_a + up_b, down_a + down_b)
            }
        }
    }

    /// True only when the comment author gains an upvote they did not hold before.
    pub fn awards_upvote(self) -> bool {
        matches!(
            self,
            VoteTransition::Added(VoteKind::Up)
                | VoteTransition::Switched {
                    to: VoteKind::Up,
                    ..
                }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VoteTally {
    pub upvotes: u32,
    pub downvotes: u32,
}

impl VoteTally {
    pub fn new(upvotes: u32, downvotes: u32) -> Self {
        VoteTally { upvotes, downvotes }
    }

    pub fn apply(&mut self, transition: VoteTransition) {
        let (up, down) = transition.counter_deltas();
        self.upvotes = self.upvotes.saturating_add_signed(up);
        self.downvotes = self.downvotes.saturating_add_signed(down);
    }

    pub fn score(&self) -> i64 {
        i64::from(self.upvotes) - i64::from(self.downvotes)
    }

    /// Share of upvotes in percent, one decimal place.
    pub fn ratio(&self) -> f64 {
        let total = u64::from(self.upvotes) + u64::from(self.downvotes);
        if total == 0 {
            return 0.0;
        }
        let percent = f64::from(self.upvotes) / total as f64 * 100.0;
        (percent * 10.0).round() / 10.0
    }
}

/// In-memory ledger: at most one vote per user, counters kept in lockstep.
#[derive(Debug, Clone, Default)]
pub struct VoteLedger {
    votes: HashMap<UserId, Vote>,
    tally: VoteTally,
}

impl VoteLedger {
    pub fn cast(&mut self, user_id: UserId, kind: VoteKind, at: DateTime<Utc>) -> VoteTransition {
        let existing = self.votes.get(&user_id).map(|vote| vote.kind);
        let transition = VoteTransition::plan(existing, kind);
        match transition.resulting_vote() {
            Some(kind) => {
                self.votes.insert(
                    user_id,
                    Vote {
                        user_id,
                        kind,
                        cast_at: at,
                    },
                );
            }
            None => {
                self.votes.remove(&user_id);
            }
        }
        self.tally.apply(transition);
        transition
    }

    pub fn vote_of(&self, user_id: UserId) -> Option<VoteKind> {
        self.votes.get(&user_id).map(|vote| vote.kind)
    }

    pub fn get(&self, user_id: UserId) -> Option<&Vote> {
        self.votes.get(&user_id)
    }

    pub fn tally(&self) -> VoteTally {
        self.tally
    }
}
