//! C6 — Social Graph (spec §4: Comment/Vote/View/Share entities, curation
//! weighting, communities, moderation tags).
use chain_primitives::{ChainError, Component, ErrorCode, Id, Permlink, Timestamp};
use chain_store::{HashIndex, OrderedIndex, Table};
use serde::{Deserialize, Serialize};

use crate::state::account::AccountId;

pub type CommentId = Id<Comment>;
pub type CommunityId = Id<Community>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: AccountId,
    pub permlink: Permlink,
    pub parent: Option<CommentId>,
    pub community: Option<CommunityId>,
    pub created_at: Timestamp,
    pub last_payout_at: Option<Timestamp>,
    pub cashout_at: Option<Timestamp>,
    pub net_rshares: i128,
    pub total_vote_weight: u128,
    pub allow_votes: bool,
    pub allow_curation_rewards: bool,
    pub moderation_tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Vote {
    pub comment: CommentId,
    pub voter: AccountId,
    pub rshares: i128,
    pub weight_bps: i32,
    pub cast_at_secs: u64,
    pub ordinal: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct View {
    pub comment: CommentId,
    pub viewer: AccountId,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Share {
    pub comment: CommentId,
    pub sharer: AccountId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommunityAccess {
    Open,
    RestrictedPosting,
    PrivateReadOnly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Community {
    pub id: CommunityId,
    pub name: String,
    pub access: CommunityAccess,
    pub admins: Vec<AccountId>,
    pub moderators: Vec<AccountId>,
}

impl Community {
    pub fn can_post(&self, account: AccountId) -> bool {
        match self.access {
            CommunityAccess::Open => true,
            CommunityAccess::RestrictedPosting | CommunityAccess::PrivateReadOnly => {
                self.admins.contains(&account) || self.moderators.contains(&account)
            }
        }
    }
}

#[derive(Default)]
pub struct SocialBook {
    pub comments: Table<CommentId, Comment>,
    pub by_author_permlink: HashIndex<(AccountId, Permlink), CommentId>,
    pub votes: Table<(CommentId, AccountId), Vote>,
    pub views: Table<(CommentId, AccountId), View>,
    pub shares: Table<(CommentId, AccountId), Share>,
    pub communities: Table<CommunityId, Community>,
    pub by_cashout: OrderedIndex<u64, CommentId>,
    pub next_comment_id: chain_primitives::IdAllocator<Comment>,
    pub next_community_id: chain_primitives::IdAllocator<Community>,
}

impl chain_store::Transactional for SocialBook {
    fn begin_scope(&mut self) {
        self.comments.begin_scope();
        self.by_author_permlink.begin_scope();
        self.votes.begin_scope();
        self.views.begin_scope();
        self.shares.begin_scope();
        self.communities.begin_scope();
        self.by_cashout.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.comments.commit_scope();
        self.by_author_permlink.commit_scope();
        self.votes.commit_scope();
        self.views.commit_scope();
        self.shares.commit_scope();
        self.communities.commit_scope();
        self.by_cashout.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.comments.abort_scope();
        self.by_author_permlink.abort_scope();
        self.votes.abort_scope();
        self.views.abort_scope();
        self.shares.abort_scope();
        self.communities.abort_scope();
        self.by_cashout.abort_scope();
    }
}

impl SocialBook {
    pub fn post(&mut self, author: AccountId, permlink: Permlink, parent: Option<CommentId>, community: Option<CommunityId>, created_at: Timestamp, cashout_at: Option<Timestamp>) -> Result<CommentId, ChainError> {
        if self.by_author_permlink.get(&(author, permlink.clone())).is_some() {
            return Err(chain_primitives::chain_error!(
                ErrorCode::DuplicateId,
                Component::SocialGraph,
                "author {author} already has a post at permlink '{permlink}'"
            ));
        }
        let id = self.next_comment_id.allocate();
        let comment = Comment {
            id,
            author,
            permlink: permlink.clone(),
            parent,
            community,
            created_at,
            last_payout_at: None,
            cashout_at,
            net_rshares: 0,
            total_vote_weight: 0,
            allow_votes: true,
            allow_curation_rewards: true,
            moderation_tags: Vec::new(),
        };
        self.comments.insert(id, comment);
        self.by_author_permlink.insert((author, permlink), id);
        if let Some(cashout) = cashout_at {
            self.by_cashout.add(cashout.as_secs(), id);
        }
        Ok(id)
    }

    /// Casts (or replaces) a vote, applying `rshares` to the comment's net
    /// total. Each `(comment, voter)` pair can hold at most one vote at a
    /// time (spec §4: re-voting replaces the previous weight).
    pub fn vote(&mut self, comment: CommentId, voter: AccountId, rshares: i128, weight_bps: i32, cast_at_secs: u64) -> Result<(), ChainError> {
        let c = self.comments.get(&comment).ok_or_else(|| {
            chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::SocialGraph, "no such comment {comment}")
        })?;
        if !c.allow_votes {
            return Err(chain_primitives::chain_error!(ErrorCode::VotingRightsDeclined, Component::SocialGraph, "comment {comment} has voting disabled"));
        }
        let ordinal = self.votes.iter().filter(|((cid, _), _)| *cid == comment).count() as u32;
        let previous = self.votes.get(&(comment, voter)).map(|v| v.rshares).unwrap_or(0);
        let vote = Vote { comment, voter, rshares, weight_bps, cast_at_secs, ordinal };
        if self.votes.get(&(comment, voter)).is_some() {
            self.votes.modify(&(comment, voter), |v| *v = vote);
        } else {
            self.votes.insert((comment, voter), vote);
        }
        let delta = rshares - previous;
        self.comments.modify(&comment, |c| {
            c.net_rshares += delta;
            c.total_vote_weight = c.total_vote_weight.saturating_add(delta.unsigned_abs());
        });
        Ok(())
    }

    pub fn record_view(&mut self, comment: CommentId, viewer: AccountId) {
        self.views.insert((comment, viewer), View { comment, viewer });
    }

    pub fn record_share(&mut self, comment: CommentId, sharer: AccountId) {
        self.shares.insert((comment, sharer), Share { comment, sharer });
    }

    pub fn due_for_cashout(&self, now: Timestamp) -> Vec<CommentId> {
        self.by_cashout.range(0..=now.as_secs()).flat_map(|(_, ids)| ids.iter().copied()).collect()
    }

    pub fn mark_paid_out(&mut self, comment: CommentId, now: Timestamp) {
        if let Some(c) = self.comments.get(&comment) {
            if let Some(cashout) = c.cashout_at {
                self.by_cashout.remove(&cashout.as_secs(), &comment);
            }
        }
        self.comments.modify(&comment, |c| {
            c.last_payout_at = Some(now);
            c.cashout_at = None;
        });
    }

    pub fn create_community(&mut self, name: String, access: CommunityAccess, founder: AccountId) -> CommunityId {
        let id = self.next_community_id.allocate();
        self.communities.insert(id, Community { id, name, access, admins: vec![founder], moderators: Vec::new() });
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn pl(s: &str) -> Permlink {
        Permlink::from_str(s).unwrap()
    }

    #[test]
    fn duplicate_permlink_for_same_author_is_rejected() {
        let mut book = SocialBook::default();
        book.post(AccountId::new(1), pl("hello-world"), None, None, Timestamp::EPOCH, None).unwrap();
        assert!(book.post(AccountId::new(1), pl("hello-world"), None, None, Timestamp::EPOCH, None).is_err());
    }

    #[test]
    fn revoting_replaces_previous_weight() {
        let mut book = SocialBook::default();
        let id = book.post(AccountId::new(1), pl("hello-world"), None, None, Timestamp::EPOCH, None).unwrap();
        book.vote(id, AccountId::new(2), 100, 10_000, 0).unwrap();
        assert_eq!(book.comments.get(&id).unwrap().net_rshares, 100);
        book.vote(id, AccountId::new(2), 40, 4_000, 10).unwrap();
        assert_eq!(book.comments.get(&id).unwrap().net_rshares, 40);
    }

    #[test]
    fn due_for_cashout_respects_the_cashout_time() {
        let mut book = SocialBook::default();
        let id = book.post(AccountId::new(1), pl("hello-world"), None, None, Timestamp::EPOCH, Some(Timestamp::from_secs(100))).unwrap();
        assert!(book.due_for_cashout(Timestamp::from_secs(50)).is_empty());
        assert_eq!(book.due_for_cashout(Timestamp::from_secs(100)), vec![id]);
        book.mark_paid_out(id, Timestamp::from_secs(100));
        assert!(book.due_for_cashout(Timestamp::from_secs(200)).is_empty());
    }
}
