//! C3 — Account & Authority (spec §3 "Account", "Authority"; §4 weighted
//! multi-sig authorities, owner-authority history, recovery requests, proxy
//! chains, membership tiers).
use std::collections::BTreeMap;

use chain_primitives::{ChainError, Component, ErrorCode, Id, PublicKey, Timestamp};
use chain_store::{HashIndex, Table};
use serde::{Deserialize, Serialize};

pub type AccountId = Id<Account>;
pub type RecoveryRequestId = Id<RecoveryRequest>;

/// Authority resolution never recurses past this depth (spec §4:
/// "MAX_SIG_CHECK_DEPTH"), protecting both against pathological legitimate
/// authority graphs and against an attacker trying to stall block
/// application with a deeply nested account-authority reference.
pub const MAX_SIG_CHECK_DEPTH: u32 = 6;

/// Maximum proxy chain depth (spec §4: "proxy depth <= 4, acyclic").
pub const MAX_PROXY_DEPTH: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MembershipTier {
    None,
    Basic,
    Premium,
    Lifetime,
}

/// A weighted-threshold authority: satisfied when the sum of matched key
/// and account-authority weights meets or exceeds `weight_threshold`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub key_auths: BTreeMap<PublicKey, u16>,
    pub account_auths: BTreeMap<AccountId, u16>,
}

impl Authority {
    /// Total weight contributed by keys present in `signing_keys`, plus the
    /// weight of any `account_auths` entry that itself resolves (via
    /// `resolve_account`) within the remaining recursion budget.
    fn weight_from(&self, signing_keys: &[PublicKey], resolve_account: &impl Fn(AccountId) -> Option<Authority>, depth: u32) -> u32 {
        let mut total: u32 = 0;
        for (key, weight) in &self.key_auths {
            if signing_keys.contains(key) {
                total = total.saturating_add(u32::from(*weight));
            }
        }
        if depth < MAX_SIG_CHECK_DEPTH {
            for (account, weight) in &self.account_auths {
                if let Some(sub) = resolve_account(*account) {
                    if sub.is_satisfied_at_depth(signing_keys, resolve_account, depth + 1) {
                        total = total.saturating_add(u32::from(*weight));
                    }
                }
            }
        }
        total
    }

    fn is_satisfied_at_depth(&self, signing_keys: &[PublicKey], resolve_account: &impl Fn(AccountId) -> Option<Authority>, depth: u32) -> bool {
        self.weight_from(signing_keys, resolve_account, depth) >= self.weight_threshold
    }

    /// Checks whether `signing_keys` satisfies this authority, recursively
    /// resolving nested account authorities up to [`MAX_SIG_CHECK_DEPTH`].
    pub fn is_satisfied(&self, signing_keys: &[PublicKey], resolve_account: impl Fn(AccountId) -> Option<Authority>) -> bool {
        self.is_satisfied_at_depth(signing_keys, &resolve_account, 0)
    }
}

/// A business (organisation-style) account's role set (spec §4: "the
/// business's role set (chief, executive, officer, member,
/// authorised_*_for_role) must grant the signatory the right to act on
/// behalf of the account for this operation class").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BusinessRole {
    Chief,
    Executive,
    Officer,
    Member,
    AuthorizedTransfer,
    AuthorizedContent,
    AuthorizedGeneral,
    AuthorizedNetwork,
    AuthorizedGovernance,
    AuthorizedVoteOfficer,
    AuthorizedVoteExecutive,
    AuthorizedRequest,
    AuthorizedInvite,
    AuthorizedBlacklist,
}

/// The operation classes business-role authorisation is checked against
/// (spec §4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationClass {
    Transfer,
    Content,
    General,
    Network,
    Governance,
    VoteOfficer,
    VoteExecutive,
    Request,
    Invite,
    Blacklist,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub owner: Authority,
    pub active: Authority,
    pub posting: Authority,
    pub memo_key: Option<PublicKey>,
    pub recovery_account: Option<AccountId>,
    pub created_at: Timestamp,
    pub last_owner_update: Timestamp,
    pub proxy: Option<AccountId>,
    pub membership: MembershipTier,
    pub membership_expires: Option<Timestamp>,
    pub business_roles: Vec<BusinessRole>,
    pub active_flag: bool,
}

impl Account {
    pub fn has_role(&self, role: BusinessRole) -> bool {
        self.business_roles.contains(&role)
    }

    pub fn is_chief(&self) -> bool {
        self.has_role(BusinessRole::Chief)
    }

    pub fn is_executive(&self) -> bool {
        self.has_role(BusinessRole::Chief) || self.has_role(BusinessRole::Executive)
    }

    pub fn is_officer(&self) -> bool {
        self.is_executive() || self.has_role(BusinessRole::Officer)
    }

    /// Is this account authorised to act on behalf of its owning business
    /// for operations of `class`? Chiefs and executives can act in every
    /// class; officers and plain members need the matching
    /// `Authorized*` role (spec §4's `is_authorized_{transfer,content,...}`
    /// predicate family).
    pub fn is_authorized_for(&self, class: OperationClass) -> bool {
        if self.is_executive() {
            return true;
        }
        let required = match class {
            OperationClass::Transfer => BusinessRole::AuthorizedTransfer,
            OperationClass::Content => BusinessRole::AuthorizedContent,
            OperationClass::General => BusinessRole::AuthorizedGeneral,
            OperationClass::Network => BusinessRole::AuthorizedNetwork,
            OperationClass::Governance => BusinessRole::AuthorizedGovernance,
            OperationClass::VoteOfficer => BusinessRole::AuthorizedVoteOfficer,
            OperationClass::VoteExecutive => BusinessRole::AuthorizedVoteExecutive,
            OperationClass::Request => BusinessRole::AuthorizedRequest,
            OperationClass::Invite => BusinessRole::AuthorizedInvite,
            OperationClass::Blacklist => BusinessRole::AuthorizedBlacklist,
        };
        self.has_role(required)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryRequestStatus {
    Pending,
    Expired,
}

/// Account-recovery request lifecycle (spec §4: a recovery account proposes
/// a new owner authority; the compromised account has a window to confirm
/// it with its *old* owner key).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryRequest {
    pub id: RecoveryRequestId,
    pub account_to_recover: AccountId,
    pub new_owner_authority: Authority,
    pub expires_at: Timestamp,
    pub status: RecoveryRequestStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerAuthorityHistoryEntry {
    pub account: AccountId,
    pub previous_owner_authority: Authority,
    pub last_valid_time: Timestamp,
}

#[derive(Default)]
pub struct AccountBook {
    pub accounts: Table<AccountId, Account>,
    pub by_name: HashIndex<String, AccountId>,
    pub recovery_requests: Table<RecoveryRequestId, RecoveryRequest>,
    pub owner_history: Table<(AccountId, u64), OwnerAuthorityHistoryEntry>,
    pub next_account_id: chain_primitives::IdAllocator<Account>,
    pub next_recovery_id: chain_primitives::IdAllocator<RecoveryRequest>,
}

impl chain_store::Transactional for AccountBook {
    fn begin_scope(&mut self) {
        self.accounts.begin_scope();
        self.by_name.begin_scope();
        self.recovery_requests.begin_scope();
        self.owner_history.begin_scope();
    }
    fn commit_scope(&mut self) {
        self.accounts.commit_scope();
        self.by_name.commit_scope();
        self.recovery_requests.commit_scope();
        self.owner_history.commit_scope();
    }
    fn abort_scope(&mut self) {
        self.accounts.abort_scope();
        self.by_name.abort_scope();
        self.recovery_requests.abort_scope();
        self.owner_history.abort_scope();
    }
}

impl AccountBook {
    pub fn resolve_authority(&self, account: AccountId, which: impl Fn(&Account) -> &Authority) -> Option<Authority> {
        self.accounts.get(&account).map(which).cloned()
    }

    pub fn create(&mut self, name: String, owner: Authority, active: Authority, posting: Authority, created_at: Timestamp) -> Result<AccountId, ChainError> {
        if self.by_name.get(&name).is_some() {
            return Err(chain_primitives::chain_error!(
                ErrorCode::DuplicateId,
                Component::AccountAuthority,
                "account name '{name}' already registered"
            ));
        }
        let id = self.next_account_id.allocate();
        let account = Account {
            id,
            name: name.clone(),
            owner,
            active,
            posting,
            memo_key: None,
            recovery_account: None,
            created_at,
            last_owner_update: created_at,
            proxy: None,
            membership: MembershipTier::None,
            membership_expires: None,
            business_roles: Vec::new(),
            active_flag: true,
        };
        self.accounts.insert(id, account);
        self.by_name.insert(name, id);
        Ok(id)
    }

    /// Sets `account`'s proxy, rejecting both cycles and chains deeper than
    /// [`MAX_PROXY_DEPTH`] (spec §4).
    pub fn set_proxy(&mut self, account: AccountId, proxy: AccountId) -> Result<(), ChainError> {
        if account == proxy {
            return Err(chain_primitives::chain_error!(
                ErrorCode::ProxyCycle,
                Component::AccountAuthority,
                "account {account} cannot proxy to itself"
            ));
        }
        let mut current = proxy;
        let mut depth = 1;
        loop {
            if current == account {
                return Err(chain_primitives::chain_error!(
                    ErrorCode::ProxyCycle,
                    Component::AccountAuthority,
                    "setting {account}'s proxy to {proxy} would create a cycle"
                ));
            }
            match self.accounts.get(&current).and_then(|a| a.proxy) {
                Some(next) => {
                    depth += 1;
                    if depth > MAX_PROXY_DEPTH {
                        return Err(chain_primitives::chain_error!(
                            ErrorCode::ProxyDepthExceeded,
                            Component::AccountAuthority,
                            "proxy chain from {account} would exceed depth {MAX_PROXY_DEPTH}"
                        ));
                    }
                    current = next;
                }
                None => break,
            }
        }
        self.accounts.modify(&account, |a| a.proxy = Some(proxy));
        Ok(())
    }

    /// Replaces `account`'s owner authority, archiving the previous one
    /// (spec §4: owner-authority history lets a recovery request check
    /// whether an attacker-supplied key was already the legitimate owner
    /// key within the recovery window).
    pub fn update_owner_authority(&mut self, account: AccountId, new_owner: Authority, now: Timestamp) -> Result<(), ChainError> {
        let previous = self
            .accounts
            .get(&account)
            .ok_or_else(|| chain_primitives::chain_error!(ErrorCode::UnknownEntity, Component::AccountAuthority, "no such account {account}"))?
            .owner
            .clone();
        let seq = self.owner_history.iter().filter(|((a, _), _)| *a == account).count() as u64;
        self.owner_history.insert(
            (account, seq),
            OwnerAuthorityHistoryEntry { account, previous_owner_authority: previous, last_valid_time: now },
        );
        self.accounts.modify(&account, |a| {
            a.owner = new_owner;
            a.last_owner_update = now;
        });
        Ok(())
    }

    pub fn request_recovery(&mut self, account_to_recover: AccountId, new_owner_authority: Authority, expires_at: Timestamp) -> RecoveryRequestId {
        let id = self.next_recovery_id.allocate();
        self.recovery_requests.insert(
            id,
            RecoveryRequest { id, account_to_recover, new_owner_authority, expires_at, status: RecoveryRequestStatus::Pending },
        );
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(b: u8) -> PublicKey {
        let mut bytes = [0u8; 33];
        bytes[0] = b;
        PublicKey(bytes)
    }

    fn single_key_authority(k: PublicKey) -> Authority {
        let mut a = Authority { weight_threshold: 1, ..Default::default() };
        a.key_auths.insert(k, 1);
        a
    }

    #[test]
    fn authority_satisfied_by_matching_key() {
        let a = single_key_authority(key(1));
        assert!(a.is_satisfied(&[key(1)], |_| None));
        assert!(!a.is_satisfied(&[key(2)], |_| None));
    }

    #[test]
    fn proxy_rejects_direct_and_indirect_cycles() {
        let mut book = AccountBook::default();
        let a = book.create("alice".into(), Authority::default(), Authority::default(), Authority::default(), Timestamp::EPOCH).unwrap();
        let b = book.create("bob".into(), Authority::default(), Authority::default(), Authority::default(), Timestamp::EPOCH).unwrap();
        book.set_proxy(a, b).unwrap();
        // bob -> alice would close a 2-cycle
        assert!(book.set_proxy(b, a).is_err());
        assert!(book.set_proxy(a, a).is_err());
    }

    #[test]
    fn proxy_chain_depth_is_bounded() {
        let mut book = AccountBook::default();
        let mut ids = Vec::new();
        for i in 0..6 {
            ids.push(book.create(format!("acct{i}"), Authority::default(), Authority::default(), Authority::default(), Timestamp::EPOCH).unwrap());
        }
        for i in 0..4 {
            book.set_proxy(ids[i], ids[i + 1]).unwrap();
        }
        // chain is now 0->1->2->3->4 (depth 4), extending to 5 should fail
        assert!(book.set_proxy(ids[4], ids[5]).is_err());
    }

    #[test]
    fn owner_update_is_archived_in_history() {
        let mut book = AccountBook::default();
        let a = book.create("alice".into(), single_key_authority(key(1)), Authority::default(), Authority::default(), Timestamp::EPOCH).unwrap();
        book.update_owner_authority(a, single_key_authority(key(2)), Timestamp::from_secs(10)).unwrap();
        assert_eq!(book.owner_history.iter().filter(|((acc, _), _)| *acc == a).count(), 1);
    }
}
