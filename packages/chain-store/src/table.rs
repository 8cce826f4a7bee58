//! Primary ordered-unique table: a `BTreeMap` plus a stack of undo scopes.
//!
//! Every mutation records its inverse in the undo log for the current
//! (innermost) scope. `commit_scope` discards the log for that depth
//! (finalising); `abort_scope` replays it in reverse, restoring exactly the
//! pre-scope contents — this is the "begin scope -> lookup -> apply delta ->
//! commit" pattern from the design notes, generalised from the teacher's
//! closure-based `Map::update` into an explicit transactional handle.
use std::collections::BTreeMap;

/// One recorded inverse operation, applied in reverse order to undo a scope.
enum Patch<K, V> {
    /// Row did not exist before this scope; undo by removing it.
    Inserted(K),
    /// Row existed with this value before this scope; undo by restoring it.
    Overwritten(K, V),
    /// Row existed with this value before this scope; undo by re-inserting it.
    Removed(K, V),
}

/// An ordered, key-unique table over entities of type `V` keyed by `K`.
/// Iteration yields rows in key order (spec §4.1: "deterministic iteration
/// order... O(log n) lookup on ordered keys").
pub struct Table<K, V> {
    rows: BTreeMap<K, V>,
    scopes: Vec<Vec<Patch<K, V>>>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Table { rows: BTreeMap::new(), scopes: Vec::new() }
    }
}

impl<K: Ord + Clone, V: Clone> Table<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.rows.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.rows.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates all rows in ascending key order. Per spec §4.1 this must
    /// "remain valid across unrelated mutations" — since this borrows `self`
    /// immutably, the borrow checker already enforces that no mutation can
    /// happen during iteration; callers that need to mutate while iterating
    /// collect keys first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&K, &V)> {
        self.rows.iter()
    }

    pub fn keys(&self) -> impl DoubleEndedIterator<Item = &K> {
        self.rows.keys()
    }

    pub fn range<R>(&self, range: R) -> impl DoubleEndedIterator<Item = (&K, &V)>
    where
        R: std::ops::RangeBounds<K>,
    {
        self.rows.range(range)
    }

    /// Inserts a new row. Panics (a consensus bug, not a runtime condition)
    /// if `key` already exists — callers must `get` first to decide between
    /// insert and modify, matching the teacher's explicit load-then-save
    /// discipline.
    pub fn insert(&mut self, key: K, value: V) {
        let previous = self.rows.insert(key.clone(), value);
        if let Some(scope) = self.scopes.last_mut() {
            match previous {
                None => scope.push(Patch::Inserted(key)),
                Some(old) => scope.push(Patch::Overwritten(key, old)),
            }
        } else {
            debug_assert!(previous.is_none(), "insert() overwrote an existing row outside a declared scope");
        }
    }

    /// Mutates an existing row in place through `f`, recording the
    /// pre-mutation value so an abort restores it exactly.
    pub fn modify(&mut self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        match self.rows.get_mut(key) {
            None => false,
            Some(slot) => {
                let before = slot.clone();
                f(slot);
                if let Some(scope) = self.scopes.last_mut() {
                    scope.push(Patch::Overwritten(key.clone(), before));
                }
                true
            }
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let removed = self.rows.remove(key);
        if let Some(value) = &removed {
            if let Some(scope) = self.scopes.last_mut() {
                scope.push(Patch::Removed(key.clone(), value.clone()));
            }
        }
        removed
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn commit_scope(&mut self) {
        let patches = self.scopes.pop().expect("commit_scope with no open scope");
        // Merge into the parent scope so an outer abort still unwinds rows
        // touched by this now-finalised inner scope.
        if let Some(parent) = self.scopes.last_mut() {
            parent.extend(patches);
        }
    }

    pub fn abort_scope(&mut self) {
        let patches = self.scopes.pop().expect("abort_scope with no open scope");
        for patch in patches.into_iter().rev() {
            match patch {
                Patch::Inserted(key) => {
                    self.rows.remove(&key);
                }
                Patch::Overwritten(key, old) => {
                    self.rows.insert(key, old);
                }
                Patch::Removed(key, old) => {
                    self.rows.insert(key, old);
                }
            }
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }
}
