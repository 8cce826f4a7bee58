//! Secondary indices over a [`Table`](crate::table::Table): ordered
//! (possibly non-unique, e.g. "limit orders by price") and hashed (unique,
//! e.g. "account id by name"). Both are transactional in the same way as
//! `Table`, so a `Store`'s `begin/commit/abort_scope` can fan out to every
//! index touched by an operation and have them all unwind together.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;

enum SetPatch<IK, K> {
    Added(IK, K),
    Removed(IK, K),
}

/// Ordered secondary index: `index key -> set of primary keys`, iterated in
/// index-key order. Re-indexing (spec §4.1: "mutations that change a key
/// trigger re-indexing of that row only") is just a `remove` under the old
/// index key followed by an `add` under the new one.
pub struct OrderedIndex<IK, K> {
    entries: BTreeMap<IK, BTreeSet<K>>,
    scopes: Vec<Vec<SetPatch<IK, K>>>,
}

impl<IK, K> Default for OrderedIndex<IK, K> {
    fn default() -> Self {
        OrderedIndex { entries: BTreeMap::new(), scopes: Vec::new() }
    }
}

impl<IK: Ord + Clone, K: Ord + Clone> OrderedIndex<IK, K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, index_key: IK, primary_key: K) {
        self.entries.entry(index_key.clone()).or_default().insert(primary_key.clone());
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(SetPatch::Added(index_key, primary_key));
        }
    }

    pub fn remove(&mut self, index_key: &IK, primary_key: &K) {
        let mut now_empty = false;
        if let Some(set) = self.entries.get_mut(index_key) {
            set.remove(primary_key);
            now_empty = set.is_empty();
        }
        if now_empty {
            self.entries.remove(index_key);
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(SetPatch::Removed(index_key.clone(), primary_key.clone()));
        }
    }

    /// Re-indexes a single row: removes it from `old_key`'s bucket and adds
    /// it under `new_key`, without touching any other row.
    pub fn reindex(&mut self, old_key: &IK, new_key: IK, primary_key: &K) {
        if old_key == &new_key {
            return;
        }
        self.remove(old_key, primary_key);
        self.add(new_key, primary_key.clone());
    }

    pub fn iter_ascending(&self) -> impl DoubleEndedIterator<Item = (&IK, &BTreeSet<K>)> {
        self.entries.iter()
    }

    pub fn first(&self) -> Option<(&IK, &BTreeSet<K>)> {
        self.entries.iter().next()
    }

    pub fn range<R>(&self, range: R) -> impl DoubleEndedIterator<Item = (&IK, &BTreeSet<K>)>
    where
        R: std::ops::RangeBounds<IK>,
    {
        self.entries.range(range)
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn commit_scope(&mut self) {
        let patches = self.scopes.pop().expect("commit_scope with no open scope");
        if let Some(parent) = self.scopes.last_mut() {
            parent.extend(patches);
        }
    }

    pub fn abort_scope(&mut self) {
        let patches = self.scopes.pop().expect("abort_scope with no open scope");
        for patch in patches.into_iter().rev() {
            match patch {
                SetPatch::Added(ik, k) => {
                    if let Some(set) = self.entries.get_mut(&ik) {
                        set.remove(&k);
                        if set.is_empty() {
                            self.entries.remove(&ik);
                        }
                    }
                }
                SetPatch::Removed(ik, k) => {
                    self.entries.entry(ik).or_default().insert(k);
                }
            }
        }
    }
}

enum MapPatch<HK, K> {
    Inserted(HK),
    Overwritten(HK, K),
    Removed(HK, K),
}

/// Unique hashed index, e.g. account name -> account id (spec §3:
/// "references between entities are by id or by string name").
pub struct HashIndex<HK, K> {
    entries: HashMap<HK, K>,
    scopes: Vec<Vec<MapPatch<HK, K>>>,
}

impl<HK, K> Default for HashIndex<HK, K> {
    fn default() -> Self {
        HashIndex { entries: HashMap::new(), scopes: Vec::new() }
    }
}

impl<HK: Eq + Hash + Clone, K: Clone> HashIndex<HK, K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &HK) -> Option<&K> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: HK, value: K) {
        let previous = self.entries.insert(key.clone(), value);
        if let Some(scope) = self.scopes.last_mut() {
            match previous {
                None => scope.push(MapPatch::Inserted(key)),
                Some(old) => scope.push(MapPatch::Overwritten(key, old)),
            }
        }
    }

    pub fn remove(&mut self, key: &HK) -> Option<K> {
        let removed = self.entries.remove(key);
        if let Some(value) = &removed {
            if let Some(scope) = self.scopes.last_mut() {
                scope.push(MapPatch::Removed(key.clone(), value.clone()));
            }
        }
        removed
    }

    pub fn begin_scope(&mut self) {
        self.scopes.push(Vec::new());
    }

    pub fn commit_scope(&mut self) {
        let patches = self.scopes.pop().expect("commit_scope with no open scope");
        if let Some(parent) = self.scopes.last_mut() {
            parent.extend(patches);
        }
    }

    pub fn abort_scope(&mut self) {
        let patches = self.scopes.pop().expect("abort_scope with no open scope");
        for patch in patches.into_iter().rev() {
            match patch {
                MapPatch::Inserted(hk) => {
                    self.entries.remove(&hk);
                }
                MapPatch::Overwritten(hk, old) => {
                    self.entries.insert(hk, old);
                }
                MapPatch::Removed(hk, old) => {
                    self.entries.insert(hk, old);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordered_index_reindex_touches_only_one_row() {
        let mut idx: OrderedIndex<u32, &'static str> = OrderedIndex::new();
        idx.add(10, "a");
        idx.add(10, "b");
        idx.add(20, "c");
        idx.reindex(&10, 30, &"a");
        let at10: Vec<_> = idx.entries.get(&10).unwrap().iter().collect();
        assert_eq!(at10, vec![&"b"]);
        assert!(idx.entries.get(&30).unwrap().contains("a"));
        assert!(idx.entries.get(&20).unwrap().contains("c"));
    }

    #[test]
    fn hash_index_abort_restores_removed_entry() {
        let mut idx: HashIndex<String, u64> = HashIndex::new();
        idx.insert("alice".to_string(), 1);
        idx.begin_scope();
        idx.remove(&"alice".to_string());
        assert!(idx.get(&"alice".to_string()).is_none());
        idx.abort_scope();
        assert_eq!(idx.get(&"alice".to_string()), Some(&1));
    }
}
