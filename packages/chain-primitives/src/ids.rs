//! Typed, monotonic per-entity identifiers (spec §3: "All entities carry a
//! monotonic numeric id (per-type)").
use std::fmt;
use std::marker::PhantomData;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A strongly-typed numeric id for entity kind `T`, preventing an id minted
/// for one entity table from being used to index another by accident.
pub struct Id<T> {
    value: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub const fn new(value: u64) -> Self {
        Id { value, _marker: PhantomData }
    }

    pub fn get(self) -> u64 {
        self.value
    }

    pub fn next(self) -> Self {
        Id::new(self.value + 1)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
impl<T> Eq for Id<T> {}
impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}
impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}
impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}
impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
impl<T> Default for Id<T> {
    fn default() -> Self {
        Id::new(0)
    }
}
impl<T> Serialize for Id<T> {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(s)
    }
}
impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        Ok(Id::new(u64::deserialize(d)?))
    }
}
impl<T> JsonSchema for Id<T> {
    fn schema_name() -> String {
        "Id".to_string()
    }
    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        u64::json_schema(gen)
    }
}

/// Monotonic allocator for one id table; the indexed store owns one per
/// entity kind and never reuses a freed id (spec §3: "All ids are stable").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IdAllocator<T> {
    next: u64,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for IdAllocator<T> {
    fn default() -> Self {
        IdAllocator { next: 0, _marker: PhantomData }
    }
}

impl<T> IdAllocator<T> {
    pub fn allocate(&mut self) -> Id<T> {
        let id = Id::new(self.next);
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account;
    struct Comment;

    #[test]
    fn allocator_is_monotonic_and_never_reused() {
        let mut alloc = IdAllocator::<Account>::default();
        let a = alloc.allocate();
        let b = alloc.allocate();
        assert!(a < b);
        assert_eq!(a.get(), 0);
        assert_eq!(b.get(), 1);
    }

    #[test]
    fn ids_of_different_kinds_do_not_compare() {
        let a: Id<Account> = Id::new(5);
        let c: Id<Comment> = Id::new(5);
        // Compile-time guarantee only: both equal 5 as raw values.
        assert_eq!(a.get(), c.get());
    }
}
