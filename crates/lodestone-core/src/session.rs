use crate::{
    cache::Timestamp,
    error::InternalError,
    value::{EntityId, RowId, Value},
};
use std::fmt;
use ulid::Ulid;

///
/// SessionContext
///
/// The slice of the owning session/unit-of-work that the collection engine
/// consumes. Handles never hold a session reference; the context is passed
/// explicitly into every operation so tests can construct isolated fakes.
///
/// A session is single-threaded by contract. Concurrency exists across
/// sessions, which share only the cache gateway and the backing store.
///

pub trait SessionContext {
    fn id(&self) -> SessionId;

    /// Is the session open?
    fn is_open(&self) -> bool;

    /// Is the session connected to the backing store?
    fn is_connected(&self) -> bool;

    /// Is this collection registered in the session's identity map?
    fn contains_collection(&self, key: &CollectionKey) -> bool;

    /// Execute the backing query for a lazy load and return its rows.
    /// Blocks on a database round-trip.
    fn load_rows(&self, key: &CollectionKey) -> Result<Vec<LoadedRow>, InternalError>;

    /// Resolve an element to its persistent identifier, or `None` when the
    /// element is transient (not yet persisted).
    fn entity_identifier(&self, element: &Value) -> Option<EntityId>;

    /// Is this entity re-added to a different collection owned by the same
    /// session before flush? Such elements are disassociated, not deleted,
    /// even under orphan-delete.
    fn is_referenced_elsewhere(&self, id: EntityId, role: &str) -> bool;

    /// Generate a surrogate row id for a fresh identifier-bag entry.
    fn next_row_id(&self) -> RowId;

    /// Timestamp at which the current transaction began; gates cache reads.
    fn timestamp(&self) -> Timestamp;
}

///
/// SessionId
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SessionId(Ulid);

impl SessionId {
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl From<u128> for SessionId {
    fn from(raw: u128) -> Self {
        Self(Ulid(raw))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

///
/// CollectionKey
///
/// Identity of one association instance: role plus owning entity key.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CollectionKey {
    pub role: String,
    pub owner: Value,
}

impl CollectionKey {
    #[must_use]
    pub fn new(role: impl Into<String>, owner: Value) -> Self {
        Self {
            role: role.into(),
            owner,
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.role, self.owner)
    }
}

///
/// LoadedRow
///
/// One result row fed through the load protocol. The session hydrates column
/// values; the handle decides where the element lands.
///

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedRow {
    pub element: Value,
    /// Index column value for sequences (`Int`) and maps (the key).
    pub index: Option<Value>,
    /// Surrogate row id for identifier bags.
    pub identifier: Option<RowId>,
}

impl LoadedRow {
    #[must_use]
    pub const fn element(element: Value) -> Self {
        Self {
            element,
            index: None,
            identifier: None,
        }
    }

    #[must_use]
    pub const fn indexed(index: Value, element: Value) -> Self {
        Self {
            element,
            index: Some(index),
            identifier: None,
        }
    }

    #[must_use]
    pub const fn identified(identifier: RowId, element: Value) -> Self {
        Self {
            element,
            index: None,
            identifier: Some(identifier),
        }
    }
}
