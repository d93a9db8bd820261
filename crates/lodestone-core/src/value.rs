use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

///
/// Value
///
/// Element state as the collection engine sees it: scalar column payloads,
/// plus entity references already collapsed to their persistent identifier.
/// Live entity objects never enter this layer; the session resolves them to
/// `EntityRef` before a row is read or written.
///

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    EntityRef(EntityId),
}

impl Value {
    /// Dirty check per element-type equality semantics.
    ///
    /// Entity references compare by identifier, never by object identity,
    /// because a reassigned container may hold freshly deserialized elements
    /// that are equal-by-value to the originals.
    #[must_use]
    pub fn is_dirty(&self, loaded: &Self) -> bool {
        self != loaded
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The persistent identifier carried by this value, if it is a reference.
    #[must_use]
    pub const fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::EntityRef(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
            Self::EntityRef(id) => write!(f, "{id}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<EntityId> for Value {
    fn from(id: EntityId) -> Self {
        Self::EntityRef(id)
    }
}

///
/// EntityId
///
/// Persistent identifier of an entity instance. Transient (not yet saved)
/// entities have no EntityId; the session reports those separately.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct EntityId(Ulid);

impl EntityId {
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        self.0.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for EntityId {
    fn from(raw: u128) -> Self {
        Self(Ulid(raw))
    }
}

// ulid's serde support is feature-gated off in this workspace; identifiers
// travel as their u128 representation.
impl Serialize for EntityId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_u128().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u128::deserialize(deserializer).map(Self::from)
    }
}

///
/// RowId
///
/// Surrogate row identifier on a collection table, with no business meaning.
/// Used solely to target individual rows for update/delete when no natural
/// key suffices (identifier bags).
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RowId(Ulid);

impl RowId {
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    #[must_use]
    pub const fn as_u128(&self) -> u128 {
        self.0.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for RowId {
    fn from(raw: u128) -> Self {
        Self(Ulid(raw))
    }
}

impl Serialize for RowId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_u128().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RowId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u128::deserialize(deserializer).map(Self::from)
    }
}
