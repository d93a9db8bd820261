use serde::{Deserialize, Serialize};
use std::fmt;

///
/// CollectionDescriptor
///
/// Static, per-association metadata produced once at startup by the external
/// mapping binder. May be considered an immutable view of the mapping object;
/// safely shared read-only across all sessions.
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Association role, e.g. `Parent.children`. Used in diagnostics and as
    /// the cache region discriminator.
    pub role: String,
    /// Qualified name of the collection (or, for one-to-many, the child)
    /// table.
    pub table: String,
    /// Foreign-key column(s) back to the owner.
    pub key_columns: Vec<ColumnModel>,
    /// Index column(s) for sequences and maps.
    pub index_columns: Vec<ColumnModel>,
    /// Element payload column(s).
    pub element_columns: Vec<ColumnModel>,
    /// Surrogate row identifier column for identifier bags.
    pub identifier_column: Option<ColumnModel>,
    /// Semantic container shape.
    pub kind: CollectionKind,
    /// The "many" side's own table carries the foreign key; row writes
    /// degrade to foreign-key UPDATEs.
    pub is_one_to_many: bool,
    /// Non-owning side of a bidirectional association; never issues writes.
    pub is_inverse: bool,
    /// Removed members are deleted as entities, not merely disassociated.
    pub has_orphan_delete: bool,
    pub is_lazy: bool,
    /// Cache policy; `None` disables the second-level cache for this role.
    pub cache: Option<CachePolicy>,
}

impl CollectionDescriptor {
    #[must_use]
    pub fn has_index(&self) -> bool {
        !self.index_columns.is_empty()
    }

    #[must_use]
    pub const fn has_identifier(&self) -> bool {
        self.identifier_column.is_some()
    }

    #[must_use]
    pub const fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Which columns select an individual row for update/delete: the
    /// surrogate identifier alone when one exists, otherwise the key plus
    /// index columns (or element columns for unindexed shapes).
    #[must_use]
    pub fn row_select(&self) -> RowSelect {
        if self.has_identifier() {
            RowSelect::Identifier
        } else if self.has_index() {
            RowSelect::KeyAndIndex
        } else {
            RowSelect::KeyAndElement
        }
    }

    /// A many-to-many bag without a surrogate row id has no stable row key
    /// distinguishing duplicate-valued rows; its flush must delete all rows
    /// for the owner and reinsert the full current state. This is a known,
    /// deliberate limitation of the bag + many-to-many shape.
    #[must_use]
    pub fn needs_recreate(&self) -> bool {
        self.kind == CollectionKind::Bag && !self.is_one_to_many && !self.has_identifier()
    }
}

///
/// CollectionKind
///
/// Semantic container shapes sharing one handle state machine, with
/// kind-specific diff strategies (positional, keyed, multiset).
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CollectionKind {
    /// Ordered, positionally indexed sequence.
    Sequence,
    /// Unordered, element equality is the row identity.
    Set,
    /// Key → value mapping, indexed by key.
    Map,
    /// Multiset without a row key.
    Bag,
    /// Multiset with a surrogate row identifier per entry.
    IdentifierBag,
}

impl CollectionKind {
    /// Sequences and maps carry an index column.
    #[must_use]
    pub const fn is_indexed(&self) -> bool {
        matches!(self, Self::Sequence | Self::Map)
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sequence => "sequence",
            Self::Set => "set",
            Self::Map => "map",
            Self::Bag => "bag",
            Self::IdentifierBag => "identifier_bag",
        };
        write!(f, "{label}")
    }
}

///
/// RowSelect
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RowSelect {
    Identifier,
    KeyAndIndex,
    KeyAndElement,
}

///
/// ColumnModel
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ColumnModel {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnModel {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

///
/// ColumnKind
/// Dialect-neutral column type tag.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ColumnKind {
    Bool,
    Int,
    Text,
    Id,
}

///
/// CachePolicy
///

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Cache region name; defaults to the role when the binder leaves it
    /// unset.
    pub region: String,
}

impl CachePolicy {
    #[must_use]
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
        }
    }
}
