//! Shared fixtures for engine tests: canned descriptors and a scriptable
//! in-memory [`SessionContext`].

use crate::{
    cache::Timestamp,
    error::InternalError,
    model::{CachePolicy, CollectionDescriptor, CollectionKind, ColumnKind, ColumnModel},
    session::{CollectionKey, LoadedRow, SessionContext, SessionId},
    value::{EntityId, RowId, Value},
};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet},
};

pub fn descriptor(kind: CollectionKind) -> CollectionDescriptor {
    let (index_columns, identifier_column) = match kind {
        CollectionKind::Sequence => (vec![ColumnModel::new("position", ColumnKind::Int)], None),
        CollectionKind::Map => (vec![ColumnModel::new("map_key", ColumnKind::Text)], None),
        CollectionKind::IdentifierBag => {
            (Vec::new(), Some(ColumnModel::new("row_id", ColumnKind::Id)))
        }
        CollectionKind::Set | CollectionKind::Bag => (Vec::new(), None),
    };
    CollectionDescriptor {
        role: "Parent.children".into(),
        table: "parent_children".into(),
        key_columns: vec![ColumnModel::new("parent_id", ColumnKind::Id)],
        index_columns,
        element_columns: vec![ColumnModel::new("child", ColumnKind::Text)],
        identifier_column,
        kind,
        is_one_to_many: false,
        is_inverse: false,
        has_orphan_delete: false,
        is_lazy: true,
        cache: None,
    }
}

pub fn cached_descriptor(kind: CollectionKind) -> CollectionDescriptor {
    let mut d = descriptor(kind);
    d.cache = Some(CachePolicy::new(d.role.clone()));
    d
}

pub fn one_to_many_descriptor(kind: CollectionKind) -> CollectionDescriptor {
    let mut d = descriptor(kind);
    d.table = "child".into();
    d.is_one_to_many = true;
    d
}

pub fn key() -> CollectionKey {
    CollectionKey::new("Parent.children", Value::EntityRef(EntityId::from(1)))
}

///
/// FakeSession
///
/// Every answer is scripted up front; `loads` counts lazy-load round-trips
/// so tests can assert a load did (or did not) happen.
///

pub struct FakeSession {
    pub id: SessionId,
    pub open: bool,
    pub connected: bool,
    pub registered: BTreeSet<CollectionKey>,
    pub rows: BTreeMap<CollectionKey, Vec<LoadedRow>>,
    pub identifiers: BTreeMap<Value, EntityId>,
    pub referenced_elsewhere: BTreeSet<EntityId>,
    pub timestamp: Timestamp,
    pub loads: Cell<usize>,
    next_row_id: Cell<u128>,
    pub fail_load: RefCell<Option<InternalError>>,
}

impl FakeSession {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SessionId::from(7),
            open: true,
            connected: true,
            registered: BTreeSet::new(),
            rows: BTreeMap::new(),
            identifiers: BTreeMap::new(),
            referenced_elsewhere: BTreeSet::new(),
            timestamp: Timestamp::from_raw(1 << 12),
            loads: Cell::new(0),
            next_row_id: Cell::new(1000),
            fail_load: RefCell::new(None),
        }
    }

    /// Register the key and script its load result in one step.
    pub fn with_rows(mut self, key: &CollectionKey, rows: Vec<LoadedRow>) -> Self {
        self.registered.insert(key.clone());
        self.rows.insert(key.clone(), rows);
        self
    }

    pub fn register(mut self, key: &CollectionKey) -> Self {
        self.registered.insert(key.clone());
        self
    }

    pub fn knows_entity(mut self, element: Value, id: EntityId) -> Self {
        self.identifiers.insert(element, id);
        self
    }
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext for FakeSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn contains_collection(&self, key: &CollectionKey) -> bool {
        self.registered.contains(key)
    }

    fn load_rows(&self, key: &CollectionKey) -> Result<Vec<LoadedRow>, InternalError> {
        self.loads.set(self.loads.get() + 1);
        if let Some(err) = self.fail_load.borrow_mut().take() {
            return Err(err);
        }
        Ok(self.rows.get(key).cloned().unwrap_or_default())
    }

    fn entity_identifier(&self, element: &Value) -> Option<EntityId> {
        self.identifiers.get(element).copied()
    }

    fn is_referenced_elsewhere(&self, id: EntityId, _role: &str) -> bool {
        self.referenced_elsewhere.contains(&id)
    }

    fn next_row_id(&self) -> RowId {
        let raw = self.next_row_id.get();
        self.next_row_id.set(raw + 1);
        RowId::from(raw)
    }

    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

pub fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}
