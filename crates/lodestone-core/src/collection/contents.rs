use crate::{
    model::CollectionKind,
    value::{RowId, Value},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

///
/// Contents
///
/// The live container behind a collection handle, tagged by semantic shape.
/// Sequences keep explicit null slots: rows may load out of order, and a
/// nulled slot is how a positional delete is expressed.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Contents {
    Sequence(Vec<Option<Value>>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<Value, Value>),
    Bag(Vec<Value>),
    /// Entries carry their surrogate row id once persisted; `None` marks a
    /// fresh entry that gets an id generated just before insert.
    IdentifierBag(Vec<(Option<RowId>, Value)>),
}

impl Contents {
    #[must_use]
    pub const fn empty(kind: CollectionKind) -> Self {
        match kind {
            CollectionKind::Sequence => Self::Sequence(Vec::new()),
            CollectionKind::Set => Self::Set(BTreeSet::new()),
            CollectionKind::Map => Self::Map(BTreeMap::new()),
            CollectionKind::Bag => Self::Bag(Vec::new()),
            CollectionKind::IdentifierBag => Self::IdentifierBag(Vec::new()),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CollectionKind {
        match self {
            Self::Sequence(_) => CollectionKind::Sequence,
            Self::Set(_) => CollectionKind::Set,
            Self::Map(_) => CollectionKind::Map,
            Self::Bag(_) => CollectionKind::Bag,
            Self::IdentifierBag(_) => CollectionKind::IdentifierBag,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Sequence(v) => v.len(),
            Self::Set(v) => v.len(),
            Self::Map(v) => v.len(),
            Self::Bag(v) => v.len(),
            Self::IdentifierBag(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append / insert one element. Map contents take entries through
    /// [`Contents::put_entry`] instead.
    pub fn add_element(&mut self, element: Value) {
        match self {
            Self::Sequence(v) => v.push(Some(element)),
            Self::Set(v) => {
                v.insert(element);
            }
            Self::Bag(v) => v.push(element),
            Self::IdentifierBag(v) => v.push((None, element)),
            Self::Map(_) => {}
        }
    }

    /// Insert a key → value entry; only meaningful for maps.
    pub fn put_entry(&mut self, key: Value, value: Value) {
        if let Self::Map(map) = self {
            map.insert(key, value);
        }
    }

    /// Remove an element by value. For sequences the slot is nulled, keeping
    /// later positions stable; trailing shrink happens naturally on reload.
    pub fn remove_element(&mut self, element: &Value) -> bool {
        match self {
            Self::Sequence(v) => {
                if let Some(slot) = v
                    .iter_mut()
                    .find(|slot| slot.as_ref() == Some(element))
                {
                    *slot = None;
                    true
                } else {
                    false
                }
            }
            Self::Set(v) => v.remove(element),
            Self::Map(v) => {
                let key = v
                    .iter()
                    .find(|(_, value)| *value == element)
                    .map(|(key, _)| key.clone());
                key.is_some_and(|key| v.remove(&key).is_some())
            }
            Self::Bag(v) => {
                if let Some(pos) = v.iter().position(|e| e == element) {
                    v.remove(pos);
                    true
                } else {
                    false
                }
            }
            Self::IdentifierBag(v) => {
                if let Some(pos) = v.iter().position(|(_, e)| e == element) {
                    v.remove(pos);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Replace elements with their canonical managed instances, used when a
    /// reassigned container must be re-wired after deserialization.
    pub fn replace_elements(&mut self, replacements: &BTreeMap<Value, Value>) {
        match self {
            Self::Sequence(v) => {
                for slot in v.iter_mut().flatten() {
                    if let Some(replacement) = replacements.get(slot) {
                        *slot = replacement.clone();
                    }
                }
            }
            Self::Set(v) => {
                let replaced: BTreeSet<Value> = v
                    .iter()
                    .map(|e| replacements.get(e).unwrap_or(e).clone())
                    .collect();
                *v = replaced;
            }
            Self::Map(v) => {
                for value in v.values_mut() {
                    if let Some(replacement) = replacements.get(value) {
                        *value = replacement.clone();
                    }
                }
            }
            Self::Bag(v) => {
                for element in v.iter_mut() {
                    if let Some(replacement) = replacements.get(element) {
                        *element = replacement.clone();
                    }
                }
            }
            Self::IdentifierBag(v) => {
                for (_, element) in v.iter_mut() {
                    if let Some(replacement) = replacements.get(element) {
                        *element = replacement.clone();
                    }
                }
            }
        }
    }

    /// Iterate all collection entries in flush order.
    #[must_use]
    pub fn entries(&self) -> Vec<RowEntry> {
        match self {
            Self::Sequence(v) => v
                .iter()
                .enumerate()
                .map(|(i, slot)| RowEntry {
                    position: i,
                    element: slot.clone().unwrap_or(Value::Null),
                    index: Some(Value::Int(i as i64)),
                    identifier: None,
                })
                .collect(),
            Self::Set(v) => v
                .iter()
                .enumerate()
                .map(|(i, element)| RowEntry {
                    position: i,
                    element: element.clone(),
                    index: None,
                    identifier: None,
                })
                .collect(),
            Self::Map(v) => v
                .iter()
                .enumerate()
                .map(|(i, (key, value))| RowEntry {
                    position: i,
                    element: value.clone(),
                    index: Some(key.clone()),
                    identifier: None,
                })
                .collect(),
            Self::Bag(v) => v
                .iter()
                .enumerate()
                .map(|(i, element)| RowEntry {
                    position: i,
                    element: element.clone(),
                    index: None,
                    identifier: None,
                })
                .collect(),
            Self::IdentifierBag(v) => v
                .iter()
                .enumerate()
                .map(|(i, (id, element))| RowEntry {
                    position: i,
                    element: element.clone(),
                    index: None,
                    identifier: *id,
                })
                .collect(),
        }
    }

    /// Current element values, null slots excluded.
    #[must_use]
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Self::Sequence(v) => v.iter().flatten().cloned().collect(),
            Self::Set(v) => v.iter().cloned().collect(),
            Self::Map(v) => v.values().cloned().collect(),
            Self::Bag(v) => v.clone(),
            Self::IdentifierBag(v) => v.iter().map(|(_, e)| e.clone()).collect(),
        }
    }
}

///
/// RowEntry
///
/// One candidate row during flush iteration: the element value plus whatever
/// row-identifying state the collection shape carries.
///

#[derive(Clone, Debug, PartialEq)]
pub struct RowEntry {
    /// Iteration position; the row-select index for sequences.
    pub position: usize,
    /// Element value; `Value::Null` marks an empty sequence slot.
    pub element: Value,
    /// Index column value: the position for sequences, the key for maps.
    pub index: Option<Value>,
    /// Surrogate row id, when the shape is identified and the row persisted.
    pub identifier: Option<RowId>,
}

impl RowEntry {
    /// Does an element exist at this entry?
    #[must_use]
    pub const fn exists(&self) -> bool {
        !self.element.is_null()
    }
}
