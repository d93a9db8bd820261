use crate::{
    collection::contents::Contents,
    value::{RowId, Value},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

///
/// CollectionSnapshot
///
/// Ownership-independent copy of a collection's element state, indexed
/// identically to the live container. Captured once when the handle finishes
/// initializing, read-only for the flush cycle, replaced wholesale after a
/// successful flush.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CollectionSnapshot {
    Sequence(Vec<Option<Value>>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<Value, Value>),
    Bag(Vec<Value>),
    IdentifierBag(BTreeMap<RowId, Value>),
}

impl CollectionSnapshot {
    /// Deep-copy the current contents as the new diff baseline.
    #[must_use]
    pub fn capture(contents: &Contents) -> Self {
        match contents {
            Contents::Sequence(v) => Self::Sequence(v.clone()),
            Contents::Set(v) => Self::Set(v.clone()),
            Contents::Map(v) => Self::Map(v.clone()),
            Contents::Bag(v) => Self::Bag(v.clone()),
            Contents::IdentifierBag(v) => Self::IdentifierBag(
                v.iter()
                    .filter_map(|(id, element)| id.map(|id| (id, element.clone())))
                    .collect(),
            ),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Sequence(v) => v.is_empty(),
            Self::Set(v) => v.is_empty(),
            Self::Map(v) => v.is_empty(),
            Self::Bag(v) => v.is_empty(),
            Self::IdentifierBag(v) => v.is_empty(),
        }
    }

    /// Snapshot element values, null slots excluded.
    #[must_use]
    pub fn elements(&self) -> Vec<Value> {
        match self {
            Self::Sequence(v) => v.iter().flatten().cloned().collect(),
            Self::Set(v) => v.iter().cloned().collect(),
            Self::Map(v) => v.values().cloned().collect(),
            Self::Bag(v) => v.clone(),
            Self::IdentifierBag(v) => v.values().cloned().collect(),
        }
    }

    /// Value-equality comparison against the live container.
    ///
    /// Deliberately not reference-sensitive: replacing a container wholesale
    /// with an equal-valued one must read as unchanged.
    #[must_use]
    pub fn equals_contents(&self, contents: &Contents) -> bool {
        match (self, contents) {
            (Self::Sequence(sn), Contents::Sequence(cur)) => sn == cur,
            (Self::Set(sn), Contents::Set(cur)) => sn == cur,
            (Self::Map(sn), Contents::Map(cur)) => sn == cur,
            (Self::Bag(sn), Contents::Bag(cur)) => {
                // bags are unordered multisets
                multiset(sn) == multiset(cur)
            }
            (Self::IdentifierBag(sn), Contents::IdentifierBag(cur)) => {
                cur.len() == sn.len()
                    && cur.iter().all(|(id, element)| {
                        id.is_some_and(|id| sn.get(&id) == Some(element))
                    })
            }
            _ => false,
        }
    }
}

fn multiset(elements: &[Value]) -> BTreeMap<&Value, usize> {
    let mut counts = BTreeMap::new();
    for element in elements {
        *counts.entry(element).or_insert(0) += 1;
    }
    counts
}

///
/// Disassembled
///
/// Cacheable form of a collection: element state with entity references
/// already collapsed to identifiers, ready for the second-level cache. A
/// handle can be reassembled from this without a database round-trip.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Disassembled {
    pub rows: Vec<DisassembledRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisassembledRow {
    pub element: Value,
    pub index: Option<Value>,
    pub identifier: Option<RowId>,
}

impl Disassembled {
    /// Disassemble the current element state of a live container.
    #[must_use]
    pub fn from_contents(contents: &Contents) -> Self {
        let rows = contents
            .entries()
            .into_iter()
            .filter(|entry| entry.exists())
            .map(|entry| DisassembledRow {
                element: entry.element,
                index: entry.index,
                identifier: entry.identifier,
            })
            .collect();

        Self { rows }
    }
}
