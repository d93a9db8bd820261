use crate::{
    collection::{
        contents::{Contents, RowEntry},
        snapshot::CollectionSnapshot,
    },
    error::InternalError,
    session::SessionContext,
    value::{EntityId, RowId, Value},
};
use std::collections::{BTreeMap, BTreeSet};

///
/// DeleteKey
///
/// Row-select handle for one row scheduled for deletion, in the currency the
/// collection shape can actually address rows by.
///

#[derive(Clone, Debug, PartialEq)]
pub enum DeleteKey {
    /// Positional index (sequences).
    Index(i64),
    /// Map key.
    MapKey(Value),
    /// Element value (sets, bags, and formula-indexed shapes).
    Element(Value),
    /// Surrogate row id (identifier bags).
    RowId(RowId),
}

/// Rows present in the snapshot but absent from the live container.
///
/// `index_is_formula` forces element-based row selection for indexed shapes
/// whose index column is computed rather than stored.
pub fn get_deletes(
    snapshot: &CollectionSnapshot,
    contents: &Contents,
    index_is_formula: bool,
) -> Result<Vec<DeleteKey>, InternalError> {
    let deletes = match (snapshot, contents) {
        (CollectionSnapshot::Sequence(sn), Contents::Sequence(cur)) => {
            let mut deletes = Vec::new();
            let mut push = |i: usize, element: &Value| {
                if index_is_formula {
                    deletes.push(DeleteKey::Element(element.clone()));
                } else {
                    deletes.push(DeleteKey::Index(i as i64));
                }
            };
            // trailing rows the live container no longer reaches
            for (i, slot) in sn.iter().enumerate().skip(cur.len()) {
                if let Some(element) = slot {
                    push(i, element);
                }
            }
            // nulled slots within the shared range
            let end = cur.len().min(sn.len());
            for i in 0..end {
                if cur[i].is_none()
                    && let Some(element) = &sn[i]
                {
                    push(i, element);
                }
            }
            deletes
        }
        (CollectionSnapshot::Map(sn), Contents::Map(cur)) => sn
            .iter()
            .filter(|(key, _)| !cur.contains_key(*key))
            .map(|(key, element)| {
                if index_is_formula {
                    DeleteKey::Element(element.clone())
                } else {
                    DeleteKey::MapKey(key.clone())
                }
            })
            .collect(),
        (CollectionSnapshot::Set(sn), Contents::Set(cur)) => sn
            .iter()
            .filter(|element| !cur.contains(*element))
            .map(|element| DeleteKey::Element(element.clone()))
            .collect(),
        (CollectionSnapshot::Bag(sn), Contents::Bag(cur)) => {
            // multiset difference: delete one row per excess occurrence
            let mut remaining = multiset(cur);
            let mut deletes = Vec::new();
            for element in sn {
                match remaining.get_mut(element) {
                    Some(count) if *count > 0 => *count -= 1,
                    _ => deletes.push(DeleteKey::Element(element.clone())),
                }
            }
            deletes
        }
        (CollectionSnapshot::IdentifierBag(sn), Contents::IdentifierBag(cur)) => {
            let live: BTreeSet<RowId> = cur.iter().filter_map(|(id, _)| *id).collect();
            sn.keys()
                .filter(|id| !live.contains(id))
                .map(|id| DeleteKey::RowId(*id))
                .collect()
        }
        _ => {
            return Err(InternalError::collection_invariant(
                "snapshot shape does not match live container",
            ));
        }
    };

    Ok(deletes)
}

/// Does this entry need a row insert?
#[must_use]
pub fn needs_inserting(snapshot: &CollectionSnapshot, contents: &Contents, entry: &RowEntry) -> bool {
    match (snapshot, contents) {
        (CollectionSnapshot::Sequence(sn), Contents::Sequence(_)) => {
            // present now, but out of range or a null slot in the snapshot
            entry.exists() && sn.get(entry.position).is_none_or(Option::is_none)
        }
        (CollectionSnapshot::Set(sn), _) => !sn.contains(&entry.element),
        (CollectionSnapshot::Map(sn), _) => entry
            .index
            .as_ref()
            .is_none_or(|key| !sn.contains_key(key)),
        (CollectionSnapshot::Bag(sn), Contents::Bag(cur)) => {
            // the entry is an insert when its occurrence ordinal exceeds the
            // snapshot's multiplicity for that value
            let ordinal = cur
                .iter()
                .take(entry.position + 1)
                .filter(|e| **e == entry.element)
                .count();
            let in_snapshot = sn.iter().filter(|e| **e == entry.element).count();
            ordinal > in_snapshot
        }
        // a fresh row either has no id yet or carries one assigned after the
        // snapshot was captured
        (CollectionSnapshot::IdentifierBag(sn), _) => entry
            .identifier
            .is_none_or(|id| !sn.contains_key(&id)),
        _ => false,
    }
}

/// Does this entry need a row update?
///
/// Only meaningful for shapes with a distinguishable row-select key; sets and
/// bags treat any element change as delete plus insert instead.
#[must_use]
pub fn needs_updating(snapshot: &CollectionSnapshot, entry: &RowEntry) -> bool {
    match snapshot {
        CollectionSnapshot::Sequence(sn) => {
            entry.exists()
                && sn
                    .get(entry.position)
                    .and_then(Option::as_ref)
                    .is_some_and(|loaded| entry.element.is_dirty(loaded))
        }
        CollectionSnapshot::Map(sn) => entry
            .index
            .as_ref()
            .and_then(|key| sn.get(key))
            .is_some_and(|loaded| entry.element.is_dirty(loaded)),
        CollectionSnapshot::IdentifierBag(sn) => entry
            .identifier
            .and_then(|id| sn.get(&id))
            .is_some_and(|loaded| entry.element.is_dirty(loaded)),
        CollectionSnapshot::Set(_) | CollectionSnapshot::Bag(_) => false,
    }
}

/// Elements removed from the live container relative to the snapshot that
/// must be deleted as entities under orphan-delete semantics.
///
/// Resolution is by persistent identifier, not object identity: the container
/// may have been reassigned a freshly deserialized instance whose elements
/// are equal-by-value but not identical. Transient elements are never
/// orphans, and neither are elements the session reports as re-added to a
/// different collection before flush.
#[must_use]
pub fn get_orphans(
    snapshot: &CollectionSnapshot,
    contents: &Contents,
    ctx: &dyn SessionContext,
    role: &str,
) -> Vec<Value> {
    let old_elements = snapshot.elements();
    let current_elements = contents.elements();

    // short-circuits
    if old_elements.is_empty() {
        return Vec::new();
    }
    if current_elements.is_empty() {
        return filter_referenced(old_elements, ctx, role);
    }

    let current_ids: BTreeSet<EntityId> = current_elements
        .iter()
        .filter_map(|element| ctx.entity_identifier(element))
        .collect();

    let orphans = old_elements
        .into_iter()
        .filter(|old| {
            ctx.entity_identifier(old)
                .is_some_and(|id| !current_ids.contains(&id))
        })
        .collect();

    filter_referenced(orphans, ctx, role)
}

fn filter_referenced(orphans: Vec<Value>, ctx: &dyn SessionContext, role: &str) -> Vec<Value> {
    orphans
        .into_iter()
        .filter(|orphan| {
            ctx.entity_identifier(orphan)
                .is_some_and(|id| !ctx.is_referenced_elsewhere(id, role))
        })
        .collect()
}

fn multiset(elements: &[Value]) -> BTreeMap<&Value, usize> {
    let mut counts = BTreeMap::new();
    for element in elements {
        *counts.entry(element).or_insert(0) += 1;
    }
    counts
}
