use crate::{
    collection::{
        contents::{Contents, RowEntry},
        diff,
        diff::DeleteKey,
        snapshot::{CollectionSnapshot, Disassembled},
        state::LoadState,
    },
    error::{ErrorClass, ErrorOrigin, InternalError},
    model::{CollectionDescriptor, CollectionKind},
    obs::sink::{MetricsEvent, record},
    session::{CollectionKey, LoadedRow, SessionContext, SessionId},
    value::Value,
};
use std::collections::BTreeMap;

///
/// CollectionHandle
///
/// Mutable wrapper around a semantic container representing one
/// database-backed association. Owned by exactly one entity instance, never
/// shared, single-threaded by contract. Intercepts reads (triggering a lazy
/// load) and writes (marking itself dirty, optionally queueing additions).
///
/// The session is never stored; every operation takes an explicit
/// [`SessionContext`] so the lazy-load guard stays testable.
///

#[derive(Debug)]
pub struct CollectionHandle {
    key: CollectionKey,
    state: LoadState,
    dirty: bool,
    /// True once we are guaranteed the framework wrapper is in use rather
    /// than a bare container handed over by user code.
    directly_accessible: bool,
    session: Option<SessionId>,
    contents: Contents,
    snapshot: Option<CollectionSnapshot>,
    queued: Vec<Value>,
}

impl CollectionHandle {
    /// Create an empty, disconnected lazy handle.
    #[must_use]
    pub fn new_lazy(key: CollectionKey, kind: CollectionKind) -> Self {
        Self {
            key,
            state: LoadState::Unloaded,
            dirty: false,
            directly_accessible: false,
            session: None,
            contents: Contents::empty(kind),
            snapshot: None,
            queued: Vec::new(),
        }
    }

    /// Wrap a user-supplied container for a transient owner being saved.
    ///
    /// The handle starts initialized and dirty against an empty baseline:
    /// nothing is in storage yet, so every element needs inserting.
    #[must_use]
    pub fn wrap(key: CollectionKey, contents: Contents) -> Self {
        let snapshot = CollectionSnapshot::capture(&Contents::empty(contents.kind()));
        Self {
            key,
            state: LoadState::Initialized,
            dirty: true,
            directly_accessible: true,
            session: None,
            contents,
            snapshot: Some(snapshot),
            queued: Vec::new(),
        }
    }

    /// Reassemble an initialized handle from a disassembled cache entry,
    /// skipping the database round-trip entirely.
    pub fn from_disassembled(
        key: CollectionKey,
        kind: CollectionKind,
        disassembled: &Disassembled,
    ) -> Result<Self, InternalError> {
        let mut handle = Self::new_lazy(key, kind);
        handle.state.begin_load()?;
        for row in &disassembled.rows {
            let loaded = LoadedRow {
                element: row.element.clone(),
                index: row.index.clone(),
                identifier: row.identifier,
            };
            handle.read_row(&loaded).map_err(|err| {
                InternalError::new(ErrorClass::CacheConsistency, ErrorOrigin::Cache, err.message)
            })?;
        }
        handle.state.finish_load()?;
        handle.snapshot = Some(CollectionSnapshot::capture(&handle.contents));
        Ok(handle)
    }

    // ---------------------------------------------------------------------
    // Identity and flags
    // ---------------------------------------------------------------------

    #[must_use]
    pub const fn key(&self) -> &CollectionKey {
        &self.key
    }

    #[must_use]
    pub fn role(&self) -> &str {
        &self.key.role
    }

    #[must_use]
    pub const fn owner(&self) -> &Value {
        &self.key.owner
    }

    #[must_use]
    pub const fn was_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    #[must_use]
    pub const fn is_directly_accessible(&self) -> bool {
        self.directly_accessible
    }

    #[must_use]
    pub fn has_queued_additions(&self) -> bool {
        !self.queued.is_empty()
    }

    #[must_use]
    pub fn queued_additions(&self) -> &[Value] {
        &self.queued
    }

    #[must_use]
    pub const fn snapshot(&self) -> Option<&CollectionSnapshot> {
        self.snapshot.as_ref()
    }

    // ---------------------------------------------------------------------
    // Session association
    // ---------------------------------------------------------------------

    /// Associate the collection with the given session.
    ///
    /// Returns false if the collection was already associated with it.
    /// A session must detach its handles when it closes; attaching while
    /// still attached to a different session is fatal.
    pub fn set_current_session(&mut self, ctx: &dyn SessionContext) -> Result<bool, InternalError> {
        if self.session == Some(ctx.id()) && ctx.contains_collection(&self.key) {
            return Ok(false);
        }
        if self.session.is_some_and(|attached| attached != ctx.id()) {
            return Err(InternalError::collection_invariant(format!(
                "illegal attempt to associate a collection with two open sessions: {}",
                self.key
            )));
        }
        self.session = Some(ctx.id());
        Ok(true)
    }

    /// Disassociate this collection from the given session.
    ///
    /// Returns true if the handle was currently associated with it.
    pub fn unset_session(&mut self, session: SessionId) -> bool {
        if self.session == Some(session) {
            self.session = None;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub const fn session(&self) -> Option<SessionId> {
        self.session
    }

    // A handle is connected when its session is attached, open, and holds
    // this collection in its identity map.
    fn is_connected_to_session(&self, ctx: &dyn SessionContext) -> bool {
        self.session == Some(ctx.id()) && ctx.is_open() && ctx.contains_collection(&self.key)
    }

    // ---------------------------------------------------------------------
    // Lazy initialization
    // ---------------------------------------------------------------------

    /// Called by any read-only accessor of the collection interface.
    pub fn read(&mut self, ctx: &dyn SessionContext) -> Result<&Contents, InternalError> {
        self.initialize(ctx)?;
        Ok(&self.contents)
    }

    /// Called by any writer accessor of the collection interface.
    pub fn write(&mut self, ctx: &dyn SessionContext) -> Result<&mut Contents, InternalError> {
        self.initialize(ctx)?;
        self.dirty = true;
        Ok(&mut self.contents)
    }

    /// Add an element, queueing the addition without initializing when the
    /// shape and association allow it.
    ///
    /// Map collections reject unkeyed additions: entries go through the
    /// keyed writer instead.
    pub fn add(
        &mut self,
        ctx: &dyn SessionContext,
        descriptor: &CollectionDescriptor,
        element: Value,
    ) -> Result<(), InternalError> {
        if self.contents.kind() == CollectionKind::Map {
            return Err(InternalError::collection_invariant(format!(
                "cannot add an unkeyed element to map collection: {}; use put_entry",
                self.key
            )));
        }
        if self.queue_add(ctx, descriptor, element.clone()) {
            return Ok(());
        }
        self.write(ctx)?.add_element(element);
        Ok(())
    }

    /// Queue an addition if this collection supports it.
    ///
    /// Returns true if the addition was queued. Queueing is possible only
    /// while uninitialized, attached to a connected session, for an inverse
    /// association that is one-to-many or has no orphan-delete. Maps cannot
    /// queue: an entry needs its key.
    pub fn queue_add(
        &mut self,
        ctx: &dyn SessionContext,
        descriptor: &CollectionDescriptor,
        element: Value,
    ) -> bool {
        if !self.is_queue_addition_enabled(ctx, descriptor) {
            return false;
        }
        self.queued.push(element);
        // needed so that this collection is purged from the second-level cache
        self.dirty = true;
        record(MetricsEvent::QueuedAddition { role: self.role() });
        true
    }

    /// Queue several additions at once.
    pub fn queue_add_all(
        &mut self,
        ctx: &dyn SessionContext,
        descriptor: &CollectionDescriptor,
        elements: impl IntoIterator<Item = Value>,
    ) -> bool {
        if !self.is_queue_addition_enabled(ctx, descriptor) {
            return false;
        }
        self.queued.extend(elements);
        self.dirty = true;
        record(MetricsEvent::QueuedAddition { role: self.role() });
        true
    }

    fn is_queue_addition_enabled(
        &self,
        ctx: &dyn SessionContext,
        descriptor: &CollectionDescriptor,
    ) -> bool {
        !self.state.is_initialized()
            && !self.state.is_loading()
            && self.contents.kind() != CollectionKind::Map
            && self.is_connected_to_session(ctx)
            && ctx.is_connected()
            && descriptor.is_inverse
            && (descriptor.is_one_to_many || !descriptor.has_orphan_delete)
    }

    /// Initialize the collection, if possible.
    ///
    /// Fails with an illegal-access fault when the handle has no live,
    /// connected session, or when the load is reentrant.
    fn initialize(&mut self, ctx: &dyn SessionContext) -> Result<(), InternalError> {
        if self.state.is_initialized() {
            return Ok(());
        }
        if self.state.is_loading() {
            return Err(
                InternalError::illegal_access("illegal access to loading collection")
                    .in_role(&self.key.role, &self.key.owner),
            );
        }
        if !self.is_connected_to_session(ctx) {
            return Err(InternalError::illegal_access(
                "failed to lazily initialize a collection, no session or session was closed",
            )
            .in_role(&self.key.role, &self.key.owner));
        }
        if !ctx.is_connected() {
            return Err(InternalError::illegal_access(
                "failed to lazily initialize a collection, session is disconnected",
            )
            .in_role(&self.key.role, &self.key.owner));
        }

        self.load(ctx)
    }

    /// To be called by the session, forcing immediate initialization.
    pub fn force_initialize(&mut self, ctx: &dyn SessionContext) -> Result<(), InternalError> {
        if self.state.is_initialized() {
            return Ok(());
        }
        if self.state.is_loading() {
            return Err(InternalError::collection_invariant(
                "force initialize loading collection",
            ));
        }
        if self.session.is_none() {
            return Err(InternalError::illegal_access(
                "collection is not associated with any session",
            ));
        }
        if !ctx.is_connected() {
            return Err(InternalError::illegal_access("disconnected session"));
        }

        self.load(ctx)
    }

    // Run the full load protocol against the session's row source. On any
    // failure the loading marker is cleared and the dirty flag left
    // unchanged, so a caller may retry or escalate.
    fn load(&mut self, ctx: &dyn SessionContext) -> Result<(), InternalError> {
        let rows = ctx.load_rows(&self.key)?;

        self.begin_read()?;
        let result: Result<(), InternalError> = rows.iter().try_for_each(|row| {
            self.read_from(row)?;
            Ok(())
        });
        if let Err(err) = result {
            self.state.abort_load();
            self.contents = Contents::empty(self.contents.kind());
            return Err(err);
        }
        self.end_read()?;

        record(MetricsEvent::LazyLoad {
            role: &self.key.role,
            rows: rows.len() as u64,
        });

        Ok(())
    }

    // ---------------------------------------------------------------------
    // Load protocol (also driven externally by the session)
    // ---------------------------------------------------------------------

    /// Called just before reading any result rows.
    pub fn begin_read(&mut self) -> Result<(), InternalError> {
        self.state
            .begin_load()
            .map_err(|err| err.in_role(&self.key.role, &self.key.owner))?;
        self.contents = Contents::empty(self.contents.kind());
        Ok(())
    }

    /// Read one result row into the container.
    pub fn read_from(&mut self, row: &LoadedRow) -> Result<Option<Value>, InternalError> {
        if !self.state.is_loading() {
            return Err(InternalError::collection_invariant(
                "read_from outside of a load",
            ));
        }
        self.read_row(row)
    }

    /// Called after reading all result rows. Replays queued additions
    /// against the freshly loaded base set, then marks the handle
    /// initialized and captures the snapshot.
    ///
    /// Returns false when queued additions were merged (the base rows alone
    /// do not represent the final contents).
    pub fn end_read(&mut self) -> Result<bool, InternalError> {
        self.state.finish_load()?;

        let had_queued = !self.queued.is_empty();
        for element in std::mem::take(&mut self.queued) {
            // set/map shapes deduplicate on insert, so a queued element
            // already present in the base rows lands exactly once
            self.contents.add_element(element);
        }

        self.snapshot = Some(CollectionSnapshot::capture(&self.contents));
        Ok(!had_queued)
    }

    fn read_row(&mut self, row: &LoadedRow) -> Result<Option<Value>, InternalError> {
        match &mut self.contents {
            Contents::Sequence(slots) => {
                let index = match &row.index {
                    Some(Value::Int(i)) if *i >= 0 => *i as usize,
                    _ => {
                        return Err(InternalError::corruption(
                            ErrorOrigin::Collection,
                            format!("null index column for collection: {}", self.key.role),
                        ));
                    }
                };
                if slots.len() <= index {
                    slots.resize(index + 1, None);
                }
                slots[index] = Some(row.element.clone());
            }
            Contents::Map(map) => {
                let Some(key) = row.index.clone() else {
                    return Err(InternalError::corruption(
                        ErrorOrigin::Collection,
                        format!("null index column for collection: {}", self.key.role),
                    ));
                };
                map.insert(key, row.element.clone());
            }
            Contents::Set(set) => {
                set.insert(row.element.clone());
            }
            Contents::Bag(bag) => {
                bag.push(row.element.clone());
            }
            Contents::IdentifierBag(entries) => {
                let Some(identifier) = row.identifier else {
                    return Err(InternalError::corruption(
                        ErrorOrigin::Collection,
                        format!("null identifier column for collection: {}", self.key.role),
                    ));
                };
                entries.push((Some(identifier), row.element.clone()));
            }
        }
        Ok(Some(row.element.clone()))
    }

    // ---------------------------------------------------------------------
    // Flush contract
    // ---------------------------------------------------------------------

    /// Iterate all collection entries, during update of the database.
    #[must_use]
    pub fn entries(&self) -> Vec<RowEntry> {
        self.contents.entries()
    }

    /// Current element values, null slots excluded.
    #[must_use]
    pub fn elements(&self) -> Vec<Value> {
        self.contents.elements()
    }

    /// Does an element exist at this entry?
    #[must_use]
    pub fn entry_exists(&self, entry: &RowEntry) -> bool {
        entry.exists()
    }

    /// Get all entries that need deleting.
    pub fn get_deletes(
        &self,
        index_is_formula: bool,
    ) -> Result<Vec<DeleteKey>, InternalError> {
        let snapshot = self.require_snapshot()?;
        diff::get_deletes(snapshot, &self.contents, index_is_formula)
            .map_err(|err| err.in_role(&self.key.role, &self.key.owner))
    }

    /// Do we need to insert this entry?
    pub fn needs_inserting(&self, entry: &RowEntry) -> Result<bool, InternalError> {
        let snapshot = self.require_snapshot()?;
        Ok(diff::needs_inserting(snapshot, &self.contents, entry))
    }

    /// Do we need to update this entry?
    pub fn needs_updating(&self, entry: &RowEntry) -> Result<bool, InternalError> {
        let snapshot = self.require_snapshot()?;
        Ok(diff::needs_updating(snapshot, entry))
    }

    /// Is the live container equal, by value, to the snapshot baseline?
    pub fn equals_snapshot(&self) -> Result<bool, InternalError> {
        Ok(self.require_snapshot()?.equals_contents(&self.contents))
    }

    /// Get all orphaned elements under orphan-delete semantics.
    pub fn get_orphans(&self, ctx: &dyn SessionContext) -> Result<Vec<Value>, InternalError> {
        let snapshot = self.require_snapshot()?;
        Ok(diff::get_orphans(
            snapshot,
            &self.contents,
            ctx,
            &self.key.role,
        ))
    }

    /// Ensure surrogate row ids exist before insert; fresh identifier-bag
    /// entries get theirs from the session's generator.
    pub fn pre_insert(&mut self, ctx: &dyn SessionContext) {
        if let Contents::IdentifierBag(entries) = &mut self.contents {
            for (id, _) in entries.iter_mut() {
                if id.is_none() {
                    *id = Some(ctx.next_row_id());
                }
            }
        }
    }

    /// After a successful flush the database is in sync with the in-memory
    /// contents: clear the queue, clear the dirty flag, and replace the
    /// snapshot wholesale.
    pub fn after_flush(&mut self) {
        self.queued.clear();
        self.dirty = false;
        if self.state.is_initialized() {
            self.snapshot = Some(CollectionSnapshot::capture(&self.contents));
        }
    }

    /// Replace the backing container wholesale, e.g. when the owner's field
    /// was reassigned. Comparison against the snapshot stays value-based, so
    /// an equal-valued replacement is a no-op at the database level.
    pub fn replace_contents(&mut self, contents: Contents) -> Result<(), InternalError> {
        if contents.kind() != self.contents.kind() {
            return Err(InternalError::collection_invariant(format!(
                "cannot replace {} contents with {}",
                self.contents.kind(),
                contents.kind()
            )));
        }
        self.contents = contents;
        self.dirty = true;
        Ok(())
    }

    /// Substitute elements with their canonical managed instances.
    pub fn replace_elements(&mut self, replacements: &BTreeMap<Value, Value>) {
        self.contents.replace_elements(replacements);
    }

    /// Disassemble the current element state, ready for the cache. Entity
    /// references are already identifier-collapsed in `Value` form; rows keep
    /// their index/identifier state for reassembly.
    #[must_use]
    pub fn disassemble(&self) -> Disassembled {
        Disassembled::from_contents(&self.contents)
    }

    fn require_snapshot(&self) -> Result<&CollectionSnapshot, InternalError> {
        self.snapshot.as_ref().ok_or_else(|| {
            InternalError::collection_invariant(format!(
                "no snapshot for collection: {}",
                self.key
            ))
        })
    }
}
