use crate::{
    collection::{CollectionHandle, DeleteKey, RowEntry},
    error::{ErrorOrigin, InternalError},
    model::{CollectionDescriptor, RowSelect, validate_descriptor},
    obs::sink::{MetricsEvent, record},
    session::SessionContext,
    sync::{
        delta::{FlushPlan, RowOp, RowOpKind, SqlParam},
        statement::{StatementSet, UpdateRow},
    },
    value::Value,
};

///
/// RowSynchronizer
///
/// Stateless per-role flush logic: diffs a handle against its snapshot and
/// emits fully bound row operations in execution order. Never touches the
/// database; the driving session batches and executes the plan, then calls
/// `after_flush` on the handle.
///
/// For an inverse association every write operation emits nothing; the
/// owning side of the relationship issues the rows. The synchronizer is
/// still invoked so bookkeeping (orphans, metrics, snapshot refresh) runs.
///

#[derive(Debug)]
pub struct RowSynchronizer {
    descriptor: CollectionDescriptor,
    statements: StatementSet,
}

impl RowSynchronizer {
    pub fn new(descriptor: CollectionDescriptor) -> Result<Self, InternalError> {
        validate_descriptor(&descriptor)?;
        let statements = StatementSet::generate(&descriptor);
        Ok(Self {
            descriptor,
            statements,
        })
    }

    #[must_use]
    pub const fn descriptor(&self) -> &CollectionDescriptor {
        &self.descriptor
    }

    #[must_use]
    pub const fn statements(&self) -> &StatementSet {
        &self.statements
    }

    /// Full flush plan for one dirty handle: row deletes, then in-place
    /// updates, then inserts. A value-equal handle plans zero operations
    /// even when flagged dirty.
    pub fn plan_flush(
        &self,
        handle: &mut CollectionHandle,
        ctx: &dyn SessionContext,
    ) -> Result<FlushPlan, InternalError> {
        self.check_role(handle)?;

        let mut plan = FlushPlan::empty(&self.descriptor.role);
        if !handle.was_initialized() || !handle.is_dirty() {
            return Ok(plan);
        }

        if self.descriptor.has_orphan_delete {
            plan.orphans = handle.get_orphans(ctx)?;
            if !plan.orphans.is_empty() {
                record(MetricsEvent::OrphansScheduled {
                    role: &self.descriptor.role,
                    count: plan.orphans.len() as u64,
                });
            }
        }

        if !self.descriptor.is_inverse && !handle.equals_snapshot()? {
            if self.descriptor.needs_recreate() {
                plan.recreated = true;
                // nothing to clear out on a first-time flush
                if handle.snapshot().is_some_and(|s| !s.is_empty()) {
                    plan.ops.extend(self.remove(handle.owner()));
                }
                plan.ops.extend(self.recreate(handle, ctx)?);
            } else {
                plan.ops.extend(self.delete_rows(handle)?);
                plan.ops.extend(self.update_rows(handle)?);
                plan.ops.extend(self.insert_rows(handle, ctx)?);
            }
        }

        record(MetricsEvent::FlushPlanned {
            role: &self.descriptor.role,
            inserts: plan.inserts(),
            updates: plan.updates(),
            deletes: plan.deletes(),
            recreated: plan.recreated,
        });

        Ok(plan)
    }

    /// Delete (or, one-to-many, disown) all rows for the owner.
    #[must_use]
    pub fn remove(&self, owner: &Value) -> Vec<RowOp> {
        if self.descriptor.is_inverse {
            return Vec::new();
        }
        vec![RowOp::new(
            RowOpKind::RemoveAll,
            &self.statements.remove_all,
            vec![owner.clone().into()],
        )]
    }

    /// Insert every current row, regardless of the snapshot. Used after a
    /// remove-all, and for the first flush of a freshly wrapped collection.
    pub fn recreate(
        &self,
        handle: &mut CollectionHandle,
        ctx: &dyn SessionContext,
    ) -> Result<Vec<RowOp>, InternalError> {
        if self.descriptor.is_inverse {
            return Ok(Vec::new());
        }
        handle.pre_insert(ctx);

        let mut ops = Vec::new();
        for entry in handle.entries() {
            if handle.entry_exists(&entry) {
                ops.push(self.insert_op(handle.owner(), &entry)?);
            }
        }
        Ok(ops)
    }

    /// One delete per row present in the snapshot but gone from the live
    /// container.
    pub fn delete_rows(&self, handle: &CollectionHandle) -> Result<Vec<RowOp>, InternalError> {
        if self.descriptor.is_inverse {
            return Ok(Vec::new());
        }

        let owner = handle.owner();
        handle
            .get_deletes(false)?
            .into_iter()
            .map(|key| {
                Ok(RowOp::new(
                    RowOpKind::Delete,
                    &self.statements.delete_row,
                    self.delete_params(owner, key)?,
                ))
            })
            .collect()
    }

    /// In-place element updates for rows whose address survived but whose
    /// element changed. On a one-to-many, each update splits into a removal
    /// and an addition UPDATE, and every removal runs before any addition so
    /// a reused index column never transits through a duplicate.
    pub fn update_rows(&self, handle: &CollectionHandle) -> Result<Vec<RowOp>, InternalError> {
        if self.descriptor.is_inverse {
            return Ok(Vec::new());
        }
        let Some(update_row) = &self.statements.update_row else {
            return Ok(Vec::new());
        };

        let owner = handle.owner();
        let mut removals = Vec::new();
        let mut additions = Vec::new();

        for entry in handle.entries() {
            if !handle.entry_exists(&entry) || !handle.needs_updating(&entry)? {
                continue;
            }
            match update_row {
                UpdateRow::InPlace(sql) => {
                    let mut params = vec![SqlParam::Value(entry.element.clone())];
                    params.extend(self.row_select_params(owner, &entry)?);
                    additions.push(RowOp::new(RowOpKind::Update, sql, params));
                }
                UpdateRow::Split { remove, add } => {
                    removals.push(RowOp::new(
                        RowOpKind::Update,
                        remove,
                        self.row_select_params(owner, &entry)?,
                    ));
                    let mut params = vec![owner.clone().into()];
                    params.push(self.index_param(&entry)?);
                    params.push(entry.element.clone().into());
                    additions.push(RowOp::new(RowOpKind::Update, add, params));
                }
            }
        }

        removals.extend(additions);
        Ok(removals)
    }

    /// One insert per row present now but absent from the snapshot.
    /// Assigns surrogate row ids to fresh identifier-bag entries first.
    pub fn insert_rows(
        &self,
        handle: &mut CollectionHandle,
        ctx: &dyn SessionContext,
    ) -> Result<Vec<RowOp>, InternalError> {
        if self.descriptor.is_inverse {
            return Ok(Vec::new());
        }
        handle.pre_insert(ctx);

        let mut ops = Vec::new();
        for entry in handle.entries() {
            if handle.entry_exists(&entry) && handle.needs_inserting(&entry)? {
                ops.push(self.insert_op(handle.owner(), &entry)?);
            }
        }
        Ok(ops)
    }

    // ---------------------------------------------------------------------
    // Parameter binding
    // ---------------------------------------------------------------------

    /// Insert binding order: key, index, surrogate id, element. On a
    /// one-to-many the element is the UPDATE predicate and binds last with
    /// no surrogate id in between.
    fn insert_op(&self, owner: &Value, entry: &RowEntry) -> Result<RowOp, InternalError> {
        let mut params = vec![SqlParam::Value(owner.clone())];
        if self.descriptor.has_index() {
            params.push(self.index_param(entry)?);
        }
        if !self.descriptor.is_one_to_many && self.descriptor.has_identifier() {
            params.push(self.identifier_param(entry)?);
        }
        params.push(entry.element.clone().into());

        Ok(RowOp::new(
            RowOpKind::Insert,
            &self.statements.insert_row,
            params,
        ))
    }

    /// Row-select predicate in the currency the delete key carries. The key
    /// currency and the rendered statement agree by construction; a mismatch
    /// means the handle and descriptor describe different shapes.
    fn delete_params(
        &self,
        owner: &Value,
        key: DeleteKey,
    ) -> Result<Vec<SqlParam>, InternalError> {
        let params = match (self.descriptor.row_select(), key) {
            (RowSelect::Identifier, DeleteKey::RowId(id)) => vec![id.into()],
            (RowSelect::KeyAndIndex, DeleteKey::Index(i)) => {
                vec![owner.clone().into(), Value::Int(i).into()]
            }
            (RowSelect::KeyAndIndex, DeleteKey::MapKey(key)) => {
                vec![owner.clone().into(), key.into()]
            }
            (RowSelect::KeyAndElement, DeleteKey::Element(element)) => {
                vec![owner.clone().into(), element.into()]
            }
            (select, key) => {
                return Err(InternalError::sync_invariant(format!(
                    "delete key {key:?} does not address rows selected by {select:?} \
                     for collection role: {}",
                    self.descriptor.role
                )));
            }
        };
        Ok(params)
    }

    fn row_select_params(
        &self,
        owner: &Value,
        entry: &RowEntry,
    ) -> Result<Vec<SqlParam>, InternalError> {
        match self.descriptor.row_select() {
            RowSelect::Identifier => Ok(vec![self.identifier_param(entry)?]),
            RowSelect::KeyAndIndex => Ok(vec![owner.clone().into(), self.index_param(entry)?]),
            RowSelect::KeyAndElement => Err(InternalError::sync_invariant(format!(
                "no row address for in-place update of collection role: {}",
                self.descriptor.role
            ))),
        }
    }

    fn index_param(&self, entry: &RowEntry) -> Result<SqlParam, InternalError> {
        entry.index.clone().map(SqlParam::Value).ok_or_else(|| {
            InternalError::corruption(
                ErrorOrigin::Synchronizer,
                format!(
                    "null index column for collection: {}",
                    self.descriptor.role
                ),
            )
        })
    }

    fn identifier_param(&self, entry: &RowEntry) -> Result<SqlParam, InternalError> {
        entry.identifier.map(SqlParam::RowId).ok_or_else(|| {
            InternalError::corruption(
                ErrorOrigin::Synchronizer,
                format!(
                    "null identifier column for collection: {}",
                    self.descriptor.role
                ),
            )
        })
    }

    fn check_role(&self, handle: &CollectionHandle) -> Result<(), InternalError> {
        if handle.role() == self.descriptor.role {
            Ok(())
        } else {
            Err(InternalError::sync_invariant(format!(
                "handle for role {} flushed through synchronizer for role {}",
                handle.role(),
                self.descriptor.role
            )))
        }
    }
}
