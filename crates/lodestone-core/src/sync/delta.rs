use crate::value::{RowId, Value};
use std::fmt;

///
/// SqlParam
///
/// One resolved positional binding. Surrogate row ids travel separately from
/// element values so the executor can bind them with the identifier column's
/// type rather than guessing from the value shape.
///

#[derive(Clone, Debug, PartialEq)]
pub enum SqlParam {
    Value(Value),
    RowId(RowId),
}

impl From<Value> for SqlParam {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<RowId> for SqlParam {
    fn from(id: RowId) -> Self {
        Self::RowId(id)
    }
}

impl fmt::Display for SqlParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => value.fmt(f),
            Self::RowId(id) => id.fmt(f),
        }
    }
}

///
/// RowOpKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RowOpKind {
    /// Delete (or, one-to-many, disown) every row for the owner.
    RemoveAll,
    Insert,
    Update,
    Delete,
}

///
/// RowOp
///
/// One fully bound row-level operation, ready for the external batching
/// layer. Ops of one kind within a plan form a single batch.
///

#[derive(Clone, Debug, PartialEq)]
pub struct RowOp {
    pub kind: RowOpKind,
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl RowOp {
    #[must_use]
    pub fn new(kind: RowOpKind, sql: &str, params: Vec<SqlParam>) -> Self {
        Self {
            kind,
            sql: sql.to_string(),
            params,
        }
    }
}

///
/// FlushPlan
///
/// Ordered row operations for one dirty collection, plus the elements
/// scheduled for entity-level deletion under orphan-delete. Execution and
/// transaction semantics belong to the driving session.
///

#[derive(Debug, Default)]
pub struct FlushPlan {
    pub role: String,
    /// Targeted delta was impossible; the plan deletes all rows for the
    /// owner and reinserts current state.
    pub recreated: bool,
    pub ops: Vec<RowOp>,
    pub orphans: Vec<Value>,
}

impl FlushPlan {
    #[must_use]
    pub fn empty(role: &str) -> Self {
        Self {
            role: role.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty() && self.orphans.is_empty()
    }

    #[must_use]
    pub fn count(&self, kind: RowOpKind) -> u64 {
        self.ops.iter().filter(|op| op.kind == kind).count() as u64
    }

    #[must_use]
    pub fn inserts(&self) -> u64 {
        self.count(RowOpKind::Insert)
    }

    #[must_use]
    pub fn updates(&self) -> u64 {
        self.count(RowOpKind::Update)
    }

    #[must_use]
    pub fn deletes(&self) -> u64 {
        self.count(RowOpKind::Delete) + self.count(RowOpKind::RemoveAll)
    }
}
