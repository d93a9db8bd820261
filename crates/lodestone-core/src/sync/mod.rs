mod delta;
mod sql;
mod statement;
mod synchronizer;


pub use delta::{FlushPlan, RowOp, RowOpKind, SqlParam};
pub use statement::{StatementSet, UpdateRow};
pub use synchronizer::RowSynchronizer;
