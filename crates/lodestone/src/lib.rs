//! Lodestone: persistent-collection lifecycle runtime.
//!
//! ## Crate layout
//! - `core`: collection handles, snapshot diffing, the row synchronizer, and
//!   the soft-locking cache gateway.
//!
//! The `prelude` module mirrors the surface a driving session uses.

pub use lodestone_core as core;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use lodestone_core::error::InternalError;

///
/// Session Prelude
///

pub mod prelude {
    pub use crate::core::{
        cache::{CacheGateway, SoftLockGuard, Timestamp},
        collection::{CollectionHandle, Contents},
        model::{CollectionDescriptor, CollectionKind, ColumnKind, ColumnModel},
        session::{CollectionKey, LoadedRow, SessionContext, SessionId},
        sync::{FlushPlan, RowOp, RowSynchronizer},
        value::{EntityId, RowId, Value},
    };
}
