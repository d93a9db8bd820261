//! Persistent collection handles: the lazy-initialization state machine,
//! kind-tagged containers, snapshots, and the snapshot diff strategies.

mod contents;
mod diff;
mod handle;
mod snapshot;
mod state;

#[cfg(test)]
mod tests;

// re-exports
pub use contents::{Contents, RowEntry};
pub use diff::DeleteKey;
pub use handle::CollectionHandle;
pub use snapshot::{CollectionSnapshot, Disassembled, DisassembledRow};
pub use state::LoadState;
