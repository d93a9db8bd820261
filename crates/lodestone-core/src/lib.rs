//! Core runtime for Lodestone: collection handles, snapshot diffing, the row
//! synchronizer, and the soft-locking cache gateway, with the ergonomics
//! exported via the `prelude`.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod cache;
pub mod collection;
pub mod error;
pub mod model;
pub mod obs;
pub mod session;
pub mod sync;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, synchronizers, gateways, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        collection::{CollectionHandle, Contents},
        model::{CollectionDescriptor, CollectionKind},
        session::{CollectionKey, SessionContext},
        value::Value,
    };
}
