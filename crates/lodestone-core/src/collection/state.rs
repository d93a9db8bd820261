use crate::error::InternalError;
use std::fmt;

///
/// LoadState
///
/// Lazy-initialization state of a collection handle. One authoritative
/// transition pair (`begin_load` / `finish_load`) replaces independent
/// initialized/initializing flags so illegal combinations are
/// unrepresentable.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Initialized,
}

impl LoadState {
    /// `Unloaded → Loading`.
    ///
    /// A begin while already `Loading` is illegal reentrancy, a
    /// programming-error fault rather than a retryable condition.
    pub fn begin_load(&mut self) -> Result<(), InternalError> {
        match self {
            Self::Unloaded => {
                *self = Self::Loading;
                Ok(())
            }
            Self::Loading => Err(InternalError::illegal_access(
                "illegal access to loading collection",
            )),
            Self::Initialized => Err(InternalError::collection_invariant(
                "begin_load on an initialized collection",
            )),
        }
    }

    /// `Loading → Initialized`.
    pub fn finish_load(&mut self) -> Result<(), InternalError> {
        match self {
            Self::Loading => {
                *self = Self::Initialized;
                Ok(())
            }
            _ => Err(InternalError::collection_invariant(
                "finish_load outside of a load",
            )),
        }
    }

    /// Abort an in-flight load, clearing the loading marker so a caller may
    /// retry or escalate.
    pub fn abort_load(&mut self) {
        if *self == Self::Loading {
            *self = Self::Unloaded;
        }
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized)
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Initialized => "initialized",
        };
        write!(f, "{label}")
    }
}
