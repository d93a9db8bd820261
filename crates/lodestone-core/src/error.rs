use std::fmt;
use thiserror::Error as ThisError;

///
/// InternalError
///
/// Structured runtime error with a stable internal classification.
/// Not a stable API; intended for internal use and may change without notice.
///

#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct InternalError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,
}

impl InternalError {
    /// Construct an InternalError from a class/origin pair.
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
        }
    }

    /// Construct a collection-origin illegal-access fault.
    ///
    /// Raised for reentrant lazy loads and for access without a live,
    /// connected session. Never retried automatically.
    pub(crate) fn illegal_access(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::IllegalAccess,
            ErrorOrigin::Collection,
            message.into(),
        )
    }

    /// Construct a collection-origin invariant violation.
    pub(crate) fn collection_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Collection,
            message.into(),
        )
    }

    /// Construct a synchronizer-origin invariant violation.
    pub(crate) fn sync_invariant(message: impl Into<String>) -> Self {
        Self::new(
            ErrorClass::InvariantViolation,
            ErrorOrigin::Synchronizer,
            message.into(),
        )
    }

    /// Construct a corruption error for a specific origin.
    pub(crate) fn corruption(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Corruption, origin, message.into())
    }

    /// Construct a descriptor-origin configuration fault.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Config, ErrorOrigin::Descriptor, message.into())
    }

    /// Attach role/owner context, used when wrapping storage-layer faults so
    /// callers can tell which association and row failed.
    #[must_use]
    pub fn in_role(mut self, role: &str, owner: impl fmt::Display) -> Self {
        self.message = format!("{role}#{owner}: {}", self.message);
        self
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}:{}: {}", self.origin, self.class, self.message)
    }
}

///
/// ErrorClass
/// Internal error taxonomy for runtime classification.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Programmer error: illegal access to a lazy handle. Non-retryable.
    IllegalAccess,
    /// The snapshot disagrees with what storage now holds.
    Staleness,
    /// A cached value could not be reassembled consistently.
    CacheConsistency,
    /// Descriptor validation failure, fatal at startup.
    Config,
    Corruption,
    Internal,
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::IllegalAccess => "illegal_access",
            Self::Staleness => "staleness",
            Self::CacheConsistency => "cache_consistency",
            Self::Config => "config",
            Self::Corruption => "corruption",
            Self::Internal => "internal",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Subsystem that detected the fault.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Collection,
    Synchronizer,
    Cache,
    Session,
    Descriptor,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Collection => "collection",
            Self::Synchronizer => "synchronizer",
            Self::Cache => "cache",
            Self::Session => "session",
            Self::Descriptor => "descriptor",
        };
        write!(f, "{label}")
    }
}
