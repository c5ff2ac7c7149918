//! Named outcomes for fallible operations around the allocators
//!
//! The allocator contract itself never returns these: an allocator reports
//! exhaustion with an empty [`Block`](crate::Block). `AllocError` is used by
//! construction (backing regions, config validation) and by the typed
//! [`object`](crate::object) layer.

use thiserror::Error;
use tracing::warn;

/// Result type for fallible allocator operations
pub type AllocResult<T> = Result<T, AllocError>;

/// Errors reported by allocator construction and the typed object layer
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Generic failure
    #[error("Failed. An unknown error has occurred.")]
    Fail,

    /// A pointer that had to be valid was null
    #[error("Invalid pointer, it's null.")]
    NullPointer,

    /// A container operation needed at least one element
    #[error("Operation requires a non-empty container.")]
    EmptyContainer,

    /// The allocator (or its upstream) could not satisfy a request
    #[error("Not enough memory: {requested} bytes requested.")]
    NotEnoughMemory {
        /// Bytes that were requested
        requested: usize,
    },

    /// An index was outside a container
    #[error("Index {index} out of bounds for length {len}.")]
    OutOfBounds {
        /// Offending index
        index: usize,
        /// Container length
        len: usize,
    },

    /// Alignment is not a power of two
    #[error("Invalid alignment: {alignment} is not a power of two.")]
    InvalidAlignment {
        /// Offending alignment
        alignment: usize,
    },

    /// Construction parameters are inconsistent
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration
        reason: String,
    },

    /// A size computation overflowed `usize`
    #[error("Size overflow during {operation}.")]
    SizeOverflow {
        /// Computation that overflowed
        operation: &'static str,
    },
}

impl AllocError {
    /// Short stable name of the outcome
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fail => "Fail",
            Self::NullPointer => "NullPtr",
            Self::EmptyContainer => "EmptyContainer",
            Self::NotEnoughMemory { .. } => "NotEnoughMemory",
            Self::OutOfBounds { .. } => "OutOfBounds",
            Self::InvalidAlignment { .. } => "InvalidAlignment",
            Self::InvalidConfig { .. } => "InvalidConfig",
            Self::SizeOverflow { .. } => "SizeOverflow",
        }
    }

    /// One-line description of the outcome kind
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Fail => "Generic fail.",
            Self::NullPointer => "Null pointer.",
            Self::EmptyContainer => "Empty container.",
            Self::NotEnoughMemory { .. } => "Not enough memory.",
            Self::OutOfBounds { .. } => "Out of bounds.",
            Self::InvalidAlignment { .. } => "Invalid alignment.",
            Self::InvalidConfig { .. } => "Invalid configuration.",
            Self::SizeOverflow { .. } => "Size overflow.",
        }
    }

    /// Error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Fail => "ALLOC:FAIL",
            Self::NullPointer => "ALLOC:NULL_PTR",
            Self::EmptyContainer => "ALLOC:EMPTY",
            Self::NotEnoughMemory { .. } => "ALLOC:OOM",
            Self::OutOfBounds { .. } => "ALLOC:BOUNDS",
            Self::InvalidAlignment { .. } => "ALLOC:ALIGN",
            Self::InvalidConfig { .. } => "ALLOC:CONFIG",
            Self::SizeOverflow { .. } => "ALLOC:OVERFLOW",
        }
    }

    /// Whether retrying against a different allocator could succeed
    #[must_use]
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, Self::NotEnoughMemory { .. })
    }

    // ============================================================================
    // Convenience Constructors
    // ============================================================================

    /// Create a not-enough-memory error
    pub fn not_enough_memory(requested: usize) -> Self {
        warn!(requested, "allocation request could not be satisfied");
        Self::NotEnoughMemory { requested }
    }

    /// Create an out-of-bounds error
    pub fn out_of_bounds(index: usize, len: usize) -> Self {
        Self::OutOfBounds { index, len }
    }

    /// Create an invalid alignment error
    pub fn invalid_alignment(alignment: usize) -> Self {
        Self::InvalidAlignment { alignment }
    }

    /// Create an invalid config error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a size overflow error
    pub fn size_overflow(operation: &'static str) -> Self {
        Self::SizeOverflow { operation }
    }
}
