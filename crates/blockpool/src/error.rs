//! Error types for the block pools
//!
//! Two families share one enum:
//! - resource exhaustion (the page source failed, the fixed buffer is full),
//!   always reported;
//! - contract violations (wrong object count, foreign pointer, reserve on an
//!   allocator without a page), reported only under a checked
//!   [`Contract`](crate::contract::Contract) policy.

use core::alloc::Layout;
use thiserror::Error;

#[cfg(feature = "logging")]
use tracing::{error, warn};

// ============================================================================
// Main Error Type
// ============================================================================

/// Block pool errors
#[must_use = "errors should be handled"]
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    // --- Resource Exhaustion ---
    #[error("Page allocation failed: {size} bytes with {align} byte alignment")]
    AllocationFailed { size: usize, align: usize },

    #[error("Size overflow while computing {operation}")]
    SizeOverflow { operation: &'static str },

    #[error("Fixed pool exhausted (capacity: {capacity} blocks)")]
    CapacityExceeded { capacity: usize },

    // --- Contract Violations ---
    #[error("Multiple object allocation and deallocation isn't supported (count: {count})")]
    InvalidObjectCount { count: usize },

    #[error("Pointer {address:#x} does not belong to this pool")]
    ForeignPointer { address: usize },

    #[error("Reserve requires an allocator that has allocated at least once")]
    NoActivePage,
}

impl PoolError {
    /// Get error code for categorization
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::AllocationFailed { .. } => "POOL:ALLOC:FAILED",
            Self::SizeOverflow { .. } => "POOL:ALLOC:OVERFLOW",
            Self::CapacityExceeded { .. } => "POOL:FIXED:EXHAUSTED",
            Self::InvalidObjectCount { .. } => "POOL:CONTRACT:COUNT",
            Self::ForeignPointer { .. } => "POOL:CONTRACT:FOREIGN",
            Self::NoActivePage => "POOL:CONTRACT:NO_PAGE",
        }
    }

    /// Whether the error reports a caller bug rather than exhaustion
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidObjectCount { .. } | Self::ForeignPointer { .. } | Self::NoActivePage
        )
    }

    // ------------------------------------------------------------------------
    // Convenience Constructors
    // ------------------------------------------------------------------------

    /// Create allocation failed error
    pub fn allocation_failed(size: usize, align: usize) -> Self {
        #[cfg(feature = "logging")]
        error!(size, align, "page allocation failed");

        Self::AllocationFailed { size, align }
    }

    /// Create allocation failed error from layout
    pub fn allocation_failed_with_layout(layout: Layout) -> Self {
        Self::allocation_failed(layout.size(), layout.align())
    }

    /// Create size overflow error
    pub fn size_overflow(operation: &'static str) -> Self {
        Self::SizeOverflow { operation }
    }

    /// Create capacity exceeded error
    pub fn capacity_exceeded(capacity: usize) -> Self {
        #[cfg(feature = "logging")]
        warn!(capacity, "fixed pool exhausted");

        Self::CapacityExceeded { capacity }
    }

    /// Create invalid object count error
    pub fn invalid_object_count(count: usize) -> Self {
        Self::InvalidObjectCount { count }
    }

    /// Create foreign pointer error
    pub fn foreign_pointer<T>(ptr: *const T) -> Self {
        Self::ForeignPointer {
            address: ptr as usize,
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// Result type for pool operations
pub type PoolResult<T> = core::result::Result<T, PoolError>;
