//! Contract-check policies
//!
//! Caller bugs (a block count other than one, freeing a pointer the pool
//! does not own, reserving before the first allocation) are checked or
//! compiled out depending on a zero-sized policy type chosen at compile
//! time. A checked policy turns a violation into an `Err`; an unchecked one
//! removes the branch entirely.

use crate::error::{PoolError, PoolResult};

/// Compile-time selection of contract verification
pub trait Contract {
    /// Whether contract violations are detected and reported
    const CHECKED: bool;
}

/// Always verify the allocator contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Checked;

/// Never verify the allocator contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Unchecked;

/// Verify in debug builds only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DebugChecked;

impl Contract for Checked {
    const CHECKED: bool = true;
}

impl Contract for Unchecked {
    const CHECKED: bool = false;
}

impl Contract for DebugChecked {
    const CHECKED: bool = cfg!(debug_assertions);
}

/// Report `violation` when `holds` is false and the policy is checked
#[inline(always)]
pub(crate) fn verify<C: Contract>(
    holds: bool,
    violation: impl FnOnce() -> PoolError,
) -> PoolResult<()> {
    if C::CHECKED && !holds {
        return Err(violation());
    }
    Ok(())
}

/// Like [`verify`], but the condition is only evaluated under a checked policy
#[inline(always)]
pub(crate) fn verify_with<C: Contract>(
    holds: impl FnOnce() -> bool,
    violation: impl FnOnce() -> PoolError,
) -> PoolResult<()> {
    if C::CHECKED && !holds() {
        return Err(violation());
    }
    Ok(())
}

/// The single-object rule shared by every pool
#[inline(always)]
pub(crate) fn verify_object_count<C: Contract>(count: usize) -> PoolResult<()> {
    verify::<C>(count == 1, || PoolError::invalid_object_count(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_reports() {
        assert_eq!(
            verify_object_count::<Checked>(2),
            Err(PoolError::InvalidObjectCount { count: 2 })
        );
        assert!(verify_object_count::<Checked>(1).is_ok());
    }

    #[test]
    fn unchecked_passes_everything() {
        assert!(verify_object_count::<Unchecked>(0).is_ok());
        assert!(verify::<Unchecked>(false, || PoolError::NoActivePage).is_ok());
    }

    #[test]
    fn lazy_condition_skipped_when_unchecked() {
        let result = verify_with::<Unchecked>(
            || panic!("condition evaluated"),
            || PoolError::NoActivePage,
        );
        assert!(result.is_ok());
        assert_eq!(
            verify_with::<Checked>(|| false, || PoolError::NoActivePage),
            Err(PoolError::NoActivePage)
        );
    }

    #[test]
    fn debug_checked_follows_build_mode() {
        assert_eq!(
            verify_object_count::<DebugChecked>(5).is_err(),
            cfg!(debug_assertions)
        );
    }
}
