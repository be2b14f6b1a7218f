//! Backing page source for the growable pool
//!
//! The [`PageSource`] trait is the only place the growable pool touches the
//! heap. [`GlobalPageSource`] forwards to the global allocator; other
//! implementations can count, limit or redirect page allocations.

use core::alloc::Layout;
use core::ptr::NonNull;
use std::alloc::{alloc, dealloc};

use crate::error::{PoolError, PoolResult};

/// Trait for page allocation backends.
///
/// # Safety
///
/// Implementations must ensure:
/// - `allocate_page` returns memory valid for reads and writes of
///   `layout.size()` bytes, aligned to `layout.align()`
/// - the memory stays valid until it is passed to `deallocate_page`
/// - two live pages never overlap
pub unsafe trait PageSource {
    /// Allocates one page with the given layout.
    ///
    /// `layout.size()` is never zero.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AllocationFailed`] if the memory cannot be
    /// provided. The pool does not retry.
    fn allocate_page(&mut self, layout: Layout) -> PoolResult<NonNull<u8>>;

    /// Releases a page previously returned by `allocate_page`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `ptr` was returned by `allocate_page` on this source
    /// - `layout` matches the layout passed to that call
    /// - the page has not already been released
    unsafe fn deallocate_page(&mut self, ptr: NonNull<u8>, layout: Layout);
}

/// Page source using the standard library's global allocator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GlobalPageSource;

impl GlobalPageSource {
    /// Creates a new global page source.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

// SAFETY: GlobalPageSource forwards to the global allocator.
// - alloc() returns memory fitting the layout or null (mapped to Err)
// - dealloc() receives the same layout that alloc() was called with
unsafe impl PageSource for GlobalPageSource {
    fn allocate_page(&mut self, layout: Layout) -> PoolResult<NonNull<u8>> {
        debug_assert!(layout.size() > 0, "pages are never zero-sized");

        // SAFETY: layout has a non-zero size (every page holds at least one block)
        let ptr = unsafe { alloc(layout) };
        NonNull::new(ptr).ok_or_else(|| PoolError::allocation_failed_with_layout(layout))
    }

    unsafe fn deallocate_page(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: ptr was allocated with this layout by allocate_page() (caller contract)
        unsafe { dealloc(ptr.as_ptr(), layout) };
    }
}

// Forwarding impl so a pool can borrow a source owned elsewhere.
// SAFETY: all calls are delegated to the underlying source unchanged.
unsafe impl<S: PageSource + ?Sized> PageSource for &mut S {
    fn allocate_page(&mut self, layout: Layout) -> PoolResult<NonNull<u8>> {
        (**self).allocate_page(layout)
    }

    unsafe fn deallocate_page(&mut self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: forwarded caller contract
        unsafe { (**self).deallocate_page(ptr, layout) }
    }
}
