//! Growable arena pool
//!
//! # Safety
//!
//! This module hands out raw block pointers carved from pages obtained from a
//! [`PageSource`]:
//! - pages form a stack; only the top page is bump-allocated
//! - freed blocks carry an intrusive free-list node in their own storage
//! - the trailing block of the top page is reclaimed by moving the bump
//!   offset back instead of going through the free list
//!
//! ## Invariants
//!
//! - `page.offset` is a multiple of `BLOCK_SIZE`; an emptied top page is
//!   released immediately, only a reserved page promoted by `reserve` can
//!   sit on top with `offset == 0`
//! - every page below the top is full at the time a page is pushed on it
//! - free-list blocks always sit below their page's offset, so releasing an
//!   emptied page never strands a free-list node
//! - `allocated_blocks` counts the blocks of every live page plus the
//!   reserved page
//! - `base` is `None` exactly when `top` is `None`

use core::fmt;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};

#[cfg(feature = "logging")]
use tracing::{trace, warn};

use crate::block::{BlockSlot, FreeList, block_size, blocks_layout, slot_to_value, value_to_slot};
use crate::config::ArenaConfig;
use crate::contract::{Contract, DebugChecked, verify, verify_object_count, verify_with};
use crate::error::{PoolError, PoolResult};
use crate::page::{Page, PageId, PageTable};
use crate::source::{GlobalPageSource, PageSource};
use crate::stats::PoolStats;
use crate::traits::{AllocatorTraits, BlockAllocator, Reservable, Resettable};

/// Growable fixed-block pool
///
/// Allocates one `T`-sized block per call from a stack of pages. Pages grow
/// geometrically: a new page holds at least as many blocks as every earlier
/// page combined (see [`ArenaConfig`]).
///
/// # Memory Layout
/// ```text
///  top ──▶ [B0][B1][B2][B3][    unused    ]   offset = 4 blocks
///            │
///          prev
///            ▼
///         [B0][B1]                            full
///            │
///          prev
///            ▼
///  base ──▶ [B0]                              full
///
///  reserved page (optional): [            ]   promoted when top fills up
/// ```
///
/// The pool is single-owner: it is `Send` but not `Sync`, and callers must
/// serialize access externally.
///
/// # Examples
///
/// ```rust
/// use blockpool::PoolAllocator;
///
/// # fn main() -> blockpool::PoolResult<()> {
/// let mut pool = PoolAllocator::<[u8; 24]>::new();
/// let a = pool.allocate(1)?;
/// let b = pool.allocate(1)?;
/// unsafe {
///     pool.deallocate(b, 1)?;
///     pool.deallocate(a, 1)?;
/// }
/// assert!(pool.is_empty());
/// # Ok(())
/// # }
/// ```
pub struct PoolAllocator<T, S: PageSource = GlobalPageSource, C: Contract = DebugChecked> {
    pages: PageTable,
    /// Oldest page, used to detect a fully emptied arena
    base: Option<PageId>,
    /// Current bump-allocation target
    top: Option<PageId>,
    /// Spare page built by `reserve`, waiting for promotion
    reserved_page: Option<PageId>,
    free: FreeList<T>,

    allocated_blocks: usize,
    used_blocks: usize,
    /// Prefer page space over the free list until ordinary growth happens
    force_page_write: bool,

    source: S,
    config: ArenaConfig,
    _contract: PhantomData<fn() -> C>,
}

impl<T, C: Contract> PoolAllocator<T, GlobalPageSource, C> {
    /// Creates an empty pool backed by the global allocator
    ///
    /// No memory is allocated until the first `allocate`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_source_and_config(GlobalPageSource::new(), ArenaConfig::default())
    }

    /// Creates an empty pool with a custom configuration
    #[must_use]
    pub fn with_config(config: ArenaConfig) -> Self {
        Self::with_source_and_config(GlobalPageSource::new(), config)
    }
}

impl<T, S: PageSource, C: Contract> PoolAllocator<T, S, C> {
    /// Bytes per block: large enough for a `T` or a free-list node
    pub const BLOCK_SIZE: usize = block_size::<T>();

    /// Creates an empty pool drawing pages from `source`
    pub fn with_source(source: S) -> Self {
        Self::with_source_and_config(source, ArenaConfig::default())
    }

    /// Creates an empty pool drawing pages from `source` with `config`
    pub fn with_source_and_config(source: S, config: ArenaConfig) -> Self {
        Self {
            pages: PageTable::new(),
            base: None,
            top: None,
            reserved_page: None,
            free: FreeList::new(),
            allocated_blocks: 0,
            used_blocks: 0,
            force_page_write: false,
            source,
            config,
            _contract: PhantomData,
        }
    }

    // ------------------------------------------------------------------------
    // Allocation
    // ------------------------------------------------------------------------

    /// Returns uninitialized storage for one `T`
    ///
    /// Reuses the most recently freed block unless a reservation is being
    /// consumed; otherwise bump-allocates from the top page, growing the
    /// arena first when the top page is missing or full.
    ///
    /// # Errors
    ///
    /// - [`PoolError::InvalidObjectCount`] if `count != 1` (checked policy)
    /// - [`PoolError::AllocationFailed`] / [`PoolError::SizeOverflow`] if a
    ///   page cannot be obtained; the pool is left unchanged
    pub fn allocate(&mut self, count: usize) -> PoolResult<NonNull<T>> {
        verify_object_count::<C>(count)?;

        let slot = self.allocate_block()?;
        self.used_blocks += 1;

        if let Some(pattern) = self.config.alloc_pattern {
            // SAFETY: slot is a block of this pool, valid for BLOCK_SIZE bytes
            unsafe { ptr::write_bytes(slot.as_ptr().cast::<u8>(), pattern, Self::BLOCK_SIZE) };
        }

        Ok(slot_to_value(slot))
    }

    /// Returns a block to the pool
    ///
    /// The trailing block of the top page shrinks the page's bump offset;
    /// an emptied top page is released together with any reserved page.
    /// Every other block is pushed onto the free list.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `ptr` was returned by `allocate` on this pool and not freed since
    /// - the element stored in the block has been dropped or moved out
    ///
    /// # Errors
    ///
    /// Under a checked policy, [`PoolError::InvalidObjectCount`] for
    /// `count != 1` and [`PoolError::ForeignPointer`] for a pointer that is
    /// not a handed-out block of this pool, including one already freed.
    /// The pool is left unchanged. The double-free check walks the free list.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<T>, count: usize) -> PoolResult<()> {
        verify_object_count::<C>(count)?;
        let slot = value_to_slot(ptr);
        verify_with::<C>(
            || self.used_blocks > 0 && self.owns(ptr) && !self.free.contains(slot),
            || PoolError::foreign_pointer(ptr.as_ptr()),
        )?;

        if let Some(pattern) = self.config.dealloc_pattern {
            // SAFETY: slot is a block of this pool (caller contract), no longer live
            unsafe { ptr::write_bytes(slot.as_ptr().cast::<u8>(), pattern, Self::BLOCK_SIZE) };
        }

        match self.top {
            Some(top) if self.is_trailing(top, ptr) => self.shrink_top(top),
            // SAFETY: the block belongs to this pool and is no longer live
            // (caller contract); it is not trailing, so it stays below its
            // page's offset
            _ => unsafe { self.free.push(slot) },
        }

        self.used_blocks -= 1;
        Ok(())
    }

    /// Ensures `count` more blocks can be allocated without touching the page source
    ///
    /// Builds (or rebuilds, if too small) a reserved page covering the
    /// shortfall against the top page's remaining space, promoting it at once
    /// when the top page is full. Until the next ordinary page growth,
    /// allocation prefers page space over the free list so the reserved
    /// capacity is consumed contiguously.
    ///
    /// `count == 0` is a no-op.
    ///
    /// # Errors
    ///
    /// - [`PoolError::NoActivePage`] if nothing was ever allocated (checked
    ///   policy; unchecked pools ignore the call)
    /// - [`PoolError::AllocationFailed`] / [`PoolError::SizeOverflow`] if the
    ///   reserved page cannot be built; an existing reserved page is kept
    pub fn reserve(&mut self, count: usize) -> PoolResult<()> {
        if count == 0 {
            return Ok(());
        }
        let Some(top) = self.top else {
            verify::<C>(false, || PoolError::NoActivePage)?;
            return Ok(());
        };

        let available = self.pages[top].remaining() / Self::BLOCK_SIZE;
        let shortfall = count.saturating_sub(available);
        if shortfall > 0 {
            let fits = self
                .reserved_page
                .is_some_and(|id| self.pages[id].size / Self::BLOCK_SIZE >= shortfall);
            if !fits {
                // The old reservation stays intact if the new page cannot be built
                let id = self.create_page(shortfall)?;
                if let Some(stale) = self.reserved_page.replace(id) {
                    self.release_page(stale);
                }
                self.allocated_blocks += shortfall;
            }

            if self.pages[top].is_full()
                && let Some(reserved) = self.reserved_page.take()
            {
                #[cfg(feature = "logging")]
                trace!(shortfall, "reserved page promoted by reserve");

                self.pages[reserved].prev = Some(top);
                self.top = Some(reserved);
            }
        }

        #[cfg(feature = "logging")]
        trace!(count, shortfall, "capacity reserved");

        self.force_page_write = true;
        Ok(())
    }

    /// Releases every page and the reserved page
    ///
    /// The pool returns to its freshly constructed state. Safe to call on an
    /// empty pool. Every pointer handed out before the call dangles.
    pub fn reset(&mut self) {
        #[cfg(feature = "logging")]
        trace!(
            used_blocks = self.used_blocks,
            allocated_blocks = self.allocated_blocks,
            "pool reset"
        );

        let mut cursor = self.top.take();
        while let Some(id) = cursor {
            cursor = self.release_page(id);
        }
        if let Some(reserved) = self.reserved_page.take() {
            self.release_page(reserved);
        }

        self.base = None;
        self.free.clear();
        self.allocated_blocks = 0;
        self.used_blocks = 0;
        self.force_page_write = false;
    }

    /// Moves the pool's state out, leaving a fresh pool behind
    ///
    /// The returned pool owns every page, the reserved page and the free
    /// list; `self` keeps a clone of the page source and configuration and
    /// never references the moved pages again.
    #[must_use = "dropping the taken pool releases its pages"]
    pub fn take(&mut self) -> Self
    where
        S: Clone,
    {
        let fresh = Self::with_source_and_config(self.source.clone(), self.config.clone());
        core::mem::replace(self, fresh)
    }

    /// Exchanges the complete state of two pools
    pub fn swap(&mut self, other: &mut Self) {
        core::mem::swap(self, other);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Blocks currently handed out
    pub fn used_blocks(&self) -> usize {
        self.used_blocks
    }

    /// Blocks backed by live pages and the reserved page
    pub fn allocated_blocks(&self) -> usize {
        self.allocated_blocks
    }

    /// Pages on the stack (the reserved page is not counted)
    pub fn page_count(&self) -> usize {
        self.pages.len() - usize::from(self.reserved_page.is_some())
    }

    /// Whether a reserved page is waiting for promotion
    pub fn has_reserved_page(&self) -> bool {
        self.reserved_page.is_some()
    }

    /// Freed blocks waiting on the free list
    pub fn free_list_len(&self) -> usize {
        self.free.len()
    }

    /// Whether the arena holds no page
    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    /// Whether the next allocations bypass the free list
    pub fn is_forcing_page_writes(&self) -> bool {
        self.force_page_write
    }

    /// Remaining bump capacity of the top page, in blocks
    pub fn top_page_available(&self) -> usize {
        self.top
            .map_or(0, |id| self.pages[id].remaining() / Self::BLOCK_SIZE)
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Checks if `ptr` is a bump-allocated block of a live page
    ///
    /// Walks the page stack, which stays short because pages grow
    /// geometrically.
    pub fn owns(&self, ptr: NonNull<T>) -> bool {
        let addr = ptr.as_ptr() as usize;
        let mut cursor = self.top;
        while let Some(id) = cursor {
            let page = &self.pages[id];
            let start = page.data().as_ptr() as usize;
            if addr >= start && addr < page.used_end() {
                return (addr - start).is_multiple_of(Self::BLOCK_SIZE);
            }
            cursor = page.prev;
        }
        false
    }

    /// Snapshot of the pool's bookkeeping
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            block_size: Self::BLOCK_SIZE,
            used_blocks: self.used_blocks,
            allocated_blocks: self.allocated_blocks,
            free_blocks: self.free.len(),
            pages: self.page_count(),
            reserved_blocks: self
                .reserved_page
                .map_or(0, |id| self.pages[id].size / Self::BLOCK_SIZE),
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn allocate_block(&mut self) -> PoolResult<NonNull<BlockSlot<T>>> {
        if !self.force_page_write
            && let Some(slot) = self.free.pop()
        {
            return Ok(slot);
        }

        let top = match self.top {
            Some(top) if !self.pages[top].is_full() => top,
            _ => self.grow()?,
        };

        let page = &mut self.pages[top];
        let block = page.cursor();
        page.offset += Self::BLOCK_SIZE;
        Ok(block.cast())
    }

    /// Pushes a new top page: the reserved page if any, else a fresh one
    fn grow(&mut self) -> PoolResult<PageId> {
        let id = if let Some(reserved) = self.reserved_page.take() {
            #[cfg(feature = "logging")]
            trace!("reserved page promoted");

            reserved
        } else {
            let blocks = self
                .config
                .next_page_blocks(self.allocated_blocks)
                .ok_or_else(|| PoolError::size_overflow("next page size"))?;
            let id = self.create_page(blocks)?;
            self.allocated_blocks += blocks;
            self.force_page_write = false;
            id
        };

        self.pages[id].prev = self.top;
        self.top = Some(id);
        if self.base.is_none() {
            self.base = Some(id);
        }
        Ok(id)
    }

    fn create_page(&mut self, blocks: usize) -> PoolResult<PageId> {
        let layout =
            blocks_layout::<T>(blocks).ok_or_else(|| PoolError::size_overflow("page layout"))?;
        let data = self.source.allocate_page(layout)?;

        #[cfg(feature = "logging")]
        trace!(blocks, bytes = layout.size(), "page allocated");

        Ok(self.pages.insert(Page::new(data, layout, self.top)))
    }

    /// Frees a page's memory and returns the page below it
    fn release_page(&mut self, id: PageId) -> Option<PageId> {
        let page = self.pages.remove(id)?;
        self.allocated_blocks -= page.size / Self::BLOCK_SIZE;

        #[cfg(feature = "logging")]
        trace!(blocks = page.size / Self::BLOCK_SIZE, "page released");

        // SAFETY: the memory came from this source with this layout and the
        // record was just removed, so it cannot be released twice
        unsafe { self.source.deallocate_page(page.data(), page.layout()) };
        page.prev
    }

    /// Whether `ptr` is the last bump-allocated block of page `id`
    ///
    /// A promoted reserved page may sit on top with nothing handed out yet;
    /// its start can coincide with the end of the page below.
    fn is_trailing(&self, id: PageId, ptr: NonNull<T>) -> bool {
        let page = &self.pages[id];
        page.offset > 0 && ptr.as_ptr() as usize + Self::BLOCK_SIZE == page.used_end()
    }

    /// Reclaims the trailing block of the top page
    fn shrink_top(&mut self, top: PageId) {
        let page = &mut self.pages[top];
        page.offset -= Self::BLOCK_SIZE;
        if page.offset > 0 {
            return;
        }

        self.top = self.release_page(top);
        if let Some(reserved) = self.reserved_page.take() {
            // An emptied top page makes the reservation moot until the next growth
            #[cfg(feature = "logging")]
            warn!("reserved page discarded with emptied top page");

            self.release_page(reserved);
        }
        if self.base == Some(top) {
            self.top = None;
            self.base = None;
        }
    }

    /// Addresses and counters that make up the pool's identity
    fn identity(&self) -> ([Option<NonNull<u8>>; 4], usize, usize, bool) {
        let page_addr = |id: Option<PageId>| id.map(|id| self.pages[id].data());
        (
            [
                page_addr(self.base),
                page_addr(self.top),
                page_addr(self.reserved_page),
                self.free.head(),
            ],
            self.allocated_blocks,
            self.used_blocks,
            self.force_page_write,
        )
    }
}

impl<T, S: PageSource + Default, C: Contract> Default for PoolAllocator<T, S, C> {
    fn default() -> Self {
        Self::with_source(S::default())
    }
}

/// Identity of state, not content: two pools are equal only when they
/// reference the same pages and free list with the same counters.
impl<T, S: PageSource, C: Contract> PartialEq for PoolAllocator<T, S, C> {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl<T, S: PageSource, C: Contract> Eq for PoolAllocator<T, S, C> {}

impl<T, S: PageSource, C: Contract> Drop for PoolAllocator<T, S, C> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T, S: PageSource, C: Contract> fmt::Debug for PoolAllocator<T, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("block_size", &Self::BLOCK_SIZE)
            .field("used_blocks", &self.used_blocks)
            .field("allocated_blocks", &self.allocated_blocks)
            .field("pages", &self.page_count())
            .field("reserved_page", &self.reserved_page.is_some())
            .field("free_list", &self.free)
            .field("force_page_write", &self.force_page_write)
            .finish_non_exhaustive()
    }
}

// SAFETY: PoolAllocator can move to another thread as a whole.
// - pages and free-list nodes are owned exclusively by this instance
// - no thread-local state; raw pointers are only dereferenced through &mut self
// - T: Send because blocks handed out may carry T values across with the pool
// Not Sync: every operation mutates unsynchronized state.
unsafe impl<T: Send, S: PageSource + Send, C: Contract> Send for PoolAllocator<T, S, C> {}

impl<T, S: PageSource, C: Contract> BlockAllocator for PoolAllocator<T, S, C> {
    type Value = T;

    const TRAITS: AllocatorTraits = AllocatorTraits {
        is_always_equal: false,
        propagate_on_container_copy: false,
        propagate_on_container_move: true,
        propagate_on_container_swap: true,
        supports_multiple_objects: false,
        supports_reserve: true,
        supports_reset: true,
    };

    fn allocate(&mut self, count: usize) -> PoolResult<NonNull<T>> {
        PoolAllocator::allocate(self, count)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<T>, count: usize) -> PoolResult<()> {
        // SAFETY: forwarded caller contract
        unsafe { PoolAllocator::deallocate(self, ptr, count) }
    }
}

impl<T, S: PageSource, C: Contract> Reservable for PoolAllocator<T, S, C> {
    fn reserve(&mut self, count: usize) -> PoolResult<()> {
        PoolAllocator::reserve(self, count)
    }
}

impl<T, S: PageSource, C: Contract> Resettable for PoolAllocator<T, S, C> {
    fn reset(&mut self) {
        PoolAllocator::reset(self);
    }
}
