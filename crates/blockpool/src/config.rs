//! Growable arena configuration

/// Minimum number of blocks on a freshly grown page
pub const MIN_ALLOCATED_BLOCKS: usize = 1;

/// Growth factor applied to the blocks already granted when sizing a new page
pub const RESERVE_MULTIPLIER: usize = 1;

/// Configuration for [`PoolAllocator`](crate::PoolAllocator)
///
/// A new page holds `min_page_blocks + allocated_blocks * reserve_multiplier`
/// blocks, so with the defaults every page is at least as large as all the
/// pages before it combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Floor for the size of a grown page, in blocks
    pub min_page_blocks: usize,

    /// Multiplier applied to the blocks already granted
    pub reserve_multiplier: usize,

    /// Fill pattern byte for blocks handed out by `allocate` (for debugging)
    pub alloc_pattern: Option<u8>,
    /// Fill pattern byte for blocks returned by `deallocate` (for debugging)
    pub dealloc_pattern: Option<u8>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            min_page_blocks: MIN_ALLOCATED_BLOCKS,
            reserve_multiplier: RESERVE_MULTIPLIER,
            alloc_pattern: if cfg!(debug_assertions) {
                Some(0xBB)
            } else {
                None
            },
            dealloc_pattern: if cfg!(debug_assertions) {
                Some(0xDD)
            } else {
                None
            },
        }
    }
}

impl ArenaConfig {
    /// Production configuration - no debug fill
    #[must_use]
    pub fn production() -> Self {
        Self {
            min_page_blocks: MIN_ALLOCATED_BLOCKS,
            reserve_multiplier: RESERVE_MULTIPLIER,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Debug configuration - fill patterns always on
    #[must_use]
    pub fn debug() -> Self {
        Self {
            min_page_blocks: MIN_ALLOCATED_BLOCKS,
            reserve_multiplier: RESERVE_MULTIPLIER,
            alloc_pattern: Some(0xBB),
            dealloc_pattern: Some(0xDD),
        }
    }

    /// Performance configuration - larger first pages, fewer backing calls
    #[must_use]
    pub fn performance() -> Self {
        Self {
            min_page_blocks: 64,
            reserve_multiplier: 2,
            alloc_pattern: None,
            dealloc_pattern: None,
        }
    }

    /// Blocks for the next page given the blocks already granted
    ///
    /// A zero `min_page_blocks` is treated as one so growth always makes
    /// progress.
    pub(crate) fn next_page_blocks(&self, allocated_blocks: usize) -> Option<usize> {
        allocated_blocks
            .checked_mul(self.reserve_multiplier)?
            .checked_add(self.min_page_blocks.max(1))
    }
}
