//! Pool statistics snapshot

use core::fmt;

/// Point-in-time view of a pool's bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Bytes per block
    pub block_size: usize,
    /// Blocks currently handed out
    pub used_blocks: usize,
    /// Blocks physically backed (pages + reserved page, or fixed capacity)
    pub allocated_blocks: usize,
    /// Freed blocks waiting on the free list
    pub free_blocks: usize,
    /// Live pages (the reserved page is not counted)
    pub pages: usize,
    /// Blocks held by the reserved page
    pub reserved_blocks: usize,
}

impl PoolStats {
    /// Bytes currently handed out
    pub fn used_bytes(&self) -> usize {
        self.used_blocks * self.block_size
    }

    /// Bytes physically backed
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_blocks * self.block_size
    }

    /// Fraction of backed blocks in use (0.0 for an empty pool)
    pub fn utilization(&self) -> f64 {
        if self.allocated_blocks == 0 {
            0.0
        } else {
            self.used_blocks as f64 / self.allocated_blocks as f64
        }
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PoolStats {{ used: {}/{} blocks ({} bytes each), free list: {}, pages: {}, reserved: {} }}",
            self.used_blocks,
            self.allocated_blocks,
            self.block_size,
            self.free_blocks,
            self.pages,
            self.reserved_blocks
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_figures() {
        let stats = PoolStats {
            block_size: 16,
            used_blocks: 3,
            allocated_blocks: 4,
            free_blocks: 1,
            pages: 2,
            reserved_blocks: 0,
        };
        assert_eq!(stats.used_bytes(), 48);
        assert_eq!(stats.allocated_bytes(), 64);
        assert_eq!(stats.utilization(), 0.75);
        assert!(stats.to_string().contains("used: 3/4 blocks"));
    }

    #[test]
    fn empty_pool_utilization() {
        assert_eq!(PoolStats::default().utilization(), 0.0);
    }
}
