//! Block primitives shared by both pools
//!
//! # Memory Layout
//! ```text
//! live block:   [ T payload ........ ]
//! freed block:  [ prev | (stale)    ]
//!                  ↓
//!               next freed block (LIFO) → ... → None
//! ```
//!
//! A block is a [`BlockSlot<T>`]: a union of the element's storage and a
//! [`FreeBlock`] node. The node is written into a block's own memory once it
//! is freed, so the free list costs no extra allocation. The union never
//! leaves this crate; callers only ever see `NonNull<T>`.

use core::alloc::Layout;
use core::fmt;
use core::mem::{ManuallyDrop, MaybeUninit};
use core::ptr::NonNull;

/// Storage of one block: either a live element slot or a free-list node
#[repr(C)]
pub(crate) union BlockSlot<T> {
    value: ManuallyDrop<MaybeUninit<T>>,
    free: FreeBlock<T>,
}

/// Free-list node overlaid on a freed block
#[repr(C)]
pub(crate) struct FreeBlock<T> {
    prev: Option<NonNull<BlockSlot<T>>>,
}

impl<T> Clone for FreeBlock<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for FreeBlock<T> {}

/// Size of one block for element type `T`
///
/// `max(size_of::<T>(), size_of::<FreeBlock>())`, rounded up to the block
/// alignment so consecutive blocks stay aligned.
pub const fn block_size<T>() -> usize {
    size_of::<BlockSlot<T>>()
}

/// Alignment of one block for element type `T`
pub const fn block_align<T>() -> usize {
    align_of::<BlockSlot<T>>()
}

/// Layout of `blocks` consecutive blocks
pub(crate) fn blocks_layout<T>(blocks: usize) -> Option<Layout> {
    Layout::array::<BlockSlot<T>>(blocks).ok()
}

/// Reinterpret a block as the element pointer handed to callers
#[inline]
pub(crate) fn slot_to_value<T>(slot: NonNull<BlockSlot<T>>) -> NonNull<T> {
    slot.cast()
}

/// Reinterpret an element pointer as the block that stores it
#[inline]
pub(crate) fn value_to_slot<T>(value: NonNull<T>) -> NonNull<BlockSlot<T>> {
    value.cast()
}

/// Intrusive LIFO list of freed blocks
///
/// The list does not own its nodes; they live in pool memory. A node is
/// only valid while the block it was written into has not been handed out
/// again or released with its page.
pub(crate) struct FreeList<T> {
    head: Option<NonNull<BlockSlot<T>>>,
    len: usize,
}

impl<T> FreeList<T> {
    /// Creates an empty free list
    pub(crate) const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Number of blocks on the list
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Address of the most recently freed block
    pub(crate) fn head(&self) -> Option<NonNull<u8>> {
        self.head.map(NonNull::cast)
    }

    /// Pushes a freed block, overlaying a node on its storage
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    /// - `slot` points to a block owned by the same pool as this list
    /// - the block is not live (its element was dropped or never written)
    /// - the block is not already on the list
    pub(crate) unsafe fn push(&mut self, slot: NonNull<BlockSlot<T>>) {
        // SAFETY: Writing the node into the freed block.
        // - slot is valid and aligned for BlockSlot<T> (caller contract)
        // - the block is not live, nothing is overwritten that must be dropped
        // - only the node's bytes are written, the rest of the block is kept
        unsafe {
            (&raw mut (*slot.as_ptr()).free).write(FreeBlock { prev: self.head });
        }
        self.head = Some(slot);
        self.len += 1;
    }

    /// Pops the most recently freed block
    pub(crate) fn pop(&mut self) -> Option<NonNull<BlockSlot<T>>> {
        let head = self.head?;
        // SAFETY: Reading the node of the list head.
        // - head was written by push() and is still on the list
        // - the `free` field is the active union member for listed blocks
        self.head = unsafe { (*head.as_ptr()).free.prev };
        self.len -= 1;
        Some(head)
    }

    /// Whether `slot` is currently on the list
    ///
    /// Walks every node, so it is linear in the list length.
    pub(crate) fn contains(&self, slot: NonNull<BlockSlot<T>>) -> bool {
        let mut cursor = self.head;
        while let Some(node) = cursor {
            if node == slot {
                return true;
            }
            // SAFETY: Reading the node of a listed block.
            // - every listed block was written by push() and not handed out since
            // - the `free` field is the active union member for listed blocks
            cursor = unsafe { (*node.as_ptr()).free.prev };
        }
        false
    }

    /// Forgets every node without touching pool memory
    pub(crate) fn clear(&mut self) {
        self.head = None;
        self.len = 0;
    }
}

impl<T> fmt::Debug for FreeList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FreeList")
            .field("head", &self.head)
            .field("len", &self.len)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_hosts_a_free_node() {
        assert_eq!(block_size::<u8>(), size_of::<usize>());
        assert_eq!(block_size::<u64>(), 8.max(size_of::<usize>()));
        assert_eq!(block_size::<[u64; 4]>(), 32);
        assert!(block_size::<()>() >= size_of::<FreeBlock<()>>());
    }

    #[test]
    fn block_size_respects_alignment() {
        #[allow(dead_code)]
        struct Odd([u16; 5]);

        assert_eq!(block_size::<Odd>() % block_align::<Odd>(), 0);
        assert!(block_size::<Odd>() >= size_of::<Odd>());
    }

    #[test]
    fn free_list_is_lifo() {
        let mut storage: [MaybeUninit<BlockSlot<u32>>; 3] =
            [const { MaybeUninit::uninit() }; 3];
        let slots: Vec<NonNull<BlockSlot<u32>>> = storage
            .iter_mut()
            .map(|s| NonNull::from(s).cast())
            .collect();

        let mut list = FreeList::new();
        assert_eq!(list.len(), 0);
        unsafe {
            list.push(slots[0]);
            list.push(slots[2]);
            list.push(slots[1]);
        }
        assert_eq!(list.len(), 3);
        assert_eq!(list.head(), Some(slots[1].cast()));
        assert!(slots.iter().all(|&slot| list.contains(slot)));

        assert_eq!(list.pop(), Some(slots[1]));
        assert!(!list.contains(slots[1]));
        assert_eq!(list.pop(), Some(slots[2]));
        assert_eq!(list.pop(), Some(slots[0]));
        assert_eq!(list.pop(), None);
        assert_eq!(list.head(), None);
    }

    #[test]
    fn clear_forgets_nodes() {
        let mut storage = [const { MaybeUninit::<BlockSlot<u64>>::uninit() }; 1];
        let slot: NonNull<BlockSlot<u64>> = NonNull::from(&mut storage[0]).cast();
        let mut list = FreeList::new();
        unsafe { list.push(slot) };
        list.clear();
        assert_eq!(list.len(), 0);
        assert_eq!(list.pop(), None);
    }

    #[test]
    fn blocks_layout_matches_block_size() {
        let layout = blocks_layout::<u32>(4).unwrap();
        assert_eq!(layout.size(), 4 * block_size::<u32>());
        assert_eq!(layout.align(), block_align::<u32>());
        assert!(blocks_layout::<u64>(usize::MAX).is_none());
    }
}
