//! Page records of the growable pool
//!
//! Pages form a stack: every page links to the page grown before it, the
//! oldest page ends the chain. Records live in a slab owned by the pool and
//! are referred to by [`PageId`] handles (slot index + generation), so a
//! handle to a released page can never alias a page that reused its slot.

use core::alloc::Layout;
use core::ops::{Index, IndexMut};
use core::ptr::NonNull;

/// Generation-tagged handle to a page record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PageId {
    index: usize,
    generation: u32,
}

/// Header of one page: the block memory plus its bump state
///
/// `size` and `offset` are in bytes and always multiples of the block size.
#[derive(Debug)]
pub(crate) struct Page {
    data: NonNull<u8>,
    layout: Layout,
    /// Usable bytes in the page, fixed at creation
    pub(crate) size: usize,
    /// Bytes handed out by bump allocation, `0 <= offset <= size`
    pub(crate) offset: usize,
    /// Page grown immediately before this one
    pub(crate) prev: Option<PageId>,
}

impl Page {
    /// Wraps freshly allocated page memory
    pub(crate) fn new(data: NonNull<u8>, layout: Layout, prev: Option<PageId>) -> Self {
        Self {
            data,
            layout,
            size: layout.size(),
            offset: 0,
            prev,
        }
    }

    /// Start of the block memory
    pub(crate) fn data(&self) -> NonNull<u8> {
        self.data
    }

    /// Layout the memory was allocated with
    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn is_full(&self) -> bool {
        self.offset == self.size
    }

    /// Bytes still available for bump allocation
    pub(crate) fn remaining(&self) -> usize {
        self.size - self.offset
    }

    /// Address one past the last bump-allocated block
    pub(crate) fn used_end(&self) -> usize {
        self.data.as_ptr() as usize + self.offset
    }

    /// Next bump position
    pub(crate) fn cursor(&self) -> NonNull<u8> {
        // SAFETY: offset <= size, so the pointer stays within (or one past)
        // the allocation described by `layout`
        unsafe { self.data.add(self.offset) }
    }
}

enum Slot {
    Occupied { generation: u32, page: Page },
    Vacant { generation: u32 },
}

/// Slab of page records
#[derive(Default)]
pub(crate) struct PageTable {
    slots: Vec<Slot>,
    vacant: Vec<usize>,
    live: usize,
}

impl PageTable {
    /// Creates an empty table
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            live: 0,
        }
    }

    /// Number of live page records
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Stores a page record and returns its handle
    pub(crate) fn insert(&mut self, page: Page) -> PageId {
        self.live += 1;
        if let Some(index) = self.vacant.pop() {
            let generation = match self.slots[index] {
                Slot::Vacant { generation } => generation,
                Slot::Occupied { .. } => unreachable!("vacant list points at a live page"),
            };
            self.slots[index] = Slot::Occupied { generation, page };
            return PageId { index, generation };
        }

        let index = self.slots.len();
        self.slots.push(Slot::Occupied {
            generation: 0,
            page,
        });
        PageId {
            index,
            generation: 0,
        }
    }

    /// Removes a page record, invalidating its handle
    pub(crate) fn remove(&mut self, id: PageId) -> Option<Page> {
        let slot = self.slots.get_mut(id.index)?;
        match slot {
            Slot::Occupied { generation, .. } if *generation == id.generation => {
                let next = Slot::Vacant {
                    generation: generation.wrapping_add(1),
                };
                let Slot::Occupied { page, .. } = core::mem::replace(slot, next) else {
                    unreachable!("slot checked as occupied");
                };
                self.vacant.push(id.index);
                self.live -= 1;
                Some(page)
            }
            _ => None,
        }
    }

    pub(crate) fn get(&self, id: PageId) -> Option<&Page> {
        match self.slots.get(id.index)? {
            Slot::Occupied { generation, page } if *generation == id.generation => Some(page),
            _ => None,
        }
    }

    pub(crate) fn get_mut(&mut self, id: PageId) -> Option<&mut Page> {
        match self.slots.get_mut(id.index)? {
            Slot::Occupied { generation, page } if *generation == id.generation => Some(page),
            _ => None,
        }
    }
}

impl Index<PageId> for PageTable {
    type Output = Page;

    fn index(&self, id: PageId) -> &Page {
        match self.get(id) {
            Some(page) => page,
            None => panic!("stale page handle {id:?}"),
        }
    }
}

impl IndexMut<PageId> for PageTable {
    fn index_mut(&mut self, id: PageId) -> &mut Page {
        match self.get_mut(id) {
            Some(page) => page,
            None => panic!("stale page handle {id:?}"),
        }
    }
}
