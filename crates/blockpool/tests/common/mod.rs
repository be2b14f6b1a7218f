//! Shared page sources for integration tests.

#![allow(dead_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::ptr::NonNull;
use std::rc::Rc;

use blockpool::{GlobalPageSource, PageSource, PoolError, PoolResult};

/// Counters observed by a [`ProbeSource`]
#[derive(Debug, Default)]
pub struct Probe {
    pub allocations: Cell<usize>,
    pub releases: Cell<usize>,
    pub live_bytes: Cell<usize>,
    /// Byte sizes of every page requested, in order
    pub requested: RefCell<Vec<usize>>,
    /// Page allocations still allowed before the source starts failing
    pub budget: Cell<Option<usize>>,
}

impl Probe {
    pub fn live_pages(&self) -> usize {
        self.allocations.get() - self.releases.get()
    }
}

/// Global-allocator page source that records every call
#[derive(Debug, Clone, Default)]
pub struct ProbeSource {
    inner: GlobalPageSource,
    pub probe: Rc<Probe>,
}

impl ProbeSource {
    pub fn new() -> (Self, Rc<Probe>) {
        let source = Self::default();
        let probe = Rc::clone(&source.probe);
        (source, probe)
    }

    /// A source that serves `pages` allocations and then fails
    pub fn with_budget(pages: usize) -> (Self, Rc<Probe>) {
        let (source, probe) = Self::new();
        probe.budget.set(Some(pages));
        (source, probe)
    }
}

// SAFETY: every call is forwarded to the global page source unchanged.
unsafe impl PageSource for ProbeSource {
    fn allocate_page(&mut self, layout: Layout) -> PoolResult<NonNull<u8>> {
        if let Some(left) = self.probe.budget.get() {
            if left == 0 {
                return Err(PoolError::allocation_failed_with_layout(layout));
            }
            self.probe.budget.set(Some(left - 1));
        }
        let page = self.inner.allocate_page(layout)?;
        self.probe.requested.borrow_mut().push(layout.size());
        self.probe.allocations.set(self.probe.allocations.get() + 1);
        self.probe
            .live_bytes
            .set(self.probe.live_bytes.get() + layout.size());
        Ok(page)
    }

    unsafe fn deallocate_page(&mut self, ptr: NonNull<u8>, layout: Layout) {
        self.probe.releases.set(self.probe.releases.get() + 1);
        self.probe
            .live_bytes
            .set(self.probe.live_bytes.get() - layout.size());
        // SAFETY: forwarded caller contract
        unsafe { self.inner.deallocate_page(ptr, layout) };
    }
}
