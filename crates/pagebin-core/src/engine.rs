//! Core allocation engine.
//!
//! [`Heap`] coordinates the size-class resolver, the per-class free
//! lists, the page source, and the large-object path. It is the only
//! component with externally visible behavior; everything else serves it.
//!
//! A `Heap` is single-threaded by contract: it performs no internal
//! synchronization, and concurrent use corrupts the free lists. Shared
//! use goes through the mutex-guarded process heap in `pagebin-abi`.
//! The engine never allocates on its own behalf: diagnostics are plain
//! counters, and failure reporting goes through the allocation-free
//! writer in [`crate::diag`].

use std::ptr::NonNull;

use crate::config;
use crate::diag;
use crate::free_list::FreeListRegistry;
use crate::header::{self, HeaderCheck};
use crate::large;
use crate::page::{self, MapError, PAGE_SIZE};
use crate::size_class;

/// Fixed line emitted (verbose mode only) when a free is discarded.
const DISCARDED_FREE_MESSAGE: &str = "pagebin: discarding unrecognized free\n";

/// Snapshot of the engine's diagnostic counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    /// Small allocations served from the size-class lists.
    pub small_allocs: u64,
    /// Allocations served by the large-object path.
    pub large_allocs: u64,
    /// Pages mapped for small-object carving.
    pub pages_mapped: u64,
    /// Total bytes claimed from the operating system.
    pub bytes_mapped: u64,
    /// Frees that returned a chunk to its class list.
    pub recycled_frees: u64,
    /// Frees discarded for lack of a recognizable header.
    pub discarded_frees: u64,
}

impl HeapStats {
    const fn zeroed() -> Self {
        Self {
            small_allocs: 0,
            large_allocs: 0,
            pages_mapped: 0,
            bytes_mapped: 0,
            recycled_frees: 0,
            discarded_frees: 0,
        }
    }
}

impl Default for HeapStats {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// The allocation engine: per-class free lists plus counters.
pub struct Heap {
    free_lists: FreeListRegistry,
    stats: HeapStats,
}

impl Heap {
    /// Creates an engine with every class empty and no pages mapped.
    pub const fn new() -> Self {
        Self {
            free_lists: FreeListRegistry::new(),
            stats: HeapStats::zeroed(),
        }
    }

    /// Allocates `size` bytes.
    ///
    /// Small requests come back usable for at least
    /// [`size_class::chunk_size_for`]`(size)` bytes, recycled LIFO from
    /// the class list or carved from a freshly mapped page. Requests
    /// above the largest class get a dedicated page-multiple mapping
    /// with no header. `Err` means the operating system refused a
    /// mapping; the ABI boundary escalates that to a fatal exit rather
    /// than returning null.
    pub fn allocate(&mut self, size: usize) -> Result<NonNull<u8>, MapError> {
        let chunk_size = size_class::chunk_size_for(size);
        let Some(class) = size_class::class_index(chunk_size) else {
            let region = large::allocate_large(size)?;
            self.stats.large_allocs += 1;
            self.stats.bytes_mapped += page::page_align(size) as u64;
            return Ok(region);
        };

        loop {
            // SAFETY: only allocator-carved chunk addresses enter the
            // registry, and their pages are never unmapped.
            if let Some(chunk) = unsafe { self.free_lists.pop(class) } {
                self.stats.small_allocs += 1;
                return Ok(chunk);
            }
            self.refill(class, chunk_size)?;
        }
    }

    /// Maps one fresh page and links its chunks into the class list.
    ///
    /// The page's first chunk-sized slot holds the header and is
    /// withheld; the remaining chunks are linked in ascending address
    /// order, the last terminating the list.
    fn refill(&mut self, class: usize, chunk_size: usize) -> Result<(), MapError> {
        let page_ptr = page::acquire(PAGE_SIZE)?;
        // SAFETY: freshly mapped, page-aligned, writable.
        unsafe { header::write(page_ptr.as_ptr(), chunk_size) };

        // Pushing back-to-front leaves the list in ascending address
        // order, with the page's last chunk linking to whatever head was
        // installed before (0 when the class was empty).
        let base = page_ptr.as_ptr() as usize;
        let mut chunk = base + PAGE_SIZE - chunk_size;
        while chunk > base {
            // SAFETY: chunk lies inside the fresh page, past the header
            // slot.
            unsafe { self.free_lists.push(class, chunk) };
            chunk -= chunk_size;
        }

        self.stats.pages_mapped += 1;
        self.stats.bytes_mapped += PAGE_SIZE as u64;
        Ok(())
    }

    /// Frees the object containing `ptr`.
    ///
    /// Null is a no-op. A pointer whose enclosing page carries no
    /// recognizable header (foreign memory, or a headerless large
    /// object) is discarded: counted, optionally reported, never
    /// touched. Recognized chunks rejoin their class list with the new
    /// head linking to the old head (LIFO reuse).
    ///
    /// # Safety
    ///
    /// `ptr` must be null or point within a mapped region; the header
    /// probe reads the enclosing page's first bytes.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        if ptr.is_null() {
            return;
        }
        // SAFETY: non-null and mapped per the caller contract.
        let chunk_size = match unsafe { usable_size(ptr) } {
            0 => {
                self.discard_free();
                return;
            }
            n => n,
        };
        // A recognized header whose chunk size is not an exact class
        // would index nothing sane; discard rather than corrupt.
        let Some(class) = size_class::class_index(chunk_size) else {
            self.discard_free();
            return;
        };

        // ptr may be interior; the chunk start is the last chunk_size
        // multiple at or below it.
        let addr = ptr as usize;
        let chunk_start = addr - addr % chunk_size;
        // SAFETY: chunk_start is the chunk containing an allocator-issued
        // pointer, relinquished by its owner, so its first word may hold
        // the list link.
        unsafe { self.free_lists.push(class, chunk_start) };
        self.stats.recycled_frees += 1;
    }

    fn discard_free(&mut self) {
        self.stats.discarded_frees += 1;
        if config::run_mode().reports_discards() {
            diag::log_message(DISCARDED_FREE_MESSAGE);
        }
    }

    /// Returns a snapshot of the diagnostic counters.
    pub fn stats(&self) -> HeapStats {
        self.stats
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Recovers the usable size of an allocator-issued pointer.
///
/// Returns 0 for null. Otherwise the pointer is rounded down to its page
/// boundary and the header there is inspected: a matching magic word
/// yields the page's chunk size, anything else yields 0. Large objects
/// have no header and always yield 0, expected behavior of the format,
/// not a defect. This is the sole mechanism by which [`Heap::free`]
/// recovers the size class of an object.
///
/// # Safety
///
/// `ptr` must be null or point within a mapped region.
pub unsafe fn usable_size(ptr: *const u8) -> usize {
    if ptr.is_null() {
        return 0;
    }
    let addr = ptr as usize;
    let page_start = addr - addr % PAGE_SIZE;
    // SAFETY: the enclosing page is mapped per the caller contract, and
    // page_start is page-aligned.
    match unsafe { header::inspect(page_start as *const u8) } {
        HeaderCheck::Recognized { chunk_size } => chunk_size,
        HeaderCheck::Unrecognized => 0,
    }
}
