//! ABI boundary: the process-wide heap and its `extern "C"` surface.
//!
//! This crate is what substitutes pagebin for the platform allocator. It
//! owns a single mutex-guarded [`Heap`] and exports `malloc`, `free`,
//! and `malloc_usable_size` over it. The engine itself is single-threaded
//! by contract; the mutex here is what makes the exported surface safe
//! to call from any thread.
//!
//! In debug (and therefore test) builds the symbols are not exported, so
//! a test binary keeps the system allocator for its own machinery and
//! can exercise these functions as ordinary Rust items.

use std::ffi::c_void;

use parking_lot::Mutex;

use pagebin_core::diag;
use pagebin_core::engine::{self, Heap};

pub mod global;

/// The process-wide allocation engine.
pub(crate) static HEAP: Mutex<Heap> = Mutex::new(Heap::new());

/// Allocates `size` bytes.
///
/// Never returns null: if the operating system refuses to supply pages,
/// the fixed diagnostic is written and the process terminates with
/// status 2. Small requests are usable for the full size-class chunk;
/// large requests get a dedicated page-aligned mapping.
///
/// # Safety
///
/// Caller must eventually `free` the returned pointer exactly once.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc(size: usize) -> *mut c_void {
    match HEAP.lock().allocate(size) {
        Ok(ptr) => ptr.as_ptr().cast(),
        Err(_) => diag::fatal(diag::OOM_MESSAGE),
    }
}

/// Deallocates memory previously returned by [`malloc`].
///
/// Null is a no-op. Pointers this allocator never issued (including
/// large objects, whose mappings are deliberately retained) are
/// best-effort discarded via the page-header check.
///
/// # Safety
///
/// `ptr` must be null or point within an object obtained from this
/// allocator (any interior position), not yet freed.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    // SAFETY: forwarded under the same contract.
    unsafe { HEAP.lock().free(ptr.cast()) };
}

/// Reports the usable size of an allocation.
///
/// Returns 0 for null and for pointers without a recognizable page
/// header, which includes large objects, headerless by design. Reads
/// only the enclosing page, so no heap lock is taken.
///
/// # Safety
///
/// `ptr` must be null or point within a mapped region.
#[cfg_attr(not(debug_assertions), unsafe(no_mangle))]
pub unsafe extern "C" fn malloc_usable_size(ptr: *const c_void) -> usize {
    // SAFETY: forwarded under the same contract.
    unsafe { engine::usable_size(ptr.cast()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagebin_core::page::PAGE_SIZE;

    #[test]
    fn test_malloc_free_roundtrip() {
        // SAFETY: standard malloc/free usage against our own surface.
        unsafe {
            let ptr = malloc(100);
            assert!(!ptr.is_null());
            assert_eq!(malloc_usable_size(ptr), 128);
            ptr.cast::<u8>().write_bytes(0x7F, 128);
            free(ptr);
        }
    }

    #[test]
    fn test_free_null_is_noop() {
        // SAFETY: null is explicitly tolerated.
        unsafe { free(std::ptr::null_mut()) };
    }

    #[test]
    fn test_usable_size_of_null_is_zero() {
        // SAFETY: null short-circuits before any dereference.
        assert_eq!(unsafe { malloc_usable_size(std::ptr::null()) }, 0);
    }

    #[test]
    fn test_large_malloc_is_page_aligned_and_headerless() {
        // SAFETY: standard malloc/free usage against our own surface.
        unsafe {
            let ptr = malloc(5000);
            assert!(!ptr.is_null());
            assert_eq!(ptr as usize % PAGE_SIZE, 0);
            ptr.cast::<u8>().write_bytes(0x11, 5000);
            assert_eq!(malloc_usable_size(ptr), 0);
            // Discarded; the mapping stays behind by design.
            free(ptr);
        }
    }

    #[test]
    fn test_concurrent_malloc_free() {
        // The mutex makes the exported surface thread-safe even though
        // the engine is single-threaded.
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    for _ in 0..200 {
                        // SAFETY: each pointer is written within its
                        // usable span and freed exactly once.
                        unsafe {
                            let ptr = malloc(64);
                            assert!(!ptr.is_null());
                            ptr.cast::<u8>().write_bytes(1, 64);
                            free(ptr);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
