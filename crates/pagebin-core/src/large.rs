//! Large allocation handling (above 2048 bytes).
//!
//! Requests above the largest size class bypass the free-list machinery:
//! each gets a dedicated page-multiple mapping with no header and no
//! free-list membership. Ownership passes entirely to the caller. The
//! mapping is never reclaimed; a later free finds no header and is
//! discarded (see [`crate::engine::Heap::free`]).

use std::ptr::NonNull;

use crate::page::{self, MapError};

/// Maps a dedicated region for a request above the largest size class.
///
/// The request is rounded up to the next page multiple and the mapping
/// is returned directly: headerless, page-aligned, zero-initialized.
pub fn allocate_large(request: usize) -> Result<NonNull<u8>, MapError> {
    page::acquire(page::page_align(request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PAGE_SIZE;

    #[test]
    fn test_large_region_is_page_aligned_and_fully_writable() {
        let region = allocate_large(5000).expect("large mapping should succeed");
        let addr = region.as_ptr() as usize;
        assert_eq!(addr % PAGE_SIZE, 0);
        // The region covers the full rounded size, not just the request.
        // SAFETY: mapped RW for page_align(5000) bytes just above.
        unsafe {
            region.as_ptr().write_bytes(0xEE, page::page_align(5000));
        }
    }

    #[test]
    fn test_exact_page_multiple_not_over_rounded() {
        let region = allocate_large(PAGE_SIZE * 3).expect("large mapping should succeed");
        // SAFETY: mapped RW for exactly three pages.
        unsafe {
            region.as_ptr().write_bytes(1, PAGE_SIZE * 3);
        }
    }
}
