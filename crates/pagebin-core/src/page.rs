//! Page acquisition from the operating system.
//!
//! All memory enters the allocator here, as anonymous, private,
//! zero-initialized, read/write mappings. Mappings are never returned:
//! once a page is claimed it lives until process exit.

use std::ptr::NonNull;

use thiserror::Error;

/// Size of a backing page (bytes). A fixed constant of the format,
/// independent of the true OS page size.
pub const PAGE_SIZE: usize = 4096;

/// The operating system declined to supply a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("anonymous mapping of {len} bytes failed (errno {errno})")]
pub struct MapError {
    /// Requested mapping length in bytes.
    pub len: usize,
    /// errno reported by the kernel.
    pub errno: i32,
}

/// Rounds `size` up to the next multiple of [`PAGE_SIZE`].
pub const fn page_align(size: usize) -> usize {
    (size + PAGE_SIZE - 1) & !(PAGE_SIZE - 1)
}

/// Requests an anonymous, zero-initialized, read/write mapping of exactly
/// `len` bytes.
///
/// `len` must already be a page multiple; callers round up via
/// [`page_align`]. There is no retry policy: a refusal is surfaced as
/// [`MapError`] and treated as unrecoverable at the ABI boundary.
pub fn acquire(len: usize) -> Result<NonNull<u8>, MapError> {
    debug_assert!(len > 0 && len % PAGE_SIZE == 0);
    // SAFETY: requests a fresh anonymous mapping; no existing memory is
    // touched. MAP_FAILED is handled below.
    let addr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };
    if addr == libc::MAP_FAILED {
        let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        return Err(MapError { len, errno });
    }
    NonNull::new(addr.cast::<u8>()).ok_or(MapError { len, errno: 0 })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_alignment() {
        assert_eq!(page_align(0), 0);
        assert_eq!(page_align(1), 4096);
        assert_eq!(page_align(4096), 4096);
        assert_eq!(page_align(4097), 8192);
        assert_eq!(page_align(5000), 8192);
    }

    #[test]
    fn test_acquire_returns_aligned_zeroed_writable_page() {
        let page = acquire(PAGE_SIZE).expect("mapping one page should succeed");
        let addr = page.as_ptr() as usize;
        assert_eq!(addr % PAGE_SIZE, 0);
        // SAFETY: we just mapped this region as RW.
        unsafe {
            for offset in [0, 1, PAGE_SIZE / 2, PAGE_SIZE - 1] {
                assert_eq!(*page.as_ptr().add(offset), 0);
            }
            *page.as_ptr() = 42;
            assert_eq!(*page.as_ptr(), 42);
        }
    }

    #[test]
    fn test_acquire_multi_page_region() {
        let len = page_align(5000);
        let region = acquire(len).expect("mapping two pages should succeed");
        // SAFETY: mapped as RW for `len` bytes.
        unsafe {
            region.as_ptr().write_bytes(0x5A, len);
            assert_eq!(*region.as_ptr().add(len - 1), 0x5A);
        }
    }
}
