//! Page-front chunk headers.
//!
//! Every small-object page begins with a [`ChunkHeader`] recording the
//! size of the chunks carved from that page behind a magic word. The
//! header occupies the page's first chunk-sized slot, which is never
//! handed out. Rounding an allocator-issued pointer down to its page
//! boundary and inspecting the header there is the engine's only way to
//! recover an object's size from a bare pointer.

use crate::size_class::MIN_CHUNK_SIZE;

/// Magic word distinguishing pagebin pages from unrelated mappings.
///
/// The check is best-effort: an unrelated page that happens to hold this
/// value at the right offset is indistinguishable from a managed page.
pub const MAGIC_NUMBER: usize = 10_230_829;

/// Fixed-layout record at the start of every small-object page.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    /// Size of every chunk carved from this page.
    pub chunk_size: usize,
    /// Must equal [`MAGIC_NUMBER`] for the page to be recognized.
    pub magic: usize,
}

/// Outcome of inspecting a candidate page header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCheck {
    /// The magic word matched; the page's chunk size is returned.
    Recognized {
        /// chunk_size recorded when the page was stamped.
        chunk_size: usize,
    },
    /// No pagebin header at this address.
    Unrecognized,
}

// The header must fit in the smallest chunk slot.
const _: () = assert!(size_of::<ChunkHeader>() <= MIN_CHUNK_SIZE);

/// Stamps a fresh page with its header.
///
/// # Safety
///
/// `page_base` must be the page-aligned start of a writable region of at
/// least `size_of::<ChunkHeader>()` bytes owned by the allocator.
pub unsafe fn write(page_base: *mut u8, chunk_size: usize) {
    let header = ChunkHeader {
        chunk_size,
        magic: MAGIC_NUMBER,
    };
    // SAFETY: caller guarantees a writable, page-aligned base, which
    // satisfies the header's alignment.
    unsafe { page_base.cast::<ChunkHeader>().write(header) };
}

/// Reads the candidate header at a page boundary.
///
/// # Safety
///
/// `page_base` must be page-aligned and point into a mapped, readable
/// region of at least `size_of::<ChunkHeader>()` bytes.
pub unsafe fn inspect(page_base: *const u8) -> HeaderCheck {
    // SAFETY: caller guarantees a readable, page-aligned region.
    let header = unsafe { page_base.cast::<ChunkHeader>().read() };
    if header.magic == MAGIC_NUMBER {
        HeaderCheck::Recognized {
            chunk_size: header.chunk_size,
        }
    } else {
        HeaderCheck::Unrecognized
    }
}
