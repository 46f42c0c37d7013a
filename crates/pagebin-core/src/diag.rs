//! Allocation-free diagnostics.
//!
//! The allocator cannot report failures through itself: everything here
//! goes straight to stderr with a single `write(2)` and terminates with
//! `_exit`, touching no heap and running no atexit handlers (either
//! could re-enter the allocator).

/// Process exit status for unrecoverable allocator failures.
pub const FATAL_EXIT_STATUS: i32 = 2;

/// Fixed diagnostic for page-acquisition failure.
pub const OOM_MESSAGE: &str = "mmap failed! Giving up.\n";

/// Fallback emitted when the diagnostic write itself fails.
const LOG_FAILED_MESSAGE: &str = "logging failed\n";

/// Writes `message` to stderr without allocating.
///
/// If the write fails or comes up short, a fixed fallback message is
/// attempted and the process terminates with [`FATAL_EXIT_STATUS`].
pub fn log_message(message: &str) {
    if !write_stderr(message.as_bytes()) {
        let _ = write_stderr(LOG_FAILED_MESSAGE.as_bytes());
        terminate();
    }
}

/// Logs `message`, then terminates with [`FATAL_EXIT_STATUS`].
pub fn fatal(message: &str) -> ! {
    log_message(message);
    terminate()
}

fn terminate() -> ! {
    // SAFETY: _exit ends the process without running handlers.
    unsafe { libc::_exit(FATAL_EXIT_STATUS) }
}

/// Single-shot stderr write; true only if every byte landed.
fn write_stderr(bytes: &[u8]) -> bool {
    // SAFETY: bytes is a live slice; the kernel copies it out.
    let written = unsafe { libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len()) };
    written == bytes.len() as isize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_message_writes_without_panicking() {
        log_message("pagebin diag self-test\n");
    }

    #[test]
    fn test_fixed_messages() {
        assert_eq!(FATAL_EXIT_STATUS, 2);
        assert!(OOM_MESSAGE.ends_with('\n'));
        assert!(LOG_FAILED_MESSAGE.ends_with('\n'));
    }
}
