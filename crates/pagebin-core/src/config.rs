//! Runtime mode configuration.
//!
//! The runtime mode is set via the `PAGEBIN_MODE` environment variable:
//! - `silent` (default): discarded free requests (null, foreign, or
//!   headerless pointers) are invisible.
//! - `verbose`: each discarded free emits one fixed diagnostic line via
//!   the allocation-free writer. Allocation behavior is unchanged.

use std::sync::atomic::{AtomicU8, Ordering};

/// Diagnostic verbosity for discarded free requests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Discarded frees are invisible.
    #[default]
    Silent,
    /// Discarded frees emit a fixed stderr line.
    Verbose,
}

impl RunMode {
    /// Parse from string (case-insensitive).
    #[must_use]
    pub fn from_str_loose(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "verbose" | "loud" | "debug" => Self::Verbose,
            _ => Self::Silent,
        }
    }

    /// Returns true if discarded frees should be reported.
    #[must_use]
    pub const fn reports_discards(self) -> bool {
        matches!(self, Self::Verbose)
    }
}

// Atomic cache: 0=unresolved, 1=Silent, 2=Verbose, 255=resolving.
// A non-blocking state machine instead of OnceLock: when the allocator is
// interposed via LD_PRELOAD, std::env::var can allocate and re-enter the
// exported malloc, and OnceLock::get_or_init would deadlock on itself.
static CACHED_MODE: AtomicU8 = AtomicU8::new(MODE_UNRESOLVED);

const MODE_UNRESOLVED: u8 = 0;
const MODE_SILENT: u8 = 1;
const MODE_VERBOSE: u8 = 2;
const MODE_RESOLVING: u8 = 255;

fn mode_to_u8(mode: RunMode) -> u8 {
    match mode {
        RunMode::Silent => MODE_SILENT,
        RunMode::Verbose => MODE_VERBOSE,
    }
}

fn u8_to_mode(v: u8) -> RunMode {
    match v {
        MODE_VERBOSE => RunMode::Verbose,
        _ => RunMode::Silent,
    }
}

/// Returns the process-wide run mode, resolving it from the environment
/// on first use.
///
/// While another caller (or a re-entered frame of this one) is mid-parse,
/// the conservative default is reported instead of blocking.
pub fn run_mode() -> RunMode {
    match CACHED_MODE.load(Ordering::Acquire) {
        MODE_UNRESOLVED => {}
        MODE_RESOLVING => return RunMode::Silent,
        v => return u8_to_mode(v),
    }
    if CACHED_MODE
        .compare_exchange(
            MODE_UNRESOLVED,
            MODE_RESOLVING,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
        .is_err()
    {
        return RunMode::Silent;
    }
    let mode = std::env::var("PAGEBIN_MODE")
        .map(|raw| RunMode::from_str_loose(&raw))
        .unwrap_or_default();
    CACHED_MODE.store(mode_to_u8(mode), Ordering::Release);
    mode
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_loose() {
        assert_eq!(RunMode::from_str_loose("verbose"), RunMode::Verbose);
        assert_eq!(RunMode::from_str_loose("VERBOSE"), RunMode::Verbose);
        assert_eq!(RunMode::from_str_loose("debug"), RunMode::Verbose);
        assert_eq!(RunMode::from_str_loose("silent"), RunMode::Silent);
        assert_eq!(RunMode::from_str_loose(""), RunMode::Silent);
        assert_eq!(RunMode::from_str_loose("garbage"), RunMode::Silent);
    }

    #[test]
    fn test_reports_discards() {
        assert!(!RunMode::Silent.reports_discards());
        assert!(RunMode::Verbose.reports_discards());
    }

    #[test]
    fn test_run_mode_is_stable_across_calls() {
        let first = run_mode();
        for _ in 0..4 {
            assert_eq!(run_mode(), first);
        }
    }
}
