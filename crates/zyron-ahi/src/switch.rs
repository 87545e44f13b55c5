//! Adaptive hash index enablement switch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static GLOBAL: OnceLock<Arc<SearchSwitch>> = OnceLock::new();

/// Gate for mutating the adaptive hash index.
///
/// While off, inserts, deletes and bulk removals are refused and
/// `search_and_update_if_found` reports "not found". Lookups and diagnostics
/// keep working.
#[derive(Debug)]
pub struct SearchSwitch {
    enabled: AtomicBool,
}

impl SearchSwitch {
    /// Creates a switch in the given state.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
        }
    }

    /// Returns the process-wide switch. It starts enabled.
    pub fn global() -> Arc<SearchSwitch> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(SearchSwitch::new(true))))
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Sets the state and returns the previous one.
    #[inline]
    pub fn set_enabled(&self, enabled: bool) -> bool {
        self.enabled.swap(enabled, Ordering::AcqRel)
    }
}

impl Default for SearchSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}
