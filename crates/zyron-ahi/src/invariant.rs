//! Invariant checks that either panic or log, per the table's policy.

use log::error;
use zyron_common::InvariantPolicy;

/// Checks `ok` under `policy`.
///
/// Returns true when the invariant holds. On violation, `Panic` panics with
/// the message and `Log` logs it at error level and returns false so the
/// caller can refuse the mutation.
#[inline]
pub(crate) fn check_invariant<F>(policy: InvariantPolicy, ok: bool, msg: F) -> bool
where
    F: FnOnce() -> String,
{
    if ok {
        return true;
    }
    match policy {
        InvariantPolicy::Panic => panic!("hash index invariant violated: {}", msg()),
        InvariantPolicy::Log => {
            error!("hash index invariant violated: {}", msg());
            false
        }
    }
}
