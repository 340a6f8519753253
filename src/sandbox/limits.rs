//! Nesting limits for re-entrant sandboxes.
//!
//! Script-to-script recursion is bounded by the engine's own recursion
//! limit. Every nested `eval` or `Function` call made inside a sandbox
//! also passes through native code, so those re-entries are counted here
//! and refused with a catchable `RangeError` before the native stack runs
//! out.

use std::cell::Cell;

use boa_engine::{JsNativeError, JsResult};

/// Default engine recursion limit applied by
/// [`IsolatedEvaluator`](crate::IsolatedEvaluator).
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// Default number of sandboxes that may be active inside one another.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 8;

#[derive(Debug, Clone, Copy, Default)]
struct NestingState {
    depth: usize,
    peak: usize,
    limit_exceeded: bool,
}

thread_local! {
    static NESTING: Cell<NestingState> = Cell::new(NestingState::default());
}

fn update(f: impl FnOnce(&mut NestingState)) -> NestingState {
    NESTING.with(|cell| {
        let mut state = cell.get();
        f(&mut state);
        cell.set(state);
        state
    })
}

/// Marks one active sandbox entry on this thread. Dropping it leaves.
#[derive(Debug)]
pub(crate) struct NestingGuard(());

impl NestingGuard {
    /// Enter one level, or fail when `max` levels are already active.
    pub(crate) fn enter(max: usize) -> JsResult<Self> {
        let mut refused = false;
        update(|state| {
            if state.depth >= max {
                state.limit_exceeded = true;
                refused = true;
            } else {
                state.depth += 1;
                state.peak = state.peak.max(state.depth);
            }
        });
        if refused {
            #[cfg(feature = "tracing")]
            tracing::warn!(max, "sandbox nesting limit reached");
            return Err(JsNativeError::range()
                .with_message("Maximum call stack size exceeded")
                .into());
        }
        Ok(NestingGuard(()))
    }
}

impl Drop for NestingGuard {
    fn drop(&mut self) {
        update(|state| state.depth = state.depth.saturating_sub(1));
    }
}

/// What [`measure`] observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NestingStats {
    /// Deepest sandbox nesting reached, relative to the measured call.
    pub peak_depth: usize,
    /// Whether an entry was refused.
    pub limit_exceeded: bool,
}

/// Run `f`, reporting how deeply sandboxes nested while it ran.
pub(crate) fn measure<T>(f: impl FnOnce() -> T) -> (T, NestingStats) {
    let saved = NESTING.with(Cell::get);
    update(|state| {
        state.peak = state.depth;
        state.limit_exceeded = false;
    });
    let result = f();
    let observed = NESTING.with(Cell::get);
    update(|state| {
        state.peak = saved.peak.max(state.peak);
        state.limit_exceeded |= saved.limit_exceeded;
    });
    let stats = NestingStats {
        peak_depth: observed.peak.saturating_sub(saved.depth),
        limit_exceeded: observed.limit_exceeded,
    };
    (result, stats)
}
