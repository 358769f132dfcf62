//! Generation tokens for discarding stale async results.
//!
//! Each component that owns an external resource (a stream connection, a
//! poll timer, an in-flight fetch) takes a [`Generation`] when it acquires
//! the resource. Before applying any async result it goes through
//! [`Generations::apply`], which runs the mutation only if that generation
//! is still the active one. Advancing (on a parameter change, a new job id,
//! or teardown) invalidates every outstanding token at once.

use std::sync::{Mutex, MutexGuard};

/// Opaque token identifying one acquisition of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Per-instance generation counter.
#[derive(Debug, Default)]
pub struct Generations {
    current: Mutex<u64>,
}

impl Generations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate all outstanding tokens and hand out a fresh one.
    pub fn advance(&self) -> Generation {
        let mut current = self.lock();
        *current += 1;
        Generation(*current)
    }

    /// Invalidate all outstanding tokens without starting a new cycle.
    pub fn invalidate(&self) {
        *self.lock() += 1;
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        *self.lock() == generation.0
    }

    /// Run `mutate` only if `generation` is still current.
    ///
    /// The counter stays locked while `mutate` runs, so a concurrent
    /// [`advance`](Self::advance) either happens before (and the mutation
    /// is skipped) or after (and observes the mutation). `mutate` must not
    /// block.
    pub fn apply<R>(&self, generation: Generation, mutate: impl FnOnce() -> R) -> Option<R> {
        let current = self.lock();
        if *current != generation.0 {
            return None;
        }
        let out = mutate();
        drop(current);
        Some(out)
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        // The guarded value is a plain counter; a poisoned lock is still usable.
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}
