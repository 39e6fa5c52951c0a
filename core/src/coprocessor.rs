//! Upload/coprocessor collaborator
//!
//! The pipeline never touches hardware. It hands finished batches to a
//! [`Coprocessor`] and then waits, bounded by a timeout, for the device to go
//! idle. Hosts implement the trait over their DMA path; tests use recording
//! mocks.

use std::time::{Duration, Instant};

use splatstorm_shared::PackedSplat;
use thiserror::Error;

/// Wait finished before the timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completed {
    pub waited: Duration,
}

/// Wait gave up. Never fatal: the frame continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("coprocessor still busy after {waited:?}")]
pub struct TimedOut {
    pub waited: Duration,
}

/// Anything that accepts transformed batches.
pub trait Coprocessor {
    /// Start processing `batch`. Fire-and-forget; the slice is only borrowed
    /// for the duration of the call.
    fn send_batch(&mut self, batch: &[PackedSplat]);

    /// Block until the last batch finished or `timeout` elapsed.
    fn wait_for_completion(&mut self, timeout: Duration) -> Result<Completed, TimedOut>;

    /// Hard reset after a timeout. Most hosts have nothing to do.
    fn reset(&mut self) {}
}

impl<C: Coprocessor + ?Sized> Coprocessor for &mut C {
    fn send_batch(&mut self, batch: &[PackedSplat]) {
        (**self).send_batch(batch);
    }

    fn wait_for_completion(&mut self, timeout: Duration) -> Result<Completed, TimedOut> {
        (**self).wait_for_completion(timeout)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

impl<C: Coprocessor + ?Sized> Coprocessor for Box<C> {
    fn send_batch(&mut self, batch: &[PackedSplat]) {
        (**self).send_batch(batch);
    }

    fn wait_for_completion(&mut self, timeout: Duration) -> Result<Completed, TimedOut> {
        (**self).wait_for_completion(timeout)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}

/// Poll `is_busy` until it reports idle or `timeout` elapses.
///
/// The flag is checked at least once, so a zero timeout still succeeds on an
/// idle device.
pub fn poll_until_idle(
    timeout: Duration,
    mut is_busy: impl FnMut() -> bool,
) -> Result<Completed, TimedOut> {
    let start = Instant::now();
    loop {
        if !is_busy() {
            return Ok(Completed {
                waited: start.elapsed(),
            });
        }
        let waited = start.elapsed();
        if waited >= timeout {
            return Err(TimedOut { waited });
        }
        std::hint::spin_loop();
    }
}

/// Discards batches and is always idle.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCoprocessor {
    batches: u64,
    splats: u64,
}

impl NullCoprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn splats(&self) -> u64 {
        self.splats
    }
}

impl Coprocessor for NullCoprocessor {
    fn send_batch(&mut self, batch: &[PackedSplat]) {
        self.batches += 1;
        self.splats += batch.len() as u64;
    }

    fn wait_for_completion(&mut self, _timeout: Duration) -> Result<Completed, TimedOut> {
        Ok(Completed {
            waited: Duration::ZERO,
        })
    }
}
