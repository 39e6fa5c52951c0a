//! Simulated coprocessor with a configurable per-batch busy time

use std::time::{Duration, Instant};

use splatstorm_core::coprocessor::{Completed, Coprocessor, TimedOut, poll_until_idle};
use splatstorm_shared::PackedSplat;

/// Stays busy for `busy_for` after every send, polled like a hardware flag.
#[derive(Debug)]
pub struct SimulatedCoprocessor {
    busy_for: Duration,
    busy_until: Option<Instant>,
    batches: u64,
    splats: u64,
    resets: u64,
}

impl SimulatedCoprocessor {
    pub fn new(busy_for: Duration) -> Self {
        Self {
            busy_for,
            busy_until: None,
            batches: 0,
            splats: 0,
            resets: 0,
        }
    }

    pub fn batches(&self) -> u64 {
        self.batches
    }

    pub fn splats(&self) -> u64 {
        self.splats
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    fn is_busy(&self) -> bool {
        self.busy_until.is_some_and(|until| Instant::now() < until)
    }
}

impl Coprocessor for SimulatedCoprocessor {
    fn send_batch(&mut self, batch: &[PackedSplat]) {
        self.batches += 1;
        self.splats += batch.len() as u64;
        self.busy_until = Some(Instant::now() + self.busy_for);
    }

    fn wait_for_completion(&mut self, timeout: Duration) -> Result<Completed, TimedOut> {
        let result = poll_until_idle(timeout, || self.is_busy());
        if result.is_ok() {
            self.busy_until = None;
        }
        result
    }

    fn reset(&mut self) {
        self.busy_until = None;
        self.resets += 1;
    }
}
