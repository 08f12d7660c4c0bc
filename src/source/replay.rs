//! Cyclic replay of a previously persisted run.

use std::thread;
use std::time::Duration;

use crate::error::{AppResult, DaqError};
use crate::sample::Sample;

use super::SampleSource;

/// Replays a captured value sequence at a fixed rate, wrapping to the start
/// after the last element. Infinite and restartable by construction.
pub struct ReplaySource {
    data: Vec<f64>,
    rate: Duration,
    index: usize,
}

impl ReplaySource {
    /// Fails on an empty sequence; there is nothing to wrap around.
    pub fn new(data: Vec<f64>, rate: Duration) -> AppResult<Self> {
        if data.is_empty() {
            return Err(DaqError::NoRows("replay sequence is empty".into()));
        }
        Ok(Self {
            data,
            rate,
            index: 0,
        })
    }

    fn step(&mut self) -> f64 {
        let v = self.data[self.index];
        self.index = (self.index + 1) % self.data.len();
        v
    }
}

impl SampleSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    fn poll(&mut self) -> AppResult<Option<Sample>> {
        let v = self.step();
        thread::sleep(self.rate);
        Ok(Some(Sample::value(v)))
    }
}
