//! Synthetic sources for testing the pipeline without hardware.

use std::thread;
use std::time::Duration;

use rand::Rng;

use crate::error::AppResult;
use crate::sample::Sample;

use super::SampleSource;

/// Emits uniform random values in [0, 1) at a fixed interval.
pub struct UniformSource {
    interval: Duration,
}

impl UniformSource {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl SampleSource for UniformSource {
    fn name(&self) -> &str {
        "uniform"
    }

    fn poll(&mut self) -> AppResult<Option<Sample>> {
        let v: f64 = rand::thread_rng().gen();
        thread::sleep(self.interval);
        Ok(Some(Sample::value(v)))
    }
}

/// Emits a triangular (sawtooth) waveform between -1.0 and +1.0.
///
/// Direction reverses when the next step would exceed either bound; both
/// bounds are evaluated every tick.
pub struct SawtoothSource {
    interval: Duration,
    increment: f64,
    value: f64,
}

impl SawtoothSource {
    pub fn new(interval: Duration, increment: f64) -> Self {
        Self {
            interval,
            increment,
            value: 0.0,
        }
    }

    /// Advances the waveform one tick and returns the emitted value.
    fn step(&mut self) -> f64 {
        self.value += self.increment;
        let v = self.value;
        if self.value + self.increment > 1.0 {
            self.increment = -self.increment;
        }
        if self.value + self.increment < -1.0 {
            self.increment = -self.increment;
        }
        v
    }
}

impl SampleSource for SawtoothSource {
    fn name(&self) -> &str {
        "sawtooth"
    }

    fn poll(&mut self) -> AppResult<Option<Sample>> {
        let v = self.step();
        thread::sleep(self.interval);
        Ok(Some(Sample::value(v)))
    }
}
