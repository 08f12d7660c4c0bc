//! Presentation worker: maintains the rolling window the renderer draws.
//!
//! The window and its derived first-difference series live behind one
//! mutex because the update path (this worker) and the read path (the
//! renderer) run on different threads and must never observe a torn,
//! partially shifted array.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, info, warn};

use crate::error::AppResult;
use crate::sample::{classify, Sample};
use crate::signal::Signal;

use super::QUEUE_WAIT;

/// Fixed-capacity view of the most recent sample values plus their first
/// differences. Inserting evicts the oldest value; both series always have
/// exactly `capacity` elements, the difference series left-padded by
/// repeating its first computed element.
#[derive(Clone, Debug)]
pub struct RollingWindow {
    values: Vec<f64>,
    diffs: Vec<f64>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: vec![0.0; capacity],
            diffs: vec![0.0; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.values.len()
    }

    /// Shifts the window left one position, appends `v`, and recomputes the
    /// difference series. O(capacity) per insert. A zero-capacity window
    /// ignores inserts.
    pub fn push(&mut self, v: f64) {
        if self.values.is_empty() {
            return;
        }
        self.values.rotate_left(1);
        if let Some(last) = self.values.last_mut() {
            *last = v;
        }
        self.diffs = self
            .values
            .windows(2)
            .map(|w| w[1] - w[0])
            .collect();
        let first = self.diffs.first().copied().unwrap_or(0.0);
        self.diffs.insert(0, first);
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn diffs(&self) -> &[f64] {
        &self.diffs
    }
}

/// Shared, lock-protected handle to the rolling window.
#[derive(Clone)]
pub struct WindowHandle {
    inner: Arc<Mutex<RollingWindow>>,
}

impl WindowHandle {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RollingWindow::new(capacity))),
        }
    }

    /// Inserts a value under the lock.
    pub fn push(&self, v: f64) {
        if let Ok(mut window) = self.inner.lock() {
            window.push(v);
        }
    }

    /// Returns a consistent copy of both series for rendering.
    pub fn snapshot(&self) -> (Vec<f64>, Vec<f64>) {
        match self.inner.lock() {
            Ok(window) => (window.values().to_vec(), window.diffs().to_vec()),
            Err(poisoned) => {
                let window = poisoned.into_inner();
                (window.values().to_vec(), window.diffs().to_vec())
            }
        }
    }
}

/// Spawns the presentation worker on its own thread.
pub fn spawn(
    window: WindowHandle,
    rx: Receiver<Sample>,
    die: Signal,
) -> AppResult<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("display".into())
        .spawn(move || {
            info!("[display] is running!");
            loop {
                if die.is_set() {
                    info!("[display] Die event set");
                    break;
                }
                let sample = match rx.recv_timeout(QUEUE_WAIT) {
                    Ok(sample) => sample,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => {
                        debug!("[display] Input queue disconnected");
                        break;
                    }
                };
                match classify(&sample.payload) {
                    Ok(reading) => window.push(reading.value),
                    Err(e) => warn!("[display] Dropping unclassifiable sample: {e}"),
                }
            }
            info!("[display] is exiting");
        })?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_holds_the_last_c_values_in_arrival_order() {
        let mut w = RollingWindow::new(4);
        for v in 1..=10 {
            w.push(f64::from(v));
        }
        assert_eq!(w.values(), &[7.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn window_length_stays_constant() {
        let mut w = RollingWindow::new(5);
        for v in 0..3 {
            w.push(f64::from(v));
            assert_eq!(w.values().len(), 5);
            assert_eq!(w.diffs().len(), 5);
        }
    }

    #[test]
    fn zero_capacity_window_ignores_inserts() {
        let mut w = RollingWindow::new(0);
        w.push(1.0);
        assert!(w.values().is_empty());
        assert!(w.diffs().is_empty());
    }

    #[test]
    fn difference_series_is_left_padded_with_its_first_element() {
        let mut w = RollingWindow::new(4);
        for v in [1.0, 3.0, 6.0, 10.0] {
            w.push(v);
        }
        // values [1,3,6,10] -> diffs [2,3,4] padded to [2,2,3,4].
        assert_eq!(w.diffs(), &[2.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn snapshot_series_have_matching_lengths() {
        let handle = WindowHandle::new(8);
        handle.push(42.0);
        let (values, diffs) = handle.snapshot();
        assert_eq!(values.len(), 8);
        assert_eq!(diffs.len(), 8);
        assert_eq!(values[7], 42.0);
    }

    #[test]
    fn worker_updates_the_shared_window_and_exits_on_signal() {
        let window = WindowHandle::new(3);
        let (tx, rx) = crossbeam_channel::unbounded();
        let die = Signal::new();
        let handle = spawn(window.clone(), rx, die.clone()).unwrap();

        tx.send(Sample::value(5.0)).unwrap();
        tx.send(Sample::text("7.5 g")).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(200));

        let (values, _) = window.snapshot();
        assert_eq!(&values[1..], &[5.0, 7.5]);

        die.set();
        handle.join().unwrap();
    }
}
