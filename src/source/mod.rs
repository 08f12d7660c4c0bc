//! Sample sources and the spawned acquisition loop.
//!
//! A [`SampleSource`] produces at most one sample per poll, pacing itself
//! (a device read blocks on I/O, a synthetic generator sleeps). The loop in
//! [`spawn`] checks the termination signal every iteration and forwards
//! samples with a non-blocking send, so a slow consumer can never stall the
//! source. Transient poll errors are logged and absorbed; only failure to
//! open the source is fatal, and that happens before the loop starts.

mod balance;
mod replay;
mod synthetic;

pub use balance::{BalanceSource, LineReader};
#[cfg(feature = "instrument_serial")]
pub use balance::SerialLineReader;
pub use replay::ReplaySource;
pub use synthetic::{SawtoothSource, UniformSource};

use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use log::{debug, info, warn};

use crate::error::AppResult;
use crate::sample::Sample;
use crate::signal::Signal;

/// A producer of scalar samples.
///
/// Implementations pace themselves inside [`poll`](Self::poll): a synthetic
/// generator sleeps its emission interval, a device read blocks until data
/// arrives or its timeout fires (returning `None`).
pub trait SampleSource: Send {
    /// Name used in log lines.
    fn name(&self) -> &str;

    /// Acquires the underlying resource. An error here is fatal and must be
    /// surfaced before any worker starts.
    fn open(&mut self) -> AppResult<()> {
        Ok(())
    }

    /// Produces the next sample, or `None` when no data is available yet.
    fn poll(&mut self) -> AppResult<Option<Sample>>;

    /// Releases the underlying resource.
    fn close(&mut self) {}
}

/// Spawns the acquisition loop on its own thread.
///
/// The source must already be opened. The loop exits when the termination
/// signal is set or the output channel is disconnected, then closes the
/// source.
pub fn spawn(
    mut source: Box<dyn SampleSource>,
    tx: Sender<Sample>,
    die: Signal,
) -> AppResult<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name(format!("source-{}", source.name()))
        .spawn(move || {
            info!("[{}] is running!", source.name());
            loop {
                if die.is_set() {
                    info!("[{}] Die event set", source.name());
                    break;
                }
                match source.poll() {
                    Ok(Some(sample)) => {
                        debug!("[{}] Emitting {:?}", source.name(), sample.payload);
                        if tx.send(sample).is_err() {
                            debug!("[{}] Output queue disconnected", source.name());
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!("[{}] Dropping reading: {}", source.name(), e),
                }
            }
            source.close();
            info!("[{}] is exiting", source.name());
        })?;
    Ok(handle)
}
