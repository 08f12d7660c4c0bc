//! Persistence worker: appends every sample to the store under one run.
//!
//! Runs as a state machine: ensure the schema exists, insert the run row,
//! then loop appending one committed record per sample until the
//! termination signal is observed, and finally stamp the run's stop time.
//! A failed record write is logged with the offending value and the worker
//! moves on to the next sample; it never retries and never leaves the run
//! row half-written, because each write is one atomic transaction.

use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{debug, error, info, warn};

use crate::error::AppResult;
use crate::sample::{classify, Sample};
use crate::signal::Signal;
use crate::storage::{Database, NewRun};

use super::QUEUE_WAIT;

/// Options for a persistence worker.
#[derive(Clone, Debug)]
pub struct PersistOptions {
    pub run: NewRun,
    /// Log the difference written with each record.
    pub print_diff: bool,
}

/// Spawns the persistence worker on its own thread.
pub fn spawn(
    db: Database,
    options: PersistOptions,
    rx: Receiver<Sample>,
    die: Signal,
) -> AppResult<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("persist".into())
        .spawn(move || {
            info!("[persist] is running!");
            if let Err(e) = run(&db, &options, &rx, &die) {
                error!("[persist] terminated with storage error: {e}");
            }
            info!("[persist] is exiting");
        })?;
    Ok(handle)
}

fn run(
    db: &Database,
    options: &PersistOptions,
    rx: &Receiver<Sample>,
    die: &Signal,
) -> AppResult<()> {
    // INIT -> OPEN: the schema must exist before the run row goes in.
    db.init()?;

    // OPEN -> RUNNING: the run id is fixed once the insert commits.
    let run_id = db.insert_run(&options.run, Utc::now())?;
    info!("[persist] Opened run {run_id}");

    let mut previous_value: Option<f64> = None;
    loop {
        if die.is_set() {
            info!("[persist] Die event set");
            break;
        }
        let sample = match rx.recv_timeout(QUEUE_WAIT) {
            Ok(sample) => sample,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("[persist] Input queue disconnected");
                break;
            }
        };
        debug!("[persist] got: {:?}", sample.payload);

        let reading = match classify(&sample.payload) {
            Ok(reading) => reading,
            Err(e) => {
                warn!("[persist] Dropping unclassifiable sample: {e}");
                continue;
            }
        };

        // First record of a run carries a difference of 0.0.
        let difference = previous_value.map_or(0.0, |p| reading.value - p);
        previous_value = Some(reading.value);
        if options.print_diff {
            info!("Diff: {difference}");
        }

        if let Err(e) = db.insert_record(
            run_id,
            reading.value,
            &reading.unit,
            difference,
            sample.timestamp,
        ) {
            error!(
                "[persist] Failed to store value {} ({}): {e}",
                reading.value, reading.unit
            );
        }
    }

    // CLOSING -> CLOSED.
    info!("[persist] Closing run {run_id}");
    db.close_run(run_id, Utc::now())?;
    Ok(())
}
