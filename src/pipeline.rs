//! The orchestrator: fan-out relay loop and coordinated shutdown.
//!
//! The relay loop runs on the calling thread. Every iteration it makes a
//! short-timeout read from the source queue, fans any sample out by copy to
//! each consumer queue, pumps the renderer's event loop, and breaks once
//! the viewer closes. On loop exit — for any reason — the shutdown sequence
//! is always the same, in order: raise the termination signal, tell the
//! renderer to stop, then poll every thread's liveness at a fixed interval
//! until all have exited. Workers are expected to notice the signal within
//! one queue-wait timeout, so no upper join timeout is applied.

use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info};

use crate::render::Renderer;
use crate::sample::Sample;
use crate::signal::Signal;

/// Relay loop poll interval on the source queue.
pub const RELAY_POLL: Duration = Duration::from_millis(10);

/// Liveness poll interval while waiting for threads to exit.
pub const JOIN_POLL: Duration = Duration::from_millis(100);

struct NamedHandle {
    name: String,
    handle: JoinHandle<()>,
    death_reported: bool,
}

struct Consumer {
    tx: Sender<Sample>,
    drop_logged: bool,
}

/// Wires the source queue to the consumer queues and owns every spawned
/// thread until shutdown.
pub struct Pipeline {
    die: Signal,
    interrupt: Signal,
    source_rx: Receiver<Sample>,
    consumers: Vec<Consumer>,
    threads: Vec<NamedHandle>,
}

impl Pipeline {
    pub fn new(die: Signal, source_rx: Receiver<Sample>) -> Self {
        Self {
            die,
            interrupt: Signal::new(),
            source_rx,
            consumers: Vec::new(),
            threads: Vec::new(),
        }
    }

    /// The operator-interrupt signal. Setting it (e.g. from a Ctrl-C
    /// handler) makes the relay loop exit through the same coordinated
    /// shutdown sequence as a viewer close.
    pub fn interrupt_signal(&self) -> Signal {
        self.interrupt.clone()
    }

    /// Registers a spawned thread for liveness checks and joining.
    pub fn add_thread(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.threads.push(NamedHandle {
            name: name.into(),
            handle,
            death_reported: false,
        });
    }

    /// Registers a consumer queue fed by the fan-out.
    pub fn add_consumer(&mut self, tx: Sender<Sample>) {
        self.consumers.push(Consumer {
            tx,
            drop_logged: false,
        });
    }

    /// Runs the relay loop until the viewer closes, then shuts down.
    pub fn run(mut self, renderer: &mut dyn Renderer) {
        loop {
            match self.source_rx.recv_timeout(RELAY_POLL) {
                Ok(sample) => {
                    debug!("Main Q got: {:?}", sample.payload);
                    // Fan out by copy; consumers never share a sample.
                    for consumer in &mut self.consumers {
                        if consumer.tx.send(sample.clone()).is_err() && !consumer.drop_logged {
                            debug!("Consumer queue disconnected - dropping its samples");
                            consumer.drop_logged = true;
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    info!("Source queue disconnected - ending data collection");
                    break;
                }
            }
            renderer.pump_events();
            if renderer.closed() {
                info!("Viewer closed - ending data collection");
                break;
            }
            if self.interrupt.is_set() {
                info!("Caught interrupt - ending data collection");
                break;
            }
            for thread in &mut self.threads {
                if thread.handle.is_finished() && !thread.death_reported {
                    error!("Thread [{}] was found dead!", thread.name);
                    thread.death_reported = true;
                }
            }
        }
        self.shutdown(renderer);
    }

    /// The coordinated shutdown sequence. Idempotent signal set, renderer
    /// stop, then a bounded-interval wait for every thread.
    fn shutdown(self, renderer: &mut dyn Renderer) {
        info!("Shutting down viewer and threads.");
        if !self.die.is_set() {
            self.die.set();
        }
        renderer.shutdown();
        for thread in self.threads {
            loop {
                debug!("Checking [{}]", thread.name);
                if thread.handle.is_finished() {
                    debug!("[{}] is not alive.", thread.name);
                    break;
                }
                std::thread::sleep(JOIN_POLL);
            }
            if thread.handle.join().is_err() {
                error!("Thread [{}] panicked before exit", thread.name);
            }
        }
    }
}
