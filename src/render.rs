//! The renderer seam between the pipeline and any viewer.
//!
//! The relay loop pumps the renderer once per iteration; the renderer
//! reads the rolling window through its [`WindowHandle`] snapshot and
//! raises the viewer-closed signal when the operator dismisses the view.
//! The pipeline itself only depends on this trait, so a windowed plot and
//! the headless renderer used for tests and tty runs are interchangeable.

use std::time::{Duration, Instant};

use log::debug;

use crate::signal::Signal;
use crate::workers::display::WindowHandle;

/// External viewer driven by the orchestrator's relay loop.
pub trait Renderer {
    /// Services pending viewer events. Called once per relay iteration,
    /// whether or not a sample arrived.
    fn pump_events(&mut self);

    /// True once the viewer has been closed by the operator.
    fn closed(&self) -> bool;

    /// Tells the viewer to stop its own event loop. Idempotent.
    fn shutdown(&mut self);
}

/// Renderer with no window: logs the latest window value at a throttled
/// rate and closes itself after an optional deadline.
pub struct HeadlessRenderer {
    window: WindowHandle,
    close: Signal,
    deadline: Option<Instant>,
    last_report: Instant,
}

impl HeadlessRenderer {
    /// `duration` bounds the session; `None` runs until interrupted.
    pub fn new(window: WindowHandle, duration: Option<Duration>) -> Self {
        Self {
            window,
            close: Signal::new(),
            deadline: duration.map(|d| Instant::now() + d),
            last_report: Instant::now(),
        }
    }
}

impl Renderer for HeadlessRenderer {
    fn pump_events(&mut self) {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                debug!("Session duration elapsed - closing viewer");
                self.close.set();
            }
        }
        if self.last_report.elapsed() >= Duration::from_secs(1) {
            let (values, diffs) = self.window.snapshot();
            if let (Some(v), Some(d)) = (values.last(), diffs.last()) {
                debug!("window: value={v} diff={d}");
            }
            self.last_report = Instant::now();
        }
    }

    fn closed(&self) -> bool {
        self.close.is_set()
    }

    fn shutdown(&mut self) {
        self.close.set();
    }
}
