//! End-to-end tests for the acquisition pipeline.

use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;

use datagrapher::pipeline::Pipeline;
use datagrapher::render::HeadlessRenderer;
use datagrapher::sample::Sample;
use datagrapher::signal::Signal;
use datagrapher::source::{self, SawtoothSource};
use datagrapher::storage::{Database, NewRun};
use datagrapher::workers::display::WindowHandle;
use datagrapher::workers::persist::PersistOptions;
use datagrapher::workers::{display, persist};

fn persist_options() -> PersistOptions {
    PersistOptions {
        run: NewRun {
            name: "Collection".into(),
            notes: None,
            user: "tester".into(),
        },
        print_diff: false,
    }
}

/// Full collect path: sawtooth source -> fan-out -> persist + display,
/// stopped by the renderer deadline.
#[test]
fn collect_roundtrip_persists_ordered_records_and_closes_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db"));

    let die = Signal::new();
    let (source_tx, source_rx) = unbounded::<Sample>();
    let window = WindowHandle::new(16);

    let source = Box::new(SawtoothSource::new(Duration::from_millis(10), 0.1));
    let mut pipeline = Pipeline::new(die.clone(), source_rx);
    pipeline.add_thread(
        "source",
        source::spawn(source, source_tx, die.clone()).unwrap(),
    );

    let (persist_tx, persist_rx) = unbounded();
    pipeline.add_thread(
        "persist",
        persist::spawn(db.clone(), persist_options(), persist_rx, die.clone()).unwrap(),
    );
    pipeline.add_consumer(persist_tx);

    let (display_tx, display_rx) = unbounded();
    pipeline.add_thread(
        "display",
        display::spawn(window.clone(), display_rx, die.clone()).unwrap(),
    );
    pipeline.add_consumer(display_tx);

    let mut renderer = HeadlessRenderer::new(window.clone(), Some(Duration::from_millis(400)));
    pipeline.run(&mut renderer);

    assert!(die.is_set());

    let runs = db.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    let stopped = run.stopped_at.expect("run must be closed on shutdown");
    assert!(stopped > run.started_at);

    let records = db.records(run.id).unwrap();
    assert!(
        records.len() >= 10,
        "expected a steady feed, got {} records",
        records.len()
    );

    // Records follow the sawtooth in observation order with correct
    // differences: the first is 0.0, the rest value_i - value_{i-1}.
    assert_eq!(records[0].difference, 0.0);
    for pair in records.windows(2) {
        let expected = pair[1].value - pair[0].value;
        assert!((pair[1].difference - expected).abs() < 1e-12);
        assert!(pair[1].timestamp >= pair[0].timestamp);
    }

    // The persisted prefix matches the waveform exactly from its start.
    let mut increment = 0.1;
    let mut value = 0.0;
    for record in &records {
        value += increment;
        assert!((record.value - value).abs() < 1e-9);
        if value + increment > 1.0 {
            increment = -increment;
        }
        if value + increment < -1.0 {
            increment = -increment;
        }
    }

    // The display path saw the same stream.
    let (values, diffs) = window.snapshot();
    assert_eq!(values.len(), 16);
    assert_eq!(diffs.len(), 16);
    assert!(values.iter().any(|v| *v != 0.0));
}

/// Replay path: the persisted value sequence feeds the presentation worker
/// through the same source abstraction used for live acquisition.
#[test]
fn replay_feeds_stored_values_through_the_display_path() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db"));
    db.init().unwrap();
    let run_id = db
        .insert_run(&persist_options().run, chrono::Utc::now())
        .unwrap();
    for v in [1.0, 2.0, 4.0] {
        db.insert_record(run_id, v, "g", 0.0, chrono::Utc::now())
            .unwrap();
    }

    let values = db.record_values(run_id).unwrap();
    let source = Box::new(
        source::ReplaySource::new(values, Duration::from_millis(5)).unwrap(),
    );

    let die = Signal::new();
    let (source_tx, source_rx) = unbounded::<Sample>();
    let window = WindowHandle::new(4);

    let mut pipeline = Pipeline::new(die.clone(), source_rx);
    pipeline.add_thread(
        "source",
        source::spawn(source, source_tx, die.clone()).unwrap(),
    );
    let (display_tx, display_rx) = unbounded();
    pipeline.add_thread(
        "display",
        display::spawn(window.clone(), display_rx, die.clone()).unwrap(),
    );
    pipeline.add_consumer(display_tx);

    let mut renderer = HeadlessRenderer::new(window.clone(), Some(Duration::from_millis(100)));
    pipeline.run(&mut renderer);

    let (values, _) = window.snapshot();
    // The replay wrapped at least once, so the stored values are present.
    assert!(values.contains(&1.0));
    assert!(values.contains(&2.0));
    assert!(values.contains(&4.0));
}

/// An operator interrupt during a live collection still runs the full
/// shutdown sequence: the run row ends up stamped closed and no worker is
/// killed mid-sample.
#[test]
fn interrupted_collection_still_closes_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db"));

    let die = Signal::new();
    let (source_tx, source_rx) = unbounded::<Sample>();
    let window = WindowHandle::new(8);

    let source = Box::new(SawtoothSource::new(Duration::from_millis(10), 0.1));
    let mut pipeline = Pipeline::new(die.clone(), source_rx);
    let interrupt = pipeline.interrupt_signal();
    pipeline.add_thread(
        "source",
        source::spawn(source, source_tx, die.clone()).unwrap(),
    );

    let (persist_tx, persist_rx) = unbounded();
    pipeline.add_thread(
        "persist",
        persist::spawn(db.clone(), persist_options(), persist_rx, die.clone()).unwrap(),
    );
    pipeline.add_consumer(persist_tx);

    let (display_tx, display_rx) = unbounded();
    pipeline.add_thread(
        "display",
        display::spawn(window.clone(), display_rx, die.clone()).unwrap(),
    );
    pipeline.add_consumer(display_tx);

    // Interrupt mid-collection, as a Ctrl-C handler would.
    let raiser = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        interrupt.set();
    });

    // No deadline: the interrupt is the only stop path, like a live run.
    let mut renderer = HeadlessRenderer::new(window, None);
    pipeline.run(&mut renderer);
    raiser.join().unwrap();

    assert!(die.is_set());
    let runs = db.list_runs().unwrap();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert!(
        run.stopped_at.is_some(),
        "interrupt must stamp the run closed"
    );
    assert!(run.stopped_at.unwrap() > run.started_at);
    assert!(!db.records(run.id).unwrap().is_empty());
}

/// Once the termination signal is set, every worker observes it and exits
/// within one queue-wait timeout interval.
#[test]
fn workers_exit_within_one_queue_timeout_of_the_signal() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db"));

    let die = Signal::new();
    let (_persist_tx, persist_rx) = unbounded();
    let (_display_tx, display_rx) = unbounded();
    let window = WindowHandle::new(4);

    let persist_handle =
        persist::spawn(db, persist_options(), persist_rx, die.clone()).unwrap();
    let display_handle = display::spawn(window, display_rx, die.clone()).unwrap();

    // Let both workers reach their queue wait.
    std::thread::sleep(Duration::from_millis(100));

    let start = Instant::now();
    die.set();
    persist_handle.join().unwrap();
    display_handle.join().unwrap();
    assert!(
        start.elapsed() <= Duration::from_millis(1100),
        "workers took {:?} to observe the signal",
        start.elapsed()
    );
}

/// Setting the termination signal twice is safe, and a second pipeline can
/// start against the same store afterwards.
#[test]
fn back_to_back_runs_share_one_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(dir.path().join("test.db"));

    for _ in 0..2 {
        let die = Signal::new();
        let (tx, rx) = unbounded();
        let handle = persist::spawn(db.clone(), persist_options(), rx, die.clone()).unwrap();
        tx.send(Sample::value(1.0)).unwrap();
        std::thread::sleep(Duration::from_millis(200));
        die.set();
        die.set();
        handle.join().unwrap();
    }

    let runs = db.list_runs().unwrap();
    assert_eq!(runs.len(), 2);
    for run in &runs {
        assert!(run.stopped_at.is_some());
        assert_eq!(db.records(run.id).unwrap().len(), 1);
    }
}
