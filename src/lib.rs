//! # Datagrapher Core Library
//!
//! This crate contains the core of the `datagrapher` application: a small
//! concurrent pipeline that reads scalar samples from a source (a serial
//! balance, a synthetic generator, or a replayed run), fans them out to
//! consumers, graphs a rolling window of recent values, and logs every
//! sample to a SQLite database grouped under a `Run`.
//!
//! ## Crate Structure
//!
//! - **`config`**: Application settings loaded from an optional TOML file,
//!   including the default serial profile for Mettler-Toledo NewClassic
//!   balances. See [`config::Settings`].
//! - **`error`**: The central [`error::DaqError`] type used across the crate.
//! - **`sample`**: The [`sample::Sample`] type carried through every queue,
//!   plus the reading-classification regex shared by the instrument source
//!   and the persistence worker.
//! - **`signal`**: The shared atomic flags used for cooperative shutdown
//!   (termination and viewer-closed).
//! - **`source`**: The [`source::SampleSource`] trait and its variants
//!   (uniform, sawtooth, replay, serial balance).
//! - **`storage`**: SQLite persistence for [`storage::Run`] and
//!   [`storage::Record`] rows, serialized through a process-wide write lock.
//! - **`workers`**: The persistence and presentation worker threads.
//! - **`render`**: The [`render::Renderer`] seam the presentation path
//!   draws through, with a headless implementation.
//! - **`pipeline`**: The orchestrator that wires source, queues and workers
//!   together and performs coordinated shutdown.
//! - **`export`**: Run listing and CSV export of stored records.

pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod render;
pub mod sample;
pub mod signal;
pub mod source;
pub mod storage;
pub mod workers;
