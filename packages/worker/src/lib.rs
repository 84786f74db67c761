#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Worker loop pulling tile coordinates off a [`Queue`] and handing each
//! to a [`JobProcessor`].
//!
//! A failed coordinate is logged on one line and left unacknowledged so
//! the queue can deliver it again. Only queue read failures and a failed
//! [`JobProcessor::initialize`] stop the loop.

pub mod queue;

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use osm_tiles_tile::TileCoord;

pub use queue::{LineQueue, Queue, QueueError, QueueMessage};

/// Failure processing one coordinate.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// May succeed if the coordinate is retried, e.g. a serialization
    /// conflict in the backing store. Logged at WARN.
    #[error("transient: {0}")]
    Transient(String),
    /// Retrying will fail the same way. Logged at ERROR.
    #[error("{0}")]
    Fatal(String),
}

impl JobError {
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    const fn log_level(&self) -> log::Level {
        if self.is_transient() {
            log::Level::Warn
        } else {
            log::Level::Error
        }
    }
}

/// Errors that stop the worker loop.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Reading from the queue failed.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// The processor could not be initialized.
    #[error("processor initialization failed: {0}")]
    Initialize(#[source] JobError),
}

/// Does the work for one tile coordinate.
pub trait JobProcessor {
    /// Called once before the first coordinate of a run.
    ///
    /// # Errors
    ///
    /// * If the processor cannot start
    fn initialize(&mut self) -> Result<(), JobError> {
        Ok(())
    }

    /// Processes one coordinate.
    ///
    /// # Errors
    ///
    /// * If the coordinate could not be processed
    fn process(&mut self, coord: TileCoord) -> Result<(), JobError>;
}

/// Counts from one [`Worker::process`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Coordinates processed and acknowledged.
    pub done: usize,
    /// Coordinates that failed and were left on the queue.
    pub failed: usize,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Drives a [`JobProcessor`] from a [`Queue`].
pub struct Worker<Q, P> {
    queue: Q,
    processor: P,
    /// Keep reading after the first batch, until the queue is exhausted.
    pub daemonized: bool,
}

impl<Q: Queue, P: JobProcessor> Worker<Q, P> {
    pub const fn new(queue: Q, processor: P) -> Self {
        Self {
            queue,
            processor,
            daemonized: false,
        }
    }

    #[must_use]
    pub const fn daemonized(mut self, daemonized: bool) -> Self {
        self.daemonized = daemonized;
        self
    }

    /// Processes batches of up to `max_to_read` messages.
    ///
    /// Reads a single batch unless daemonized, in which case it keeps
    /// reading until the queue reports it is exhausted.
    ///
    /// # Errors
    ///
    /// * If the processor fails to initialize
    /// * If reading from the queue fails
    pub fn process(&mut self, max_to_read: usize) -> Result<WorkerStats, WorkerError> {
        self.processor
            .initialize()
            .map_err(WorkerError::Initialize)?;

        let mut stats = WorkerStats::default();
        loop {
            for msg in self.queue.read(max_to_read)? {
                if self.process_message(&msg) {
                    stats.done += 1;
                } else {
                    stats.failed += 1;
                }
            }

            if !self.daemonized || self.queue.is_exhausted() {
                break;
            }
        }

        log::info!(
            "Worker finished: {} done, {} failed",
            stats.done,
            stats.failed
        );
        Ok(stats)
    }

    fn process_message(&mut self, msg: &QueueMessage) -> bool {
        let start = Instant::now();
        let coord = msg.coord;
        log::info!("processing {coord} ...");

        let result = self
            .processor
            .process(coord)
            .and_then(|()| {
                self.queue
                    .job_done(&msg.handle)
                    .map_err(|e| JobError::Fatal(e.to_string()))
            });

        let ok = match result {
            Ok(()) => {
                log::info!(
                    "processing {coord} ... done took {:.3} (seconds)",
                    start.elapsed().as_secs_f64()
                );
                true
            }
            Err(e) => {
                log::log!(e.log_level(), "processing {coord} ... failed: {e}");
                false
            }
        };

        if let Some(sent) = msg.sent_timestamp {
            let in_queue = now_millis().saturating_sub(sent) / 1000;
            log::info!("time in queue {in_queue} (seconds)");
        }

        ok
    }
}
