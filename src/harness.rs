//! In-memory test host.
//!
//! [`RecordingHost`] implements the host side of the contract for tests and
//! embedding. It collects registered top-level tests and runs them on
//! demand, sequentially or concurrently on the current `LocalSet`, while
//! recording an ordered event log of every test and step outcome. Step
//! paths are slash-joined, `"suite/nested suite/case"`, so assertions can
//! pin down both ordering and tree shape from the one log.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::host::{LocalFuture, SharedStepHandle, StepFn, StepHandle, TestHost};

/* ===================== Events & Report ===================== */

/// One entry in the host's log, in the order it was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StepEvent {
    TestStarted { name: String },
    StepStarted { path: String },
    StepPassed { path: String },
    StepFailed { path: String, error: String },
    TestPassed { name: String },
    TestFailed { name: String, error: String },
}

/// Summary of everything the host has recorded so far. `passed` and
/// `failed` count top-level tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub passed: usize,
    pub failed: usize,
    pub events: Vec<StepEvent>,
}

impl RunReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/* ===================== Recording Host ===================== */

type EventLog = Rc<RefCell<Vec<StepEvent>>>;

fn record(log: &EventLog, event: StepEvent) {
    log.borrow_mut().push(event);
}

#[derive(Default)]
struct HostState {
    pending: RefCell<Vec<(String, StepFn)>>,
    log: EventLog,
}

/// In-memory [`TestHost`] that runs registered tests on demand.
///
/// Cloning is shallow: clones share the registration list and event log, so
/// one clone can be handed to `with_host` while the original drives the run
/// and reads the log afterwards.
#[derive(Clone, Default)]
pub struct RecordingHost {
    inner: Rc<HostState>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every test registered since the last run, one at a time, in
    /// registration order. Each test's failure is recorded rather than
    /// short-circuiting the batch; returns `Err` after the batch when any
    /// test failed.
    pub async fn run_all(&self) -> Result<()> {
        let pending: Vec<_> = self.inner.pending.borrow_mut().drain(..).collect();
        let total = pending.len();
        tracing::debug!("running {total} registered test(s)");

        let mut failed = 0usize;
        for (name, test) in pending {
            if !self.run_one(name, test).await {
                failed += 1;
            }
        }
        if failed > 0 {
            bail!("{failed} of {total} top-level test(s) failed");
        }
        Ok(())
    }

    /// Run every pending test concurrently, awaiting them all. Must be
    /// called from within a `tokio::task::LocalSet`. Registration order
    /// fixes spawn order only; events from different tests may interleave
    /// in the log, while events within one test keep their usual order.
    pub async fn run_all_concurrent(&self) -> Result<()> {
        let pending: Vec<_> = self.inner.pending.borrow_mut().drain(..).collect();
        let total = pending.len();
        tracing::debug!("running {total} registered test(s) concurrently");

        let mut tasks = Vec::with_capacity(total);
        for (name, test) in pending {
            let host = self.clone();
            tasks.push(tokio::task::spawn_local(async move {
                host.run_one(name, test).await
            }));
        }
        // Every handle is awaited before reporting; a panicked task counts
        // as a failure.
        let mut failed = 0usize;
        for task in tasks {
            match task.await {
                Ok(true) => {}
                Ok(false) | Err(_) => failed += 1,
            }
        }
        if failed > 0 {
            bail!("{failed} of {total} top-level test(s) failed");
        }
        Ok(())
    }

    async fn run_one(&self, name: String, test: StepFn) -> bool {
        record(&self.inner.log, StepEvent::TestStarted { name: name.clone() });
        let handle: SharedStepHandle = Rc::new(RecordingStepHandle {
            path: name.clone(),
            log: self.inner.log.clone(),
        });
        match test(handle).await {
            Ok(()) => {
                record(&self.inner.log, StepEvent::TestPassed { name });
                true
            }
            Err(err) => {
                record(
                    &self.inner.log,
                    StepEvent::TestFailed {
                        name,
                        error: format!("{err:#}"),
                    },
                );
                false
            }
        }
    }

    /// Snapshot of the event log.
    pub fn events(&self) -> Vec<StepEvent> {
        self.inner.log.borrow().clone()
    }

    /// Report over everything recorded so far.
    pub fn report(&self) -> RunReport {
        let events = self.events();
        let passed = events
            .iter()
            .filter(|e| matches!(e, StepEvent::TestPassed { .. }))
            .count();
        let failed = events
            .iter()
            .filter(|e| matches!(e, StepEvent::TestFailed { .. }))
            .count();
        RunReport {
            passed,
            failed,
            events,
        }
    }
}

impl TestHost for RecordingHost {
    fn register(&self, name: String, test: StepFn) {
        tracing::trace!("top-level test registered: {name}");
        self.inner.pending.borrow_mut().push((name, test));
    }
}

/* ===================== Step Handles ===================== */

/// Handle for one position in the step tree.
struct RecordingStepHandle {
    path: String,
    log: EventLog,
}

impl StepHandle for RecordingStepHandle {
    fn step(&self, name: String, body: StepFn) -> LocalFuture<'_, Result<()>> {
        let path = format!("{}/{}", self.path, name);
        let log = self.log.clone();
        Box::pin(async move {
            record(&log, StepEvent::StepStarted { path: path.clone() });
            let child: SharedStepHandle = Rc::new(RecordingStepHandle {
                path: path.clone(),
                log: log.clone(),
            });
            match body(child).await {
                Ok(()) => {
                    record(&log, StepEvent::StepPassed { path });
                    Ok(())
                }
                Err(err) => {
                    record(
                        &log,
                        StepEvent::StepFailed {
                            path,
                            error: format!("{err:#}"),
                        },
                    );
                    Err(err)
                }
            }
        })
    }
}

/* ===================== Tests ===================== */
