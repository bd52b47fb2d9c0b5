//! Host runner contract.
//!
//! The host test runner is an external collaborator: it owns test
//! registration, step scheduling, and pass/fail reporting. This module
//! defines the two seams the adapter talks through, registering a top-level
//! test and registering a nested step, plus the boxed callback and future
//! shapes exchanged across them.
//!
//! Everything here is single-threaded. Suite trees hold `Rc` state, so the
//! futures are `!Send` and run on a current-thread runtime or inside a
//! `tokio::task::LocalSet`.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use anyhow::Result;

/// Single-threaded boxed future.
pub type LocalFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Shared handle to a registered test or step.
pub type SharedStepHandle = Rc<dyn StepHandle>;

/// Callback invoked by the host with the handle of the test or step it just
/// started. The callback registers any nested steps through that handle and
/// resolves with the overall outcome of its body.
pub type StepFn = Box<dyn FnOnce(SharedStepHandle) -> LocalFuture<'static, Result<()>>>;

/// Box a plain async closure into a [`StepFn`].
pub fn boxed_step<F, Fut>(f: F) -> StepFn
where
    F: FnOnce(SharedStepHandle) -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    Box::new(move |handle| -> LocalFuture<'static, Result<()>> { Box::pin(f(handle)) })
}

/// Registration point for top-level tests.
pub trait TestHost {
    /// Record a named top-level test. The host invokes `test` once with the
    /// root step handle when it runs the test, and derives the test's
    /// pass/fail outcome from the returned result.
    fn register(&self, name: String, test: StepFn);
}

/// Opaque host-supplied handle for one registered test or step.
pub trait StepHandle {
    /// Register a child step under this handle and run it to completion.
    ///
    /// The returned future must drive `body` in the calling task, not hand
    /// it off to another one, so task-local declaration state stays visible
    /// to the body. It resolves `Err` when the step failed, carrying the
    /// body's error through unmodified; the host records the outcome either
    /// way.
    fn step(&self, name: String, body: StepFn) -> LocalFuture<'_, Result<()>>;
}
