//! Nested `describe`/`it` test suites over a step-based test host.
//!
//! Hosts with a hierarchical step API expose one primitive: run a named
//! step, possibly registering further steps under it. This crate adapts
//! BDD-style suite declarations onto that primitive, so suites become
//! top-level tests and nested suites and cases become steps.
//!
//! ## Declaration model
//!
//! - [`with_host`] binds a [`TestHost`] for a synchronous declaration
//!   closure; top-level [`describe`] calls inside it register tests on the
//!   host.
//! - Suite bodies run later, when the host runs the test. A body may await
//!   asynchronous setup, then declare cases with [`it`] and nested suites
//!   with [`describe`]. Declarations are recorded, not executed.
//! - After a body completes, its recorded declarations run in declaration
//!   order, each fully awaited before the next, as child steps of the
//!   suite's step. A failure halts the suite's remaining queue.
//! - Declaring from inside a running test case is rejected with
//!   [`DeclareError::InvalidNesting`].
//!
//! Suite state is task-local and reference-counted, so the futures involved
//! are `!Send`: run them on a current-thread runtime or a
//! `tokio::task::LocalSet`. Trees in different tasks are fully isolated.
//!
//! ## Example
//!
//! ```no_run
//! use std::rc::Rc;
//!
//! use stepspec::{describe, it, with_host, RecordingHost};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let host = RecordingHost::new();
//!     with_host(Rc::new(host.clone()), || {
//!         describe("arithmetic", || async {
//!             it("adds", || async {
//!                 anyhow::ensure!(2 + 2 == 4);
//!                 Ok(())
//!             })?;
//!             describe("multiplication", || async {
//!                 it("scales", || async {
//!                     anyhow::ensure!(6 * 7 == 42);
//!                     Ok(())
//!                 })?;
//!                 Ok(())
//!             })?;
//!             Ok(())
//!         })
//!     })?;
//!
//!     host.run_all().await?;
//!     println!("{}", host.report().to_json()?);
//!     Ok(())
//! }
//! ```

pub mod bdd;
mod context;
pub mod error;
mod exec;
pub mod harness;
pub mod host;

// Re-export the declaration API and host contract
pub use bdd::{describe, it, with_host};
pub use error::DeclareError;
pub use harness::{RecordingHost, RunReport, StepEvent};
pub use host::{boxed_step, LocalFuture, SharedStepHandle, StepFn, StepHandle, TestHost};
