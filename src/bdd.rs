//! Public declaration surface: `with_host`, `describe`, and `it`.
//!
//! `describe` is polymorphic over the current declaration scope. Under a
//! host binding it registers a new top-level test whose future evaluation
//! builds and runs the whole suite tree; under an active suite it appends a
//! deferred nested-suite node to that suite's queue. `it` always appends a
//! case node and therefore requires an active suite.
//!
//! Declaration is recording, not execution. Bodies passed to `describe` and
//! `it` run later, when the host runs the registered test and the drain
//! interprets the recorded nodes in declaration order.

use std::future::Future;
use std::rc::Rc;

use anyhow::Result;

use crate::context::{self, boxed_body, Decl, DeclScope, RunPhase, SuiteContext};
use crate::error::DeclareError;
use crate::exec;
use crate::host::{boxed_step, TestHost};

/// Bind `host` as the registration target for top-level [`describe`] calls
/// made inside `declare`, and return the closure's value.
///
/// The binding is task-local and lasts exactly as long as the closure, so
/// different hosts can be bound in different tasks without interfering.
/// Rebinding inside an already-running suite tree starts an independent
/// registration scope on the new host.
pub fn with_host<T>(host: Rc<dyn TestHost>, declare: impl FnOnce() -> T) -> T {
    context::bind_host(host, declare)
}

/// Declare a suite.
///
/// With a host bound and no suite active, registers a top-level test named
/// `name` on the host and returns immediately; `body` is evaluated only
/// when the host runs that test. Inside a suite body, appends a deferred
/// nested-suite node to the enclosing suite's queue instead.
///
/// When the node eventually runs, `body` is awaited first (asynchronous
/// setup happens here), then everything it declared runs in declaration
/// order as child steps of this suite's step.
///
/// ## Errors
///
/// * [`DeclareError::InvalidNesting`] when called while a test case body is
///   running.
/// * [`DeclareError::NoBoundHost`] when called outside both [`with_host`]
///   and any suite body.
pub fn describe<F, Fut>(name: impl Into<String>, body: F) -> Result<(), DeclareError>
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    let name = name.into();
    match context::current_scope() {
        Some(DeclScope::Suite(ctx)) => {
            if ctx.phase() == RunPhase::Running {
                return Err(DeclareError::InvalidNesting);
            }
            ctx.push(Decl::Suite {
                name,
                body: boxed_body(body),
            });
            Ok(())
        }
        Some(DeclScope::Host(host)) => {
            tracing::debug!("registering top-level suite: {name}");
            let body = boxed_body(body);
            host.register(
                name,
                boxed_step(move |handle| exec::run_suite(SuiteContext::root(handle), body)),
            );
            Ok(())
        }
        None => Err(DeclareError::NoBoundHost),
    }
}

/// Declare a test case in the enclosing suite.
///
/// Appends a deferred case node to the innermost active suite's queue.
/// `body` runs later, as a child step of that suite, with the tree marked
/// as running for the body's duration.
///
/// ## Errors
///
/// * [`DeclareError::NoActiveContext`] when no suite body is evaluating,
///   e.g. at the top level.
/// * [`DeclareError::InvalidNesting`] when called while a test case body is
///   running.
pub fn it<F, Fut>(name: impl Into<String>, body: F) -> Result<(), DeclareError>
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    let ctx = context::current_suite()?;
    if ctx.phase() == RunPhase::Running {
        return Err(DeclareError::InvalidNesting);
    }
    ctx.push(Decl::Case {
        name: name.into(),
        body: boxed_body(body),
    });
    Ok(())
}

/* ===================== Tests ===================== */

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use crate::harness::{RecordingHost, StepEvent};

    #[test]
    fn test_describe_without_host_or_suite() {
        let err = describe("orphan", || async { Ok(()) }).unwrap_err();
        assert_eq!(err, DeclareError::NoBoundHost);
    }

    #[test]
    fn test_it_requires_enclosing_suite() {
        let err = it("leaf", || async { Ok(()) }).unwrap_err();
        assert_eq!(err, DeclareError::NoActiveContext);

        // A bound host is still not a suite.
        let host = Rc::new(RecordingHost::new());
        with_host(host, || {
            let err = it("leaf", || async { Ok(()) }).unwrap_err();
            assert_eq!(err, DeclareError::NoActiveContext);
        });
    }

    #[test]
    fn test_with_host_returns_closure_value() {
        let host = Rc::new(RecordingHost::new());
        let n = with_host(host, || 7);
        assert_eq!(n, 7);
    }

    #[tokio::test]
    async fn test_suite_body_deferred_until_host_runs() {
        let evaluated = Rc::new(Cell::new(false));
        let host = RecordingHost::new();
        with_host(Rc::new(host.clone()), || {
            let evaluated = evaluated.clone();
            describe("deferred", move || async move {
                evaluated.set(true);
                Ok(())
            })
        })
        .unwrap();

        assert!(!evaluated.get());
        host.run_all().await.unwrap();
        assert!(evaluated.get());
    }

    #[tokio::test]
    async fn test_top_level_suites_run_in_registration_order() {
        let host = RecordingHost::new();
        with_host(Rc::new(host.clone()), || -> Result<(), DeclareError> {
            describe("alpha", || async { Ok(()) })?;
            describe("beta", || async { Ok(()) })?;
            Ok(())
        })
        .unwrap();

        host.run_all().await.unwrap();
        let names: Vec<_> = host
            .events()
            .iter()
            .filter_map(|e| match e {
                StepEvent::TestStarted { name } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(names, ["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_declarations_inside_case_are_rejected() {
        let sibling_ran = Rc::new(Cell::new(false));
        let host = RecordingHost::new();
        with_host(Rc::new(host.clone()), || {
            let sibling_ran = sibling_ran.clone();
            describe("guarded", move || async move {
                it("rejects late declares", || async {
                    let err = it("inner case", || async { Ok(()) }).unwrap_err();
                    anyhow::ensure!(err == DeclareError::InvalidNesting, "got {err}");
                    let err = describe("inner suite", || async { Ok(()) }).unwrap_err();
                    anyhow::ensure!(err == DeclareError::InvalidNesting, "got {err}");
                    Ok(())
                })?;
                // The rejection above must not corrupt the suite state.
                it("sibling still runs", {
                    let sibling_ran = sibling_ran.clone();
                    move || async move {
                        sibling_ran.set(true);
                        Ok(())
                    }
                })?;
                Ok(())
            })
        })
        .unwrap();

        host.run_all().await.unwrap();
        assert!(sibling_ran.get());
        assert_eq!(host.report().failed, 0);
    }
}
