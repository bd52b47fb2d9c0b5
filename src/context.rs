//! Declaration scope and suite context.
//!
//! Declaration state is carried in a task-local slot rather than a global
//! stack. A scope names the one place declarations currently attach:
//!
//! - a bound [`TestHost`], entered by `with_host`, where top-level
//!   `describe` calls register new tests, or
//! - an active [`SuiteContext`], entered for the duration of a suite body
//!   and its queue drain, where `describe`/`it` append deferred nodes.
//!
//! Nested scopes shadow the outer binding and restore it when their future
//! completes or is dropped, so an aborted suite cannot leave a stale scope
//! behind. Because the slot is per task, two suite trees running
//! concurrently on a `LocalSet` cannot see each other's state.
//!
//! ## Run phase
//!
//! Each top-level suite tree shares one [`RunPhase`] cell across all of its
//! contexts. The tree is `Declaring` while suite bodies evaluate and queues
//! drain, and `Running` for exactly the lifetime of a test case body. The
//! declaration functions reject calls made while the tree is `Running`.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use anyhow::Result;

use crate::error::DeclareError;
use crate::host::{LocalFuture, SharedStepHandle, TestHost};

/* ===================== Run Phase ===================== */

/// Where a suite tree currently is: recording declarations, or inside a
/// test case body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunPhase {
    Declaring,
    Running,
}

/* ===================== Declarations ===================== */

/// Deferred body of a suite or case. Evaluated only when the node is
/// interpreted during its parent's queue drain.
pub(crate) type BodyFn = Box<dyn FnOnce() -> LocalFuture<'static, Result<()>>>;

/// Box a plain async closure into a [`BodyFn`].
pub(crate) fn boxed_body<F, Fut>(body: F) -> BodyFn
where
    F: FnOnce() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    Box::new(move || -> LocalFuture<'static, Result<()>> { Box::pin(body()) })
}

/// One recorded declaration. What was declared stays plain data until the
/// drain interprets it against the host's step API.
pub(crate) enum Decl {
    Suite { name: String, body: BodyFn },
    Case { name: String, body: BodyFn },
}

impl Decl {
    pub(crate) fn name(&self) -> &str {
        match self {
            Decl::Suite { name, .. } | Decl::Case { name, .. } => name,
        }
    }
}

/* ===================== Suite Context ===================== */

/// Per-suite record created for each evaluation of a `describe` body: the
/// host handle its children register under, the ordered queue of deferred
/// declarations, and the tree-wide run phase.
pub(crate) struct SuiteContext {
    handle: SharedStepHandle,
    queue: RefCell<Vec<Decl>>,
    phase: Rc<Cell<RunPhase>>,
}

impl SuiteContext {
    /// Root context of a new top-level suite tree, with a fresh phase cell.
    pub(crate) fn root(handle: SharedStepHandle) -> Rc<Self> {
        Rc::new(SuiteContext {
            handle,
            queue: RefCell::new(Vec::new()),
            phase: Rc::new(Cell::new(RunPhase::Declaring)),
        })
    }

    /// Child context for a nested suite, sharing the parent tree's phase.
    pub(crate) fn child(handle: SharedStepHandle, phase: Rc<Cell<RunPhase>>) -> Rc<Self> {
        Rc::new(SuiteContext {
            handle,
            queue: RefCell::new(Vec::new()),
            phase,
        })
    }

    pub(crate) fn handle(&self) -> &SharedStepHandle {
        &self.handle
    }

    pub(crate) fn phase(&self) -> RunPhase {
        self.phase.get()
    }

    pub(crate) fn phase_cell(&self) -> Rc<Cell<RunPhase>> {
        self.phase.clone()
    }

    /// Append a declaration. Callers must have rejected the `Running` phase
    /// first; the queue only grows while this context is the innermost
    /// scope.
    pub(crate) fn push(&self, decl: Decl) {
        tracing::trace!("declaration recorded: {}", decl.name());
        self.queue.borrow_mut().push(decl);
    }

    /// Take the recorded queue for draining, fixing its contents. Nodes
    /// declared afterwards would belong to a later evaluation, not the one
    /// being drained.
    pub(crate) fn take_queue(&self) -> Vec<Decl> {
        self.queue.take()
    }

    /// Names of the recorded declarations, in declaration order.
    #[cfg(test)]
    pub(crate) fn declared_names(&self) -> Vec<String> {
        self.queue
            .borrow()
            .iter()
            .map(|d| d.name().to_string())
            .collect()
    }
}

/* ===================== Declaration Scope ===================== */

/// What the innermost scope currently accepts: top-level registrations on a
/// bound host, or deferred declarations on an active suite.
#[derive(Clone)]
pub(crate) enum DeclScope {
    Host(Rc<dyn TestHost>),
    Suite(Rc<SuiteContext>),
}

tokio::task_local! {
    static SCOPE: DeclScope;
}

/// Bind a host for the duration of a synchronous declaration closure.
pub(crate) fn bind_host<T>(host: Rc<dyn TestHost>, declare: impl FnOnce() -> T) -> T {
    SCOPE.sync_scope(DeclScope::Host(host), declare)
}

/// Evaluate `fut` with `ctx` as the innermost declaration scope. Nested
/// calls shadow the outer binding; the outer binding is back in effect once
/// the returned future completes or is dropped.
pub(crate) async fn enter_suite<T>(ctx: Rc<SuiteContext>, fut: impl Future<Output = T>) -> T {
    SCOPE.scope(DeclScope::Suite(ctx), fut).await
}

/// The innermost scope, if any.
pub(crate) fn current_scope() -> Option<DeclScope> {
    SCOPE.try_with(|scope| scope.clone()).ok()
}

/// The innermost active suite context.
pub(crate) fn current_suite() -> Result<Rc<SuiteContext>, DeclareError> {
    match current_scope() {
        Some(DeclScope::Suite(ctx)) => Ok(ctx),
        Some(DeclScope::Host(_)) | None => Err(DeclareError::NoActiveContext),
    }
}

/* ===================== Tests ===================== */
