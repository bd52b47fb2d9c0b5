//! Usage errors surfaced by the declaration functions.

use thiserror::Error;

/// Errors returned synchronously by [`describe`](crate::describe) and
/// [`it`](crate::it) when a declaration cannot attach anywhere.
///
/// All variants are programmer-usage errors; the adapter cannot recover from
/// them. Inside a suite or case body they are normally lifted into the body's
/// `anyhow::Result` with `?`, which makes the enclosing step fail and gets
/// the mistake reported by the host like any other test failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeclareError {
    /// A declaration needed an enclosing suite and found none, e.g. `it()`
    /// at the top level.
    #[error("no active suite context")]
    NoActiveContext,

    /// `describe()` or `it()` was called while a test case body is running.
    #[error("cannot declare suites or cases inside a running test case")]
    InvalidNesting,

    /// Top-level `describe()` was called outside `with_host`, so there is
    /// no runner to register the suite on.
    #[error("no test host bound in the current declaration scope")]
    NoBoundHost,
}
