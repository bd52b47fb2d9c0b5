//! Suite evaluation and queue drain.
//!
//! A suite runs in two stages. First its body evaluates under the suite's
//! own scope, recording declarations; any asynchronous setup in the body is
//! awaited here. Second the recorded queue drains: each node is interpreted
//! in declaration order against the host's step API, fully awaited before
//! the next begins. Suite nodes recurse through a fresh child context; case
//! nodes flip the tree's phase to `Running` around the user body.
//!
//! A failure anywhere resolves the enclosing step's future as `Err`, which
//! halts the remaining queue and bubbles the error to the host.

use std::cell::Cell;
use std::rc::Rc;

use anyhow::Result;

use crate::context::{self, BodyFn, Decl, RunPhase, SuiteContext};
use crate::host::boxed_step;

/* ===================== Suite Evaluation ===================== */

/// Run one suite under `ctx`: evaluate `body` with the context as the
/// innermost scope, then drain the queue it recorded. The scope is restored
/// on every exit path; the drain is skipped when the body itself fails.
pub(crate) async fn run_suite(ctx: Rc<SuiteContext>, body: BodyFn) -> Result<()> {
    let drain_ctx = ctx.clone();
    context::enter_suite(ctx, async move {
        body().await?;
        drain(&drain_ctx).await
    })
    .await
}

/* ===================== Queue Drain ===================== */

/// Interpret the context's recorded declarations sequentially. The queue is
/// taken up front, so its contents are fixed when the drain starts. A
/// failing node stops the drain and the failure propagates to the caller.
async fn drain(ctx: &Rc<SuiteContext>) -> Result<()> {
    let queue = ctx.take_queue();
    tracing::debug!("draining {} declaration(s)", queue.len());
    for decl in queue {
        match decl {
            Decl::Case { name, body } => run_case(ctx, name, body).await?,
            Decl::Suite { name, body } => run_nested_suite(ctx, name, body).await?,
        }
    }
    Ok(())
}

/// Interpret one case node: register a host step that runs the user body
/// with the tree marked `Running` for exactly the body's lifetime.
async fn run_case(ctx: &Rc<SuiteContext>, name: String, body: BodyFn) -> Result<()> {
    let phase = ctx.phase_cell();
    let step = boxed_step(move |_handle| async move {
        let _running = PhaseGuard::enter(phase);
        body().await
    });
    ctx.handle().step(name, step).await
}

/// Interpret one suite node: register a host step whose callback evaluates
/// the nested body under a child context sharing this tree's phase, then
/// drains whatever it declared.
async fn run_nested_suite(ctx: &Rc<SuiteContext>, name: String, body: BodyFn) -> Result<()> {
    let phase = ctx.phase_cell();
    let step = boxed_step(move |child_handle| {
        run_suite(SuiteContext::child(child_handle, phase), body)
    });
    ctx.handle().step(name, step).await
}

/* ===================== Phase Guard ===================== */

/// Marks the tree `Running` while a case body executes and restores
/// `Declaring` on drop, so failures and cancellation cannot leave the
/// phase stuck.
struct PhaseGuard {
    phase: Rc<Cell<RunPhase>>,
}

impl PhaseGuard {
    fn enter(phase: Rc<Cell<RunPhase>>) -> Self {
        // Cases are only ever interpreted from a drain, never from inside
        // another case.
        debug_assert_eq!(phase.get(), RunPhase::Declaring);
        phase.set(RunPhase::Running);
        PhaseGuard { phase }
    }
}

impl Drop for PhaseGuard {
    fn drop(&mut self) {
        self.phase.set(RunPhase::Declaring);
    }
}

/* ===================== Tests ===================== */

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use crate::bdd::{describe, it, with_host};
    use crate::harness::{RecordingHost, StepEvent};

    #[test]
    fn test_phase_guard_restores_on_drop() {
        let phase = Rc::new(Cell::new(RunPhase::Declaring));
        {
            let _guard = PhaseGuard::enter(phase.clone());
            assert_eq!(phase.get(), RunPhase::Running);
        }
        assert_eq!(phase.get(), RunPhase::Declaring);
    }

    #[tokio::test]
    async fn test_drain_halts_after_first_failure() {
        let ran_third = Rc::new(Cell::new(false));
        let host = RecordingHost::new();
        with_host(Rc::new(host.clone()), || {
            let ran_third = ran_third.clone();
            describe("halts", move || async move {
                it("first", || async { Ok(()) })?;
                it("second", || async { anyhow::bail!("second blew up") })?;
                it("third", {
                    let ran_third = ran_third.clone();
                    move || async move {
                        ran_third.set(true);
                        Ok(())
                    }
                })?;
                Ok(())
            })
        })
        .unwrap();

        assert!(host.run_all().await.is_err());
        assert!(!ran_third.get());

        let events = host.events();
        assert!(events.contains(&StepEvent::StepPassed {
            path: "halts/first".into()
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            StepEvent::StepFailed { path, .. } if path == "halts/second"
        )));
        assert!(!events.iter().any(|e| matches!(
            e,
            StepEvent::StepStarted { path } if path == "halts/third"
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            StepEvent::TestFailed { name, .. } if name == "halts"
        )));
    }

    #[tokio::test]
    async fn test_failing_body_skips_drain() {
        let ran_case = Rc::new(Cell::new(false));
        let host = RecordingHost::new();
        with_host(Rc::new(host.clone()), || {
            let ran_case = ran_case.clone();
            describe("broken setup", move || async move {
                it("never runs", {
                    let ran_case = ran_case.clone();
                    move || async move {
                        ran_case.set(true);
                        Ok(())
                    }
                })?;
                anyhow::bail!("setup failed");
            })
        })
        .unwrap();

        assert!(host.run_all().await.is_err());
        assert!(!ran_case.get());

        let events = host.events();
        assert!(!events
            .iter()
            .any(|e| matches!(e, StepEvent::StepStarted { .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            StepEvent::TestFailed { name, error } if name == "broken setup" && error.contains("setup failed")
        )));
    }

    #[tokio::test]
    async fn test_nested_suite_bodies_evaluate_during_parent_drain() {
        let marks: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));
        let host = RecordingHost::new();
        with_host(Rc::new(host.clone()), || {
            let marks = marks.clone();
            describe("parent", move || async move {
                describe("child", {
                    let marks = marks.clone();
                    move || async move {
                        marks.borrow_mut().push("child-body");
                        it("case", {
                            let marks = marks.clone();
                            move || async move {
                                marks.borrow_mut().push("child-case");
                                Ok(())
                            }
                        })?;
                        Ok(())
                    }
                })?;
                it("tail", {
                    let marks = marks.clone();
                    move || async move {
                        marks.borrow_mut().push("tail-case");
                        Ok(())
                    }
                })?;
                marks.borrow_mut().push("parent-body");
                Ok(())
            })
        })
        .unwrap();

        host.run_all().await.unwrap();
        assert_eq!(
            *marks.borrow(),
            ["parent-body", "child-body", "child-case", "tail-case"]
        );
    }
}
