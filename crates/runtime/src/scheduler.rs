use std::cell::RefCell;
use std::rc::Rc;

/// Something the scheduler can run once pending work is flushed.
pub(crate) trait Runnable {
    fn run(&self);
    /// Called when a pending run is dropped without running.
    fn unschedule(&self);
}

/// Upper bound on flush passes before pending reactions are dropped.
///
/// A reaction that keeps invalidating itself would otherwise spin forever.
pub const MAX_REACTION_ITERATIONS: usize = 100;

#[derive(Default)]
struct Scheduler {
    depth: u32,
    running: bool,
    next_order: u64,
    pending: Vec<(u64, Rc<dyn Runnable>)>,
}

thread_local! {
    static SCHEDULER: RefCell<Scheduler> = RefCell::new(Scheduler::default());
}

/// Runs `f` as one atomic unit of mutation.
///
/// Reactions invalidated by writes inside `f` are queued and run only after
/// the outermost action returns, so no reaction observes a half-applied
/// update. Actions nest.
pub fn action<R>(f: impl FnOnce() -> R) -> R {
    let out = {
        let _depth = DepthGuard::enter();
        f()
    };
    if !in_action() {
        run_pending();
    }
    out
}

/// Returns `true` inside an action.
pub fn in_action() -> bool {
    SCHEDULER.with(|s| s.borrow().depth > 0)
}

/// Queues `runnable`; runs the queue immediately when outside any action.
pub(crate) fn schedule(runnable: Rc<dyn Runnable>) {
    let idle = SCHEDULER.with(|s| {
        let mut s = s.borrow_mut();
        let order = s.next_order;
        s.next_order = s.next_order.wrapping_add(1);
        s.pending.push((order, runnable));
        s.depth == 0
    });
    if idle {
        run_pending();
    }
}

fn take_pending() -> Vec<(u64, Rc<dyn Runnable>)> {
    SCHEDULER.with(|s| std::mem::take(&mut s.borrow_mut().pending))
}

/// Flushes queued reactions in insertion order.
///
/// Reactions may schedule further reactions; those run in later passes of
/// the same flush. Re-entrant calls return immediately.
fn run_pending() {
    let already_running = SCHEDULER.with(|s| std::mem::replace(&mut s.borrow_mut().running, true));
    if already_running {
        return;
    }
    let _running = RunningGuard;

    for _ in 0..MAX_REACTION_ITERATIONS {
        let mut batch = take_pending();
        if batch.is_empty() {
            return;
        }
        batch.sort_by_key(|(order, _)| *order);
        for (_order, runnable) in batch {
            runnable.run();
        }
    }

    let dropped = take_pending();
    if !dropped.is_empty() {
        tracing::error!(
            pending = dropped.len(),
            "reactions did not settle after {MAX_REACTION_ITERATIONS} passes; dropping them"
        );
        for (_order, runnable) in dropped {
            runnable.unschedule();
        }
    }
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        SCHEDULER.with(|s| s.borrow_mut().depth += 1);
        DepthGuard
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        SCHEDULER.with(|s| {
            let mut s = s.borrow_mut();
            s.depth = s.depth.saturating_sub(1);
        });
    }
}

struct RunningGuard;

impl Drop for RunningGuard {
    fn drop(&mut self) {
        SCHEDULER.with(|s| s.borrow_mut().running = false);
    }
}
