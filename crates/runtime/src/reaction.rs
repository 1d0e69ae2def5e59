use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::atom::{self, Dependencies, Derivation};
use crate::scheduler::{self, Runnable};

struct ReactionCore {
    name: String,
    deps: Dependencies,
    effect: RefCell<Box<dyn FnMut()>>,
    scheduled: Cell<bool>,
    disposed: Cell<bool>,
    this: Weak<ReactionCore>,
}

impl ReactionCore {
    fn schedule(&self) {
        if self.disposed.get() || self.scheduled.replace(true) {
            return;
        }
        if let Some(this) = self.this.upgrade() {
            scheduler::schedule(this);
        }
    }
}

impl Derivation for ReactionCore {
    fn on_becomes_stale(&self) {
        self.schedule();
    }
}

impl Runnable for ReactionCore {
    fn run(&self) {
        if self.disposed.get() || !self.scheduled.replace(false) {
            return;
        }
        let Ok(mut effect) = self.effect.try_borrow_mut() else {
            tracing::warn!(reaction = %self.name, "reaction re-entered while running; skipped");
            return;
        };
        let ((), reads) = atom::track(|| (*effect)());
        drop(effect);

        let this: Weak<dyn Derivation> = self.this.clone();
        if self.deps.replace(reads, this) {
            self.schedule();
        }
    }

    fn unschedule(&self) {
        self.scheduled.set(false);
    }
}

/// Owner of a running reaction. Dropping it disposes the reaction.
#[must_use = "dropping a ReactionHandle disposes the reaction"]
pub struct ReactionHandle(Rc<ReactionCore>);

impl ReactionHandle {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn dispose(self) {}
}

impl Drop for ReactionHandle {
    fn drop(&mut self) {
        self.0.disposed.set(true);
        self.0.deps.clear();
    }
}

impl std::fmt::Debug for ReactionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReactionHandle").field(&self.0.name).finish()
    }
}

/// Runs `effect` now (or at the end of the current action) and again after
/// every change to anything it read.
pub fn autorun(name: impl Into<String>, effect: impl FnMut() + 'static) -> ReactionHandle {
    let core = Rc::new_cyclic(|this| ReactionCore {
        name: name.into(),
        deps: Dependencies::new(),
        effect: RefCell::new(Box::new(effect)),
        scheduled: Cell::new(false),
        disposed: Cell::new(false),
        this: this.clone(),
    });
    core.schedule();
    ReactionHandle(core)
}

/// Tracks `expression` and calls `effect` whenever its value changes.
///
/// The effect does not run for the initial value and its own reads are not
/// tracked.
pub fn reaction<T: PartialEq + Clone + 'static>(
    name: impl Into<String>,
    expression: impl Fn() -> T + 'static,
    mut effect: impl FnMut(&T) + 'static,
) -> ReactionHandle {
    let mut previous: Option<T> = None;
    autorun(name, move || {
        let value = expression();
        if previous.as_ref().is_some_and(|p| *p != value) {
            atom::untracked(|| effect(&value));
        }
        previous = Some(value);
    })
}
