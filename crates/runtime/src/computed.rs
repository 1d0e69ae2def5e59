use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::atom::{self, Atom, Dependencies, Derivation};

/// A cached derived value.
///
/// The value is computed lazily on first read and cached. Any write to
/// something the computation read marks it stale; the next read recomputes.
/// Subscriptions are kept while the computed is alive, so a cached value
/// never survives a change to its inputs.
pub struct Computed<T>(Rc<ComputedCore<T>>);

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Computed(self.0.clone())
    }
}

struct ComputedCore<T> {
    atom: Atom,
    deps: Dependencies,
    value: RefCell<Option<T>>,
    stale: Cell<bool>,
    compute: Box<dyn Fn() -> T>,
    this: Weak<ComputedCore<T>>,
}

impl<T: Clone + 'static> Computed<T> {
    pub fn new(name: impl Into<String>, compute: impl Fn() -> T + 'static) -> Self {
        Computed(Rc::new_cyclic(|this| ComputedCore {
            atom: Atom::new(name),
            deps: Dependencies::new(),
            value: RefCell::new(None),
            stale: Cell::new(true),
            compute: Box::new(compute),
            this: this.clone(),
        }))
    }

    pub fn name(&self) -> &str {
        self.0.atom.name()
    }

    /// Returns the current value, recomputing it first if stale.
    pub fn get(&self) -> T {
        self.0.atom.report_observed();
        match self.0.fresh() {
            Some(value) => value,
            None => self.0.recompute(),
        }
    }

    pub fn is_stale(&self) -> bool {
        self.0.stale.get()
    }
}

impl<T: Clone + 'static> ComputedCore<T> {
    fn fresh(&self) -> Option<T> {
        if self.stale.get() {
            return None;
        }
        self.value.borrow().clone()
    }

    fn recompute(&self) -> T {
        self.stale.set(false);
        let (value, reads) = atom::track(|| (self.compute)());
        let this: Weak<dyn Derivation> = self.this.clone();
        let changed = self.deps.replace(reads, this);
        *self.value.borrow_mut() = Some(value.clone());
        if changed {
            // An input moved while we were computing: the cached value is
            // already outdated.
            self.on_becomes_stale();
        }
        value
    }
}

impl<T> Derivation for ComputedCore<T> {
    fn on_becomes_stale(&self) {
        if !self.stale.replace(true) {
            self.atom.report_changed();
        }
    }
}

impl<T> Drop for ComputedCore<T> {
    fn drop(&mut self) {
        self.deps.clear();
    }
}

impl<T> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("name", &self.0.atom.name())
            .field("stale", &self.0.stale.get())
            .finish()
    }
}
