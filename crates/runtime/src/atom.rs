use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::scheduler;

/// Something that caches or reacts to atoms and must hear when they change.
pub(crate) trait Derivation {
    fn on_becomes_stale(&self);
}

struct AtomCore {
    name: String,
    version: Cell<u64>,
    observers: RefCell<Vec<(u64, Weak<dyn Derivation>)>>,
}

/// The unit of change tracking.
///
/// An atom has no value of its own. Containers report reads through
/// [`Atom::report_observed`] and writes through [`Atom::report_changed`];
/// every write bumps a version counter so a derivation can tell whether
/// anything it read moved while it was still running.
#[derive(Clone)]
pub struct Atom(Rc<AtomCore>);

pub(crate) struct TrackedRead {
    atom: Atom,
    version: u64,
}

thread_local! {
    // One frame per running derivation. `None` marks an untracked region.
    static TRACKING: RefCell<Vec<Option<Vec<TrackedRead>>>> = const { RefCell::new(Vec::new()) };
    static NEXT_DERIVATION_ID: Cell<u64> = const { Cell::new(1) };
}

impl Atom {
    pub fn new(name: impl Into<String>) -> Self {
        Atom(Rc::new(AtomCore {
            name: name.into(),
            version: Cell::new(0),
            observers: RefCell::new(Vec::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn version(&self) -> u64 {
        self.0.version.get()
    }

    /// Number of live derivations currently subscribed to this atom.
    pub fn observer_count(&self) -> usize {
        self.0
            .observers
            .borrow()
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .count()
    }

    pub fn ptr_eq(&self, other: &Atom) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Records a read in the innermost tracking frame, if any.
    pub fn report_observed(&self) {
        TRACKING.with(|t| {
            if let Some(Some(frame)) = t.borrow_mut().last_mut() {
                frame.push(TrackedRead {
                    atom: self.clone(),
                    version: self.version(),
                });
            }
        });
    }

    /// Bumps the version and marks every observer stale.
    ///
    /// Observers are notified inside an action so reactions they schedule run
    /// only after the outermost action completes.
    pub fn report_changed(&self) {
        self.0.version.set(self.0.version.get().wrapping_add(1));
        let observers: Vec<Rc<dyn Derivation>> = self
            .0
            .observers
            .borrow()
            .iter()
            .filter_map(|(_, w)| w.upgrade())
            .collect();
        if observers.is_empty() {
            return;
        }
        scheduler::action(|| {
            for observer in observers {
                observer.on_becomes_stale();
            }
        });
    }

    fn subscribe(&self, id: u64, observer: Weak<dyn Derivation>) {
        let mut observers = self.0.observers.borrow_mut();
        if !observers.iter().any(|(i, _)| *i == id) {
            observers.push((id, observer));
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.0
            .observers
            .borrow_mut()
            .retain(|(i, w)| *i != id && w.strong_count() > 0);
    }
}

impl fmt::Debug for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Atom")
            .field("name", &self.0.name)
            .field("version", &self.version())
            .finish()
    }
}

/// Returns `true` while a computed or reaction is tracking reads.
pub fn is_observing() -> bool {
    TRACKING.with(|t| matches!(t.borrow().last(), Some(Some(_))))
}

/// Runs `f` without recording any of its reads in the enclosing derivation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    TRACKING.with(|t| t.borrow_mut().push(None));
    let _frame = FrameGuard;
    f()
}

/// Runs `f` in a fresh tracking frame and returns the reads it made.
pub(crate) fn track<R>(f: impl FnOnce() -> R) -> (R, Vec<TrackedRead>) {
    TRACKING.with(|t| t.borrow_mut().push(Some(Vec::new())));
    let frame = FrameGuard;
    let out = f();
    let reads = TRACKING
        .with(|t| t.borrow_mut().last_mut().and_then(Option::take))
        .unwrap_or_default();
    drop(frame);
    (out, reads)
}

struct FrameGuard;

impl Drop for FrameGuard {
    fn drop(&mut self) {
        TRACKING.with(|t| {
            t.borrow_mut().pop();
        });
    }
}

/// The subscription set of one derivation.
pub(crate) struct Dependencies {
    id: u64,
    atoms: RefCell<Vec<Atom>>,
}

impl Dependencies {
    pub(crate) fn new() -> Self {
        let id = NEXT_DERIVATION_ID.with(|n| {
            let id = n.get();
            n.set(id.wrapping_add(1));
            id
        });
        Self {
            id,
            atoms: RefCell::new(Vec::new()),
        }
    }

    /// Swaps the subscriptions for the atoms in `reads`.
    ///
    /// Returns `true` if any of those atoms changed after it was read, in
    /// which case the derivation already holds an outdated result.
    pub(crate) fn replace(&self, reads: Vec<TrackedRead>, observer: Weak<dyn Derivation>) -> bool {
        let mut changed = false;
        let mut next: Vec<Atom> = Vec::with_capacity(reads.len());
        for read in reads {
            if read.atom.version() != read.version {
                changed = true;
            }
            if !next.iter().any(|a| a.ptr_eq(&read.atom)) {
                next.push(read.atom);
            }
        }

        let previous = std::mem::take(&mut *self.atoms.borrow_mut());
        for atom in &previous {
            if !next.iter().any(|a| a.ptr_eq(atom)) {
                atom.unsubscribe(self.id);
            }
        }
        for atom in &next {
            atom.subscribe(self.id, observer.clone());
        }
        *self.atoms.borrow_mut() = next;
        changed
    }

    pub(crate) fn clear(&self) {
        let previous = std::mem::take(&mut *self.atoms.borrow_mut());
        for atom in previous {
            atom.unsubscribe(self.id);
        }
    }
}
