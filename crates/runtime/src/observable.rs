use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::atom::Atom;

/// A tracked mutable value.
///
/// Clones share the same cell. Reads inside a computed or reaction subscribe
/// it to this value; writes invalidate every subscriber.
pub struct Observable<T> {
    atom: Atom,
    value: Rc<RefCell<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            atom: self.atom.clone(),
            value: self.value.clone(),
        }
    }
}

impl<T: 'static> Observable<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        Self {
            atom: Atom::new(name),
            value: Rc::new(RefCell::new(value)),
        }
    }

    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    /// Borrows the value, recording the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.atom.report_observed();
        f(&self.value.borrow())
    }

    pub fn with_untracked<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }

    /// Mutates the value in place and always notifies subscribers.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let out = f(&mut self.value.borrow_mut());
        self.atom.report_changed();
        out
    }

    pub fn replace(&self, value: T) -> T {
        self.update(|v| std::mem::replace(v, value))
    }
}

impl<T: Clone + 'static> Observable<T> {
    pub fn get(&self) -> T {
        self.with(T::clone)
    }

    pub fn get_untracked(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Observable<T> {
    /// Stores `value`, notifying only if it differs from the current one.
    ///
    /// Returns `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        if *self.value.borrow() == value {
            return false;
        }
        *self.value.borrow_mut() = value;
        self.atom.report_changed();
        true
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("name", &self.atom.name())
            .field("value", &*self.value.borrow())
            .finish()
    }
}
