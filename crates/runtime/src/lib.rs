//! Single-threaded reactive substrate.
//!
//! State lives in [`Observable`]s. Derived values are [`Computed`] and side
//! effects are reactions ([`autorun`], [`reaction`]). Reads made while a
//! derivation runs are tracked; writes mark dependents stale. Writes are
//! grouped by [`action`] and reactions only run once the outermost action
//! has finished.

pub mod atom;
pub mod computed;
pub mod executor;
pub mod observable;
pub mod reaction;
pub mod scheduler;

pub use atom::{Atom, is_observing, untracked};
pub use computed::*;
pub use executor::*;
pub use observable::*;
pub use reaction::*;
pub use scheduler::{action, in_action};
