//! The timeline stack and its shared clock.

pub mod clock;
pub mod stack;
pub mod time_varying;

pub use clock::*;
pub use stack::*;
pub use time_varying::*;
