pub mod ids;
pub mod time;

// Foundation crate: small, well-tested primitives only.
pub use ids::*;
pub use time::*;
