//! Stratified catalog models.
//!
//! A [`Model`] owns named strata of trait values. Reading a trait walks the
//! strata in the process-wide [`StratumOrder`] and returns the highest
//! defined value, merging array and object traits across strata. Strata fed
//! by asynchronous metadata loads are driven by [`LoadableStratum`].

pub mod error;
pub mod factory;
pub mod group;
pub mod json;
pub mod loadable;
pub mod merge;
pub mod model;
pub mod registry;
pub mod strata;
pub mod stratum;
pub mod traits;

pub use error::*;
pub use factory::*;
pub use json::*;
pub use loadable::*;
pub use model::*;
pub use registry::*;
pub use strata::*;
pub use stratum::*;
pub use traits::*;
