//! What the renderer sees: catalog items turned into map items, the
//! workbench of active items, and the viewer tying them to the timeline.

pub mod catalog_item;
pub mod layer;
pub mod viewer;
pub mod workbench;

pub use catalog_item::*;
pub use layer::*;
pub use viewer::*;
pub use workbench::*;
