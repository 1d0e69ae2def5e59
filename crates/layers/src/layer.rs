use catalog::LoadPromise;
use foundation::ids::ModelId;
use serde::{Deserialize, Serialize};

/// Bounding rectangle in degrees.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageryParts {
    pub url: String,
    pub opacity: f64,
    pub rectangle: Option<Rectangle>,
}

/// A renderer-facing description of one piece of a layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MapItem {
    Imagery(ImageryParts),
    /// Vector data the renderer loads itself, by source url.
    DataSource { name: String, url: String },
}

/// Anything that can put items on the map.
pub trait Mappable {
    fn id(&self) -> ModelId;

    /// The current map items. Reactive: triggers any needed metadata load and
    /// is empty while it runs.
    fn map_items(&self) -> Vec<MapItem>;

    /// Resolves once the metadata behind `map_items` has been loaded.
    fn load_map_items(&self) -> LoadPromise;
}
