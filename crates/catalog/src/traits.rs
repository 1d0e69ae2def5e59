use std::collections::BTreeMap;

use serde_json::{Value, json};

/// How values of one trait combine across strata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraitKind {
    /// Highest stratum wins.
    Primitive,
    /// Highest stratum wins; arrays are not merged.
    PrimitiveArray,
    /// Field-wise recursive merge; higher fields win.
    Object,
    /// Entries keyed by `id_property`, scanned lowest stratum first. A higher
    /// entry with the same key replaces the lower one in place.
    ObjectArray { id_property: String },
    /// Model ids, scanned highest stratum first and de-duplicated, so the
    /// order written into a higher stratum wins.
    ModelReferenceArray,
}

impl TraitKind {
    pub fn is_mergeable(&self) -> bool {
        matches!(
            self,
            TraitKind::Object | TraitKind::ObjectArray { .. } | TraitKind::ModelReferenceArray
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraitDef {
    pub name: String,
    pub kind: TraitKind,
    /// Returned when no stratum defines the trait.
    pub default: Option<Value>,
    pub description: String,
}

impl TraitDef {
    fn new(name: &str, kind: TraitKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn primitive(name: &str, description: &str) -> Self {
        Self::new(name, TraitKind::Primitive, description)
    }

    pub fn primitive_array(name: &str, description: &str) -> Self {
        Self::new(name, TraitKind::PrimitiveArray, description)
    }

    pub fn object(name: &str, description: &str) -> Self {
        Self::new(name, TraitKind::Object, description)
    }

    pub fn object_array(name: &str, id_property: &str, description: &str) -> Self {
        Self::new(
            name,
            TraitKind::ObjectArray {
                id_property: id_property.to_string(),
            },
            description,
        )
    }

    pub fn model_references(name: &str, description: &str) -> Self {
        Self::new(name, TraitKind::ModelReferenceArray, description)
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// The set of traits a model type declares.
#[derive(Debug, Clone, PartialEq)]
pub struct TraitSchema {
    type_name: String,
    traits: BTreeMap<String, TraitDef>,
}

impl TraitSchema {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            traits: BTreeMap::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn with_trait(mut self, def: TraitDef) -> Self {
        self.traits.insert(def.name.clone(), def);
        self
    }

    pub fn extend(mut self, defs: impl IntoIterator<Item = TraitDef>) -> Self {
        for def in defs {
            self.traits.insert(def.name.clone(), def);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&TraitDef> {
        self.traits.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.traits.contains_key(name)
    }

    /// Declared traits in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TraitDef> {
        self.traits.values()
    }
}

/// Trait names shared by the standard trait sets.
pub mod names {
    pub const NAME: &str = "name";
    pub const DESCRIPTION: &str = "description";
    pub const INFO: &str = "info";
    pub const SHOW: &str = "show";
    pub const OPACITY: &str = "opacity";
    pub const URL: &str = "url";
    pub const RECTANGLE: &str = "rectangle";
    pub const START_TIME: &str = "startTime";
    pub const STOP_TIME: &str = "stopTime";
    pub const CURRENT_TIME: &str = "currentTime";
    pub const MULTIPLIER: &str = "multiplier";
    pub const IS_PAUSED: &str = "isPaused";
    pub const MEMBERS: &str = "members";
    pub const IS_OPEN: &str = "isOpen";
}

pub fn catalog_member_traits() -> Vec<TraitDef> {
    vec![
        TraitDef::primitive(names::NAME, "Display name."),
        TraitDef::primitive(names::DESCRIPTION, "Long description shown in the data catalogue."),
        TraitDef::object_array(names::INFO, "name", "Extra info sections, keyed by name."),
    ]
}

pub fn mappable_traits() -> Vec<TraitDef> {
    vec![
        TraitDef::primitive(names::SHOW, "Whether the item is shown on the map.").with_default(true),
        TraitDef::primitive(names::OPACITY, "Layer opacity in [0, 1].").with_default(0.8),
        TraitDef::primitive(names::URL, "Base URL of the service."),
        TraitDef::object(names::RECTANGLE, "Bounding rectangle in degrees.").with_default(json!({
            "west": -180.0,
            "south": -90.0,
            "east": 180.0,
            "north": 90.0
        })),
    ]
}

pub fn time_varying_traits() -> Vec<TraitDef> {
    vec![
        TraitDef::primitive(names::START_TIME, "Start of the time range (ISO-8601)."),
        TraitDef::primitive(names::STOP_TIME, "End of the time range (ISO-8601)."),
        TraitDef::primitive(names::CURRENT_TIME, "Current time (ISO-8601)."),
        TraitDef::primitive(names::MULTIPLIER, "Clock seconds per real second.").with_default(60.0),
        TraitDef::primitive(names::IS_PAUSED, "Whether time is paused.").with_default(true),
    ]
}

pub fn group_traits() -> Vec<TraitDef> {
    vec![
        TraitDef::model_references(names::MEMBERS, "Ids of the models in this group."),
        TraitDef::primitive(names::IS_OPEN, "Whether the group is expanded.").with_default(false),
    ]
}

/// Schema of a plain catalog group.
pub fn group_schema() -> TraitSchema {
    TraitSchema::new("group")
        .extend(catalog_member_traits())
        .extend(group_traits())
}

/// Schema of a time-aware imagery layer.
pub fn imagery_schema() -> TraitSchema {
    TraitSchema::new("imagery")
        .extend(catalog_member_traits())
        .extend(mappable_traits())
        .extend(time_varying_traits())
}
