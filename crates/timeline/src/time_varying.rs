use std::rc::Rc;

use catalog::{
    CommonStrata, Model, ModelError, Registry, TraitSchema, catalog_member_traits, names,
    time_varying_traits,
};
use foundation::ids::ModelId;
use foundation::time::Time;
use runtime::action;

use crate::clock::ClockDefinition;

/// An item that can drive the shared clock.
pub trait TimeVarying {
    fn id(&self) -> ModelId;

    /// `None` when the item has no notion of time.
    fn clock_definition(&self) -> Option<ClockDefinition>;

    /// Writes the clock's position back into the item.
    fn sync_clock_state(&self, stratum: &str, current: Time, is_paused: bool)
    -> Result<(), ModelError>;
}

impl TimeVarying for Model {
    fn id(&self) -> ModelId {
        self.unique_id().clone()
    }

    fn clock_definition(&self) -> Option<ClockDefinition> {
        if !self.schema().contains(names::CURRENT_TIME) {
            return None;
        }
        let time = |name: &str| {
            self.get::<String>(name)
                .and_then(|iso| Time::from_iso8601(&iso))
        };
        Some(ClockDefinition {
            start: time(names::START_TIME),
            stop: time(names::STOP_TIME),
            current: time(names::CURRENT_TIME),
            multiplier: self.get::<f64>(names::MULTIPLIER).unwrap_or(1.0),
            is_paused: self.get::<bool>(names::IS_PAUSED).unwrap_or(true),
        })
    }

    fn sync_clock_state(
        &self,
        stratum: &str,
        current: Time,
        is_paused: bool,
    ) -> Result<(), ModelError> {
        action(|| {
            if let Some(iso) = current.to_iso8601() {
                self.set_trait(stratum, names::CURRENT_TIME, iso)?;
            }
            self.set_trait(stratum, names::IS_PAUSED, is_paused)
        })
    }
}

/// Somewhere to keep the synthetic item that holds the timeline open while
/// nothing time-varying is on the map.
pub trait PlaceholderRegistry {
    fn register_placeholder(&self) -> Result<Rc<dyn TimeVarying>, ModelError>;

    fn unregister_placeholder(&self, id: &ModelId);
}

pub const PLACEHOLDER_ID: &str = "__timeline-placeholder__";

pub fn placeholder_schema() -> TraitSchema {
    TraitSchema::new("timelinePlaceholder")
        .extend(catalog_member_traits())
        .extend(time_varying_traits())
}

impl PlaceholderRegistry for Registry {
    fn register_placeholder(&self) -> Result<Rc<dyn TimeVarying>, ModelError> {
        let id = ModelId::from(PLACEHOLDER_ID);
        if let Some(existing) = runtime::untracked(|| self.get_model_by_id(&id)) {
            return Ok(Rc::new(existing));
        }
        let model = Model::new(id, Rc::new(placeholder_schema()));
        model.set_trait(CommonStrata::DEFAULTS, names::NAME, "Timeline")?;
        self.add_model(model.clone())?;
        Ok(Rc::new(model))
    }

    fn unregister_placeholder(&self, id: &ModelId) {
        self.remove_model(id);
    }
}
