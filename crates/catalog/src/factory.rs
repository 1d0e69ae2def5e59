use std::collections::BTreeMap;
use std::rc::Rc;

use foundation::ids::ModelId;

use crate::error::ModelError;
use crate::model::Model;
use crate::traits::{TraitSchema, group_schema, imagery_schema};

/// Maps catalog `type` names to schemas.
#[derive(Debug, Default, Clone)]
pub struct ModelFactory {
    types: BTreeMap<String, Rc<TraitSchema>>,
}

impl ModelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that knows `group` and `imagery`.
    pub fn with_standard_types() -> Self {
        let mut factory = Self::new();
        factory.register(group_schema());
        factory.register(imagery_schema());
        factory
    }

    /// Registers `schema` under its type name, replacing any earlier one.
    pub fn register(&mut self, schema: TraitSchema) {
        self.types
            .insert(schema.type_name().to_string(), Rc::new(schema));
    }

    pub fn schema(&self, type_name: &str) -> Option<Rc<TraitSchema>> {
        self.types.get(type_name).cloned()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn create(&self, type_name: &str, id: impl Into<ModelId>) -> Result<Model, ModelError> {
        let schema = self
            .schema(type_name)
            .ok_or_else(|| ModelError::UnknownModelType(type_name.to_string()))?;
        Ok(Model::new(id, schema))
    }
}
