//! Catalog JSON in and out of models.

use foundation::ids::ModelId;
use runtime::action;
use serde_json::{Map, Value};

use crate::error::ModelError;
use crate::factory::ModelFactory;
use crate::model::Model;
use crate::registry::Registry;
use crate::strata::stratum_rank;
use crate::traits::names;

const ID_KEY: &str = "id";
const TYPE_KEY: &str = "type";

/// A model created or updated from JSON, with the keys its type ignored.
#[derive(Debug)]
pub struct Upserted {
    pub model: Model,
    pub skipped: Vec<(ModelId, String)>,
}

/// Writes every trait found in `json` into `stratum` in one action.
///
/// Returns the keys that are not traits of the model's type.
pub fn update_model_from_json(
    model: &Model,
    stratum: &str,
    json: &Value,
) -> Result<Vec<String>, ModelError> {
    let object = as_object(json)?;
    stratum_rank(stratum)?;

    let mut skipped = Vec::new();
    let mut known = Vec::new();
    for (key, value) in object {
        if key == ID_KEY || key == TYPE_KEY {
            continue;
        }
        if model.schema().contains(key) {
            known.push((key.as_str(), value.clone()));
        } else {
            tracing::warn!(model = %model.unique_id(), key = %key, "ignoring unknown catalog key");
            skipped.push(key.clone());
        }
    }
    action(|| {
        known
            .into_iter()
            .try_for_each(|(key, value)| model.set_trait(stratum, key, value))
    })?;
    Ok(skipped)
}

/// Creates or updates the model described by `json` and, for groups, every
/// member described inline.
///
/// The id is `json.id`, or `<parent>/<name>` when absent. Inline member
/// objects are upserted recursively; string members are kept as ids.
pub fn upsert_model_from_json(
    factory: &ModelFactory,
    registry: &Registry,
    parent: Option<&ModelId>,
    stratum: &str,
    json: &Value,
) -> Result<Upserted, ModelError> {
    let mut skipped = Vec::new();
    let model = action(|| upsert(factory, registry, parent, stratum, json, &mut skipped))?;
    Ok(Upserted { model, skipped })
}

fn upsert(
    factory: &ModelFactory,
    registry: &Registry,
    parent: Option<&ModelId>,
    stratum: &str,
    json: &Value,
    skipped: &mut Vec<(ModelId, String)>,
) -> Result<Model, ModelError> {
    let object = as_object(json)?;
    let type_name = object
        .get(TYPE_KEY)
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidJson("catalog entry has no `type`".to_string()))?;
    let id = entry_id(object, parent)?;

    let model = match registry.get_model_by_id(&id) {
        Some(existing) if existing.type_name() != type_name => {
            return Err(ModelError::InvalidJson(format!(
                "`{id}` is already a `{}`, not a `{type_name}`",
                existing.type_name()
            )));
        }
        Some(existing) => existing,
        None => {
            let created = factory.create(type_name, id.clone())?;
            registry.add_model(created.clone())?;
            created
        }
    };

    let mut fields = object.clone();
    if model.is_group()
        && let Some(members) = fields.remove(names::MEMBERS)
    {
        let Value::Array(entries) = members else {
            return Err(ModelError::InvalidJson(format!("`{id}.members` must be an array")));
        };
        let mut member_ids = Vec::with_capacity(entries.len());
        for entry in &entries {
            let member = match entry {
                Value::String(member) => ModelId::from(member.as_str()),
                Value::Object(_) => {
                    upsert(factory, registry, Some(&id), stratum, entry, skipped)?
                        .unique_id()
                        .clone()
                }
                other => {
                    return Err(ModelError::InvalidJson(format!(
                        "`{id}.members` entries must be ids or objects, found {other}"
                    )));
                }
            };
            member_ids.push(Value::String(member.as_str().to_string()));
        }
        model.set_trait(stratum, names::MEMBERS, member_ids)?;
    }

    let ignored = update_model_from_json(&model, stratum, &Value::Object(fields))?;
    skipped.extend(ignored.into_iter().map(|key| (id.clone(), key)));
    Ok(model)
}

fn entry_id(object: &Map<String, Value>, parent: Option<&ModelId>) -> Result<ModelId, ModelError> {
    if let Some(id) = object.get(ID_KEY).and_then(Value::as_str) {
        return Ok(ModelId::from(id));
    }
    let name = object
        .get(names::NAME)
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::InvalidJson("catalog entry needs an `id` or a `name`".to_string()))?;
    Ok(match parent {
        Some(parent) => parent.child(name),
        None => ModelId::from(name),
    })
}

fn as_object(json: &Value) -> Result<&Map<String, Value>, ModelError> {
    json.as_object()
        .ok_or_else(|| ModelError::InvalidJson(format!("expected an object, found {json}")))
}

/// The raw values of one stratum, as a JSON object.
pub fn stratum_to_json(model: &Model, stratum: &str) -> Value {
    let values = model
        .stratum(stratum)
        .map(|s| s.snapshot())
        .unwrap_or_default();
    Value::Object(values.into_iter().collect())
}

/// The model's id, type and the resolved value of every declared trait.
pub fn model_to_json(model: &Model) -> Value {
    let mut object = Map::new();
    object.insert(ID_KEY.to_string(), Value::String(model.unique_id().to_string()));
    object.insert(TYPE_KEY.to_string(), Value::String(model.type_name().to_string()));
    for def in model.schema().iter() {
        if let Some(value) = model.trait_value(&def.name) {
            object.insert(def.name.clone(), value);
        }
    }
    Value::Object(object)
}
