//! Pure trait resolution over stratum values.
//!
//! Every function takes the values one trait has in each stratum that
//! defines it, ordered highest precedence first, and returns the resolved
//! value. Nothing here touches reactive state.

use serde_json::{Map, Value};

use crate::traits::TraitKind;

pub fn resolve(kind: &TraitKind, top_to_bottom: &[Value]) -> Option<Value> {
    let top = top_to_bottom.first()?;
    let resolved = match kind {
        TraitKind::Primitive | TraitKind::PrimitiveArray => top.clone(),
        TraitKind::Object => merge_objects(top_to_bottom),
        TraitKind::ObjectArray { id_property } => merge_object_array(id_property, top_to_bottom),
        TraitKind::ModelReferenceArray => merge_references(top_to_bottom),
    };
    Some(resolved)
}

/// Overlays objects from the bottom up; a non-object top value wins as is.
fn merge_objects(top_to_bottom: &[Value]) -> Value {
    let Some(top) = top_to_bottom.first() else {
        return Value::Null;
    };
    if !top.is_object() {
        return top.clone();
    }
    let mut merged = Map::new();
    for layer in top_to_bottom.iter().rev() {
        if let Value::Object(fields) = layer {
            overlay(&mut merged, fields);
        }
    }
    Value::Object(merged)
}

fn overlay(base: &mut Map<String, Value>, top: &Map<String, Value>) {
    for (key, value) in top {
        match (base.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(fields)) => overlay(existing, fields),
            _ => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn identity(entry: &Value, id_property: &str) -> Option<String> {
    match entry.get(id_property)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn merge_object_array(id_property: &str, top_to_bottom: &[Value]) -> Value {
    let mut entries: Vec<(Option<String>, Value)> = Vec::new();
    for layer in top_to_bottom.iter().rev() {
        let Value::Array(items) = layer else {
            continue;
        };
        for item in items {
            let key = identity(item, id_property);
            let existing = key
                .as_ref()
                .and_then(|k| entries.iter().position(|(ek, _)| ek.as_ref() == Some(k)));
            match existing {
                Some(idx) => entries[idx].1 = item.clone(),
                None => entries.push((key, item.clone())),
            }
        }
    }
    Value::Array(entries.into_iter().map(|(_, v)| v).collect())
}

fn merge_references(top_to_bottom: &[Value]) -> Value {
    let mut ids: Vec<Value> = Vec::new();
    for layer in top_to_bottom {
        let Value::Array(items) = layer else {
            continue;
        };
        for item in items {
            if item.is_string() && !ids.contains(item) {
                ids.push(item.clone());
            }
        }
    }
    Value::Array(ids)
}
