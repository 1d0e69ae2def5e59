use std::cell::RefCell;
use std::collections::BTreeMap;

use foundation::ids::ModelId;
use runtime::{Atom, action};

use crate::error::ModelError;
use crate::model::Model;

/// Every model known to one viewer, by id.
///
/// Membership is observable: adding or removing a model re-runs derivations
/// that looked models up.
pub struct Registry {
    models: RefCell<BTreeMap<ModelId, Model>>,
    atom: Atom,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            models: RefCell::new(BTreeMap::new()),
            atom: Atom::new("registry.models"),
        }
    }

    pub fn add_model(&self, model: Model) -> Result<(), ModelError> {
        let id = model.unique_id().clone();
        {
            let mut models = self.models.borrow_mut();
            if models.contains_key(&id) {
                return Err(ModelError::DuplicateModel(id));
            }
            models.insert(id.clone(), model);
        }
        tracing::debug!(model = %id, "model added");
        action(|| self.atom.report_changed());
        Ok(())
    }

    /// Returns the removed model, if it was registered.
    pub fn remove_model(&self, id: &ModelId) -> Option<Model> {
        let removed = self.models.borrow_mut().remove(id)?;
        tracing::debug!(model = %id, "model removed");
        action(|| self.atom.report_changed());
        Some(removed)
    }

    pub fn get_model_by_id(&self, id: &ModelId) -> Option<Model> {
        self.atom.report_observed();
        self.models.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &ModelId) -> bool {
        self.atom.report_observed();
        self.models.borrow().contains_key(id)
    }

    pub fn model_ids(&self) -> Vec<ModelId> {
        self.atom.report_observed();
        self.models.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.atom.report_observed();
        self.models.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The member models of `group`, in merged member order.
    pub fn resolve_members(&self, group: &Model) -> Result<Vec<Model>, ModelError> {
        group
            .members()
            .into_iter()
            .map(|member| {
                self.get_model_by_id(&member)
                    .ok_or_else(|| ModelError::InvalidReference {
                        group: group.unique_id().clone(),
                        member,
                    })
            })
            .collect()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.models.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}
