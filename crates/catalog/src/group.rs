use foundation::ids::ModelId;
use serde_json::Value;

use crate::error::ModelError;
use crate::model::Model;
use crate::traits::{TraitKind, names};

/// Group membership, for models whose schema declares a `members` trait.
impl Model {
    pub fn is_group(&self) -> bool {
        self.schema()
            .get(names::MEMBERS)
            .is_some_and(|def| def.kind == TraitKind::ModelReferenceArray)
    }

    /// The merged member list. Empty for non-groups.
    pub fn members(&self) -> Vec<ModelId> {
        self.get::<Vec<ModelId>>(names::MEMBERS).unwrap_or_default()
    }

    /// Appends `child` to the members written into `stratum`.
    pub fn add_member(&self, stratum: &str, child: &ModelId) -> Result<(), ModelError> {
        let mut written = self.written_members(stratum);
        if written.contains(child) {
            return Ok(());
        }
        written.push(child.clone());
        self.set_members(stratum, written)
    }

    /// Removes `child` from the members written into `stratum`. Returns
    /// `false` if that stratum did not list it.
    pub fn remove_member(&self, stratum: &str, child: &ModelId) -> Result<bool, ModelError> {
        let mut written = self.written_members(stratum);
        let before = written.len();
        written.retain(|id| id != child);
        if written.len() == before {
            return Ok(false);
        }
        self.set_members(stratum, written)?;
        Ok(true)
    }

    /// Moves `child` to `new_index` within the members written into
    /// `stratum`. Other strata are left alone; the merged list follows. The
    /// index is clamped to that stratum's list.
    pub fn move_member_to_index(
        &self,
        stratum: &str,
        child: &ModelId,
        new_index: usize,
    ) -> Result<(), ModelError> {
        let mut members = self.written_members(stratum);
        let Some(current) = members.iter().position(|id| id == child) else {
            return Err(ModelError::InvalidReference {
                group: self.unique_id().clone(),
                member: child.clone(),
            });
        };
        let target = new_index.min(members.len() - 1);
        if target == current {
            return Ok(());
        }
        let moved = members.remove(current);
        members.insert(target, moved);
        self.set_members(stratum, members)
    }

    fn written_members(&self, stratum: &str) -> Vec<ModelId> {
        self.get_trait(stratum, names::MEMBERS)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }

    fn set_members(&self, stratum: &str, members: Vec<ModelId>) -> Result<(), ModelError> {
        let list: Vec<Value> = members
            .into_iter()
            .map(|id| Value::String(id.as_str().to_string()))
            .collect();
        self.set_trait(stratum, names::MEMBERS, list)
    }
}
