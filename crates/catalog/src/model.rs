use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use foundation::ids::ModelId;
use runtime::{Atom, action};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ModelError;
use crate::merge;
use crate::strata::{StratumRank, stratum_rank};
use crate::stratum::Stratum;
use crate::traits::TraitSchema;

struct ModelCore {
    unique_id: ModelId,
    schema: Rc<TraitSchema>,
    strata: RefCell<BTreeMap<String, Rc<Stratum>>>,
    // Changes when strata are created or removed.
    strata_atom: Atom,
    // Per trait: changes when some stratum starts holding it.
    presence: RefCell<BTreeMap<String, Atom>>,
}

/// A catalog model: an id, a schema and the strata holding its trait values.
///
/// `Model` is a cheap handle; clones refer to the same model. Strata are
/// owned by the model and dropped with it.
#[derive(Clone)]
pub struct Model(Rc<ModelCore>);

impl Model {
    pub fn new(unique_id: impl Into<ModelId>, schema: Rc<TraitSchema>) -> Self {
        let unique_id = unique_id.into();
        let strata_atom = Atom::new(format!("{unique_id}.strata"));
        Model(Rc::new(ModelCore {
            unique_id,
            schema,
            strata: RefCell::new(BTreeMap::new()),
            strata_atom,
            presence: RefCell::new(BTreeMap::new()),
        }))
    }

    pub fn unique_id(&self) -> &ModelId {
        &self.0.unique_id
    }

    pub fn type_name(&self) -> &str {
        self.0.schema.type_name()
    }

    pub fn schema(&self) -> &Rc<TraitSchema> {
        &self.0.schema
    }

    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Writes `value` for `trait_name` into `stratum`, creating the stratum
    /// on first write.
    pub fn set_trait(
        &self,
        stratum: &str,
        trait_name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ModelError> {
        stratum_rank(stratum)?;
        self.check_trait(trait_name)?;
        let value = value.into();
        action(|| {
            let target = self.ensure_stratum(stratum);
            let appeared = !target.holds(trait_name);
            target.set(trait_name, Some(value));
            if appeared {
                self.presence_atom(trait_name).report_changed();
            }
        });
        Ok(())
    }

    /// Removes the value for `trait_name` from `stratum`, if any.
    pub fn clear_trait(&self, stratum: &str, trait_name: &str) -> Result<(), ModelError> {
        stratum_rank(stratum)?;
        self.check_trait(trait_name)?;
        let existing = self.0.strata.borrow().get(stratum).cloned();
        if let Some(existing) = existing {
            action(|| existing.set(trait_name, None));
        }
        Ok(())
    }

    /// The raw value stored in exactly one stratum.
    pub fn get_trait(&self, stratum: &str, trait_name: &str) -> Option<Value> {
        self.presence_atom(trait_name).report_observed();
        let stratum = self.0.strata.borrow().get(stratum).cloned()?;
        stratum.get(trait_name)
    }

    /// The resolved value of `trait_name` across all strata, falling back to
    /// the schema default. Undeclared traits resolve to `None`.
    pub fn trait_value(&self, trait_name: &str) -> Option<Value> {
        let def = self.0.schema.get(trait_name)?;
        // Strata already holding the trait are tracked per trait; `presence`
        // covers strata that start holding it later.
        self.presence_atom(trait_name).report_observed();
        let layers: Vec<Value> = self
            .ranked_strata()
            .iter()
            .filter_map(|s| s.get(trait_name))
            .collect();
        merge::resolve(&def.kind, &layers).or_else(|| def.default.clone())
    }

    /// Typed read of the resolved value. A value of the wrong shape reads as
    /// `None`.
    pub fn get<T: DeserializeOwned>(&self, trait_name: &str) -> Option<T> {
        let value = self.trait_value(trait_name)?;
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(err) => {
                tracing::warn!(
                    model = %self.0.unique_id,
                    trait_name,
                    "trait value has an unexpected shape: {err}"
                );
                None
            }
        }
    }

    /// The model's strata, highest precedence first.
    pub fn strata_top_to_bottom(&self) -> Vec<Rc<Stratum>> {
        self.0.strata_atom.report_observed();
        self.ranked_strata()
    }

    fn ranked_strata(&self) -> Vec<Rc<Stratum>> {
        let mut ranked: Vec<(StratumRank, Rc<Stratum>)> = self
            .0
            .strata
            .borrow()
            .iter()
            .filter_map(|(name, s)| stratum_rank(name).ok().map(|r| (r, s.clone())))
            .collect();
        ranked.sort_by(|(a, _), (b, _)| b.cmp(a));
        ranked.into_iter().map(|(_, s)| s).collect()
    }

    pub fn stratum_names(&self) -> Vec<String> {
        self.strata_top_to_bottom()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn stratum(&self, name: &str) -> Option<Rc<Stratum>> {
        self.0.strata_atom.report_observed();
        self.0.strata.borrow().get(name).cloned()
    }

    /// Drops a whole stratum. Returns `true` if it existed.
    pub fn remove_stratum(&self, name: &str) -> bool {
        let removed = self.0.strata.borrow_mut().remove(name);
        let Some(removed) = removed else {
            return false;
        };
        action(|| {
            // Readers subscribed to individual traits must see them vanish.
            removed.replace_all(BTreeMap::new());
            self.0.strata_atom.report_changed();
        });
        true
    }

    /// Replaces every value in `stratum` at once. Values must already be
    /// validated against the schema.
    pub(crate) fn replace_stratum(&self, stratum: &str, values: BTreeMap<String, Value>) {
        action(|| {
            let target = self.ensure_stratum(stratum);
            let appeared: Vec<String> = values
                .keys()
                .filter(|name| !target.holds(name))
                .cloned()
                .collect();
            target.replace_all(values);
            for trait_name in &appeared {
                self.presence_atom(trait_name).report_changed();
            }
        });
    }

    pub(crate) fn check_trait(&self, trait_name: &str) -> Result<(), ModelError> {
        if self.0.schema.contains(trait_name) {
            Ok(())
        } else {
            Err(ModelError::UnknownTrait {
                model_type: self.type_name().to_string(),
                trait_name: trait_name.to_string(),
            })
        }
    }

    fn ensure_stratum(&self, name: &str) -> Rc<Stratum> {
        if let Some(existing) = self.0.strata.borrow().get(name) {
            return existing.clone();
        }
        let created = Rc::new(Stratum::new(self.0.unique_id.as_str(), name));
        self.0
            .strata
            .borrow_mut()
            .insert(name.to_string(), created.clone());
        self.0.strata_atom.report_changed();
        created
    }

    fn presence_atom(&self, trait_name: &str) -> Atom {
        self.0
            .presence
            .borrow_mut()
            .entry(trait_name.to_string())
            .or_insert_with(|| Atom::new(format!("{}.{trait_name}.present", self.0.unique_id)))
            .clone()
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("id", &self.0.unique_id)
            .field("type", &self.type_name())
            .finish()
    }
}
