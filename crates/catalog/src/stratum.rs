use std::cell::RefCell;
use std::collections::BTreeMap;

use runtime::Atom;
use serde_json::Value;

/// One named layer of trait values.
///
/// Each trait has its own atom so a derivation only re-runs when a trait it
/// actually read changes. `shape` covers whole-bag reads.
pub struct Stratum {
    name: String,
    values: RefCell<BTreeMap<String, Value>>,
    atoms: RefCell<BTreeMap<String, Atom>>,
    shape: Atom,
}

impl Stratum {
    pub(crate) fn new(owner: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            values: RefCell::new(BTreeMap::new()),
            atoms: RefCell::new(BTreeMap::new()),
            shape: Atom::new(format!("{owner}.{name}")),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, trait_name: &str) -> Option<Value> {
        self.atom_for(trait_name).report_observed();
        self.values.borrow().get(trait_name).cloned()
    }

    /// Untracked membership test.
    pub(crate) fn holds(&self, trait_name: &str) -> bool {
        self.values.borrow().contains_key(trait_name)
    }

    pub fn is_empty(&self) -> bool {
        self.shape.report_observed();
        self.values.borrow().is_empty()
    }

    /// All values in this stratum, by trait name.
    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.shape.report_observed();
        self.values.borrow().clone()
    }

    /// Writes or (with `None`) clears one value. Callers wrap this in an
    /// action.
    pub(crate) fn set(&self, trait_name: &str, value: Option<Value>) {
        let changed = {
            let mut values = self.values.borrow_mut();
            match value {
                Some(value) => {
                    if values.get(trait_name) == Some(&value) {
                        false
                    } else {
                        values.insert(trait_name.to_string(), value);
                        true
                    }
                }
                None => values.remove(trait_name).is_some(),
            }
        };
        if changed {
            self.atom_for(trait_name).report_changed();
            self.shape.report_changed();
        }
    }

    /// Replaces the whole bag, notifying only the traits that changed.
    pub(crate) fn replace_all(&self, next: BTreeMap<String, Value>) {
        let previous = std::mem::replace(&mut *self.values.borrow_mut(), next);
        let changed: Vec<String> = {
            let current = self.values.borrow();
            previous
                .keys()
                .chain(current.keys())
                .filter(|k| previous.get(*k) != current.get(*k))
                .cloned()
                .collect()
        };
        if changed.is_empty() {
            return;
        }
        for name in &changed {
            self.atom_for(name).report_changed();
        }
        self.shape.report_changed();
    }

    fn atom_for(&self, trait_name: &str) -> Atom {
        self.atoms
            .borrow_mut()
            .entry(trait_name.to_string())
            .or_insert_with(|| Atom::new(format!("{}.{}", self.shape.name(), trait_name)))
            .clone()
    }
}

impl std::fmt::Debug for Stratum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stratum")
            .field("name", &self.name)
            .field("values", &*self.values.borrow())
            .finish()
    }
}
