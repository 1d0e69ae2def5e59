use std::rc::Rc;

use catalog::ModelError;
use foundation::ids::ModelId;
use runtime::Observable;

use crate::catalog_item::CatalogItem;
use crate::layer::{MapItem, Mappable};

/// The active items, index 0 drawn on top.
pub struct Workbench {
    items: Observable<Vec<Rc<CatalogItem>>>,
}

impl Default for Workbench {
    fn default() -> Self {
        Self::new()
    }
}

impl Workbench {
    pub fn new() -> Self {
        Self {
            items: Observable::new("workbench.items", Vec::new()),
        }
    }

    /// Puts `item` on top. An item already present moves instead.
    pub fn add(&self, item: Rc<CatalogItem>) {
        let id = item.id();
        self.items.update(|items| {
            items.retain(|i| i.id() != id);
            items.insert(0, item);
        });
    }

    pub fn remove(&self, id: &ModelId) -> Option<Rc<CatalogItem>> {
        let index = self
            .items
            .with_untracked(|items| items.iter().position(|i| &i.id() == id))?;
        Some(self.items.update(|items| items.remove(index)))
    }

    pub fn contains(&self, id: &ModelId) -> bool {
        self.items.with(|items| items.iter().any(|i| &i.id() == id))
    }

    pub fn get(&self, id: &ModelId) -> Option<Rc<CatalogItem>> {
        self.items
            .with(|items| items.iter().find(|i| &i.id() == id).cloned())
    }

    /// Moves `id` to `index`, clamped to the workbench.
    pub fn move_item_to_index(&self, id: &ModelId, index: usize) -> Result<(), ModelError> {
        let Some(current) = self
            .items
            .with_untracked(|items| items.iter().position(|i| &i.id() == id))
        else {
            return Err(ModelError::UnknownModel(id.clone()));
        };
        let len = self.items.with_untracked(Vec::len);
        let target = index.min(len - 1);
        if target != current {
            self.items.update(|items| {
                let item = items.remove(current);
                items.insert(target, item);
            });
        }
        Ok(())
    }

    pub fn clear(&self) {
        if self.items.with_untracked(|items| !items.is_empty()) {
            self.items.update(Vec::clear);
        }
    }

    pub fn items(&self) -> Vec<Rc<CatalogItem>> {
        self.items.get()
    }

    pub fn item_ids(&self) -> Vec<ModelId> {
        self.items.with(|items| items.iter().map(|i| i.id()).collect())
    }

    pub fn len(&self) -> usize {
        self.items.with(Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Map items of every active item, top first.
    pub fn map_items(&self) -> Vec<MapItem> {
        self.items()
            .iter()
            .flat_map(|item| item.map_items())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use catalog::{CommonStrata, Model, ModelError, imagery_schema, names};
    use foundation::ids::ModelId;
    use pretty_assertions::assert_eq;

    use super::Workbench;
    use crate::catalog_item::CatalogItem;
    use crate::layer::MapItem;

    fn item(id: &str) -> Rc<CatalogItem> {
        let model = Model::new(id, Rc::new(imagery_schema()));
        model
            .set_trait(CommonStrata::DEFINITION, names::URL, format!("http://{id}"))
            .unwrap();
        Rc::new(CatalogItem::new(model))
    }

    fn ids(list: &[&str]) -> Vec<ModelId> {
        list.iter().map(|s| ModelId::from(*s)).collect()
    }

    #[test]
    fn newest_items_go_on_top() {
        let workbench = Workbench::new();
        workbench.add(item("a"));
        workbench.add(item("b"));
        workbench.add(item("a"));
        assert_eq!(workbench.item_ids(), ids(&["a", "b"]));

        let urls: Vec<String> = workbench
            .map_items()
            .into_iter()
            .filter_map(|m| match m {
                MapItem::Imagery(parts) => Some(parts.url),
                MapItem::DataSource { .. } => None,
            })
            .collect();
        assert_eq!(urls, vec!["http://a", "http://b"]);
    }

    #[test]
    fn items_move_within_bounds() {
        let workbench = Workbench::new();
        for id in ["c", "b", "a"] {
            workbench.add(item(id));
        }
        workbench.move_item_to_index(&ModelId::from("a"), 7).unwrap();
        assert_eq!(workbench.item_ids(), ids(&["b", "c", "a"]));
        workbench.move_item_to_index(&ModelId::from("c"), 0).unwrap();
        assert_eq!(workbench.item_ids(), ids(&["c", "b", "a"]));
        assert_eq!(
            workbench.move_item_to_index(&ModelId::from("z"), 0),
            Err(ModelError::UnknownModel(ModelId::from("z")))
        );
    }

    #[test]
    fn remove_and_clear() {
        let workbench = Workbench::new();
        workbench.add(item("a"));
        workbench.add(item("b"));
        assert!(workbench.remove(&ModelId::from("a")).is_some());
        assert!(workbench.remove(&ModelId::from("a")).is_none());
        assert!(!workbench.contains(&ModelId::from("a")));
        assert!(workbench.get(&ModelId::from("b")).is_some());
        workbench.clear();
        assert!(workbench.is_empty());
    }
}
