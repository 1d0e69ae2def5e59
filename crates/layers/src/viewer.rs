use std::rc::Rc;

use catalog::{
    CommonStrata, LoadResult, Model, ModelError, ModelFactory, Registry, Upserted,
    upsert_model_from_json,
};
use foundation::ids::ModelId;
use runtime::{LocalExecutor, action};
use serde_json::Value;
use timeline::{TimeVarying, TimelineStack};

use crate::catalog_item::CatalogItem;
use crate::layer::Mappable;
use crate::workbench::Workbench;

/// One map view: its catalog, workbench and timeline.
pub struct Viewer {
    registry: Rc<Registry>,
    factory: ModelFactory,
    workbench: Workbench,
    timeline: TimelineStack,
    executor: Rc<dyn LocalExecutor>,
}

impl Viewer {
    pub fn new(factory: ModelFactory, executor: Rc<dyn LocalExecutor>) -> Self {
        let registry = Rc::new(Registry::new());
        let timeline = TimelineStack::new(registry.clone());
        timeline.activate();
        Self {
            registry,
            factory,
            workbench: Workbench::new(),
            timeline,
            executor,
        }
    }

    pub fn registry(&self) -> &Rc<Registry> {
        &self.registry
    }

    pub fn factory(&self) -> &ModelFactory {
        &self.factory
    }

    pub fn workbench(&self) -> &Workbench {
        &self.workbench
    }

    pub fn timeline(&self) -> &TimelineStack {
        &self.timeline
    }

    pub fn executor(&self) -> &Rc<dyn LocalExecutor> {
        &self.executor
    }

    pub fn model(&self, id: &ModelId) -> Result<Model, ModelError> {
        self.registry
            .get_model_by_id(id)
            .ok_or_else(|| ModelError::UnknownModel(id.clone()))
    }

    /// Adds catalog JSON (one entry or an array of them) to the
    /// `definition` stratum.
    pub fn load_catalog(&self, json: &Value) -> Result<Vec<Upserted>, ModelError> {
        let entries = match json {
            Value::Array(entries) => entries.as_slice(),
            single => std::slice::from_ref(single),
        };
        action(|| {
            entries
                .iter()
                .map(|entry| {
                    upsert_model_from_json(
                        &self.factory,
                        &self.registry,
                        None,
                        CommonStrata::DEFINITION,
                        entry,
                    )
                })
                .collect()
        })
    }

    /// Puts `item` on the workbench and loads its map items. Once loaded, an
    /// item with a time range also goes on top of the timeline. An item whose
    /// load failed stays on the workbench but off the timeline.
    pub async fn add_to_workbench(&self, item: Rc<CatalogItem>) -> LoadResult {
        self.workbench.add(item.clone());
        let loaded = item.load_map_items().await;
        let id = item.id();
        if !self.workbench.contains(&id) {
            return loaded;
        }
        if let Err(err) = &loaded {
            tracing::debug!(item = %id, "added to workbench, load failed: {err}");
            return loaded;
        }
        let has_times = item
            .model()
            .clock_definition()
            .is_some_and(|def| def.start.is_some() || def.current.is_some());
        if has_times {
            self.timeline.add_layer_to_top(item.model());
        }
        tracing::debug!(item = %id, has_times, "added to workbench");
        loaded
    }

    /// Takes an item off both the workbench and the timeline.
    pub fn remove_from_workbench(&self, id: &ModelId) -> bool {
        action(|| {
            let removed = self.workbench.remove(id).is_some();
            let unstacked = self.timeline.remove(id);
            removed || unstacked
        })
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use catalog::{
        CommonStrata, LoadError, LoadResult, LoadableStratum, ModelError, ModelFactory,
        StratumLoader, StratumWriter, names, register_source_stratum,
    };
    use foundation::ids::ModelId;
    use futures::FutureExt;
    use futures::executor::LocalPool;
    use futures::future::LocalBoxFuture;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::Viewer;
    use crate::catalog_item::CatalogItem;

    struct TimesLoader;

    struct BrokenLoader;

    impl StratumLoader for BrokenLoader {
        type Output = ();

        fn load(&self) -> LocalBoxFuture<'static, Result<(), LoadError>> {
            async { Err(LoadError::new("metadata unavailable")) }.boxed_local()
        }

        fn apply_load(&self, _: (), _: &mut StratumWriter) -> LoadResult {
            Ok(())
        }
    }

    impl StratumLoader for TimesLoader {
        type Output = (String, String);

        fn load(&self) -> LocalBoxFuture<'static, Result<(String, String), LoadError>> {
            async {
                Ok((
                    "2020-01-01T00:00:00Z".to_string(),
                    "2020-01-02T00:00:00Z".to_string(),
                ))
            }
            .boxed_local()
        }

        fn apply_load(&self, (start, stop): (String, String), writer: &mut StratumWriter) -> LoadResult {
            writer.set(names::START_TIME, start)?;
            writer.set(names::STOP_TIME, stop)?;
            Ok(())
        }
    }

    fn viewer(pool: &LocalPool) -> Viewer {
        let viewer = Viewer::new(ModelFactory::with_standard_types(), Rc::new(pool.spawner()));
        viewer
            .load_catalog(&json!([
                { "type": "imagery", "id": "static", "url": "http://static" },
                { "type": "imagery", "id": "timed", "url": "http://timed" }
            ]))
            .unwrap();
        viewer
    }

    #[test]
    fn only_items_with_times_join_the_timeline() {
        register_source_stratum("metadata").unwrap();
        let mut pool = LocalPool::new();
        let viewer = viewer(&pool);

        let plain = Rc::new(CatalogItem::new(viewer.model(&ModelId::from("static")).unwrap()));
        let timed_model = viewer.model(&ModelId::from("timed")).unwrap();
        let metadata =
            LoadableStratum::new(timed_model.clone(), "metadata", TimesLoader, viewer.executor().clone())
                .unwrap();
        let timed = Rc::new(CatalogItem::with_metadata(timed_model, Rc::new(metadata)));

        pool.run_until(viewer.add_to_workbench(plain)).unwrap();
        pool.run_until(viewer.add_to_workbench(timed)).unwrap();

        assert_eq!(
            viewer.workbench().item_ids(),
            vec![ModelId::from("timed"), ModelId::from("static")]
        );
        assert_eq!(viewer.timeline().item_ids(), vec![ModelId::from("timed")]);
        assert_eq!(
            viewer.timeline().clock().bound_item,
            Some(ModelId::from("timed"))
        );

        assert!(viewer.remove_from_workbench(&ModelId::from("timed")));
        assert!(viewer.timeline().is_empty());
        assert!(!viewer.workbench().contains(&ModelId::from("timed")));
        assert!(!viewer.remove_from_workbench(&ModelId::from("timed")));
    }

    #[test]
    fn timed_definitions_join_without_metadata() {
        let mut pool = LocalPool::new();
        let viewer = viewer(&pool);
        let model = viewer.model(&ModelId::from("static")).unwrap();
        model
            .set_trait(CommonStrata::USER, names::CURRENT_TIME, "2021-06-01T00:00:00Z")
            .unwrap();
        pool.run_until(viewer.add_to_workbench(Rc::new(CatalogItem::new(model))))
            .unwrap();
        assert!(viewer.timeline().contains(&ModelId::from("static")));
    }

    #[test]
    fn failed_loads_stay_off_the_timeline() {
        register_source_stratum("metadata").unwrap();
        let mut pool = LocalPool::new();
        let viewer = viewer(&pool);
        let model = viewer.model(&ModelId::from("timed")).unwrap();
        model
            .set_trait(CommonStrata::DEFINITION, names::START_TIME, "2020-01-01T00:00:00Z")
            .unwrap();
        let metadata =
            LoadableStratum::new(model.clone(), "metadata", BrokenLoader, viewer.executor().clone())
                .unwrap();
        let item = Rc::new(CatalogItem::with_metadata(model, Rc::new(metadata)));

        let err = pool.run_until(viewer.add_to_workbench(item)).unwrap_err();
        assert_eq!(err.message, "metadata unavailable");
        assert!(viewer.workbench().contains(&ModelId::from("timed")));
        assert!(viewer.timeline().is_empty());
    }

    #[test]
    fn unknown_models_are_errors() {
        let pool = LocalPool::new();
        let viewer = viewer(&pool);
        assert_eq!(
            viewer.model(&ModelId::from("nope")).unwrap_err(),
            ModelError::UnknownModel(ModelId::from("nope"))
        );
        assert!(matches!(
            viewer.load_catalog(&json!({ "type": "imagery", "id": "static", "bogus": 1 })),
            Ok(upserted) if upserted[0].skipped.len() == 1
        ));
    }
}
