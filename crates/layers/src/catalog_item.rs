use std::fmt;
use std::rc::Rc;

use catalog::{LoadPromise, Loadable, Model, names};
use foundation::ids::ModelId;
use runtime::Computed;

use crate::layer::{ImageryParts, MapItem, Mappable, Rectangle};

const DATA_SOURCE_EXTENSIONS: &[&str] = &["geojson", "json", "csv", "kml", "kmz", "czml", "gpx"];

/// A catalog model on its way to the map, with the metadata stratum that
/// fills in what its definition leaves out.
pub struct CatalogItem {
    model: Model,
    metadata: Option<Rc<dyn Loadable>>,
    map_items: Computed<Vec<MapItem>>,
}

impl CatalogItem {
    pub fn new(model: Model) -> Self {
        Self::build(model, None)
    }

    pub fn with_metadata(model: Model, metadata: Rc<dyn Loadable>) -> Self {
        Self::build(model, Some(metadata))
    }

    fn build(model: Model, metadata: Option<Rc<dyn Loadable>>) -> Self {
        let map_items = {
            let (model, metadata) = (model.clone(), metadata.clone());
            Computed::new(format!("{}.mapItems", model.unique_id()), move || {
                compute_map_items(&model, metadata.as_deref())
            })
        };
        Self {
            model,
            metadata,
            map_items,
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn metadata(&self) -> Option<&Rc<dyn Loadable>> {
        self.metadata.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_loading())
    }
}

impl Mappable for CatalogItem {
    fn id(&self) -> ModelId {
        self.model.unique_id().clone()
    }

    fn map_items(&self) -> Vec<MapItem> {
        self.map_items.get()
    }

    fn load_map_items(&self) -> LoadPromise {
        match &self.metadata {
            Some(metadata) => metadata.load(),
            None => LoadPromise::settled(Ok(())),
        }
    }
}

impl fmt::Debug for CatalogItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogItem")
            .field("model", self.model.unique_id())
            .field("metadata", &self.metadata.as_ref().map(|m| m.stratum_name()))
            .finish()
    }
}

fn compute_map_items(model: &Model, metadata: Option<&dyn Loadable>) -> Vec<MapItem> {
    if let Some(metadata) = metadata {
        metadata.load_if_needed();
        if metadata.is_loading() {
            return Vec::new();
        }
    }
    if !model.get::<bool>(names::SHOW).unwrap_or(true) {
        return Vec::new();
    }
    let Some(url) = model.get::<String>(names::URL) else {
        return Vec::new();
    };

    if is_data_source(&url) {
        let name = model
            .get::<String>(names::NAME)
            .unwrap_or_else(|| model.unique_id().to_string());
        return vec![MapItem::DataSource { name, url }];
    }
    vec![MapItem::Imagery(ImageryParts {
        url,
        opacity: model.get::<f64>(names::OPACITY).unwrap_or(1.0).clamp(0.0, 1.0),
        rectangle: model.get::<Rectangle>(names::RECTANGLE),
    })]
}

fn is_data_source(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').is_some_and(|(_, ext)| {
        DATA_SOURCE_EXTENSIONS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(ext))
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use catalog::{
        CommonStrata, LoadError, LoadResult, Loadable, LoadableStratum, Model, StratumLoader,
        StratumWriter, imagery_schema, names, register_source_stratum,
    };
    use futures::FutureExt;
    use futures::executor::LocalPool;
    use futures::future::LocalBoxFuture;
    use pretty_assertions::assert_eq;
    use runtime::autorun;

    use super::{CatalogItem, is_data_source};
    use crate::layer::{ImageryParts, MapItem, Mappable, Rectangle};

    struct ServiceLoader {
        url: String,
    }

    impl StratumLoader for ServiceLoader {
        type Output = String;

        fn load(&self) -> LocalBoxFuture<'static, Result<String, LoadError>> {
            let url = self.url.clone();
            async move { Ok(url) }.boxed_local()
        }

        fn apply_load(&self, output: String, writer: &mut StratumWriter) -> LoadResult {
            writer.set(names::URL, output)?;
            Ok(())
        }
    }

    fn imagery(id: &str) -> Model {
        Model::new(id, Rc::new(imagery_schema()))
    }

    #[test]
    fn imagery_items_carry_resolved_traits() {
        let model = imagery("wms");
        model.set_trait(CommonStrata::DEFINITION, names::URL, "http://tiles/wms").unwrap();
        model.set_trait(CommonStrata::USER, names::OPACITY, 1.5).unwrap();
        let item = CatalogItem::new(model.clone());

        assert_eq!(
            item.map_items(),
            vec![MapItem::Imagery(ImageryParts {
                url: "http://tiles/wms".to_string(),
                opacity: 1.0,
                rectangle: Some(Rectangle {
                    west: -180.0,
                    south: -90.0,
                    east: 180.0,
                    north: 90.0,
                }),
            })]
        );

        model.set_trait(CommonStrata::USER, names::SHOW, false).unwrap();
        assert!(item.map_items().is_empty());
        assert!(item.load_map_items().peek().is_some_and(|r| r.is_ok()));
    }

    #[test]
    fn data_files_become_data_sources() {
        assert!(is_data_source("http://host/data/rivers.GeoJSON?v=2"));
        assert!(is_data_source("points.csv"));
        assert!(!is_data_source("http://host.example.com/wms"));
        assert!(!is_data_source("http://host/tiles/{z}/{x}/{y}.png"));

        let model = imagery("rivers");
        model.set_trait(CommonStrata::DEFINITION, names::URL, "rivers.kml").unwrap();
        assert_eq!(
            CatalogItem::new(model).map_items(),
            vec![MapItem::DataSource {
                name: "rivers".to_string(),
                url: "rivers.kml".to_string(),
            }]
        );
    }

    #[test]
    fn metadata_is_loaded_on_demand() {
        register_source_stratum("metadata").unwrap();
        let mut pool = LocalPool::new();
        let model = imagery("wms");
        let metadata = LoadableStratum::new(
            model.clone(),
            "metadata",
            ServiceLoader {
                url: "http://loaded/wms".to_string(),
            },
            Rc::new(pool.spawner()),
        )
        .unwrap();
        let item = Rc::new(CatalogItem::with_metadata(model, Rc::new(metadata)));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let _render = {
            let (item, seen) = (item.clone(), seen.clone());
            autorun("render", move || seen.borrow_mut().push(item.map_items().len()))
        };
        assert!(item.is_loading());
        assert_eq!(*seen.borrow(), vec![0]);

        pool.run_until_stalled();
        assert!(!item.is_loading());
        assert_eq!(*seen.borrow(), vec![0, 1]);
        assert_eq!(item.metadata().map(|m| m.stratum_name()), Some("metadata"));
    }
}
