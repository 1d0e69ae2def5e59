mod config;
mod loader;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::rc::Rc;

use catalog::{
    LoadError, LoadableStratum, Model, ModelError, model_to_json, register_source_stratum,
};
use clap::Parser;
use layers::{CatalogItem, Viewer};
use serde_json::{Value, json};
use timeline::Clock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{Args, InitFile};
use crate::loader::{FileMetadataLoader, METADATA_STRATUM, METADATA_URL, TokioLocal, viewer_factory};

#[derive(Debug)]
enum AppError {
    Io { path: PathBuf, source: std::io::Error },
    InitFile(serde_json::Error),
    Model(ModelError),
    Load { item: String, source: LoadError },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            AppError::InitFile(err) => write!(f, "invalid init file: {err}"),
            AppError::Model(err) => write!(f, "{err}"),
            AppError::Load { item, source } => write!(f, "loading `{item}` failed: {source}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Io { source, .. } => Some(source),
            AppError::InitFile(err) => Some(err),
            AppError::Model(err) => Some(err),
            AppError::Load { source, .. } => Some(source),
        }
    }
}

impl From<ModelError> for AppError {
    fn from(err: ModelError) -> Self {
        AppError::Model(err)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let local = tokio::task::LocalSet::new();
    match local.run_until(run(args)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), AppError> {
    register_source_stratum(METADATA_STRATUM)?;

    let bytes = tokio::fs::read(&args.init).await.map_err(|source| AppError::Io {
        path: args.init.clone(),
        source,
    })?;
    let init: InitFile = serde_json::from_slice(&bytes).map_err(AppError::InitFile)?;
    let base_dir = args.init.parent().map(Path::to_path_buf).unwrap_or_default();

    let viewer = Viewer::new(viewer_factory(), Rc::new(TokioLocal));
    let upserted = viewer.load_catalog(&Value::Array(init.catalog))?;
    for (id, key) in upserted.iter().flat_map(|u| &u.skipped) {
        warn!(model = %id, key = %key, "catalog key ignored");
    }
    info!(models = viewer.registry().len(), "catalog loaded");
    viewer
        .timeline()
        .set_always_show_timeline(init.always_show_timeline)?;

    // Adding puts an item on top, so add bottom first.
    for id in init.workbench.iter().rev() {
        let item = catalog_item(&viewer, viewer.model(id)?, &base_dir)?;
        if let Err(source) = viewer.add_to_workbench(item).await {
            let err = AppError::Load {
                item: id.to_string(),
                source,
            };
            warn!("{err}");
        }
    }

    if args.play {
        viewer.timeline().set_should_animate(true);
    }
    for _ in 0..args.ticks {
        viewer.timeline().tick(args.tick_seconds)?;
    }

    let state = json!({
        "workbench": viewer
            .workbench()
            .items()
            .iter()
            .map(|item| model_to_json(item.model()))
            .collect::<Vec<_>>(),
        "mapItems": viewer.workbench().map_items(),
        "timeline": {
            "items": viewer
                .timeline()
                .item_ids()
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>(),
            "source": viewer.timeline().timeline_source().map(|id| id.to_string()),
            "clock": clock_json(&viewer.timeline().clock()),
        },
    });
    println!("{state:#}");
    Ok(())
}

fn catalog_item(viewer: &Viewer, model: Model, base_dir: &Path) -> Result<Rc<CatalogItem>, AppError> {
    if model.trait_value(METADATA_URL).is_none() {
        return Ok(Rc::new(CatalogItem::new(model)));
    }
    let loader = FileMetadataLoader::new(model.clone(), base_dir);
    let metadata = LoadableStratum::new(
        model.clone(),
        METADATA_STRATUM,
        loader,
        viewer.executor().clone(),
    )?;
    Ok(Rc::new(CatalogItem::with_metadata(model, Rc::new(metadata))))
}

fn clock_json(clock: &Clock) -> Value {
    json!({
        "boundItem": clock.bound_item.as_ref().map(|id| id.to_string()),
        "start": clock.start.to_iso8601(),
        "stop": clock.stop.to_iso8601(),
        "current": clock.current.to_iso8601(),
        "multiplier": clock.multiplier,
        "shouldAnimate": clock.should_animate,
    })
}
