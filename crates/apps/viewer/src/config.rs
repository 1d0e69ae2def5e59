use std::path::PathBuf;

use clap::Parser;
use foundation::ids::ModelId;
use serde::Deserialize;
use serde_json::Value;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load a catalog, fill the workbench and run the timeline")]
pub struct Args {
    /// Init file with the catalog and the initial workbench
    #[arg(long, env = "ATLAS_INIT", default_value = "data/init.json")]
    pub init: PathBuf,

    /// Number of clock ticks to run before printing the state
    #[arg(long, env = "ATLAS_TICKS", default_value_t = 3)]
    pub ticks: u32,

    /// Real seconds per tick
    #[arg(long, default_value_t = 1.0)]
    pub tick_seconds: f64,

    /// Start the clock even when the top item is paused
    #[arg(long)]
    pub play: bool,
}

/// The init file. Workbench ids are listed top first.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitFile {
    #[serde(default)]
    pub catalog: Vec<Value>,
    #[serde(default)]
    pub workbench: Vec<ModelId>,
    #[serde(default)]
    pub always_show_timeline: bool,
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use foundation::ids::ModelId;
    use pretty_assertions::assert_eq;

    use super::{Args, InitFile};

    #[test]
    fn init_file_fields_are_optional() {
        let init: InitFile = serde_json::from_str("{}").unwrap();
        assert!(init.catalog.is_empty());
        assert!(!init.always_show_timeline);

        let init: InitFile = serde_json::from_str(
            r#"{ "catalog": [{ "type": "group", "name": "g" }], "workbench": ["a"], "alwaysShowTimeline": true }"#,
        )
        .unwrap();
        assert_eq!(init.workbench, vec![ModelId::from("a")]);
        assert!(init.always_show_timeline);
        assert_eq!(init.catalog.len(), 1);
    }

    #[test]
    fn args_parse() {
        let args = Args::parse_from(["viewer", "--init", "x.json", "--ticks", "5", "--play"]);
        assert_eq!(args.init.to_str(), Some("x.json"));
        assert_eq!(args.ticks, 5);
        assert!(args.play);
    }
}
