use itertools::Itertools as _;
use lazypath::{AbsoluteSystemPath, AbsoluteSystemPathBuf};
use tracing::debug;

use crate::{Error, LazyConfig};

const CONFIG_STEM: &str = "lazy.config";
const CONFIG_EXTENSIONS: [&str; 7] = ["json", "js", "cjs", "mjs", "ts", "cts", "mts"];

/// Finds the config file in `dir`, if any. More than one `lazy.config.*`
/// in the same directory is an error.
fn config_file_in_dir(dir: &AbsoluteSystemPath) -> Result<Option<AbsoluteSystemPathBuf>, Error> {
    let mut found = CONFIG_EXTENSIONS
        .iter()
        .map(|ext| dir.join_component(&format!("{CONFIG_STEM}.{ext}")))
        .filter(|candidate| candidate.exists())
        .collect::<Vec<_>>();

    match found.len() {
        0 => Ok(None),
        1 => Ok(Some(found.remove(0))),
        _ => Err(Error::MultipleConfigFiles {
            dir: dir.to_string(),
            found: found
                .iter()
                .filter_map(|path| path.file_name())
                .join(", "),
        }),
    }
}

/// Loads and parses the config in `dir`, if present.
/// Non-JSON flavors exist in the wild but carry executable configuration;
/// this runner only accepts the static JSON schema.
pub fn load_config_in_dir(dir: &AbsoluteSystemPath) -> Result<Option<LazyConfig>, Error> {
    let Some(path) = config_file_in_dir(dir)? else {
        return Ok(None);
    };

    if path.extension() != Some("json") {
        return Err(Error::UnsupportedConfigFlavor {
            path: path.to_string(),
        });
    }

    debug!("loading config file {path}");
    let contents = path.read_to_string().map_err(|source| Error::Read {
        path: path.to_string(),
        source,
    })?;
    let config = serde_json::from_str(&contents).map_err(|source| Error::Parse {
        path: path.to_string(),
        source,
    })?;

    Ok(Some(config))
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn root(dir: &tempfile::TempDir) -> AbsoluteSystemPathBuf {
        AbsoluteSystemPathBuf::try_from(dir.path().canonicalize().unwrap()).unwrap()
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config_in_dir(&root(&dir)).unwrap().is_none());
    }

    #[test]
    fn test_loads_json_config() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lazy.config.json"),
            r#"{ "tasks": { "build": {} } }"#,
        )
        .unwrap();

        let config = load_config_in_dir(&root(&dir)).unwrap().unwrap();
        assert!(config.tasks.contains_key("build"));
    }

    #[test]
    fn test_multiple_configs_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lazy.config.json"), "{}").unwrap();
        fs::write(dir.path().join("lazy.config.ts"), "export default {}").unwrap();

        let err = load_config_in_dir(&root(&dir)).unwrap_err();
        assert!(matches!(err, Error::MultipleConfigFiles { .. }));
    }

    #[test]
    fn test_script_flavor_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lazy.config.mjs"), "export default {}").unwrap();

        let err = load_config_in_dir(&root(&dir)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedConfigFlavor { .. }));
    }
}
