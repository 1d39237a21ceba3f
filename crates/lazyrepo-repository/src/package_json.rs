use std::collections::BTreeMap;

use lazypath::AbsoluteSystemPath;
use serde::Deserialize;

use crate::Error;

/// The slice of a `package.json` this runner cares about: identity, runnable
/// scripts, dependency maps, and the workspace declaration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    pub name: Option<String>,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub optional_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub peer_dependencies: BTreeMap<String, String>,
    pub workspaces: Option<Workspaces>,
}

/// The `workspaces` field comes in two shapes: a bare glob list, or an
/// object with a `packages` list (yarn's extended form).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    TopLevel(Vec<String>),
    Nested { packages: Vec<String> },
}

impl AsRef<[String]> for Workspaces {
    fn as_ref(&self) -> &[String] {
        match self {
            Workspaces::TopLevel(packages) => packages.as_slice(),
            Workspaces::Nested { packages } => packages.as_slice(),
        }
    }
}

impl PackageJson {
    pub fn load(path: &AbsoluteSystemPath) -> Result<PackageJson, Error> {
        let contents = path.read_to_string().map_err(|source| Error::Read {
            path: path.to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| Error::Json {
            path: path.to_string(),
            source,
        })
    }

    /// Names this package depends on, across all dependency maps.
    pub fn all_dependency_names(&self) -> impl Iterator<Item = &String> {
        self.dependencies
            .keys()
            .chain(self.dev_dependencies.keys())
            .chain(self.optional_dependencies.keys())
            .chain(self.peer_dependencies.keys())
    }
}
