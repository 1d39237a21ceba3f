use std::collections::{BTreeMap, HashMap};

use serde::{de, Deserialize, Deserializer};

/// Shape of a `lazy.config.json` file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LazyConfig {
    pub base_cache_config: Option<BaseCacheConfig>,
    #[serde(default)]
    pub tasks: HashMap<String, TaskConfig>,
}

/// Workspace-wide cache inputs shared by every task: lockfiles and the
/// config files themselves by default.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BaseCacheConfig {
    #[serde(default = "default_base_includes")]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub env_inputs: Vec<String>,
}

impl Default for BaseCacheConfig {
    fn default() -> Self {
        Self {
            includes: default_base_includes(),
            excludes: Vec::new(),
            env_inputs: Vec::new(),
        }
    }
}

fn default_base_includes() -> Vec<String> {
    vec![
        "<rootDir>/{yarn.lock,pnpm-lock.yaml,package-lock.json}".to_owned(),
        "<rootDir>/lazy.config.*".to_owned(),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RunType {
    #[default]
    Dependent,
    Independent,
    TopLevel,
}

/// Ordering declared against another task name, independent of package
/// dependencies.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunsAfter {
    #[serde(default)]
    pub inherits_input: bool,
    #[serde(default = "default_true")]
    pub uses_output: bool,
}

impl Default for RunsAfter {
    fn default() -> Self {
        Self {
            inherits_input: false,
            uses_output: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub run_type: RunType,
    pub base_command: Option<String>,
    // BTreeMap so iteration order is the deterministic name order
    #[serde(default)]
    pub runs_after: BTreeMap<String, RunsAfter>,
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            run_type: RunType::default(),
            base_command: None,
            runs_after: BTreeMap::new(),
            parallel: true,
            cache: CacheConfig::default(),
        }
    }
}

/// Either the literal string `"none"` (un-cacheable task) or the cache
/// settings object.
#[derive(Debug, Clone)]
pub enum CacheConfig {
    None,
    Enabled(CacheSettings),
}

impl CacheConfig {
    pub fn settings(&self) -> Option<&CacheSettings> {
        match self {
            CacheConfig::None => None,
            CacheConfig::Enabled(settings) => Some(settings),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, CacheConfig::None)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig::Enabled(CacheSettings::default())
    }
}

impl<'de> Deserialize<'de> for CacheConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Tag(String),
            Settings(CacheSettings),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Tag(tag) if tag == "none" => Ok(CacheConfig::None),
            Raw::Tag(tag) => Err(de::Error::custom(format!(
                "expected \"none\" or a cache settings object, got \"{tag}\""
            ))),
            Raw::Settings(settings) => Ok(CacheConfig::Enabled(settings)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CacheSettings {
    #[serde(default)]
    pub env_inputs: Vec<String>,
    #[serde(default = "default_true")]
    pub inherits_input_from_dependencies: bool,
    #[serde(default)]
    pub inputs: GlobSpec,
    #[serde(default)]
    pub outputs: GlobSpec,
    #[serde(default = "default_true")]
    pub uses_output_from_dependencies: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            env_inputs: Vec::new(),
            inherits_input_from_dependencies: true,
            inputs: GlobSpec::default(),
            outputs: GlobSpec::default(),
            uses_output_from_dependencies: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GlobSpec {
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for GlobSpec {
    fn default() -> Self {
        Self {
            include: default_include(),
            exclude: Vec::new(),
        }
    }
}

fn default_include() -> Vec<String> {
    vec!["**/*".to_owned()]
}

fn default_true() -> bool {
    true
}
