//! Task identifiers for the lazy task runner.
//!
//! A [`TaskKey`] names one scheduled task invocation:
//! `"{taskName}::{packageDirRelativeToRoot}"`, with the literal `<rootDir>`
//! standing in for the workspace root when a task has `top-level` run type.
//! Keys are derived purely from static inputs, so they are stable across
//! runs and double as the scheduler's sort keys.

use std::{fmt, str::FromStr};

use lazypath::AnchoredUnixPath;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

pub const TASK_DELIMITER: &str = "::";
pub const ROOT_DIR_SENTINEL: &str = "<rootDir>";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("task name '{0}' may not contain '{TASK_DELIMITER}'")]
    DelimiterInTaskName(String),
    #[error("'{0}' is not a task key")]
    MissingDelimiter(String),
}

/// Canonical identifier of one `(package, task)` invocation.
///
/// The rendered form is stored whole so that `Ord` is exactly the canonical
/// string order the scheduler and manifest format sort by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskKey {
    rendered: String,
    // byte offset of TASK_DELIMITER within `rendered`
    delimiter: usize,
}

impl TaskKey {
    /// Key for a task running in a workspace package.
    pub fn new(task_name: &str, package_dir: &AnchoredUnixPath) -> Result<Self, Error> {
        Self::from_parts(task_name, package_dir.as_str())
    }

    /// Key for a `top-level` task rooted at the workspace root.
    pub fn root(task_name: &str) -> Result<Self, Error> {
        Self::from_parts(task_name, ROOT_DIR_SENTINEL)
    }

    fn from_parts(task_name: &str, dir: &str) -> Result<Self, Error> {
        if task_name.contains(TASK_DELIMITER) {
            return Err(Error::DelimiterInTaskName(task_name.to_owned()));
        }

        Ok(Self {
            rendered: format!("{task_name}{TASK_DELIMITER}{dir}"),
            delimiter: task_name.len(),
        })
    }

    pub fn task(&self) -> &str {
        &self.rendered[..self.delimiter]
    }

    /// The package directory segment: a repo-relative unix path, or the
    /// `<rootDir>` sentinel for top-level tasks.
    pub fn dir(&self) -> &str {
        &self.rendered[self.delimiter + TASK_DELIMITER.len()..]
    }

    pub fn is_root_task(&self) -> bool {
        self.dir() == ROOT_DIR_SENTINEL
    }

    /// The package directory for non-top-level tasks.
    pub fn package_dir(&self) -> Option<&AnchoredUnixPath> {
        if self.is_root_task() {
            None
        } else {
            AnchoredUnixPath::new(self.dir()).ok()
        }
    }

    pub fn as_str(&self) -> &str {
        &self.rendered
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.rendered)
    }
}

impl FromStr for TaskKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let delimiter = s
            .find(TASK_DELIMITER)
            .ok_or_else(|| Error::MissingDelimiter(s.to_owned()))?;

        Ok(Self {
            rendered: s.to_owned(),
            delimiter,
        })
    }
}

impl Serialize for TaskKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.rendered)
    }
}

impl<'de> Deserialize<'de> for TaskKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}
