use std::{
    borrow::Borrow,
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
};

use camino::{Utf8Path, Utf8PathBuf};
use path_clean::PathClean;
use serde::Serialize;

use crate::{AbsoluteSystemPath, PathError};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct AbsoluteSystemPathBuf(pub(crate) Utf8PathBuf);

impl Borrow<AbsoluteSystemPath> for AbsoluteSystemPathBuf {
    fn borrow(&self) -> &AbsoluteSystemPath {
        AbsoluteSystemPath::new_unchecked(self.0.as_path())
    }
}

impl AsRef<AbsoluteSystemPath> for AbsoluteSystemPathBuf {
    fn as_ref(&self) -> &AbsoluteSystemPath {
        self.borrow()
    }
}

impl Deref for AbsoluteSystemPathBuf {
    type Target = AbsoluteSystemPath;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl AbsoluteSystemPathBuf {
    /// Create a new `AbsoluteSystemPathBuf` from `unchecked_path`, verifying
    /// that it is absolute.
    pub fn new(unchecked_path: impl Into<Utf8PathBuf>) -> Result<Self, PathError> {
        let path: Utf8PathBuf = unchecked_path.into();
        if path.is_relative() {
            return Err(PathError::NotAbsolute(path.into_std_path_buf()));
        }

        Ok(Self(path))
    }

    /// Resolves a path of unknown kind against `base`: absolute paths are
    /// taken as-is, relative ones are joined onto `base` and cleaned.
    pub fn from_unknown(base: &AbsoluteSystemPath, unknown: impl Into<Utf8PathBuf>) -> Self {
        let unknown: Utf8PathBuf = unknown.into();
        if unknown.is_absolute() {
            Self(unknown)
        } else {
            Self(
                base.as_path()
                    .join(unknown)
                    .as_std_path()
                    .clean()
                    .try_into()
                    .expect("clean should produce valid UTF-8"),
            )
        }
    }

    pub fn cwd() -> Result<Self, PathError> {
        Ok(Self(Utf8PathBuf::try_from(std::env::current_dir()?)?))
    }

    pub fn as_path(&self) -> &Utf8Path {
        self.0.as_path()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_inner(self) -> Utf8PathBuf {
        self.0
    }
}

impl TryFrom<PathBuf> for AbsoluteSystemPathBuf {
    type Error = PathError;

    fn try_from(path: PathBuf) -> Result<Self, Self::Error> {
        Self::new(Utf8PathBuf::try_from(path)?)
    }
}

impl From<AbsoluteSystemPathBuf> for PathBuf {
    fn from(path: AbsoluteSystemPathBuf) -> Self {
        path.0.into_std_path_buf()
    }
}

impl fmt::Display for AbsoluteSystemPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<Path> for AbsoluteSystemPathBuf {
    fn as_ref(&self) -> &Path {
        self.0.as_std_path()
    }
}
