use std::{
    fmt, fs,
    fs::{File, Metadata},
    io,
    path::Path,
};

use camino::{Utf8Components, Utf8Path};
use path_slash::PathExt;

use crate::{AbsoluteSystemPathBuf, AnchoredUnixPath, AnchoredUnixPathBuf, PathError};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct AbsoluteSystemPath(Utf8Path);

impl ToOwned for AbsoluteSystemPath {
    type Owned = AbsoluteSystemPathBuf;

    fn to_owned(&self) -> Self::Owned {
        AbsoluteSystemPathBuf(self.0.to_owned())
    }
}

impl AsRef<AbsoluteSystemPath> for AbsoluteSystemPath {
    fn as_ref(&self) -> &AbsoluteSystemPath {
        self
    }
}

impl fmt::Display for AbsoluteSystemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<Path> for AbsoluteSystemPath {
    fn as_ref(&self) -> &Path {
        self.0.as_std_path()
    }
}

impl AbsoluteSystemPath {
    /// Validates that the given path is absolute and wraps it.
    /// Does *not* perform any conversion; see `AbsoluteSystemPathBuf::new`
    /// for the allocating, converting variant.
    pub fn new<P: AsRef<str> + ?Sized>(value: &P) -> Result<&Self, PathError> {
        let path: &Utf8Path = value.as_ref().into();
        if path.is_relative() {
            return Err(PathError::NotAbsolute(path.as_std_path().to_owned()));
        }

        Ok(Self::new_unchecked(path))
    }

    pub(crate) fn new_unchecked(path: &Utf8Path) -> &Self {
        unsafe { &*(path as *const Utf8Path as *const Self) }
    }

    pub fn as_path(&self) -> &Utf8Path {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn components(&self) -> Utf8Components<'_> {
        self.0.components()
    }

    pub fn parent(&self) -> Option<&AbsoluteSystemPath> {
        self.0.parent().map(Self::new_unchecked)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.0.file_name()
    }

    pub fn extension(&self) -> Option<&str> {
        self.0.extension()
    }

    pub fn join_component(&self, segment: &str) -> AbsoluteSystemPathBuf {
        debug_assert!(!segment.contains(std::path::MAIN_SEPARATOR));
        AbsoluteSystemPathBuf(self.0.join(segment))
    }

    pub fn join_components(&self, segments: &[&str]) -> AbsoluteSystemPathBuf {
        debug_assert!(!segments
            .iter()
            .any(|segment| segment.contains(std::path::MAIN_SEPARATOR)));
        AbsoluteSystemPathBuf(segments.iter().fold(self.0.to_owned(), |path, segment| {
            path.join(segment)
        }))
    }

    /// Expresses `path` relative to `self` as an `AnchoredUnixPathBuf`.
    /// Errors if `self` is not a prefix of `path`.
    pub fn anchor(
        &self,
        path: impl AsRef<AbsoluteSystemPath>,
    ) -> Result<AnchoredUnixPathBuf, PathError> {
        let path = path.as_ref();
        let stripped = path
            .0
            .strip_prefix(&self.0)
            .map_err(|_| PathError::PrefixError(self.to_string(), path.to_string()))?;

        let unix = stripped
            .as_std_path()
            .to_slash()
            .ok_or_else(|| PathError::InvalidUnicode(stripped.to_string()))?;
        AnchoredUnixPathBuf::new(unix.into_owned())
    }

    /// Resolves an anchored path against `self`.
    pub fn resolve(&self, path: impl AsRef<AnchoredUnixPath>) -> AbsoluteSystemPathBuf {
        let mut joined = self.0.to_owned();
        for segment in path.as_ref().components() {
            joined.push(segment);
        }
        AbsoluteSystemPathBuf(joined)
    }

    pub fn exists(&self) -> bool {
        self.0.exists()
    }

    pub fn is_dir(&self) -> bool {
        self.0.is_dir()
    }

    pub fn open(&self) -> Result<File, PathError> {
        Ok(File::open(&self.0)?)
    }

    pub fn metadata(&self) -> Result<Metadata, PathError> {
        Ok(fs::metadata(&self.0)?)
    }

    pub fn read_to_string(&self) -> Result<String, io::Error> {
        fs::read_to_string(&self.0)
    }

    pub fn create_with_contents(&self, contents: impl AsRef<[u8]>) -> Result<(), io::Error> {
        fs::write(&self.0, contents)
    }

    pub fn create_dir_all(&self) -> Result<(), io::Error> {
        fs::create_dir_all(&self.0)
    }

    /// Creates the parent directory chain so that `self` can be created.
    pub fn ensure_dir(&self) -> Result<(), io::Error> {
        if let Some(parent) = self.0.parent() {
            fs::create_dir_all(parent)
        } else {
            Ok(())
        }
    }

    pub fn remove_file(&self) -> Result<(), io::Error> {
        fs::remove_file(&self.0)
    }

    pub fn rename(&self, to: &AbsoluteSystemPath) -> Result<(), io::Error> {
        fs::rename(&self.0, &to.0)
    }

    pub fn to_realpath(&self) -> Result<AbsoluteSystemPathBuf, PathError> {
        let realpath = dunce::canonicalize(&self.0)?;
        Ok(AbsoluteSystemPathBuf(realpath.try_into()?))
    }
}
