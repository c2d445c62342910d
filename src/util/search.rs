//! Ordered directory list used to resolve relative resource references.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dirs<I, P>(dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self { dirs: dirs.into_iter().map(Into::into).collect() }
    }

    pub fn append(&mut self, dir: impl Into<PathBuf>) {
        self.dirs.push(dir.into());
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Resolve a file reference to an existing path.
    ///
    /// Absolute paths must exist as given. Relative paths are tried against
    /// the working directory first, then each search directory in order.
    pub fn find(&self, file: impl AsRef<Path>) -> Option<PathBuf> {
        let file = file.as_ref();
        if file.as_os_str().is_empty() {
            return None;
        }
        if file.is_absolute() {
            return file.is_file().then(|| file.to_path_buf());
        }
        if file.is_file() {
            return Some(file.to_path_buf());
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(file))
            .find(|candidate| candidate.is_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_in_search_dirs() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("rough.png"), b"x").unwrap();

        let search = SearchPath::from_dirs([first.path(), second.path()]);
        assert_eq!(search.find("rough.png"), Some(second.path().join("rough.png")));
        assert_eq!(search.find("missing.png"), None);
        assert_eq!(search.find(""), None);
    }

    #[test]
    fn test_find_absolute() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.png");
        std::fs::write(&file, b"x").unwrap();

        assert_eq!(SearchPath::new().find(&file), Some(file.clone()));
        assert_eq!(SearchPath::new().find(dir.path().join("b.png")), None);
    }
}
