//! Persistent custom patterns and exclusions.

use super::patterns::CustomDatePattern;
use crate::error::DateError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// File names never dated from their name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet(BTreeSet<String>);

impl ExclusionSet {
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    /// Add a name; returns false if it was already present
    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if name.is_empty() {
            return false;
        }
        self.0.insert(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl FromIterator<String> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().filter(|s| !s.is_empty()).collect())
    }
}

/// Custom date patterns backed by a JSON array of `{regex, layout}`
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    path: Option<PathBuf>,
    patterns: Vec<CustomDatePattern>,
}

impl PatternStore {
    /// Load from `path`; a missing file is an empty store
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DateError> {
        let path = path.into();
        let patterns = read_json::<Vec<CustomDatePattern>>(&path)?.unwrap_or_default();
        debug!(path = %path.display(), patterns = patterns.len(), "loaded date patterns");
        Ok(Self {
            path: Some(path),
            patterns,
        })
    }

    /// Store that never touches disk
    pub fn in_memory(patterns: Vec<CustomDatePattern>) -> Self {
        Self {
            path: None,
            patterns,
        }
    }

    pub fn patterns(&self) -> &[CustomDatePattern] {
        &self.patterns
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append a pattern and rewrite the store
    pub fn push(&mut self, pattern: CustomDatePattern) -> Result<(), DateError> {
        self.patterns.push(pattern);
        self.save()
    }

    pub fn save(&self) -> Result<(), DateError> {
        match &self.path {
            Some(path) => write_json(path, &self.patterns),
            None => Ok(()),
        }
    }
}

/// Exclusion set backed by a JSON array of file names
#[derive(Debug, Clone, Default)]
pub struct ExclusionStore {
    path: Option<PathBuf>,
    set: ExclusionSet,
}

impl ExclusionStore {
    /// Load from `path`; a missing file is an empty store
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, DateError> {
        let path = path.into();
        let names = read_json::<Vec<String>>(&path)?.unwrap_or_default();
        Ok(Self {
            path: Some(path),
            set: names.into_iter().collect(),
        })
    }

    pub fn in_memory(set: ExclusionSet) -> Self {
        Self { path: None, set }
    }

    pub fn set(&self) -> &ExclusionSet {
        &self.set
    }

    /// Add names and rewrite the store
    pub fn extend<I>(&mut self, names: I) -> Result<(), DateError>
    where
        I: IntoIterator<Item = String>,
    {
        for name in names {
            self.set.insert(name);
        }
        self.save()
    }

    pub fn save(&self) -> Result<(), DateError> {
        match &self.path {
            Some(path) => {
                let names: Vec<&String> = self.set.iter().collect();
                write_json(path, &names)
            }
            None => Ok(()),
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, DateError> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(DateError::Store {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(|e| DateError::StoreFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), DateError> {
    let store_error = |source| DateError::Store {
        path: path.to_path_buf(),
        source,
    };
    let json = serde_json::to_vec_pretty(value).map_err(|e| DateError::StoreFormat {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(store_error)?;
    let mut temp = NamedTempFile::new_in(&dir).map_err(store_error)?;
    temp.write_all(&json).map_err(store_error)?;
    temp.persist(path).map_err(|e| store_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_files_load_empty() {
        let dir = TempDir::new().unwrap();
        let patterns = PatternStore::load(dir.path().join("date_patterns.json")).unwrap();
        let exclusions = ExclusionStore::load(dir.path().join("date_exclusions.json")).unwrap();
        assert!(patterns.patterns().is_empty());
        assert!(exclusions.set().is_empty());
    }

    #[test]
    fn patterns_persist_across_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg").join("date_patterns.json");

        let mut store = PatternStore::load(&path).unwrap();
        store
            .push(CustomDatePattern::new(r"(\d{8})", "%Y%m%d"))
            .unwrap();

        let reloaded = PatternStore::load(&path).unwrap();
        assert_eq!(reloaded.patterns(), store.patterns());

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["layout"], "%Y%m%d");
    }

    #[test]
    fn exclusions_persist_as_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("date_exclusions.json");

        let mut store = ExclusionStore::load(&path).unwrap();
        store
            .extend(vec!["b.jpg".to_string(), "a.jpg".to_string(), String::new()])
            .unwrap();

        let raw: Vec<String> = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw, vec!["a.jpg".to_string(), "b.jpg".to_string()]);
        assert!(ExclusionStore::load(&path).unwrap().set().contains("a.jpg"));
    }

    #[test]
    fn malformed_store_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("date_patterns.json");
        fs::write(&path, b"{\"regex\": 1}").unwrap();

        let err = PatternStore::load(&path).unwrap_err();
        assert!(matches!(err, DateError::StoreFormat { .. }));
    }
}
