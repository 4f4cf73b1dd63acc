//! Persistent cache of direct class dependencies.
//!
//! One JSON document (`dependencies.json`) in the cache directory maps each
//! class to the modification time of its class file and the classes it
//! references. An entry is only trusted while the recorded time matches the
//! class file on disk and the document was written by the same analyzer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::analyzer::AnalyzerKind;
use crate::error::{DependError, DependResult};

pub const CACHE_FILE_NAME: &str = "dependencies.json";
const CACHE_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub modified: u64,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheDocument {
    version: u32,
    analyzer: AnalyzerKind,
    classes: BTreeMap<String, CacheEntry>,
}

#[derive(Serialize)]
struct CacheDocumentRef<'a> {
    version: u32,
    analyzer: AnalyzerKind,
    classes: &'a BTreeMap<String, CacheEntry>,
}

#[derive(Debug)]
pub struct DependencyCache {
    path: PathBuf,
    analyzer: AnalyzerKind,
    classes: BTreeMap<String, CacheEntry>,
    dirty: bool,
}

impl DependencyCache {
    /// Open (creating the directory if needed) the cache under `dir` for
    /// dependencies found by `analyzer`. A cache written by another format
    /// version or another analyzer starts out empty.
    pub fn open(dir: &Path, analyzer: AnalyzerKind) -> DependResult<Self> {
        std::fs::create_dir_all(dir).map_err(|e| DependError::io(dir, e))?;
        let path = dir.join(CACHE_FILE_NAME);

        let classes = if path.exists() {
            let raw = std::fs::read(&path).map_err(|e| DependError::io(&path, e))?;
            let doc: CacheDocument =
                serde_json::from_slice(&raw).map_err(|source| DependError::Cache {
                    path: path.clone(),
                    source,
                })?;
            if doc.version != CACHE_VERSION {
                tracing::debug!(found = doc.version, "ignoring dependency cache of other version");
                BTreeMap::new()
            } else if doc.analyzer != analyzer {
                tracing::debug!(found = ?doc.analyzer, "ignoring dependency cache of other analyzer");
                BTreeMap::new()
            } else {
                doc.classes
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            analyzer,
            classes,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn analyzer(&self) -> AnalyzerKind {
        self.analyzer
    }

    /// Switch to another analyzer, dropping every entry the old one produced.
    pub fn rebind(&mut self, analyzer: AnalyzerKind) {
        if self.analyzer == analyzer {
            return;
        }
        self.analyzer = analyzer;
        self.classes.clear();
        self.dirty = true;
    }

    /// Cached dependencies of `class` if its class file is unchanged.
    pub fn get(&self, class: &str, modified: u64) -> Option<&[String]> {
        self.classes
            .get(class)
            .filter(|e| e.modified == modified)
            .map(|e| e.dependencies.as_slice())
    }

    pub fn put(&mut self, class: &str, modified: u64, dependencies: Vec<String>) {
        let entry = CacheEntry {
            modified,
            dependencies,
        };
        if self.classes.get(class) != Some(&entry) {
            self.classes.insert(class.to_string(), entry);
            self.dirty = true;
        }
    }

    /// Drop entries for classes that no longer exist.
    pub fn retain(&mut self, mut live: impl FnMut(&str) -> bool) {
        let before = self.classes.len();
        self.classes.retain(|k, _| live(k));
        if self.classes.len() != before {
            self.dirty = true;
        }
    }

    /// Write the cache if anything changed. Returns whether a write happened.
    pub fn save(&mut self) -> DependResult<bool> {
        if !self.dirty {
            return Ok(false);
        }

        let doc = CacheDocumentRef {
            version: CACHE_VERSION,
            analyzer: self.analyzer,
            classes: &self.classes,
        };
        let payload = serde_json::to_vec_pretty(&doc).map_err(|source| DependError::Cache {
            path: self.path.clone(),
            source,
        })?;

        let mut tmp_os = self.path.as_os_str().to_os_string();
        tmp_os.push(".tmp");
        let tmp = PathBuf::from(tmp_os);
        std::fs::write(&tmp, payload).map_err(|e| DependError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| DependError::io(&self.path, e))?;

        self.dirty = false;
        Ok(true)
    }
}
