//! Projection of a closure back onto files.
//!
//! A closure is a set of class names. [`select_included`] maps each name to
//! its relative class file path and keeps the ones that exist under the base
//! directory and, when a [`CandidateSpace`] is given, are part of it.

use ignore::overrides::{Override, OverrideBuilder};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info};

use crate::closure::{CancelToken, Closure, ClosureEngine};
use crate::config::ScanConfig;
use crate::error::{DependError, DependResult};
use crate::scan::{class_name_to_class_path, class_path_to_class_name, relative_slash_path, walk_files};
use crate::source::ClassPath;

/// Relative file paths (with `/` separators) considered in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSpace {
    paths: BTreeSet<String>,
}

impl CandidateSpace {
    pub fn from_paths<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            paths: paths
                .into_iter()
                .map(|p| p.as_ref().replace('\\', "/"))
                .collect(),
        }
    }

    /// Files under `base` matching any include glob and no exclude glob.
    /// No includes means everything is included.
    pub fn scan(base: &Path, includes: &[String], excludes: &[String]) -> DependResult<Self> {
        let overrides = build_overrides(base, includes, excludes)?;
        let paths = walk_files(base, overrides)
            .into_iter()
            .filter_map(|p| relative_slash_path(base, &p))
            .collect();
        Ok(Self { paths })
    }

    pub fn contains(&self, rel_path: &str) -> bool {
        self.paths.contains(rel_path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

pub(crate) fn build_overrides(
    base: &Path,
    includes: &[String],
    excludes: &[String],
) -> DependResult<Option<Override>> {
    if includes.is_empty() && excludes.is_empty() {
        return Ok(None);
    }

    let mut builder = OverrideBuilder::new(base);
    for pattern in includes {
        builder.add(pattern).map_err(|source| DependError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
    }
    for pattern in excludes {
        builder
            .add(&format!("!{pattern}"))
            .map_err(|source| DependError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
    }
    let built = builder.build().map_err(|source| DependError::Pattern {
        pattern: includes.iter().chain(excludes).cloned().collect::<Vec<_>>().join(","),
        source,
    })?;
    Ok(Some(built))
}

/// Root class names from the class files of a candidate space.
pub fn roots_from_space(space: &CandidateSpace) -> Vec<String> {
    space.iter().filter_map(class_path_to_class_name).collect()
}

/// Sorted relative paths of closure members that exist under `base_dir` and,
/// if `candidates` is given, belong to it.
pub fn select_included(
    classes: &BTreeSet<String>,
    base_dir: &Path,
    candidates: Option<&CandidateSpace>,
) -> Vec<String> {
    let mut selected: Vec<String> = classes
        .iter()
        .filter_map(|name| {
            let rel = class_name_to_class_path(name);
            if let Some(space) = candidates
                && !space.contains(&rel)
            {
                return None;
            }
            base_dir.join(&rel).is_file().then_some(rel)
        })
        .collect();
    selected.sort();
    selected
}

#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub base_dir: String,
    pub files: Vec<String>,
    pub closure: Closure,
}

/// Full pipeline: validate, collect roots, close over them, project to files.
pub fn scan_dependencies(config: &ScanConfig, cancel: Option<CancelToken>) -> DependResult<Selection> {
    config.validate()?;

    let mut roots = config.roots.clone();
    if !config.root_includes.is_empty() {
        let root_space = CandidateSpace::scan(&config.base_dir, &config.root_includes, &[])?;
        roots.extend(roots_from_space(&root_space));
    }
    debug!(roots = roots.len(), base = %config.base_dir.display(), "collected root classes");

    let mut entries = vec![config.base_dir.clone()];
    entries.extend(config.classpath.iter().cloned());
    let classpath = ClassPath::from_paths(&entries)?;

    let mut engine = ClosureEngine::new(&classpath, config.analyzer.analyzer()).parallel(config.parallel);
    if let Some(token) = cancel {
        engine = engine.with_cancel(token);
    }
    let closure = engine.compute(&roots)?;

    let candidates = if config.includes.is_empty() && config.excludes.is_empty() {
        None
    } else {
        Some(CandidateSpace::scan(&config.base_dir, &config.includes, &config.excludes)?)
    };
    let files = select_included(&closure.classes, &config.base_dir, candidates.as_ref());

    info!(
        classes = closure.classes.len(),
        files = files.len(),
        passes = closure.passes,
        "dependency scan finished"
    );

    Ok(Selection {
        base_dir: config.base_dir.to_string_lossy().to_string(),
        files,
        closure,
    })
}
