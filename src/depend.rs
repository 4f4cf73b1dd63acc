//! Stale class detection.
//!
//! Builds the direct dependency graph of every class file in the destination
//! directory, works out which classes are out of date with respect to their
//! sources or to class path files, and deletes every class file that depends
//! on an out-of-date class so the next compile rebuilds it.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analyzer::Analyzer;
use crate::cache::DependencyCache;
use crate::config::DependConfig;
use crate::error::{DependError, DependResult};
use crate::scan::{
    SOURCE_SUFFIX, modified_nanos, scan_class_files, scan_source_files, to_dotted_name,
    top_level_name,
};
use crate::select::build_overrides;
use crate::source::{ArtifactSource, ClassPath};

const RMI_STUB_SUFFIXES: [&str; 4] = ["_Stub", "_Skel", "_WLStub", "_WLSkel"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: String,
    pub class_file: PathBuf,
    pub source_file: Option<PathBuf>,
    pub modified: u64,
}

#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub classes: BTreeMap<String, ClassInfo>,
    /// Direct dependencies of each class, itself excluded.
    pub dependencies: BTreeMap<String, BTreeSet<String>>,
    /// Reverse of `dependencies`: class -> classes that reference it.
    pub affects: BTreeMap<String, BTreeSet<String>>,
    /// Class path files (jars or class files) each class depends on.
    pub classpath_files: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl DependencyGraph {
    pub fn build(config: &DependConfig, mut cache: Option<&mut DependencyCache>) -> DependResult<Self> {
        let analyzer = config.analyzer.analyzer();
        let dest = config.dest_dir();
        let mut graph = Self::default();

        if let Some(c) = cache.as_deref_mut() {
            c.rebind(config.analyzer);
        }

        let class_files = if dest.is_dir() {
            scan_class_files(dest)
        } else {
            Vec::new()
        };

        for (name, class_file) in class_files {
            debug!(class = %name, "adding class info");
            let modified = modified_nanos(&class_file);
            let source_file = find_source_file(&name, &config.src_dirs);

            let cached = cache
                .as_deref()
                .and_then(|c| c.get(&name, modified))
                .map(<[String]>::to_vec);
            let deps = match cached {
                Some(deps) => deps,
                None => {
                    let deps = direct_dependencies(analyzer, &name, &class_file)?;
                    if let Some(c) = cache.as_deref_mut() {
                        c.put(&name, modified, deps.clone());
                    }
                    deps
                }
            };

            for dep in &deps {
                graph
                    .affects
                    .entry(dep.clone())
                    .or_default()
                    .insert(name.clone());
            }
            graph
                .dependencies
                .insert(name.clone(), deps.into_iter().collect());
            graph.classes.insert(
                name.clone(),
                ClassInfo {
                    name,
                    class_file,
                    source_file,
                    modified,
                },
            );
        }

        if let Some(c) = cache {
            c.retain(|name| graph.classes.contains_key(name));
        }

        graph.classpath_files = classpath_dependencies(config, &graph.dependencies)?;
        Ok(graph)
    }

    /// Log the reverse dependency map and class path file dependencies.
    pub fn dump(&self) {
        debug!("reverse dependency dump for {} classes:", self.affects.len());
        for (class, affected) in &self.affects {
            debug!(" class {class} affects:");
            for a in affected {
                let path = self
                    .classes
                    .get(a)
                    .map(|i| i.class_file.display().to_string())
                    .unwrap_or_default();
                debug!("    {a} in {path}");
            }
        }

        if !self.classpath_files.is_empty() {
            debug!("class path file dependencies (forward):");
            for (class, files) in &self.classpath_files {
                debug!(" class {class} depends on:");
                for f in files {
                    debug!("    {}", f.display());
                }
            }
        }
    }
}

fn direct_dependencies(analyzer: &dyn Analyzer, name: &str, class_file: &Path) -> DependResult<Vec<String>> {
    let bytes = std::fs::read(class_file).map_err(|e| DependError::io(class_file, e))?;
    let refs = analyzer
        .extract(&bytes)
        .map_err(|source| DependError::ArtifactParse {
            name: name.to_string(),
            path: class_file.to_path_buf(),
            source,
        })?;
    Ok(refs.into_iter().filter(|r| r != name).collect())
}

/// The `.java` file a class was compiled from: the top-level class name
/// looked up under each source directory in order.
fn find_source_file(name: &str, src_dirs: &[PathBuf]) -> Option<PathBuf> {
    let rel = format!("{}{SOURCE_SUFFIX}", top_level_name(name));
    src_dirs
        .iter()
        .map(|dir| dir.join(&rel))
        .find(|candidate| candidate.is_file())
}

/// Class path entries minus the destination directory.
fn check_classpath(config: &DependConfig) -> Vec<PathBuf> {
    let dest = config.dest_dir();
    config
        .classpath
        .iter()
        .filter(|p| p.as_path() != dest)
        .cloned()
        .collect()
}

fn classpath_dependencies(
    config: &DependConfig,
    dependencies: &BTreeMap<String, BTreeSet<String>>,
) -> DependResult<BTreeMap<String, BTreeSet<PathBuf>>> {
    let entries = check_classpath(config);
    if entries.is_empty() {
        return Ok(BTreeMap::new());
    }
    let classpath = ClassPath::from_paths(&entries)?;

    let mut located: BTreeMap<&str, Option<PathBuf>> = BTreeMap::new();
    let mut result = BTreeMap::new();
    for (class, deps) in dependencies {
        let mut files = BTreeSet::new();
        for dep in deps {
            if dep.starts_with("java/") || dep.starts_with("javax/") {
                continue;
            }
            let file = located
                .entry(dep.as_str())
                .or_insert_with(|| classpath.locate(dep));
            if let Some(file) = file {
                debug!(class = %class, file = %file.display(), due_to = %dep, "class path dependency");
                files.insert(file.clone());
            }
        }
        result.insert(class.clone(), files);
    }
    Ok(result)
}

/// Classes whose source is newer than their class file (or that have no
/// class file yet), plus classes depending on a newer class path file.
pub fn out_of_date_classes(graph: &DependencyGraph, config: &DependConfig) -> DependResult<BTreeSet<String>> {
    let mut out = BTreeSet::new();

    for src_dir in &config.src_dirs {
        if !src_dir.is_dir() {
            continue;
        }
        let overrides = build_overrides(src_dir, &config.includes, &config.excludes)?;
        for (name, source) in scan_source_files(src_dir, overrides) {
            match graph.classes.get(&name) {
                None => {
                    debug!(class = %name, "no class file for source");
                    out.insert(name);
                }
                Some(info) if modified_nanos(&source) > info.modified => {
                    debug!(class = %name, "source newer than class file");
                    out.insert(name);
                }
                Some(_) => {}
            }
        }
    }

    for (class, files) in &graph.classpath_files {
        if out.contains(class) {
            continue;
        }
        let Some(info) = graph.classes.get(class) else {
            continue;
        };
        if let Some(newer) = files.iter().find(|f| modified_nanos(f) > info.modified) {
            debug!(class = %class, file = %newer.display(), "out of date with respect to class path file");
            out.insert(class.clone());
        }
    }

    Ok(out)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    /// Class names scheduled for deletion, in scheduling order.
    pub classes: Vec<String>,
    /// Affected classes left alone because their source could not be found.
    pub kept_without_source: BTreeSet<String>,
}

struct Planner<'a> {
    graph: &'a DependencyGraph,
    closure: bool,
    warn_on_rmi_stubs: bool,
    scheduled: BTreeSet<String>,
    plan: DeletionPlan,
}

impl Planner<'_> {
    fn schedule(&mut self, class: &str) -> bool {
        if !self.scheduled.insert(class.to_string()) {
            return false;
        }
        self.plan.classes.push(class.to_string());
        true
    }

    fn affected(&mut self, class: &str) {
        let graph = self.graph;
        let Some(affected) = graph.affects.get(class) else {
            return;
        };
        for a in affected {
            if self.scheduled.contains(a) {
                continue;
            }
            let Some(info) = graph.classes.get(a) else {
                continue;
            };
            if info.source_file.is_none() {
                self.warn_no_source(info, class);
                continue;
            }

            debug!(file = %info.class_file.display(), because = %class, "deleting out of date dependent");
            self.schedule(a);
            if self.closure {
                self.affected(a);
                continue;
            }

            // Deleting only an inner class would not trigger a recompile.
            if !a.contains('$') {
                continue;
            }
            let top = top_level_name(a);
            if graph.classes.contains_key(top) && self.schedule(top) {
                debug!(class = %top, "deleting top level class since one of its inner classes was removed");
            }
        }
    }

    fn warn_no_source(&mut self, info: &ClassInfo, cause: &str) {
        if !self.plan.kept_without_source.insert(info.name.clone()) {
            return;
        }
        let quiet = !self.warn_on_rmi_stubs && is_rmi_stub(&info.name, cause);
        let msg = format!(
            "the class {} in file {} is out of date due to {} but has not been deleted because its source file could not be determined",
            to_dotted_name(&info.name),
            info.class_file.display(),
            to_dotted_name(cause)
        );
        if quiet {
            debug!("{msg}");
        } else {
            warn!("{msg}");
        }
    }
}

fn is_rmi_stub(affected: &str, base: &str) -> bool {
    RMI_STUB_SUFFIXES
        .iter()
        .any(|suffix| affected.strip_prefix(base) == Some(*suffix))
}

pub fn plan_deletions(
    graph: &DependencyGraph,
    out_of_date: &BTreeSet<String>,
    closure: bool,
    warn_on_rmi_stubs: bool,
) -> DeletionPlan {
    let mut planner = Planner {
        graph,
        closure,
        warn_on_rmi_stubs,
        scheduled: BTreeSet::new(),
        plan: DeletionPlan::default(),
    };
    for class in out_of_date {
        planner.affected(class);
        if graph.classes.contains_key(class) {
            planner.schedule(class);
        }
    }
    planner.plan
}

#[derive(Debug, Clone, Serialize)]
pub struct DependReport {
    pub classes: usize,
    pub out_of_date: Vec<String>,
    pub deleted: Vec<String>,
    pub kept_without_source: Vec<String>,
    pub dry_run: bool,
    pub cache_written: bool,
    pub duration_ms: u64,
}

pub fn run(config: &DependConfig) -> DependResult<DependReport> {
    let start = Instant::now();
    config.validate()?;

    let mut cache = match config.cache_dir.as_deref() {
        Some(dir) => Some(DependencyCache::open(dir, config.analyzer)?),
        None => None,
    };

    let graph = DependencyGraph::build(config, cache.as_mut())?;
    if config.dump {
        graph.dump();
    }

    let out_of_date = out_of_date_classes(&graph, config)?;
    let plan = plan_deletions(&graph, &out_of_date, config.closure, config.warn_on_rmi_stubs);

    let mut deleted = Vec::new();
    for class in &plan.classes {
        let Some(info) = graph.classes.get(class) else {
            continue;
        };
        if !info.class_file.exists() {
            continue;
        }
        if !config.dry_run {
            std::fs::remove_file(&info.class_file).map_err(|e| DependError::io(&info.class_file, e))?;
        }
        deleted.push(info.class_file.to_string_lossy().to_string());
    }

    let cache_written = match cache.as_mut() {
        Some(c) => c.save()?,
        None => false,
    };

    let duration = start.elapsed();
    if deleted.is_empty() {
        debug!("deleted 0 out of date files in {}ms", duration.as_millis());
    } else {
        info!(
            dry_run = config.dry_run,
            "deleted {} out of date files in {}ms",
            deleted.len(),
            duration.as_millis()
        );
    }

    Ok(DependReport {
        classes: graph.classes.len(),
        out_of_date: out_of_date.into_iter().collect(),
        deleted,
        kept_without_source: plan.kept_without_source.into_iter().collect(),
        dry_run: config.dry_run,
        cache_written,
        duration_ms: duration.as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(name: &str, with_source: bool) -> ClassInfo {
        ClassInfo {
            name: name.to_string(),
            class_file: PathBuf::from(format!("{name}.class")),
            source_file: with_source.then(|| PathBuf::from(format!("{}.java", top_level_name(name)))),
            modified: 0,
        }
    }

    /// `edges` are (class, dependency) pairs.
    fn graph(classes: &[(&str, bool)], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::default();
        for (name, src) in classes {
            g.classes.insert(name.to_string(), info(name, *src));
        }
        for (class, dep) in edges {
            g.dependencies
                .entry(class.to_string())
                .or_default()
                .insert(dep.to_string());
            g.affects
                .entry(dep.to_string())
                .or_default()
                .insert(class.to_string());
        }
        g
    }

    fn ood(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn direct_dependents_are_deleted_without_closure() {
        let g = graph(
            &[("A", true), ("B", true), ("C", true)],
            &[("B", "A"), ("C", "B")],
        );
        let plan = plan_deletions(&g, &ood(&["A"]), false, true);
        assert_eq!(plan.classes, vec!["B", "A"]);
    }

    #[test]
    fn closure_propagates_to_indirect_dependents() {
        let g = graph(
            &[("A", true), ("B", true), ("C", true)],
            &[("B", "A"), ("C", "B")],
        );
        let plan = plan_deletions(&g, &ood(&["A"]), true, true);
        assert_eq!(plan.classes, vec!["B", "C", "A"]);
    }

    #[test]
    fn closure_handles_dependency_cycles() {
        let g = graph(&[("A", true), ("B", true)], &[("A", "B"), ("B", "A")]);
        let plan = plan_deletions(&g, &ood(&["A"]), true, true);
        assert_eq!(plan.classes, vec!["B", "A"]);
    }

    #[test]
    fn inner_class_drags_in_its_top_level_class() {
        let g = graph(
            &[("A", true), ("Outer", true), ("Outer$Inner", true)],
            &[("Outer$Inner", "A")],
        );
        let plan = plan_deletions(&g, &ood(&["A"]), false, true);
        assert_eq!(plan.classes, vec!["Outer$Inner", "Outer", "A"]);
    }

    #[test]
    fn classes_without_source_are_kept() {
        let g = graph(&[("A", true), ("Gen", false)], &[("Gen", "A")]);
        let plan = plan_deletions(&g, &ood(&["A"]), true, true);
        assert_eq!(plan.classes, vec!["A"]);
        assert!(plan.kept_without_source.contains("Gen"));
    }

    #[test]
    fn out_of_date_class_without_class_file_only_deletes_dependents() {
        let g = graph(&[("B", true)], &[("B", "New")]);
        let plan = plan_deletions(&g, &ood(&["New"]), false, true);
        assert_eq!(plan.classes, vec!["B"]);
    }

    #[test]
    fn rmi_stub_names_are_recognised() {
        assert!(is_rmi_stub("a/Remote_Stub", "a/Remote"));
        assert!(is_rmi_stub("a/Remote_WLSkel", "a/Remote"));
        assert!(!is_rmi_stub("a/Remote_Other", "a/Remote"));
        assert!(!is_rmi_stub("a/Other_Stub", "a/Remote"));
    }
}
