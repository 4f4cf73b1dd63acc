use std::env;
use std::path::{Path, PathBuf};

use crate::analyzer::AnalyzerKind;
use crate::cli::{ClosureArgs, DependArgs};
use crate::error::ConfigError;

pub const CACHE_ENV: &str = "CLASS_DEPEND_CACHE";

#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    pub base_dir: PathBuf,
    pub classpath: Vec<PathBuf>,
    pub roots: Vec<String>,
    pub root_includes: Vec<String>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub analyzer: AnalyzerKind,
    pub parallel: bool,
}

impl ScanConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_roots<I, S>(mut self, roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roots.extend(roots.into_iter().map(Into::into));
        self
    }

    /// Checked before any class file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_dir.exists() {
            return Err(ConfigError::BaseDirMissing(self.base_dir.clone()));
        }
        if !self.base_dir.is_dir() {
            return Err(ConfigError::NotADirectory(self.base_dir.clone()));
        }
        Ok(())
    }
}

impl From<&ClosureArgs> for ScanConfig {
    fn from(args: &ClosureArgs) -> Self {
        Self {
            base_dir: args.base.clone(),
            classpath: args.classpath.clone(),
            roots: args.roots.clone(),
            root_includes: args.root_includes.clone(),
            includes: args.includes.clone(),
            excludes: args.excludes.clone(),
            analyzer: args.analyzer,
            parallel: args.parallel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependConfig {
    pub src_dirs: Vec<PathBuf>,
    pub dest_dir: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub classpath: Vec<PathBuf>,
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub closure: bool,
    pub warn_on_rmi_stubs: bool,
    pub dump: bool,
    pub dry_run: bool,
    pub analyzer: AnalyzerKind,
}

impl Default for DependConfig {
    fn default() -> Self {
        Self {
            src_dirs: Vec::new(),
            dest_dir: None,
            cache_dir: None,
            classpath: Vec::new(),
            includes: Vec::new(),
            excludes: Vec::new(),
            closure: false,
            warn_on_rmi_stubs: true,
            dump: false,
            dry_run: false,
            analyzer: AnalyzerKind::Full,
        }
    }
}

impl DependConfig {
    pub fn new<I, P>(src_dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            src_dirs: src_dirs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Where compiled classes live; the first source directory when unset.
    pub fn dest_dir(&self) -> &Path {
        self.dest_dir
            .as_deref()
            .or_else(|| self.src_dirs.first().map(PathBuf::as_path))
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.src_dirs.is_empty() {
            return Err(ConfigError::NoSourceDirs);
        }
        if let Some(cache) = self.cache_dir.as_deref()
            && cache.exists()
            && !cache.is_dir()
        {
            return Err(ConfigError::CacheNotADirectory(cache.to_path_buf()));
        }
        Ok(())
    }
}

impl From<&DependArgs> for DependConfig {
    fn from(args: &DependArgs) -> Self {
        Self {
            src_dirs: args.src_dirs.clone(),
            dest_dir: args.dest_dir.clone(),
            cache_dir: resolve_cache_dir(args.cache.clone()),
            classpath: args.classpath.clone(),
            includes: args.includes.clone(),
            excludes: args.excludes.clone(),
            closure: args.closure,
            warn_on_rmi_stubs: !args.no_warn_rmi_stubs,
            dump: args.dump,
            dry_run: args.dry_run,
            analyzer: args.analyzer,
        }
    }
}

/// Flag, then `CLASS_DEPEND_CACHE`, then no cache.
pub fn resolve_cache_dir(flag: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(p) = flag {
        return Some(p);
    }
    match env::var(CACHE_ENV) {
        Ok(p) if !p.trim().is_empty() => Some(PathBuf::from(p)),
        _ => None,
    }
}
