//! Transitive dependency closure over class artifacts.
//!
//! Starting from a set of root names the engine expands one frontier per
//! pass: every name in the frontier is resolved through an
//! [`ArtifactSource`], its references are extracted, and the names not seen
//! before form the next frontier. The loop stops when a pass discovers
//! nothing new.
//!
//! A name that resolves to nothing stays in the closure (it was referenced)
//! but is never expanded; the reason is recorded as [`Unresolved`]. A class
//! file that exists but cannot be parsed aborts the whole computation.

use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, trace};

use crate::analyzer::{Analyzer, FullAnalyzer, ReferenceSet};
use crate::error::{DependError, DependResult};
use crate::scan::to_internal_name;
use crate::source::ArtifactSource;

/// Shared flag checked between passes.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "lowercase")]
pub enum Unresolved {
    /// No artifact exists for the name.
    Missing,
    /// Something exists but reading it failed.
    Unreadable(String),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Closure {
    /// Every name reached, roots included.
    pub classes: BTreeSet<String>,
    /// Names whose artifact was found and expanded.
    pub expanded: BTreeSet<String>,
    pub unresolved: BTreeMap<String, Unresolved>,
    pub passes: usize,
    /// Artifact lookups performed.
    pub reads: usize,
}

impl Closure {
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains(name)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

enum Expansion {
    Found(ReferenceSet),
    Unresolved(Unresolved),
}

pub struct ClosureEngine<'a> {
    source: &'a dyn ArtifactSource,
    analyzer: &'a dyn Analyzer,
    parallel: bool,
    cancel: Option<CancelToken>,
}

impl<'a> ClosureEngine<'a> {
    pub fn new(source: &'a dyn ArtifactSource, analyzer: &'a dyn Analyzer) -> Self {
        Self {
            source,
            analyzer,
            parallel: false,
            cancel: None,
        }
    }

    /// Expand each frontier on the rayon pool. Passes stay sequential.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn compute<I, S>(&self, roots: I) -> DependResult<Closure>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut closure = Closure::default();
        let mut visited: BTreeSet<String> = BTreeSet::new();

        let mut frontier: BTreeSet<String> = roots
            .into_iter()
            .map(|r| to_internal_name(r.as_ref()))
            .filter(|r| !r.is_empty())
            .collect();
        closure.classes.extend(frontier.iter().cloned());

        while !frontier.is_empty() {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                return Err(DependError::Cancelled {
                    passes: closure.passes,
                });
            }

            let todo: Vec<&String> = frontier.iter().filter(|n| !visited.contains(*n)).collect();
            trace!(pass = closure.passes + 1, frontier = todo.len(), "expanding frontier");

            let results: Vec<(String, Expansion)> = if self.parallel {
                todo.par_iter()
                    .map(|name| self.expand_one(name).map(|e| ((*name).clone(), e)))
                    .collect::<DependResult<_>>()?
            } else {
                todo.iter()
                    .map(|name| self.expand_one(name).map(|e| ((*name).clone(), e)))
                    .collect::<DependResult<_>>()?
            };

            let expanded_before = closure.expanded.len();
            let mut discovered = BTreeSet::new();
            for (name, expansion) in results {
                closure.reads += 1;
                visited.insert(name.clone());
                match expansion {
                    Expansion::Found(refs) => {
                        closure.expanded.insert(name);
                        discovered.extend(refs);
                    }
                    Expansion::Unresolved(reason) => {
                        closure.unresolved.insert(name, reason);
                    }
                }
            }

            // a pass that only met dangling names expanded nothing
            if closure.expanded.len() > expanded_before {
                closure.passes += 1;
            }

            let next: BTreeSet<String> = discovered
                .into_iter()
                .filter(|n| !closure.classes.contains(n))
                .collect();
            closure.classes.extend(next.iter().cloned());
            frontier = next;
        }

        debug!(
            classes = closure.classes.len(),
            expanded = closure.expanded.len(),
            unresolved = closure.unresolved.len(),
            passes = closure.passes,
            "dependency closure complete"
        );
        Ok(closure)
    }

    fn expand_one(&self, name: &str) -> DependResult<Expansion> {
        match self.source.load(name) {
            Ok(Some(artifact)) => {
                let refs = self.analyzer.extract(&artifact.bytes).map_err(|source| {
                    DependError::ArtifactParse {
                        name: name.to_string(),
                        path: artifact.origin.clone(),
                        source,
                    }
                })?;
                Ok(Expansion::Found(refs))
            }
            Ok(None) => {
                debug!(class = name, "no artifact for referenced class, not expanding");
                Ok(Expansion::Unresolved(Unresolved::Missing))
            }
            Err(e) => {
                debug!(class = name, error = %e, "artifact unreadable, not expanding");
                Ok(Expansion::Unresolved(Unresolved::Unreadable(e.to_string())))
            }
        }
    }
}

/// Sequential closure with the full analyzer.
pub fn compute_closure<I, S>(roots: I, source: &dyn ArtifactSource) -> DependResult<Closure>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ClosureEngine::new(source, &FullAnalyzer).compute(roots)
}
