//! # class-depend
//!
//! Dependency analysis over compiled Java class files.
//!
//! ## Architecture
//!
//! - **classfile**: Structural class-file parsing (constant pool, header, members)
//! - **analyzer**: Reference extraction strategies (full or ancestors only)
//! - **source**: Artifact lookup by class name in directories, jars and class paths
//! - **closure**: Frontier-by-frontier transitive closure to a fixpoint
//! - **select**: Candidate file spaces and projection of a closure onto files
//! - **scan**: Class name / path mapping and directory walking
//! - **cache**: Persistent cache of direct class dependencies
//! - **depend**: Out-of-date detection and deletion of affected class files
//! - **config**: Validated scan settings
//! - **error**: The `DependError` failure category

pub mod analyzer;
pub mod cache;
pub mod classfile;
pub mod cli;
pub mod closure;
pub mod config;
pub mod depend;
pub mod error;
pub mod scan;
pub mod select;
pub mod source;

pub use analyzer::{Analyzer, AnalyzerKind, ReferenceSet, extract_references};
pub use closure::{CancelToken, Closure, ClosureEngine, Unresolved, compute_closure};
pub use error::{DependError, DependResult, ParseError};
pub use select::{CandidateSpace, Selection, scan_dependencies, select_included};
pub use source::{ArtifactSource, ClassArtifact, ClassPath, DirectorySource, JarSource};
