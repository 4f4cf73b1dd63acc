//! Error types for dependency scanning.
//!
//! Everything that aborts a scan is a [`DependError`]. A referenced class with
//! no artifact on disk is not an error; see [`crate::closure::Unresolved`].

use std::path::PathBuf;
use thiserror::Error;

pub type DependResult<T> = Result<T, DependError>;

/// Structural failure while reading one class file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("bad magic number 0x{found:08X}")]
    BadMagic { found: u32 },

    #[error("truncated at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },

    #[error("{reason}")]
    Malformed { reason: String },

    #[error("constant pool index {index} out of range (pool size {size})")]
    BadIndex { index: u16, size: usize },

    #[error("constant pool index {index} is not a {expected} entry")]
    WrongKind { index: u16, expected: &'static str },

    #[error("malformed descriptor '{descriptor}'")]
    BadDescriptor { descriptor: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("base directory does not exist: {0}")]
    BaseDirMissing(PathBuf),

    #[error("base directory is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("source directory list must be non-empty")]
    NoSourceDirs,

    #[error("the cache, if specified, must point to a directory: {0}")]
    CacheNotADirectory(PathBuf),
}

/// The single failure category surfaced to callers.
#[derive(Error, Debug)]
pub enum DependError {
    #[error("cannot build dependency closure: malformed class file '{name}' at {path}: {source}")]
    ArtifactParse {
        name: String,
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("cannot build dependency closure: misconfigured scan: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot build dependency closure: cancelled after {passes} passes")]
    Cancelled { passes: usize },

    #[error("cannot build dependency closure: I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot build dependency closure: unreadable dependency cache {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot build dependency closure: invalid pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },
}

impl DependError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True when the failure comes from a corrupt artifact rather than from
    /// the way the scan was set up.
    pub fn is_malformed_artifact(&self) -> bool {
        matches!(self, Self::ArtifactParse { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
