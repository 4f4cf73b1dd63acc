use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::analyzer::AnalyzerKind;

#[derive(Debug, Clone, Parser)]
#[command(name = "class-depend")]
#[command(about = "Compute class-file dependency closures and prune stale compiled classes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log per-class diagnostics (same as RUST_LOG=debug)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// List the class files reachable from a set of root classes
    Closure(ClosureArgs),
    /// Print the classes referenced by one class file
    Refs {
        class_file: PathBuf,

        #[arg(long, value_enum, default_value_t = AnalyzerKind::Full)]
        analyzer: AnalyzerKind,

        #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Delete class files made stale by changed sources
    Depend(DependArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ClosureArgs {
    #[arg(long, value_name = "DIR")]
    pub base: PathBuf,

    /// Extra class directories or jars consulted after the base directory
    #[arg(long = "classpath", value_name = "PATH")]
    pub classpath: Vec<PathBuf>,

    #[arg(long = "root", value_name = "CLASS")]
    pub roots: Vec<String>,

    /// Glob over the base directory whose class files become roots
    #[arg(long = "root-include", value_name = "GLOB")]
    pub root_includes: Vec<String>,

    #[arg(long = "include", value_name = "GLOB")]
    pub includes: Vec<String>,

    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    #[arg(long, value_enum, default_value_t = AnalyzerKind::Full)]
    pub analyzer: AnalyzerKind,

    #[arg(long)]
    pub parallel: bool,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Args)]
pub struct DependArgs {
    #[arg(long = "srcdir", value_name = "DIR", required = true)]
    pub src_dirs: Vec<PathBuf>,

    /// Defaults to the first source directory
    #[arg(long = "destdir", value_name = "DIR")]
    pub dest_dir: Option<PathBuf>,

    /// Directory holding the dependency cache (or CLASS_DEPEND_CACHE)
    #[arg(long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    #[arg(long = "classpath", value_name = "PATH")]
    pub classpath: Vec<PathBuf>,

    #[arg(long = "include", value_name = "GLOB")]
    pub includes: Vec<String>,

    #[arg(long = "exclude", value_name = "GLOB")]
    pub excludes: Vec<String>,

    /// Propagate deletion through indirect dependents
    #[arg(long)]
    pub closure: bool,

    #[arg(long)]
    pub dump: bool,

    #[arg(long)]
    pub dry_run: bool,

    #[arg(long)]
    pub no_warn_rmi_stubs: bool,

    #[arg(long, value_enum, default_value_t = AnalyzerKind::Full)]
    pub analyzer: AnalyzerKind,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
