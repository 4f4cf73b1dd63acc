use anyhow::{Context, Result};
use clap::Parser;
use class_depend::analyzer::AnalyzerKind;
use class_depend::cli::{Cli, Commands, OutputFormat};
use class_depend::closure::CancelToken;
use class_depend::config::{DependConfig, ScanConfig};
use class_depend::depend::{self, DependReport};
use class_depend::scan::to_dotted_name;
use class_depend::select::{Selection, scan_dependencies};
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.clone() {
        Commands::Closure(args) => {
            let config = ScanConfig::from(&args);
            let cancel = CancelToken::new();
            install_interrupt(&cancel)?;
            let selection = scan_dependencies(&config, Some(cancel))
                .with_context(|| format!("dependency scan of {} failed", config.base_dir.display()))?;
            write_selection(&selection, args.format)?;
        }
        Commands::Refs {
            class_file,
            analyzer,
            format,
        } => {
            let refs = references_of(&class_file, analyzer)?;
            write_refs(&refs, format)?;
        }
        Commands::Depend(args) => {
            let config = DependConfig::from(&args);
            let report = depend::run(&config).context("depend failed")?;
            write_report(&report, args.format)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn install_interrupt(cancel: &CancelToken) -> Result<()> {
    let token = cancel.clone();
    ctrlc::set_handler(move || token.cancel()).context("Failed to install Ctrl-C handler")
}

#[derive(Debug, Serialize)]
struct RefsResult {
    class_file: String,
    references: Vec<String>,
}

fn references_of(class_file: &Path, analyzer: AnalyzerKind) -> Result<RefsResult> {
    let bytes = std::fs::read(class_file)
        .with_context(|| format!("Failed to read class file: {}", class_file.display()))?;
    let refs = analyzer
        .analyzer()
        .extract(&bytes)
        .with_context(|| format!("Malformed class file: {}", class_file.display()))?;
    Ok(RefsResult {
        class_file: class_file.to_string_lossy().to_string(),
        references: refs.iter().map(|r| to_dotted_name(r)).collect(),
    })
}

fn write_selection(selection: &Selection, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(selection)?),
        OutputFormat::Text => {
            for file in &selection.files {
                println!("{file}");
            }
        }
    }
    Ok(())
}

fn write_refs(refs: &RefsResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(refs)?),
        OutputFormat::Text => {
            for r in &refs.references {
                println!("{r}");
            }
        }
    }
    Ok(())
}

fn write_report(report: &DependReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => {
            let verb = if report.dry_run { "would delete" } else { "deleted" };
            println!(
                "classes: {}\nout_of_date: {}\n{verb}: {}",
                report.classes,
                report.out_of_date.len(),
                report.deleted.len()
            );
            for file in &report.deleted {
                println!("- {file}");
            }
        }
    }
    Ok(())
}
