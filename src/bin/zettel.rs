//! zettel CLI tool
//!
//! Command-line interface for building the note graph of a Typst note collection.
//!
//! ## Commands
//!
//! - `graph <path>`: Compile every note and print the graph as JSON
//! - `check <path>`: Compile every note and print all diagnostics

use clap::{Parser, Subcommand};
use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};
use walkdir::{DirEntry, WalkDir};
use zettel_core::{
    codec::{NoteCompiler, ParseResult},
    config::{ConfigProvider, TomlConfigProvider},
    graph::{NoteGraph, NoteGraphHandle},
    properties::SourceFile,
    ZettelError,
};

#[derive(Parser)]
#[command(name = "zettel")]
#[command(author, version, about = "Build the link graph of a Typst note collection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile all notes below a directory and print the resulting graph as JSON
    Graph {
        /// Root directory of the note collection
        path: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Pretty-print the JSON output
        #[arg(short, long)]
        pretty: bool,
    },

    /// Compile all notes below a directory and report diagnostics
    Check {
        /// Root directory of the note collection
        path: PathBuf,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Also print warnings
        #[arg(short, long)]
        verbose: bool,
    },
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

fn load_compiler(root: &Path, config: Option<PathBuf>) -> Result<NoteCompiler, ZettelError> {
    let root = root.canonicalize()?;
    let config_path = config.unwrap_or_else(|| root.join("zettel.toml"));
    let config = TomlConfigProvider::new(config_path).get_config()?;
    NoteCompiler::new(root, config)
}

fn read_sources(compiler: &NoteCompiler) -> Result<Vec<SourceFile>, ZettelError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(compiler.root())
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry))
    {
        let entry = entry.map_err(|e| ZettelError::Io(e.to_string()))?;
        if !entry.file_type().is_file() || !compiler.accepts(entry.path()) {
            continue;
        }
        let raw_text = std::fs::read_to_string(entry.path())?;
        files.push(SourceFile::new(entry.path(), raw_text));
    }
    tracing::info!("Found {} note(s) below {:?}", files.len(), compiler.root());
    Ok(files)
}

fn compile_all(compiler: &NoteCompiler) -> Result<Vec<ParseResult>, ZettelError> {
    let files = read_sources(compiler)?;
    let mut results = Vec::with_capacity(files.len());
    for (file, result) in files.iter().zip(compiler.compile_batch(&files)) {
        match result {
            Ok(result) => results.push(result),
            Err(e) => tracing::warn!("Skipping {:?}: {}", file.path, e),
        }
    }
    Ok(results)
}

/// Feed every result through the aggregator and wait for it to settle.
fn aggregate(results: &[ParseResult]) -> Result<NoteGraph, ZettelError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let (handle, join) = NoteGraphHandle::spawn(NoteGraph::new(), None);
        for result in results.iter().cloned() {
            handle.submit(result)?;
        }
        let version = handle.flush().await?;
        let graph = handle.snapshot();
        drop(handle);
        join.await
            .map_err(|e| ZettelError::Channel(format!("aggregator task failed: {e}")))?;
        tracing::debug!("Graph settled at version {version}");
        Ok::<NoteGraph, ZettelError>(graph)
    })
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Graph {
            path,
            config,
            pretty,
        } => {
            let compiler = load_compiler(&path, config)?;
            let results = compile_all(&compiler)?;
            let graph = aggregate(&results)?;
            let errors = graph.built_in_test();
            if !errors.is_empty() {
                tracing::error!("Graph is inconsistent:\n{}", errors.join("\n"));
            }
            let json = if pretty {
                serde_json::to_string_pretty(&graph)?
            } else {
                serde_json::to_string(&graph)?
            };
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Commands::Check {
            path,
            config,
            verbose,
        } => {
            let compiler = load_compiler(&path, config)?;
            let results = compile_all(&compiler)?;
            let graph = aggregate(&results)?;

            let mut error_count = 0;
            let mut warning_count = 0;
            for result in results.iter() {
                // Failed parses have no record in the graph; report them from the scan itself.
                let diagnostics = if graph.contains(&result.id) {
                    graph.diagnostics_for(&result.id)
                } else {
                    result.diagnostics.clone()
                };
                for diagnostic in diagnostics.iter() {
                    if diagnostic.is_error() {
                        error_count += 1;
                        println!("error: {}: {diagnostic}", result.id);
                    } else {
                        warning_count += 1;
                        if verbose {
                            println!("warning: {}: {diagnostic}", result.id);
                        }
                    }
                }
            }
            println!(
                "{} note(s), {error_count} error(s), {warning_count} warning(s)",
                results.len()
            );
            Ok(if error_count > 0 {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
    }
}
