//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zettel_core::{codec::NoteCompiler, properties::SourceFile};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// The checked-in fixture collection.
#[allow(dead_code)]
pub fn notes_1_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("notes_1")
}

/// Read every file below `root` that `compiler` accepts, sorted by path.
#[allow(dead_code)]
pub fn load_sources(compiler: &NoteCompiler, root: &Path) -> Vec<SourceFile> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                pending.push(path);
            } else if compiler.accepts(&path) {
                let raw_text = std::fs::read_to_string(&path).unwrap();
                files.push(SourceFile::new(path, raw_text));
            }
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files
}

/// Create a small vault of three linked notes inside `temp_dir`.
///
/// `a.typ` links to `b.typ`, `b.typ` links to `c.typ`, `c.typ` links back to `a.typ`.
#[allow(dead_code)]
pub fn create_test_vault(temp_dir: &TempDir) -> PathBuf {
    let vault = temp_dir.path().join("vault");
    std::fs::create_dir(&vault).unwrap();
    write_note(&vault, "a.typ", "= A\n#link_note(\"./b.typ\") #tag(\"ring\")\n");
    write_note(&vault, "b.typ", "= B\n#link_note(\"./c.typ\") #tag(\"ring\")\n");
    write_note(&vault, "c.typ", "= C\n#link_note(\"./a.typ\")\n");
    vault
}

#[allow(dead_code)]
pub fn write_note(vault: &Path, name: &str, text: &str) -> SourceFile {
    let path = vault.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, text).unwrap();
    SourceFile::new(path, text)
}
