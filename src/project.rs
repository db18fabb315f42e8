//! Project loading: scans directories for C# sources and registers them.
//!
//! Walks source files respecting .gitignore, parses them in parallel, and
//! hands the parsed units to a fresh resolver in path order.

use ignore::WalkBuilder;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::ModelConfig;
use crate::error::Result;
use crate::parser::{is_source_file, SourceTree, SourceUnit};
use crate::resolver::DeclarationResolver;

/// Every C# source under `root`, sorted. A file path is returned as is.
pub fn collect_sources(root: &Path) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }
    let mut files: Vec<PathBuf> = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .build()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .filter(|entry| is_source_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Parse `files` in parallel. Unreadable files are logged and skipped.
pub fn parse_sources(files: &[PathBuf]) -> Vec<SourceTree> {
    files
        .par_iter()
        .filter_map(|path| {
            let location = path.display().to_string();
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %location, error = %err, "skipping unreadable file");
                    return None;
                }
            };
            match SourceTree::parse(location.as_str(), text) {
                Ok(tree) => {
                    if tree.has_errors() {
                        warn!(path = %location, "source has syntax errors");
                    }
                    Some(tree)
                }
                Err(err) => {
                    warn!(path = %location, error = %err, "skipping unparsable file");
                    None
                }
            }
        })
        .collect()
}

/// Build a resolver holding an unloaded node for every declaration under `paths`.
pub fn load_project(paths: &[PathBuf], config: ModelConfig) -> Result<DeclarationResolver> {
    let files: Vec<PathBuf> = paths.iter().flat_map(|p| collect_sources(p)).collect();
    let trees = parse_sources(&files);

    let mut resolver = DeclarationResolver::new(config);
    let mut declarations = 0;
    for tree in trees {
        let unit = SourceUnit::from_tree(tree);
        declarations += resolver.add_source_unit(&unit)?.len();
    }
    info!(files = files.len(), declarations, "project registered");
    Ok(resolver)
}
