//! Common utilities shared across CLI commands.

use std::path::Path;

use crate::error::CliError;

/// Parses a list file: one entry per line.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
pub fn parse_entries(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Reads a list file from disk.
pub fn read_entries(path: &Path) -> Result<Vec<String>, CliError> {
    let content = std::fs::read_to_string(path).map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })?;
    Ok(parse_entries(&content))
}

/// Combines entries given on the command line with those from a list file.
///
/// Command-line entries come first, in the order given.
pub fn collect_entries(inline: &[String], file: Option<&Path>) -> Result<Vec<String>, CliError> {
    let mut entries: Vec<String> = inline
        .iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();

    if let Some(path) = file {
        entries.extend(read_entries(path)?);
    }

    Ok(entries)
}
