//! Pattern files on disk.
//!
//! One regular expression per line. Surrounding whitespace is trimmed;
//! blank lines and lines starting with `#` are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::FilterRules;
use super::patterns::PatternSet;
use crate::error::ConfigError;

/// Whitelist and blacklist files, read in the configured order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSources {
    pub whitelist: Vec<PathBuf>,
    pub blacklist: Vec<PathBuf>,
}

impl FilterSources {
    /// Read and compile every file into a fresh rule pair.
    ///
    /// Nothing is returned unless every file reads and every pattern
    /// compiles.
    pub fn load(&self) -> Result<FilterRules, ConfigError> {
        let whitelist = PatternSet::compile(read_all(&self.whitelist)?)?;
        let blacklist = PatternSet::compile(read_all(&self.blacklist)?)?;

        Ok(FilterRules::new(whitelist, blacklist))
    }
}

fn read_all(paths: &[PathBuf]) -> Result<Vec<String>, ConfigError> {
    let mut patterns = Vec::new();
    for path in paths {
        let list = load_pattern_file(path)?;
        debug!(path = %path.display(), count = list.len(), "read pattern file");
        patterns.extend(list);
    }
    Ok(patterns)
}

/// Read one pattern file.
pub fn load_pattern_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(parse_pattern_list(&text))
}

/// Keep the meaningful lines of a pattern file.
pub fn parse_pattern_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
