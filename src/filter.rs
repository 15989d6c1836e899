//! Validation of downloaded files against caller-supplied filters.
//!
//! Filters are pure predicates over a [`DownloadedFile`]. Their
//! [`description`](FileFilter::description) is spliced into failure messages,
//! so it is either empty or starts with a space (` with file name "x"`).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;

use crate::error::DownloadError;

/// A file the browser finished writing, before archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    path: PathBuf,
    headers: HashMap<String, String>,
}

impl DownloadedFile {
    /// Creates a file without metadata.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_headers(path, HashMap::new())
    }

    /// Creates a file with a metadata map (e.g. response headers).
    pub fn with_headers(path: impl Into<PathBuf>, headers: HashMap<String, String>) -> Self {
        Self {
            path: path.into(),
            headers,
        }
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name component, empty if the path has none.
    #[must_use]
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Metadata map, empty unless a metadata source supplied one.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }
}

/// Predicate deciding whether a downloaded file is the expected one.
pub trait FileFilter: Send + Sync {
    /// Returns `true` if the file is acceptable.
    fn matches(&self, file: &DownloadedFile) -> bool;

    /// Human readable description for error messages; empty or starting with a space.
    fn description(&self) -> String;
}

/// Accepts any file.
#[must_use]
pub fn none() -> NoFilter {
    NoFilter
}

/// Accepts files with exactly this name.
pub fn with_name(name: impl Into<String>) -> NameFilter {
    NameFilter { name: name.into() }
}

/// Accepts files whose name matches `pattern`.
///
/// # Errors
///
/// Returns the regex error if `pattern` is not a valid regular expression.
pub fn with_name_matching(pattern: &str) -> Result<NamePatternFilter, regex::Error> {
    Ok(NamePatternFilter {
        pattern: Regex::new(pattern)?,
    })
}

/// Accepts files with this extension, compared case-insensitively, with or without a leading dot.
pub fn with_extension(extension: impl Into<String>) -> ExtensionFilter {
    let extension = extension.into();
    ExtensionFilter {
        extension: extension.trim_start_matches('.').to_string(),
    }
}

/// See [`none`].
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl FileFilter for NoFilter {
    fn matches(&self, _file: &DownloadedFile) -> bool {
        true
    }

    fn description(&self) -> String {
        String::new()
    }
}

/// See [`with_name`].
#[derive(Debug, Clone)]
pub struct NameFilter {
    name: String,
}

impl FileFilter for NameFilter {
    fn matches(&self, file: &DownloadedFile) -> bool {
        file.name() == self.name
    }

    fn description(&self) -> String {
        format!(" with file name \"{}\"", self.name)
    }
}

/// See [`with_name_matching`].
#[derive(Debug, Clone)]
pub struct NamePatternFilter {
    pattern: Regex,
}

impl FileFilter for NamePatternFilter {
    fn matches(&self, file: &DownloadedFile) -> bool {
        self.pattern.is_match(&file.name())
    }

    fn description(&self) -> String {
        format!(" with file name matching \"{}\"", self.pattern.as_str())
    }
}

/// See [`with_extension`].
#[derive(Debug, Clone)]
pub struct ExtensionFilter {
    extension: String,
}

impl FileFilter for ExtensionFilter {
    fn matches(&self, file: &DownloadedFile) -> bool {
        file.path()
            .extension()
            .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(&self.extension))
    }

    fn description(&self) -> String {
        format!(" with extension \"{}\"", self.extension)
    }
}

/// Adapts a closure into a [`FileFilter`].
pub struct FnFilter<F> {
    description: String,
    predicate: F,
}

impl<F> FnFilter<F>
where
    F: Fn(&DownloadedFile) -> bool + Send + Sync,
{
    /// Creates a filter from a description and predicate.
    pub fn new(description: impl Into<String>, predicate: F) -> Self {
        Self {
            description: description.into(),
            predicate,
        }
    }
}

impl<F> fmt::Debug for FnFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnFilter")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F> FileFilter for FnFilter<F>
where
    F: Fn(&DownloadedFile) -> bool + Send + Sync,
{
    fn matches(&self, file: &DownloadedFile) -> bool {
        (self.predicate)(file)
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Checks `file` against `filter`.
///
/// # Errors
///
/// Returns [`DownloadError::FilterMismatch`] carrying `timeout`, the filter
/// description and the absolute path of the file.
pub fn verify(
    filter: &dyn FileFilter,
    file: &DownloadedFile,
    timeout: Duration,
) -> Result<(), DownloadError> {
    if filter.matches(file) {
        return Ok(());
    }
    let path = std::path::absolute(file.path()).unwrap_or_else(|_| file.path().to_path_buf());
    Err(DownloadError::filter_mismatch(
        timeout,
        filter.description(),
        path,
    ))
}
