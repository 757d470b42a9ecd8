//! Locating results files and parsing them one at a time.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use super::error::ParseError;
use super::log_parser::parse_results_file;
use super::types::{MeasureFilter, ParsedFile};

/// Find every file called `filename` under `root`, sorted by full path string.
///
/// Hidden directories are skipped and symlinked directories followed.
/// Finding nothing is an error, not an empty result.
pub fn find_results_files(root: &Path, filename: &str) -> Result<Vec<PathBuf>, ParseError> {
    let mut files = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|source| ParseError::Discovery {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name().to_str() == Some(filename) {
            files.push(entry.into_path());
        }
    }

    if files.is_empty() {
        return Err(ParseError::NoFilesFound {
            root: root.to_path_buf(),
            filename: filename.to_string(),
        });
    }

    // Walk order depends on the filesystem. Compare whole strings, not
    // components, so `run-2/` sorts before `run/`.
    files.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

/// Lazy sequence of parsed results files.
///
/// Each file is read only when the iterator is advanced, so at most one
/// file's data is held at a time. The sequence stops after the first error.
pub struct ResultFiles<'f> {
    files: std::vec::IntoIter<PathBuf>,
    filter: &'f MeasureFilter,
    failed: bool,
}

impl<'f> ResultFiles<'f> {
    /// Discover files eagerly, parse them lazily
    pub fn open(root: &Path, filename: &str, filter: &'f MeasureFilter) -> Result<Self, ParseError> {
        let files = find_results_files(root, filename)?;
        log::info!("Found {} results files named {} under {}", files.len(), filename, root.display());
        Ok(Self::from_paths(files, filter))
    }

    pub fn from_paths(files: Vec<PathBuf>, filter: &'f MeasureFilter) -> Self {
        Self {
            files: files.into_iter(),
            filter,
            failed: false,
        }
    }

    /// Files not yet parsed
    pub fn remaining(&self) -> usize {
        if self.failed {
            0
        } else {
            self.files.len()
        }
    }
}

impl Iterator for ResultFiles<'_> {
    type Item = Result<ParsedFile, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let path = self.files.next()?;
        log::info!("Processing {}", path.display());

        let result = parse_results_file(&path, self.filter);
        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const RESULTS: &str = "Castalia| repeat:0 label:run\nCastalia|\tmodule:SN.node[0].Radio\nCastalia|\t\tsimple output name:TXed pkts\nCastalia|\t\t\t3 TX pkts\n";

    #[test]
    fn test_find_sorted_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/inner")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join("b/inner/results.txt"), RESULTS).unwrap();
        fs::write(dir.path().join("a/results.txt"), RESULTS).unwrap();
        fs::write(dir.path().join("a/other.txt"), RESULTS).unwrap();

        let files = find_results_files(dir.path(), "results.txt").unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("a/results.txt"), dir.path().join("b/inner/results.txt")]
        );
    }

    #[test]
    fn test_sorted_by_whole_path_string() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("run")).unwrap();
        fs::create_dir_all(dir.path().join("run-2")).unwrap();
        fs::write(dir.path().join("run/results.txt"), RESULTS).unwrap();
        fs::write(dir.path().join("run-2/results.txt"), RESULTS).unwrap();

        let files = find_results_files(dir.path(), "results.txt").unwrap();
        assert_eq!(
            files,
            vec![dir.path().join("run-2/results.txt"), dir.path().join("run/results.txt")]
        );
    }

    #[test]
    fn test_hidden_directories_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".cache")).unwrap();
        fs::create_dir_all(dir.path().join("a")).unwrap();
        fs::write(dir.path().join(".cache/results.txt"), RESULTS).unwrap();
        fs::write(dir.path().join("a/results.txt"), RESULTS).unwrap();

        let files = find_results_files(dir.path(), "results.txt").unwrap();
        assert_eq!(files, vec![dir.path().join("a/results.txt")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directories_followed() {
        let dir = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        fs::write(target.path().join("results.txt"), RESULTS).unwrap();
        std::os::unix::fs::symlink(target.path(), dir.path().join("linked")).unwrap();

        let files = find_results_files(dir.path(), "results.txt").unwrap();
        assert_eq!(files, vec![dir.path().join("linked/results.txt")]);
    }

    #[test]
    fn test_no_files_is_error() {
        let dir = TempDir::new().unwrap();
        let err = find_results_files(dir.path(), "results.txt").unwrap_err();
        assert!(matches!(err, ParseError::NoFilesFound { .. }));
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("1")).unwrap();
        fs::create_dir_all(dir.path().join("2")).unwrap();
        fs::create_dir_all(dir.path().join("3")).unwrap();
        fs::write(dir.path().join("1/results.txt"), RESULTS).unwrap();
        fs::write(dir.path().join("2/results.txt"), "not a results line\n").unwrap();
        fs::write(dir.path().join("3/results.txt"), RESULTS).unwrap();

        let filter = MeasureFilter::all();
        let mut files = ResultFiles::open(dir.path(), "results.txt", &filter).unwrap();
        assert_eq!(files.remaining(), 3);
        assert!(files.next().unwrap().is_ok());
        assert!(files.next().unwrap().is_err());
        assert!(files.next().is_none());
    }
}
