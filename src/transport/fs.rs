use std::ffi::OsString;
use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::constants::picker::{MARKER_SUFFIX, SKIP_UNREADABLE_MSG};

/// A fortune database discovered under the corpus root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EligibleFile {
    /// Path as produced by the directory walk.
    pub path: PathBuf,
    /// Size in bytes at enumeration time.
    pub len: u64,
}

/// Filesystem transport that enumerates marked fortune files under a root.
pub struct CorpusWalk {
    root: PathBuf,
    follow_links: bool,
    marker_suffix: String,
}

impl CorpusWalk {
    /// Create a walk rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            follow_links: false,
            marker_suffix: MARKER_SUFFIX.to_string(),
        }
    }

    /// Configure symlink traversal.
    pub fn with_follow_symlinks(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    /// Configure the sibling marker suffix.
    pub fn with_marker_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.marker_suffix = suffix.into();
        self
    }

    /// Collect every regular file that has a marker sibling and opens for reading.
    ///
    /// Files are returned in walk order. Walk errors and files that fail to open
    /// or stat are logged at debug level and skipped.
    pub fn eligible_files(&self) -> Vec<EligibleFile> {
        let mut files = Vec::new();
        let mut walker = WalkDir::new(&self.root);
        if self.follow_links {
            walker = walker.follow_links(true);
        }
        for entry in walker.into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(root = %self.root.display(), error = %err, "walk entry skipped");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let marker = marker_path(path, &self.marker_suffix);
            debug!(path = %path.display(), marker = %marker.display(), "candidate");
            if !marker.exists() {
                continue;
            }
            match probe_len(path) {
                Ok(len) => {
                    debug!(path = %path.display(), len, "adding fortune file");
                    files.push(EligibleFile {
                        path: path.to_path_buf(),
                        len,
                    });
                }
                Err(err) => {
                    debug!(path = %path.display(), error = %err, SKIP_UNREADABLE_MSG);
                }
            }
        }
        files
    }
}

/// Sibling marker path: the file name with `suffix` appended.
pub fn marker_path(path: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = path.as_os_str().to_os_string();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Open the file for reading and return its length; the handle is dropped on return.
fn probe_len(path: &Path) -> std::io::Result<u64> {
    let file = File::open(path)?;
    Ok(file.metadata()?.len())
}
