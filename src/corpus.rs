use std::path::PathBuf;

use crate::config::PickerConfig;
use crate::transport::fs::{CorpusWalk, EligibleFile};

/// One file's half-open byte range `[start, end)` within the virtual concatenation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorpusSpan {
    /// File holding the bytes of this span.
    pub path: PathBuf,
    /// Offset of the file's first byte.
    pub start: u64,
    /// `start` plus the file size.
    pub end: u64,
}

impl CorpusSpan {
    /// True if `offset` falls inside this span.
    pub fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Position of `offset` relative to the start of this file.
    pub fn local_offset(&self, offset: u64) -> u64 {
        offset - self.start
    }
}

/// Every eligible file laid end to end, in walk order.
///
/// Drawing a byte offset uniformly over `total_size` weights each file, and
/// each record inside it, by its length rather than by file or record count.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CorpusLayout {
    spans: Vec<CorpusSpan>,
    total_size: u64,
}

impl CorpusLayout {
    /// Walk the configured root and lay out its eligible files.
    pub fn scan(config: &PickerConfig) -> Self {
        let files = CorpusWalk::new(&config.root)
            .with_follow_symlinks(config.follow_links)
            .with_marker_suffix(config.marker_suffix.clone())
            .eligible_files();
        Self::from_files(files)
    }

    /// Assign contiguous ranges to `files` in the given order.
    pub fn from_files(files: impl IntoIterator<Item = EligibleFile>) -> Self {
        let mut spans = Vec::new();
        let mut total_size = 0u64;
        for file in files {
            let start = total_size;
            total_size += file.len;
            spans.push(CorpusSpan {
                path: file.path,
                start,
                end: total_size,
            });
        }
        Self { spans, total_size }
    }

    /// Spans in walk order.
    pub fn spans(&self) -> &[CorpusSpan] {
        &self.spans
    }

    /// Sum of all file sizes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// True when there is no byte to draw from.
    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    /// Find the span containing `offset`; `None` for `offset >= total_size`.
    pub fn locate(&self, offset: u64) -> Option<&CorpusSpan> {
        if offset >= self.total_size {
            return None;
        }
        // Spans are sorted by start; empty files produce zero-width spans that
        // never contain an offset.
        let idx = self.spans.partition_point(|span| span.end <= offset);
        self.spans.get(idx).filter(|span| span.contains(offset))
    }
}
