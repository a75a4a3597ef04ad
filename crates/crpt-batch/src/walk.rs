//! Lazy file listing
//!
//! A root that is a file is yielded as-is. A root that is a directory is
//! listed one directory at a time, entries sorted by name; subdirectories are
//! entered only when the walker is recursive. Symlinked directories below a
//! root are never entered.
//!
//! A [`Walk`] owns everything it needs, so it can be moved onto a blocking
//! thread while the caller stays on the async runtime.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BatchError, BatchResult};

/// Item produced by the walk: a regular file and its length in bytes
pub type WalkItem = BatchResult<(PathBuf, u64)>;

/// Restartable description of a listing; call [`FileWalker::iter`] for each pass.
#[derive(Debug, Clone)]
pub struct FileWalker {
    roots: Vec<PathBuf>,
    recursive: bool,
    excludes: Vec<glob::Pattern>,
}

impl FileWalker {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            recursive: false,
            excludes: Vec::new(),
        }
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Skip directory entries whose name matches any of `patterns`.
    ///
    /// Roots given explicitly are never excluded.
    pub fn exclude<I, S>(mut self, patterns: I) -> BatchResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for pattern in patterns {
            let pattern = pattern.as_ref();
            let compiled = glob::Pattern::new(pattern).map_err(|source| BatchError::Pattern {
                pattern: pattern.to_string(),
                source,
            })?;
            self.excludes.push(compiled);
        }
        Ok(self)
    }

    pub fn iter(&self) -> Walk {
        self.clone().into_iter()
    }

    /// Number of files and their combined size, ignoring unreadable entries.
    pub fn tally(&self) -> (usize, u64) {
        self.iter()
            .filter_map(Result::ok)
            .fold((0, 0), |(files, bytes), (_, len)| (files + 1, bytes + len))
    }

    pub fn total_bytes(&self) -> u64 {
        self.tally().1
    }
}

impl IntoIterator for FileWalker {
    type Item = WalkItem;
    type IntoIter = Walk;

    fn into_iter(self) -> Self::IntoIter {
        Walk {
            roots: self.roots.into_iter(),
            recursive: self.recursive,
            excludes: self.excludes,
            pending: Vec::new(),
        }
    }
}

impl IntoIterator for &FileWalker {
    type Item = WalkItem;
    type IntoIter = Walk;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// One pass over a [`FileWalker`]
pub struct Walk {
    roots: std::vec::IntoIter<PathBuf>,
    recursive: bool,
    excludes: Vec<glob::Pattern>,
    pending: Vec<std::vec::IntoIter<PathBuf>>,
}

impl Iterator for Walk {
    type Item = WalkItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(listing) = self.pending.last_mut() {
                match listing.next() {
                    Some(path) => {
                        if let Some(item) = self.visit_entry(path) {
                            return Some(item);
                        }
                    }
                    None => {
                        self.pending.pop();
                    }
                }
                continue;
            }

            let root = self.roots.next()?;
            if let Some(item) = self.visit_root(&root) {
                return Some(item);
            }
        }
    }
}

impl Walk {
    fn visit_root(&mut self, root: &Path) -> Option<WalkItem> {
        match fs::metadata(root) {
            Err(e) => Some(Err(BatchError::walk(root, e))),
            Ok(meta) if meta.is_dir() => self.enter(root),
            Ok(meta) => Some(Ok((root.to_path_buf(), meta.len()))),
        }
    }

    fn visit_entry(&mut self, path: PathBuf) -> Option<WalkItem> {
        if self.is_excluded(&path) {
            return None;
        }

        let meta = match fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) => return Some(Err(BatchError::walk(path, e))),
        };

        if meta.is_dir() {
            return if self.recursive {
                self.enter(&path)
            } else {
                None
            };
        }

        let meta = if meta.file_type().is_symlink() {
            match fs::metadata(&path) {
                Ok(target) => target,
                Err(e) => return Some(Err(BatchError::walk(path, e))),
            }
        } else {
            meta
        };

        meta.is_file().then(|| Ok((path, meta.len())))
    }

    fn is_excluded(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| self.excludes.iter().any(|p| p.matches(name)))
    }

    fn enter(&mut self, dir: &Path) -> Option<WalkItem> {
        match list_dir(dir) {
            Ok(entries) => {
                self.pending.push(entries.into_iter());
                None
            }
            Err(e) => Some(Err(BatchError::walk(dir, e))),
        }
    }
}

fn list_dir(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}
