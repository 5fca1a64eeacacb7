//! Durable cache of results that could not be delivered.
//!
//! The cache is a JSON array of [`ResultPayload`] rewritten wholesale on
//! every change. Entries keep their submission order so a later retry pass
//! delivers them in the order they were recorded.

use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::results::ResultPayload;

/// Ordered list of undelivered results, mirrored to a file when a path is set.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    path: Option<PathBuf>,
    entries: Vec<ResultPayload>,
}

impl ResultCache {
    /// Cache that lives only in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load the cache file at `path`.
    ///
    /// A missing file is an empty cache. An unreadable or corrupt file is
    /// logged and also treated as empty; it will be overwritten on the next
    /// change.
    pub fn load(path: &Path) -> Self {
        let entries = match std::fs::read_to_string(path) {
            Ok(json) => match serde_json::from_str::<Vec<ResultPayload>>(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring corrupt result cache {}: {e}", path.display());
                    Vec::new()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Error reading result cache {}: {e}", path.display());
                Vec::new()
            }
        };

        debug!("Loaded {} cached result(s) from {}", entries.len(), path.display());
        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn entries(&self) -> &[ResultPayload] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a payload and persist.
    ///
    /// The entry is kept in memory even if persisting fails.
    pub fn push(&mut self, payload: ResultPayload) -> io::Result<()> {
        self.entries.push(payload);
        self.save()
    }

    /// Replace the first `consumed` entries with `kept`, then persist.
    ///
    /// Used after a retry pass over a snapshot of the first `consumed`
    /// entries: `kept` are the ones that failed again, in their original
    /// order. Anything appended after the snapshot was taken stays behind
    /// them.
    pub fn replace_front(&mut self, consumed: usize, kept: Vec<ResultPayload>) -> io::Result<()> {
        let consumed = consumed.min(self.entries.len());
        let tail = self.entries.split_off(consumed);
        self.entries = kept;
        self.entries.extend(tail);
        self.save()
    }

    /// Rewrite the cache file from the in-memory entries.
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)
    }
}
