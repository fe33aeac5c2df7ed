// =============================================================================
// Trade Memory — persisted dedup of repeat alerts
// =============================================================================
//
// Maps each ticker to the most recent setup kind that was alerted for it:
//
//   { "AAPL": "TREND", "TSLA": "MEANREV" }
//
// A ticker holds one active setup at a time, so remembering a new kind
// overwrites the old one.  A detection equal to the stored kind is a repeat
// and is suppressed.
//
// Thread safety: the map and the file write share one mutex.  Check, update
// and persist happen inside a single critical section so concurrent workers
// never interleave whole-file overwrites.  Persistence uses an atomic
// tmp + rename so a crash mid-write leaves the previous file intact.
// =============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::types::SetupKind;

pub struct TradeMemory {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, SetupKind>>,
}

impl TradeMemory {
    /// Load the memory from `path`.  A missing file is an empty memory.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read trade memory from {}", path.display()))?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).with_context(|| {
                    format!("failed to parse trade memory from {}", path.display())
                })?
            }
        } else {
            BTreeMap::new()
        };

        info!(path = %path.display(), entries = entries.len(), "trade memory loaded");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Whether `kind` is the setup currently remembered for `ticker`.
    #[cfg(test)]
    pub fn seen(&self, ticker: &str, kind: SetupKind) -> bool {
        Self::holds(&self.entries.lock(), ticker, kind)
    }

    /// Record `kind` as the latest setup for `ticker` and persist immediately.
    #[cfg(test)]
    pub fn remember(&self, ticker: &str, kind: SetupKind) -> Result<()> {
        self.store(&mut self.entries.lock(), ticker, kind)
    }

    /// Check-and-record in one critical section.
    ///
    /// Returns `true` when the detection is novel (and now remembered),
    /// `false` when it repeats the stored setup.  On a persistence error the
    /// in-memory entry is rolled back so a retry sees the detection as novel.
    pub fn record_if_new(&self, ticker: &str, kind: SetupKind) -> Result<bool> {
        let mut entries = self.entries.lock();
        if Self::holds(&entries, ticker, kind) {
            debug!(ticker, kind = %kind, "repeat setup suppressed");
            return Ok(false);
        }
        self.store(&mut entries, ticker, kind)?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn holds(entries: &BTreeMap<String, SetupKind>, ticker: &str, kind: SetupKind) -> bool {
        entries.get(ticker) == Some(&kind)
    }

    /// Insert and persist; the previous entry is restored if the write fails.
    /// Caller holds the lock.
    fn store(
        &self,
        entries: &mut BTreeMap<String, SetupKind>,
        ticker: &str,
        kind: SetupKind,
    ) -> Result<()> {
        let previous = entries.insert(ticker.to_string(), kind);
        if let Err(e) = self.persist(entries) {
            match previous {
                Some(prev) => entries.insert(ticker.to_string(), prev),
                None => entries.remove(ticker),
            };
            return Err(e);
        }
        debug!(ticker, kind = %kind, previous = ?previous, "setup remembered");
        Ok(())
    }

    /// Serialise the whole map and swap it into place.  Caller holds the lock.
    fn persist(&self, entries: &BTreeMap<String, SetupKind>) -> Result<()> {
        let content =
            serde_json::to_string_pretty(entries).context("failed to serialise trade memory")?;

        let tmp_path = self.path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp memory to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("failed to rename tmp memory to {}", self.path.display()))?;

        Ok(())
    }
}
