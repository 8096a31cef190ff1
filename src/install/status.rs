//! Installation status checks: per-package probes and the cached bulk
//! listing for managers that are too slow to query one package at a time.
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::exec::Executor;

use super::command;
use super::managers::ManagerId;

/// Per-manager slot guarding the run-once bulk listing.
type BulkSlot = Arc<Mutex<Option<Arc<HashSet<String>>>>>;

/// Answers "is this package already installed?" for every manager.
///
/// Two strategies: a per-package probe (check argv, exit code 0 means
/// installed) and, for managers flagged as slow under repeated queries, a
/// single list-everything invocation parsed once and cached for the rest of
/// the process. The cache is safe under concurrent callers (a per-manager
/// lock guarantees only one of them pays for the listing) and is
/// invalidated only by [`reset`](Self::reset).
#[derive(Debug)]
pub struct StatusChecker {
    executor: Arc<dyn Executor>,
    bulk: Mutex<HashMap<ManagerId, BulkSlot>>,
}

impl StatusChecker {
    /// Create a checker that runs probes through the given executor.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            bulk: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the package is installed according to its manager.
    #[must_use]
    pub fn is_installed(&self, pkg: &str, manager: ManagerId) -> bool {
        if manager.uses_bulk_listing() {
            return self.bulk_set(manager).contains(&pkg.to_lowercase());
        }
        let check = command::manager_check(manager, pkg);
        match self.executor.run_unchecked(check.program(), &check.args()) {
            Ok(result) => {
                if !result.success && !result.stderr.trim().is_empty() {
                    tracing::debug!(
                        "status probe for {pkg} via {manager}: {}",
                        result.stderr.trim()
                    );
                }
                result.success
            }
            Err(e) => {
                tracing::debug!("status probe for {pkg} via {manager} failed to run: {e}");
                false
            }
        }
    }

    /// Whether an installer-type package's representative binary is on PATH.
    ///
    /// An empty binary name never counts as installed.
    #[must_use]
    pub fn is_installer_installed(&self, binary: &str) -> bool {
        !binary.is_empty() && self.executor.which(binary)
    }

    /// Drop every cached bulk listing.
    ///
    /// Called after a batch of installs (which changed the system state) and
    /// by tests that need a cold cache.
    pub fn reset(&self) {
        self.bulk
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }

    /// The cached identifier set for a bulk-listing manager, building it on
    /// first use.
    ///
    /// The outer map lock is held only long enough to find or create the
    /// manager's slot; the expensive listing runs under the per-manager slot
    /// lock, so concurrent callers for the same manager block until the one
    /// listing completes and then share its result.
    fn bulk_set(&self, manager: ManagerId) -> Arc<HashSet<String>> {
        let slot = {
            let mut map = self
                .bulk
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(map.entry(manager).or_default())
        };
        let mut guard = slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(set) = guard.as_ref() {
            return Arc::clone(set);
        }
        let set = Arc::new(self.load_bulk(manager));
        *guard = Some(Arc::clone(&set));
        set
    }

    /// Run the manager's list-everything command and parse the result.
    fn load_bulk(&self, manager: ManagerId) -> HashSet<String> {
        let Some(list) = command::bulk_list(manager) else {
            return HashSet::new();
        };
        match self.executor.run_unchecked(list.program(), &list.args()) {
            Ok(result) if result.success => parse_bulk_listing(&result.stdout),
            Ok(result) => {
                tracing::debug!(
                    "bulk listing via {manager} failed: {}",
                    result.stderr.trim()
                );
                HashSet::new()
            }
            Err(e) => {
                tracing::debug!("bulk listing via {manager} failed to run: {e}");
                HashSet::new()
            }
        }
    }
}

/// Parse a column-formatted package listing into a lowercase identifier set.
///
/// Tolerates CRLF line endings and spinner/progress output that overwrites
/// the current line with carriage returns when piped (only the text after
/// the last `\r` on each line counts). Columns are located by finding the
/// header-separator row made entirely of dashes, reading the header row
/// directly above it, and using the discovered offsets of the `Id` and
/// `Version` headers to slice every data row. Column widths vary with the
/// longest value present, so fixed offsets would mis-slice.
#[must_use]
pub fn parse_bulk_listing(output: &str) -> HashSet<String> {
    let lines: Vec<&str> = output.lines().map(after_last_overwrite).collect();

    let Some(separator_idx) = lines
        .iter()
        .position(|l| !l.trim().is_empty() && l.trim().chars().all(|c| c == '-'))
    else {
        return HashSet::new();
    };
    let Some(header_idx) = separator_idx.checked_sub(1) else {
        return HashSet::new();
    };
    let Some(header) = lines.get(header_idx) else {
        return HashSet::new();
    };
    let Some((id_start, id_end)) = column_bounds(header, "Id", "Version") else {
        return HashSet::new();
    };

    lines
        .iter()
        .skip(separator_idx + 1)
        .filter_map(|line| {
            let id = slice_chars(line, id_start, id_end);
            let id = id.trim();
            if id.is_empty() {
                None
            } else {
                Some(id.to_lowercase())
            }
        })
        .collect()
}

/// Keep only the text after the last carriage return on a line.
fn after_last_overwrite(line: &str) -> &str {
    line.rsplit('\r').next().unwrap_or(line)
}

/// Character offsets of the identifier column: start of `id_header` up to
/// the start of `end_header`.
fn column_bounds(header: &str, id_header: &str, end_header: &str) -> Option<(usize, usize)> {
    let id_byte = header.find(id_header)?;
    let end_byte = header.find(end_header)?;
    let id_start = header.get(..id_byte)?.chars().count();
    let id_end = header.get(..end_byte)?.chars().count();
    (id_start < id_end).then_some((id_start, id_end))
}

/// Slice a line by character offsets, tolerating short lines.
fn slice_chars(line: &str, start: usize, end: usize) -> String {
    line.chars().skip(start).take(end.saturating_sub(start)).collect()
}
