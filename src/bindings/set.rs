use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::mode::Mode;

/// One `(mode, path)` observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecord {
    pub mode: Mode,
    pub path: String,
}

impl PathRecord {
    pub fn new(mode: Mode, path: impl Into<String>) -> Self {
        Self {
            mode,
            path: path.into(),
        }
    }
}

/// A set of bindings keyed by canonical path.
///
/// Each path holds exactly one visible mode. Inserting a path again keeps the
/// stronger mode (ties keep the existing entry) and `Hidden` observations are
/// never stored. Iteration is lexicographic by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingSet {
    entries: BTreeMap<String, Mode>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `mode` for `path`. Returns the mode now held for the path, or
    /// `None` for hidden observations of paths not yet in the set.
    pub fn insert(&mut self, path: impl Into<String>, mode: Mode) -> Option<Mode> {
        let path = path.into();
        if !mode.is_visible() {
            return self.entries.get(&path).copied();
        }
        let slot = self.entries.entry(path).or_insert(mode);
        *slot = slot.strongest(mode);
        Some(*slot)
    }

    pub fn get(&self, path: &str) -> Option<Mode> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold every entry of `other` into `self` under the precedence ladder.
    pub fn absorb(&mut self, other: &BindingSet) {
        for (path, mode) in other.iter() {
            self.insert(path, mode);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Mode)> {
        self.entries.iter().map(|(p, m)| (p.as_str(), *m))
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Paths bound read-only, sorted.
    pub fn readonly(&self) -> Vec<&str> {
        self.with_mode(Mode::ReadOnly)
    }

    /// Paths bound read-write, sorted.
    pub fn write(&self) -> Vec<&str> {
        self.with_mode(Mode::Write)
    }

    fn with_mode(&self, wanted: Mode) -> Vec<&str> {
        self.iter()
            .filter(|(_, mode)| *mode == wanted)
            .map(|(path, _)| path)
            .collect()
    }

    pub fn records(&self) -> Vec<PathRecord> {
        self.iter().map(|(p, m)| PathRecord::new(m, p)).collect()
    }

    /// Whether every path of `self` also appears in `other`.
    pub fn is_subset_of(&self, other: &BindingSet) -> bool {
        self.paths().all(|p| other.contains(p))
    }
}

impl<S: Into<String>> FromIterator<(S, Mode)> for BindingSet {
    fn from_iter<I: IntoIterator<Item = (S, Mode)>>(iter: I) -> Self {
        let mut set = BindingSet::new();
        for (path, mode) in iter {
            set.insert(path, mode);
        }
        set
    }
}

/// Combine static base binds with per-path detail observations.
///
/// Starts from `base_modes`; each detail pair is inserted if new, otherwise
/// the higher-ranked mode is kept and ties keep the entry already present.
/// Hidden pairs never surface in the result.
pub fn merge<'a>(
    base_modes: &BTreeMap<String, Mode>,
    detail_pairs: impl IntoIterator<Item = &'a PathRecord>,
) -> BindingSet {
    let mut merged: BindingSet = base_modes.iter().map(|(p, m)| (p.clone(), *m)).collect();
    for record in detail_pairs {
        merged.insert(record.path.clone(), record.mode);
    }
    merged
}
