//! Two-level union/intersection reduction.
//!
//! Per language, exercise artifacts reduce to a [`LanguageSet`]; across
//! languages, the language unions reduce to a [`GlobalConfig`]. Every union
//! resolves collisions with the mode precedence ladder. Intersections keep
//! only paths present in every member and mark them `Write` when any member
//! held them as `Write`. Intersections are audit output only.

use std::collections::BTreeMap;

use super::artifact::ExerciseArtifact;
use super::mode::Mode;
use super::set::BindingSet;
use crate::error::{BindingError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageSet {
    pub language: String,
    pub exercises: usize,
    pub union: BindingSet,
    pub intersection: BindingSet,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfig {
    pub union: BindingSet,
    pub intersection: BindingSet,
}

/// Union of sets; write beats read on collision.
pub fn union_of<'a>(sets: impl IntoIterator<Item = &'a BindingSet>) -> BindingSet {
    let mut out = BindingSet::new();
    for set in sets {
        out.absorb(set);
    }
    out
}

/// Paths present in every set, `Write` if any member holds them as `Write`.
/// An empty input yields an empty set.
pub fn intersection_of<'a>(sets: impl IntoIterator<Item = &'a BindingSet>) -> BindingSet {
    let sets: Vec<&BindingSet> = sets.into_iter().collect();
    let Some((first, rest)) = sets.split_first() else {
        return BindingSet::new();
    };

    let mut out = BindingSet::new();
    for path in first.paths() {
        let mut mode = first.get(path).unwrap_or(Mode::ReadOnly);
        let mut everywhere = true;
        for other in rest {
            match other.get(path) {
                Some(m) => mode = mode.strongest(m),
                None => {
                    everywhere = false;
                    break;
                }
            }
        }
        if everywhere {
            out.insert(path, mode);
        }
    }
    out
}

/// Reduce one language's artifacts. Returns `None` when there are none.
pub fn language_set(language: &str, artifacts: &[ExerciseArtifact]) -> Option<LanguageSet> {
    if artifacts.is_empty() {
        return None;
    }
    let records = artifacts.iter().map(|a| &a.records);
    Some(LanguageSet {
        language: language.to_string(),
        exercises: artifacts.len(),
        union: union_of(records.clone()),
        intersection: intersection_of(records),
    })
}

/// Reduce language sets into the cross-language layer.
///
/// Fails with [`BindingError::NoData`] when no language has any data.
pub fn global_config(languages: &[LanguageSet]) -> Result<GlobalConfig> {
    if languages.is_empty() {
        return Err(BindingError::NoData);
    }
    let unions = languages.iter().map(|l| &l.union);
    Ok(GlobalConfig {
        union: union_of(unions.clone()),
        intersection: intersection_of(unions),
    })
}

/// Group artifacts by language and reduce each group. Languages are returned
/// in name order; languages in `requested` with no artifacts are reported
/// in the second element.
pub fn language_sets(
    requested: &[String],
    artifacts: Vec<ExerciseArtifact>,
) -> (Vec<LanguageSet>, Vec<String>) {
    let mut grouped: BTreeMap<String, Vec<ExerciseArtifact>> = BTreeMap::new();
    for artifact in artifacts {
        grouped
            .entry(artifact.language.clone())
            .or_default()
            .push(artifact);
    }

    let mut sets = Vec::new();
    for (language, group) in &grouped {
        if let Some(set) = language_set(language, group) {
            sets.push(set);
        }
    }

    let mut missing: Vec<String> = requested
        .iter()
        .filter(|l| !grouped.contains_key(l.as_str()))
        .cloned()
        .collect();
    missing.sort();
    missing.dedup();
    (sets, missing)
}
