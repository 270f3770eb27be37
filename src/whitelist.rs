//! Per-step whitelists of files a student may submit.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::ProblemStep;

/// Computes the cumulative whitelist for every step.
///
/// The whitelist at step *i* is the whitelist at step *i-1* plus every
/// root-level file (no `/` in its path) that step *i* introduces. Names
/// are never removed once introduced.
#[must_use]
pub fn step_whitelists(steps: &[ProblemStep]) -> Vec<BTreeSet<String>> {
    let mut lists: Vec<BTreeSet<String>> = Vec::with_capacity(steps.len());
    for step in steps {
        let mut list = lists.last().cloned().unwrap_or_default();
        list.extend(step.files.keys().filter(|name| !name.contains('/')).cloned());
        lists.push(list);
    }
    lists
}

/// Converts a whitelist into the `name -> true` form stored in the metadata file.
#[must_use]
pub fn to_dotfile_whitelist(list: &BTreeSet<String>) -> BTreeMap<String, bool> {
    list.iter().map(|name| (name.clone(), true)).collect()
}
