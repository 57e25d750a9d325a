//! Merge strategies referenced by `#[derive(MergeProps)]`
//!
//! All strategies take the base and override value of one field and never fail.
//! An unset override (`None`) always leaves the base untouched.

use crate::permissions::Permissions;
use std::collections::BTreeMap;

/// Override wins if set, else base
pub fn scalar<T: Clone>(base: &Option<T>, override_value: &Option<T>) -> Option<T> {
    override_value.clone().or_else(|| base.clone())
}

/// Wholesale replacement for tri-state values such as `bundle`.
///
/// An object override never deep-merges with the base, and a boolean override
/// replaces an object base (and vice versa).
pub fn replace<T: Clone>(base: &Option<T>, override_value: &Option<T>) -> Option<T> {
    match override_value {
        Some(value) => Some(value.clone()),
        None => base.clone(),
    }
}

/// Shallow key union, override value wins per key
pub fn union<V: Clone>(
    base: &Option<BTreeMap<String, V>>,
    override_value: &Option<BTreeMap<String, V>>,
) -> Option<BTreeMap<String, V>> {
    match (base, override_value) {
        (None, None) => None,
        (Some(map), None) | (None, Some(map)) => Some(map.clone()),
        (Some(base), Some(over)) => {
            let mut merged = base.clone();
            merged.extend(over.iter().map(|(k, v)| (k.clone(), v.clone())));
            Some(merged)
        }
    }
}

/// Wildcard absorbs from either side, otherwise base then override.
///
/// Duplicates are kept: repeated additions of the same descriptor show up as
/// separate entries.
pub fn permissions(
    base: &Option<Permissions>,
    override_value: &Option<Permissions>,
) -> Option<Permissions> {
    match (base, override_value) {
        (None, None) => None,
        (Some(perms), None) | (None, Some(perms)) => Some(perms.clone()),
        (Some(Permissions::All), Some(_)) | (Some(_), Some(Permissions::All)) => {
            Some(Permissions::All)
        }
        (Some(Permissions::List(base)), Some(Permissions::List(over))) => Some(Permissions::List(
            base.iter().chain(over.iter()).cloned().collect(),
        )),
    }
}

/// Base then override, strictly appended
pub fn concat<T: Clone>(base: &Option<Vec<T>>, override_value: &Option<Vec<T>>) -> Option<Vec<T>> {
    match (base, override_value) {
        (None, None) => None,
        (Some(list), None) | (None, Some(list)) => Some(list.clone()),
        (Some(base), Some(over)) => Some(base.iter().chain(over.iter()).cloned().collect()),
    }
}
