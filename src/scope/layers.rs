//! Cross-unit layer ownership
//!
//! The same logical layer may be attached to functions in several units. The
//! first unit to reference it owns it and exports it; every other unit holds
//! an import of the owner's export.

use crate::props::LayerRef;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// How a unit holds a layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "binding")]
pub enum LayerBinding {
    Owned,
    Imported { owner: String },
}

impl LayerBinding {
    pub fn is_owned(&self) -> bool {
        matches!(self, LayerBinding::Owned)
    }
}

/// Identity-keyed arena of layers plus per-unit export/import tables
#[derive(Debug, Default)]
pub struct LayerArena {
    /// layer identity -> owning unit, in first-reference order
    owners: IndexMap<String, String>,
    /// unit -> identities imported from other units
    imports: BTreeMap<String, Vec<String>>,
}

impl LayerArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `layer` into `unit`, claiming ownership on first reference
    pub fn bind(&mut self, unit: &str, layer: &LayerRef) -> LayerBinding {
        let identity = layer.identity();

        let owner = match self.owners.get(identity) {
            Some(owner) => owner.clone(),
            None => {
                debug!(layer = identity, unit, "Layer owned");
                self.owners.insert(identity.to_string(), unit.to_string());
                return LayerBinding::Owned;
            }
        };

        if owner == unit {
            return LayerBinding::Owned;
        }

        let imported = self.imports.entry(unit.to_string()).or_default();
        if !imported.iter().any(|i| i == identity) {
            debug!(layer = identity, unit, owner = %owner, "Layer imported");
            imported.push(identity.to_string());
        }
        LayerBinding::Imported { owner }
    }

    /// Bind every layer of a function, keeping list order
    pub fn bind_all(&mut self, unit: &str, layers: &[LayerRef]) -> Vec<(LayerRef, LayerBinding)> {
        layers
            .iter()
            .map(|layer| (layer.clone(), self.bind(unit, layer)))
            .collect()
    }

    pub fn owner(&self, layer: &LayerRef) -> Option<&str> {
        self.owners.get(layer.identity()).map(String::as_str)
    }

    /// Layers `unit` owns and exports to the others
    pub fn exports(&self, unit: &str) -> Vec<LayerRef> {
        self.owners
            .iter()
            .filter(|(_, owner)| owner.as_str() == unit)
            .map(|(identity, _)| LayerRef::new(identity.clone()))
            .collect()
    }

    /// Layers `unit` imports, each with its owner
    pub fn imports(&self, unit: &str) -> Vec<(LayerRef, String)> {
        self.imports
            .get(unit)
            .map(|identities| {
                identities
                    .iter()
                    .filter_map(|identity| {
                        self.owners
                            .get(identity)
                            .map(|owner| (LayerRef::new(identity.clone()), owner.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_unit_owns() {
        let mut arena = LayerArena::new();
        let layer = LayerRef::new("arn:aws:lambda:us-east-1:123:layer:shared:1");

        assert_eq!(arena.bind("a", &layer), LayerBinding::Owned);
        assert_eq!(arena.bind("a", &layer), LayerBinding::Owned);
        assert_eq!(
            arena.bind("b", &layer),
            LayerBinding::Imported { owner: "a".into() }
        );
        arena.bind("b", &layer);

        assert_eq!(arena.len(), 1);
        assert_eq!(arena.exports("a"), vec![layer.clone()]);
        assert_eq!(arena.imports("b"), vec![(layer, "a".to_string())]);
        assert!(arena.imports("a").is_empty());
    }
}
