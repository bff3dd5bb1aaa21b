//! Place-hierarchy lookup.
//!
//! # Invariants
//! - `ancestors` returns the nearest parent first and never includes the
//!   node itself; cycles in stored parent links are cut.

use crate::repo::note_store::{NoteKind, NoteStore, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const PLACE_NAME: &str = "name";
pub const PLACE_FULL_NAME: &str = "full_name";
pub const PLACE_TYPE: &str = "place_type";
pub const PLACE_PARENT_ID: &str = "parent_place_id";
pub const PLACE_LATITUDE: &str = "latitude";
pub const PLACE_LONGITUDE: &str = "longitude";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceNode {
    pub id: String,
    /// Leaf name (`Boston`).
    pub name: String,
    pub place_type: Option<String>,
    pub parent_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Place graph consulted by export.
pub trait PlaceHierarchy {
    /// Finds the node for a place string as it appears on a record.
    fn resolve(&self, name: &str) -> Option<PlaceNode>;
    /// Parent chain of a node, nearest first.
    fn ancestors(&self, id: &str) -> Vec<PlaceNode>;
}

/// In-memory hierarchy, typically loaded from place notes.
#[derive(Debug, Clone, Default)]
pub struct StorePlaceHierarchy {
    nodes: BTreeMap<String, PlaceNode>,
    /// Lowercased full name -> id.
    by_full_name: BTreeMap<String, String>,
    /// Lowercased leaf name -> ids.
    by_name: BTreeMap<String, Vec<String>>,
}

impl StorePlaceHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the hierarchy from every place note in `store`.
    pub fn load(store: &dyn NoteStore) -> StoreResult<Self> {
        let mut hierarchy = Self::new();
        for document in store.list_all()? {
            if document.kind != NoteKind::Place {
                continue;
            }
            let Some(id) = document.record_id() else {
                continue;
            };
            let name = document
                .text(PLACE_NAME)
                .map_or_else(|| document.basename().to_string(), str::to_string);
            let node = PlaceNode {
                id: id.to_string(),
                name,
                place_type: document.text(PLACE_TYPE).map(str::to_string),
                parent_id: document.text(PLACE_PARENT_ID).map(str::to_string),
                latitude: document.properties.get(PLACE_LATITUDE).and_then(|v| v.as_f64()),
                longitude: document.properties.get(PLACE_LONGITUDE).and_then(|v| v.as_f64()),
            };
            hierarchy.insert(node, document.text(PLACE_FULL_NAME));
        }
        Ok(hierarchy)
    }

    pub fn insert(&mut self, node: PlaceNode, full_name: Option<&str>) {
        if let Some(full_name) = full_name {
            self.by_full_name
                .insert(full_name.trim().to_lowercase(), node.id.clone());
        }
        self.by_name
            .entry(node.name.trim().to_lowercase())
            .or_default()
            .push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl PlaceHierarchy for StorePlaceHierarchy {
    fn resolve(&self, name: &str) -> Option<PlaceNode> {
        let key = name.trim().to_lowercase();
        if let Some(id) = self.by_full_name.get(&key) {
            return self.nodes.get(id).cloned();
        }
        // Bare leaf names only resolve when unambiguous.
        match self.by_name.get(&key).map(Vec::as_slice) {
            Some([only]) => self.nodes.get(only).cloned(),
            _ => None,
        }
    }

    fn ancestors(&self, id: &str) -> Vec<PlaceNode> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::from([id.to_string()]);
        let mut current = self.nodes.get(id).and_then(|node| node.parent_id.clone());
        while let Some(parent_id) = current {
            if !seen.insert(parent_id.clone()) {
                break;
            }
            let Some(parent) = self.nodes.get(&parent_id) else {
                break;
            };
            current = parent.parent_id.clone();
            chain.push(parent.clone());
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::{PlaceHierarchy, PlaceNode, StorePlaceHierarchy};

    fn node(id: &str, name: &str, parent: Option<&str>) -> PlaceNode {
        PlaceNode {
            id: id.to_string(),
            name: name.to_string(),
            place_type: None,
            parent_id: parent.map(str::to_string),
            latitude: None,
            longitude: None,
        }
    }

    #[test]
    fn resolves_full_names_and_walks_parents() {
        let mut hierarchy = StorePlaceHierarchy::new();
        hierarchy.insert(node("usa", "USA", None), Some("USA"));
        hierarchy.insert(node("ma", "Massachusetts", Some("usa")), Some("Massachusetts, USA"));
        hierarchy.insert(node("bos", "Boston", Some("ma")), Some("Boston, Massachusetts, USA"));

        let resolved = hierarchy.resolve("boston, massachusetts, usa").unwrap();
        assert_eq!(resolved.id, "bos");
        assert_eq!(hierarchy.resolve("Boston").unwrap().id, "bos");
        let names: Vec<String> = hierarchy
            .ancestors("bos")
            .into_iter()
            .map(|ancestor| ancestor.name)
            .collect();
        assert_eq!(names, vec!["Massachusetts", "USA"]);
    }

    #[test]
    fn ancestor_cycles_terminate() {
        let mut hierarchy = StorePlaceHierarchy::new();
        hierarchy.insert(node("a", "A", Some("b")), None);
        hierarchy.insert(node("b", "B", Some("a")), None);
        assert_eq!(hierarchy.ancestors("a").len(), 1);
    }
}
