//! Place planning for import.
//!
//! # Responsibility
//! - Collect every distinct place string and every ancestor level of its
//!   comma hierarchy.
//! - Infer a place type from lexical cues and hierarchy context.
//!
//! # Invariants
//! - Plans are ordered root first, so a parent is always created before its
//!   children.
//! - Keys are normalized full names (`Boston, Massachusetts, USA`).

use crate::model::graph::Graph;
use crate::quality::places::{canonical_form, is_us_state, place_usages};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceType {
    Country,
    State,
    Region,
    County,
    Township,
    City,
    Locality,
    Cemetery,
    Church,
}

impl PlaceType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::State => "state",
            Self::Region => "region",
            Self::County => "county",
            Self::Township => "township",
            Self::City => "city",
            Self::Locality => "locality",
            Self::Cemetery => "cemetery",
            Self::Church => "church",
        }
    }
}

/// One place record to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPlace {
    pub full_name: String,
    /// Leaf component.
    pub name: String,
    pub parent: Option<String>,
    /// Number of components, 1 for top-level places.
    pub depth: usize,
    pub place_type: PlaceType,
}

/// Joins trimmed, non-empty comma components with `", "`.
pub fn normalize_place(place: &str) -> String {
    components(place).join(", ")
}

fn components(place: &str) -> Vec<&str> {
    place
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Plans one record per distinct place and ancestor level.
pub fn plan_places(graph: &Graph) -> Vec<PlannedPlace> {
    let mut nodes: BTreeMap<String, (String, Option<String>, usize)> = BTreeMap::new();
    for (_, place) in place_usages(graph) {
        let parts = components(place);
        for start in (0..parts.len()).rev() {
            let full_name = parts[start..].join(", ");
            let parent = (start + 1 < parts.len()).then(|| parts[start + 1..].join(", "));
            nodes
                .entry(full_name)
                .or_insert_with(|| (parts[start].to_string(), parent, parts.len() - start));
        }
    }

    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (full_name, (_, parent, _)) in &nodes {
        if let Some(parent) = parent {
            children.entry(parent.as_str()).or_default().push(full_name.as_str());
        }
    }

    let mut planned: Vec<PlannedPlace> = nodes
        .iter()
        .map(|(full_name, (name, parent, depth))| {
            let parent_name = parent
                .as_deref()
                .and_then(|parent| nodes.get(parent))
                .map(|(name, _, _)| name.as_str());
            let siblings: Vec<&str> = parent
                .as_deref()
                .and_then(|parent| children.get(parent))
                .map(|siblings| {
                    siblings
                        .iter()
                        .filter(|sibling| **sibling != full_name.as_str())
                        .filter_map(|sibling| nodes.get(*sibling))
                        .map(|(name, _, _)| name.as_str())
                        .collect()
                })
                .unwrap_or_default();
            PlannedPlace {
                full_name: full_name.clone(),
                name: name.clone(),
                parent: parent.clone(),
                depth: *depth,
                place_type: infer_type(
                    name,
                    parent_name,
                    &siblings,
                    children.contains_key(full_name.as_str()),
                ),
            }
        })
        .collect();
    planned.sort_by(|left, right| {
        left.depth
            .cmp(&right.depth)
            .then_with(|| left.full_name.cmp(&right.full_name))
    });
    planned
}

fn infer_type(name: &str, parent: Option<&str>, siblings: &[&str], has_children: bool) -> PlaceType {
    if let Some(place_type) = lexical_type(name) {
        return place_type;
    }
    if is_us_state(name) {
        return PlaceType::State;
    }
    let Some(parent) = parent else {
        return PlaceType::Country;
    };
    if is_us_state(parent) {
        // `Boston, Massachusetts` next to `Suffolk County, Massachusetts`.
        let sibling_county = siblings
            .iter()
            .any(|sibling| lexical_type(sibling) == Some(PlaceType::County));
        return if sibling_county {
            PlaceType::Locality
        } else {
            PlaceType::County
        };
    }
    match lexical_type(parent) {
        Some(PlaceType::County) => return PlaceType::Locality,
        Some(PlaceType::City | PlaceType::Locality | PlaceType::Township) => {
            return PlaceType::Locality
        }
        _ => {}
    }
    let parent_is_country =
        canonical_form(parent).is_some_and(|canonical| !is_us_state(canonical));
    if parent_is_country && has_children {
        return PlaceType::Region;
    }
    PlaceType::Locality
}

fn lexical_type(name: &str) -> Option<PlaceType> {
    let lower = name.trim().to_lowercase();
    let ends_with_word = |suffix: &str| {
        lower
            .strip_suffix(suffix)
            .is_some_and(|rest| rest.ends_with(' '))
    };
    if ends_with_word("county") || ends_with_word("co.") || ends_with_word("parish") {
        return Some(PlaceType::County);
    }
    if ends_with_word("township") || ends_with_word("twp") || ends_with_word("twp.") {
        return Some(PlaceType::Township);
    }
    if ends_with_word("city") || lower.starts_with("city of ") {
        return Some(PlaceType::City);
    }
    if lower.contains("cemetery") || lower.contains("graveyard") {
        return Some(PlaceType::Cemetery);
    }
    if lower.contains("church") || lower.contains("chapel") {
        return Some(PlaceType::Church);
    }
    None
}
