//! Place-name variant detection.
//!
//! Each comma-separated place component is looked up in a canonical table;
//! non-identical matches are collected as variants with counts and the
//! records that use them.

use crate::model::graph::{Graph, RecordId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// `(variant, canonical)` pairs; lookups are case-insensitive and ignore dots.
const CANONICAL_PLACES: &[(&str, &str)] = &[
    ("usa", "USA"),
    ("us", "USA"),
    ("u s a", "USA"),
    ("united states", "USA"),
    ("united states of america", "USA"),
    ("america", "USA"),
    ("uk", "England"),
    ("eng", "England"),
    ("england", "England"),
    ("scotland", "Scotland"),
    ("wales", "Wales"),
    ("ireland", "Ireland"),
    ("canada", "Canada"),
    ("can", "Canada"),
    ("deutschland", "Germany"),
    ("germany", "Germany"),
    ("al", "Alabama"),
    ("ala", "Alabama"),
    ("alabama", "Alabama"),
    ("ak", "Alaska"),
    ("alaska", "Alaska"),
    ("az", "Arizona"),
    ("ariz", "Arizona"),
    ("arizona", "Arizona"),
    ("ar", "Arkansas"),
    ("ark", "Arkansas"),
    ("arkansas", "Arkansas"),
    ("ca", "California"),
    ("cal", "California"),
    ("calif", "California"),
    ("california", "California"),
    ("co", "Colorado"),
    ("colo", "Colorado"),
    ("colorado", "Colorado"),
    ("ct", "Connecticut"),
    ("conn", "Connecticut"),
    ("connecticut", "Connecticut"),
    ("de", "Delaware"),
    ("del", "Delaware"),
    ("delaware", "Delaware"),
    ("fl", "Florida"),
    ("fla", "Florida"),
    ("florida", "Florida"),
    ("ga", "Georgia"),
    ("georgia", "Georgia"),
    ("hi", "Hawaii"),
    ("hawaii", "Hawaii"),
    ("id", "Idaho"),
    ("idaho", "Idaho"),
    ("il", "Illinois"),
    ("ill", "Illinois"),
    ("illinois", "Illinois"),
    ("in", "Indiana"),
    ("ind", "Indiana"),
    ("indiana", "Indiana"),
    ("ia", "Iowa"),
    ("iowa", "Iowa"),
    ("ks", "Kansas"),
    ("kan", "Kansas"),
    ("kans", "Kansas"),
    ("kansas", "Kansas"),
    ("ky", "Kentucky"),
    ("kentucky", "Kentucky"),
    ("la", "Louisiana"),
    ("louisiana", "Louisiana"),
    ("me", "Maine"),
    ("maine", "Maine"),
    ("md", "Maryland"),
    ("maryland", "Maryland"),
    ("ma", "Massachusetts"),
    ("mass", "Massachusetts"),
    ("massachusetts", "Massachusetts"),
    ("mi", "Michigan"),
    ("mich", "Michigan"),
    ("michigan", "Michigan"),
    ("mn", "Minnesota"),
    ("minn", "Minnesota"),
    ("minnesota", "Minnesota"),
    ("ms", "Mississippi"),
    ("miss", "Mississippi"),
    ("mississippi", "Mississippi"),
    ("mo", "Missouri"),
    ("missouri", "Missouri"),
    ("mt", "Montana"),
    ("mont", "Montana"),
    ("montana", "Montana"),
    ("ne", "Nebraska"),
    ("neb", "Nebraska"),
    ("nebr", "Nebraska"),
    ("nebraska", "Nebraska"),
    ("nv", "Nevada"),
    ("nev", "Nevada"),
    ("nevada", "Nevada"),
    ("nh", "New Hampshire"),
    ("new hampshire", "New Hampshire"),
    ("nj", "New Jersey"),
    ("new jersey", "New Jersey"),
    ("nm", "New Mexico"),
    ("new mexico", "New Mexico"),
    ("ny", "New York"),
    ("new york", "New York"),
    ("nc", "North Carolina"),
    ("north carolina", "North Carolina"),
    ("nd", "North Dakota"),
    ("north dakota", "North Dakota"),
    ("oh", "Ohio"),
    ("ohio", "Ohio"),
    ("ok", "Oklahoma"),
    ("okla", "Oklahoma"),
    ("oklahoma", "Oklahoma"),
    ("or", "Oregon"),
    ("ore", "Oregon"),
    ("oregon", "Oregon"),
    ("pa", "Pennsylvania"),
    ("penn", "Pennsylvania"),
    ("penna", "Pennsylvania"),
    ("pennsylvania", "Pennsylvania"),
    ("ri", "Rhode Island"),
    ("rhode island", "Rhode Island"),
    ("sc", "South Carolina"),
    ("south carolina", "South Carolina"),
    ("sd", "South Dakota"),
    ("south dakota", "South Dakota"),
    ("tn", "Tennessee"),
    ("tenn", "Tennessee"),
    ("tennessee", "Tennessee"),
    ("tx", "Texas"),
    ("tex", "Texas"),
    ("texas", "Texas"),
    ("ut", "Utah"),
    ("utah", "Utah"),
    ("vt", "Vermont"),
    ("vermont", "Vermont"),
    ("va", "Virginia"),
    ("virginia", "Virginia"),
    ("wa", "Washington"),
    ("wash", "Washington"),
    ("washington", "Washington"),
    ("wv", "West Virginia"),
    ("w va", "West Virginia"),
    ("west virginia", "West Virginia"),
    ("wi", "Wisconsin"),
    ("wis", "Wisconsin"),
    ("wisc", "Wisconsin"),
    ("wisconsin", "Wisconsin"),
    ("wy", "Wyoming"),
    ("wyo", "Wyoming"),
    ("wyoming", "Wyoming"),
];

/// US state names, used by place-type inference on import.
pub fn is_us_state(name: &str) -> bool {
    canonical_form(name).is_some_and(|canonical| {
        !matches!(
            canonical,
            "USA" | "England" | "Scotland" | "Wales" | "Ireland" | "Canada" | "Germany"
        )
    })
}

/// Canonical form of one place component, if the table knows it.
pub fn canonical_form(component: &str) -> Option<&'static str> {
    let key = lookup_key(component);
    if key.is_empty() {
        return None;
    }
    CANONICAL_PLACES
        .iter()
        .find(|(variant, _)| *variant == key)
        .map(|(_, canonical)| *canonical)
}

fn lookup_key(component: &str) -> String {
    component
        .trim()
        .chars()
        .filter(|c| *c != '.')
        .collect::<String>()
        .to_lowercase()
}

/// One observed non-canonical component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaceVariant {
    pub variant: String,
    pub canonical: String,
    pub count: usize,
    pub records: BTreeSet<RecordId>,
}

/// Every place string in the graph with the record that uses it.
pub fn place_usages(graph: &Graph) -> Vec<(RecordId, &str)> {
    let mut usages = Vec::new();
    for person in graph.individuals.values() {
        let places = [person.birth_place.as_deref(), person.death_place.as_deref()]
            .into_iter()
            .chain(person.events.iter().map(|event| event.place.as_deref()))
            .flatten();
        usages.extend(places.map(|place| (person.id.clone(), place)));
    }
    for family in graph.families.values() {
        let places = std::iter::once(family.marriage_place.as_deref())
            .chain(family.events.iter().map(|event| event.place.as_deref()))
            .flatten();
        usages.extend(places.map(|place| (family.id.clone(), place)));
    }
    usages
}

/// Detects variants ranked by descending count, then variant text.
pub fn detect_variants(graph: &Graph) -> Vec<PlaceVariant> {
    let mut found: BTreeMap<String, PlaceVariant> = BTreeMap::new();
    for (record, place) in place_usages(graph) {
        for component in place.split(',').map(str::trim) {
            let Some(canonical) = canonical_form(component) else {
                continue;
            };
            if component == canonical {
                continue;
            }
            let entry = found
                .entry(component.to_string())
                .or_insert_with(|| PlaceVariant {
                    variant: component.to_string(),
                    canonical: canonical.to_string(),
                    count: 0,
                    records: BTreeSet::new(),
                });
            entry.count += 1;
            entry.records.insert(record.clone());
        }
    }
    let mut variants: Vec<PlaceVariant> = found.into_values().collect();
    variants.sort_by(|left, right| {
        right
            .count
            .cmp(&left.count)
            .then_with(|| left.variant.cmp(&right.variant))
    });
    variants
}

/// Rewrites matching components of one place string.
pub fn rewrite_place(place: &str, replacements: &BTreeMap<String, String>) -> Option<String> {
    let mut changed = false;
    let parts: Vec<String> = place
        .split(',')
        .map(|component| {
            let trimmed = component.trim();
            match replacements.get(trimmed) {
                Some(replacement) if replacement != trimmed => {
                    changed = true;
                    replacement.clone()
                }
                _ => trimmed.to_string(),
            }
        })
        .collect();
    changed.then(|| parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::{canonical_form, detect_variants, is_us_state, rewrite_place};
    use crate::model::graph::{Graph, Individual};
    use std::collections::BTreeMap;

    #[test]
    fn canonical_lookup_ignores_case_and_dots() {
        assert_eq!(canonical_form("Mass."), Some("Massachusetts"));
        assert_eq!(canonical_form("U.S.A."), Some("USA"));
        assert_eq!(canonical_form("Springfield"), None);
        assert!(is_us_state("Ohio"));
        assert!(!is_us_state("England"));
    }

    #[test]
    fn variants_are_ranked_by_frequency() {
        let mut graph = Graph::new();
        for (id, place) in [("I1", "Boston, Mass., USA"), ("I2", "Salem, Mass, US"), ("I3", "Lynn, Mass.")] {
            let mut person = Individual::new(id);
            person.birth_place = Some(place.to_string());
            graph.insert_individual(person);
        }
        let variants = detect_variants(&graph);
        assert_eq!(variants[0].variant, "Mass.");
        assert_eq!(variants[0].count, 2);
        assert_eq!(variants[0].canonical, "Massachusetts");
        assert!(variants.iter().all(|variant| variant.variant != "USA"));
    }

    #[test]
    fn rewrite_only_touches_mapped_components() {
        let replacements = BTreeMap::from([("Mass.".to_string(), "Massachusetts".to_string())]);
        assert_eq!(
            rewrite_place("Boston,Mass., USA", &replacements).as_deref(),
            Some("Boston, Massachusetts, USA")
        );
        assert_eq!(rewrite_place("Boston, USA", &replacements), None);
    }
}
