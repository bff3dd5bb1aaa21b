//! Caller-approved fix application.
//!
//! # Invariants
//! - Only explicitly listed records are deleted; every reference to a
//!   deleted record is scrubbed so no new dangling links appear.
//! - Place rewrites touch whole comma components only.

use crate::model::graph::{Graph, RecordId};
use crate::quality::places::{rewrite_place, PlaceVariant};
use crate::quality::{IssueCode, QualityIssue};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixChoices {
    /// Place component variant -> replacement.
    pub place_replacements: BTreeMap<String, String>,
    pub skip_individuals: Vec<RecordId>,
    pub skip_families: Vec<RecordId>,
}

impl FixChoices {
    /// Default policy: standardize every detected place variant and drop
    /// families without members.
    pub fn defaults_for(issues: &[QualityIssue], variants: &[PlaceVariant]) -> Self {
        Self {
            place_replacements: variants
                .iter()
                .map(|variant| (variant.variant.clone(), variant.canonical.clone()))
                .collect(),
            skip_individuals: Vec::new(),
            skip_families: issues
                .iter()
                .filter(|issue| issue.code == IssueCode::EmptyFamily)
                .map(|issue| issue.record_id.clone())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.place_replacements.is_empty()
            && self.skip_individuals.is_empty()
            && self.skip_families.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FixReport {
    pub places_rewritten: usize,
    pub individuals_removed: usize,
    pub families_removed: usize,
    pub references_scrubbed: usize,
}

/// Applies `choices` to the graph in place.
pub fn apply_fixes(graph: &mut Graph, choices: &FixChoices) -> FixReport {
    let mut report = FixReport::default();

    if !choices.place_replacements.is_empty() {
        let mut rewrite = |place: &mut Option<String>| {
            if let Some(updated) = place
                .as_deref()
                .and_then(|value| rewrite_place(value, &choices.place_replacements))
            {
                *place = Some(updated);
                report.places_rewritten += 1;
            }
        };
        for person in graph.individuals.values_mut() {
            rewrite(&mut person.birth_place);
            rewrite(&mut person.death_place);
            for event in &mut person.events {
                rewrite(&mut event.place);
            }
        }
        for family in graph.families.values_mut() {
            rewrite(&mut family.marriage_place);
            for event in &mut family.events {
                rewrite(&mut event.place);
            }
        }
    }

    let removed_people: BTreeSet<&str> = choices
        .skip_individuals
        .iter()
        .filter(|id| graph.individuals.remove(id.as_str()).is_some())
        .map(String::as_str)
        .collect();
    let removed_families: BTreeSet<&str> = choices
        .skip_families
        .iter()
        .filter(|id| graph.families.remove(id.as_str()).is_some())
        .map(String::as_str)
        .collect();
    report.individuals_removed = removed_people.len();
    report.families_removed = removed_families.len();

    if !removed_people.is_empty() || !removed_families.is_empty() {
        report.references_scrubbed = scrub_references(graph, &removed_people, &removed_families);
    }

    info!(
        "event=apply_fixes module=quality status=ok places={} individuals_removed={} families_removed={} scrubbed={}",
        report.places_rewritten,
        report.individuals_removed,
        report.families_removed,
        report.references_scrubbed
    );
    report
}

fn scrub_references(graph: &mut Graph, people: &BTreeSet<&str>, families: &BTreeSet<&str>) -> usize {
    let mut scrubbed = 0;
    let mut clear = |slot: &mut Option<RecordId>, removed: &BTreeSet<&str>| {
        if slot.as_deref().is_some_and(|id| removed.contains(id)) {
            *slot = None;
            scrubbed += 1;
        }
    };
    for person in graph.individuals.values_mut() {
        clear(&mut person.father, people);
        clear(&mut person.mother, people);
    }
    for family in graph.families.values_mut() {
        clear(&mut family.husband, people);
        clear(&mut family.wife, people);
    }

    let mut retain = |count_before: usize, count_after: usize| scrubbed += count_before - count_after;
    for person in graph.individuals.values_mut() {
        let before = person.parent_links.len();
        person.parent_links.retain(|link| !people.contains(link.parent.as_str()));
        retain(before, person.parent_links.len());

        let before = person.spouses.len();
        person.spouses.retain(|id| !people.contains(id.as_str()));
        retain(before, person.spouses.len());

        let before = person.associations.len();
        person.associations.retain(|asso| !people.contains(asso.target.as_str()));
        retain(before, person.associations.len());

        let before = person.families_as_child.len();
        person.families_as_child.retain(|link| !families.contains(link.family.as_str()));
        retain(before, person.families_as_child.len());

        let before = person.families_as_spouse.len();
        person.families_as_spouse.retain(|id| !families.contains(id.as_str()));
        retain(before, person.families_as_spouse.len());
    }
    for family in graph.families.values_mut() {
        let before = family.children.len();
        family.children.retain(|id| !people.contains(id.as_str()));
        retain(before, family.children.len());
        let before = family.unordered_partners.len();
        family.unordered_partners.retain(|id| !people.contains(id.as_str()));
        retain(before, family.unordered_partners.len());
        for event in &mut family.events {
            event.principals.retain(|id| !people.contains(id.as_str()));
        }
    }
    scrubbed
}

#[cfg(test)]
mod tests {
    use super::{apply_fixes, FixChoices};
    use crate::model::graph::{Family, Graph, Individual};
    use std::collections::BTreeMap;

    #[test]
    fn rewrites_places_and_removes_skipped_records() {
        let mut graph = Graph::new();
        let mut father = Individual::new("I1");
        father.birth_place = Some("Boston, Mass.".to_string());
        father.spouses.push("I2".to_string());
        graph.insert_individual(father);
        graph.insert_individual(Individual::new("I2"));
        let mut child = Individual::new("I3");
        child.mother = Some("I2".to_string());
        graph.insert_individual(child);
        let mut family = Family::new("F1");
        family.husband = Some("I1".to_string());
        family.wife = Some("I2".to_string());
        family.children.push("I3".to_string());
        graph.insert_family(family);

        let choices = FixChoices {
            place_replacements: BTreeMap::from([(
                "Mass.".to_string(),
                "Massachusetts".to_string(),
            )]),
            skip_individuals: vec!["I2".to_string()],
            skip_families: Vec::new(),
        };
        let report = apply_fixes(&mut graph, &choices);

        assert_eq!(report.places_rewritten, 1);
        assert_eq!(report.individuals_removed, 1);
        assert_eq!(
            graph.individuals["I1"].birth_place.as_deref(),
            Some("Boston, Massachusetts")
        );
        assert!(graph.individuals["I1"].spouses.is_empty());
        assert_eq!(graph.individuals["I3"].mother, None);
        assert_eq!(graph.families["F1"].wife, None);
        assert_eq!(report.references_scrubbed, 3);
    }

    #[test]
    fn removed_people_leave_unordered_partner_lists() {
        let mut graph = Graph::new();
        graph.insert_individual(Individual::new("I1"));
        graph.insert_individual(Individual::new("I2"));
        let mut family = Family::new("F1");
        family.unordered_partners = vec!["I1".to_string(), "I2".to_string()];
        graph.insert_family(family);

        let choices = FixChoices {
            place_replacements: BTreeMap::new(),
            skip_individuals: vec!["I2".to_string()],
            skip_families: Vec::new(),
        };
        let report = apply_fixes(&mut graph, &choices);

        assert_eq!(graph.families["F1"].unordered_partners, vec!["I1".to_string()]);
        assert_eq!(report.references_scrubbed, 1);
    }
}
