//! Post-assembly linking pass.
//!
//! # Responsibility
//! - Resolve family <-> individual back-references.
//! - Classify parent links by pedigree; only birth links set father/mother.
//! - Mirror spouse pairs and back-fill family event principals.
//! - Partners of unknown sex stay unordered; they never fill a husband or
//!   wife slot.
//!
//! # Invariants
//! - Idempotent: `link(link(g)) == link(g)`.
//! - Dangling references are skipped, never created; the quality analyzer
//!   reports them.

use crate::model::graph::{push_unique, FamilyLink, Graph, Pedigree, RecordId, Sex};
use log::info;
use serde::Serialize;

/// Counts of links established by one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LinkReport {
    pub children_backfilled: usize,
    pub partners_backfilled: usize,
    pub parents_set: usize,
    pub parent_links_added: usize,
    pub spouses_mirrored: usize,
    pub principals_filled: usize,
    pub notes_resolved: usize,
    pub dangling_references: usize,
}

/// Runs the linking pass over every family in natural id order.
pub fn link_graph(graph: &mut Graph) -> LinkReport {
    let mut report = LinkReport::default();
    backfill_family_members(graph, &mut report);

    for family_id in graph.family_ids() {
        let Some(family) = graph.families.get(&family_id).cloned() else {
            continue;
        };
        let husband = family
            .husband
            .clone()
            .filter(|id| graph.individuals.contains_key(id));
        let wife = family
            .wife
            .clone()
            .filter(|id| graph.individuals.contains_key(id));
        let unordered: Vec<RecordId> = family
            .unordered_partners
            .iter()
            .filter(|id| graph.individuals.contains_key(*id))
            .cloned()
            .collect();
        report.dangling_references += family.partners().count()
            - usize::from(husband.is_some())
            - usize::from(wife.is_some())
            - unordered.len();

        for child_id in &family.children {
            let Some(child) = graph.individuals.get_mut(child_id) else {
                report.dangling_references += 1;
                continue;
            };
            let pedigree = match child.family_link(&family_id) {
                Some(link) => link.effective_pedigree(),
                None => {
                    child.families_as_child.push(FamilyLink {
                        family: family_id.clone(),
                        pedigree: None,
                    });
                    Pedigree::Birth
                }
            };
            if pedigree == Pedigree::Birth {
                if let Some(father) = &husband {
                    if child.father.is_none() {
                        child.father = Some(father.clone());
                        report.parents_set += 1;
                    }
                }
                if let Some(mother) = &wife {
                    if child.mother.is_none() {
                        child.mother = Some(mother.clone());
                        report.parents_set += 1;
                    }
                }
            } else {
                for parent in husband.iter().chain(wife.iter()) {
                    if child.add_parent_link(parent, pedigree) {
                        report.parent_links_added += 1;
                    }
                }
            }
        }

        let principals: Vec<RecordId> = husband
            .iter()
            .chain(wife.iter())
            .chain(unordered.iter())
            .cloned()
            .collect();
        for partner in &principals {
            if let Some(person) = graph.individuals.get_mut(partner) {
                person.add_family_as_spouse(&family_id);
            }
            for other in principals.iter().filter(|other| *other != partner) {
                report.spouses_mirrored += mirror_spouse(graph, partner, other);
            }
        }

        if let Some(family) = graph.families.get_mut(&family_id) {
            for event in &mut family.events {
                for principal in &principals {
                    if push_unique(&mut event.principals, principal) {
                        report.principals_filled += 1;
                    }
                }
            }
        }
    }

    resolve_note_refs(graph, &mut report);

    info!(
        "event=link module=gedcom status=ok families={} parents_set={} parent_links={} spouses={} dangling={}",
        graph.families.len(),
        report.parents_set,
        report.parent_links_added,
        report.spouses_mirrored,
        report.dangling_references
    );
    report
}

/// Adds members that only the individual side recorded (`FAMC`/`FAMS`).
fn backfill_family_members(graph: &mut Graph, report: &mut LinkReport) {
    for person_id in graph.individual_ids() {
        let Some(person) = graph.individuals.get(&person_id) else {
            continue;
        };
        let as_child: Vec<RecordId> = person
            .families_as_child
            .iter()
            .map(|link| link.family.clone())
            .collect();
        let as_spouse = person.families_as_spouse.clone();
        let sex = person.sex;

        for family_id in as_child {
            if let Some(family) = graph.families.get_mut(&family_id) {
                if family.add_child(&person_id) {
                    report.children_backfilled += 1;
                }
            }
        }
        for family_id in as_spouse {
            let Some(family) = graph.families.get_mut(&family_id) else {
                continue;
            };
            if family.partners().any(|id| *id == person_id) {
                continue;
            }
            let slot = match sex {
                Sex::Male => Some(&mut family.husband),
                Sex::Female => Some(&mut family.wife),
                Sex::Unknown => None,
            };
            match slot {
                Some(slot) if slot.is_none() => *slot = Some(person_id.clone()),
                _ => family.unordered_partners.push(person_id.clone()),
            }
            report.partners_backfilled += 1;
        }
    }
}

fn mirror_spouse(graph: &mut Graph, person: &str, spouse: &str) -> usize {
    graph
        .individuals
        .get_mut(person)
        .map_or(0, |record| usize::from(record.add_spouse(spouse)))
}

fn resolve_note_refs(graph: &mut Graph, report: &mut LinkReport) {
    if graph.notes.is_empty() {
        return;
    }
    let notes = &graph.notes;
    for person in graph.individuals.values_mut() {
        for note_id in &person.note_refs {
            let Some(text) = notes.get(note_id) else {
                continue;
            };
            if !person.notes.iter().any(|existing| existing == text) {
                person.notes.push(text.clone());
                report.notes_resolved += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::link_graph;
    use crate::model::graph::{
        Event, EventKind, EventOwner, Family, FamilyLink, Graph, Individual, Pedigree, Sex,
    };

    fn sample() -> Graph {
        let mut graph = Graph::new();
        let mut father = Individual::new("I1");
        father.sex = Sex::Male;
        graph.insert_individual(father);
        graph.insert_individual(Individual::new("I2"));
        graph.insert_individual(Individual::new("I3"));
        let mut adopted = Individual::new("I4");
        adopted.families_as_child.push(FamilyLink {
            family: "F1".to_string(),
            pedigree: Some(Pedigree::Adoptive),
        });
        graph.insert_individual(adopted);

        let mut family = Family::new("F1");
        family.husband = Some("I1".to_string());
        family.wife = Some("I2".to_string());
        family.children = vec!["I3".to_string(), "I4".to_string(), "I99".to_string()];
        family
            .events
            .push(Event::new("MARR", EventKind::Marriage, EventOwner::Family("F1".to_string())));
        graph.insert_family(family);
        graph
    }

    #[test]
    fn birth_children_get_parents_and_others_get_parent_links() {
        let mut graph = sample();
        let report = link_graph(&mut graph);
        assert_eq!(graph.individuals["I3"].father.as_deref(), Some("I1"));
        assert_eq!(graph.individuals["I3"].mother.as_deref(), Some("I2"));
        let adopted = &graph.individuals["I4"];
        assert_eq!(adopted.father, None);
        assert_eq!(adopted.parent_links.len(), 2);
        assert!(adopted
            .parent_links
            .iter()
            .all(|link| link.pedigree == Pedigree::Adoptive));
        assert_eq!(report.dangling_references, 1);
    }

    #[test]
    fn spouses_and_principals_are_mirrored() {
        let mut graph = sample();
        link_graph(&mut graph);
        assert_eq!(graph.individuals["I1"].spouses, vec!["I2".to_string()]);
        assert_eq!(graph.individuals["I2"].spouses, vec!["I1".to_string()]);
        assert_eq!(graph.individuals["I2"].families_as_spouse, vec!["F1".to_string()]);
        assert_eq!(
            graph.families["F1"].events[0].principals,
            vec!["I1".to_string(), "I2".to_string()]
        );
    }

    #[test]
    fn linking_twice_changes_nothing() {
        let mut graph = sample();
        link_graph(&mut graph);
        let once = graph.clone();
        let report = link_graph(&mut graph);
        assert_eq!(graph, once);
        assert_eq!(report.parents_set, 0);
        assert_eq!(report.spouses_mirrored, 0);
    }

    #[test]
    fn individual_side_links_backfill_families() {
        let mut graph = Graph::new();
        let mut wife = Individual::new("I1");
        wife.sex = Sex::Female;
        wife.families_as_spouse.push("F1".to_string());
        graph.insert_individual(wife);
        let mut child = Individual::new("I2");
        child.families_as_child.push(FamilyLink {
            family: "F1".to_string(),
            pedigree: None,
        });
        graph.insert_individual(child);
        graph.insert_family(Family::new("F1"));

        link_graph(&mut graph);
        assert_eq!(graph.families["F1"].wife.as_deref(), Some("I1"));
        assert_eq!(graph.families["F1"].children, vec!["I2".to_string()]);
        assert_eq!(graph.individuals["I2"].mother.as_deref(), Some("I1"));
    }

    #[test]
    fn unknown_sex_partner_stays_unordered() {
        let mut graph = Graph::new();
        let mut husband = Individual::new("I1");
        husband.sex = Sex::Male;
        graph.insert_individual(husband);
        let mut partner = Individual::new("I2");
        partner.families_as_spouse.push("F1".to_string());
        graph.insert_individual(partner);
        graph.insert_individual(Individual::new("I3"));
        let mut family = Family::new("F1");
        family.husband = Some("I1".to_string());
        family.children.push("I3".to_string());
        graph.insert_family(family);

        link_graph(&mut graph);
        let family = &graph.families["F1"];
        assert_eq!(family.wife, None);
        assert_eq!(family.unordered_partners, vec!["I2".to_string()]);
        assert_eq!(graph.individuals["I1"].spouses, vec!["I2".to_string()]);
        assert_eq!(graph.individuals["I2"].spouses, vec!["I1".to_string()]);
        let child = &graph.individuals["I3"];
        assert_eq!(child.father.as_deref(), Some("I1"));
        assert_eq!(child.mother, None);

        let once = graph.clone();
        link_graph(&mut graph);
        assert_eq!(graph, once);
    }
}
