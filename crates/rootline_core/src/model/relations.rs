//! Relationship planning over a graph.
//!
//! # Responsibility
//! - Compute the family groupings a target format needs from family records
//!   plus individual-level parent/spouse references.
//! - Assign husband/wife roles only where a format requires them.
//!
//! # Invariants
//! - Partners are an unordered pair, stored in natural id order.
//! - Every included child appears at most once per plan.
//! - Planning never mutates the graph; `synthesize_families` is the explicit
//!   mutation used by importers that only know individual-level links.

use crate::model::graph::{
    natural_cmp, Event, EventKind, EventOwner, Family, FamilyLink, Graph, Pedigree, RecordId, Sex,
};
use crate::model::GenDate;
use log::debug;
use std::collections::BTreeMap;

/// One family grouping to emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyPlan {
    /// Source family id, or a synthesized key for derived groupings.
    pub key: String,
    pub source_family: Option<RecordId>,
    /// Unordered partners (0..=2), natural id order.
    pub partners: Vec<RecordId>,
    pub children: Vec<(RecordId, Pedigree)>,
    pub marriage_date: Option<GenDate>,
    pub marriage_place: Option<String>,
    pub events: Vec<Event>,
    pub external_id: Option<String>,
}

impl FamilyPlan {
    fn derived(partners: Vec<RecordId>) -> Self {
        Self {
            key: format!("derived:{}", partners.join("+")),
            source_family: None,
            partners,
            children: Vec::new(),
            marriage_date: None,
            marriage_place: None,
            events: Vec::new(),
            external_id: None,
        }
    }

    pub fn has_child(&self, child: &str) -> bool {
        self.children.iter().any(|(id, _)| id == child)
    }
}

/// Husband/wife slots for formats that require roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerRoles {
    pub husband: Option<RecordId>,
    pub wife: Option<RecordId>,
    /// True when roles could not be derived from recorded sex.
    pub ambiguous: bool,
}

/// Plans family groupings for every included individual.
///
/// `include` filters records out (e.g. hidden by privacy policy); references
/// to excluded or missing individuals are dropped.
pub fn plan_families(graph: &Graph, include: &dyn Fn(&str) -> bool) -> Vec<FamilyPlan> {
    let present = |id: &str| graph.individuals.contains_key(id) && include(id);
    let mut plans: Vec<FamilyPlan> = Vec::new();
    let mut by_partners: BTreeMap<Vec<RecordId>, usize> = BTreeMap::new();

    for family_id in graph.family_ids() {
        let Some(family) = graph.families.get(&family_id) else {
            continue;
        };
        let partners = partner_key(family.partners().filter(|id| present(id)).cloned());
        let mut plan = FamilyPlan {
            key: family_id.clone(),
            source_family: Some(family_id.clone()),
            partners: partners.clone(),
            children: Vec::new(),
            marriage_date: family.marriage_date.clone(),
            marriage_place: family.marriage_place.clone(),
            events: family.events.clone(),
            external_id: family.external_id.clone(),
        };
        for child in family.children.iter().filter(|id| present(id)) {
            if plan.has_child(child) {
                continue;
            }
            let pedigree = graph
                .individuals
                .get(child)
                .and_then(|person| person.family_link(&family_id))
                .map_or(Pedigree::Birth, FamilyLink::effective_pedigree);
            plan.children.push((child.clone(), pedigree));
        }
        if plan.partners.is_empty() && plan.children.is_empty() {
            continue;
        }
        if !partners.is_empty() {
            by_partners.entry(partners).or_insert(plans.len());
        }
        plans.push(plan);
    }

    for id in graph.individual_ids() {
        if !include(&id) {
            continue;
        }
        let Some(person) = graph.individuals.get(&id) else {
            continue;
        };

        let biological = partner_key(
            [person.father.as_ref(), person.mother.as_ref()]
                .into_iter()
                .flatten()
                .filter(|parent| present(parent))
                .cloned(),
        );
        if !biological.is_empty() {
            attach_child(&mut plans, &mut by_partners, biological, &id, Pedigree::Birth);
        }

        for pedigree in [Pedigree::Step, Pedigree::Adoptive, Pedigree::Foster] {
            let mut parents = partner_key(
                person
                    .parent_links
                    .iter()
                    .filter(|link| link.pedigree == pedigree && present(&link.parent))
                    .map(|link| link.parent.clone()),
            );
            parents.truncate(2);
            if !parents.is_empty() {
                attach_child(&mut plans, &mut by_partners, parents, &id, pedigree);
            }
        }

        for spouse in person.spouses.iter().filter(|spouse| present(spouse)) {
            let key = partner_key([id.clone(), spouse.clone()].into_iter());
            if key.len() == 2 && !by_partners.contains_key(&key) {
                by_partners.insert(key.clone(), plans.len());
                plans.push(FamilyPlan::derived(key));
            }
        }
    }

    plans
}

fn attach_child(
    plans: &mut Vec<FamilyPlan>,
    by_partners: &mut BTreeMap<Vec<RecordId>, usize>,
    partners: Vec<RecordId>,
    child: &str,
    pedigree: Pedigree,
) {
    if let Some(index) = by_partners.get(&partners).copied() {
        if !plans[index].has_child(child) {
            plans[index].children.push((child.to_string(), pedigree));
        }
        return;
    }
    let mut plan = FamilyPlan::derived(partners.clone());
    plan.children.push((child.to_string(), pedigree));
    by_partners.insert(partners, plans.len());
    plans.push(plan);
}

fn partner_key(ids: impl Iterator<Item = RecordId>) -> Vec<RecordId> {
    let mut key: Vec<RecordId> = ids.collect();
    key.sort_by(|left, right| natural_cmp(left, right));
    key.dedup();
    key
}

/// Assigns husband/wife slots for one plan.
///
/// A source family's recorded roles win. Otherwise roles follow recorded sex;
/// when sex does not distinguish the partners the canonical id order is used
/// and the result is flagged as ambiguous.
pub fn assign_roles(graph: &Graph, plan: &FamilyPlan) -> PartnerRoles {
    let sex_of = |id: &str| graph.individuals.get(id).map_or(Sex::Unknown, |p| p.sex);
    if let Some(family) = plan
        .source_family
        .as_deref()
        .and_then(|id| graph.families.get(id))
    {
        let keep = |value: &Option<RecordId>| {
            value
                .as_ref()
                .filter(|id| plan.partners.contains(*id))
                .cloned()
        };
        let mut husband = keep(&family.husband);
        let mut wife = keep(&family.wife);
        if husband.is_some() || wife.is_some() {
            let mut ambiguous = false;
            // Unordered partners take whichever slot is still free.
            for partner in &plan.partners {
                if husband.as_ref() == Some(partner) || wife.as_ref() == Some(partner) {
                    continue;
                }
                let sex = sex_of(partner);
                if husband.is_none() && sex != Sex::Female {
                    husband = Some(partner.clone());
                } else if wife.is_none() && sex != Sex::Male {
                    wife = Some(partner.clone());
                } else {
                    continue;
                }
                ambiguous |= sex == Sex::Unknown;
            }
            return PartnerRoles {
                husband,
                wife,
                ambiguous,
            };
        }
    }

    match plan.partners.as_slice() {
        [] => PartnerRoles {
            husband: None,
            wife: None,
            ambiguous: false,
        },
        [only] => match sex_of(only) {
            Sex::Female => PartnerRoles {
                husband: None,
                wife: Some(only.clone()),
                ambiguous: false,
            },
            sex => PartnerRoles {
                husband: Some(only.clone()),
                wife: None,
                ambiguous: sex == Sex::Unknown,
            },
        },
        [first, second, ..] => {
            let (first_sex, second_sex) = (sex_of(first), sex_of(second));
            let swapped = (first_sex == Sex::Female && second_sex != Sex::Female)
                || (second_sex == Sex::Male && first_sex != Sex::Male);
            let distinguished = first_sex != second_sex
                && (first_sex != Sex::Unknown || second_sex != Sex::Unknown);
            if !distinguished {
                debug!(
                    "event=assign_roles module=relations status=ambiguous key={}",
                    plan.key
                );
            }
            let (husband, wife) = if swapped {
                (second.clone(), first.clone())
            } else {
                (first.clone(), second.clone())
            };
            PartnerRoles {
                husband: Some(husband),
                wife: Some(wife),
                ambiguous: !distinguished,
            }
        }
    }
}

/// Materializes family records from individual-level links.
///
/// Used by importers whose source format has no family records. Existing
/// families are kept; derived groupings get fresh `F<n>` ids.
pub fn synthesize_families(graph: &mut Graph) -> usize {
    let plans = plan_families(graph, &|_| true);
    let mut next = graph.families.len() + 1;
    let mut created = 0;

    for plan in plans {
        if plan.source_family.is_some() {
            continue;
        }
        let mut id = format!("F{next}");
        while graph.families.contains_key(&id) {
            next += 1;
            id = format!("F{next}");
        }
        next += 1;

        let roles = assign_roles(graph, &plan);
        let mut family = Family::new(id.clone());
        if roles.ambiguous {
            family.unordered_partners = plan.partners.clone();
        } else {
            family.husband = roles.husband.clone();
            family.wife = roles.wife.clone();
        }
        family.marriage_date = plan.marriage_date.clone();
        family.marriage_place = plan.marriage_place.clone();
        for partner in &plan.partners {
            if let Some(person) = graph.individuals.get_mut(partner) {
                person.add_family_as_spouse(&id);
            }
        }
        for (child, pedigree) in &plan.children {
            family.add_child(child);
            if let Some(person) = graph.individuals.get_mut(child) {
                if person.family_link(&id).is_none() {
                    person.families_as_child.push(FamilyLink {
                        family: id.clone(),
                        pedigree: Some(*pedigree),
                    });
                }
            }
        }
        graph.insert_family(family);
        created += 1;
    }
    created
}

/// Attaches family events to the family whose partners are exactly the
/// event's principals. Events without such a family are dropped.
///
/// Returns the number of attached events.
pub fn attach_partner_events(graph: &mut Graph, events: Vec<Event>) -> usize {
    let mut attached = 0;
    for mut event in events {
        let mut principals = event.principals.clone();
        principals.sort_by(|left, right| natural_cmp(left, right));
        let family = graph.families.values_mut().find(|family| {
            let mut partners: Vec<RecordId> = family.partners().cloned().collect();
            partners.sort_by(|left, right| natural_cmp(left, right));
            partners == principals
        });
        let Some(family) = family else {
            continue;
        };
        if event.kind == EventKind::Marriage
            && family.marriage_date.is_none()
            && family.marriage_place.is_none()
        {
            family.marriage_date = event.date.clone();
            family.marriage_place = event.place.clone();
        }
        event.owner = EventOwner::Family(family.id.clone());
        family.events.push(event);
        attached += 1;
    }
    attached
}

#[cfg(test)]
mod tests {
    use super::{assign_roles, plan_families, synthesize_families};
    use crate::model::graph::{Family, Graph, Individual, Pedigree, Sex};

    fn person(id: &str, sex: Sex) -> Individual {
        let mut person = Individual::new(id);
        person.sex = sex;
        person
    }

    #[test]
    fn derives_parent_family_from_individual_links() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Male));
        graph.insert_individual(person("I2", Sex::Female));
        let mut child = person("I3", Sex::Unknown);
        child.father = Some("I1".to_string());
        child.mother = Some("I2".to_string());
        graph.insert_individual(child);
        let mut stepchild = person("I4", Sex::Unknown);
        stepchild.add_parent_link("I1", Pedigree::Step);
        graph.insert_individual(stepchild);

        let plans = plan_families(&graph, &|_| true);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].partners, vec!["I1".to_string(), "I2".to_string()]);
        assert_eq!(plans[0].children, vec![("I3".to_string(), Pedigree::Birth)]);
        assert_eq!(plans[1].children, vec![("I4".to_string(), Pedigree::Step)]);
    }

    #[test]
    fn child_of_a_recorded_family_still_gets_its_step_family() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Male));
        graph.insert_individual(person("I2", Sex::Female));
        graph.insert_individual(person("I5", Sex::Male));
        let mut child = person("I3", Sex::Unknown);
        child.father = Some("I1".to_string());
        child.mother = Some("I2".to_string());
        child.add_parent_link("I5", Pedigree::Step);
        graph.insert_individual(child);
        let mut family = Family::new("F1");
        family.husband = Some("I1".to_string());
        family.wife = Some("I2".to_string());
        family.children.push("I3".to_string());
        graph.insert_family(family);

        let plans = plan_families(&graph, &|_| true);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[0].source_family.as_deref(), Some("F1"));
        assert_eq!(plans[0].children, vec![("I3".to_string(), Pedigree::Birth)]);
        assert_eq!(plans[1].partners, vec!["I5".to_string()]);
        assert_eq!(plans[1].children, vec![("I3".to_string(), Pedigree::Step)]);
    }

    #[test]
    fn roles_follow_sex_and_flag_ambiguity() {
        let mut graph = Graph::new();
        let mut wife = person("I1", Sex::Female);
        wife.spouses.push("I2".to_string());
        graph.insert_individual(wife);
        graph.insert_individual(person("I2", Sex::Male));
        graph.insert_individual(person("I3", Sex::Unknown));
        let mut other = person("I4", Sex::Unknown);
        other.spouses.push("I3".to_string());
        graph.insert_individual(other);

        let plans = plan_families(&graph, &|_| true);
        let roles = assign_roles(&graph, &plans[0]);
        assert_eq!(roles.husband.as_deref(), Some("I2"));
        assert_eq!(roles.wife.as_deref(), Some("I1"));
        assert!(!roles.ambiguous);

        let roles = assign_roles(&graph, &plans[1]);
        assert!(roles.ambiguous);
        assert_eq!(roles.husband.as_deref(), Some("I3"));
    }

    #[test]
    fn synthesize_creates_linked_family_records() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Male));
        let mut child = person("I2", Sex::Female);
        child.father = Some("I1".to_string());
        graph.insert_individual(child);

        assert_eq!(synthesize_families(&mut graph), 1);
        let family = graph.families.get("F1").expect("family F1 should exist");
        assert_eq!(family.husband.as_deref(), Some("I1"));
        assert_eq!(family.children, vec!["I2".to_string()]);
        assert_eq!(graph.individuals["I1"].families_as_spouse, vec!["F1".to_string()]);
    }

    #[test]
    fn unordered_partner_takes_the_free_slot() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Male));
        graph.insert_individual(person("I2", Sex::Unknown));
        let mut family = Family::new("F1");
        family.husband = Some("I1".to_string());
        family.unordered_partners.push("I2".to_string());
        graph.insert_family(family);

        let plans = plan_families(&graph, &|_| true);
        let roles = assign_roles(&graph, &plans[0]);
        assert_eq!(roles.husband.as_deref(), Some("I1"));
        assert_eq!(roles.wife.as_deref(), Some("I2"));
        assert!(roles.ambiguous);
    }

    #[test]
    fn synthesized_families_keep_unknown_partners_unordered() {
        let mut graph = Graph::new();
        let mut first = person("I1", Sex::Unknown);
        first.spouses.push("I2".to_string());
        graph.insert_individual(first);
        graph.insert_individual(person("I2", Sex::Unknown));

        assert_eq!(synthesize_families(&mut graph), 1);
        let family = graph.families.get("F1").expect("family F1 should exist");
        assert_eq!(family.husband, None);
        assert_eq!(family.wife, None);
        assert_eq!(family.unordered_partners, vec!["I1".to_string(), "I2".to_string()]);
    }
}
