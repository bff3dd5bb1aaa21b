//! JSON document (GEDCOM X) reader.
//!
//! # Invariants
//! - Person ids become graph ids and the person's `external_id`.
//! - Couple relationships become spouse links; their facts attach to the
//!   synthesized family.
//! - Parent-child relationships without a lineage fact are birth links.

use super::ImportError;
use crate::export::gedcomx::{
    event_kind_for_fact, pedigree_for_lineage_fact, GedcomxDocument, GxFact, GxPerson,
    COUPLE, OCCUPATION, PARENT_CHILD, PERSISTENT_IDENTIFIER, TYPE_PREFIX,
};
use crate::gedcom::link_graph;
use crate::model::graph::{
    Citation, Event, EventKind, EventOwner, Graph, Individual, Pedigree, Sex, Source,
};
use crate::model::relations::{attach_partner_events, synthesize_families};
use crate::model::GenDate;
use log::info;
use std::collections::BTreeMap;

/// Parses a JSON document into a linked graph.
pub fn read_gedcomx(text: &str) -> Result<Graph, ImportError> {
    let document: GedcomxDocument = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
    let places: BTreeMap<&str, &str> = document
        .places
        .iter()
        .filter_map(|place| {
            place
                .names
                .first()
                .map(|name| (place.id.as_str(), name.value.as_str()))
        })
        .collect();

    let mut graph = Graph::new();
    for description in &document.source_descriptions {
        let mut source = Source::new(description.id.clone());
        source.title = description.titles.first().map(|title| title.value.clone());
        source.external_id = Some(description.id.clone());
        source.notes = description.notes.iter().map(|note| note.text.clone()).collect();
        graph.insert_source(source);
    }
    for person in &document.persons {
        if person.id.is_empty() {
            continue;
        }
        graph.insert_individual(read_person(person, &places));
    }

    let mut couple_events: Vec<Event> = Vec::new();
    let mut skipped = 0usize;
    for relationship in &document.relationships {
        let first = resource_id(&relationship.person1.resource);
        let second = resource_id(&relationship.person2.resource);
        if !graph.individuals.contains_key(first) || !graph.individuals.contains_key(second) {
            skipped += 1;
            continue;
        }
        match relationship.kind.as_str() {
            COUPLE => {
                for (person, spouse) in [(first, second), (second, first)] {
                    if let Some(individual) = graph.individuals.get_mut(person) {
                        individual.add_spouse(spouse);
                    }
                }
                for fact in &relationship.facts {
                    let mut event = read_fact(fact, EventOwner::Family(String::new()), &places);
                    event.principals = vec![first.to_string(), second.to_string()];
                    couple_events.push(event);
                }
            }
            PARENT_CHILD => {
                let pedigree = relationship
                    .facts
                    .iter()
                    .find_map(|fact| pedigree_for_lineage_fact(&fact.kind))
                    .unwrap_or(Pedigree::Birth);
                let parent_sex = graph.individuals.get(first).map_or(Sex::Unknown, |p| p.sex);
                if let Some(child) = graph.individuals.get_mut(second) {
                    set_parent(child, first, parent_sex, pedigree);
                }
            }
            _ => skipped += 1,
        }
    }

    let synthesized = synthesize_families(&mut graph);
    let attached = attach_partner_events(&mut graph, couple_events);
    let link = link_graph(&mut graph);
    info!(
        "event=read_gedcomx module=import status=ok persons={} families={} synthesized={} couple_facts={} skipped_relationships={} parents_set={}",
        graph.individuals.len(),
        graph.families.len(),
        synthesized,
        attached,
        skipped,
        link.parents_set
    );
    Ok(graph)
}

fn resource_id(resource: &str) -> &str {
    resource.trim().trim_start_matches('#')
}

fn read_person(record: &GxPerson, places: &BTreeMap<&str, &str>) -> Individual {
    let mut person = Individual::new(record.id.clone());
    person.external_id = Some(record.id.clone());
    person.living = record.living;
    person.sex = record.gender.as_ref().map_or(Sex::Unknown, |gender| {
        Sex::from_code(gender.kind.strip_prefix(TYPE_PREFIX).unwrap_or(&gender.kind))
    });

    if let Some(form) = record.names.first().and_then(|name| name.name_forms.first()) {
        for part in &form.parts {
            match part.kind.strip_prefix(TYPE_PREFIX) {
                Some("Given") => person.given_name = Some(part.value.clone()),
                Some("Surname") => person.surname = Some(part.value.clone()),
                _ => {}
            }
        }
        person.name = form
            .full_text
            .clone()
            .filter(|text| !text.trim().is_empty());
        if person.name.is_none() && person.has_name() {
            person.name = Some(person.display_name());
        }
    }
    person.origin_id = record
        .identifiers
        .get(PERSISTENT_IDENTIFIER)
        .and_then(|values| values.first())
        .cloned();

    for fact in &record.facts {
        if fact.kind == OCCUPATION {
            person.occupation = fact.value.clone();
            continue;
        }
        let event = read_fact(fact, EventOwner::Individual(record.id.clone()), places);
        match event.kind {
            EventKind::Birth if person.birth_date.is_none() && person.birth_place.is_none() => {
                person.birth_date = event.date.clone();
                person.birth_place = event.place.clone();
            }
            EventKind::Death if person.death_date.is_none() && person.death_place.is_none() => {
                person.death_date = event.date.clone();
                person.death_place = event.place.clone();
            }
            _ => {}
        }
        person.events.push(event);
    }
    person.notes = record.notes.iter().map(|note| note.text.clone()).collect();
    person
}

fn read_fact(fact: &GxFact, owner: EventOwner, places: &BTreeMap<&str, &str>) -> Event {
    let kind = event_kind_for_fact(&fact.kind);
    let mut event = Event::new(kind.default_tag(), kind, owner);
    if kind == EventKind::Other {
        event.event_type = fact
            .kind
            .strip_prefix("data:,")
            .or_else(|| fact.kind.strip_prefix(TYPE_PREFIX))
            .map(str::to_string);
    }
    event.date = fact.date.as_ref().and_then(|date| {
        match (date.formal.as_deref(), date.original.as_deref()) {
            (Some(formal), original) => Some(GenDate::from_formal(formal, original)),
            (None, Some(original)) => Some(GenDate::parse(original)),
            (None, None) => None,
        }
    });
    event.place = fact.place.as_ref().and_then(|place| {
        place.original.clone().or_else(|| {
            place
                .description
                .as_deref()
                .map(resource_id)
                .and_then(|id| places.get(id))
                .map(|name| name.to_string())
        })
    });
    event.description = fact.value.clone();
    event.citations = fact
        .sources
        .iter()
        .map(|source| Citation {
            source: resource_id(&source.description).to_string(),
            page: source.page.clone(),
            quality: None,
        })
        .collect();
    event
}

fn set_parent(child: &mut Individual, parent: &str, parent_sex: Sex, pedigree: Pedigree) {
    if pedigree != Pedigree::Birth {
        child.add_parent_link(parent, pedigree);
        return;
    }
    match parent_sex {
        Sex::Male if child.father.is_none() => child.father = Some(parent.to_string()),
        Sex::Female if child.mother.is_none() => child.mother = Some(parent.to_string()),
        // Unknown sex fills whichever slot is open, father first.
        Sex::Unknown if child.father.is_none() => child.father = Some(parent.to_string()),
        Sex::Unknown if child.mother.is_none() => child.mother = Some(parent.to_string()),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::read_gedcomx;
    use crate::model::graph::{EventKind, Pedigree, Sex};
    use serde_json::json;

    #[test]
    fn reads_persons_couples_and_lineage() {
        let document = json!({
            "persons": [
                {
                    "id": "P1",
                    "gender": { "type": "http://gedcomx.org/Male" },
                    "names": [{ "nameForms": [{ "fullText": "John Smith" }] }],
                    "facts": [
                        {
                            "type": "http://gedcomx.org/Birth",
                            "date": { "original": "ABT 1900", "formal": "A+1900" },
                            "place": { "description": "#PL1" }
                        },
                        { "type": "http://gedcomx.org/Occupation", "value": "Farmer" }
                    ]
                },
                {
                    "id": "P2",
                    "gender": { "type": "http://gedcomx.org/Female" },
                    "names": [{ "nameForms": [{ "fullText": "Mary Jones" }] }]
                },
                { "id": "P3", "names": [{ "nameForms": [{ "fullText": "Ann Smith" }] }] },
                { "id": "P4", "names": [{ "nameForms": [{ "fullText": "Tom Brown" }] }] }
            ],
            "relationships": [
                {
                    "type": "http://gedcomx.org/Couple",
                    "person1": { "resource": "#P1" },
                    "person2": { "resource": "#P2" },
                    "facts": [{ "type": "http://gedcomx.org/Marriage", "date": { "original": "1925" } }]
                },
                { "type": "http://gedcomx.org/ParentChild", "person1": { "resource": "#P1" }, "person2": { "resource": "#P3" } },
                { "type": "http://gedcomx.org/ParentChild", "person1": { "resource": "#P2" }, "person2": { "resource": "#P3" } },
                {
                    "type": "http://gedcomx.org/ParentChild",
                    "person1": { "resource": "#P1" },
                    "person2": { "resource": "#P4" },
                    "facts": [{ "type": "http://gedcomx.org/StepParent" }]
                }
            ],
            "places": [{ "id": "PL1", "names": [{ "value": "Boston, Massachusetts" }] }]
        });

        let graph = read_gedcomx(&document.to_string()).unwrap();
        let john = &graph.individuals["P1"];
        assert_eq!(john.sex, Sex::Male);
        assert_eq!(john.birth_year(), Some(1900));
        assert_eq!(john.birth_place.as_deref(), Some("Boston, Massachusetts"));
        assert_eq!(john.occupation.as_deref(), Some("Farmer"));
        assert_eq!(john.external_id.as_deref(), Some("P1"));

        let ann = &graph.individuals["P3"];
        assert_eq!(ann.father.as_deref(), Some("P1"));
        assert_eq!(ann.mother.as_deref(), Some("P2"));
        let tom = &graph.individuals["P4"];
        assert_eq!(tom.father, None);
        assert_eq!(tom.parent_links[0].pedigree, Pedigree::Step);

        let family = graph
            .families
            .values()
            .find(|family| family.children.contains(&"P3".to_string()))
            .unwrap();
        assert_eq!(family.marriage_year(), Some(1925));
        assert_eq!(family.events[0].kind, EventKind::Marriage);
    }

    #[test]
    fn invalid_json_is_a_document_error() {
        assert!(read_gedcomx("{ not json").is_err());
    }
}
