//! Rebuilds a record graph from stored notes.
//!
//! # Responsibility
//! - Map person, event, source and note documents back into a `Graph` so a
//!   store can be analyzed and exported.
//!
//! # Invariants
//! - Stored property names and values pass through the alias resolver first.
//! - Documents without a record id are skipped, never invented.
//! - Family records are synthesized from individual-level links, then the
//!   regular linking pass runs.

use crate::gedcom::link_graph;
use crate::model::graph::{
    Citation, Event, EventKind, EventOwner, Graph, Individual, Pedigree, RecordId, Sex, Source,
};
use crate::model::relations::{attach_partner_events, synthesize_families};
use crate::model::GenDate;
use crate::repo::aliases::AliasResolver;
use crate::repo::note_store::{NoteDocument, NoteKind, NoteStore, StoreResult};
use crate::repo::schema::{self, RelationField};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;

/// Loads every document in `store` into a linked graph.
pub fn load_graph(store: &dyn NoteStore, aliases: &dyn AliasResolver) -> StoreResult<Graph> {
    let mut graph = Graph::new();
    let mut family_events: Vec<Event> = Vec::new();
    let mut skipped = 0usize;

    let documents: Vec<NoteDocument> = store
        .list_all()?
        .into_iter()
        .map(|document| canonicalize(document, aliases))
        .collect();

    for document in &documents {
        let Some(id) = document.record_id().map(str::to_string) else {
            skipped += 1;
            continue;
        };
        match document.kind {
            NoteKind::Person => {
                graph.insert_individual(read_person(document, id, aliases));
            }
            NoteKind::Source => {
                graph.insert_source(read_source(document, id));
            }
            NoteKind::Note => {
                graph.notes.insert(id, document.body.trim().to_string());
            }
            NoteKind::Event | NoteKind::Place => {}
        }
    }

    // Events attach after every person is known.
    for document in documents.iter().filter(|doc| doc.kind == NoteKind::Event) {
        let event = read_event(document);
        match (event.principals.len(), event.kind.is_family_event()) {
            (1, false) => {
                let owner = event.principals[0].clone();
                if let Some(person) = graph.individuals.get_mut(&owner) {
                    attach_person_event(person, event);
                }
            }
            (2, true) => family_events.push(event),
            _ => skipped += 1,
        }
    }

    let synthesized = synthesize_families(&mut graph);
    let attached = attach_partner_events(&mut graph, family_events);
    let link = link_graph(&mut graph);

    info!(
        "event=load_graph module=repo status=ok individuals={} families={} synthesized={} family_events={} sources={} skipped={} parents_set={}",
        graph.individuals.len(),
        graph.families.len(),
        synthesized,
        attached,
        graph.sources.len(),
        skipped,
        link.parents_set
    );
    Ok(graph)
}

fn canonicalize(mut document: NoteDocument, aliases: &dyn AliasResolver) -> NoteDocument {
    let properties = std::mem::take(&mut document.properties);
    document.properties = properties
        .into_iter()
        .map(|(key, value)| (aliases.canonical_property(&key).to_string(), value))
        .collect::<BTreeMap<String, Value>>();
    document
}

fn read_person(document: &NoteDocument, id: RecordId, aliases: &dyn AliasResolver) -> Individual {
    let text = |key: &str| document.text(key).map(str::to_string);
    let mut person = Individual::new(id);
    person.name = text(schema::NAME);
    person.given_name = text(schema::GIVEN_NAME);
    person.surname = text(schema::SURNAME);
    person.sex = document
        .text(schema::SEX)
        .map_or(Sex::Unknown, |value| {
            Sex::from_code(aliases.canonical_value(schema::SEX, value))
        });
    person.birth_date = document.text(schema::BIRTH_DATE).map(GenDate::parse);
    person.birth_place = text(schema::BIRTH_PLACE);
    person.death_date = document.text(schema::DEATH_DATE).map(GenDate::parse);
    person.death_place = text(schema::DEATH_PLACE);
    person.occupation = text(schema::OCCUPATION);
    person.collection = text(schema::COLLECTION);
    person.research_level = document
        .properties
        .get(schema::RESEARCH_LEVEL)
        .and_then(|value| match value {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        })
        .and_then(|level| u8::try_from(level).ok());
    person.living = document.properties.get(schema::LIVING).and_then(Value::as_bool);
    person.external_id = text(schema::EXTERNAL_ID);
    person.origin_id = text(schema::ORIGIN_ID);
    person.file_path = Some(document.path.clone());

    person.father = relation_ids(document, schema::FATHER).into_iter().next();
    person.mother = relation_ids(document, schema::MOTHER).into_iter().next();
    person.spouses = relation_ids(document, schema::SPOUSES);
    for (field, pedigree) in [
        (schema::STEP_PARENTS, Pedigree::Step),
        (schema::ADOPTIVE_PARENTS, Pedigree::Adoptive),
        (schema::FOSTER_PARENTS, Pedigree::Foster),
    ] {
        for parent in relation_ids(document, field) {
            person.add_parent_link(&parent, pedigree);
        }
    }

    let body = document.body.trim();
    if !body.is_empty() {
        person.notes.push(body.to_string());
    }
    person
}

fn relation_ids(document: &NoteDocument, field: RelationField) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = Vec::new();
    for id in document.texts(field.id) {
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

fn read_source(document: &NoteDocument, id: RecordId) -> Source {
    let text = |key: &str| document.text(key).map(str::to_string);
    let mut source = Source::new(id);
    source.title = text(schema::TITLE).or_else(|| Some(document.basename().to_string()));
    source.author = text(schema::AUTHOR);
    source.publisher = text(schema::PUBLISHER);
    source.repository = text(schema::REPOSITORY);
    source.external_id = text(schema::EXTERNAL_ID);
    let body = document.body.trim();
    if !body.is_empty() {
        source.notes.push(body.to_string());
    }
    source
}

fn read_event(document: &NoteDocument) -> Event {
    let kind = document
        .text(schema::EVENT_TYPE)
        .and_then(EventKind::parse)
        .unwrap_or(EventKind::Other);
    let tag = document
        .text(schema::EVENT_TAG)
        .map_or_else(|| kind.default_tag().to_string(), str::to_string);
    let principals = relation_ids(document, schema::PERSONS);
    let owner = match principals.first() {
        Some(first) if !kind.is_family_event() => EventOwner::Individual(first.clone()),
        _ => EventOwner::Family(String::new()),
    };
    let mut event = Event::new(tag, kind, owner);
    event.principals = principals;
    event.date = document.text(schema::DATE).map(GenDate::parse);
    event.place = document.text(schema::PLACE).map(str::to_string);
    event.description = document.text(schema::DESCRIPTION).map(str::to_string);
    event.citations = document
        .texts(schema::SOURCE_ID)
        .into_iter()
        .map(|source| Citation {
            source: source.to_string(),
            page: None,
            quality: None,
        })
        .collect();
    event
}

fn attach_person_event(person: &mut Individual, event: Event) {
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

#[cfg(test)]
mod tests {
    use super::load_graph;
    use crate::db::open_db_in_memory;
    use crate::model::graph::{EventKind, Pedigree, Sex};
    use crate::repo::aliases::{AliasTable, NoAliases};
    use crate::repo::note_store::{NoteDocument, NoteKind, NoteStore, SqliteNoteStore};
    use serde_json::json;

    fn person(path: &str, id: &str) -> NoteDocument {
        let mut document = NoteDocument::new(path, NoteKind::Person);
        document.set("cr_id", id);
        document
    }

    #[test]
    fn rebuilds_families_from_person_links() {
        let conn = open_db_in_memory().unwrap();
        let mut store = SqliteNoteStore::new(&conn);
        let mut father = person("People/John.md", "p1");
        father.set("sex", "male");
        father.set("spouse_id", json!(["p2"]));
        store.create(&father).unwrap();
        let mut mother = person("People/Mary.md", "p2");
        mother.set("sex", "female");
        store.create(&mother).unwrap();
        let mut child = person("People/Ann.md", "p3");
        child.set("father_id", "p1");
        child.set("mother_id", "p2");
        store.create(&child).unwrap();
        let mut stepchild = person("People/Tom.md", "p4");
        stepchild.set("step_parent_id", json!(["p1"]));
        store.create(&stepchild).unwrap();

        let mut marriage = NoteDocument::new("Events/Marriage.md", NoteKind::Event);
        marriage.set("cr_id", "e1");
        marriage.set("event_type", "marriage");
        marriage.set("date", "1950");
        marriage.set("person_id", json!(["p2", "p1"]));
        store.create(&marriage).unwrap();

        let graph = load_graph(&store, &NoAliases).unwrap();
        assert_eq!(graph.individuals.len(), 4);
        let family = graph
            .families
            .values()
            .find(|family| family.children.contains(&"p3".to_string()))
            .unwrap();
        assert_eq!(family.husband.as_deref(), Some("p1"));
        assert_eq!(family.wife.as_deref(), Some("p2"));
        assert_eq!(family.marriage_year(), Some(1950));
        assert_eq!(family.events[0].kind, EventKind::Marriage);
        assert_eq!(graph.individuals["p2"].spouses, vec!["p1".to_string()]);
        assert_eq!(graph.individuals["p4"].parent_links[0].pedigree, Pedigree::Step);
        assert_eq!(graph.individuals["p4"].father, None);
    }

    #[test]
    fn aliases_map_renamed_properties() {
        let conn = open_db_in_memory().unwrap();
        let mut store = SqliteNoteStore::new(&conn);
        let mut document = person("People/Jane.md", "p1");
        document.set("gender", "F");
        document.set("born", "ABT 1900");
        store.create(&document).unwrap();

        let aliases = AliasTable::default()
            .with_property("sex", "gender")
            .with_property("birth_date", "born")
            .with_value("sex", "F", "female");
        let graph = load_graph(&store, &aliases).unwrap();
        let jane = &graph.individuals["p1"];
        assert_eq!(jane.sex, Sex::Female);
        assert_eq!(jane.birth_year(), Some(1900));
        assert_eq!(jane.file_path.as_deref(), Some("People/Jane.md"));
    }
}
