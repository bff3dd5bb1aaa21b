//! Two-pass materialization of a graph into a note store.
//!
//! # Responsibility
//! - Pass 1: create place, source, note, person and event documents, each
//!   with a fresh record id. Relationship fields hold `@external@`
//!   placeholders because targets may not exist yet.
//! - Pass 2: rewrite every placeholder to the target's record id and link.
//!
//! # Invariants
//! - Writes are sequential so path collision checks observe every prior write.
//! - Pass 2 addresses documents by the path written in pass 1, never by name.
//! - After pass 2 no document holds a placeholder; unresolvable ones are
//!   removed and reported as warnings.
//! - Place records are created root first, so parents are referenced by their
//!   final record id directly.

use super::places::{normalize_place, plan_places};
use super::{
    FilenameFormat, ImportOptions, ImportPhase, ImportProgress, ImportResult, ProgressFn,
    RecordFailure,
};
use crate::model::graph::{
    Event, EventKind, EventOwner, Graph, Individual, Pedigree, RecordId, Sex,
};
use crate::model::GenDate;
use crate::repo::aliases::AliasResolver;
use crate::repo::note_store::{NoteDocument, NoteKind, NoteStore, StoreError, RECORD_ID_PROPERTY};
use crate::repo::places::{PLACE_FULL_NAME, PLACE_NAME, PLACE_PARENT_ID, PLACE_TYPE};
use crate::repo::schema::{self, wikilink, RelationField};
use log::{info, warn};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

const PLACE_PARENT_LINK: &str = "parent_place";
const FORBIDDEN_FILENAME_CHARS: &[char] =
    &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '#', '^', '[', ']'];

/// Materializes `graph` into `store`.
///
/// Never fails as a whole: per-record failures land in `ImportResult::errors`.
pub fn import_graph(
    graph: &Graph,
    store: &mut dyn NoteStore,
    options: &ImportOptions,
    aliases: &dyn AliasResolver,
    progress: Option<ProgressFn<'_>>,
) -> ImportResult {
    info!(
        "event=import_materialize module=import status=start individuals={} families={} sources={} notes={}",
        graph.individuals.len(),
        graph.families.len(),
        graph.sources.len(),
        graph.notes.len()
    );
    let mut run = Materializer {
        store,
        options,
        aliases,
        progress,
        claimed: BTreeSet::new(),
        written: Vec::new(),
        persons: BTreeMap::new(),
        sources: BTreeMap::new(),
        places: BTreeMap::new(),
        result: ImportResult::default(),
    };
    run.write_places(graph);
    run.write_sources(graph);
    run.write_notes(graph);
    run.write_people(graph);
    run.write_events(graph);
    run.resolve_references();
    run.report(ImportPhase::Complete, 0, 0);

    let mut result = run.result;
    result.success = result.errors.is_empty();
    let counts = result.counts;
    info!(
        "event=import_materialize module=import status={} individuals={} places={} events={} sources={} notes={} overwritten={} resolved={} unresolved={} failures={}",
        if result.success { "ok" } else { "error" },
        counts.individuals,
        counts.places,
        counts.events,
        counts.sources,
        counts.notes,
        counts.overwritten,
        counts.references_resolved,
        counts.references_unresolved,
        result.errors.len()
    );
    result
}

#[derive(Debug, Clone)]
struct Target {
    record_id: String,
    basename: String,
}

struct Written {
    path: String,
    kind: NoteKind,
    label: String,
}

#[derive(Debug, Clone, Copy)]
enum TargetKind {
    Person,
    Source,
}

struct Materializer<'a, 'p> {
    store: &'a mut dyn NoteStore,
    options: &'a ImportOptions,
    aliases: &'a dyn AliasResolver,
    progress: Option<ProgressFn<'p>>,
    /// Paths taken during this run.
    claimed: BTreeSet<String>,
    written: Vec<Written>,
    /// Graph id -> written person.
    persons: BTreeMap<RecordId, Target>,
    sources: BTreeMap<RecordId, Target>,
    /// Normalized full name -> written place.
    places: BTreeMap<String, Target>,
    result: ImportResult,
}

impl Materializer<'_, '_> {
    fn report(&mut self, phase: ImportPhase, current: usize, total: usize) {
        if let Some(callback) = self.progress.as_deref_mut() {
            callback(&ImportProgress {
                phase,
                current,
                total,
            });
        }
    }

    fn put(&self, document: &mut NoteDocument, key: &str, value: impl Into<Value>) {
        document.set(self.aliases.property_name(key), value);
    }

    fn put_opt(&self, document: &mut NoteDocument, key: &str, value: Option<&str>) {
        document.set_opt(self.aliases.property_name(key), value);
    }

    fn put_relation(&self, document: &mut NoteDocument, field: RelationField, ids: &[RecordId]) {
        if ids.is_empty() {
            return;
        }
        let placeholders: Vec<String> = ids.iter().map(|id| format!("@{id}@")).collect();
        let links: Vec<String> = placeholders.iter().map(|id| wikilink(id)).collect();
        if field.multi {
            self.put(document, field.id, placeholders);
            self.put(document, field.link, links);
        } else {
            self.put(document, field.id, placeholders[0].as_str());
            self.put(document, field.link, links[0].as_str());
        }
    }

    fn place_id(&self, place: Option<&str>) -> Option<&str> {
        let place = place?;
        self.places
            .get(&normalize_place(place))
            .map(|target| target.record_id.as_str())
    }

    fn fail(&mut self, kind: NoteKind, label: String, err: &StoreError) {
        warn!(
            "event=import_record module=import status=error kind={} error_kind={}",
            kind.as_str(),
            store_error_kind(err)
        );
        self.result.errors.push(RecordFailure {
            record: label,
            message: err.to_string(),
        });
    }

    /// First free `folder/stem.md`, `folder/stem (2).md`, ...
    ///
    /// Returns the path and whether it replaces a document from an earlier run.
    fn claim_path(&mut self, folder: &str, display: &str) -> Result<(String, bool), StoreError> {
        let stem = file_stem(display, self.options.filename_format);
        let folder = folder.trim_matches('/');
        for n in 1usize.. {
            let file = if n == 1 {
                format!("{stem}.md")
            } else {
                format!("{stem} ({n}).md")
            };
            let candidate = if folder.is_empty() {
                file
            } else {
                format!("{folder}/{file}")
            };
            if self.claimed.contains(&candidate) {
                continue;
            }
            if self.store.exists(&candidate)? {
                if !self.options.overwrite_existing {
                    continue;
                }
                self.claimed.insert(candidate.clone());
                return Ok((candidate, true));
            }
            self.claimed.insert(candidate.clone());
            return Ok((candidate, false));
        }
        Err(StoreError::InvalidData(format!("no free path for {stem}")))
    }

    fn write(
        &mut self,
        folder: &str,
        display: &str,
        label: String,
        mut document: NoteDocument,
    ) -> Option<Target> {
        let kind = document.kind;
        let (path, replaces) = match self.claim_path(folder, display) {
            Ok(claimed) => claimed,
            Err(err) => {
                self.fail(kind, label, &err);
                return None;
            }
        };
        document.path = path.clone();
        let outcome = if replaces {
            self.store.modify(&document)
        } else {
            self.store.create(&document)
        };
        if let Err(err) = outcome {
            self.fail(kind, label, &err);
            return None;
        }
        if replaces {
            self.result.counts.overwritten += 1;
        }
        let target = Target {
            record_id: document.record_id().unwrap_or_default().to_string(),
            basename: document.basename().to_string(),
        };
        self.written.push(Written { path, kind, label });
        Some(target)
    }

    fn write_places(&mut self, graph: &Graph) {
        if !self.options.create_place_notes {
            return;
        }
        let options = self.options;
        let plan = plan_places(graph);
        let total = plan.len();
        for (index, place) in plan.iter().enumerate() {
            self.report(ImportPhase::Places, index + 1, total);
            let mut document = new_document(NoteKind::Place);
            self.put(&mut document, PLACE_NAME, place.name.as_str());
            self.put(&mut document, PLACE_FULL_NAME, place.full_name.as_str());
            self.put(&mut document, PLACE_TYPE, place.place_type.as_str());
            if let Some(parent) = place.parent.as_ref().and_then(|parent| self.places.get(parent)) {
                let (parent_id, parent_link) =
                    (parent.record_id.clone(), wikilink(&parent.basename));
                self.put(&mut document, PLACE_PARENT_ID, parent_id);
                self.put(&mut document, PLACE_PARENT_LINK, parent_link);
            }
            let label = format!("place {}", place.full_name);
            if let Some(target) = self.write(&options.places_folder, &place.name, label, document) {
                self.places.insert(place.full_name.clone(), target);
                self.result.counts.places += 1;
            }
        }
    }

    fn write_sources(&mut self, graph: &Graph) {
        if !self.options.create_source_notes {
            return;
        }
        let options = self.options;
        let ids = graph.source_ids();
        let total = ids.len();
        for (index, id) in ids.iter().enumerate() {
            self.report(ImportPhase::Sources, index + 1, total);
            let Some(source) = graph.sources.get(id) else {
                continue;
            };
            let title = source.display_title();
            let mut document = new_document(NoteKind::Source);
            self.put(&mut document, schema::TITLE, title.as_str());
            self.put_opt(&mut document, schema::AUTHOR, source.author.as_deref());
            self.put_opt(&mut document, schema::PUBLISHER, source.publisher.as_deref());
            self.put_opt(&mut document, schema::REPOSITORY, source.repository.as_deref());
            let external = source.external_id.as_deref().unwrap_or(id);
            self.put(&mut document, schema::EXTERNAL_ID, external);
            document.body = source.notes.join("\n\n");
            let label = format!("{title} ({id})");
            if let Some(target) = self.write(&options.sources_folder, &title, label, document) {
                self.sources.insert(id.clone(), target);
                self.result.counts.sources += 1;
            }
        }
    }

    fn write_notes(&mut self, graph: &Graph) {
        if !self.options.create_note_notes {
            return;
        }
        let options = self.options;
        let total = graph.notes.len();
        for (index, (id, text)) in graph.notes.iter().enumerate() {
            self.report(ImportPhase::Notes, index + 1, total);
            let mut document = new_document(NoteKind::Note);
            self.put(&mut document, schema::EXTERNAL_ID, id.as_str());
            document.body = text.clone();
            let display = format!("Note {id}");
            let label = display.clone();
            if self
                .write(&options.notes_folder, &display, label, document)
                .is_some()
            {
                self.result.counts.notes += 1;
            }
        }
    }

    fn write_people(&mut self, graph: &Graph) {
        let options = self.options;
        let ids = graph.individual_ids();
        let total = ids.len();
        for (index, id) in ids.iter().enumerate() {
            self.report(ImportPhase::People, index + 1, total);
            let Some(person) = graph.individuals.get(id) else {
                continue;
            };
            let display = person.display_name();
            let document = self.person_document(graph, person);
            let label = format!("{display} ({id})");
            if let Some(target) = self.write(&options.people_folder, &display, label, document) {
                self.persons.insert(id.clone(), target);
                self.result.counts.individuals += 1;
            }
        }
    }

    fn person_document(&self, graph: &Graph, person: &Individual) -> NoteDocument {
        let mut document = new_document(NoteKind::Person);
        self.put(&mut document, schema::NAME, person.display_name());
        self.put_opt(&mut document, schema::GIVEN_NAME, person.given_name.as_deref());
        self.put_opt(&mut document, schema::SURNAME, person.surname.as_deref());
        if person.sex != Sex::Unknown {
            self.put(&mut document, schema::SEX, person.sex.as_str());
        }
        self.put_opt(
            &mut document,
            schema::BIRTH_DATE,
            date_text(person.birth_date.as_ref()).as_deref(),
        );
        self.put_opt(&mut document, schema::BIRTH_PLACE, person.birth_place.as_deref());
        self.put_opt(
            &mut document,
            schema::BIRTH_PLACE_ID,
            self.place_id(person.birth_place.as_deref()),
        );
        self.put_opt(
            &mut document,
            schema::DEATH_DATE,
            date_text(person.death_date.as_ref()).as_deref(),
        );
        self.put_opt(&mut document, schema::DEATH_PLACE, person.death_place.as_deref());
        self.put_opt(
            &mut document,
            schema::DEATH_PLACE_ID,
            self.place_id(person.death_place.as_deref()),
        );
        self.put_opt(&mut document, schema::OCCUPATION, person.occupation.as_deref());
        self.put_opt(&mut document, schema::COLLECTION, person.collection.as_deref());
        if let Some(level) = person.research_level {
            self.put(&mut document, schema::RESEARCH_LEVEL, u64::from(level));
        }
        if let Some(living) = person.living {
            self.put(&mut document, schema::LIVING, living);
        }
        let external = person.external_id.as_deref().unwrap_or(&person.id);
        self.put(&mut document, schema::EXTERNAL_ID, external);
        self.put_opt(&mut document, schema::ORIGIN_ID, person.origin_id.as_deref());

        let single = |id: &Option<RecordId>| id.iter().cloned().collect::<Vec<_>>();
        self.put_relation(&mut document, schema::FATHER, &single(&person.father));
        self.put_relation(&mut document, schema::MOTHER, &single(&person.mother));
        self.put_relation(&mut document, schema::SPOUSES, &person.spouses);
        self.put_relation(&mut document, schema::CHILDREN, &children_of(graph, &person.id));
        for (field, pedigree) in [
            (schema::STEP_PARENTS, Pedigree::Step),
            (schema::ADOPTIVE_PARENTS, Pedigree::Adoptive),
            (schema::FOSTER_PARENTS, Pedigree::Foster),
        ] {
            let parents: Vec<RecordId> = person
                .parent_links
                .iter()
                .filter(|link| link.pedigree == pedigree)
                .map(|link| link.parent.clone())
                .collect();
            self.put_relation(&mut document, field, &parents);
        }
        document.body = person.notes.join("\n\n");
        document
    }

    fn write_events(&mut self, graph: &Graph) {
        if !self.options.create_event_notes {
            return;
        }
        let options = self.options;
        let events = collect_events(graph);
        let total = events.len();
        for (index, event) in events.iter().enumerate() {
            self.report(ImportPhase::Events, index + 1, total);
            let names: Vec<String> = event
                .principals
                .iter()
                .map(|id| graph.display_name(id))
                .collect();
            let display = format!("{} of {}", event_title(event), names.join(" and "));
            let document = self.event_document(event);
            let owner = match &event.owner {
                EventOwner::Individual(id) | EventOwner::Family(id) => id.as_str(),
            };
            let label = format!("{display} ({owner})");
            if self
                .write(&options.events_folder, &display, label, document)
                .is_some()
            {
                self.result.counts.events += 1;
            }
        }
    }

    fn event_document(&self, event: &Event) -> NoteDocument {
        let mut document = new_document(NoteKind::Event);
        self.put(&mut document, schema::EVENT_TYPE, event.kind.as_str());
        self.put(&mut document, schema::EVENT_TAG, event.tag.as_str());
        self.put_opt(&mut document, schema::DATE, date_text(event.date.as_ref()).as_deref());
        self.put_opt(&mut document, schema::PLACE, event.place.as_deref());
        self.put_opt(&mut document, schema::PLACE_ID, self.place_id(event.place.as_deref()));
        self.put_opt(
            &mut document,
            schema::DESCRIPTION,
            event.description.as_deref().or(event.event_type.as_deref()),
        );
        self.put_relation(&mut document, schema::PERSONS, &event.principals);
        if self.options.create_source_notes {
            let mut cited: Vec<RecordId> = Vec::new();
            for citation in &event.citations {
                if !cited.contains(&citation.source) {
                    cited.push(citation.source.clone());
                }
            }
            self.put_relation(&mut document, schema::SOURCES, &cited);
        }
        document
    }

    fn resolve_references(&mut self) {
        let written = std::mem::take(&mut self.written);
        let total = written.len();
        for (index, entry) in written.iter().enumerate() {
            self.report(ImportPhase::Relationships, index + 1, total);
            let fields: Vec<(RelationField, TargetKind)> = match entry.kind {
                NoteKind::Person => schema::PERSON_RELATIONS
                    .iter()
                    .map(|field| (*field, TargetKind::Person))
                    .collect(),
                NoteKind::Event => vec![
                    (schema::PERSONS, TargetKind::Person),
                    (schema::SOURCES, TargetKind::Source),
                ],
                NoteKind::Place | NoteKind::Source | NoteKind::Note => continue,
            };
            let mut document = match self.store.read(&entry.path) {
                Ok(Some(document)) => document,
                Ok(None) => {
                    let err = StoreError::NotFound(entry.path.clone());
                    self.fail(entry.kind, entry.label.clone(), &err);
                    continue;
                }
                Err(err) => {
                    self.fail(entry.kind, entry.label.clone(), &err);
                    continue;
                }
            };
            let mut changed = false;
            for (field, target) in fields {
                changed |= self.rewrite_field(&mut document, field, target, &entry.label);
            }
            if changed {
                if let Err(err) = self.store.modify(&document) {
                    self.fail(entry.kind, entry.label.clone(), &err);
                }
            }
        }
        self.written = written;
    }

    /// Replaces placeholders in one relation field. Returns whether the
    /// document changed.
    fn rewrite_field(
        &mut self,
        document: &mut NoteDocument,
        field: RelationField,
        target: TargetKind,
        label: &str,
    ) -> bool {
        let id_key = self.aliases.property_name(field.id).to_string();
        let link_key = self.aliases.property_name(field.link).to_string();
        let values: Vec<String> = document
            .texts(&id_key)
            .into_iter()
            .map(str::to_string)
            .collect();
        if !values.iter().any(|value| placeholder_target(value).is_some()) {
            return false;
        }

        let mut ids: Vec<String> = Vec::new();
        let mut links: Vec<String> = Vec::new();
        for value in values {
            let Some(external) = placeholder_target(&value) else {
                ids.push(value);
                continue;
            };
            let table = match target {
                TargetKind::Person => &self.persons,
                TargetKind::Source => &self.sources,
            };
            match table.get(external) {
                Some(found) => {
                    ids.push(found.record_id.clone());
                    links.push(wikilink(&found.basename));
                    self.result.counts.references_resolved += 1;
                }
                None => {
                    self.result.counts.references_unresolved += 1;
                    self.result
                        .warnings
                        .push(format!("{label}: unresolved {} reference {external}", field.id));
                }
            }
        }

        document.properties.remove(&id_key);
        document.properties.remove(&link_key);
        if ids.is_empty() {
            return true;
        }
        if field.multi {
            document.set(id_key, ids);
            if !links.is_empty() {
                document.set(link_key, links);
            }
        } else {
            document.set(id_key, ids[0].as_str());
            if let Some(link) = links.first() {
                document.set(link_key, link.as_str());
            }
        }
        true
    }
}

fn new_document(kind: NoteKind) -> NoteDocument {
    let mut document = NoteDocument::new(String::new(), kind);
    document.set(RECORD_ID_PROPERTY, Uuid::new_v4().to_string());
    document
}

fn store_error_kind(err: &StoreError) -> &'static str {
    match err {
        StoreError::Db(_) => "db",
        StoreError::Json(_) => "json",
        StoreError::AlreadyExists(_) => "already_exists",
        StoreError::NotFound(_) => "not_found",
        StoreError::InvalidData(_) => "invalid_data",
    }
}

/// `@I1@` -> `I1`.
fn placeholder_target(value: &str) -> Option<&str> {
    value
        .strip_prefix('@')
        .and_then(|rest| rest.strip_suffix('@'))
        .filter(|inner| !inner.is_empty())
}

fn date_text(date: Option<&GenDate>) -> Option<String> {
    let date = date?;
    let text = date.to_gedcom();
    if text.is_empty() {
        Some(date.raw.trim().to_string()).filter(|raw| !raw.is_empty())
    } else {
        Some(text)
    }
}

pub(crate) fn file_stem(display: &str, format: FilenameFormat) -> String {
    let cleaned: String = display
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let stem = match format {
        FilenameFormat::Original => words.join(" "),
        FilenameFormat::Kebab => words.join("-").to_lowercase(),
        FilenameFormat::Snake => words.join("_").to_lowercase(),
    };
    let stem = stem.trim_start_matches('.');
    if stem.is_empty() {
        "Unnamed".to_string()
    } else {
        stem.to_string()
    }
}

fn children_of(graph: &Graph, parent: &str) -> Vec<RecordId> {
    let mut children: Vec<RecordId> = Vec::new();
    for family in graph.families.values() {
        if !family.partners().any(|partner| partner == parent) {
            continue;
        }
        for child in &family.children {
            if !children.contains(child) {
                children.push(child.clone());
            }
        }
    }
    children
}

/// Person events, then family events. Families with marriage details but no
/// marriage event get one so the details survive a store round trip.
fn collect_events(graph: &Graph) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::new();
    for id in graph.individual_ids() {
        let Some(person) = graph.individuals.get(&id) else {
            continue;
        };
        for event in &person.events {
            let mut event = event.clone();
            if event.principals.is_empty() {
                event.principals.push(id.clone());
            }
            events.push(event);
        }
    }
    for id in graph.family_ids() {
        let Some(family) = graph.families.get(&id) else {
            continue;
        };
        let partners: Vec<RecordId> = family.partners().cloned().collect();
        for event in &family.events {
            let mut event = event.clone();
            if event.principals.is_empty() {
                event.principals = partners.clone();
            }
            events.push(event);
        }
        let has_marriage = family
            .events
            .iter()
            .any(|event| event.kind == EventKind::Marriage);
        if !has_marriage && (family.marriage_date.is_some() || family.marriage_place.is_some()) {
            let mut event = Event::new("MARR", EventKind::Marriage, EventOwner::Family(id.clone()));
            event.principals = partners;
            event.date = family.marriage_date.clone();
            event.place = family.marriage_place.clone();
            events.push(event);
        }
    }
    events
}

fn event_title(event: &Event) -> String {
    if event.kind == EventKind::Other {
        if let Some(descriptor) = event.event_type.as_deref().filter(|d| !d.trim().is_empty()) {
            return descriptor.trim().to_string();
        }
        return event.tag.trim_start_matches('_').to_string();
    }
    let words = event.kind.as_str().replace('_', " ");
    let mut chars = words.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => words,
    }
}

#[cfg(test)]
mod tests {
    use super::{file_stem, import_graph, placeholder_target};
    use crate::db::open_db_in_memory;
    use crate::import::{FilenameFormat, ImportOptions, ImportPhase};
    use crate::model::graph::{Family, Graph, Individual, Sex};
    use crate::model::GenDate;
    use crate::repo::{NoAliases, NoteKind, NoteStore, SqliteNoteStore};

    fn family_graph() -> Graph {
        let mut graph = Graph::new();
        let mut john = Individual::new("I1");
        john.name = Some("John Smith".to_string());
        john.sex = Sex::Male;
        john.spouses = vec!["I2".to_string()];
        john.birth_place = Some("Boston, Massachusetts".to_string());
        graph.insert_individual(john);
        let mut mary = Individual::new("I2");
        mary.name = Some("Mary Jones".to_string());
        mary.sex = Sex::Female;
        mary.spouses = vec!["I1".to_string()];
        graph.insert_individual(mary);
        let mut ann = Individual::new("I3");
        ann.name = Some("John Smith".to_string());
        ann.father = Some("I1".to_string());
        ann.mother = Some("I2".to_string());
        graph.insert_individual(ann);
        let mut family = Family::new("F1");
        family.husband = Some("I1".to_string());
        family.wife = Some("I2".to_string());
        family.children = vec!["I3".to_string()];
        family.marriage_date = Some(GenDate::parse("1950"));
        graph.insert_family(family);
        graph
    }

    #[test]
    fn stems_drop_forbidden_characters() {
        assert_eq!(file_stem("John \"Jack\" Smith?", FilenameFormat::Original), "John Jack Smith");
        assert_eq!(file_stem("Mary Ann  Jones", FilenameFormat::Kebab), "mary-ann-jones");
        assert_eq!(file_stem("Mary Ann Jones", FilenameFormat::Snake), "mary_ann_jones");
        assert_eq!(file_stem("[[?]]", FilenameFormat::Original), "Unnamed");
        assert_eq!(placeholder_target("@I12@"), Some("I12"));
        assert_eq!(placeholder_target("I12"), None);
    }

    #[test]
    fn duplicate_names_are_resolved_by_path_not_name() {
        let conn = open_db_in_memory().unwrap();
        let mut store = SqliteNoteStore::new(&conn);
        let mut phases = Vec::new();
        let mut on_progress = |progress: &crate::import::ImportProgress| phases.push(progress.phase);
        let result = import_graph(
            &family_graph(),
            &mut store,
            &ImportOptions::default(),
            &NoAliases,
            Some(&mut on_progress),
        );
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.counts.individuals, 3);
        assert_eq!(result.counts.places, 2);
        assert_eq!(result.counts.events, 1);
        assert_eq!(result.counts.references_unresolved, 0);
        assert_eq!(phases.last(), Some(&ImportPhase::Complete));

        let john = store.read("People/John Smith.md").unwrap().unwrap();
        let child = store.read("People/John Smith (2).md").unwrap().unwrap();
        assert_eq!(child.text("father_id"), john.record_id());
        assert_eq!(child.text("father"), Some("[[John Smith]]"));
        assert_eq!(john.texts("children_id"), vec![child.record_id().unwrap()]);
        assert!(john.text("birth_place_id").is_some());

        for document in store.list_all().unwrap() {
            let text = serde_json::to_string(&document.properties).unwrap();
            assert!(!text.contains("\"@I"), "placeholder left in {}", document.path);
        }
        assert_eq!(store.count(NoteKind::Event).unwrap(), 1);
    }

    #[test]
    fn overwrite_replaces_previous_run_documents() {
        let conn = open_db_in_memory().unwrap();
        let mut store = SqliteNoteStore::new(&conn);
        let graph = family_graph();
        let options = ImportOptions {
            create_place_notes: false,
            create_event_notes: false,
            ..ImportOptions::default()
        };
        import_graph(&graph, &mut store, &options, &NoAliases, None);
        let overwrite = ImportOptions {
            overwrite_existing: true,
            ..options.clone()
        };
        let result = import_graph(&graph, &mut store, &overwrite, &NoAliases, None);
        assert!(result.success);
        assert_eq!(result.counts.overwritten, 3);
        assert_eq!(store.count(NoteKind::Person).unwrap(), 3);

        let again = import_graph(&graph, &mut store, &options, &NoAliases, None);
        assert!(again.success);
        assert_eq!(store.count(NoteKind::Person).unwrap(), 6);
        assert!(store.exists("People/Mary Jones (2).md").unwrap());
    }
}
