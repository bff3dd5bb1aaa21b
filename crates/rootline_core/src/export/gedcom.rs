//! Text-hierarchy (GEDCOM 5.5.1) export engine.

use crate::core_version;
use crate::export::{is_valid_xref, ExportContext, ExportOutput, ExportResult, Prepared};
use crate::model::graph::{
    format_gedcom_name, Citation, Event, EventKind, Graph, Individual, Pedigree, Source,
};
use crate::model::relations::assign_roles;
use crate::model::GenDate;
use crate::repo::PlaceHierarchy;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_MAX_LINE_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GedcomExportOptions {
    /// Written to `HEAD.DATE` when set; left out otherwise so output stays
    /// deterministic.
    pub date: Option<String>,
    pub submitter: Option<String>,
    pub include_notes: bool,
    pub include_sources: bool,
    /// Longest value written before `CONC` splitting.
    pub max_line_chars: usize,
}

impl Default for GedcomExportOptions {
    fn default() -> Self {
        Self {
            date: None,
            submitter: None,
            include_notes: true,
            include_sources: true,
            max_line_chars: DEFAULT_MAX_LINE_CHARS,
        }
    }
}

/// Serializes the graph as a text-hierarchy document.
pub fn export_gedcom(
    graph: &Graph,
    options: &GedcomExportOptions,
    context: &ExportContext<'_>,
) -> ExportResult<ExportOutput> {
    let prepared = Prepared::new(graph, context.privacy, &is_valid_xref);
    let mut writer = Writer::new(options.max_line_chars.max(16));

    write_header(&mut writer, options);

    let mut spouse_of: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut child_of: BTreeMap<&str, Vec<(&str, Pedigree)>> = BTreeMap::new();
    for plan in &prepared.plans {
        let Some(family_xref) = prepared.family_ids.get(&plan.key) else {
            continue;
        };
        for partner in &plan.partners {
            spouse_of
                .entry(partner.as_str())
                .or_default()
                .push(family_xref.as_str());
        }
        for (child, pedigree) in &plan.children {
            child_of
                .entry(child.as_str())
                .or_default()
                .push((family_xref.as_str(), *pedigree));
        }
    }

    let places = context.places;
    for person in &prepared.individuals {
        let Some(xref) = prepared.individual_id(&person.id) else {
            continue;
        };
        write_individual(
            &mut writer,
            &prepared,
            person,
            xref,
            options,
            places,
            spouse_of.get(person.id.as_str()).map(Vec::as_slice).unwrap_or_default(),
            child_of.get(person.id.as_str()).map(Vec::as_slice).unwrap_or_default(),
        );
    }

    for plan in &prepared.plans {
        let Some(xref) = prepared.family_ids.get(&plan.key) else {
            continue;
        };
        writer.record(xref, "FAM");
        let roles = assign_roles(graph, plan);
        if let Some(husband) = roles.husband.as_deref().and_then(|id| prepared.individual_id(id)) {
            writer.pointer(1, "HUSB", husband);
        }
        if let Some(wife) = roles.wife.as_deref().and_then(|id| prepared.individual_id(id)) {
            writer.pointer(1, "WIFE", wife);
        }
        for (child, _) in &plan.children {
            if let Some(child) = prepared.individual_id(child) {
                writer.pointer(1, "CHIL", child);
            }
        }

        let has_marriage_event = plan.events.iter().any(|event| event.kind == EventKind::Marriage);
        if !has_marriage_event && (plan.marriage_date.is_some() || plan.marriage_place.is_some()) {
            writer.line(1, "MARR", None);
            write_date_place(
                &mut writer,
                plan.marriage_date.as_ref(),
                plan.marriage_place.as_deref(),
                places,
            );
        }
        for event in &plan.events {
            write_event(&mut writer, &prepared, event, places, false, false);
        }
        if options.include_notes {
            if let Some(family) = plan.source_family.as_deref().and_then(|id| graph.family(id)) {
                for note in &family.notes {
                    writer.text(1, "NOTE", note);
                }
            }
        }
    }

    if options.include_sources {
        for id in graph.source_ids() {
            let (Some(source), Some(xref)) = (graph.sources.get(&id), prepared.source_ids.get(&id))
            else {
                continue;
            };
            write_source(&mut writer, source, xref, options);
        }
    }

    if let Some(submitter) = options.submitter.as_deref() {
        writer.record("SUBM1", "SUBM");
        writer.line(1, "NAME", Some(submitter));
    }
    writer.line(0, "TRLR", None);

    info!(
        "event=export module=export status=ok format=gedcom individuals={} families={} sources={} redacted={} hidden={}",
        prepared.stats.individuals,
        prepared.stats.families,
        prepared.stats.sources,
        prepared.stats.redacted,
        prepared.stats.hidden
    );
    Ok(ExportOutput {
        text: writer.finish(),
        stats: prepared.stats,
    })
}

fn write_header(writer: &mut Writer, options: &GedcomExportOptions) {
    writer.line(0, "HEAD", None);
    writer.line(1, "SOUR", Some("ROOTLINE"));
    writer.line(2, "NAME", Some("Rootline"));
    writer.line(2, "VERS", Some(core_version()));
    if let Some(date) = options.date.as_deref() {
        writer.line(1, "DATE", Some(date));
    }
    writer.line(1, "GEDC", None);
    writer.line(2, "VERS", Some("5.5.1"));
    writer.line(2, "FORM", Some("LINEAGE-LINKED"));
    writer.line(1, "CHAR", Some("UTF-8"));
    if options.submitter.is_some() {
        writer.pointer(1, "SUBM", "SUBM1");
    }
}

#[allow(clippy::too_many_arguments)]
fn write_individual(
    writer: &mut Writer,
    prepared: &Prepared<'_>,
    person: &Individual,
    xref: &str,
    options: &GedcomExportOptions,
    places: Option<&dyn PlaceHierarchy>,
    spouse_families: &[&str],
    child_families: &[(&str, Pedigree)],
) {
    let obfuscation = prepared.obfuscation(&person.id);
    writer.record(xref, "INDI");

    match obfuscation {
        Some(obfuscation) => writer.line(1, "NAME", Some(&obfuscation.display_name)),
        None => {
            let mut name = format_gedcom_name(person.given_name.as_deref(), person.surname.as_deref());
            if name.is_empty() {
                name = person.name.clone().unwrap_or_default();
            }
            if !name.is_empty() {
                writer.line(1, "NAME", Some(&name));
                if let Some(given) = person.given_name.as_deref() {
                    writer.line(2, "GIVN", Some(given));
                }
                if let Some(surname) = person.surname.as_deref() {
                    writer.line(2, "SURN", Some(surname));
                }
            }
        }
    }
    writer.line(1, "SEX", Some(person.sex.gedcom_code()));

    let hide_birth_date = obfuscation.is_some_and(|o| o.hide_birth_date);
    let hide_birth_place = obfuscation.is_some_and(|o| o.hide_birth_place);
    let birth_event = person.event(EventKind::Birth);
    let birth_date = person.birth_date.as_ref().filter(|_| !hide_birth_date);
    let birth_place = person.birth_place.as_deref().filter(|_| !hide_birth_place);
    if birth_date.is_some() || birth_place.is_some() || birth_event.is_some() {
        writer.line(1, "BIRT", None);
        write_date_place(writer, birth_date, birth_place, places);
        if let Some(event) = birth_event {
            write_citations(writer, prepared, &event.citations, 2);
        }
    }

    let death_event = person.event(EventKind::Death);
    if person.death_date.is_some() || person.death_place.is_some() || death_event.is_some() {
        writer.line(1, "DEAT", None);
        write_date_place(writer, person.death_date.as_ref(), person.death_place.as_deref(), places);
        if let Some(event) = death_event {
            write_citations(writer, prepared, &event.citations, 2);
        }
    }

    if let Some(occupation) = person.occupation.as_deref() {
        if !obfuscation.is_some_and(|o| o.hide_occupation) {
            writer.line(1, "OCCU", Some(occupation));
        }
    }

    let mut seen_birth = false;
    let mut seen_death = false;
    for event in &person.events {
        // First birth/death are covered by the vital blocks above.
        match event.kind {
            EventKind::Birth if !seen_birth => {
                seen_birth = true;
                continue;
            }
            EventKind::Death if !seen_death => {
                seen_death = true;
                continue;
            }
            _ => {}
        }
        write_event(writer, prepared, event, places, hide_birth_date, hide_birth_place);
    }

    if obfuscation.is_none() {
        for (tag, value) in &person.attributes {
            if is_writable_tag(tag) {
                writer.text(1, tag, value);
            }
        }
        if options.include_notes {
            for note in &person.notes {
                writer.text(1, "NOTE", note);
            }
        }
    }

    if let Some(origin) = person.origin_id.as_deref() {
        writer.line(1, "_CRID", Some(origin));
    }
    if let Some(collection) = person.collection.as_deref() {
        writer.line(1, "_COLL", Some(collection));
    }
    if let Some(level) = person.research_level {
        writer.line(1, "_RLVL", Some(&level.to_string()));
    }

    for association in &person.associations {
        if let Some(target) = prepared.individual_id(&association.target) {
            writer.pointer(1, "ASSO", target);
            if let Some(relation) = association.relation.as_deref() {
                writer.line(2, "RELA", Some(relation));
            }
        }
    }
    for family in spouse_families {
        writer.pointer(1, "FAMS", family);
    }
    for (family, pedigree) in child_families {
        writer.pointer(1, "FAMC", family);
        if *pedigree != Pedigree::Birth {
            writer.line(2, "PEDI", Some(pedigree.gedcom_code()));
        }
    }
}

fn write_event(
    writer: &mut Writer,
    prepared: &Prepared<'_>,
    event: &Event,
    places: Option<&dyn PlaceHierarchy>,
    hide_date: bool,
    hide_place: bool,
) {
    let tag = if is_writable_tag(&event.tag) {
        event.tag.as_str()
    } else {
        event.kind.default_tag()
    };
    writer.line(1, tag, event.description.as_deref());
    if let Some(event_type) = event.event_type.as_deref() {
        writer.line(2, "TYPE", Some(event_type));
    }
    // Birth redaction also covers extra birth events.
    let hide = event.kind == EventKind::Birth;
    write_date_place(
        writer,
        event.date.as_ref().filter(|_| !(hide && hide_date)),
        event.place.as_deref().filter(|_| !(hide && hide_place)),
        places,
    );
    write_citations(writer, prepared, &event.citations, 2);
}

fn write_date_place(
    writer: &mut Writer,
    date: Option<&GenDate>,
    place: Option<&str>,
    places: Option<&dyn PlaceHierarchy>,
) {
    if let Some(date) = date.map(GenDate::to_gedcom).filter(|text| !text.is_empty()) {
        writer.line(2, "DATE", Some(&date));
    }
    let Some(place) = place.filter(|place| !place.trim().is_empty()) else {
        return;
    };
    match places.and_then(|hierarchy| resolve_place(hierarchy, place)) {
        Some(resolved) => {
            writer.line(2, "PLAC", Some(&resolved.qualified));
            if let (Some(latitude), Some(longitude)) = (resolved.latitude, resolved.longitude) {
                writer.line(3, "MAP", None);
                writer.line(4, "LATI", Some(&format_coordinate(latitude, 'N', 'S')));
                writer.line(4, "LONG", Some(&format_coordinate(longitude, 'E', 'W')));
            }
        }
        None => writer.line(2, "PLAC", Some(place)),
    }
}

struct ResolvedPlace {
    qualified: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn resolve_place(hierarchy: &dyn PlaceHierarchy, place: &str) -> Option<ResolvedPlace> {
    let node = hierarchy.resolve(place)?;
    let mut names = vec![node.name.clone()];
    names.extend(hierarchy.ancestors(&node.id).into_iter().map(|ancestor| ancestor.name));
    Some(ResolvedPlace {
        qualified: names.join(", "),
        latitude: node.latitude,
        longitude: node.longitude,
    })
}

fn format_coordinate(value: f64, positive: char, negative: char) -> String {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let text = format!("{:.6}", value.abs());
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{hemisphere}{text}")
}

fn write_citations(writer: &mut Writer, prepared: &Prepared<'_>, citations: &[Citation], depth: usize) {
    for citation in citations {
        let Some(source) = prepared.source_ids.get(&citation.source) else {
            continue;
        };
        writer.pointer(depth, "SOUR", source);
        if let Some(page) = citation.page.as_deref() {
            writer.line(depth + 1, "PAGE", Some(page));
        }
        if let Some(quality) = citation.quality {
            writer.line(depth + 1, "QUAY", Some(&quality.to_string()));
        }
    }
}

fn write_source(writer: &mut Writer, source: &Source, xref: &str, options: &GedcomExportOptions) {
    writer.record(xref, "SOUR");
    if let Some(title) = source.title.as_deref() {
        writer.text(1, "TITL", title);
    }
    if let Some(author) = source.author.as_deref() {
        writer.text(1, "AUTH", author);
    }
    if let Some(publisher) = source.publisher.as_deref() {
        writer.text(1, "PUBL", publisher);
    }
    if let Some(repository) = source.repository.as_deref() {
        writer.line(1, "REPO", Some(repository));
    }
    if options.include_notes {
        for note in &source.notes {
            writer.text(1, "NOTE", note);
        }
    }
}

fn is_writable_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag.len() <= 31
        && tag
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Line writer that handles `CONT`/`CONC` splitting.
struct Writer {
    out: String,
    max_line_chars: usize,
}

impl Writer {
    fn new(max_line_chars: usize) -> Self {
        Self {
            out: String::new(),
            max_line_chars,
        }
    }

    fn line(&mut self, depth: usize, tag: &str, value: Option<&str>) {
        self.out.push_str(&depth.to_string());
        self.out.push(' ');
        self.out.push_str(tag);
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            self.out.push(' ');
            self.out.push_str(value);
        }
        self.out.push('\n');
    }

    fn record(&mut self, xref: &str, tag: &str) {
        self.out.push_str("0 @");
        self.out.push_str(xref);
        self.out.push_str("@ ");
        self.out.push_str(tag);
        self.out.push('\n');
    }

    fn pointer(&mut self, depth: usize, tag: &str, xref: &str) {
        self.line(depth, tag, Some(&format!("@{xref}@")));
    }

    /// Writes multi-line text: `CONT` per newline, `CONC` for long lines.
    fn text(&mut self, depth: usize, tag: &str, text: &str) {
        for (index, segment) in text.split('\n').enumerate() {
            let chunks = split_chunks(segment.trim_end_matches('\r'), self.max_line_chars);
            for (chunk_index, chunk) in chunks.iter().enumerate() {
                match (index, chunk_index) {
                    (0, 0) => self.line(depth, tag, Some(chunk)),
                    (_, 0) => self.line(depth + 1, "CONT", Some(chunk)),
                    _ => self.line(depth + 1, "CONC", Some(chunk)),
                }
            }
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

/// Splits text into chunks of at most `max` chars, never leaving a chunk
/// boundary next to a space (readers may trim values).
fn split_chunks(text: &str, max: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let mut end = (start + max).min(chars.len());
        while end < chars.len()
            && end > start + 1
            && (chars[end - 1] == ' ' || chars[end] == ' ')
        {
            end -= 1;
        }
        chunks.push(chars[start..end].iter().collect());
        start = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::{export_gedcom, split_chunks, GedcomExportOptions};
    use crate::export::privacy::{LivingPrivacyPolicy, PrivacyPolicy};
    use crate::export::ExportContext;
    use crate::model::graph::{Graph, Individual, Pedigree, Sex};
    use crate::model::GenDate;

    fn graph() -> Graph {
        let mut graph = Graph::new();
        let mut father = Individual::new("p1");
        father.given_name = Some("John".to_string());
        father.surname = Some("Smith".to_string());
        father.sex = Sex::Male;
        father.birth_date = Some(GenDate::parse("ABT 1900"));
        father.spouses.push("p2".to_string());
        father.origin_id = Some("abc".to_string());
        graph.insert_individual(father);
        let mut mother = Individual::new("p2");
        mother.name = Some("Mary Jones".to_string());
        mother.sex = Sex::Female;
        graph.insert_individual(mother);
        let mut child = Individual::new("p3");
        child.name = Some("Tom".to_string());
        child.father = Some("p1".to_string());
        child.mother = Some("p2".to_string());
        child.birth_date = Some(GenDate::parse("1990"));
        child.birth_place = Some("Boston".to_string());
        child.death_date = Some(GenDate::parse("2020"));
        graph.insert_individual(child);
        let mut stepchild = Individual::new("p4");
        stepchild.add_parent_link("p1", Pedigree::Step);
        graph.insert_individual(stepchild);
        graph
    }

    #[test]
    fn writes_individuals_families_and_lineage_tags() {
        let output =
            export_gedcom(&graph(), &GedcomExportOptions::default(), &ExportContext::default())
                .unwrap();
        let text = output.text;
        assert!(text.starts_with("0 HEAD\n1 SOUR ROOTLINE\n"));
        assert!(text.contains("0 @I1@ INDI\n1 NAME John /Smith/\n2 GIVN John\n2 SURN Smith\n1 SEX M\n1 BIRT\n2 DATE ABT 1900\n"));
        assert!(text.contains("1 _CRID abc\n"));
        assert!(text.contains("0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n"));
        assert!(text.contains("1 FAMC @F2@\n2 PEDI step\n"));
        assert!(text.ends_with("0 TRLR\n"));
        assert_eq!(output.stats.families, 2);
    }

    #[test]
    fn privacy_hides_birth_but_keeps_death() {
        let policy = LivingPrivacyPolicy {
            reference_year: 2024,
            ..LivingPrivacyPolicy::default()
        };
        let mut graph = graph();
        if let Some(child) = graph.individuals.get_mut("p3") {
            child.living = Some(true);
        }
        let context = ExportContext {
            privacy: Some(&policy as &dyn PrivacyPolicy),
            places: None,
        };
        let output = export_gedcom(&graph, &GedcomExportOptions::default(), &context).unwrap();
        let block: String = output
            .text
            .split("0 @I3@ INDI\n")
            .nth(1)
            .and_then(|rest| rest.split("\n0 ").next())
            .unwrap()
            .to_string();
        assert!(block.starts_with("1 NAME Living\n"));
        assert!(!block.contains("1990"));
        assert!(!block.contains("Boston"));
        assert!(block.contains("1 DEAT\n2 DATE 2020"));
        assert_eq!(output.stats.redacted, 1);
    }

    #[test]
    fn long_text_is_split_without_losing_characters() {
        let text = "word ".repeat(30);
        let chunks = split_chunks(text.trim_end(), 40);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 40));
        assert_eq!(chunks.concat(), text.trim_end());
        assert!(chunks.iter().all(|chunk| !chunk.starts_with(' ') && !chunk.ends_with(' ')));
    }
}
