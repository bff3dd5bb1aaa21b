//! Depth-driven record assembler.
//!
//! # Responsibility
//! - Consume leveled lines and build typed records into a `Graph`.
//! - Track the open record, event, citation and link sub-structures.
//!
//! # Invariants
//! - A depth-0 line always flushes the record (and open event) in progress.
//! - Tag meaning is depth-relative; the context stack holds the tag seen at
//!   every shallower depth of the current line.
//! - Unknown tags are ignored at every depth.

use crate::gedcom::error::{Diagnostics, ParseError, ParseResult, WarningCode};
use crate::gedcom::lexer::{parse_pointer, LeveledLine};
use crate::model::graph::{
    push_unique, split_gedcom_name, Association, Citation, Event, EventKind, EventOwner, Family,
    FamilyLink, Graph, Individual, Pedigree, RecordId, Sex, Source,
};
use crate::model::GenDate;
use log::debug;

/// Level-0 tags that are recognized but not modelled.
const IGNORED_RECORDS: &[&str] = &["SUBM", "SUBN", "REPO", "OBJE", "SNOTE", "_PLAC", "_EVDEF"];

/// Individual attribute tags kept as string key/value pairs.
const ATTRIBUTE_TAGS: &[&str] = &[
    "TITL", "RELI", "EDUC", "NATI", "CAST", "DSCR", "IDNO", "NCHI", "NMR", "PROP", "SSN", "FACT",
    "RIN", "REFN", "AFN",
];

#[derive(Debug)]
enum OpenRecord {
    None,
    Header,
    Individual(Box<Individual>),
    Family(Box<Family>),
    Source(Box<Source>),
    Note { id: RecordId, text: String },
    Skipped,
}

/// Value that later `CONC`/`CONT` lines extend.
#[derive(Debug, Clone, PartialEq, Eq)]
enum TextSlot {
    Name,
    Occupation,
    IndividualNote(usize),
    Attribute(String),
    FamilyNote(usize),
    SourceTitle,
    SourceAuthor,
    SourcePublisher,
    SourceNote(usize),
    NoteRecord,
    EventDescription,
    EventPlace,
    EventDate,
    CitationPage,
}

/// Incremental assembler; feed lines in document order, then `finish`.
#[derive(Debug)]
pub struct Assembler {
    graph: Graph,
    diagnostics: Diagnostics,
    record: OpenRecord,
    event: Option<Event>,
    citation: Option<Citation>,
    family_link: Option<usize>,
    association: Option<usize>,
    context: Vec<String>,
    /// Depth of the line that opened the slot.
    slot: Option<(usize, TextSlot)>,
    header_seen: bool,
    trailer_seen: bool,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
            diagnostics: Diagnostics::new(),
            record: OpenRecord::None,
            event: None,
            citation: None,
            family_link: None,
            association: None,
            context: Vec::new(),
            slot: None,
            header_seen: false,
            trailer_seen: false,
        }
    }

    /// Consumes one line.
    pub fn feed(&mut self, line: &LeveledLine) -> ParseResult<()> {
        if line.depth == 0 {
            return self.start_record(line);
        }

        if line.tag == "CONC" || line.tag == "CONT" {
            self.continue_value(line);
            return Ok(());
        }

        self.context.truncate(line.depth);
        self.context.push(line.tag.clone());
        self.slot = None;

        if line.depth <= 2 {
            self.close_citation();
        }
        if line.depth == 1 {
            self.close_event();
            self.family_link = None;
            self.association = None;
        }

        match self.record {
            OpenRecord::Header => self.header_line(line),
            OpenRecord::Individual(_) => self.individual_line(line),
            OpenRecord::Family(_) => self.family_line(line),
            OpenRecord::Source(_) => self.source_line(line),
            OpenRecord::Note { .. } => {}
            OpenRecord::None | OpenRecord::Skipped => {}
        }
        Ok(())
    }

    /// Flushes the last record and returns the assembled graph.
    pub fn finish(mut self) -> (Graph, Diagnostics) {
        self.flush_record();
        if self.header_seen && !self.trailer_seen {
            self.diagnostics
                .warn(WarningCode::MissingTrailer, None, "document has no `0 TRLR` line");
        }
        (self.graph, self.diagnostics)
    }

    fn start_record(&mut self, line: &LeveledLine) -> ParseResult<()> {
        self.flush_record();
        self.context.clear();
        self.context.push(line.tag.clone());

        if !self.header_seen {
            if line.tag != "HEAD" {
                return Err(ParseError::MissingHeader {
                    line: line.line_number,
                });
            }
            self.header_seen = true;
            self.record = OpenRecord::Header;
            return Ok(());
        }

        if self.trailer_seen {
            self.diagnostics.warn_once(
                WarningCode::ContentAfterTrailer,
                Some(line.line_number),
                "content after `0 TRLR` is ignored",
            );
            self.record = OpenRecord::Skipped;
            return Ok(());
        }

        self.record = match line.tag.as_str() {
            "TRLR" => {
                self.trailer_seen = true;
                OpenRecord::Skipped
            }
            "INDI" => {
                let id = self.require_xref(line)?;
                if self.graph.individuals.contains_key(&id) {
                    self.duplicate(line, &id)
                } else {
                    let mut person = Individual::new(id.clone());
                    person.external_id = Some(id);
                    OpenRecord::Individual(Box::new(person))
                }
            }
            "FAM" => {
                let id = self.require_xref(line)?;
                if self.graph.families.contains_key(&id) {
                    self.duplicate(line, &id)
                } else {
                    let mut family = Family::new(id.clone());
                    family.external_id = Some(id);
                    OpenRecord::Family(Box::new(family))
                }
            }
            "SOUR" => {
                let id = self.require_xref(line)?;
                if self.graph.sources.contains_key(&id) {
                    self.duplicate(line, &id)
                } else {
                    let mut source = Source::new(id.clone());
                    source.external_id = Some(id);
                    OpenRecord::Source(Box::new(source))
                }
            }
            "NOTE" => match line.xref.clone() {
                Some(id) => {
                    self.slot = Some((0, TextSlot::NoteRecord));
                    OpenRecord::Note {
                        id,
                        text: line.value.clone(),
                    }
                }
                None => OpenRecord::Skipped,
            },
            "HEAD" => {
                self.diagnostics.warn(
                    WarningCode::DuplicateRecord,
                    Some(line.line_number),
                    "repeated `0 HEAD` record ignored",
                );
                OpenRecord::Skipped
            }
            tag if IGNORED_RECORDS.contains(&tag) => OpenRecord::Skipped,
            tag => {
                self.diagnostics.warn_once(
                    WarningCode::UnknownRecord,
                    Some(line.line_number),
                    format!("unknown record type `{tag}` ignored"),
                );
                OpenRecord::Skipped
            }
        };
        Ok(())
    }

    fn require_xref(&self, line: &LeveledLine) -> ParseResult<RecordId> {
        line.xref.clone().ok_or_else(|| ParseError::InvalidValue {
            line: line.line_number,
            tag: line.tag.clone(),
            message: "record requires a cross-reference id".to_string(),
        })
    }

    fn duplicate(&mut self, line: &LeveledLine, id: &str) -> OpenRecord {
        self.diagnostics.warn(
            WarningCode::DuplicateRecord,
            Some(line.line_number),
            format!("duplicate record `@{id}@` ignored"),
        );
        OpenRecord::Skipped
    }

    fn parent_tag(&self, depth: usize) -> Option<&str> {
        depth
            .checked_sub(1)
            .and_then(|index| self.context.get(index))
            .map(String::as_str)
    }

    fn header_line(&mut self, line: &LeveledLine) {
        let value = non_empty(&line.value);
        let parent = self.parent_tag(line.depth).map(str::to_string);
        let header = &mut self.graph.header;
        match (line.depth, parent.as_deref(), line.tag.as_str()) {
            (1, _, "SOUR") => header.source_system = value,
            (1, _, "CHAR") => header.charset = value,
            (1, _, "SUBM") => {
                header.submitter = parse_pointer(&line.value).or(value);
            }
            (1, _, "LANG") => header.language = value,
            (1, _, "FILE") => header.file_name = value,
            (1, _, "DATE") => header.date = value,
            (2, Some("SOUR"), "NAME") => header.source_name = value,
            (2, Some("SOUR"), "VERS") => header.source_version = value,
            (2, Some("GEDC"), "VERS") => {
                if let Some(version) = value.as_deref() {
                    if !version.starts_with("5.") {
                        self.diagnostics.warn(
                            WarningCode::UnsupportedVersion,
                            Some(line.line_number),
                            format!("version `{version}` is not 5.x; parsing best-effort"),
                        );
                    }
                }
                header.gedcom_version = value;
            }
            _ => {}
        }
    }

    fn individual_line(&mut self, line: &LeveledLine) {
        let parent = self.parent_tag(line.depth).map(str::to_string);
        let OpenRecord::Individual(person) = &mut self.record else {
            return;
        };
        let tag = line.tag.as_str();

        match line.depth {
            1 => match tag {
                "NAME" => {
                    if person.name.is_none() {
                        let (display, given, surname) = split_gedcom_name(&line.value);
                        person.name = non_empty(&display);
                        person.given_name = given;
                        person.surname = surname;
                        self.slot = Some((1, TextSlot::Name));
                    }
                }
                "SEX" => person.sex = Sex::from_code(&line.value),
                "OCCU" => {
                    if person.occupation.is_none() {
                        person.occupation = non_empty(&line.value);
                        self.slot = Some((1, TextSlot::Occupation));
                    }
                }
                "FAMC" => {
                    if let Some(family) = line.pointer() {
                        let index = match person
                            .families_as_child
                            .iter()
                            .position(|link| link.family == family)
                        {
                            Some(index) => index,
                            None => {
                                person.families_as_child.push(FamilyLink {
                                    family,
                                    pedigree: None,
                                });
                                person.families_as_child.len() - 1
                            }
                        };
                        self.family_link = Some(index);
                    }
                }
                "FAMS" => {
                    if let Some(family) = line.pointer() {
                        person.add_family_as_spouse(&family);
                    }
                }
                "NOTE" => match line.pointer() {
                    Some(note) => {
                        push_unique(&mut person.note_refs, &note);
                    }
                    None => {
                        person.notes.push(line.value.clone());
                        self.slot = Some((1, TextSlot::IndividualNote(person.notes.len() - 1)));
                    }
                },
                "ASSO" => {
                    if let Some(target) = line.pointer() {
                        person.associations.push(Association {
                            target,
                            relation: None,
                        });
                        self.association = Some(person.associations.len() - 1);
                    }
                }
                "_CRID" => person.origin_id = non_empty(&line.value),
                "_COLL" => person.collection = non_empty(&line.value),
                "_RLVL" => person.research_level = line.value.trim().parse().ok(),
                "_LIVING" => person.living = Some(line.value.trim().eq_ignore_ascii_case("Y")),
                _ => {
                    if let Some(kind) = EventKind::from_individual_tag(tag) {
                        let mut event =
                            Event::new(tag, kind, EventOwner::Individual(person.id.clone()));
                        event.principals.push(person.id.clone());
                        event.description = event_description(&line.value);
                        self.event = Some(event);
                    } else if ATTRIBUTE_TAGS.contains(&tag) || tag.starts_with('_') {
                        if let Some(value) = non_empty(&line.value) {
                            person.attributes.insert(tag.to_string(), value);
                            self.slot = Some((1, TextSlot::Attribute(tag.to_string())));
                        }
                    }
                }
            },
            2 => match (parent.as_deref(), tag) {
                (Some("NAME"), "GIVN") => {
                    if person.given_name.is_none() {
                        person.given_name = non_empty(&line.value);
                    }
                }
                (Some("NAME"), "SURN") => {
                    if person.surname.is_none() {
                        person.surname = non_empty(&line.value);
                    }
                }
                (Some("NAME"), "NICK" | "NPFX" | "NSFX") => {
                    if let Some(value) = non_empty(&line.value) {
                        person.attributes.entry(tag.to_string()).or_insert(value);
                    }
                }
                (Some("FAMC"), "PEDI") => {
                    if let Some(index) = self.family_link {
                        person.families_as_child[index].pedigree = Pedigree::from_code(&line.value);
                    }
                }
                (Some("ASSO"), "RELA") => {
                    if let Some(index) = self.association {
                        person.associations[index].relation = non_empty(&line.value);
                    }
                }
                _ => self.event_field(line),
            },
            3 => self.citation_field(line),
            _ => {}
        }
    }

    fn family_line(&mut self, line: &LeveledLine) {
        let OpenRecord::Family(family) = &mut self.record else {
            return;
        };
        let tag = line.tag.as_str();
        match line.depth {
            1 => match tag {
                "HUSB" => family.husband = line.pointer(),
                "WIFE" => family.wife = line.pointer(),
                "CHIL" => {
                    if let Some(child) = line.pointer() {
                        family.add_child(&child);
                    }
                }
                "NOTE" => {
                    if line.pointer().is_none() {
                        family.notes.push(line.value.clone());
                        self.slot = Some((1, TextSlot::FamilyNote(family.notes.len() - 1)));
                    }
                }
                _ => {
                    if let Some(kind) = EventKind::from_family_tag(tag) {
                        let mut event = Event::new(tag, kind, EventOwner::Family(family.id.clone()));
                        event.description = event_description(&line.value);
                        self.event = Some(event);
                    }
                }
            },
            2 => self.event_field(line),
            3 => self.citation_field(line),
            _ => {}
        }
    }

    fn source_line(&mut self, line: &LeveledLine) {
        let OpenRecord::Source(source) = &mut self.record else {
            return;
        };
        if line.depth != 1 {
            return;
        }
        let value = non_empty(&line.value);
        match line.tag.as_str() {
            "TITL" => {
                source.title = value;
                self.slot = Some((1, TextSlot::SourceTitle));
            }
            "ABBR" => {
                if source.title.is_none() {
                    source.title = value;
                    self.slot = Some((1, TextSlot::SourceTitle));
                }
            }
            "AUTH" => {
                source.author = value;
                self.slot = Some((1, TextSlot::SourceAuthor));
            }
            "PUBL" => {
                source.publisher = value;
                self.slot = Some((1, TextSlot::SourcePublisher));
            }
            "REPO" => source.repository = line.pointer().or(value),
            "NOTE" => {
                if line.pointer().is_none() {
                    source.notes.push(line.value.clone());
                    self.slot = Some((1, TextSlot::SourceNote(source.notes.len() - 1)));
                }
            }
            _ => {}
        }
    }

    fn event_field(&mut self, line: &LeveledLine) {
        let Some(event) = self.event.as_mut() else {
            return;
        };
        match line.tag.as_str() {
            "DATE" => {
                let date = GenDate::parse(&line.value);
                event.date = (!date.is_empty()).then_some(date);
                self.slot = Some((2, TextSlot::EventDate));
            }
            "PLAC" => {
                event.place = non_empty(&line.value);
                self.slot = Some((2, TextSlot::EventPlace));
            }
            "TYPE" => event.event_type = non_empty(&line.value),
            "NOTE" | "CAUS" => {
                if event.description.is_none() && line.pointer().is_none() {
                    event.description = non_empty(&line.value);
                    self.slot = Some((2, TextSlot::EventDescription));
                }
            }
            "SOUR" => {
                if let Some(source) = line.pointer() {
                    self.citation = Some(Citation {
                        source,
                        page: None,
                        quality: None,
                    });
                }
            }
            _ => {}
        }
    }

    fn citation_field(&mut self, line: &LeveledLine) {
        let Some(citation) = self.citation.as_mut() else {
            return;
        };
        match line.tag.as_str() {
            "PAGE" => {
                citation.page = non_empty(&line.value);
                self.slot = Some((3, TextSlot::CitationPage));
            }
            "QUAY" => {
                citation.quality = line.value.trim().parse().ok().filter(|code| *code <= 3);
            }
            _ => {}
        }
    }

    fn continue_value(&mut self, line: &LeveledLine) {
        let Some((depth, slot)) = self.slot.clone() else {
            self.orphan(line);
            return;
        };
        if depth + 1 != line.depth {
            self.orphan(line);
            return;
        }
        if slot == TextSlot::EventDate {
            if let Some(event) = self.event.as_mut() {
                // A date stays on one line, so `CONT` joins with a space.
                let separator = if line.tag == "CONT" { " " } else { "" };
                let raw = event.date.as_ref().map(|date| date.raw.as_str()).unwrap_or_default();
                let date = GenDate::parse(&format!("{raw}{separator}{}", line.value));
                event.date = (!date.is_empty()).then_some(date);
            }
            return;
        }
        let separator = if line.tag == "CONT" { "\n" } else { "" };
        let target: Option<&mut String> = match (&mut self.record, slot) {
            (OpenRecord::Note { text, .. }, TextSlot::NoteRecord) => Some(text),
            (OpenRecord::Individual(person), TextSlot::Name) => person.name.as_mut(),
            (OpenRecord::Individual(person), TextSlot::Occupation) => person.occupation.as_mut(),
            (OpenRecord::Individual(person), TextSlot::IndividualNote(index)) => {
                person.notes.get_mut(index)
            }
            (OpenRecord::Individual(person), TextSlot::Attribute(key)) => {
                person.attributes.get_mut(&key)
            }
            (OpenRecord::Family(family), TextSlot::FamilyNote(index)) => {
                family.notes.get_mut(index)
            }
            (OpenRecord::Source(source), TextSlot::SourceTitle) => source.title.as_mut(),
            (OpenRecord::Source(source), TextSlot::SourceAuthor) => source.author.as_mut(),
            (OpenRecord::Source(source), TextSlot::SourcePublisher) => source.publisher.as_mut(),
            (OpenRecord::Source(source), TextSlot::SourceNote(index)) => {
                source.notes.get_mut(index)
            }
            (_, TextSlot::EventDescription) => {
                self.event.as_mut().and_then(|event| event.description.as_mut())
            }
            (_, TextSlot::EventPlace) => self
                .event
                .as_mut()
                .map(|event| event.place.get_or_insert_with(String::new)),
            (_, TextSlot::CitationPage) => {
                self.citation.as_mut().and_then(|citation| citation.page.as_mut())
            }
            _ => None,
        };
        if let Some(target) = target {
            target.push_str(separator);
            target.push_str(&line.value);
        }
    }

    fn orphan(&mut self, line: &LeveledLine) {
        self.diagnostics.warn_once(
            WarningCode::OrphanContinuation,
            Some(line.line_number),
            format!("`{}` line has no value to continue", line.tag),
        );
    }

    fn close_citation(&mut self) {
        if let Some(citation) = self.citation.take() {
            if let Some(event) = self.event.as_mut() {
                event.citations.push(citation);
            }
        }
    }

    fn close_event(&mut self) {
        self.close_citation();
        let Some(event) = self.event.take() else {
            return;
        };
        match &mut self.record {
            OpenRecord::Individual(person) => {
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
            OpenRecord::Family(family) => {
                if event.kind == EventKind::Marriage
                    && family.marriage_date.is_none()
                    && family.marriage_place.is_none()
                {
                    family.marriage_date = event.date.clone();
                    family.marriage_place = event.place.clone();
                }
                family.events.push(event);
            }
            _ => {}
        }
    }

    fn flush_record(&mut self) {
        self.close_event();
        self.slot = None;
        self.family_link = None;
        self.association = None;
        match std::mem::replace(&mut self.record, OpenRecord::None) {
            OpenRecord::Individual(person) => {
                debug!(
                    "event=assemble module=gedcom status=ok kind=individual id={}",
                    person.id
                );
                self.graph.insert_individual(*person);
            }
            OpenRecord::Family(family) => {
                self.graph.insert_family(*family);
            }
            OpenRecord::Source(source) => {
                self.graph.insert_source(*source);
            }
            OpenRecord::Note { id, text } => {
                self.graph.notes.insert(id, text);
            }
            OpenRecord::None | OpenRecord::Header | OpenRecord::Skipped => {}
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Event line values other than the `Y` occurrence flag are descriptions.
fn event_description(value: &str) -> Option<String> {
    non_empty(value).filter(|text| !text.eq_ignore_ascii_case("Y"))
}

#[cfg(test)]
mod tests {
    use super::Assembler;
    use crate::gedcom::error::{ParseError, WarningCode};
    use crate::gedcom::lexer::tokenize;
    use crate::model::graph::{EventKind, Graph, Pedigree, Sex};
    use crate::model::DatePrecision;

    fn assemble(text: &str) -> (Graph, Vec<WarningCode>) {
        let mut assembler = Assembler::new();
        for line in tokenize(text).unwrap() {
            assembler.feed(&line).unwrap();
        }
        let (graph, diagnostics) = assembler.finish();
        let codes = diagnostics.warnings().iter().map(|w| w.code).collect();
        (graph, codes)
    }

    #[test]
    fn builds_individual_with_events_and_citations() {
        let (graph, warnings) = assemble(
            "0 HEAD\n1 GEDC\n2 VERS 5.5.1\n0 @S1@ SOUR\n1 TITL Parish register\n\
             0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n1 BIRT\n2 DATE ABT 1900\n2 PLAC Boston\n\
             2 SOUR @S1@\n3 PAGE p. 4\n3 QUAY 2\n1 OCCU Farmer\n1 DEAT\n2 DATE 1970\n0 TRLR\n",
        );
        assert!(warnings.is_empty());
        let person = &graph.individuals["I1"];
        assert_eq!(person.name.as_deref(), Some("John Smith"));
        assert_eq!(person.surname.as_deref(), Some("Smith"));
        assert_eq!(person.sex, Sex::Male);
        assert_eq!(person.occupation.as_deref(), Some("Farmer"));
        let birth = person.birth_date.as_ref().unwrap();
        assert_eq!(birth.precision, DatePrecision::About);
        assert_eq!(person.birth_place.as_deref(), Some("Boston"));
        assert_eq!(person.death_year(), Some(1970));
        let event = person.event(EventKind::Birth).unwrap();
        assert_eq!(event.citations.len(), 1);
        assert_eq!(event.citations[0].page.as_deref(), Some("p. 4"));
        assert_eq!(event.citations[0].quality, Some(2));
        assert_eq!(graph.sources["S1"].title.as_deref(), Some("Parish register"));
    }

    #[test]
    fn date_under_name_is_not_an_event_date() {
        let (graph, _) = assemble(
            "0 HEAD\n0 @I1@ INDI\n1 NAME Ann /Lee/\n2 DATE 1800\n1 BIRT\n2 DATE 1850\n0 TRLR\n",
        );
        assert_eq!(graph.individuals["I1"].birth_year(), Some(1850));
    }

    #[test]
    fn records_family_links_with_pedigree() {
        let (graph, _) = assemble(
            "0 HEAD\n0 @I3@ INDI\n1 FAMC @F1@\n2 PEDI adopted\n1 FAMS @F2@\n\
             0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n1 MARR\n2 DATE 1890\n0 TRLR\n",
        );
        let child = &graph.individuals["I3"];
        assert_eq!(child.families_as_child[0].pedigree, Some(Pedigree::Adoptive));
        assert_eq!(child.families_as_spouse, vec!["F2".to_string()]);
        let family = &graph.families["F1"];
        assert_eq!(family.children, vec!["I3".to_string()]);
        assert_eq!(family.marriage_year(), Some(1890));
    }

    #[test]
    fn continuation_lines_extend_values() {
        let (graph, _) = assemble(
            "0 HEAD\n0 @I1@ INDI\n1 NOTE First li\n2 CONC ne\n2 CONT Second line\n\
             0 @N1@ NOTE Shared\n1 CONT note\n0 TRLR\n",
        );
        assert_eq!(graph.individuals["I1"].notes, vec!["First line\nSecond line".to_string()]);
        assert_eq!(graph.notes["N1"], "Shared\nnote");
    }

    #[test]
    fn continuations_extend_event_places_and_dates() {
        let (graph, warnings) = assemble(
            "0 HEAD\n0 @I1@ INDI\n1 BIRT\n2 DATE BET 1900\n3 CONC  AND 1905\n2 PLAC Boston,\n\
             3 CONC  Massachusetts\n0 @F1@ FAM\n1 MARR\n2 PLAC Salem\n3 CONT Essex\n0 TRLR\n",
        );
        assert!(warnings.is_empty(), "{warnings:?}");
        let person = &graph.individuals["I1"];
        assert_eq!(person.birth_place.as_deref(), Some("Boston, Massachusetts"));
        let birth = person.birth_date.as_ref().unwrap();
        assert_eq!(birth.precision, DatePrecision::Range);
        assert_eq!(birth.end.as_deref(), Some("1905"));
        assert_eq!(graph.families["F1"].marriage_place.as_deref(), Some("Salem\nEssex"));
    }

    #[test]
    fn lineage_tags_and_associations_are_kept() {
        let (graph, _) = assemble(
            "0 HEAD\n0 @I1@ INDI\n1 _CRID abc-123\n1 _COLL Smith line\n1 _RLVL 3\n\
             1 _UID 42\n1 ASSO @I2@\n2 RELA Godfather\n0 TRLR\n",
        );
        let person = &graph.individuals["I1"];
        assert_eq!(person.origin_id.as_deref(), Some("abc-123"));
        assert_eq!(person.collection.as_deref(), Some("Smith line"));
        assert_eq!(person.research_level, Some(3));
        assert_eq!(person.attributes["_UID"], "42");
        assert_eq!(person.associations[0].relation.as_deref(), Some("Godfather"));
    }

    #[test]
    fn warns_on_version_unknown_records_and_missing_trailer() {
        let (_, warnings) = assemble(
            "0 HEAD\n1 GEDC\n2 VERS 7.0\n0 @X1@ _WEIRD\n0 @X2@ _WEIRD\n0 @I1@ INDI\n",
        );
        assert_eq!(
            warnings,
            vec![
                WarningCode::UnsupportedVersion,
                WarningCode::UnknownRecord,
                WarningCode::MissingTrailer
            ]
        );
    }

    #[test]
    fn missing_header_is_fatal() {
        let mut assembler = Assembler::new();
        let lines = tokenize("0 @I1@ INDI\n1 NAME x").unwrap();
        let err = assembler.feed(&lines[0]).unwrap_err();
        assert_eq!(err, ParseError::MissingHeader { line: 1 });
    }

    #[test]
    fn record_without_xref_is_fatal() {
        let mut assembler = Assembler::new();
        let lines = tokenize("0 HEAD\n0 INDI").unwrap();
        assembler.feed(&lines[0]).unwrap();
        let err = assembler.feed(&lines[1]).unwrap_err();
        assert!(matches!(err, ParseError::InvalidValue { line: 2, .. }));
    }
}
