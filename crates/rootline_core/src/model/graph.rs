//! Genealogical record graph.
//!
//! # Responsibility
//! - Define individuals, families, sources, events and citations.
//! - Own every record in flat id-keyed maps; relationships are id values.
//!
//! # Invariants
//! - The `Graph` is the only owner of records; no record owns another record.
//! - Map keys equal the `id` field of the stored record.
//! - Events are owned by exactly one individual or family.

use crate::model::date::GenDate;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Record identifier inside one graph (cross-reference id without `@`).
pub type RecordId = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Sex {
    pub fn from_code(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Self::Male,
            "F" | "FEMALE" => Self::Female,
            _ => Self::Unknown,
        }
    }

    pub fn gedcom_code(self) -> &'static str {
        match self {
            Self::Male => "M",
            Self::Female => "F",
            Self::Unknown => "U",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }
}

/// Nature of one parent-child link.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pedigree {
    #[default]
    Birth,
    Step,
    Adoptive,
    Foster,
}

impl Pedigree {
    pub fn from_code(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "birth" | "biological" | "natural" | "sealing" => Some(Self::Birth),
            "step" | "stepchild" => Some(Self::Step),
            "adopted" | "adoptive" | "adoption" => Some(Self::Adoptive),
            "foster" => Some(Self::Foster),
            _ => None,
        }
    }

    /// Value used by the `PEDI` sub-tag.
    pub fn gedcom_code(self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Step => "step",
            Self::Adoptive => "adopted",
            Self::Foster => "foster",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Step => "step",
            Self::Adoptive => "adoptive",
            Self::Foster => "foster",
        }
    }
}

/// "Family as child" link carried by an individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyLink {
    pub family: RecordId,
    /// `None` when the document did not record a pedigree.
    pub pedigree: Option<Pedigree>,
}

impl FamilyLink {
    pub fn effective_pedigree(&self) -> Pedigree {
        self.pedigree.unwrap_or_default()
    }
}

/// Non-biological parent reference, filled by the linking pass.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParentLink {
    pub parent: RecordId,
    pub pedigree: Pedigree,
}

/// Auxiliary relationship (`ASSO`/`RELA`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub target: RecordId,
    pub relation: Option<String>,
}

/// Which record owns an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EventOwner {
    Individual(RecordId),
    Family(RecordId),
}

/// Classified event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Birth,
    Christening,
    Baptism,
    Death,
    Burial,
    Cremation,
    Adoption,
    Confirmation,
    Graduation,
    Retirement,
    Naturalization,
    Emigration,
    Immigration,
    Census,
    Residence,
    Probate,
    Will,
    Marriage,
    MarriageBanns,
    MarriageContract,
    MarriageLicense,
    Engagement,
    Divorce,
    DivorceFiled,
    Annulment,
    Other,
}

const INDIVIDUAL_EVENT_TAGS: &[(&str, EventKind)] = &[
    ("BIRT", EventKind::Birth),
    ("CHR", EventKind::Christening),
    ("CHRA", EventKind::Christening),
    ("BAPM", EventKind::Baptism),
    ("BLES", EventKind::Baptism),
    ("DEAT", EventKind::Death),
    ("BURI", EventKind::Burial),
    ("CREM", EventKind::Cremation),
    ("ADOP", EventKind::Adoption),
    ("CONF", EventKind::Confirmation),
    ("FCOM", EventKind::Confirmation),
    ("BARM", EventKind::Confirmation),
    ("BASM", EventKind::Confirmation),
    ("ORDN", EventKind::Other),
    ("GRAD", EventKind::Graduation),
    ("RETI", EventKind::Retirement),
    ("NATU", EventKind::Naturalization),
    ("EMIG", EventKind::Emigration),
    ("IMMI", EventKind::Immigration),
    ("CENS", EventKind::Census),
    ("RESI", EventKind::Residence),
    ("PROB", EventKind::Probate),
    ("WILL", EventKind::Will),
    ("EVEN", EventKind::Other),
];

const FAMILY_EVENT_TAGS: &[(&str, EventKind)] = &[
    ("MARR", EventKind::Marriage),
    ("MARB", EventKind::MarriageBanns),
    ("MARC", EventKind::MarriageContract),
    ("MARL", EventKind::MarriageLicense),
    ("MARS", EventKind::MarriageContract),
    ("ENGA", EventKind::Engagement),
    ("DIV", EventKind::Divorce),
    ("DIVF", EventKind::DivorceFiled),
    ("ANUL", EventKind::Annulment),
    ("CENS", EventKind::Census),
    ("RESI", EventKind::Residence),
    ("EVEN", EventKind::Other),
];

impl EventKind {
    pub fn from_individual_tag(tag: &str) -> Option<Self> {
        lookup_event_tag(INDIVIDUAL_EVENT_TAGS, tag)
    }

    pub fn from_family_tag(tag: &str) -> Option<Self> {
        lookup_event_tag(FAMILY_EVENT_TAGS, tag)
    }

    /// Events that legitimately happen after death.
    pub fn is_post_mortem(self) -> bool {
        matches!(self, Self::Burial | Self::Cremation | Self::Probate)
    }

    pub fn is_family_event(self) -> bool {
        matches!(
            self,
            Self::Marriage
                | Self::MarriageBanns
                | Self::MarriageContract
                | Self::MarriageLicense
                | Self::Engagement
                | Self::Divorce
                | Self::DivorceFiled
                | Self::Annulment
        )
    }

    /// Canonical tag used when the original tag is unavailable.
    pub fn default_tag(self) -> &'static str {
        INDIVIDUAL_EVENT_TAGS
            .iter()
            .chain(FAMILY_EVENT_TAGS.iter())
            .find(|(_, kind)| *kind == self)
            .map_or("EVEN", |(tag, _)| *tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Birth => "birth",
            Self::Christening => "christening",
            Self::Baptism => "baptism",
            Self::Death => "death",
            Self::Burial => "burial",
            Self::Cremation => "cremation",
            Self::Adoption => "adoption",
            Self::Confirmation => "confirmation",
            Self::Graduation => "graduation",
            Self::Retirement => "retirement",
            Self::Naturalization => "naturalization",
            Self::Emigration => "emigration",
            Self::Immigration => "immigration",
            Self::Census => "census",
            Self::Residence => "residence",
            Self::Probate => "probate",
            Self::Will => "will",
            Self::Marriage => "marriage",
            Self::MarriageBanns => "marriage_banns",
            Self::MarriageContract => "marriage_contract",
            Self::MarriageLicense => "marriage_license",
            Self::Engagement => "engagement",
            Self::Divorce => "divorce",
            Self::DivorceFiled => "divorce_filed",
            Self::Annulment => "annulment",
            Self::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        const ALL: [EventKind; 26] = [
            EventKind::Birth,
            EventKind::Christening,
            EventKind::Baptism,
            EventKind::Death,
            EventKind::Burial,
            EventKind::Cremation,
            EventKind::Adoption,
            EventKind::Confirmation,
            EventKind::Graduation,
            EventKind::Retirement,
            EventKind::Naturalization,
            EventKind::Emigration,
            EventKind::Immigration,
            EventKind::Census,
            EventKind::Residence,
            EventKind::Probate,
            EventKind::Will,
            EventKind::Marriage,
            EventKind::MarriageBanns,
            EventKind::MarriageContract,
            EventKind::MarriageLicense,
            EventKind::Engagement,
            EventKind::Divorce,
            EventKind::DivorceFiled,
            EventKind::Annulment,
            EventKind::Other,
        ];
        let normalized = value.trim().to_ascii_lowercase();
        ALL.into_iter().find(|kind| kind.as_str() == normalized)
    }
}

fn lookup_event_tag(table: &[(&str, EventKind)], tag: &str) -> Option<EventKind> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == tag)
        .map(|(_, kind)| *kind)
}

/// Link from an event to a supporting source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source: RecordId,
    pub page: Option<String>,
    /// Quality assessment code `0..=3` (`QUAY`).
    pub quality: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Tag as it appeared in the document (`BIRT`, `MARR`, `_MILT`...).
    pub tag: String,
    pub kind: EventKind,
    pub owner: EventOwner,
    /// Individuals taking part; back-filled from the family for family events.
    pub principals: Vec<RecordId>,
    /// Descriptor from `TYPE`.
    pub event_type: Option<String>,
    pub date: Option<GenDate>,
    pub place: Option<String>,
    pub description: Option<String>,
    pub citations: Vec<Citation>,
}

impl Event {
    pub fn new(tag: impl Into<String>, kind: EventKind, owner: EventOwner) -> Self {
        Self {
            tag: tag.into(),
            kind,
            owner,
            principals: Vec::new(),
            event_type: None,
            date: None,
            place: None,
            description: None,
            citations: Vec::new(),
        }
    }

    pub fn year(&self) -> Option<i32> {
        self.date.as_ref().and_then(GenDate::year)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Individual {
    pub id: RecordId,
    /// Display name without surname delimiters.
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub surname: Option<String>,
    pub sex: Sex,
    pub birth_date: Option<GenDate>,
    pub birth_place: Option<String>,
    pub death_date: Option<GenDate>,
    pub death_place: Option<String>,
    pub occupation: Option<String>,
    pub events: Vec<Event>,
    pub attributes: BTreeMap<String, String>,
    /// Biological father; only set for birth pedigree.
    pub father: Option<RecordId>,
    /// Biological mother; only set for birth pedigree.
    pub mother: Option<RecordId>,
    /// Step/adoptive/foster parents.
    pub parent_links: Vec<ParentLink>,
    pub families_as_child: Vec<FamilyLink>,
    pub spouses: Vec<RecordId>,
    pub families_as_spouse: Vec<RecordId>,
    pub associations: Vec<Association>,
    pub notes: Vec<String>,
    pub note_refs: Vec<RecordId>,
    /// Identifier this record had in a previously imported external document.
    pub external_id: Option<String>,
    /// Originating internal identifier (`_CRID`).
    pub origin_id: Option<String>,
    pub collection: Option<String>,
    pub research_level: Option<u8>,
    /// Explicit living flag; `None` means "derive from dates".
    pub living: Option<bool>,
    pub file_path: Option<String>,
}

impl Individual {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Name for display, falling back to name parts.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.trim().to_string();
        }
        let parts: Vec<&str> = [self.given_name.as_deref(), self.surname.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            "Unknown".to_string()
        } else {
            parts.join(" ")
        }
    }

    pub fn has_name(&self) -> bool {
        [&self.name, &self.given_name, &self.surname]
            .into_iter()
            .any(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()))
    }

    pub fn birth_year(&self) -> Option<i32> {
        self.birth_date.as_ref().and_then(GenDate::year)
    }

    pub fn death_year(&self) -> Option<i32> {
        self.death_date.as_ref().and_then(GenDate::year)
    }

    /// Whether any death evidence exists.
    pub fn has_death_data(&self) -> bool {
        self.death_date.is_some()
            || self.death_place.is_some()
            || self
                .events
                .iter()
                .any(|event| matches!(event.kind, EventKind::Death | EventKind::Burial))
    }

    pub fn event(&self, kind: EventKind) -> Option<&Event> {
        self.events.iter().find(|event| event.kind == kind)
    }

    pub fn add_spouse(&mut self, spouse: &str) -> bool {
        push_unique(&mut self.spouses, spouse)
    }

    pub fn add_family_as_spouse(&mut self, family: &str) -> bool {
        push_unique(&mut self.families_as_spouse, family)
    }

    pub fn family_link(&self, family: &str) -> Option<&FamilyLink> {
        self.families_as_child
            .iter()
            .find(|link| link.family == family)
    }

    pub fn add_parent_link(&mut self, parent: &str, pedigree: Pedigree) -> bool {
        let exists = self
            .parent_links
            .iter()
            .any(|link| link.parent == parent && link.pedigree == pedigree);
        if exists {
            return false;
        }
        self.parent_links.push(ParentLink {
            parent: parent.to_string(),
            pedigree,
        });
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: RecordId,
    pub husband: Option<RecordId>,
    pub wife: Option<RecordId>,
    /// Partners whose role no record states and no recorded sex decides.
    #[serde(default)]
    pub unordered_partners: Vec<RecordId>,
    pub children: Vec<RecordId>,
    pub marriage_date: Option<GenDate>,
    pub marriage_place: Option<String>,
    pub events: Vec<Event>,
    pub notes: Vec<String>,
    pub external_id: Option<String>,
}

impl Family {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn marriage_year(&self) -> Option<i32> {
        self.marriage_date.as_ref().and_then(GenDate::year)
    }

    pub fn partners(&self) -> impl Iterator<Item = &RecordId> {
        self.husband
            .iter()
            .chain(self.wife.iter())
            .chain(self.unordered_partners.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.partners().next().is_none() && self.children.is_empty()
    }

    pub fn add_child(&mut self, child: &str) -> bool {
        push_unique(&mut self.children, child)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: RecordId,
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
    /// Repository pointer or free-text repository name.
    pub repository: Option<String>,
    pub notes: Vec<String>,
    pub external_id: Option<String>,
}

impl Source {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .filter(|title| !title.trim().is_empty())
            .unwrap_or_else(|| format!("Source {}", self.id))
    }
}

/// Document header metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderInfo {
    /// Approved system id from `HEAD.SOUR`.
    pub source_system: Option<String>,
    pub source_name: Option<String>,
    pub source_version: Option<String>,
    pub gedcom_version: Option<String>,
    pub charset: Option<String>,
    pub submitter: Option<String>,
    pub language: Option<String>,
    pub file_name: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub header: HeaderInfo,
    pub individuals: BTreeMap<RecordId, Individual>,
    pub families: BTreeMap<RecordId, Family>,
    pub sources: BTreeMap<RecordId, Source>,
    /// Free-standing note records.
    pub notes: BTreeMap<RecordId, String>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn individual(&self, id: &str) -> Option<&Individual> {
        self.individuals.get(id)
    }

    pub fn family(&self, id: &str) -> Option<&Family> {
        self.families.get(id)
    }

    pub fn insert_individual(&mut self, individual: Individual) -> Option<Individual> {
        self.individuals.insert(individual.id.clone(), individual)
    }

    pub fn insert_family(&mut self, family: Family) -> Option<Family> {
        self.families.insert(family.id.clone(), family)
    }

    pub fn insert_source(&mut self, source: Source) -> Option<Source> {
        self.sources.insert(source.id.clone(), source)
    }

    /// Individual ids in natural order (`I2` before `I10`).
    pub fn individual_ids(&self) -> Vec<RecordId> {
        sorted_naturally(self.individuals.keys())
    }

    pub fn family_ids(&self) -> Vec<RecordId> {
        sorted_naturally(self.families.keys())
    }

    pub fn source_ids(&self) -> Vec<RecordId> {
        sorted_naturally(self.sources.keys())
    }

    pub fn display_name(&self, id: &str) -> String {
        self.individuals
            .get(id)
            .map_or_else(|| id.to_string(), Individual::display_name)
    }
}

/// Sorts ids by alphabetic prefix, then numeric suffix, then full text.
pub fn sorted_naturally<'a>(ids: impl Iterator<Item = &'a RecordId>) -> Vec<RecordId> {
    let mut ids: Vec<RecordId> = ids.cloned().collect();
    ids.sort_by(|left, right| natural_cmp(left, right));
    ids
}

pub fn natural_cmp(left: &str, right: &str) -> Ordering {
    let (left_prefix, left_number) = split_numeric_suffix(left);
    let (right_prefix, right_number) = split_numeric_suffix(right);
    left_prefix
        .cmp(right_prefix)
        .then(left_number.cmp(&right_number))
        .then_with(|| left.cmp(right))
}

fn split_numeric_suffix(id: &str) -> (&str, Option<u64>) {
    let digits_start = id
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map_or(id.len(), |(index, _)| index);
    let number = id[digits_start..].parse().ok();
    (&id[..digits_start], number)
}

/// Splits a `NAME` value (`John /Smith/ Jr`) into display, given and surname.
pub fn split_gedcom_name(value: &str) -> (String, Option<String>, Option<String>) {
    let trimmed = value.trim();
    let mut pieces = trimmed.splitn(3, '/');
    let given = pieces.next().unwrap_or_default().trim();
    let surname = pieces.next().map(str::trim);
    let suffix = pieces.next().map(str::trim).unwrap_or_default();

    let display = [given, surname.unwrap_or_default(), suffix]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let given = (!given.is_empty()).then(|| given.to_string());
    let surname = surname
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    (display, given, surname)
}

/// Formats name parts as a `NAME` value with slash-delimited surname.
pub fn format_gedcom_name(given: Option<&str>, surname: Option<&str>) -> String {
    match (given.filter(|g| !g.is_empty()), surname.filter(|s| !s.is_empty())) {
        (Some(given), Some(surname)) => format!("{given} /{surname}/"),
        (None, Some(surname)) => format!("/{surname}/"),
        (Some(given), None) => given.to_string(),
        (None, None) => String::new(),
    }
}

pub(crate) fn push_unique(values: &mut Vec<RecordId>, value: &str) -> bool {
    if values.iter().any(|existing| existing == value) {
        return false;
    }
    values.push(value.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::{format_gedcom_name, natural_cmp, split_gedcom_name, Individual};
    use std::cmp::Ordering;

    #[test]
    fn split_name_extracts_surname_between_slashes() {
        let (display, given, surname) = split_gedcom_name("John Henry /Smith/ Jr");
        assert_eq!(display, "John Henry Smith Jr");
        assert_eq!(given.as_deref(), Some("John Henry"));
        assert_eq!(surname.as_deref(), Some("Smith"));
    }

    #[test]
    fn split_name_without_surname_keeps_given() {
        let (display, given, surname) = split_gedcom_name("Mary");
        assert_eq!(display, "Mary");
        assert_eq!(given.as_deref(), Some("Mary"));
        assert_eq!(surname, None);
        assert_eq!(format_gedcom_name(Some("Mary"), Some("Jones")), "Mary /Jones/");
    }

    #[test]
    fn natural_order_compares_numeric_suffix() {
        assert_eq!(natural_cmp("I2", "I10"), Ordering::Less);
        assert_eq!(natural_cmp("F1", "I1"), Ordering::Less);
    }

    #[test]
    fn display_name_falls_back_to_parts() {
        let mut person = Individual::new("I1");
        assert_eq!(person.display_name(), "Unknown");
        person.surname = Some("Smith".to_string());
        assert_eq!(person.display_name(), "Smith");
    }
}
