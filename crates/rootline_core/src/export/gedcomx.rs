//! JSON document (GEDCOM X) export engine and document model.
//!
//! The document structs double as the import model; unknown JSON fields are
//! ignored on read.

use crate::export::{ExportContext, ExportOutput, ExportResult, Prepared};
use crate::model::graph::{Event, EventKind, Graph, Individual, Pedigree, Sex};
use crate::model::GenDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const TYPE_PREFIX: &str = "http://gedcomx.org/";
pub const PERSISTENT_IDENTIFIER: &str = "http://gedcomx.org/Persistent";
pub const COUPLE: &str = "http://gedcomx.org/Couple";
pub const PARENT_CHILD: &str = "http://gedcomx.org/ParentChild";
pub const OCCUPATION: &str = "http://gedcomx.org/Occupation";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GedcomxExportOptions {
    pub pretty: bool,
    /// Emitted as the document's single agent.
    pub submitter: Option<String>,
}

impl Default for GedcomxExportOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            submitter: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GedcomxDocument {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persons: Vec<GxPerson>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<GxRelationship>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_descriptions: Vec<GxSourceDescription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub places: Vec<GxPlaceDescription>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<GxAgent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxPerson {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub living: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<GxGender>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<GxName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<GxFact>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub identifiers: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<GxNote>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GxGender {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxName {
    pub name_forms: Vec<GxNameForm>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxNameForm {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<GxNamePart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GxNamePart {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxFact {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<GxDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<GxPlaceReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<GxSourceReference>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxDate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxPlaceReference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    /// `#id` of a place description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxSourceReference {
    /// `#id` of a source description.
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GxResourceReference {
    pub resource: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxRelationship {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub person1: GxResourceReference,
    pub person2: GxResourceReference,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub facts: Vec<GxFact>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GxTextValue {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GxNote {
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxSourceDescription {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub titles: Vec<GxTextValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<GxTextValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<GxNote>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GxPlaceDescription {
    pub id: String,
    pub names: Vec<GxTextValue>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GxAgent {
    pub id: String,
    pub names: Vec<GxTextValue>,
}

/// `http://gedcomx.org/<Name>` for known event kinds.
pub fn fact_type(event: &Event) -> String {
    let name = match event.kind {
        EventKind::Birth => "Birth",
        EventKind::Christening => "Christening",
        EventKind::Baptism => "Baptism",
        EventKind::Death => "Death",
        EventKind::Burial => "Burial",
        EventKind::Cremation => "Cremation",
        EventKind::Adoption => "Adoption",
        EventKind::Confirmation => "Confirmation",
        EventKind::Graduation => "Graduation",
        EventKind::Retirement => "Retirement",
        EventKind::Naturalization => "Naturalization",
        EventKind::Emigration => "Emigration",
        EventKind::Immigration => "Immigration",
        EventKind::Census => "Census",
        EventKind::Residence => "Residence",
        EventKind::Probate => "Probate",
        EventKind::Will => "Will",
        EventKind::Marriage => "Marriage",
        EventKind::MarriageBanns => "MarriageBanns",
        EventKind::MarriageContract => "MarriageContract",
        EventKind::MarriageLicense => "MarriageLicense",
        EventKind::Engagement => "Engagement",
        EventKind::Divorce => "Divorce",
        EventKind::DivorceFiled => "DivorceFiling",
        EventKind::Annulment => "Annulment",
        EventKind::Other => return format!("data:,{}", event.event_type.as_deref().unwrap_or(&event.tag)),
    };
    format!("{TYPE_PREFIX}{name}")
}

/// Inverse of [`fact_type`]; unknown URIs map to `Other`.
pub fn event_kind_for_fact(kind: &str) -> EventKind {
    let Some(name) = kind.strip_prefix(TYPE_PREFIX) else {
        return EventKind::Other;
    };
    match name {
        "DivorceFiling" => EventKind::DivorceFiled,
        other => {
            let snake = to_snake_case(other);
            EventKind::parse(&snake).unwrap_or(EventKind::Other)
        }
    }
}

fn to_snake_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for (index, c) in value.chars().enumerate() {
        if c.is_ascii_uppercase() && index > 0 {
            out.push('_');
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

pub fn gender_type(sex: Sex) -> String {
    let name = match sex {
        Sex::Male => "Male",
        Sex::Female => "Female",
        Sex::Unknown => "Unknown",
    };
    format!("{TYPE_PREFIX}{name}")
}

/// Lineage fact for non-birth parent-child relationships.
pub fn lineage_fact_type(pedigree: Pedigree) -> Option<String> {
    let name = match pedigree {
        Pedigree::Birth => return None,
        Pedigree::Step => "StepParent",
        Pedigree::Adoptive => "AdoptiveParent",
        Pedigree::Foster => "FosterParent",
    };
    Some(format!("{TYPE_PREFIX}{name}"))
}

pub fn pedigree_for_lineage_fact(kind: &str) -> Option<Pedigree> {
    match kind.strip_prefix(TYPE_PREFIX)? {
        "StepParent" => Some(Pedigree::Step),
        "AdoptiveParent" | "AdoptedParent" => Some(Pedigree::Adoptive),
        "FosterParent" => Some(Pedigree::Foster),
        "BiologicalParent" => Some(Pedigree::Birth),
        _ => None,
    }
}

/// Resource reference for an id (`#id`).
pub fn resource(id: &str) -> String {
    format!("#{id}")
}

fn is_valid_resource_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && !candidate.contains('#')
        && !candidate.chars().any(char::is_whitespace)
}

/// Builds the JSON document.
pub(crate) fn build_document<'g>(
    graph: &'g Graph,
    options: &GedcomxExportOptions,
    context: &ExportContext<'_>,
) -> (GedcomxDocument, Prepared<'g>) {
    let prepared = Prepared::new(graph, context.privacy, &is_valid_resource_id);
    let mut places = PlaceTable::default();
    let mut document = GedcomxDocument::default();

    for person in &prepared.individuals {
        let Some(id) = prepared.individual_id(&person.id) else {
            continue;
        };
        let record = person_record(&prepared, person, id, &mut places);
        document.persons.push(record);
    }

    for plan in &prepared.plans {
        let partners: Vec<&str> = plan
            .partners
            .iter()
            .filter_map(|id| prepared.individual_id(id))
            .collect();
        if let [first, second] = partners.as_slice() {
            let mut facts = Vec::new();
            let has_marriage_event = plan.events.iter().any(|event| event.kind == EventKind::Marriage);
            if !has_marriage_event && (plan.marriage_date.is_some() || plan.marriage_place.is_some()) {
                facts.push(GxFact {
                    kind: format!("{TYPE_PREFIX}Marriage"),
                    date: plan.marriage_date.as_ref().map(date_value),
                    place: plan
                        .marriage_place
                        .as_deref()
                        .map(|place| places.reference(place)),
                    ..GxFact::default()
                });
            }
            for event in &plan.events {
                facts.push(fact(&prepared, event, &mut places, false, false));
            }
            document.relationships.push(GxRelationship {
                id: prepared.family_ids.get(&plan.key).cloned(),
                kind: COUPLE.to_string(),
                person1: GxResourceReference {
                    resource: resource(first),
                },
                person2: GxResourceReference {
                    resource: resource(second),
                },
                facts,
            });
        }
        for (child, pedigree) in &plan.children {
            let Some(child) = prepared.individual_id(child) else {
                continue;
            };
            for parent in &partners {
                let facts = lineage_fact_type(*pedigree)
                    .map(|kind| {
                        vec![GxFact {
                            kind,
                            ..GxFact::default()
                        }]
                    })
                    .unwrap_or_default();
                document.relationships.push(GxRelationship {
                    id: None,
                    kind: PARENT_CHILD.to_string(),
                    person1: GxResourceReference {
                        resource: resource(parent),
                    },
                    person2: GxResourceReference {
                        resource: resource(child),
                    },
                    facts,
                });
            }
        }
    }

    for id in graph.source_ids() {
        let (Some(source), Some(export_id)) = (graph.sources.get(&id), prepared.source_ids.get(&id))
        else {
            continue;
        };
        let citation = [source.author.as_deref(), source.title.as_deref(), source.publisher.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(". ");
        document.source_descriptions.push(GxSourceDescription {
            id: export_id.clone(),
            titles: source
                .title
                .iter()
                .map(|title| GxTextValue {
                    value: title.clone(),
                })
                .collect(),
            citations: (!citation.is_empty())
                .then(|| GxTextValue { value: citation })
                .into_iter()
                .collect(),
            notes: source
                .notes
                .iter()
                .map(|text| GxNote { text: text.clone() })
                .collect(),
        });
    }

    document.places = places.into_descriptions(context);
    if let Some(submitter) = options.submitter.as_deref() {
        document.agents.push(GxAgent {
            id: "A1".to_string(),
            names: vec![GxTextValue {
                value: submitter.to_string(),
            }],
        });
    }
    (document, prepared)
}

/// Serializes the graph as a JSON document.
pub fn export_gedcomx(
    graph: &Graph,
    options: &GedcomxExportOptions,
    context: &ExportContext<'_>,
) -> ExportResult<ExportOutput> {
    let (document, prepared) = build_document(graph, options, context);
    let text = if options.pretty {
        serde_json::to_string_pretty(&document)?
    } else {
        serde_json::to_string(&document)?
    };
    info!(
        "event=export module=export status=ok format=gedcomx persons={} relationships={} redacted={} hidden={}",
        document.persons.len(),
        document.relationships.len(),
        prepared.stats.redacted,
        prepared.stats.hidden
    );
    Ok(ExportOutput {
        text,
        stats: prepared.stats,
    })
}

fn person_record(
    prepared: &Prepared<'_>,
    person: &Individual,
    id: &str,
    places: &mut PlaceTable,
) -> GxPerson {
    let obfuscation = prepared.obfuscation(&person.id);
    let mut record = GxPerson {
        id: id.to_string(),
        living: person.living,
        gender: Some(GxGender {
            kind: gender_type(person.sex),
        }),
        ..GxPerson::default()
    };

    let mut form = GxNameForm {
        full_text: Some(prepared.display_name(person)),
        parts: Vec::new(),
    };
    if obfuscation.is_none() {
        if let Some(given) = person.given_name.as_deref() {
            form.parts.push(GxNamePart {
                kind: format!("{TYPE_PREFIX}Given"),
                value: given.to_string(),
            });
        }
        if let Some(surname) = person.surname.as_deref() {
            form.parts.push(GxNamePart {
                kind: format!("{TYPE_PREFIX}Surname"),
                value: surname.to_string(),
            });
        }
    }
    record.names.push(GxName {
        name_forms: vec![form],
    });

    let hide_birth_date = obfuscation.is_some_and(|o| o.hide_birth_date);
    let hide_birth_place = obfuscation.is_some_and(|o| o.hide_birth_place);
    let mut has_birth = false;
    let mut has_death = false;
    for event in &person.events {
        has_birth |= event.kind == EventKind::Birth;
        has_death |= event.kind == EventKind::Death;
        record
            .facts
            .push(fact(prepared, event, places, hide_birth_date, hide_birth_place));
    }
    // Vital fields set directly (no event record) still become facts.
    if !has_birth {
        let date = person.birth_date.as_ref().filter(|_| !hide_birth_date);
        let place = person.birth_place.as_deref().filter(|_| !hide_birth_place);
        if date.is_some() || place.is_some() {
            record.facts.push(GxFact {
                kind: format!("{TYPE_PREFIX}Birth"),
                date: date.map(date_value),
                place: place.map(|place| places.reference(place)),
                ..GxFact::default()
            });
        }
    }
    if !has_death && (person.death_date.is_some() || person.death_place.is_some()) {
        record.facts.push(GxFact {
            kind: format!("{TYPE_PREFIX}Death"),
            date: person.death_date.as_ref().map(date_value),
            place: person.death_place.as_deref().map(|place| places.reference(place)),
            ..GxFact::default()
        });
    }
    if let Some(occupation) = person.occupation.as_deref() {
        if !obfuscation.is_some_and(|o| o.hide_occupation) {
            record.facts.push(GxFact {
                kind: OCCUPATION.to_string(),
                value: Some(occupation.to_string()),
                ..GxFact::default()
            });
        }
    }
    if let Some(origin) = person.origin_id.as_deref() {
        record
            .identifiers
            .insert(PERSISTENT_IDENTIFIER.to_string(), vec![origin.to_string()]);
    }
    if obfuscation.is_none() {
        record.notes = person
            .notes
            .iter()
            .map(|text| GxNote { text: text.clone() })
            .collect();
    }
    record
}

fn fact(
    prepared: &Prepared<'_>,
    event: &Event,
    places: &mut PlaceTable,
    hide_birth_date: bool,
    hide_birth_place: bool,
) -> GxFact {
    let is_birth = event.kind == EventKind::Birth;
    GxFact {
        kind: fact_type(event),
        date: event
            .date
            .as_ref()
            .filter(|_| !(is_birth && hide_birth_date))
            .map(date_value),
        place: event
            .place
            .as_deref()
            .filter(|_| !(is_birth && hide_birth_place))
            .map(|place| places.reference(place)),
        value: event.description.clone(),
        sources: event
            .citations
            .iter()
            .filter_map(|citation| {
                prepared
                    .source_ids
                    .get(&citation.source)
                    .map(|id| GxSourceReference {
                        description: resource(id),
                        page: citation.page.clone(),
                    })
            })
            .collect(),
    }
}

fn date_value(date: &GenDate) -> GxDate {
    GxDate {
        original: (!date.raw.is_empty()).then(|| date.raw.clone()),
        formal: date.to_formal(),
    }
}

/// Distinct place strings in first-use order.
#[derive(Default)]
struct PlaceTable {
    ids: BTreeMap<String, String>,
    order: Vec<String>,
}

impl PlaceTable {
    fn reference(&mut self, place: &str) -> GxPlaceReference {
        let next = self.order.len() + 1;
        let id = self
            .ids
            .entry(place.to_string())
            .or_insert_with(|| format!("P{next}"))
            .clone();
        if self.order.len() < self.ids.len() {
            self.order.push(place.to_string());
        }
        GxPlaceReference {
            original: Some(place.to_string()),
            description: Some(resource(&id)),
        }
    }

    fn into_descriptions(self, context: &ExportContext<'_>) -> Vec<GxPlaceDescription> {
        self.order
            .iter()
            .map(|place| {
                let node = context.places.and_then(|hierarchy| hierarchy.resolve(place));
                GxPlaceDescription {
                    id: self.ids[place].clone(),
                    names: vec![GxTextValue {
                        value: place.clone(),
                    }],
                    kind: node.as_ref().and_then(|node| node.place_type.clone()),
                    latitude: node.as_ref().and_then(|node| node.latitude),
                    longitude: node.as_ref().and_then(|node| node.longitude),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{build_document, event_kind_for_fact, GedcomxExportOptions, COUPLE, PARENT_CHILD};
    use crate::export::ExportContext;
    use crate::model::graph::{EventKind, Graph, Individual, Pedigree, Sex};
    use crate::model::GenDate;

    #[test]
    fn couples_are_unordered_and_lineage_is_typed() {
        let mut graph = Graph::new();
        let mut first = Individual::new("a");
        first.spouses.push("b".to_string());
        first.birth_date = Some(GenDate::parse("BET 1900 AND 1905"));
        first.birth_place = Some("Boston".to_string());
        graph.insert_individual(first);
        graph.insert_individual(Individual::new("b"));
        let mut child = Individual::new("c");
        child.sex = Sex::Female;
        child.add_parent_link("a", Pedigree::Adoptive);
        child.add_parent_link("b", Pedigree::Adoptive);
        graph.insert_individual(child);

        let (document, _) =
            build_document(&graph, &GedcomxExportOptions::default(), &ExportContext::default());
        assert_eq!(document.persons.len(), 3);
        let couple = document
            .relationships
            .iter()
            .find(|relationship| relationship.kind == COUPLE)
            .unwrap();
        assert_eq!(couple.person1.resource, "#I1");
        assert_eq!(couple.person2.resource, "#I2");
        let adoptions: Vec<_> = document
            .relationships
            .iter()
            .filter(|relationship| relationship.kind == PARENT_CHILD)
            .collect();
        assert_eq!(adoptions.len(), 2);
        assert_eq!(adoptions[0].facts[0].kind, "http://gedcomx.org/AdoptiveParent");

        let birth = &document.persons[0].facts[0];
        assert_eq!(birth.date.as_ref().unwrap().formal.as_deref(), Some("+1900/+1905"));
        assert_eq!(birth.place.as_ref().unwrap().description.as_deref(), Some("#P1"));
        assert_eq!(document.places[0].id, "P1");
    }

    #[test]
    fn fact_types_map_back_to_event_kinds() {
        assert_eq!(event_kind_for_fact("http://gedcomx.org/MarriageBanns"), EventKind::MarriageBanns);
        assert_eq!(event_kind_for_fact("http://gedcomx.org/DivorceFiling"), EventKind::DivorceFiled);
        assert_eq!(event_kind_for_fact("data:,_MILT"), EventKind::Other);
    }
}
