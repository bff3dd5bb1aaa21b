//! Export engines.
//!
//! # Responsibility
//! - Share identifier allocation, privacy evaluation and relationship
//!   planning across the text, JSON and tabular engines.
//!
//! # Invariants
//! - Export never mutates the graph.
//! - Output is deterministic for the same graph, options and collaborators.
//! - Hidden individuals and every reference to them are omitted.

pub mod csv;
pub mod gedcom;
pub mod gedcomx;
pub mod privacy;

pub use self::csv::{export_csv, CsvColumn, CsvExportOptions};
pub use gedcom::{export_gedcom, GedcomExportOptions};
pub use gedcomx::{export_gedcomx, GedcomxDocument, GedcomxExportOptions};
pub use privacy::{
    LivingPrivacyPolicy, LivingTreatment, Obfuscation, PrivacyPolicy, PrivacySubject, Redaction,
};

use crate::model::graph::{natural_cmp, Graph, Individual, RecordId};
use crate::model::relations::{plan_families, FamilyPlan};
use crate::repo::PlaceHierarchy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ExportResult<T> = Result<T, ExportError>;

#[derive(Debug)]
pub enum ExportError {
    Json(serde_json::Error),
    InvalidOption(String),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(err) => write!(f, "json serialization failed: {err}"),
            Self::InvalidOption(message) => write!(f, "invalid export option: {message}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Json(err) => Some(err),
            Self::InvalidOption(_) => None,
        }
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Optional collaborators for one export run.
#[derive(Clone, Copy, Default)]
pub struct ExportContext<'a> {
    pub privacy: Option<&'a dyn PrivacyPolicy>,
    pub places: Option<&'a dyn PlaceHierarchy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    pub individuals: usize,
    pub families: usize,
    pub sources: usize,
    /// Individuals exported with obfuscated fields.
    pub redacted: usize,
    /// Individuals left out entirely.
    pub hidden: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub text: String,
    pub stats: ExportStats,
}

/// Allocates export identifiers.
///
/// Preferred ids (previously imported external ids) are claimed first, in
/// record order, when `valid` accepts them and no earlier record claimed
/// them. Every other record gets `{prefix}{n}` with the smallest `n` not
/// already claimed.
pub fn assign_ids<'a>(
    records: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
    prefix: &str,
    valid: impl Fn(&str) -> bool,
) -> BTreeMap<RecordId, String> {
    let records: Vec<(&str, Option<&str>)> = records.into_iter().collect();
    let mut claimed: BTreeSet<String> = BTreeSet::new();
    let mut assigned: BTreeMap<RecordId, String> = BTreeMap::new();

    for (record, preferred) in &records {
        if let Some(preferred) = preferred.filter(|candidate| valid(candidate)) {
            if claimed.insert(preferred.to_string()) {
                assigned.insert(record.to_string(), preferred.to_string());
            }
        }
    }

    let mut next = 1usize;
    for (record, _) in &records {
        if assigned.contains_key(*record) {
            continue;
        }
        let mut candidate = format!("{prefix}{next}");
        while claimed.contains(&candidate) {
            next += 1;
            candidate = format!("{prefix}{next}");
        }
        next += 1;
        claimed.insert(candidate.clone());
        assigned.insert(record.to_string(), candidate);
    }
    assigned
}

/// Everything the engines need after privacy and planning.
pub(crate) struct Prepared<'g> {
    pub graph: &'g Graph,
    /// Included individuals in natural id order.
    pub individuals: Vec<&'g Individual>,
    pub obfuscations: BTreeMap<RecordId, Obfuscation>,
    pub individual_ids: BTreeMap<RecordId, String>,
    pub plans: Vec<FamilyPlan>,
    /// Plan key -> export id.
    pub family_ids: BTreeMap<String, String>,
    pub source_ids: BTreeMap<RecordId, String>,
    pub stats: ExportStats,
}

impl<'g> Prepared<'g> {
    pub fn new(
        graph: &'g Graph,
        privacy: Option<&dyn PrivacyPolicy>,
        valid_id: &dyn Fn(&str) -> bool,
    ) -> Self {
        let mut stats = ExportStats::default();
        let mut individuals = Vec::new();
        let mut obfuscations = BTreeMap::new();
        for id in graph.individual_ids() {
            let Some(person) = graph.individuals.get(&id) else {
                continue;
            };
            let redaction = privacy.map_or(Redaction::Show, |policy| {
                policy.evaluate(&PrivacySubject::from_individual(person))
            });
            match redaction {
                Redaction::Show => individuals.push(person),
                Redaction::Hide => stats.hidden += 1,
                Redaction::Obfuscate(obfuscation) => {
                    stats.redacted += 1;
                    obfuscations.insert(id.clone(), obfuscation);
                    individuals.push(person);
                }
            }
        }
        let included: BTreeSet<&str> = individuals.iter().map(|person| person.id.as_str()).collect();
        let plans = plan_families(graph, &|id| included.contains(id));

        let individual_ids = assign_ids(
            individuals
                .iter()
                .map(|person| (person.id.as_str(), person.external_id.as_deref())),
            "I",
            valid_id,
        );
        let family_ids = assign_ids(
            plans.iter().map(|plan| {
                (plan.key.as_str(), plan.external_id.as_deref())
            }),
            "F",
            valid_id,
        );
        let mut source_keys: Vec<&RecordId> = graph.sources.keys().collect();
        source_keys.sort_by(|left, right| natural_cmp(left, right));
        let source_ids = assign_ids(
            source_keys.into_iter().map(|id| {
                let source = &graph.sources[id];
                (id.as_str(), source.external_id.as_deref())
            }),
            "S",
            valid_id,
        );

        stats.individuals = individuals.len();
        stats.families = plans.len();
        stats.sources = source_ids.len();
        Self {
            graph,
            individuals,
            obfuscations,
            individual_ids,
            plans,
            family_ids,
            source_ids,
            stats,
        }
    }

    pub fn individual_id(&self, id: &str) -> Option<&str> {
        self.individual_ids.get(id).map(String::as_str)
    }

    pub fn obfuscation(&self, id: &str) -> Option<&Obfuscation> {
        self.obfuscations.get(id)
    }

    /// Name to emit for an included individual.
    pub fn display_name(&self, person: &Individual) -> String {
        match self.obfuscation(&person.id) {
            Some(obfuscation) => obfuscation.display_name.clone(),
            None => person.display_name(),
        }
    }
}


/// Cross-reference ids accepted by the text-hierarchy format.
pub(crate) fn is_valid_xref(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 20
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
