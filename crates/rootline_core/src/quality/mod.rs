//! Post-parse quality analysis.
//!
//! # Responsibility
//! - Report date, relationship, reference, completeness and place anomalies.
//! - Propose a default fix policy; apply caller-approved fixes.
//!
//! # Invariants
//! - Analysis is a pure function over a finalized graph.
//! - `apply_fixes` is the only post-construction graph mutation.

pub mod analyzer;
pub mod fixes;
pub mod places;

pub use analyzer::{analyze, AnalyzerOptions};
pub use fixes::{apply_fixes, FixChoices, FixReport};
pub use places::PlaceVariant;

use crate::model::graph::RecordId;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    Date,
    Relationship,
    Data,
    Place,
    Reference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    DeathBeforeBirth,
    FutureBirth,
    MissingDeath,
    EventBeforeBirth,
    EventAfterDeath,
    MissingName,
    UnknownSex,
    NoDates,
    HusbandFemale,
    WifeMale,
    ParentYoungerThanChild,
    ChildBeforeMarriage,
    EmptyFamily,
    DanglingReference,
    MultipleParentFamilies,
    NonStandardPlace,
}

impl IssueCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DeathBeforeBirth => "death_before_birth",
            Self::FutureBirth => "future_birth",
            Self::MissingDeath => "missing_death",
            Self::EventBeforeBirth => "event_before_birth",
            Self::EventAfterDeath => "event_after_death",
            Self::MissingName => "missing_name",
            Self::UnknownSex => "unknown_sex",
            Self::NoDates => "no_dates",
            Self::HusbandFemale => "husband_female",
            Self::WifeMale => "wife_male",
            Self::ParentYoungerThanChild => "parent_younger_than_child",
            Self::ChildBeforeMarriage => "child_before_marriage",
            Self::EmptyFamily => "empty_family",
            Self::DanglingReference => "dangling_reference",
            Self::MultipleParentFamilies => "multiple_parent_families",
            Self::NonStandardPlace => "non_standard_place",
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            Self::DeathBeforeBirth | Self::ParentYoungerThanChild | Self::DanglingReference => {
                Severity::Error
            }
            Self::FutureBirth
            | Self::EventBeforeBirth
            | Self::EventAfterDeath
            | Self::MissingName
            | Self::HusbandFemale
            | Self::WifeMale
            | Self::EmptyFamily
            | Self::MultipleParentFamilies => Severity::Warning,
            Self::MissingDeath
            | Self::UnknownSex
            | Self::NoDates
            | Self::ChildBeforeMarriage
            | Self::NonStandardPlace => Severity::Info,
        }
    }

    pub fn category(self) -> IssueCategory {
        match self {
            Self::DeathBeforeBirth
            | Self::FutureBirth
            | Self::MissingDeath
            | Self::EventBeforeBirth
            | Self::EventAfterDeath => IssueCategory::Date,
            Self::MissingName | Self::UnknownSex | Self::NoDates | Self::EmptyFamily => {
                IssueCategory::Data
            }
            Self::HusbandFemale
            | Self::WifeMale
            | Self::ParentYoungerThanChild
            | Self::ChildBeforeMarriage
            | Self::MultipleParentFamilies => IssueCategory::Relationship,
            Self::DanglingReference => IssueCategory::Reference,
            Self::NonStandardPlace => IssueCategory::Place,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Individual,
    Family,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityIssue {
    pub code: IssueCode,
    pub message: String,
    pub severity: Severity,
    pub category: IssueCategory,
    pub record_id: RecordId,
    pub record_kind: RecordKind,
    pub details: BTreeMap<String, String>,
    pub auto_fixable: bool,
}

impl QualityIssue {
    pub(crate) fn new(
        code: IssueCode,
        record_kind: RecordKind,
        record_id: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            severity: code.severity(),
            category: code.category(),
            record_id: record_id.to_string(),
            record_kind,
            details: BTreeMap::new(),
            auto_fixable: matches!(code, IssueCode::EmptyFamily | IssueCode::NonStandardPlace),
        }
    }

    pub(crate) fn detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualitySummary {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_category: BTreeMap<IssueCategory, usize>,
    pub place_variants: Vec<PlaceVariant>,
    pub default_fixes: FixChoices,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub issues: Vec<QualityIssue>,
    pub summary: QualitySummary,
}

impl QualityReport {
    pub fn count(&self, code: IssueCode) -> usize {
        self.issues.iter().filter(|issue| issue.code == code).count()
    }

    pub fn has_errors(&self) -> bool {
        self.issues
            .iter()
            .any(|issue| issue.severity == Severity::Error)
    }
}
