//! Privacy policy evaluation for export.
//!
//! # Invariants
//! - A policy is a pure function of the subject's name, dates and living flag.
//! - Explicit `living` flags win over date heuristics.

use crate::model::graph::Individual;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// What a policy sees about one individual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivacySubject<'a> {
    pub id: &'a str,
    pub name: Option<&'a str>,
    pub birth_year: Option<i32>,
    pub death_year: Option<i32>,
    pub has_death_data: bool,
    pub living: Option<bool>,
}

impl<'a> PrivacySubject<'a> {
    pub fn from_individual(person: &'a Individual) -> Self {
        Self {
            id: &person.id,
            name: person.name.as_deref(),
            birth_year: person.birth_year(),
            death_year: person.death_year(),
            has_death_data: person.has_death_data(),
            living: person.living,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obfuscation {
    pub display_name: String,
    pub hide_birth_date: bool,
    pub hide_birth_place: bool,
    pub hide_occupation: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Redaction {
    Show,
    Hide,
    Obfuscate(Obfuscation),
}

/// Privacy-policy evaluator consumed by every export engine.
pub trait PrivacyPolicy {
    fn evaluate(&self, subject: &PrivacySubject<'_>) -> Redaction;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LivingTreatment {
    Hide,
    #[default]
    Obfuscate,
}

/// Redacts individuals presumed living.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LivingPrivacyPolicy {
    pub reference_year: i32,
    /// Individuals born fewer years ago than this are presumed living.
    pub threshold_years: i32,
    pub treatment: LivingTreatment,
    pub display_name: String,
    pub hide_birth_date: bool,
    pub hide_birth_place: bool,
    pub hide_occupation: bool,
}

impl Default for LivingPrivacyPolicy {
    fn default() -> Self {
        Self {
            reference_year: chrono::Local::now().year(),
            threshold_years: 100,
            treatment: LivingTreatment::Obfuscate,
            display_name: "Living".to_string(),
            hide_birth_date: true,
            hide_birth_place: true,
            hide_occupation: false,
        }
    }
}

impl LivingPrivacyPolicy {
    pub fn is_presumed_living(&self, subject: &PrivacySubject<'_>) -> bool {
        if let Some(living) = subject.living {
            return living;
        }
        if subject.has_death_data || subject.death_year.is_some() {
            return false;
        }
        // No dates at all: treated as deceased.
        subject
            .birth_year
            .is_some_and(|birth| self.reference_year - birth < self.threshold_years)
    }
}

impl PrivacyPolicy for LivingPrivacyPolicy {
    fn evaluate(&self, subject: &PrivacySubject<'_>) -> Redaction {
        if !self.is_presumed_living(subject) {
            return Redaction::Show;
        }
        match self.treatment {
            LivingTreatment::Hide => Redaction::Hide,
            LivingTreatment::Obfuscate => Redaction::Obfuscate(Obfuscation {
                display_name: self.display_name.clone(),
                hide_birth_date: self.hide_birth_date,
                hide_birth_place: self.hide_birth_place,
                hide_occupation: self.hide_occupation,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LivingPrivacyPolicy, LivingTreatment, PrivacyPolicy, PrivacySubject, Redaction};

    fn subject(birth: Option<i32>, death: Option<i32>, living: Option<bool>) -> PrivacySubject<'static> {
        PrivacySubject {
            id: "I1",
            name: Some("Jane Doe"),
            birth_year: birth,
            death_year: death,
            has_death_data: death.is_some(),
            living,
        }
    }

    fn policy() -> LivingPrivacyPolicy {
        LivingPrivacyPolicy {
            reference_year: 2024,
            ..LivingPrivacyPolicy::default()
        }
    }

    #[test]
    fn recent_birth_without_death_is_living() {
        assert!(matches!(
            policy().evaluate(&subject(Some(1980), None, None)),
            Redaction::Obfuscate(_)
        ));
        assert_eq!(policy().evaluate(&subject(Some(1980), Some(2001), None)), Redaction::Show);
        assert_eq!(policy().evaluate(&subject(Some(1850), None, None)), Redaction::Show);
        assert_eq!(policy().evaluate(&subject(None, None, None)), Redaction::Show);
    }

    #[test]
    fn explicit_flag_and_hide_treatment() {
        let policy = LivingPrivacyPolicy {
            treatment: LivingTreatment::Hide,
            ..policy()
        };
        assert_eq!(policy.evaluate(&subject(None, None, Some(true))), Redaction::Hide);
    }
}
