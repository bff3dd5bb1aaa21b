//! Quality checks over a finalized graph.

use crate::model::graph::{EventKind, Family, Graph, Individual, Sex};
use crate::quality::fixes::FixChoices;
use crate::quality::places::detect_variants;
use crate::quality::{IssueCode, QualityIssue, QualityReport, QualitySummary, RecordKind};
use chrono::Datelike;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerOptions {
    /// Year used for "future" and "very old" checks.
    pub reference_year: i32,
    /// Age beyond which an individual without death data is flagged.
    pub max_lifespan_years: i32,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            reference_year: chrono::Local::now().year(),
            max_lifespan_years: 120,
        }
    }
}

/// Runs every check and builds the summary.
pub fn analyze(graph: &Graph, options: &AnalyzerOptions) -> QualityReport {
    let mut issues = Vec::new();
    for id in graph.individual_ids() {
        if let Some(person) = graph.individuals.get(&id) {
            check_individual_dates(person, options, &mut issues);
            check_individual_data(person, &mut issues);
            check_individual_references(graph, person, &mut issues);
        }
    }
    for id in graph.family_ids() {
        if let Some(family) = graph.families.get(&id) {
            check_family(graph, family, &mut issues);
        }
    }
    check_parent_families(graph, &mut issues);

    let place_variants = detect_variants(graph);
    for variant in &place_variants {
        let first_record = variant.records.iter().next().cloned().unwrap_or_default();
        let kind = if graph.families.contains_key(&first_record) {
            RecordKind::Family
        } else {
            RecordKind::Individual
        };
        issues.push(
            QualityIssue::new(
                IssueCode::NonStandardPlace,
                kind,
                &first_record,
                format!(
                    "Place component \"{}\" could be standardized to \"{}\"",
                    variant.variant, variant.canonical
                ),
            )
            .detail("variant", &variant.variant)
            .detail("canonical", &variant.canonical)
            .detail("count", variant.count)
            .detail("records", variant.records.len()),
        );
    }

    let mut summary = QualitySummary {
        total: issues.len(),
        ..QualitySummary::default()
    };
    for issue in &issues {
        *summary.by_severity.entry(issue.severity).or_default() += 1;
        *summary.by_category.entry(issue.category).or_default() += 1;
    }
    summary.default_fixes = FixChoices::defaults_for(&issues, &place_variants);
    summary.place_variants = place_variants;

    info!(
        "event=analyze module=quality status=ok individuals={} families={} issues={}",
        graph.individuals.len(),
        graph.families.len(),
        summary.total
    );
    QualityReport { issues, summary }
}

fn check_individual_dates(person: &Individual, options: &AnalyzerOptions, issues: &mut Vec<QualityIssue>) {
    let birth = person.birth_year();
    let death = person.death_year();
    let issue = |code, message: String| {
        QualityIssue::new(code, RecordKind::Individual, &person.id, message)
    };

    if let (Some(birth), Some(death)) = (birth, death) {
        if death < birth {
            issues.push(
                issue(
                    IssueCode::DeathBeforeBirth,
                    format!("Death year {death} is before birth year {birth}"),
                )
                .detail("birth_year", birth)
                .detail("death_year", death),
            );
        }
    }

    if let Some(birth) = birth {
        if birth > options.reference_year {
            issues.push(
                issue(IssueCode::FutureBirth, format!("Birth year {birth} is in the future"))
                    .detail("birth_year", birth),
            );
        }
        let age = options.reference_year - birth;
        if age > options.max_lifespan_years && !person.has_death_data() {
            issues.push(
                issue(
                    IssueCode::MissingDeath,
                    format!("Born {age} years ago with no death information"),
                )
                .detail("birth_year", birth)
                .detail("age", age),
            );
        }
    }

    for event in &person.events {
        // Birth against death is already covered by `DeathBeforeBirth`.
        if matches!(event.kind, EventKind::Birth | EventKind::Death) {
            continue;
        }
        let Some(year) = event.year() else {
            continue;
        };
        if let Some(birth) = birth {
            if year < birth {
                issues.push(
                    issue(
                        IssueCode::EventBeforeBirth,
                        format!("{} in {year} is before birth in {birth}", event.kind.as_str()),
                    )
                    .detail("event", event.kind.as_str())
                    .detail("event_year", year)
                    .detail("birth_year", birth),
                );
            }
        }
        if let Some(death) = death {
            if !event.kind.is_post_mortem() && year > death {
                issues.push(
                    issue(
                        IssueCode::EventAfterDeath,
                        format!("{} in {year} is after death in {death}", event.kind.as_str()),
                    )
                    .detail("event", event.kind.as_str())
                    .detail("event_year", year)
                    .detail("death_year", death),
                );
            }
        }
    }
}

fn check_individual_data(person: &Individual, issues: &mut Vec<QualityIssue>) {
    if !person.has_name() {
        issues.push(QualityIssue::new(
            IssueCode::MissingName,
            RecordKind::Individual,
            &person.id,
            "Individual has no name",
        ));
    }
    if person.sex == Sex::Unknown {
        issues.push(QualityIssue::new(
            IssueCode::UnknownSex,
            RecordKind::Individual,
            &person.id,
            "Sex is not recorded",
        ));
    }
    let has_dates = person.birth_date.is_some()
        || person.death_date.is_some()
        || person.events.iter().any(|event| event.date.is_some());
    if !has_dates {
        issues.push(QualityIssue::new(
            IssueCode::NoDates,
            RecordKind::Individual,
            &person.id,
            "Individual has no dated events",
        ));
    }
}

fn check_individual_references(graph: &Graph, person: &Individual, issues: &mut Vec<QualityIssue>) {
    let people = person
        .father
        .iter()
        .map(|id| ("father", id))
        .chain(person.mother.iter().map(|id| ("mother", id)))
        .chain(person.parent_links.iter().map(|link| ("parent", &link.parent)))
        .chain(person.spouses.iter().map(|id| ("spouse", id)))
        .chain(person.associations.iter().map(|asso| ("association", &asso.target)));
    for (field, target) in people {
        if !graph.individuals.contains_key(target) {
            issues.push(dangling(RecordKind::Individual, &person.id, field, target));
        }
    }
    let families = person
        .families_as_child
        .iter()
        .map(|link| ("family_as_child", &link.family))
        .chain(person.families_as_spouse.iter().map(|id| ("family_as_spouse", id)));
    for (field, target) in families {
        if !graph.families.contains_key(target) {
            issues.push(dangling(RecordKind::Individual, &person.id, field, target));
        }
    }
}

fn check_family(graph: &Graph, family: &Family, issues: &mut Vec<QualityIssue>) {
    let issue = |code, message: String| QualityIssue::new(code, RecordKind::Family, &family.id, message);

    if family.is_empty() {
        issues.push(issue(IssueCode::EmptyFamily, "Family has no members".to_string()));
        return;
    }

    let members = family
        .husband
        .iter()
        .map(|id| ("husband", id))
        .chain(family.wife.iter().map(|id| ("wife", id)))
        .chain(family.unordered_partners.iter().map(|id| ("partner", id)))
        .chain(family.children.iter().map(|id| ("child", id)));
    for (field, target) in members {
        if !graph.individuals.contains_key(target) {
            issues.push(dangling(RecordKind::Family, &family.id, field, target));
        }
    }

    let husband = family.husband.as_deref().and_then(|id| graph.individual(id));
    let wife = family.wife.as_deref().and_then(|id| graph.individual(id));
    if let Some(husband) = husband.filter(|person| person.sex == Sex::Female) {
        issues.push(
            issue(IssueCode::HusbandFemale, "Husband is recorded as female".to_string())
                .detail("individual", &husband.id),
        );
    }
    if let Some(wife) = wife.filter(|person| person.sex == Sex::Male) {
        issues.push(
            issue(IssueCode::WifeMale, "Wife is recorded as male".to_string())
                .detail("individual", &wife.id),
        );
    }

    let marriage_year = family.marriage_year();
    for child in family.children.iter().filter_map(|id| graph.individual(id)) {
        let Some(child_birth) = child.birth_year() else {
            continue;
        };
        for parent in [husband, wife].into_iter().flatten() {
            let Some(parent_birth) = parent.birth_year() else {
                continue;
            };
            if parent_birth >= child_birth {
                issues.push(
                    issue(
                        IssueCode::ParentYoungerThanChild,
                        format!(
                            "Parent born {parent_birth} is not older than child born {child_birth}"
                        ),
                    )
                    .detail("parent", &parent.id)
                    .detail("child", &child.id)
                    .detail("parent_birth_year", parent_birth)
                    .detail("child_birth_year", child_birth),
                );
            }
        }
        if let Some(marriage) = marriage_year {
            if child_birth < marriage {
                issues.push(
                    issue(
                        IssueCode::ChildBeforeMarriage,
                        format!("Child born {child_birth} before marriage in {marriage}"),
                    )
                    .detail("child", &child.id)
                    .detail("marriage_year", marriage),
                );
            }
        }
    }
}

fn check_parent_families(graph: &Graph, issues: &mut Vec<QualityIssue>) {
    let mut claims: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for family in graph.families.values() {
        for child in &family.children {
            claims.entry(child.as_str()).or_default().push(family.id.as_str());
        }
    }
    for id in graph.individual_ids() {
        let Some(families) = claims.get(id.as_str()).filter(|families| families.len() > 1) else {
            continue;
        };
        issues.push(
            QualityIssue::new(
                IssueCode::MultipleParentFamilies,
                RecordKind::Individual,
                &id,
                format!("Child is listed in {} families", families.len()),
            )
            .detail("families", families.join(",")),
        );
    }
}

fn dangling(kind: RecordKind, record: &str, field: &str, target: &str) -> QualityIssue {
    QualityIssue::new(
        IssueCode::DanglingReference,
        kind,
        record,
        format!("{field} reference points at missing record {target}"),
    )
    .detail("field", field)
    .detail("target", target)
}

#[cfg(test)]
mod tests {
    use super::{analyze, AnalyzerOptions};
    use crate::model::graph::{Family, Graph, Individual, Sex};
    use crate::model::GenDate;
    use crate::quality::{IssueCode, Severity};

    fn options() -> AnalyzerOptions {
        AnalyzerOptions {
            reference_year: 2024,
            max_lifespan_years: 120,
        }
    }

    fn person(id: &str, sex: Sex, birth: Option<&str>) -> Individual {
        let mut person = Individual::new(id);
        person.name = Some(format!("Person {id}"));
        person.sex = sex;
        person.birth_date = birth.map(GenDate::parse);
        person
    }

    #[test]
    fn flags_future_birth_and_missing_death() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Male, Some("2090")));
        graph.insert_individual(person("I2", Sex::Female, Some("1850")));
        let report = analyze(&graph, &options());
        assert_eq!(report.count(IssueCode::FutureBirth), 1);
        assert_eq!(report.count(IssueCode::MissingDeath), 1);
        assert!(!report.has_errors());
    }

    #[test]
    fn role_and_marriage_checks() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Female, Some("1900")));
        graph.insert_individual(person("I2", Sex::Male, Some("1902")));
        graph.insert_individual(person("I3", Sex::Male, Some("1920")));
        let mut family = Family::new("F1");
        family.husband = Some("I1".to_string());
        family.wife = Some("I2".to_string());
        family.children.push("I3".to_string());
        family.marriage_date = Some(GenDate::parse("1925"));
        graph.insert_family(family);
        graph.insert_family(Family::new("F2"));

        let report = analyze(&graph, &options());
        assert_eq!(report.count(IssueCode::HusbandFemale), 1);
        assert_eq!(report.count(IssueCode::WifeMale), 1);
        assert_eq!(report.count(IssueCode::ChildBeforeMarriage), 1);
        assert_eq!(report.count(IssueCode::EmptyFamily), 1);
        assert_eq!(report.summary.default_fixes.skip_families, vec!["F2".to_string()]);
    }

    #[test]
    fn dangling_and_multiply_claimed_children() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Male, None));
        let mut first = Family::new("F1");
        first.husband = Some("I9".to_string());
        first.children.push("I1".to_string());
        let mut second = Family::new("F2");
        second.children.push("I1".to_string());
        graph.insert_family(first);
        graph.insert_family(second);

        let report = analyze(&graph, &options());
        assert_eq!(report.count(IssueCode::DanglingReference), 1);
        assert_eq!(report.count(IssueCode::MultipleParentFamilies), 1);
        assert_eq!(report.summary.by_severity.get(&Severity::Error), Some(&1));
    }

    #[test]
    fn dangling_unordered_partner_is_reported() {
        let mut graph = Graph::new();
        graph.insert_individual(person("I1", Sex::Unknown, None));
        let mut family = Family::new("F1");
        family.unordered_partners = vec!["I1".to_string(), "I8".to_string()];
        graph.insert_family(family);

        let report = analyze(&graph, &options());
        assert_eq!(report.count(IssueCode::DanglingReference), 1);
        assert_eq!(report.count(IssueCode::EmptyFamily), 0);
    }
}
