//! Tabular (CSV) export engine.
//!
//! # Invariants
//! - Fields containing the delimiter, a quote or a line break are quoted and
//!   embedded quotes are doubled.
//! - Rows end with CRLF; multi-valued cells are joined with `"; "`.

use crate::export::{ExportContext, ExportError, ExportOutput, ExportResult, Prepared};
use crate::model::graph::{Graph, Individual};
use log::info;
use serde::{Deserialize, Serialize};

pub const MULTI_VALUE_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CsvColumn {
    Id,
    Name,
    GivenName,
    Surname,
    Sex,
    BirthDate,
    BirthPlace,
    DeathDate,
    DeathPlace,
    Occupation,
    FatherId,
    FatherName,
    MotherId,
    MotherName,
    SpouseIds,
    SpouseNames,
    Collection,
    FilePath,
}

impl CsvColumn {
    pub const ALL: [CsvColumn; 18] = [
        CsvColumn::Id,
        CsvColumn::Name,
        CsvColumn::GivenName,
        CsvColumn::Surname,
        CsvColumn::Sex,
        CsvColumn::BirthDate,
        CsvColumn::BirthPlace,
        CsvColumn::DeathDate,
        CsvColumn::DeathPlace,
        CsvColumn::Occupation,
        CsvColumn::FatherId,
        CsvColumn::FatherName,
        CsvColumn::MotherId,
        CsvColumn::MotherName,
        CsvColumn::SpouseIds,
        CsvColumn::SpouseNames,
        CsvColumn::Collection,
        CsvColumn::FilePath,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::GivenName => "given_name",
            Self::Surname => "surname",
            Self::Sex => "sex",
            Self::BirthDate => "birth_date",
            Self::BirthPlace => "birth_place",
            Self::DeathDate => "death_date",
            Self::DeathPlace => "death_place",
            Self::Occupation => "occupation",
            Self::FatherId => "father_id",
            Self::FatherName => "father_name",
            Self::MotherId => "mother_id",
            Self::MotherName => "mother_name",
            Self::SpouseIds => "spouse_ids",
            Self::SpouseNames => "spouse_names",
            Self::Collection => "collection",
            Self::FilePath => "file_path",
        }
    }

    pub fn from_header(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|column| column.header() == normalized)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvExportOptions {
    pub delimiter: char,
    pub include_header: bool,
    pub columns: Vec<CsvColumn>,
}

impl Default for CsvExportOptions {
    fn default() -> Self {
        Self {
            delimiter: ',',
            include_header: true,
            columns: CsvColumn::ALL.to_vec(),
        }
    }
}

/// Quotes one field when it contains `delimiter`, a quote or a line break.
pub fn escape_field(value: &str, delimiter: char) -> String {
    let needs_quotes = value
        .chars()
        .any(|c| c == delimiter || c == '"' || c == '\n' || c == '\r');
    if needs_quotes {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Writes one row per included individual.
pub fn export_csv(
    graph: &Graph,
    options: &CsvExportOptions,
    context: &ExportContext<'_>,
) -> ExportResult<ExportOutput> {
    if matches!(options.delimiter, '"' | '\n' | '\r') {
        return Err(ExportError::InvalidOption(format!(
            "delimiter {:?} cannot be used",
            options.delimiter
        )));
    }
    if options.columns.is_empty() {
        return Err(ExportError::InvalidOption("no columns selected".to_string()));
    }

    let prepared = Prepared::new(graph, context.privacy, &|candidate: &str| !candidate.is_empty());
    let mut out = String::new();
    let delimiter = options.delimiter.to_string();

    if options.include_header {
        let header: Vec<&str> = options.columns.iter().map(|column| column.header()).collect();
        out.push_str(&header.join(&delimiter));
        out.push_str("\r\n");
    }

    for person in &prepared.individuals {
        let cells: Vec<String> = options
            .columns
            .iter()
            .map(|column| escape_field(&cell(&prepared, person, *column), options.delimiter))
            .collect();
        out.push_str(&cells.join(&delimiter));
        out.push_str("\r\n");
    }

    info!(
        "event=export module=export status=ok format=csv rows={} columns={} redacted={} hidden={}",
        prepared.individuals.len(),
        options.columns.len(),
        prepared.stats.redacted,
        prepared.stats.hidden
    );
    Ok(ExportOutput {
        text: out,
        stats: prepared.stats,
    })
}

fn cell(prepared: &Prepared<'_>, person: &Individual, column: CsvColumn) -> String {
    let obfuscation = prepared.obfuscation(&person.id);
    let obfuscated = obfuscation.is_some();
    let text = |value: &Option<String>| value.clone().unwrap_or_default();

    match column {
        CsvColumn::Id => prepared.individual_id(&person.id).unwrap_or_default().to_string(),
        CsvColumn::Name => prepared.display_name(person),
        CsvColumn::GivenName if obfuscated => String::new(),
        CsvColumn::GivenName => text(&person.given_name),
        CsvColumn::Surname if obfuscated => String::new(),
        CsvColumn::Surname => text(&person.surname),
        CsvColumn::Sex => person.sex.gedcom_code().to_string(),
        CsvColumn::BirthDate if obfuscation.is_some_and(|o| o.hide_birth_date) => String::new(),
        CsvColumn::BirthDate => person
            .birth_date
            .as_ref()
            .map(|date| date.to_gedcom())
            .unwrap_or_default(),
        CsvColumn::BirthPlace if obfuscation.is_some_and(|o| o.hide_birth_place) => String::new(),
        CsvColumn::BirthPlace => text(&person.birth_place),
        CsvColumn::DeathDate => person
            .death_date
            .as_ref()
            .map(|date| date.to_gedcom())
            .unwrap_or_default(),
        CsvColumn::DeathPlace => text(&person.death_place),
        CsvColumn::Occupation if obfuscation.is_some_and(|o| o.hide_occupation) => String::new(),
        CsvColumn::Occupation => text(&person.occupation),
        CsvColumn::FatherId => related(prepared, person.father.as_deref())
            .map(|(_, export)| export.to_string())
            .unwrap_or_default(),
        CsvColumn::FatherName => related(prepared, person.father.as_deref())
            .map(|(id, _)| related_name(prepared, id))
            .unwrap_or_default(),
        CsvColumn::MotherId => related(prepared, person.mother.as_deref())
            .map(|(_, export)| export.to_string())
            .unwrap_or_default(),
        CsvColumn::MotherName => related(prepared, person.mother.as_deref())
            .map(|(id, _)| related_name(prepared, id))
            .unwrap_or_default(),
        CsvColumn::SpouseIds => person
            .spouses
            .iter()
            .filter_map(|id| prepared.individual_id(id))
            .collect::<Vec<_>>()
            .join(MULTI_VALUE_SEPARATOR),
        CsvColumn::SpouseNames => person
            .spouses
            .iter()
            .filter(|id| prepared.individual_id(id).is_some())
            .map(|id| related_name(prepared, id))
            .collect::<Vec<_>>()
            .join(MULTI_VALUE_SEPARATOR),
        CsvColumn::Collection => text(&person.collection),
        CsvColumn::FilePath => text(&person.file_path),
    }
}

/// Graph id and export id of an included relative.
fn related<'p>(prepared: &'p Prepared<'_>, id: Option<&'p str>) -> Option<(&'p str, &'p str)> {
    let id = id?;
    prepared.individual_id(id).map(|export| (id, export))
}

fn related_name(prepared: &Prepared<'_>, id: &str) -> String {
    prepared
        .graph
        .individuals
        .get(id)
        .map(|person| prepared.display_name(person))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{escape_field, export_csv, CsvColumn, CsvExportOptions};
    use crate::export::{ExportContext, ExportError};
    use crate::model::graph::{Graph, Individual};

    #[test]
    fn escape_quotes_fields_with_special_characters() {
        assert_eq!(escape_field("plain", ','), "plain");
        assert_eq!(escape_field("a,\"b\"", ','), "\"a,\"\"b\"\"\"");
        assert_eq!(escape_field("line\nbreak", ';'), "\"line\nbreak\"");
        assert_eq!(escape_field("a,b", ';'), "a,b");
    }

    #[test]
    fn rows_resolve_parent_and_spouse_columns() {
        let mut graph = Graph::new();
        let mut father = Individual::new("p1");
        father.name = Some("John Smith".to_string());
        father.spouses.push("p3".to_string());
        graph.insert_individual(father);
        let mut child = Individual::new("p2");
        child.name = Some("Ann Smith".to_string());
        child.father = Some("p1".to_string());
        graph.insert_individual(child);
        let mut wife = Individual::new("p3");
        wife.name = Some("Mary, Jones".to_string());
        graph.insert_individual(wife);

        let options = CsvExportOptions {
            columns: vec![
                CsvColumn::Id,
                CsvColumn::Name,
                CsvColumn::FatherName,
                CsvColumn::SpouseNames,
            ],
            ..CsvExportOptions::default()
        };
        let output = export_csv(&graph, &options, &ExportContext::default()).unwrap();
        let rows: Vec<&str> = output.text.split("\r\n").collect();
        assert_eq!(rows[0], "id,name,father_name,spouse_names");
        assert_eq!(rows[1], "I1,John Smith,,\"Mary, Jones\"");
        assert_eq!(rows[2], "I2,Ann Smith,John Smith,");
        assert_eq!(rows[3], "I3,\"Mary, Jones\",,");
        assert_eq!(rows[4], "");
    }

    #[test]
    fn quote_delimiter_is_rejected() {
        let options = CsvExportOptions {
            delimiter: '"',
            ..CsvExportOptions::default()
        };
        let result = export_csv(&Graph::new(), &options, &ExportContext::default());
        assert!(matches!(result, Err(ExportError::InvalidOption(_))));
    }

    #[test]
    fn header_names_round_trip() {
        for column in CsvColumn::ALL {
            assert_eq!(CsvColumn::from_header(column.header()), Some(column));
        }
        assert_eq!(CsvColumn::from_header("Birth Date"), Some(CsvColumn::BirthDate));
    }
}
