//! Tabular (CSV) reader.
//!
//! # Invariants
//! - The first record is the header; columns are matched by name and unknown
//!   columns are ignored.
//! - Quoting follows RFC 4180; an unterminated quote is a document error that
//!   names the line where the field started.
//! - Rows without an `id` get `R<row>` so parent and spouse columns can only
//!   reference rows that carry explicit ids.

use super::ImportError;
use crate::export::csv::{CsvColumn, MULTI_VALUE_SEPARATOR};
use crate::gedcom::link_graph;
use crate::model::graph::{Graph, Individual, Sex};
use crate::model::relations::synthesize_families;
use crate::model::GenDate;
use log::info;

/// One parsed record and the 1-based line it starts on.
type Record = (usize, Vec<String>);

/// Parses a delimited document into a linked graph.
pub fn read_csv(text: &str, delimiter: char) -> Result<Graph, ImportError> {
    if matches!(delimiter, '"' | '\n' | '\r') {
        return Err(ImportError::Csv {
            line: 1,
            message: format!("delimiter {delimiter:?} cannot be used"),
        });
    }
    let mut records = parse_records(text.trim_start_matches('\u{feff}'), delimiter)?.into_iter();
    let Some((_, header)) = records.next() else {
        return Err(ImportError::Csv {
            line: 1,
            message: "missing header row".to_string(),
        });
    };
    let columns: Vec<Option<CsvColumn>> = header
        .iter()
        .map(|name| CsvColumn::from_header(name))
        .collect();
    if !columns.iter().flatten().any(|column| {
        matches!(column, CsvColumn::Name | CsvColumn::GivenName | CsvColumn::Surname)
    }) {
        return Err(ImportError::Csv {
            line: 1,
            message: "header has no name column".to_string(),
        });
    }

    let mut graph = Graph::new();
    let mut rows = 0usize;
    for (index, (line, values)) in records.enumerate() {
        let mut person = Individual::new(format!("R{}", index + 1));
        for (column, value) in columns.iter().zip(values.iter()) {
            let (Some(column), value) = (column, value.trim()) else {
                continue;
            };
            if value.is_empty() {
                continue;
            }
            apply_cell(&mut person, *column, value);
        }
        if graph.individuals.contains_key(&person.id) {
            return Err(ImportError::Csv {
                line,
                message: format!("duplicate id {}", person.id),
            });
        }
        graph.insert_individual(person);
        rows += 1;
    }

    let synthesized = synthesize_families(&mut graph);
    let link = link_graph(&mut graph);
    info!(
        "event=read_csv module=import status=ok rows={} columns={} families={} parents_set={}",
        rows,
        columns.iter().flatten().count(),
        synthesized,
        link.parents_set
    );
    Ok(graph)
}

fn apply_cell(person: &mut Individual, column: CsvColumn, value: &str) {
    let text = Some(value.to_string());
    match column {
        CsvColumn::Id => {
            person.id = value.to_string();
            person.external_id = text;
        }
        CsvColumn::Name => person.name = text,
        CsvColumn::GivenName => person.given_name = text,
        CsvColumn::Surname => person.surname = text,
        CsvColumn::Sex => person.sex = Sex::from_code(value),
        CsvColumn::BirthDate => person.birth_date = Some(GenDate::parse(value)),
        CsvColumn::BirthPlace => person.birth_place = text,
        CsvColumn::DeathDate => person.death_date = Some(GenDate::parse(value)),
        CsvColumn::DeathPlace => person.death_place = text,
        CsvColumn::Occupation => person.occupation = text,
        CsvColumn::FatherId => person.father = text,
        CsvColumn::MotherId => person.mother = text,
        CsvColumn::SpouseIds => {
            for spouse in value.split(MULTI_VALUE_SEPARATOR.trim()) {
                let spouse = spouse.trim();
                if !spouse.is_empty() {
                    person.add_spouse(spouse);
                }
            }
        }
        CsvColumn::Collection => person.collection = text,
        CsvColumn::FilePath => person.file_path = text,
        // Names of related rows are derived from their ids.
        CsvColumn::FatherName | CsvColumn::MotherName | CsvColumn::SpouseNames => {}
    }
}

fn parse_records(text: &str, delimiter: char) -> Result<Vec<Record>, ImportError> {
    let mut records: Vec<Record> = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut quote_line = 0usize;
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() => {
                in_quotes = true;
                quote_line = line;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                fields.push(std::mem::take(&mut field));
                push_record(&mut records, record_line, std::mem::take(&mut fields));
                line += 1;
                record_line = line;
            }
            c if c == delimiter => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    if in_quotes {
        return Err(ImportError::Csv {
            line: quote_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    if !field.is_empty() || !fields.is_empty() {
        fields.push(field);
        push_record(&mut records, record_line, fields);
    }
    Ok(records)
}

fn push_record(records: &mut Vec<Record>, line: usize, fields: Vec<String>) {
    let blank = fields.iter().all(|field| field.trim().is_empty());
    if !blank {
        records.push((line, fields));
    }
}
