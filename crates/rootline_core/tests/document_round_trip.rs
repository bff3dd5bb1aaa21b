use rootline_core::export::privacy::LivingTreatment;
use rootline_core::import::{read_csv, read_gedcomx};
use rootline_core::{
    export_csv, export_gedcom, export_gedcomx, parse_document, CsvExportOptions, ExportContext,
    GedcomExportOptions, GedcomxExportOptions, Graph, LivingPrivacyPolicy, ParseOptions,
    PreprocessMode, PrivacyPolicy,
};

const FAMILY: &str = "0 HEAD\n1 SOUR TEST\n1 GEDC\n2 VERS 5.5.1\n1 CHAR UTF-8\n\
0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n1 BIRT\n2 DATE 15 MAR 1850\n2 PLAC Boston, Massachusetts\n\
1 DEAT\n2 DATE ABT 1920\n1 OCCU Farmer, retired\n1 FAMS @F1@\n\
0 @I2@ INDI\n1 NAME Mary /Jones/\n1 SEX F\n1 BIRT\n2 DATE 1855\n1 FAMS @F1@\n\
0 @I3@ INDI\n1 NAME Ann /Smith/\n1 SEX F\n1 BIRT\n2 DATE 1880\n1 DEAT\n2 DATE 1950\n1 FAMC @F1@\n\
0 @I4@ INDI\n1 NAME Tom /Smith/\n1 SEX M\n1 BIRT\n2 DATE 1990\n2 PLAC Boston, Massachusetts\n1 FAMC @F1@\n\
0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n1 CHIL @I4@\n1 MARR\n2 DATE 1878\n2 PLAC Boston, Massachusetts\n\
0 TRLR\n";

fn parse(text: &str) -> Graph {
    parse_document(text, &ParseOptions::default()).unwrap().graph
}

fn assert_same_people(original: &Graph, reread: &Graph) {
    assert_eq!(reread.individuals.len(), original.individuals.len());
    for (id, person) in &original.individuals {
        let copy = &reread.individuals[id];
        assert_eq!(copy.display_name(), person.display_name(), "name of {id}");
        assert_eq!(copy.sex, person.sex, "sex of {id}");
        assert_eq!(copy.birth_year(), person.birth_year(), "birth of {id}");
        assert_eq!(copy.death_year(), person.death_year(), "death of {id}");
        assert_eq!(copy.father, person.father, "father of {id}");
        assert_eq!(copy.mother, person.mother, "mother of {id}");
    }
}

#[test]
fn text_export_round_trips_people_and_families() {
    let original = parse(FAMILY);
    let output =
        export_gedcom(&original, &GedcomExportOptions::default(), &ExportContext::default())
            .unwrap();
    assert_eq!(output.stats.individuals, 4);
    assert_eq!(output.stats.families, 1);

    let reread = parse(&output.text);
    assert_same_people(&original, &reread);
    assert_eq!(reread.individuals["I4"].father.as_deref(), Some("I1"));
    assert_eq!(
        reread.individuals["I1"].birth_place.as_deref(),
        Some("Boston, Massachusetts")
    );
    assert_eq!(
        reread.individuals["I1"].occupation.as_deref(),
        Some("Farmer, retired")
    );
    let family = reread
        .families
        .values()
        .find(|family| family.children.contains(&"I3".to_string()))
        .unwrap();
    assert_eq!(family.marriage_year(), Some(1878));
}

#[test]
fn json_export_round_trips_people_and_lineage() {
    let original = parse(FAMILY);
    let output =
        export_gedcomx(&original, &GedcomxExportOptions::default(), &ExportContext::default())
            .unwrap();
    let reread = read_gedcomx(&output.text).unwrap();
    assert_same_people(&original, &reread);
}

#[test]
fn csv_export_escapes_fields_and_reads_back() {
    let original = parse(FAMILY);
    let output =
        export_csv(&original, &CsvExportOptions::default(), &ExportContext::default()).unwrap();
    assert!(output.text.contains("\"Boston, Massachusetts\""));
    assert!(output.text.contains("\"Farmer, retired\""));

    let reread = read_csv(&output.text, ',').unwrap();
    assert_same_people(&original, &reread);
    assert_eq!(
        reread.individuals["I1"].occupation.as_deref(),
        Some("Farmer, retired")
    );
}

#[test]
fn privacy_obfuscates_living_people_in_every_format() {
    let graph = parse(FAMILY);
    let policy = LivingPrivacyPolicy {
        reference_year: 2024,
        ..LivingPrivacyPolicy::default()
    };
    let context = ExportContext {
        privacy: Some(&policy as &dyn PrivacyPolicy),
        places: None,
    };

    let text = export_gedcom(&graph, &GedcomExportOptions::default(), &context).unwrap();
    assert_eq!(text.stats.redacted, 1);
    assert!(!text.text.contains("Tom"));
    assert!(!text.text.contains("1990"));

    let json = export_gedcomx(&graph, &GedcomxExportOptions::default(), &context).unwrap();
    assert!(!json.text.contains("Tom"));
    assert!(!json.text.contains("1990"));

    let csv = export_csv(&graph, &CsvExportOptions::default(), &context).unwrap();
    let tom_row = csv
        .text
        .split("\r\n")
        .find(|row| row.starts_with("I4,"))
        .unwrap();
    assert!(tom_row.starts_with("I4,Living,"));
    assert!(!tom_row.contains("1990"));
}

#[test]
fn hidden_people_are_left_out_of_relationships() {
    let graph = parse(FAMILY);
    let policy = LivingPrivacyPolicy {
        reference_year: 2024,
        treatment: LivingTreatment::Hide,
        ..LivingPrivacyPolicy::default()
    };
    let context = ExportContext {
        privacy: Some(&policy as &dyn PrivacyPolicy),
        places: None,
    };
    let output = export_gedcom(&graph, &GedcomExportOptions::default(), &context).unwrap();
    assert_eq!(output.stats.hidden, 1);
    assert_eq!(output.stats.individuals, 3);
    assert!(!output.text.contains("@I4@"));

    let reread = parse(&output.text);
    assert_eq!(reread.individuals.len(), 3);
    assert_eq!(reread.individuals["I3"].father.as_deref(), Some("I1"));
}

#[test]
fn vendor_quirks_are_repaired_before_parsing() {
    let text = "\u{feff}0 HEAD\n1 SOUR MYHERITAGE\n0 @I1@ INDI\n1 NAME Jane /Doe/\n\
                1 NOTE First&amp;lt;br&amp;gt;Sec\n2 CONC ond\n0 TRLR\n";
    let outcome = parse_document(text, &ParseOptions::default()).unwrap();
    assert!(outcome.preprocess.applied);
    assert!(outcome.preprocess.bom_removed);
    assert_eq!(outcome.preprocess.continuations_joined, 1);
    let jane = &outcome.graph.individuals["I1"];
    assert_eq!(jane.notes, vec!["First\nSecond".to_string()]);

    let untouched = parse_document(
        text,
        &ParseOptions {
            preprocess: PreprocessMode::Off,
        },
    );
    if let Ok(outcome) = untouched {
        assert!(!outcome.preprocess.applied);
    }
}
