use rootline_core::db::open_db_in_memory;
use rootline_core::repo::{StoreError, StoreResult};
use rootline_core::{
    export_gedcom, import_csv, import_gedcom, load_graph, ExportContext, GedcomExportOptions,
    ImportOptions, NoAliases, NoteDocument, NoteKind, NoteStore, SqliteNoteStore,
    StorePlaceHierarchy,
};
use std::collections::BTreeMap;

const DOCUMENT: &str = "0 HEAD\n1 GEDC\n2 VERS 5.5.1\n1 CHAR UTF-8\n\
0 @I1@ INDI\n1 NAME John /Smith/\n1 SEX M\n1 BIRT\n2 DATE 1850\n2 PLAC Boston, Suffolk, Massachusetts\n\
2 SOUR @S1@\n1 FAMS @F1@\n\
0 @I2@ INDI\n1 NAME Mary /Jones/\n1 SEX F\n1 FAMS @F1@\n\
0 @I3@ INDI\n1 NAME John /Smith/\n1 SEX M\n1 BIRT\n2 DATE 1880\n1 FAMC @F1@\n\
0 @F1@ FAM\n1 HUSB @I1@\n1 WIFE @I2@\n1 CHIL @I3@\n1 MARR\n2 DATE 1878\n\
0 @S1@ SOUR\n1 TITL Parish register\n\
0 TRLR\n";

/// In-memory store that refuses to create one path.
#[derive(Default)]
struct RefusingStore {
    documents: BTreeMap<String, NoteDocument>,
    refused_path: String,
}

impl NoteStore for RefusingStore {
    fn create(&mut self, document: &NoteDocument) -> StoreResult<()> {
        if document.path == self.refused_path {
            return Err(StoreError::InvalidData("disk full".to_string()));
        }
        if self.documents.contains_key(&document.path) {
            return Err(StoreError::AlreadyExists(document.path.clone()));
        }
        self.documents
            .insert(document.path.clone(), document.clone());
        Ok(())
    }

    fn read(&self, path: &str) -> StoreResult<Option<NoteDocument>> {
        Ok(self.documents.get(path).cloned())
    }

    fn modify(&mut self, document: &NoteDocument) -> StoreResult<()> {
        match self.documents.get_mut(&document.path) {
            Some(existing) => {
                *existing = document.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(document.path.clone())),
        }
    }

    fn exists(&self, path: &str) -> StoreResult<bool> {
        Ok(self.documents.contains_key(path))
    }

    fn list_all(&self) -> StoreResult<Vec<NoteDocument>> {
        Ok(self.documents.values().cloned().collect())
    }
}

#[test]
fn import_writes_every_record_kind_and_links_them() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteNoteStore::new(&conn);
    let result = import_gedcom(
        DOCUMENT,
        &mut store,
        &ImportOptions::default(),
        &NoAliases,
        None,
    )
    .unwrap();

    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.counts.individuals, 3);
    assert_eq!(result.counts.sources, 1);
    assert_eq!(result.counts.places, 3);
    assert_eq!(result.counts.events, 3);
    assert_eq!(result.counts.references_unresolved, 0);
    assert_eq!(store.count(NoteKind::Person).unwrap(), 3);

    let father = store.read("People/John Smith.md").unwrap().unwrap();
    let son = store.read("People/John Smith (2).md").unwrap().unwrap();
    assert_eq!(son.text("father_id"), father.record_id());
    assert_eq!(son.text("external_id"), Some("I3"));

    let boston = store.read("Places/Boston.md").unwrap().unwrap();
    let suffolk = store.read("Places/Suffolk.md").unwrap().unwrap();
    assert_eq!(boston.text("parent_place_id"), suffolk.record_id());
    assert_eq!(father.text("birth_place_id"), boston.record_id());

    let source = store.read("Sources/Parish register.md").unwrap().unwrap();
    let birth = store
        .list_all()
        .unwrap()
        .into_iter()
        .find(|document| document.path == "Events/Birth of John Smith.md")
        .unwrap();
    assert_eq!(birth.texts("source_id"), vec![source.record_id().unwrap()]);
}

#[test]
fn store_reads_back_into_an_exportable_graph() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteNoteStore::new(&conn);
    import_gedcom(
        DOCUMENT,
        &mut store,
        &ImportOptions::default(),
        &NoAliases,
        None,
    )
    .unwrap();

    let graph = load_graph(&store, &NoAliases).unwrap();
    assert_eq!(graph.individuals.len(), 3);
    let son = graph
        .individuals
        .values()
        .find(|person| person.external_id.as_deref() == Some("I3"))
        .unwrap();
    let father = graph.individuals[son.father.as_deref().unwrap()].clone();
    assert_eq!(father.external_id.as_deref(), Some("I1"));
    assert_eq!(father.birth_year(), Some(1850));
    let family = graph
        .families
        .values()
        .find(|family| family.children.contains(&son.id))
        .unwrap();
    assert_eq!(family.marriage_year(), Some(1878));

    let places = StorePlaceHierarchy::load(&store).unwrap();
    let context = ExportContext {
        privacy: None,
        places: Some(&places),
    };
    let output = export_gedcom(&graph, &GedcomExportOptions::default(), &context).unwrap();
    assert!(output.text.contains("0 @I1@ INDI\n1 NAME John /Smith/\n"));
    assert!(output.text.contains("0 @I3@ INDI\n"));
    assert_eq!(output.stats.individuals, 3);
    assert_eq!(output.stats.families, 1);
}

#[test]
fn failed_records_are_reported_without_aborting() {
    let mut store = RefusingStore {
        refused_path: "People/Mary Jones.md".to_string(),
        ..RefusingStore::default()
    };
    let result = import_gedcom(
        DOCUMENT,
        &mut store,
        &ImportOptions::default(),
        &NoAliases,
        None,
    )
    .unwrap();

    assert!(!result.success);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].record, "Mary Jones (I2)");
    assert!(result.errors[0].message.contains("disk full"));
    assert_eq!(result.counts.individuals, 2);
    assert_eq!(result.counts.references_unresolved, 3);
    assert_eq!(result.warnings.len(), 3);

    // Nothing points at the missing person, not even a placeholder.
    for document in store.list_all().unwrap() {
        let properties = serde_json::to_string(&document.properties).unwrap();
        assert!(!properties.contains("@I2@"), "{}", document.path);
    }
    let husband = store.read("People/John Smith.md").unwrap().unwrap();
    assert!(husband.texts("spouse_id").is_empty());
}

#[test]
fn csv_rows_import_as_people() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteNoteStore::new(&conn);
    let text = "id,name,sex,father_id\nA1,Jane Doe,F,\nA2,Jim Doe,M,A1\n";
    let options = ImportOptions {
        create_event_notes: false,
        ..ImportOptions::default()
    };
    let result = import_csv(text, &mut store, &options, &NoAliases, None).unwrap();
    assert!(result.success, "{:?}", result.errors);
    assert_eq!(result.counts.individuals, 2);
    let jim = store.read("People/Jim Doe.md").unwrap().unwrap();
    let jane = store.read("People/Jane Doe.md").unwrap().unwrap();
    assert_eq!(jim.text("father_id"), jane.record_id());
}

#[test]
fn document_errors_abort_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let mut store = SqliteNoteStore::new(&conn);
    let result = import_csv(
        "name\n\"unterminated\n",
        &mut store,
        &ImportOptions::default(),
        &NoAliases,
        None,
    );
    assert!(result.is_err());
    assert!(store.list_all().unwrap().is_empty());
}
