use std::sync::Arc;

use tempfile::TempDir;

use fieldsurvey::{
    blob::DirBlobStore,
    core::store::{StoreOptions, SubmissionStore},
    config::{Backend, SurveyConfig},
    persist::{TableSink, csv::CsvTableSink},
    questionnaire::{FieldSpec, Questionnaire, catalog::cotton_survey},
    session::FormSession,
    types::{LANGUAGE_COLUMN, PHOTO_COLUMN, TIMESTAMP_COLUMN},
};

fn questionnaire() -> Arc<Questionnaire> {
    Arc::new(cotton_survey().expect("catalog"))
}

fn fill(session: &mut FormSession, name: &str, village: &str) {
    for (id, value) in [
        ("surveyor_name", name),
        ("visit_date", "2025-07-04"),
        ("farmer_name", "Gopal, \"Senior\""),
        ("gender", "Male"),
        ("mobile_number", "9876543210"),
        ("village", village),
        ("farm_size", "2.5"),
        ("seed_treatment", "Yes"),
        ("expected_yield", "800"),
        ("selling_price", "7000"),
        ("annual_income", "150000"),
    ] {
        session.set_answer(id, value).expect("set");
    }
    session
        .set_answer("fertilizers_used", vec!["Urea", "DAP"])
        .expect("set");
}

fn open_store(dir: &TempDir) -> SubmissionStore {
    SubmissionStore::load(
        questionnaire(),
        Box::new(CsvTableSink::open(dir.path().join("responses/table.csv"))),
        Arc::new(DirBlobStore::new(dir.path().join("photos"))),
        StoreOptions::default(),
    )
}

#[test]
fn missing_file_loads_empty_without_warning() {
    let dir = TempDir::new().expect("tmp");
    let store = open_store(&dir);
    assert!(store.table().is_empty());
    assert!(store.load_warning().is_none());
    assert!(!store.table().columns().is_empty());
}

#[test]
fn appended_records_survive_reload() {
    let dir = TempDir::new().expect("tmp");
    let mut store = open_store(&dir);

    let mut first = store.new_session("en");
    fill(&mut first, "Asha", "Wardha");
    first.attach_blob("farm.png", vec![1, 2, 3], "image/png").expect("attach");
    first.advance().expect("valid");
    store.append(&mut first).expect("append");

    let mut second = store.new_session("hi");
    fill(&mut second, "Ravi", "Akola");
    second.advance().expect("valid");
    store.append(&mut second).expect("append");

    let original = store.table().clone();
    drop(store);

    let reloaded = open_store(&dir);
    assert!(reloaded.load_warning().is_none());
    assert_eq!(reloaded.table().columns(), original.columns());
    assert_eq!(reloaded.table().records(), original.records());

    let rec = reloaded.table().get(0).expect("row");
    assert_eq!(rec.value("Farmer Name").as_deref(), Some("Gopal, \"Senior\""));
    assert_eq!(rec.value("Fertilizer Used").as_deref(), Some("Urea, DAP"));
    assert!(rec.value(PHOTO_COLUMN).is_some());
    assert_eq!(rec.value(LANGUAGE_COLUMN).as_deref(), Some("en"));
}

#[test]
fn csv_text_starts_with_header_and_has_one_row_per_record() {
    let dir = TempDir::new().expect("tmp");
    let mut store = open_store(&dir);
    for name in ["A", "B", "C"] {
        let mut s = store.new_session("en");
        fill(&mut s, name, "Wardha");
        s.advance().expect("valid");
        store.append(&mut s).expect("append");
    }

    let path = dir.path().join("responses/table.csv");
    let mut reader = csv::Reader::from_path(&path).expect("reader");
    let header = reader.headers().expect("header").clone();
    assert_eq!(header.get(0), Some(TIMESTAMP_COLUMN));
    assert_eq!(reader.records().count(), 3);
    assert!(!dir.path().join("responses/table.csv.tmp").exists());
}

#[test]
fn deleted_file_degrades_to_empty_table() {
    let dir = TempDir::new().expect("tmp");
    let path = dir.path().join("table.csv");
    let mut sink = CsvTableSink::open(&path);

    let store_table = {
        let mut store = SubmissionStore::load(
            questionnaire(),
            Box::new(CsvTableSink::open(&path)),
            Arc::new(DirBlobStore::new(dir.path().join("photos"))),
            StoreOptions::default(),
        );
        let mut s = store.new_session("en");
        fill(&mut s, "Asha", "Wardha");
        s.advance().expect("valid");
        store.append(&mut s).expect("append");
        store.table().clone()
    };

    let loaded = sink.load();
    assert!(loaded.warning.is_none());
    assert_eq!(loaded.table.len(), store_table.len());

    std::fs::remove_file(&path).expect("delete");
    let after = sink.load();
    assert!(after.table.is_empty());
    let warning = after.warning.expect("degraded");
    assert!(warning.location.ends_with("table.csv"));
}

#[test]
fn corrupt_file_degrades_to_empty_table() {
    let dir = TempDir::new().expect("tmp");
    let path = dir.path().join("responses/table.csv");
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, "Timestamp,Village\nnot-a-time,Wardha\n").expect("write");

    let store = open_store(&dir);
    assert!(store.table().is_empty());
    assert!(store.load_warning().is_some());
}

fn corrupt_copies(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("entry").path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("table.csv.corrupt-"))
        })
        .collect()
}

#[test]
fn unreadable_file_is_kept_aside_when_the_next_append_rewrites_it() {
    let dir = TempDir::new().expect("tmp");
    let path = dir.path().join("responses/table.csv");
    let original = "Timestamp,Village\nnot-a-time,Wardha\n";
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, original).expect("write");

    let mut store = open_store(&dir);
    assert!(store.load_warning().is_some());
    assert!(corrupt_copies(&dir.path().join("responses")).is_empty());

    let mut s = store.new_session("en");
    fill(&mut s, "Asha", "Wardha");
    s.advance().expect("valid");
    store.append(&mut s).expect("append");

    let kept = corrupt_copies(&dir.path().join("responses"));
    assert_eq!(kept.len(), 1);
    assert_eq!(std::fs::read_to_string(&kept[0]).expect("read"), original);

    let mut sink = CsvTableSink::open(&path);
    let reloaded = sink.load();
    assert!(reloaded.warning.is_none());
    assert_eq!(reloaded.table.len(), 1);

    let mut again = store.new_session("en");
    fill(&mut again, "Ravi", "Akola");
    again.advance().expect("valid");
    store.append(&mut again).expect("append");
    assert_eq!(corrupt_copies(&dir.path().join("responses")).len(), 1);
}

#[test]
fn timestamps_without_offset_load_as_utc_and_survive_appends() {
    let dir = TempDir::new().expect("tmp");
    let path = dir.path().join("responses/table.csv");
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(
        &path,
        "Timestamp,Surveyor Name,Village\n\
         2025-07-04T09:05:03.123456,Asha,Wardha\n\
         2025-07-04T10:00:00,Meena,Akola\n",
    )
    .expect("write");

    let mut store = open_store(&dir);
    assert!(store.load_warning().is_none());
    assert_eq!(store.table().len(), 2);

    let mut s = store.new_session("en");
    fill(&mut s, "Ravi", "Akola");
    s.advance().expect("valid");
    store.append(&mut s).expect("append");
    drop(store);

    let reloaded = open_store(&dir);
    assert!(reloaded.load_warning().is_none());
    assert_eq!(reloaded.table().len(), 3);
    let first = reloaded.table().get(0).expect("row");
    assert_eq!(first.surveyor_name, "Asha");
    assert_eq!(
        first.value(TIMESTAMP_COLUMN).as_deref(),
        Some("2025-07-04T09:05:03.123456Z")
    );
    assert!(corrupt_copies(&dir.path().join("responses")).is_empty());
}

#[test]
fn configured_default_language_names_the_columns() {
    let dir = TempDir::new().expect("tmp");
    let config = SurveyConfig {
        data_dir: dir.path().join("responses"),
        photos_dir: dir.path().join("photos"),
        backend: Backend::Csv,
        default_language: "hi".to_string(),
        ..SurveyConfig::default()
    };
    let questionnaire = Questionnaire::new(vec![
        FieldSpec::text("surveyor_name").required().label("en", "Name of Surveyor"),
        FieldSpec::text("village")
            .required()
            .label("en", "Village")
            .label("hi", "गाँव"),
    ])
    .and_then(|q| q.with_surveyor_field("surveyor_name"))
    .expect("questionnaire");

    let mut store = SubmissionStore::open(questionnaire, &config).expect("store");
    assert_eq!(store.questionnaire().default_language(), "hi");
    assert!(store.table().has_column("गाँव"));
    assert!(!store.table().has_column("Village"));

    let mut s = store.new_session("te");
    s.set_answer("surveyor_name", "Ravi").expect("set");
    s.set_answer("village", "Wardha").expect("set");
    s.advance().expect("valid");
    let outcome = store.append(&mut s).expect("append");
    assert_eq!(outcome.record.value("गाँव").as_deref(), Some("Wardha"));
    assert!(!store.table().has_column("Village"));
}

#[test]
fn store_reloads_files_written_by_hand() {
    let dir = TempDir::new().expect("tmp");
    let path = dir.path().join("responses/table.csv");
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(
        &path,
        "Timestamp,Surveyor Name,Village\n2025-07-04T09:05:03.000000Z,Asha,Wardha\n",
    )
    .expect("write");

    let mut store = open_store(&dir);
    assert_eq!(store.table().len(), 1);

    let mut s = store.new_session("en");
    fill(&mut s, "Ravi", "Akola");
    s.advance().expect("valid");
    let outcome = store.append(&mut s).expect("append");
    assert_eq!(outcome.index, 1);
    assert_eq!(&store.table().columns()[..3], &["Timestamp", "Surveyor Name", "Village"]);
    assert_eq!(store.query("wardha").len(), 1);
}
