use std::sync::{Arc, Mutex};

use fieldsurvey::{
    blob::{BlobError, BlobStore, DirBlobStore},
    core::{
        store::{StoreError, StoreOptions, SubmissionStore},
        table::SubmissionTable,
    },
    persist::{LoadOutcome, PersistError, PersistResult, TableSink, sqlite::SqliteTableSink},
    questionnaire::{FieldSpec, Questionnaire},
    session::FormSession,
    types::{LANGUAGE_COLUMN, PHOTO_COLUMN, SURVEYOR_COLUMN, Stage, TIMESTAMP_COLUMN},
};

fn questionnaire() -> Arc<Questionnaire> {
    Arc::new(
        Questionnaire::new(vec![
            FieldSpec::text("surveyor_name")
                .required()
                .label("en", "Name of Surveyor")
                .label("hi", "सर्वेक्षक का नाम"),
            FieldSpec::text("village")
                .required()
                .label("en", "Village")
                .label("hi", "गाँव"),
            FieldSpec::amount("income").label("en", "Income"),
        ])
        .and_then(|q| q.with_surveyor_field("surveyor_name"))
        .expect("questionnaire"),
    )
}

fn memory_store(photos: &std::path::Path) -> SubmissionStore {
    SubmissionStore::load(
        questionnaire(),
        Box::new(SqliteTableSink::open_in_memory().expect("sqlite")),
        Arc::new(DirBlobStore::new(photos)),
        StoreOptions::default(),
    )
}

fn reviewed(store: &SubmissionStore, lang: &str, name: &str, village: &str) -> FormSession {
    let mut s = store.new_session(lang);
    s.set_answer("surveyor_name", name).expect("set");
    s.set_answer("village", village).expect("set");
    s.advance().expect("valid");
    s
}

struct FlakySink {
    fail_next: u32,
    persisted: Arc<Mutex<Vec<usize>>>,
}

impl TableSink for FlakySink {
    fn load(&mut self) -> LoadOutcome {
        LoadOutcome::loaded(SubmissionTable::new())
    }

    fn persist(&mut self, table: &SubmissionTable) -> PersistResult<()> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(PersistError::Corrupt("disk unavailable".to_string()));
        }
        self.persisted.lock().expect("lock").push(table.len());
        Ok(())
    }

    fn location(&self) -> String {
        "flaky".to_string()
    }
}

struct BrokenBlobs;

impl BlobStore for BrokenBlobs {
    fn put(&self, key: &str, _bytes: &[u8]) -> Result<(), BlobError> {
        Err(BlobError::InvalidKey(key.to_string()))
    }

    fn list(&self) -> Result<Vec<String>, BlobError> {
        Ok(Vec::new())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        Err(BlobError::NotFound(key.to_string()))
    }
}

#[test]
fn fresh_table_header_is_canonical() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = memory_store(dir.path());
    assert_eq!(
        store.table().columns(),
        &[
            TIMESTAMP_COLUMN.to_string(),
            SURVEYOR_COLUMN.to_string(),
            "Village".to_string(),
            "Income".to_string(),
            PHOTO_COLUMN.to_string(),
            LANGUAGE_COLUMN.to_string(),
        ]
    );
}

#[test]
fn append_grows_by_one_with_increasing_timestamps() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = memory_store(dir.path());

    let mut last = None;
    for i in 0..20 {
        let mut s = reviewed(&store, "en", &format!("S{i}"), "Wardha");
        let before = store.table().len();
        let outcome = store.append(&mut s).expect("append");
        assert_eq!(store.table().len(), before + 1);
        assert_eq!(outcome.index, before);
        assert_eq!(s.stage(), Stage::Submitted);
        if let Some(prev) = last {
            assert!(outcome.record.timestamp > prev);
        }
        last = Some(outcome.record.timestamp);
    }
}

#[test]
fn append_rejects_sessions_not_pending_review() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = memory_store(dir.path());

    let mut editing = store.new_session("en");
    assert!(matches!(
        store.append(&mut editing),
        Err(StoreError::NotPendingReview(Stage::Editing))
    ));

    let mut s = reviewed(&store, "en", "Asha", "Wardha");
    store.append(&mut s).expect("append");
    assert!(matches!(
        store.append(&mut s),
        Err(StoreError::NotPendingReview(Stage::Submitted))
    ));
    assert_eq!(store.table().len(), 1);
}

#[test]
fn new_language_label_widens_by_exactly_one_column() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = memory_store(dir.path());

    let mut en = reviewed(&store, "en", "Asha", "Wardha");
    store.append(&mut en).expect("append");
    let before = store.table().columns().to_vec();

    let mut hi = reviewed(&store, "hi", "Ravi", "Akola");
    store.append(&mut hi).expect("append");

    let after = store.table().columns();
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(&after[..before.len()], before.as_slice());
    assert_eq!(after.last().map(String::as_str), Some("गाँव"));

    let first = store.table().get(0).expect("first");
    assert_eq!(first.value("गाँव"), None);
    assert_eq!(first.value("Village").as_deref(), Some("Wardha"));
    let second = store.table().get(1).expect("second");
    assert_eq!(second.value("गाँव").as_deref(), Some("Akola"));
    assert_eq!(second.language.as_deref(), Some("hi"));
}

#[test]
fn extras_become_columns() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = memory_store(dir.path());
    let mut s = store.new_session("en");
    s.set_answer("surveyor_name", "Asha").expect("set");
    s.set_answer("village", "Wardha").expect("set");
    s.set_extra("Remarks", " late rains ").expect("extra");
    s.advance().expect("valid");

    store.append(&mut s).expect("append");
    assert!(store.table().has_column("Remarks"));
    assert_eq!(
        store.table().get(0).and_then(|r| r.value("Remarks")).as_deref(),
        Some("late rains")
    );
}

#[test]
fn query_is_case_insensitive_and_ordered() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = memory_store(dir.path());
    for (name, village) in [("Asha", "Wardha"), ("Ravi", "Akola"), ("Meena", "wardha road")] {
        let mut s = reviewed(&store, "en", name, village);
        store.append(&mut s).expect("append");
    }

    let names: Vec<&str> = store
        .query("WARDHA")
        .into_iter()
        .map(|r| r.surveyor_name.as_str())
        .collect();
    assert_eq!(names, vec!["Asha", "Meena"]);
    assert_eq!(store.query("").len(), 3);
    assert!(store.query("nagpur").is_empty());
}

#[test]
fn photo_is_stored_and_referenced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = memory_store(dir.path());

    let mut s = store.new_session("en");
    s.set_answer("surveyor_name", "Asha Patil").expect("set");
    s.set_answer("village", "Wardha").expect("set");
    s.attach_blob("field.jpg", vec![0xFF, 0xD8], "image/jpeg").expect("attach");
    s.advance().expect("valid");

    let outcome = store.append(&mut s).expect("append");
    assert!(outcome.blob_error.is_none());
    let key = outcome.record.attached_blob_ref.expect("photo ref");
    assert!(key.starts_with("photo_asha_patil_"));
    assert!(key.ends_with(".jpg"));
    assert_eq!(store.blobs().get(&key).expect("stored"), vec![0xFF, 0xD8]);
}

#[test]
fn photo_failure_keeps_the_record() {
    let mut store = SubmissionStore::load(
        questionnaire(),
        Box::new(SqliteTableSink::open_in_memory().expect("sqlite")),
        Arc::new(BrokenBlobs),
        StoreOptions::default(),
    );
    let mut s = store.new_session("en");
    s.set_answer("surveyor_name", "Asha").expect("set");
    s.set_answer("village", "Wardha").expect("set");
    s.attach_blob("field.png", vec![1], "image/png").expect("attach");
    s.advance().expect("valid");

    let outcome = store.append(&mut s).expect("append");
    assert!(outcome.blob_error.is_some());
    assert!(outcome.record.attached_blob_ref.is_none());
    assert_eq!(store.table().len(), 1);
}

#[test]
fn persist_failure_leaves_table_and_session_untouched() {
    let persisted = Arc::new(Mutex::new(Vec::new()));
    let sink = FlakySink {
        fail_next: 10,
        persisted: Arc::clone(&persisted),
    };
    let options = StoreOptions {
        persist_attempts: 2,
        persist_backoff: std::time::Duration::ZERO,
        ..StoreOptions::default()
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SubmissionStore::load(
        questionnaire(),
        Box::new(sink),
        Arc::new(DirBlobStore::new(dir.path())),
        options,
    );
    let columns_before = store.table().columns().to_vec();

    let mut s = reviewed(&store, "hi", "Ravi", "Akola");
    let err = store.append(&mut s).expect_err("persist fails");
    assert!(matches!(err, StoreError::Persist { attempts: 2, .. }));
    assert!(store.table().is_empty());
    assert_eq!(store.table().columns(), columns_before.as_slice());
    assert_eq!(s.stage(), Stage::PendingReview);
    assert!(persisted.lock().expect("lock").is_empty());
}

#[test]
fn persist_retries_until_success() {
    let persisted = Arc::new(Mutex::new(Vec::new()));
    let sink = FlakySink {
        fail_next: 2,
        persisted: Arc::clone(&persisted),
    };
    let options = StoreOptions {
        persist_attempts: 3,
        persist_backoff: std::time::Duration::ZERO,
        ..StoreOptions::default()
    };
    let dir = tempfile::tempdir().expect("tempdir");
    let mut store = SubmissionStore::load(
        questionnaire(),
        Box::new(sink),
        Arc::new(DirBlobStore::new(dir.path())),
        options,
    );

    let mut s = reviewed(&store, "en", "Asha", "Wardha");
    store.append(&mut s).expect("third attempt succeeds");
    assert_eq!(*persisted.lock().expect("lock"), vec![1]);
}
