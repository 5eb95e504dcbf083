use std::sync::Arc;

use proptest::prelude::*;

use fieldsurvey::{
    blob::DirBlobStore,
    core::store::{StoreOptions, SubmissionStore},
    persist::{csv::decode_table, sqlite::SqliteTableSink},
    questionnaire::{FieldSpec, Questionnaire, catalog::cotton_survey},
    session::{AnswerValue, FormSession},
    validate::ValidationErrorKind,
};

#[derive(Debug, Clone)]
struct Submission {
    lang: &'static str,
    name: String,
    village: String,
    extra: Option<String>,
}

fn submission_strategy() -> impl Strategy<Value = Submission> {
    (
        prop::sample::select(vec!["en", "hi", "te"]),
        "[A-Za-z][A-Za-z ]{0,12}",
        "[A-Za-z,\" ]{1,16}",
        prop::option::of("[a-z]{1,8}"),
    )
        .prop_map(|(lang, name, village, extra)| Submission {
            lang,
            name,
            village,
            extra,
        })
}

fn questionnaire() -> Arc<Questionnaire> {
    Arc::new(
        Questionnaire::new(vec![
            FieldSpec::text("surveyor_name").required().label("en", "Name of Surveyor"),
            FieldSpec::text("village")
                .required()
                .label("en", "Village")
                .label("hi", "गाँव"),
        ])
        .and_then(|q| q.with_surveyor_field("surveyor_name"))
        .expect("questionnaire"),
    )
}

proptest! {
    #[test]
    fn appends_keep_table_invariants(subs in prop::collection::vec(submission_strategy(), 1..40)) {
        let dir = tempfile::tempdir().expect("tmp");
        let mut store = SubmissionStore::load(
            questionnaire(),
            Box::new(SqliteTableSink::open_in_memory().expect("sqlite")),
            Arc::new(DirBlobStore::new(dir.path())),
            StoreOptions::default(),
        );

        for sub in &subs {
            let columns_before = store.table().columns().to_vec();
            let len_before = store.table().len();

            let mut s = store.new_session(sub.lang);
            s.set_answer("surveyor_name", sub.name.as_str()).expect("set");
            s.set_answer("village", sub.village.as_str()).expect("set");
            if let Some(extra) = &sub.extra {
                s.set_extra(format!("Note {extra}"), "x").expect("extra");
            }
            if s.advance().is_err() {
                continue;
            }
            store.append(&mut s).expect("append");

            let columns = store.table().columns();
            prop_assert_eq!(store.table().len(), len_before + 1);
            prop_assert_eq!(&columns[..columns_before.len()], columns_before.as_slice());
        }

        let ts: Vec<_> = store.table().records().iter().map(|r| r.timestamp).collect();
        prop_assert!(ts.windows(2).all(|w| w[0] < w[1]));

        let bytes = store.table().to_csv_bytes().expect("encode");
        let decoded = decode_table(&bytes).expect("decode");
        prop_assert_eq!(decoded.columns(), store.table().columns());
        prop_assert_eq!(decoded.records(), store.table().records());

        let everything = store.query("");
        prop_assert_eq!(everything.len(), store.table().len());
    }

    #[test]
    fn validation_is_total_and_stable(answers in prop::collection::vec(("[a-z_]{1,20}", ".{0,12}"), 0..30)) {
        let q = Arc::new(cotton_survey().expect("catalog"));
        let mut s = FormSession::new(Arc::clone(&q), "mr");
        for (id, value) in &answers {
            let _ = s.set_answer(id, value.as_str());
        }

        let first = s.validate();
        prop_assert_eq!(&first, &s.validate());

        let mut ids: Vec<&str> = first.iter().map(|e| e.field_id.as_str()).collect();
        let n = ids.len();
        ids.dedup();
        prop_assert_eq!(ids.len(), n);
        for err in &first {
            prop_assert!(q.contains(&err.field_id));
            prop_assert!(!err.message.is_empty());
        }
    }

    #[test]
    fn amounts_are_either_missing_or_fine(n in -5i32..5) {
        let q = Questionnaire::new(vec![FieldSpec::amount("income").required()]).expect("q");
        let value = AnswerValue::from(n.to_string());
        let errors = fieldsurvey::validate::validate(&q, |_| Some(&value));
        match n {
            0 => prop_assert_eq!(errors[0].kind, ValidationErrorKind::Missing),
            n if n < 0 => prop_assert_eq!(errors[0].kind, ValidationErrorKind::OutOfRange),
            _ => prop_assert!(errors.is_empty()),
        }
    }
}
