//! Multilingual field-survey intake: a questionnaire model, validated form
//! sessions, and an append-only submission table persisted as CSV.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::SubmissionStore`]:
//! ```
//! use std::sync::Arc;
//!
//! use fieldsurvey::{
//!     blob::DirBlobStore,
//!     core::store::{StoreOptions, SubmissionStore},
//!     persist::sqlite::SqliteTableSink,
//!     questionnaire::{FieldSpec, Questionnaire},
//! };
//!
//! let questionnaire = Questionnaire::new(vec![
//!     FieldSpec::text("surveyor_name").required().label("en", "Surveyor Name"),
//!     FieldSpec::number("farm_size").required().label("en", "Farm Size"),
//! ])
//! .and_then(|q| q.with_surveyor_field("surveyor_name"))
//! .expect("questionnaire");
//!
//! let sink = SqliteTableSink::open_in_memory().expect("sqlite");
//! let mut store = SubmissionStore::load(
//!     Arc::new(questionnaire),
//!     Box::new(sink),
//!     Arc::new(DirBlobStore::new("photos")),
//!     StoreOptions::default(),
//! );
//!
//! let mut session = store.new_session("en");
//! session.set_answer("surveyor_name", "Ravi").expect("answer");
//! session.set_answer("farm_size", "2.5").expect("answer");
//! session.advance().expect("valid");
//! let outcome = store.append(&mut session).expect("append");
//! assert_eq!(outcome.index, 0);
//! assert_eq!(store.query("ravi").len(), 1);
//! ```
//!
//! Runtime usage with the CSV sink:
//! ```no_run
//! use fieldsurvey::{
//!     config::SurveyConfig,
//!     core::store::SubmissionStore,
//!     questionnaire::catalog::cotton_survey,
//!     runtime::handle::{spawn_survey_store, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = SurveyConfig::default();
//! let store = SubmissionStore::open(cotton_survey().expect("catalog"), &config).expect("store");
//! let handle = spawn_survey_store(store, RuntimeConfig::from(&config));
//! let mut session = handle.new_session("hi").await.expect("session");
//! session.set_answer("surveyor_name", "Suneha").expect("answer");
//! if session.advance().is_ok() {
//!     handle.submit(&mut session).await.expect("submit");
//! }
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Admin allow-list.
pub mod access;
/// Zip export of the table and photos.
pub mod archive;
/// Photo storage.
pub mod blob;
/// TOML deployment configuration.
pub mod config;
/// Submission table and the store that owns it.
pub mod core;
/// Table sinks: CSV file and SQLite journal.
pub mod persist;
/// Questionnaire schema and built-in catalog.
pub mod questionnaire;
/// Stored submission records.
pub mod record;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Form session state machine.
pub mod session;
/// Shared primitive types and fixed column names.
pub mod types;
/// Answer validation.
pub mod validate;
