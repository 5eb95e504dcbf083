use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fieldsurvey::{
    access::AdminGate,
    archive::{ArchiveError, build_archive},
    config::{ConfigError, SurveyConfig},
    core::table::SubmissionTable,
    persist::{PersistError, load_table},
    questionnaire::{QuestionnaireError, catalog::cotton_survey},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "survey", version, about = "Field survey data tools")]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, default_value = "survey.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Zip the submission table and photos.
    Archive {
        /// Archive to write.
        #[arg(long)]
        out: PathBuf,
        /// Only include records matching this term.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Print matching submissions as CSV.
    Query {
        /// Admin identity.
        #[arg(long = "as")]
        identity: String,
        /// Case-insensitive search term; empty lists everything.
        #[arg(default_value = "")]
        term: String,
    },
    /// Print the whole submission table as CSV.
    Export {
        /// Admin identity.
        #[arg(long = "as")]
        identity: String,
    },
    /// List questions with their labels in one language.
    Questions {
        /// Language code.
        #[arg(long, default_value = "en")]
        lang: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Questionnaire(#[from] QuestionnaireError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("`{0}` is not an admin")]
    Unauthorized(String),
    #[error("stdout: {0}")]
    Io(#[from] std::io::Error),
}

fn main() -> std::process::ExitCode {
    init_logging();

    match run(Cli::parse()) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "survey command failed");
            eprintln!("error: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = SurveyConfig::load(&cli.config)?;

    match cli.command {
        Command::Archive { out, filter } => {
            let summary = build_archive(&config, &out, filter.as_deref())?;
            println!(
                "{}: {} record(s), {} photo(s)",
                summary.path.display(),
                summary.records,
                summary.photos
            );
        }
        Command::Query { identity, term } => {
            authorize(&config, &identity)?;
            let table = read(&config)?.filtered(&term);
            write_csv(&table)?;
        }
        Command::Export { identity } => {
            authorize(&config, &identity)?;
            write_csv(&read(&config)?)?;
        }
        Command::Questions { lang } => {
            let questionnaire = cotton_survey()?.with_default_language(&config.default_language);
            let mut out = std::io::stdout().lock();
            for field in questionnaire.field_specs() {
                let marker = if field.required { "*" } else { " " };
                writeln!(out, "{marker} {:<22} {}", field.id, questionnaire.label(&field.id, &lang))?;
            }
        }
    }
    Ok(())
}

fn authorize(config: &SurveyConfig, identity: &str) -> Result<(), CliError> {
    if AdminGate::from_config(config).is_authorized(identity) {
        return Ok(());
    }
    tracing::warn!(identity, "admin access denied");
    Err(CliError::Unauthorized(identity.to_string()))
}

fn read(config: &SurveyConfig) -> Result<SubmissionTable, CliError> {
    let outcome = load_table(config)?;
    if let Some(warning) = outcome.warning {
        eprintln!("warning: {} unreadable ({}); showing nothing", warning.location, warning.reason);
    }
    Ok(outcome.table)
}

fn write_csv(table: &SubmissionTable) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    out.write_all(&table.to_csv_bytes()?)?;
    out.flush()?;
    Ok(())
}
