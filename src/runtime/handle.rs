use std::sync::Arc;

use tokio::{
    sync::{Mutex, broadcast, mpsc, oneshot},
    time::Duration,
};

use crate::{
    config::SurveyConfig,
    core::{
        store::{StoreError, SubmissionStore, SubmitOutcome},
        table::SubmissionTable,
    },
    persist::PersistError,
    record::SubmissionRecord,
    session::FormSession,
};

use super::events::SurveyEvent;

/// Failure of a runtime call.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The store rejected or failed the operation.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Flushing the sink failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The append did not finish in time. It may still land.
    #[error("submission not confirmed within {after_ms} ms")]
    Timeout {
        /// Configured bound.
        after_ms: u64,
    },
    /// The blocking persistence task panicked or was cancelled.
    #[error("persistence task failed: {0}")]
    Join(String),
    /// The runtime has shut down.
    #[error("runtime channel closed")]
    ChannelClosed,
}

/// Runtime tuning.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Capacity of the command queue.
    pub command_queue_bound: usize,
    /// Upper bound on one submit.
    pub append_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&SurveyConfig::default())
    }
}

impl From<&SurveyConfig> for RuntimeConfig {
    fn from(config: &SurveyConfig) -> Self {
        Self {
            command_queue_bound: config.command_queue_bound.max(1),
            append_timeout_ms: config.append_timeout_ms,
        }
    }
}

/// Cloneable front end to the single writer owning a [`SubmissionStore`].
///
/// Every submit goes through one queue, so concurrent survey takers each get
/// their own row and never overwrite one another.
pub struct SurveyHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<SurveyEvent>,
}

impl Clone for SurveyHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Submit {
        session: FormSession,
        resp: oneshot::Sender<Result<SubmitOutcome, RuntimeError>>,
    },
    Query {
        term: String,
        resp: oneshot::Sender<Vec<SubmissionRecord>>,
    },
    Snapshot {
        resp: oneshot::Sender<SubmissionTable>,
    },
    NewSession {
        language: String,
        resp: oneshot::Sender<FormSession>,
    },
    Flush {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

/// Moves `store` into a writer task and returns its handle.
///
/// Must be called from within a tokio runtime.
pub fn spawn_survey_store(store: SubmissionStore, config: RuntimeConfig) -> SurveyHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<SurveyEvent>(256);

    let events_tx_loop = events_tx.clone();
    let store = Arc::new(Mutex::new(store));

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            let done = handle_command(cmd, &store, &events_tx_loop, &config).await;
            if done {
                break;
            }
        }
    });

    SurveyHandle { cmd_tx, events_tx }
}

impl SurveyHandle {
    /// Subscribes to append and failure events.
    pub fn subscribe(&self) -> broadcast::Receiver<SurveyEvent> {
        self.events_tx.subscribe()
    }

    /// Appends a reviewed session. On success `session` is marked submitted;
    /// on failure it is left untouched for a retry.
    pub async fn submit(&self, session: &mut FormSession) -> Result<SubmitOutcome, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Submit {
                session: session.clone(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        let outcome = rx.await.map_err(|_| RuntimeError::ChannelClosed)??;
        session.mark_submitted();
        Ok(outcome)
    }

    /// Records matching `term` in insertion order.
    pub async fn query(&self, term: impl Into<String>) -> Result<Vec<SubmissionRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Query {
                term: term.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Copy of the whole table.
    pub async fn snapshot(&self) -> Result<SubmissionTable, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Snapshot { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Fresh session using the store's questionnaire and attachment policy.
    pub async fn new_session(&self, language: impl Into<String>) -> Result<FormSession, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::NewSession {
                language: language.into(),
                resp: tx,
            })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Forces the sink to stable storage.
    pub async fn flush(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Flush { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Flushes and stops the writer task.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }
}

async fn handle_command(
    cmd: Command,
    store: &Arc<Mutex<SubmissionStore>>,
    events_tx: &broadcast::Sender<SurveyEvent>,
    config: &RuntimeConfig,
) -> bool {
    match cmd {
        Command::Submit { session, resp } => {
            let res = submit_blocking(store, session, config).await;
            match &res {
                Ok(outcome) => {
                    if let Some(failure) = &outcome.blob_error {
                        let _ = events_tx.send(SurveyEvent::BlobFailed {
                            key: failure.key.clone(),
                        });
                    }
                    let _ = events_tx.send(SurveyEvent::Appended {
                        index: outcome.index,
                    });
                }
                Err(RuntimeError::Store(StoreError::Persist { attempts, .. })) => {
                    let _ = events_tx.send(SurveyEvent::PersistFailed {
                        attempts: *attempts,
                    });
                }
                Err(_) => {}
            }
            let _ = resp.send(res);
        }
        Command::Query { term, resp } => {
            let guard = store.lock().await;
            let _ = resp.send(guard.table().query_cloned(&term));
        }
        Command::Snapshot { resp } => {
            let guard = store.lock().await;
            let _ = resp.send(guard.table().clone());
        }
        Command::NewSession { language, resp } => {
            let guard = store.lock().await;
            let _ = resp.send(guard.new_session(language));
        }
        Command::Flush { resp } => {
            let _ = resp.send(flush_blocking(store).await);
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(flush_blocking(store).await);
            return true;
        }
    }

    false
}

async fn submit_blocking(
    store: &Arc<Mutex<SubmissionStore>>,
    mut session: FormSession,
    config: &RuntimeConfig,
) -> Result<SubmitOutcome, RuntimeError> {
    let store_ref = Arc::clone(store);
    let task = tokio::task::spawn_blocking(move || {
        let mut store = store_ref.blocking_lock();
        store.append(&mut session)
    });

    let after_ms = config.append_timeout_ms;
    match tokio::time::timeout(Duration::from_millis(after_ms), task).await {
        Ok(Ok(res)) => res.map_err(RuntimeError::from),
        Ok(Err(join)) => Err(RuntimeError::Join(join.to_string())),
        Err(_) => {
            tracing::error!(after_ms, "submission not confirmed in time");
            Err(RuntimeError::Timeout { after_ms })
        }
    }
}

async fn flush_blocking(store: &Arc<Mutex<SubmissionStore>>) -> Result<(), RuntimeError> {
    let store_ref = Arc::clone(store);
    tokio::task::spawn_blocking(move || {
        let mut store = store_ref.blocking_lock();
        store.flush()
    })
    .await
    .map_err(|e| RuntimeError::Join(e.to_string()))?
    .map_err(RuntimeError::from)
}
