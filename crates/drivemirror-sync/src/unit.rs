//! Execution units
//!
//! An execution unit mirrors one contiguous group of items. It is a
//! dedicated OS thread running its own single-threaded tokio runtime, with
//! its own HTTP connection pool and its own copy of the session. Inside the
//! unit every item becomes a task; a semaphore caps how many transfer at
//! once.
//!
//! Units talk to the consumer only through [`UnitEvent`]s on an unbounded
//! channel. Every item produces exactly one [`UnitEvent::Outcome`], even
//! when its task panics.

use std::future::Future;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use drivemirror_core::domain::folder_index::FolderIndex;
use drivemirror_core::domain::item::{ItemRecord, TransferTask};
use drivemirror_core::domain::message::MirrorMessage;
use drivemirror_core::domain::session::SessionToken;
use drivemirror_core::ports::credentials::CredentialProvider;
use drivemirror_drive::client::{DriveClient, DEFAULT_BACKOFF_BASE, DEFAULT_MAX_RETRIES};
use drivemirror_drive::export::transfer_mode;
use drivemirror_drive::fetch::{fetch, TransferError};
use futures_util::FutureExt;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::filesystem::resolve_path;
use crate::panic_detail;

/// Default number of concurrent transfers per unit
pub const DEFAULT_SUB_CONCURRENCY: usize = 24;

/// Reason reported for an item whose task panicked
pub const TASK_PANICKED: &str = "transfer task panicked";

/// Message from an execution unit to the consumer
#[derive(Debug, Clone, PartialEq)]
pub enum UnitEvent {
    /// The terminal outcome of one item
    Outcome(MirrorMessage),
    /// A non-fatal problem; does not count as an outcome
    Warning(String),
}

/// Per-unit tuning shared by every unit of a run
#[derive(Debug, Clone)]
pub struct UnitSettings {
    /// Transfers allowed in flight inside one unit
    pub sub_concurrency: usize,
    pub max_retries: u32,
    /// First backoff step for 5xx retries
    pub backoff_base: Duration,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            sub_concurrency: DEFAULT_SUB_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

// ============================================================================
// ExecutionUnit
// ============================================================================

/// One partition of a run, ready to be started on its own thread
pub struct ExecutionUnit {
    index: usize,
    items: Vec<ItemRecord>,
    folder_index: Arc<FolderIndex>,
    root: PathBuf,
    session: SessionToken,
    credentials: Arc<dyn CredentialProvider>,
    settings: UnitSettings,
    events: mpsc::UnboundedSender<UnitEvent>,
    parent_span: Span,
}

impl ExecutionUnit {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: usize,
        items: Vec<ItemRecord>,
        folder_index: Arc<FolderIndex>,
        root: PathBuf,
        session: SessionToken,
        credentials: Arc<dyn CredentialProvider>,
        settings: UnitSettings,
        events: mpsc::UnboundedSender<UnitEvent>,
    ) -> Self {
        Self {
            index,
            items,
            folder_index,
            root,
            session,
            credentials,
            settings,
            events,
            parent_span: Span::current(),
        }
    }

    /// Attaches the unit's log records to `span` instead of the current one
    pub fn with_parent_span(mut self, span: Span) -> Self {
        self.parent_span = span;
        self
    }

    /// Starts the unit on a thread named `drivemirror-unit-<index>`
    ///
    /// # Errors
    /// Returns the OS error if the thread cannot be created. Nothing has
    /// been sent on the channel in that case.
    pub fn spawn(self) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("drivemirror-unit-{}", self.index))
            .spawn(move || self.run_blocking())
    }

    fn run_blocking(self) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!(unit = self.index, error = %e, "Could not build unit runtime");
                let _ = self.events.send(UnitEvent::Warning(format!(
                    "execution unit {} failed: {}",
                    self.index, e
                )));
                return;
            }
        };

        let span = info_span!(
            parent: &self.parent_span,
            "execution_unit",
            unit = self.index,
            items = self.items.len()
        );
        runtime.block_on(self.run().instrument(span));
    }

    async fn run(self) {
        let Self {
            index,
            items,
            folder_index,
            root,
            session,
            credentials,
            settings,
            events,
            ..
        } = self;

        let client = DriveClient::for_session(&session)
            .with_max_retries(settings.max_retries)
            .with_backoff_base(settings.backoff_base);

        let shared = Arc::new(UnitShared {
            index,
            folder_index,
            root,
            credentials,
            base_client: client,
            session: Mutex::new(UnitSession {
                token: session,
                refresh_failed: false,
            }),
            events,
        });

        let item_count = items.len();
        let semaphore = Arc::new(Semaphore::new(settings.sub_concurrency.max(1)));
        let mut tasks = JoinSet::new();

        debug!(
            items = item_count,
            sub_concurrency = settings.sub_concurrency,
            "Execution unit started"
        );

        for item in items {
            let shared = shared.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let name = item.name.clone();
                let message = match semaphore.acquire_owned().await {
                    Ok(_permit) => guarded(&name, shared.transfer(item)).await,
                    Err(_) => MirrorMessage::error(&name, "transfer queue closed"),
                };
                shared.emit(UnitEvent::Outcome(message));
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Transfer task did not complete");
            }
        }

        info!(items = item_count, "Execution unit finished");
    }
}

// ============================================================================
// Per-unit shared state
// ============================================================================

struct UnitSession {
    token: SessionToken,
    /// Set after the first failed refresh; the unit never retries
    refresh_failed: bool,
}

/// State shared by all tasks of one unit
struct UnitShared {
    index: usize,
    folder_index: Arc<FolderIndex>,
    root: PathBuf,
    credentials: Arc<dyn CredentialProvider>,
    base_client: DriveClient,
    session: Mutex<UnitSession>,
    events: mpsc::UnboundedSender<UnitEvent>,
}

impl UnitShared {
    fn emit(&self, event: UnitEvent) {
        if self.events.send(event).is_err() {
            debug!(unit = self.index, "Consumer gone, dropping event");
        }
    }

    /// Client carrying the unit's current access token
    ///
    /// Refreshes the token first when it is about to expire. The lock is
    /// held across the refresh; waiting tasks reuse its result.
    async fn client(&self) -> DriveClient {
        let mut session = self.session.lock().await;

        if !session.refresh_failed && session.token.needs_refresh() {
            match self.credentials.refresh(&session.token).await {
                Ok(fresh) => {
                    debug!(unit = self.index, "Refreshed unit session");
                    session.token = fresh;
                }
                Err(e) => {
                    session.refresh_failed = true;
                    warn!(unit = self.index, error = %e, "Token refresh failed, keeping current token");
                    self.emit(UnitEvent::Warning(format!(
                        "token refresh failed for execution unit {}: {}",
                        self.index, e
                    )));
                }
            }
        }

        let mut client = self.base_client.clone();
        client.set_access_token(session.token.access_token.clone());
        client
    }

    /// Mirrors one item and turns the result into its terminal message
    async fn transfer(&self, item: ItemRecord) -> MirrorMessage {
        // Nothing to write, so no directories either
        if transfer_mode(&item).is_none() {
            debug!(id = %item.id, mime_type = %item.mime_type, "No export format");
            return MirrorMessage::SkippedNoExport { name: item.name };
        }

        let destination_dir = match resolve_path(&item, &self.folder_index, &self.root).await {
            Ok((dir, _created)) => dir,
            Err(e) => {
                let err = TransferError::Path(format!("cannot create directory: {}", e));
                warn!(id = %item.id, error = %err, "Transfer failed");
                return MirrorMessage::error(item.name, err.to_string());
            }
        };

        let task = TransferTask {
            item,
            destination_dir,
        };
        let client = self.client().await;

        match fetch(&client, &task.item, &task.destination_dir).await {
            Ok(outcome) => outcome.into(),
            Err(e) => {
                warn!(id = %task.item.id, name = %task.item.name, error = %e, "Transfer failed");
                MirrorMessage::error(task.item.name, e.to_string())
            }
        }
    }
}

/// Runs a transfer, converting a panic into an error outcome for `name`
pub async fn guarded<F>(name: &str, transfer: F) -> MirrorMessage
where
    F: Future<Output = MirrorMessage>,
{
    match AssertUnwindSafe(transfer).catch_unwind().await {
        Ok(message) => message,
        Err(payload) => {
            warn!(item = name, panic = %panic_detail(payload.as_ref()), "Transfer task panicked");
            MirrorMessage::error(name, TASK_PANICKED)
        }
    }
}
