//! Mirror scheduler
//!
//! Splits the non-folder items of a run into contiguous groups, starts one
//! [`ExecutionUnit`] per group and merges their events into a single lazily
//! consumed [`MirrorRun`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use drivemirror_core::domain::{FolderIndex, ItemRecord, SessionToken};
//! use drivemirror_core::ports::StaticCredentialProvider;
//! use drivemirror_sync::scheduler::{MirrorScheduler, SchedulerOptions};
//!
//! # async fn example(items: Vec<ItemRecord>) {
//! let session = SessionToken::new("access-token");
//! let scheduler = MirrorScheduler::new(
//!     SchedulerOptions::default(),
//!     session.clone(),
//!     Arc::new(StaticCredentialProvider::new(session)),
//!     Arc::new(FolderIndex::from_items(&items)),
//! );
//!
//! let mut run = scheduler.run(items, Path::new("/tmp/mirror"));
//! while let Some(message) = run.next().await {
//!     println!("{}", message);
//! }
//! # }
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use drivemirror_core::domain::folder_index::FolderIndex;
use drivemirror_core::domain::item::ItemRecord;
use drivemirror_core::domain::message::MirrorMessage;
use drivemirror_core::domain::progress::ProgressState;
use drivemirror_core::domain::session::SessionToken;
use drivemirror_core::ports::credentials::CredentialProvider;
use drivemirror_core::ports::progress::ProgressCallback;
use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Span};

use crate::panic_detail;
use crate::progress::ProgressAggregator;
use crate::unit::{ExecutionUnit, UnitEvent, UnitSettings};

/// How long the consumer waits for an event before checking on the units
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Poll interval while waiting for finished units to exit
const JOIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Partitioning
// ============================================================================

/// Number of execution units for a run
///
/// `min(max_units, available, item_count)`, never less than one. An unset
/// budget means "as many as the machine offers".
pub fn effective_units(max_units: Option<usize>, available: usize, item_count: usize) -> usize {
    max_units
        .unwrap_or(available)
        .min(available)
        .min(item_count)
        .max(1)
}

/// Splits `items` into `groups` contiguous runs whose sizes differ by at
/// most one
///
/// Never returns an empty group: with fewer items than groups, one group
/// per item is returned.
pub fn partition<T>(items: Vec<T>, groups: usize) -> Vec<Vec<T>> {
    let groups = groups.max(1).min(items.len());
    if groups == 0 {
        return Vec::new();
    }

    let base = items.len() / groups;
    let extra = items.len() % groups;

    let mut out = Vec::with_capacity(groups);
    let mut rest = items.into_iter();
    for i in 0..groups {
        let size = base + usize::from(i < extra);
        out.push(rest.by_ref().take(size).collect());
    }
    out
}

// ============================================================================
// MirrorScheduler
// ============================================================================

/// Scheduling parameters of a run
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Upper bound on execution units; `None` uses `available_parallelism`
    pub max_units: Option<usize>,
    /// Parallelism the machine offers
    pub available_parallelism: usize,
    pub recv_timeout: Duration,
    pub unit: UnitSettings,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            max_units: None,
            available_parallelism: num_cpus::get(),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            unit: UnitSettings::default(),
        }
    }
}

/// Starts execution units for a set of items
pub struct MirrorScheduler {
    options: SchedulerOptions,
    session: SessionToken,
    credentials: Arc<dyn CredentialProvider>,
    folder_index: Arc<FolderIndex>,
    span: Span,
}

impl MirrorScheduler {
    pub fn new(
        options: SchedulerOptions,
        session: SessionToken,
        credentials: Arc<dyn CredentialProvider>,
        folder_index: Arc<FolderIndex>,
    ) -> Self {
        Self {
            options,
            session,
            credentials,
            folder_index,
            span: Span::current(),
        }
    }

    /// Parents the units' log spans under `span`
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Starts mirroring `items` under `root`
    ///
    /// Folders are ignored. With nothing left to transfer no unit is
    /// started and the run yields only [`MirrorMessage::NoFiles`].
    pub fn run(&self, items: Vec<ItemRecord>, root: &Path) -> MirrorRun {
        let targets: Vec<ItemRecord> = items.into_iter().filter(|i| !i.is_folder()).collect();
        if targets.is_empty() {
            info!("No files to mirror");
            return MirrorRun::empty();
        }

        let total = targets.len();
        let units = effective_units(
            self.options.max_units,
            self.options.available_parallelism,
            total,
        );
        info!(
            total_items = total,
            units,
            sub_concurrency = self.options.unit.sub_concurrency,
            "Starting execution units"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let mut handles = Vec::with_capacity(units);
        let mut startup_warnings = Vec::new();

        for (index, group) in partition(targets, units).into_iter().enumerate() {
            debug!(unit = index, items = group.len(), "Spawning execution unit");
            let unit = ExecutionUnit::new(
                index,
                group,
                self.folder_index.clone(),
                root.to_path_buf(),
                self.session.clone(),
                self.credentials.clone(),
                self.options.unit.clone(),
                tx.clone(),
            )
            .with_parent_span(self.span.clone());

            match unit.spawn() {
                Ok(handle) => handles.push((index, handle)),
                Err(e) => {
                    warn!(unit = index, error = %e, "Could not start execution unit");
                    startup_warnings.push(MirrorMessage::warning(format!(
                        "execution unit {} failed: {}",
                        index, e
                    )));
                }
            }
        }
        drop(tx);

        let mut run = MirrorRun::from_parts(rx, handles, total, self.options.recv_timeout);
        run.pending.extend(startup_warnings);
        run
    }
}

// ============================================================================
// MirrorRun
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Done,
}

/// The merged output of a run
///
/// Yields messages in completion order. Exactly one terminal message per
/// item precedes the closing sentinel, after which [`MirrorRun::next`]
/// returns `None`. Dropping a run early leaves its units to finish in the
/// background; their output is discarded.
pub struct MirrorRun {
    events: Option<mpsc::UnboundedReceiver<UnitEvent>>,
    units: Vec<(usize, JoinHandle<()>)>,
    unit_count: usize,
    total: usize,
    received: usize,
    recv_timeout: Duration,
    pending: VecDeque<MirrorMessage>,
    progress: ProgressAggregator,
    phase: Phase,
}

impl MirrorRun {
    /// A run with nothing to transfer
    pub fn empty() -> Self {
        let mut run = Self {
            events: None,
            units: Vec::new(),
            unit_count: 0,
            total: 0,
            received: 0,
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            pending: VecDeque::new(),
            progress: ProgressAggregator::new(0),
            phase: Phase::Done,
        };
        run.pending.push_back(MirrorMessage::NoFiles);
        run
    }

    pub(crate) fn from_parts(
        events: mpsc::UnboundedReceiver<UnitEvent>,
        units: Vec<(usize, JoinHandle<()>)>,
        total: usize,
        recv_timeout: Duration,
    ) -> Self {
        Self {
            events: Some(events),
            unit_count: units.len(),
            units,
            total,
            received: 0,
            recv_timeout,
            pending: VecDeque::new(),
            progress: ProgressAggregator::new(total),
            phase: Phase::Running,
        }
    }

    /// Reports every completed item to `callback`
    pub fn with_progress(mut self, callback: impl ProgressCallback + 'static) -> Self {
        self.progress.set_callback(Box::new(callback));
        self
    }

    /// Number of items being transferred
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of execution units started
    pub fn unit_count(&self) -> usize {
        self.unit_count
    }

    /// Progress over the messages yielded so far
    pub fn progress(&self) -> &ProgressState {
        self.progress.state()
    }

    /// Waits for the next message
    ///
    /// Returns `None` once the sentinel has been yielded.
    pub async fn next(&mut self) -> Option<MirrorMessage> {
        let message = self.next_message().await?;
        self.progress.observe(&message);
        Some(message)
    }

    /// Drives the run to the end, collecting every message
    pub async fn collect_all(mut self) -> Vec<MirrorMessage> {
        let mut messages = Vec::new();
        while let Some(message) = self.next().await {
            messages.push(message);
        }
        messages
    }

    /// Adapts the run to a [`Stream`]
    pub fn into_stream(self) -> impl Stream<Item = MirrorMessage> + Send {
        futures_util::stream::unfold(self, |mut run| async move {
            let message = run.next().await?;
            Some((message, run))
        })
    }

    async fn next_message(&mut self) -> Option<MirrorMessage> {
        loop {
            if let Some(message) = self.pending.pop_front() {
                return Some(message);
            }
            if self.phase == Phase::Done {
                return None;
            }
            if self.received >= self.total {
                self.finish().await;
                continue;
            }

            let Some(events) = self.events.as_mut() else {
                self.finish().await;
                continue;
            };

            match tokio::time::timeout(self.recv_timeout, events.recv()).await {
                Ok(Some(event)) => return Some(self.accept(event)),
                Ok(None) => {
                    debug!("All execution units closed the channel");
                    self.finish().await;
                }
                Err(_) => {
                    if self.units_finished() {
                        debug!("Receive timed out and every unit has exited");
                        self.finish().await;
                    }
                }
            }
        }
    }

    fn accept(&mut self, event: UnitEvent) -> MirrorMessage {
        match event {
            UnitEvent::Outcome(message) => {
                self.received += 1;
                message
            }
            UnitEvent::Warning(detail) => MirrorMessage::warning(detail),
        }
    }

    fn units_finished(&self) -> bool {
        self.units.iter().all(|(_, handle)| handle.is_finished())
    }

    /// Joins the units and queues everything that must precede the sentinel
    async fn finish(&mut self) {
        while !self.units_finished() {
            tokio::time::sleep(JOIN_POLL_INTERVAL).await;
        }

        let mut failures = Vec::new();
        for (index, handle) in self.units.drain(..) {
            if let Err(payload) = handle.join() {
                let detail = panic_detail(payload.as_ref());
                warn!(unit = index, panic = %detail, "Execution unit panicked");
                failures.push(MirrorMessage::warning(format!(
                    "execution unit {} failed: {}",
                    index, detail
                )));
            }
        }

        if let Some(mut events) = self.events.take() {
            while let Ok(event) = events.try_recv() {
                let message = self.accept(event);
                self.pending.push_back(message);
            }
        }
        self.pending.extend(failures);

        if self.received < self.total {
            let missing = self.total - self.received;
            warn!(missing, total = self.total, "Items finished without an outcome");
            self.pending.push_back(MirrorMessage::warning(format!(
                "{} item(s) produced no outcome",
                missing
            )));
        }

        info!(
            total = self.total,
            completed = self.received,
            "All execution units finished"
        );
        self.pending.push_back(MirrorMessage::Finished);
        self.phase = Phase::Done;
    }
}
