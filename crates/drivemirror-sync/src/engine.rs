//! Mirror engine
//!
//! [`DriveMirror`] ties a run together: obtain a session, list the remote
//! metadata, index the folders and hand everything to the
//! [`MirrorScheduler`]. Listing and initial-session failures are the only
//! fatal errors and are returned before any execution unit starts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use drivemirror_drive::auth::TokenFileCredentialProvider;
//! use drivemirror_sync::engine::{DriveMirror, MirrorOptions};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let credentials = Arc::new(TokenFileCredentialProvider::new("/home/me/.config/drivemirror/token.json"));
//! let mirror = DriveMirror::new(credentials, MirrorOptions::new("/home/me/DriveMirror"));
//!
//! let mut run = mirror.start().await?;
//! while let Some(message) = run.next().await {
//!     println!("{}", message);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use drivemirror_core::config::Config;
use drivemirror_core::domain::folder_index::FolderIndex;
use drivemirror_core::domain::message::MirrorMessage;
use drivemirror_core::domain::session::SessionToken;
use drivemirror_core::ports::credentials::CredentialProvider;
use drivemirror_drive::client::{DriveClient, DEFAULT_PAGE_SIZE};
use drivemirror_drive::listing::list_items;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::scheduler::{MirrorRun, MirrorScheduler, SchedulerOptions};
use crate::unit::UnitSettings;
use crate::MirrorError;

// ============================================================================
// MirrorOptions
// ============================================================================

/// Everything a run needs besides credentials
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    /// Local directory the remote tree is mirrored into
    pub root: PathBuf,
    pub page_size: u32,
    pub scheduler: SchedulerOptions,
}

impl MirrorOptions {
    /// Default options mirroring into `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: DEFAULT_PAGE_SIZE,
            scheduler: SchedulerOptions::default(),
        }
    }

    /// Builds options from the `mirror` and `api` configuration sections
    pub fn from_config(config: &Config) -> Self {
        let mut options = Self::new(config.mirror.root.clone());
        options.page_size = config.api.page_size;
        options.scheduler.max_units = config.mirror.max_units;
        options.scheduler.recv_timeout = Duration::from_millis(config.mirror.recv_timeout_ms);
        options.scheduler.unit = UnitSettings {
            sub_concurrency: config.mirror.sub_concurrency,
            max_retries: config.api.max_retries,
            ..UnitSettings::default()
        };
        options
    }

    pub fn with_max_units(mut self, max_units: usize) -> Self {
        self.scheduler.max_units = Some(max_units);
        self
    }

    pub fn with_sub_concurrency(mut self, sub_concurrency: usize) -> Self {
        self.scheduler.unit.sub_concurrency = sub_concurrency;
        self
    }

    /// Overrides the detected parallelism (useful for testing)
    pub fn with_available_parallelism(mut self, available: usize) -> Self {
        self.scheduler.available_parallelism = available;
        self
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.scheduler.recv_timeout = timeout;
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.scheduler.unit.backoff_base = base;
        self
    }
}

// ============================================================================
// DriveMirror
// ============================================================================

/// Entry point of a mirror run
pub struct DriveMirror {
    credentials: Arc<dyn CredentialProvider>,
    options: MirrorOptions,
}

impl DriveMirror {
    pub fn new(credentials: Arc<dyn CredentialProvider>, options: MirrorOptions) -> Self {
        Self {
            credentials,
            options,
        }
    }

    pub fn options(&self) -> &MirrorOptions {
        &self.options
    }

    pub fn root(&self) -> &Path {
        &self.options.root
    }

    /// Lists the remote tree and starts transferring it
    ///
    /// # Returns
    /// The running [`MirrorRun`]; transfers proceed while it is consumed.
    ///
    /// # Errors
    /// - [`MirrorError::Credentials`] if no session can be obtained
    /// - [`MirrorError::Metadata`] if any listing page fails
    pub async fn start(&self) -> Result<MirrorRun, MirrorError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("mirror_run", %run_id);

        async {
            info!(root = %self.options.root.display(), "Starting mirror run");

            let session = self.initial_session().await?;
            let client = DriveClient::for_session(&session)
                .with_max_retries(self.options.scheduler.unit.max_retries)
                .with_backoff_base(self.options.scheduler.unit.backoff_base)
                .with_page_size(self.options.page_size);

            let items = list_items(&client).await?;
            let folder_index = Arc::new(FolderIndex::from_items(&items));
            info!(
                items = items.len(),
                folders = folder_index.len(),
                "Listed remote items"
            );

            let scheduler = MirrorScheduler::new(
                self.options.scheduler.clone(),
                session,
                self.credentials.clone(),
                folder_index,
            )
            .with_span(tracing::Span::current());

            Ok::<MirrorRun, MirrorError>(scheduler.run(items, &self.options.root))
        }
        .instrument(span)
        .await
    }

    /// Fetches the session, refreshing it once if it is about to expire
    ///
    /// A failed refresh here is not fatal: the listing is attempted with
    /// the current token.
    async fn initial_session(&self) -> Result<SessionToken, MirrorError> {
        let session = self.credentials.session().await?;
        if !session.needs_refresh() {
            return Ok(session);
        }

        match self.credentials.refresh(&session).await {
            Ok(fresh) => {
                info!("Refreshed session before listing");
                Ok(fresh)
            }
            Err(e) => {
                warn!(error = %e, "Initial token refresh failed, using current token");
                Ok(session)
            }
        }
    }
}

// ============================================================================
// MirrorSummary
// ============================================================================

/// Outcome counts of a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MirrorSummary {
    pub downloaded: usize,
    pub skipped_existing: usize,
    pub skipped_no_export: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl MirrorSummary {
    /// Counts one message
    pub fn record(&mut self, message: &MirrorMessage) {
        match message {
            MirrorMessage::Downloaded { .. } => self.downloaded += 1,
            MirrorMessage::SkippedExists { .. } => self.skipped_existing += 1,
            MirrorMessage::SkippedNoExport { .. } => self.skipped_no_export += 1,
            MirrorMessage::Error { .. } => self.errors += 1,
            MirrorMessage::Warning { .. } => self.warnings += 1,
            MirrorMessage::Finished | MirrorMessage::NoFiles => {}
        }
    }

    /// Number of items that reached a terminal outcome
    pub fn outcomes(&self) -> usize {
        self.downloaded + self.skipped_existing + self.skipped_no_export + self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl<'a> FromIterator<&'a MirrorMessage> for MirrorSummary {
    fn from_iter<I: IntoIterator<Item = &'a MirrorMessage>>(iter: I) -> Self {
        let mut summary = Self::default();
        for message in iter {
            summary.record(message);
        }
        summary
    }
}
