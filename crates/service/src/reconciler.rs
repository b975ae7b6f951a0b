//! Resolves queued requests once connectivity returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::join_all;
use tokio::task::JoinHandle;
use wastewise_core::{DataUrl, HistoryItem, SyncStatus};
use wastewise_llm::{AnalysisService, Prompts};
use wastewise_storage::{HistoryStore, MergeStats};

use crate::connectivity::ConnectivitySignal;
use crate::guard::FlagGuard;
use crate::notice::{Notice, NoticeKind, Notifier};

/// Result of one `reconcile` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Offline,
    AlreadyRunning,
    NothingPending,
    Completed(PassReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub epoch: u64,
    pub synced: usize,
    pub failed: usize,
    pub merge: MergeStats,
}

/// Runs reconciliation passes, one at a time.
///
/// A pass snapshots the history, resolves every pending item concurrently,
/// waits for all of them, then commits the snapshot by id in one write.
/// Items appended while the pass ran are kept; a cleared history stays cleared.
/// An interrupted pass commits nothing.
pub struct SyncReconciler {
    llm: Arc<dyn AnalysisService>,
    history: Arc<HistoryStore>,
    connectivity: ConnectivitySignal,
    notifier: Notifier,
    prompts: Prompts,
    in_flight: AtomicBool,
    epoch: AtomicU64,
}

impl std::fmt::Debug for SyncReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncReconciler")
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("epoch", &self.epoch.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl SyncReconciler {
    #[must_use]
    pub fn new(
        llm: Arc<dyn AnalysisService>,
        history: Arc<HistoryStore>,
        connectivity: ConnectivitySignal,
        notifier: Notifier,
    ) -> Self {
        Self {
            llm,
            history,
            connectivity,
            notifier,
            prompts: Prompts::default(),
            in_flight: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Epoch of the most recent pass; 0 before the first one.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Starts a pass on every offline-to-online transition, and once at
    /// startup when the session begins online.
    ///
    /// The baseline is read before the task is spawned, so a transition made
    /// before the task first runs is still seen. Each pass runs on its own
    /// task so a transition during a pass is turned away by the in-flight
    /// guard rather than queued.
    pub fn spawn_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut rx = self.connectivity.subscribe();
        let mut was_online = *rx.borrow_and_update();
        tokio::spawn(async move {
            if was_online {
                this.spawn_pass();
            }
            while rx.changed().await.is_ok() {
                let online = *rx.borrow_and_update();
                if online && !was_online {
                    this.spawn_pass();
                }
                was_online = online;
            }
            tracing::debug!("Connectivity signal closed, sync watcher exiting");
        })
    }

    fn spawn_pass(self: &Arc<Self>) {
        let pass = Arc::clone(self);
        tokio::spawn(async move {
            pass.reconcile().await;
        });
    }

    /// Runs one pass if online, idle and something is pending.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        if !self.connectivity.is_online() {
            return ReconcileOutcome::Offline;
        }
        let Some(_in_flight) = FlagGuard::try_acquire(&self.in_flight) else {
            tracing::debug!("Reconciliation already in flight");
            return ReconcileOutcome::AlreadyRunning;
        };
        if self.history.pending_count().await == 0 {
            return ReconcileOutcome::NothingPending;
        }

        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        let snapshot = self.history.snapshot().await;
        let pending = snapshot.iter().filter(|item| item.is_pending()).count();
        tracing::info!(epoch, pending, "Reconciliation pass started");
        self.notifier.kind(NoticeKind::SyncStarted);

        let reconciled = join_all(snapshot.into_iter().map(|item| self.resolve(epoch, item))).await;
        let synced = reconciled
            .iter()
            .filter(|(was_pending, item)| *was_pending && item.sync_status() == SyncStatus::Synced)
            .count();
        let failed = pending - synced;

        let reconciled: Vec<HistoryItem> = reconciled.into_iter().map(|(_, item)| item).collect();
        let merge = match self.history.merge_by_id(reconciled).await {
            Ok(merge) => merge,
            Err(e) => {
                tracing::warn!(epoch, error = %e, "Reconciled history kept in memory only");
                MergeStats::default()
            },
        };
        tracing::info!(
            epoch,
            synced,
            failed,
            retained = merge.retained,
            dropped = merge.dropped,
            "Reconciliation pass completed"
        );
        self.notifier.notify(Notice::with_message(
            NoticeKind::SyncCompleted,
            format!("Saved requests analyzed: {synced} succeeded, {failed} failed."),
        ));
        ReconcileOutcome::Completed(PassReport { epoch, synced, failed, merge })
    }

    /// Resolves one item; non-pending items pass through untouched.
    async fn resolve(&self, epoch: u64, item: HistoryItem) -> (bool, HistoryItem) {
        if !item.is_pending() {
            return (false, item);
        }
        let resolved = match item {
            HistoryItem::Image(image) => {
                let analysis = match DataUrl::parse(&image.image_preview) {
                    Ok(decoded) => self
                        .llm
                        .analyze_image(&decoded.bytes, &image.mime_type, &self.prompts.image, image.location)
                        .await
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };
                match analysis {
                    Ok(analysis) => {
                        let location = image.location;
                        image.into_synced(analysis.with_location(location)).into()
                    },
                    Err(e) => {
                        tracing::warn!(epoch, item_id = %image.id, error = %e, "Queued image failed");
                        HistoryItem::from(image).into_error()
                    },
                }
            },
            HistoryItem::Text(text) => {
                match self.llm.analyze_text_query(&text.original_query, &self.prompts.text).await {
                    Ok(analysis) => text.into_synced(analysis).into(),
                    Err(e) => {
                        tracing::warn!(epoch, item_id = %text.id, error = %e, "Queued question failed");
                        HistoryItem::from(text).into_error()
                    },
                }
            },
        };
        (true, resolved)
    }
}
