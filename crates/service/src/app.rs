//! Wiring of the whole core for one session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;
use wastewise_core::{IdGenerator, Settings};
use wastewise_llm::{AnalysisClient, AnalysisService, Prompts};
use wastewise_storage::{HistoryStore, KeyValueStore, Preferences, SqliteStore};

use crate::audio::{AudioPlaybackController, OutputFactory};
use crate::cache::AnalysisCache;
use crate::connectivity::ConnectivitySignal;
use crate::notice::Notifier;
use crate::orchestrator::RequestOrchestrator;
use crate::probe::{LocationProbe, MetadataProbe, NoLocation};
use crate::reconciler::SyncReconciler;

/// Location sources handed to the orchestrator.
pub struct Probes {
    pub location: Arc<dyn LocationProbe>,
    pub metadata: Arc<dyn MetadataProbe>,
}

impl Default for Probes {
    fn default() -> Self {
        Self { location: Arc::new(NoLocation), metadata: Arc::new(NoLocation) }
    }
}

/// Every long-lived collaborator of a session.
///
/// Dropping the context stops the connectivity watcher.
pub struct AppContext {
    pub settings: Settings,
    pub notifier: Notifier,
    pub connectivity: ConnectivitySignal,
    pub history: Arc<HistoryStore>,
    pub preferences: Preferences,
    pub cache: Arc<AnalysisCache>,
    pub audio: Arc<AudioPlaybackController>,
    pub orchestrator: Arc<RequestOrchestrator>,
    pub reconciler: Arc<SyncReconciler>,
    sync_watcher: JoinHandle<()>,
}

impl AppContext {
    /// Installs the fmt subscriber, honouring `RUST_LOG` (default `info`).
    /// Later calls are no-ops.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Opens the SQLite store and the HTTP client from `settings`, then wires everything.
    pub async fn bootstrap(
        settings: Settings,
        output: OutputFactory,
        probes: Probes,
        online: bool,
    ) -> anyhow::Result<Self> {
        if let Some(parent) = settings.db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating data directory {}", parent.display()))?;
        }
        let kv: Arc<dyn KeyValueStore> = Arc::new(
            SqliteStore::open(&settings.db_path)
                .with_context(|| format!("opening database {}", settings.db_path.display()))?,
        );
        let llm: Arc<dyn AnalysisService> =
            Arc::new(AnalysisClient::from_settings(&settings).context("configuring analysis client")?);
        Self::assemble(settings, kv, llm, output, probes, online).await
    }

    /// Wires the session around an existing store and analysis service.
    ///
    /// Must run inside a Tokio runtime.
    pub async fn assemble(
        settings: Settings,
        kv: Arc<dyn KeyValueStore>,
        llm: Arc<dyn AnalysisService>,
        output: OutputFactory,
        probes: Probes,
        online: bool,
    ) -> anyhow::Result<Self> {
        let notifier = Notifier::default();
        let connectivity = ConnectivitySignal::new(online);
        let history = Arc::new(HistoryStore::load(Arc::clone(&kv)).await.context("loading history")?);
        let preferences = Preferences::new(kv);

        let ids = IdGenerator::new();
        for item in history.snapshot().await {
            ids.observe(item.id());
        }

        let prompts = Prompts::default();
        let cache = Arc::new(AnalysisCache::new());
        let audio = Arc::new(AudioPlaybackController::new(
            Arc::clone(&llm),
            prompts.speech.clone(),
            output,
            notifier.clone(),
        ));
        let orchestrator = Arc::new(
            RequestOrchestrator::new(
                Arc::clone(&llm),
                Arc::clone(&history),
                Arc::clone(&cache),
                connectivity.clone(),
                Arc::clone(&audio),
                notifier.clone(),
            )
            .with_probes(probes.location, probes.metadata)
            .with_prompts(prompts.clone())
            .with_limits(settings.max_image_bytes, Duration::from_millis(settings.geolocation_timeout_ms))
            .with_ids(ids),
        );
        let reconciler = Arc::new(
            SyncReconciler::new(llm, Arc::clone(&history), connectivity.clone(), notifier.clone())
                .with_prompts(prompts),
        );
        let sync_watcher = reconciler.spawn_watcher();

        let items = history.len().await;
        tracing::info!(items, online, "Session ready");
        Ok(Self {
            settings,
            notifier,
            connectivity,
            history,
            preferences,
            cache,
            audio,
            orchestrator,
            reconciler,
            sync_watcher,
        })
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.sync_watcher.abort();
        self.audio.stop();
    }
}
