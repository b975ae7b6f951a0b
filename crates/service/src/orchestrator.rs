//! Request handling: offline queuing, cache lookup, remote analysis and
//! history recording, plus the editing state those requests are built from.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use wastewise_core::{
    AnalysisMode, AnalysisResult, DEFAULT_GEOLOCATION_TIMEOUT_MS, DEFAULT_MAX_IMAGE_BYTES, DataUrl,
    EducationalContent, HistoryItem, IdGenerator, ImageHistoryItem, Location, SyncStatus,
    TextHistoryItem,
};
use wastewise_llm::{AnalysisService, LlmError, Prompts};
use wastewise_storage::HistoryStore;

use crate::audio::AudioPlaybackController;
use crate::cache::AnalysisCache;
use crate::connectivity::ConnectivitySignal;
use crate::error::{ServiceError, ValidationError};
use crate::guard::FlagGuard;
use crate::notice::{Notice, NoticeKind, Notifier};
use crate::probe::{self, LocationProbe, MetadataProbe, NoLocation};

/// Image picked for analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedImage {
    pub bytes: Arc<[u8]>,
    pub media_type: String,
    /// Self-contained data URL; stored in history and used as cache key.
    pub preview: String,
}

/// The editing state requests are built from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EditorSnapshot {
    pub mode: AnalysisMode,
    pub image: Option<SelectedImage>,
    pub text_query: String,
    pub location: Option<Location>,
    pub result: Option<AnalysisResult>,
    /// Set when a synced history entry was loaded; bypasses the cache.
    pub reanalyzing: bool,
}

#[derive(Debug)]
pub enum AnalyzeOutcome {
    /// Offline: recorded as a pending history item.
    Queued { item_id: String },
    Cached(AnalysisResult),
    Analyzed(AnalysisResult),
    Rejected(ValidationError),
    Failed(ServiceError),
    /// Another analysis is still running.
    Busy,
}

#[derive(Default)]
struct Editor {
    state: EditorSnapshot,
    /// Bumped on every input change so late results can tell they are stale.
    generation: u64,
}

impl Editor {
    fn replace(&mut self, state: EditorSnapshot) -> u64 {
        self.state = state;
        self.generation += 1;
        self.generation
    }
}

struct Request {
    mode: AnalysisMode,
    image: Option<SelectedImage>,
    query: String,
    location: Option<Location>,
    reanalyzing: bool,
    generation: u64,
}

impl Request {
    /// The query as used for validation and cache lookups.
    fn trimmed_query(&self) -> &str {
        self.query.trim()
    }
}

pub struct RequestOrchestrator {
    llm: Arc<dyn AnalysisService>,
    history: Arc<HistoryStore>,
    cache: Arc<AnalysisCache>,
    connectivity: ConnectivitySignal,
    audio: Arc<AudioPlaybackController>,
    notifier: Notifier,
    location_probe: Arc<dyn LocationProbe>,
    metadata_probe: Arc<dyn MetadataProbe>,
    prompts: Prompts,
    ids: IdGenerator,
    max_image_bytes: usize,
    probe_timeout: Duration,
    editor: Mutex<Editor>,
    busy: AtomicBool,
}

impl std::fmt::Debug for RequestOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestOrchestrator")
            .field("max_image_bytes", &self.max_image_bytes)
            .field("probe_timeout", &self.probe_timeout)
            .finish_non_exhaustive()
    }
}

impl RequestOrchestrator {
    #[must_use]
    pub fn new(
        llm: Arc<dyn AnalysisService>,
        history: Arc<HistoryStore>,
        cache: Arc<AnalysisCache>,
        connectivity: ConnectivitySignal,
        audio: Arc<AudioPlaybackController>,
        notifier: Notifier,
    ) -> Self {
        Self {
            llm,
            history,
            cache,
            connectivity,
            audio,
            notifier,
            location_probe: Arc::new(NoLocation),
            metadata_probe: Arc::new(NoLocation),
            prompts: Prompts::default(),
            ids: IdGenerator::new(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            probe_timeout: Duration::from_millis(DEFAULT_GEOLOCATION_TIMEOUT_MS),
            editor: Mutex::new(Editor::default()),
            busy: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_probes(mut self, location: Arc<dyn LocationProbe>, metadata: Arc<dyn MetadataProbe>) -> Self {
        self.location_probe = location;
        self.metadata_probe = metadata;
        self
    }

    #[must_use]
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    #[must_use]
    pub const fn with_limits(mut self, max_image_bytes: usize, probe_timeout: Duration) -> Self {
        self.max_image_bytes = max_image_bytes;
        self.probe_timeout = probe_timeout;
        self
    }

    /// Uses `ids` for new history items, e.g. one seeded from persisted history.
    #[must_use]
    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub const fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<AnalysisCache> {
        &self.cache
    }

    #[must_use]
    pub fn editor_snapshot(&self) -> EditorSnapshot {
        self.editor().state.clone()
    }

    #[must_use]
    pub fn current_result(&self) -> Option<AnalysisResult> {
        self.editor().state.result.clone()
    }

    /// Selects an image, replacing the current input.
    ///
    /// Embedded GPS coordinates, if the metadata probe finds any, are attached
    /// to the selection.
    ///
    /// # Errors
    /// Rejects empty images and images over the size limit, leaving the
    /// editor untouched.
    pub async fn select_image(&self, bytes: Vec<u8>, media_type: &str) -> Result<(), ValidationError> {
        self.audio.stop();
        if bytes.is_empty() {
            return Err(self.rejected(ValidationError::MissingImage));
        }
        if bytes.len() > self.max_image_bytes {
            return Err(self.rejected(ValidationError::ImageTooLarge {
                size: bytes.len(),
                limit: self.max_image_bytes,
            }));
        }

        let image = SelectedImage {
            preview: DataUrl::encode(media_type, &bytes),
            bytes: Arc::from(bytes),
            media_type: media_type.to_owned(),
        };
        let generation = self.editor().replace(EditorSnapshot {
            mode: AnalysisMode::Image,
            image: Some(image.clone()),
            ..EditorSnapshot::default()
        });

        let found = probe::bounded(
            "image metadata",
            self.probe_timeout,
            self.metadata_probe.gps_location(&image.bytes, &image.media_type),
        )
        .await;
        if let Some(location) = found {
            let mut editor = self.editor();
            if editor.generation == generation && editor.state.location.is_none() {
                editor.state.location = Some(location);
                drop(editor);
                tracing::debug!(lat = location.lat, lon = location.lon, "GPS found in image metadata");
                self.notifier.kind(NoticeKind::GpsFound);
            }
        }
        Ok(())
    }

    pub fn set_text_query(&self, query: &str) {
        let mut editor = self.editor();
        editor.state.text_query = query.to_owned();
        editor.state.reanalyzing = false;
        editor.generation += 1;
    }

    /// Switches input mode; a real switch discards the current input.
    pub fn set_mode(&self, mode: AnalysisMode) {
        let mut editor = self.editor();
        if editor.state.mode == mode {
            return;
        }
        editor.replace(EditorSnapshot { mode, ..EditorSnapshot::default() });
        drop(editor);
        self.audio.stop();
    }

    /// Discards the current input and result, keeping the mode.
    pub fn clear(&self) {
        self.reset_editor();
        self.audio.stop();
    }

    fn reset_editor(&self) {
        let mut editor = self.editor();
        let mode = editor.state.mode;
        editor.replace(EditorSnapshot { mode, ..EditorSnapshot::default() });
    }

    /// Loads a history entry's input and stored result without re-querying.
    ///
    /// Synced entries arm reanalysis, so the next `analyze` skips the cache.
    /// Returns `None` if no entry has that id.
    pub async fn select_history_item(&self, id: &str) -> Option<EditorSnapshot> {
        self.audio.stop();
        let item = self.history.get(id).await?;
        let status = item.sync_status();
        let mut state = EditorSnapshot {
            mode: item.mode(),
            result: item.result(),
            reanalyzing: status == SyncStatus::Synced,
            ..EditorSnapshot::default()
        };
        match &item {
            HistoryItem::Image(image) => {
                state.location = image.location;
                state.image = match DataUrl::parse(&image.image_preview) {
                    Ok(decoded) => Some(SelectedImage {
                        bytes: Arc::from(decoded.bytes),
                        media_type: image.mime_type.clone(),
                        preview: image.image_preview.clone(),
                    }),
                    Err(e) => {
                        tracing::warn!(item_id = id, error = %e, "Stored preview is not decodable");
                        None
                    },
                };
            },
            HistoryItem::Text(text) => state.text_query.clone_from(&text.original_query),
        }

        match status {
            SyncStatus::Pending => self.notifier.kind(NoticeKind::HistoryPending),
            SyncStatus::Error => self.notifier.kind(NoticeKind::HistoryError),
            SyncStatus::Synced => {},
        }
        self.editor().replace(state.clone());
        Some(state)
    }

    /// Empties the history.
    ///
    /// # Errors
    /// Returns an error if the empty history could not be persisted.
    pub async fn clear_history(&self) -> Result<(), ServiceError> {
        self.history.clear().await?;
        tracing::info!("History cleared");
        Ok(())
    }

    /// Expands an environmental-impact fact. Failures are notified and yield `None`.
    pub async fn learn_more(&self, fact: &str) -> Option<EducationalContent> {
        match self.llm.get_expanded_content(fact, &self.prompts.educational).await {
            Ok(content) => Some(EducationalContent { title: fact.to_owned(), content }),
            Err(e) => {
                tracing::error!(error = %e, "Educational content failed");
                self.notifier.notify(Notice::with_message(
                    NoticeKind::EducationalContentFailed,
                    format!("{}: {e}", self.prompts.educational.error),
                ));
                None
            },
        }
    }

    /// Runs the current input.
    ///
    /// Offline, a valid input is queued as a pending history item and nothing
    /// is sent. Online, a fresh request is answered from the cache when
    /// possible; otherwise the remote service is called and a successful
    /// result is cached and recorded. Failed online requests leave no history.
    pub async fn analyze(&self) -> AnalyzeOutcome {
        let Some(_busy) = FlagGuard::try_acquire(&self.busy) else {
            tracing::debug!("Analysis already running");
            self.notifier.kind(NoticeKind::Busy);
            return AnalyzeOutcome::Busy;
        };
        self.audio.stop();
        let request = self.request();

        if !self.connectivity.is_online() {
            return self.queue_offline(request).await;
        }
        if let Err(e) = Self::validate(&request) {
            return AnalyzeOutcome::Rejected(self.rejected(e));
        }

        let fingerprint = match (&request.mode, &request.image) {
            (AnalysisMode::Image, Some(image)) => image.preview.clone(),
            _ => request.trimmed_query().to_owned(),
        };
        if !request.reanalyzing {
            if let Some(result) = self.cache.get(&fingerprint).await {
                tracing::debug!(mode = request.mode.as_str(), "Cache hit");
                self.notifier.kind(NoticeKind::LoadedFromCache);
                self.show_result(request.generation, &result);
                return AnalyzeOutcome::Cached(result);
            }
        }

        let analyzed = match request.mode {
            AnalysisMode::Image => self.analyze_image(&request).await,
            AnalysisMode::Text => self.analyze_text(&request).await,
        };
        match analyzed {
            Ok((result, item)) => {
                self.cache.set(fingerprint, result.clone()).await;
                self.show_result(request.generation, &result);
                let item_id = item.id().to_owned();
                if let Err(e) = self.history.append(item).await {
                    tracing::warn!(item_id = %item_id, error = %e, "Analysis kept in memory only");
                }
                tracing::info!(item_id = %item_id, mode = request.mode.as_str(), reanalysis = request.reanalyzing, "Analysis complete");
                AnalyzeOutcome::Analyzed(result)
            },
            Err(e) => {
                tracing::error!(mode = request.mode.as_str(), error = %e, "Analysis failed");
                let prompt_error = match request.mode {
                    AnalysisMode::Image => &self.prompts.image.error,
                    AnalysisMode::Text => &self.prompts.text.error,
                };
                self.notifier
                    .notify(Notice::with_message(NoticeKind::AnalysisFailed, format!("{prompt_error}: {e}")));
                AnalyzeOutcome::Failed(ServiceError::Llm(e))
            },
        }
    }

    async fn queue_offline(&self, request: Request) -> AnalyzeOutcome {
        let has_query = !request.trimmed_query().is_empty();
        let item: HistoryItem = match (request.mode, request.image) {
            (AnalysisMode::Image, Some(image)) => {
                ImageHistoryItem::pending(self.ids.next_id(), image.preview, image.media_type, request.location)
                    .into()
            },
            (AnalysisMode::Text, _) if has_query => {
                TextHistoryItem::pending(self.ids.next_id(), request.query).into()
            },
            _ => return AnalyzeOutcome::Rejected(self.rejected(ValidationError::OfflineNoInput)),
        };
        let item_id = item.id().to_owned();
        if let Err(e) = self.history.append(item).await {
            tracing::warn!(item_id = %item_id, error = %e, "Queued request kept in memory only");
        }
        tracing::info!(item_id = %item_id, mode = request.mode.as_str(), "Request queued while offline");
        self.reset_editor();
        self.notifier.kind(NoticeKind::OfflineQueued);
        AnalyzeOutcome::Queued { item_id }
    }

    async fn analyze_image(&self, request: &Request) -> Result<(AnalysisResult, HistoryItem), LlmError> {
        let Some(image) = request.image.as_ref() else {
            return Err(LlmError::InvalidPayload("no image selected".to_owned()));
        };
        let location = match request.location {
            Some(location) => Some(location),
            None => {
                let found = probe::bounded(
                    "geolocation",
                    self.probe_timeout,
                    self.location_probe.current_location(),
                )
                .await;
                if found.is_some() {
                    self.notifier.kind(NoticeKind::LocationUsed);
                }
                found
            },
        };

        let analysis = self
            .llm
            .analyze_image(&image.bytes, &image.media_type, &self.prompts.image, location)
            .await?
            .with_location(location);
        let item = ImageHistoryItem::synced(
            self.ids.next_id(),
            image.preview.clone(),
            image.media_type.clone(),
            location,
            analysis.clone(),
        );
        Ok((AnalysisResult::Image(analysis), item.into()))
    }

    async fn analyze_text(&self, request: &Request) -> Result<(AnalysisResult, HistoryItem), LlmError> {
        let analysis = self.llm.analyze_text_query(&request.query, &self.prompts.text).await?;
        let item = TextHistoryItem::synced(self.ids.next_id(), request.query.clone(), analysis.clone());
        Ok((AnalysisResult::Text(analysis), item.into()))
    }

    fn validate(request: &Request) -> Result<(), ValidationError> {
        match request.mode {
            AnalysisMode::Image if request.image.is_none() => Err(if request.reanalyzing {
                ValidationError::MissingReanalysisData
            } else {
                ValidationError::MissingImage
            }),
            AnalysisMode::Text if request.trimmed_query().is_empty() => Err(ValidationError::EmptyQuery),
            _ => Ok(()),
        }
    }

    fn rejected(&self, err: ValidationError) -> ValidationError {
        tracing::debug!(error = %err, "Request rejected");
        let notice = match err {
            ValidationError::MissingImage => Notice::new(NoticeKind::SelectImage),
            ValidationError::EmptyQuery => Notice::new(NoticeKind::EnterQuestion),
            ValidationError::ImageTooLarge { limit, .. } => Notice::with_message(
                NoticeKind::ImageTooLarge,
                format!("The image is too large. The maximum size is {} MB.", limit / (1024 * 1024)),
            ),
            ValidationError::MissingReanalysisData => Notice::new(NoticeKind::MissingReanalysisData),
            ValidationError::OfflineNoInput => Notice::new(NoticeKind::OfflineNoInput),
        };
        self.notifier.notify(notice);
        err
    }

    fn request(&self) -> Request {
        let editor = self.editor();
        Request {
            mode: editor.state.mode,
            image: editor.state.image.clone(),
            query: editor.state.text_query.clone(),
            location: editor.state.location,
            reanalyzing: editor.state.reanalyzing,
            generation: editor.generation,
        }
    }

    fn show_result(&self, generation: u64, result: &AnalysisResult) {
        let mut editor = self.editor();
        if editor.generation == generation {
            editor.state.result = Some(result.clone());
            editor.state.reanalyzing = false;
        } else {
            tracing::debug!("Input changed during analysis, result not shown");
        }
    }

    fn editor(&self) -> MutexGuard<'_, Editor> {
        self.editor.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
