//! User-visible notices, broadcast to whoever renders them.

use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// What a notice is about. The rendering layer may localize by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    OfflineQueued,
    OfflineNoInput,
    LoadedFromCache,
    GpsFound,
    LocationUsed,
    SelectImage,
    EnterQuestion,
    ImageTooLarge,
    MissingReanalysisData,
    AnalysisFailed,
    HistoryPending,
    HistoryError,
    SyncStarted,
    SyncCompleted,
    AudioFailed,
    EducationalContentFailed,
    Busy,
}

impl NoticeKind {
    #[must_use]
    pub const fn level(self) -> NoticeLevel {
        match self {
            Self::OfflineNoInput
            | Self::SelectImage
            | Self::EnterQuestion
            | Self::ImageTooLarge
            | Self::MissingReanalysisData
            | Self::AnalysisFailed
            | Self::HistoryError
            | Self::AudioFailed
            | Self::EducationalContentFailed => NoticeLevel::Error,
            Self::OfflineQueued
            | Self::LoadedFromCache
            | Self::GpsFound
            | Self::LocationUsed
            | Self::HistoryPending
            | Self::SyncStarted
            | Self::SyncCompleted
            | Self::Busy => NoticeLevel::Info,
        }
    }

    const fn default_message(self) -> &'static str {
        match self {
            Self::OfflineQueued => "You are offline. The request was saved and will be analyzed when you reconnect.",
            Self::OfflineNoInput => "You are offline. Select an image or type a question to save it for later.",
            Self::LoadedFromCache => "Result loaded from cache.",
            Self::GpsFound => "Location found in the image metadata.",
            Self::LocationUsed => "Using your current location for local disposal guidance.",
            Self::SelectImage => "Please select an image first.",
            Self::EnterQuestion => "Please enter a question.",
            Self::ImageTooLarge => "The image is too large.",
            Self::MissingReanalysisData => "The original input for this entry is no longer available.",
            Self::AnalysisFailed => "The analysis failed.",
            Self::HistoryPending => "This request is waiting to be analyzed when you are back online.",
            Self::HistoryError => "This request could not be analyzed.",
            Self::SyncStarted => "Back online. Analyzing saved requests.",
            Self::SyncCompleted => "Saved requests have been analyzed.",
            Self::AudioFailed => "Could not play the audio.",
            Self::EducationalContentFailed => "Could not load more information.",
            Self::Busy => "An analysis is already running.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn new(kind: NoticeKind) -> Self {
        Self::with_message(kind, kind.default_message())
    }

    #[must_use]
    pub fn with_message(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self { level: kind.level(), kind, message: message.into() }
    }
}

/// Fan-out of notices to every subscriber.
///
/// Sending with nobody subscribed is fine; slow subscribers lag and lose the
/// oldest notices.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(100)
    }
}

impl Notifier {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn notify(&self, notice: Notice) {
        tracing::debug!(kind = ?notice.kind, "{}", notice.message);
        let _ = self.tx.send(notice);
    }

    pub fn kind(&self, kind: NoticeKind) {
        self.notify(Notice::new(kind));
    }
}
