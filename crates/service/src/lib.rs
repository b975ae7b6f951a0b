//! Service layer for wastewise
//!
//! Request orchestration with offline queuing and memoization, background
//! reconciliation of queued requests, and speech playback.

#![allow(clippy::missing_errors_doc, reason = "Errors are self-explanatory from Result types")]
#![allow(let_underscore_drop, reason = "Intentionally dropping values")]

mod app;
pub mod audio;
mod cache;
mod connectivity;
mod error;
mod guard;
mod notice;
mod orchestrator;
mod probe;
mod reconciler;

#[cfg(test)]
mod tests;

pub use app::{AppContext, Probes};
pub use audio::{AudioPlaybackController, AudioSnapshot, AudioStatus};
pub use cache::AnalysisCache;
pub use connectivity::ConnectivitySignal;
pub use error::{AudioError, MetadataError, ServiceError, ValidationError};
pub use notice::{Notice, NoticeKind, NoticeLevel, Notifier};
pub use orchestrator::{AnalyzeOutcome, EditorSnapshot, RequestOrchestrator, SelectedImage};
pub use probe::{LocationProbe, MetadataProbe, NoLocation};
pub use reconciler::{PassReport, ReconcileOutcome, SyncReconciler};
