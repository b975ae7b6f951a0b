//! Test doubles and module declarations for service tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, broadcast};
use wastewise_core::{ImageAnalysis, ItemAnalysis, Location, Settings, TextAnalysis};
use wastewise_llm::{AnalysisService, LlmError, PromptConfig};
use wastewise_storage::MemoryStore;

use crate::audio::{AudioBuffer, AudioOutput, EndedCallback, OutputFactory, OutputSource};
use crate::{AppContext, AudioError, LocationProbe, MetadataError, MetadataProbe, Notice, NoticeKind, Probes};

mod orchestrator_tests;

pub const IMAGE_KEY: &str = "image";

/// Scriptable analysis service. Calls are keyed by query or speech text, or
/// `IMAGE_KEY` for images; keys can be made to fail or to block until released.
pub struct FakeAnalysis {
    pub image_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
    pub expanded_calls: AtomicUsize,
    pub speech_calls: AtomicUsize,
    pub last_location: Mutex<Option<Location>>,
    failing: Mutex<HashSet<String>>,
    held: Mutex<HashSet<String>>,
    released: Notify,
    speech: Mutex<Vec<u8>>,
}

impl FakeAnalysis {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            image_calls: AtomicUsize::new(0),
            text_calls: AtomicUsize::new(0),
            expanded_calls: AtomicUsize::new(0),
            speech_calls: AtomicUsize::new(0),
            last_location: Mutex::new(None),
            failing: Mutex::new(HashSet::new()),
            held: Mutex::new(HashSet::new()),
            released: Notify::new(),
            speech: Mutex::new(pcm_secs(1.0)),
        })
    }

    pub fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_owned());
    }

    pub fn hold(&self, key: &str) {
        self.held.lock().unwrap().insert(key.to_owned());
    }

    pub fn release(&self, key: &str) {
        self.held.lock().unwrap().remove(key);
        self.released.notify_waiters();
    }

    pub fn set_speech(&self, pcm: Vec<u8>) {
        *self.speech.lock().unwrap() = pcm;
    }

    pub fn total_calls(&self) -> usize {
        self.image_calls.load(Ordering::SeqCst)
            + self.text_calls.load(Ordering::SeqCst)
            + self.expanded_calls.load(Ordering::SeqCst)
            + self.speech_calls.load(Ordering::SeqCst)
    }

    async fn gate(&self, key: &str) -> Result<(), LlmError> {
        loop {
            let released = self.released.notified();
            if !self.held.lock().unwrap().contains(key) {
                break;
            }
            released.await;
        }
        if self.failing.lock().unwrap().contains(key) {
            return Err(LlmError::HttpStatus { code: 500, body: format!("{key} failed") });
        }
        Ok(())
    }
}

#[async_trait]
impl AnalysisService for FakeAnalysis {
    async fn analyze_image(
        &self,
        image: &[u8],
        _media_type: &str,
        _prompt: &PromptConfig,
        location: Option<Location>,
    ) -> Result<ImageAnalysis, LlmError> {
        self.image_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_location.lock().unwrap() = location;
        self.gate(IMAGE_KEY).await?;
        Ok(ImageAnalysis {
            items: vec![ItemAnalysis {
                item_name: format!("Bottle of {} bytes", image.len()),
                waste_type: "Recyclable".to_owned(),
                recyclable: true,
                disposal_suggestion: "Yellow bin".to_owned(),
                reasoning: "PET plastic".to_owned(),
                environmental_impact: "Takes 450 years to decompose".to_owned(),
            }],
            location: None,
        })
    }

    async fn analyze_text_query(&self, query: &str, _prompt: &PromptConfig) -> Result<TextAnalysis, LlmError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(query).await?;
        Ok(TextAnalysis {
            question: query.to_owned(),
            answer: format!("answer to {query}"),
            disposal_suggestion: "Take it to a collection point".to_owned(),
            environmental_impact: "Heavy metals leach into soil".to_owned(),
        })
    }

    async fn get_expanded_content(&self, fact: &str, _prompt: &PromptConfig) -> Result<String, LlmError> {
        self.expanded_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(fact).await?;
        Ok(format!("More about: {fact}"))
    }

    async fn generate_speech(&self, text: &str, _prompt: &PromptConfig) -> Result<Vec<u8>, LlmError> {
        self.speech_calls.fetch_add(1, Ordering::SeqCst);
        self.gate(text).await?;
        Ok(self.speech.lock().unwrap().clone())
    }
}

/// Silent 16-bit mono PCM at 24 kHz.
pub fn pcm_secs(secs: f64) -> Vec<u8> {
    vec![0; (secs * 24_000.0) as usize * 2]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Start(usize),
    Stop(usize),
    Disconnect(usize),
}

/// Manual-clock output recording every source it starts.
pub struct FakeOutputState {
    clock: Mutex<f64>,
    pub offsets: Mutex<Vec<f64>>,
    pub events: Mutex<Vec<OutputEvent>>,
    callbacks: Mutex<Vec<Option<EndedCallback>>>,
    live: AtomicUsize,
    pub max_live: AtomicUsize,
}

impl FakeOutputState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clock: Mutex::new(100.0),
            offsets: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
            live: AtomicUsize::new(0),
            max_live: AtomicUsize::new(0),
        })
    }

    pub fn factory(self: &Arc<Self>) -> OutputFactory {
        let state = Arc::clone(self);
        Box::new(move || Ok(Arc::new(FakeOutput { state: Arc::clone(&state) }) as Arc<dyn AudioOutput>))
    }

    pub fn advance(&self, secs: f64) {
        *self.clock.lock().unwrap() += secs;
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn last_offset(&self) -> f64 {
        *self.offsets.lock().unwrap().last().unwrap()
    }

    /// Fires the end-of-buffer callback of the `index`-th started source.
    pub fn finish(&self, index: usize) {
        let callback = self.callbacks.lock().unwrap()[index].take();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn finish_latest(&self) {
        let index = self.callbacks.lock().unwrap().len() - 1;
        self.finish(index);
    }
}

struct FakeOutput {
    state: Arc<FakeOutputState>,
}

impl AudioOutput for FakeOutput {
    fn current_time(&self) -> f64 {
        *self.state.clock.lock().unwrap()
    }

    fn resume_if_suspended(&self) -> Result<(), AudioError> {
        Ok(())
    }

    fn start(
        &self,
        _buffer: Arc<AudioBuffer>,
        offset: f64,
        on_ended: EndedCallback,
    ) -> Result<Box<dyn OutputSource>, AudioError> {
        let index = {
            let mut callbacks = self.state.callbacks.lock().unwrap();
            callbacks.push(Some(on_ended));
            callbacks.len() - 1
        };
        self.state.offsets.lock().unwrap().push(offset);
        self.state.events.lock().unwrap().push(OutputEvent::Start(index));
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(FakeSource { state: Arc::clone(&self.state), index, connected: true }))
    }
}

struct FakeSource {
    state: Arc<FakeOutputState>,
    index: usize,
    connected: bool,
}

impl OutputSource for FakeSource {
    fn stop(&mut self) {
        self.state.events.lock().unwrap().push(OutputEvent::Stop(self.index));
        // Like a browser, stopping fires the ended callback.
        self.state.finish(self.index);
    }

    fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.state.live.fetch_sub(1, Ordering::SeqCst);
            self.state.events.lock().unwrap().push(OutputEvent::Disconnect(self.index));
        }
    }
}

/// Location probe returning a fixed answer after an optional delay.
pub struct FixedProbe {
    pub location: Option<Location>,
    pub delay: Duration,
}

#[async_trait]
impl LocationProbe for FixedProbe {
    async fn current_location(&self) -> Result<Option<Location>, MetadataError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.location)
    }
}

#[async_trait]
impl MetadataProbe for FixedProbe {
    async fn gps_location(&self, _image: &[u8], _media_type: &str) -> Result<Option<Location>, MetadataError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.location)
    }
}

pub struct Harness {
    pub ctx: AppContext,
    pub llm: Arc<FakeAnalysis>,
    pub output: Arc<FakeOutputState>,
    pub kv: Arc<MemoryStore>,
    pub notices: broadcast::Receiver<Notice>,
}

impl Harness {
    /// Notice kinds received since the last call.
    pub fn notices(&mut self) -> Vec<NoticeKind> {
        let mut kinds = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            kinds.push(notice.kind);
        }
        kinds
    }
}

pub async fn harness(online: bool) -> Harness {
    harness_with(online, Settings::default(), Probes::default()).await
}

pub async fn harness_with(online: bool, settings: Settings, probes: Probes) -> Harness {
    let llm = FakeAnalysis::new();
    let output = FakeOutputState::new();
    let kv = Arc::new(MemoryStore::new());
    let ctx = AppContext::assemble(
        settings,
        Arc::clone(&kv) as Arc<dyn wastewise_storage::KeyValueStore>,
        Arc::clone(&llm) as Arc<dyn AnalysisService>,
        output.factory(),
        probes,
        online,
    )
    .await
    .unwrap();
    let notices = ctx.notifier.subscribe();
    Harness { ctx, llm, output, kv, notices }
}

/// Polls `condition` until it holds, failing the test after a second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
