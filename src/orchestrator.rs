//! Single-slot streaming orchestrator.
//!
//! Each submitted request runs on its own named worker thread. Only the most
//! recent request owns the active slot; submitting again supersedes it. Every
//! emission takes the active-slot lock and checks the request id, so once
//! `submit` or `cancel` returns a superseded request can no longer reach the
//! sink even if its transport keeps producing fragments.

use std::collections::BTreeMap;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use generation_provider::{
    CancelSignal, GenerationEvent, GenerationProvider, GenerationRequest, RequestId,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::change::{ChangeDetector, SectionChanges};
use crate::formatter::ResponseFormatter;

/// Phases retained for `phase()` lookups.
const PHASE_HISTORY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamPhase {
    Idle,
    Requesting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl StreamPhase {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Requesting | Self::Streaming)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    ReasoningUpdated { request_id: RequestId, text: String },
    AnswerUpdated { request_id: RequestId, html: String },
    RawUpdated { request_id: RequestId, text: String },
    Error { request_id: RequestId, message: String },
    Completed { request_id: RequestId, response: String },
}

impl StreamEvent {
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::ReasoningUpdated { request_id, .. }
            | Self::AnswerUpdated { request_id, .. }
            | Self::RawUpdated { request_id, .. }
            | Self::Error { request_id, .. }
            | Self::Completed { request_id, .. } => *request_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Completed { .. })
    }
}

/// Receives orchestrator events in processing order.
///
/// `emit` runs on worker threads while the active-slot lock is held, so it
/// must not call back into the orchestrator.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: StreamEvent);
}

impl EventSink for mpsc::Sender<StreamEvent> {
    fn emit(&self, event: StreamEvent) {
        if self.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(F);

pub fn sink_fn<F>(callback: F) -> FnSink<F>
where
    F: Fn(StreamEvent) + Send + Sync + 'static,
{
    FnSink(callback)
}

impl<F> EventSink for FnSink<F>
where
    F: Fn(StreamEvent) + Send + Sync + 'static,
{
    fn emit(&self, event: StreamEvent) {
        (self.0)(event);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatRequest {
    pub model: String,
    pub prompt: String,
}

impl FormatRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to spawn generation worker: {0}")]
    Spawn(#[from] io::Error),
}

/// Per-request accumulator owned by exactly one worker.
#[derive(Debug, Default)]
pub struct StreamState {
    accumulated: String,
    detector: ChangeDetector,
}

impl StreamState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one fragment and re-derive both sections from the whole text.
    pub fn push_fragment(&mut self, fragment: &str, formatter: &ResponseFormatter) -> SectionChanges {
        self.accumulated.push_str(fragment);
        let sections = formatter.split_sections(&self.accumulated);
        self.detector
            .observe(&sections, |answer| formatter.render_answer(answer))
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn into_accumulated(self) -> String {
        self.accumulated
    }
}

struct ActiveRequest {
    request_id: RequestId,
    cancel: CancelSignal,
}

pub struct StreamOrchestrator {
    provider: Arc<dyn GenerationProvider>,
    sink: Box<dyn EventSink>,
    formatter: ResponseFormatter,
    next_request_id: AtomicU64,
    active: Mutex<Option<ActiveRequest>>,
    phases: Mutex<BTreeMap<RequestId, StreamPhase>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl StreamOrchestrator {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        sink: impl EventSink,
        formatter: ResponseFormatter,
    ) -> Arc<Self> {
        Arc::new(Self {
            provider,
            sink: Box::new(sink),
            formatter,
            next_request_id: AtomicU64::new(1),
            active: Mutex::new(None),
            phases: Mutex::new(BTreeMap::new()),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Start streaming `request` in the background, superseding any request
    /// that is still in flight. Returns without waiting for the transport.
    pub fn submit(self: &Arc<Self>, request: FormatRequest) -> Result<RequestId, OrchestratorError> {
        self.reap_finished_workers();

        let mut active = self.lock_active();
        if let Some(previous) = active.take() {
            previous.cancel.store(true, Ordering::SeqCst);
            self.set_phase(previous.request_id, StreamPhase::Cancelled);
            info!(request_id = previous.request_id, "request superseded");
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let cancel: CancelSignal = Arc::new(AtomicBool::new(false));
        self.set_phase(request_id, StreamPhase::Requesting);
        info!(request_id, model = %request.model, "request submitted");

        let generation = GenerationRequest {
            request_id,
            model: request.model,
            prompt: request.prompt,
        };
        let join_handle = match self.spawn_worker(generation, Arc::clone(&cancel)) {
            Ok(join_handle) => join_handle,
            Err(error) => {
                self.set_phase(request_id, StreamPhase::Failed);
                warn!(request_id, %error, "worker spawn failed");
                return Err(error.into());
            }
        };

        *active = Some(ActiveRequest { request_id, cancel });
        drop(active);
        lock_unpoisoned(&self.workers).push(join_handle);

        Ok(request_id)
    }

    /// Cancel the in-flight request, if any. No further events are emitted
    /// for it once this returns.
    pub fn cancel(&self) -> Option<RequestId> {
        let mut active = self.lock_active();
        let cancelled = active.take()?;
        cancelled.cancel.store(true, Ordering::SeqCst);
        self.set_phase(cancelled.request_id, StreamPhase::Cancelled);
        info!(request_id = cancelled.request_id, "request cancelled");
        Some(cancelled.request_id)
    }

    pub fn active_request(&self) -> Option<RequestId> {
        self.lock_active().as_ref().map(|active| active.request_id)
    }

    /// Unknown or long-evicted ids report `Idle`.
    pub fn phase(&self, request_id: RequestId) -> StreamPhase {
        lock_unpoisoned(&self.phases)
            .get(&request_id)
            .copied()
            .unwrap_or(StreamPhase::Idle)
    }

    /// Join every worker spawned so far, superseded ones included.
    pub fn join_workers(&self) {
        let workers = std::mem::take(&mut *lock_unpoisoned(&self.workers));
        for worker in workers {
            if worker.join().is_err() {
                warn!("generation worker thread panicked outside the pipeline");
            }
        }
    }

    fn spawn_worker(
        self: &Arc<Self>,
        request: GenerationRequest,
        cancel: CancelSignal,
    ) -> io::Result<JoinHandle<()>> {
        let orchestrator = Arc::clone(self);
        thread::Builder::new()
            .name(format!("stream-formatter-request-{}", request.request_id))
            .spawn(move || orchestrator.run_worker(request, cancel))
    }

    fn run_worker(self: Arc<Self>, request: GenerationRequest, cancel: CancelSignal) {
        let request_id = request.request_id;
        let provider = Arc::clone(&self.provider);
        let mut state = StreamState::new();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let mut on_event = |event: GenerationEvent| match event {
                GenerationEvent::Connected { .. } => {
                    self.transition(request_id, &cancel, StreamPhase::Streaming);
                }
                GenerationEvent::Fragment { text, .. } => {
                    if cancel.load(Ordering::SeqCst) {
                        return;
                    }
                    let changes = state.push_fragment(&text, &self.formatter);
                    debug!(
                        request_id,
                        fragment_len = text.len(),
                        reasoning_changed = changes.reasoning.is_some(),
                        answer_changed = changes.answer_html.is_some(),
                        "fragment processed"
                    );
                    self.emit_fragment(request_id, &cancel, changes, state.accumulated());
                }
            };
            provider.generate(request, Arc::clone(&cancel), &mut on_event)
        }));

        match outcome {
            Ok(Ok(())) => {
                let response = state.into_accumulated();
                info!(request_id, response_len = response.len(), "request completed");
                self.finish(
                    request_id,
                    &cancel,
                    StreamPhase::Completed,
                    Some(StreamEvent::Completed {
                        request_id,
                        response,
                    }),
                );
            }
            Ok(Err(error)) if error.is_cancelled() => {
                debug!(request_id, "transport stopped after cancellation");
                self.finish(request_id, &cancel, StreamPhase::Cancelled, None);
            }
            Ok(Err(error)) => {
                warn!(request_id, %error, "request failed");
                self.finish(
                    request_id,
                    &cancel,
                    StreamPhase::Failed,
                    Some(StreamEvent::Error {
                        request_id,
                        message: error.to_string(),
                    }),
                );
            }
            Err(_) => {
                warn!(request_id, "generation worker panicked");
                self.finish(
                    request_id,
                    &cancel,
                    StreamPhase::Failed,
                    Some(StreamEvent::Error {
                        request_id,
                        message: "generation worker panicked".to_string(),
                    }),
                );
            }
        }
    }

    fn emit_fragment(
        &self,
        request_id: RequestId,
        cancel: &AtomicBool,
        changes: SectionChanges,
        accumulated: &str,
    ) {
        let active = self.lock_active();
        if !is_current(&active, request_id, cancel) {
            return;
        }

        if let Some(text) = changes.reasoning {
            self.sink
                .emit(StreamEvent::ReasoningUpdated { request_id, text });
        }
        if let Some(html) = changes.answer_html {
            self.sink.emit(StreamEvent::AnswerUpdated { request_id, html });
        }
        self.sink.emit(StreamEvent::RawUpdated {
            request_id,
            text: accumulated.to_string(),
        });
    }

    fn transition(&self, request_id: RequestId, cancel: &AtomicBool, phase: StreamPhase) {
        let active = self.lock_active();
        if is_current(&active, request_id, cancel) {
            self.set_phase(request_id, phase);
        }
    }

    /// Move a still-current request into a terminal phase, emitting its last
    /// event and freeing the slot. Superseded requests finish silently.
    fn finish(
        &self,
        request_id: RequestId,
        cancel: &AtomicBool,
        phase: StreamPhase,
        event: Option<StreamEvent>,
    ) {
        let mut active = self.lock_active();
        if !is_current(&active, request_id, cancel) {
            return;
        }

        if let Some(event) = event {
            self.sink.emit(event);
        }
        self.set_phase(request_id, phase);
        *active = None;
    }

    fn set_phase(&self, request_id: RequestId, phase: StreamPhase) {
        let mut phases = lock_unpoisoned(&self.phases);
        phases.insert(request_id, phase);
        while phases.len() > PHASE_HISTORY {
            phases.pop_first();
        }
    }

    fn reap_finished_workers(&self) {
        let mut workers = lock_unpoisoned(&self.workers);
        let (finished, running): (Vec<_>, Vec<_>) = std::mem::take(&mut *workers)
            .into_iter()
            .partition(JoinHandle::is_finished);
        *workers = running;
        drop(workers);

        for worker in finished {
            let _ = worker.join();
        }
    }

    fn lock_active(&self) -> MutexGuard<'_, Option<ActiveRequest>> {
        lock_unpoisoned(&self.active)
    }
}

fn is_current(active: &Option<ActiveRequest>, request_id: RequestId, cancel: &AtomicBool) -> bool {
    active.as_ref().map(|active| active.request_id) == Some(request_id)
        && !cancel.load(Ordering::SeqCst)
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
