//! Deterministic mock implementation of the shared `generation_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use generation_provider::{
    CancelSignal, GenerationEvent, GenerationProvider, GenerationRequest, ProviderProfile,
    TransportError,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const GATE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One-shot latch that holds a mock stream after `Connected` until opened.
///
/// The wait also ends when the request's cancel flag is raised, so a gated
/// request that gets superseded still drains.
#[derive(Debug, Clone, Default)]
pub struct MockGate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl MockGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (lock, condvar) = &*self.state;
        *lock_unpoisoned(lock) = true;
        condvar.notify_all();
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        *lock_unpoisoned(&self.state.0)
    }

    fn wait(&self, cancel: &CancelSignal) {
        let (lock, condvar) = &*self.state;
        let mut open = lock_unpoisoned(lock);
        while !*open && !cancel.load(Ordering::SeqCst) {
            open = match condvar.wait_timeout(open, GATE_POLL_INTERVAL) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Failure injected after a fixed number of fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ScriptedFailure {
    after_fragments: usize,
    error: TransportError,
}

/// Deterministic mock provider used by orchestrator tests and offline runs.
#[derive(Debug)]
pub struct MockProvider {
    fragments: Vec<String>,
    fragment_delay: Duration,
    gate: Option<MockGate>,
    failure: Option<ScriptedFailure>,
    observed: Mutex<Vec<GenerationRequest>>,
}

impl MockProvider {
    /// Creates a mock provider emitting `fragments` verbatim with no delay.
    #[must_use]
    pub fn new(fragments: Vec<String>) -> Self {
        Self {
            fragments,
            fragment_delay: Duration::ZERO,
            gate: None,
            failure: None,
            observed: Mutex::new(Vec::new()),
        }
    }

    /// Creates a mock provider from `text`, split into word-sized fragments the
    /// way a token stream arrives.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        Self::new(tokenize(text))
    }

    #[must_use]
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: MockGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Fails the stream with `error` once `after_fragments` fragments were emitted.
    #[must_use]
    pub fn with_failure(mut self, after_fragments: usize, error: TransportError) -> Self {
        self.failure = Some(ScriptedFailure {
            after_fragments,
            error,
        });
        self
    }

    /// Requests this provider has been asked to generate, in call order.
    #[must_use]
    pub fn observed_requests(&self) -> Vec<GenerationRequest> {
        lock_unpoisoned(&self.observed).clone()
    }

    const DEMO_DELAY_MS: u64 = 30;
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::from_text(concat!(
            "<think>\n",
            "The user wants a short overview. I should show a list, a code sample ",
            "and a small diagram.\n",
            "</think>\n",
            "<output>\n",
            "## Mocked response\n",
            "\n",
            "1. First step\n",
            "    - detail for the first step\n",
            "2. Second step\n",
            "\n",
            "```rust\n",
            "fn main() {\n",
            "    println!(\"Hello, formatter\");\n",
            "}\n",
            "```\n",
            "\n",
            "<mermaid>\n",
            "graph TD\n",
            "    A[Prompt] --> B[Stream]\n",
            "    B --> C[Render]\n",
            "</mermaid>\n",
            "</output>\n",
        ))
        .with_fragment_delay(Duration::from_millis(Self::DEMO_DELAY_MS))
    }
}

impl GenerationProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            endpoint: None,
        }
    }

    fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(GenerationEvent),
    ) -> Result<(), TransportError> {
        let request_id = request.request_id;
        lock_unpoisoned(&self.observed).push(request);

        if cancel.load(Ordering::SeqCst) {
            return Err(TransportError::Cancelled);
        }

        if let Some(ScriptedFailure {
            after_fragments: 0,
            error,
        }) = &self.failure
        {
            return Err(error.clone());
        }

        emit(GenerationEvent::Connected { request_id });

        if let Some(gate) = &self.gate {
            gate.wait(&cancel);
        }

        for (index, fragment) in self.fragments.iter().enumerate() {
            if let Some(failure) = &self.failure {
                if failure.after_fragments == index {
                    return Err(failure.error.clone());
                }
            }

            if cancel.load(Ordering::SeqCst) {
                return Err(TransportError::Cancelled);
            }

            emit(GenerationEvent::Fragment {
                request_id,
                text: fragment.clone(),
            });

            if !self.fragment_delay.is_zero() {
                thread::sleep(self.fragment_delay);
            }
        }

        if let Some(failure) = &self.failure {
            if failure.after_fragments >= self.fragments.len() {
                return Err(failure.error.clone());
            }
        }

        Ok(())
    }
}

/// Split text after every space or newline, keeping the separators.
fn tokenize(text: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut pending = String::new();
    for ch in text.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            fragments.push(std::mem::take(&mut pending));
        }
    }
    if !pending.is_empty() {
        fragments.push(pending);
    }
    fragments
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
