//! Minimal provider-agnostic contract for streaming one text generation.
//!
//! This crate defines only the request, event and failure types shared by
//! generation providers and the stream orchestrator. It excludes transport
//! details, wire payloads, and prompt construction.

use std::sync::{atomic::AtomicBool, Arc};

use thiserror::Error;

/// Identifier for one generation request.
pub type RequestId = u64;

/// Shared cancellation flag for a request.
pub type CancelSignal = Arc<AtomicBool>;

/// Error returned while constructing/configuring a provider before any request starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Input required to start one streaming generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub request_id: RequestId,
    pub model: String,
    pub prompt: String,
}

/// Provider-emitted progress for one request, in transport order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationEvent {
    /// The transport connection is established and the body is about to be read.
    Connected { request_id: RequestId },
    /// One incremental unit of generated text.
    Fragment { request_id: RequestId, text: String },
}

impl GenerationEvent {
    /// Returns the request identifier associated with this event.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        match self {
            Self::Connected { request_id } | Self::Fragment { request_id, .. } => *request_id,
        }
    }
}

/// Transport-level failure surfaced to the user as a single error event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("stream failed: {0}")]
    Stream(String),
    #[error("request was cancelled")]
    Cancelled,
}

impl TransportError {
    /// Returns true when the failure only reflects a cooperative cancellation.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Immutable metadata describing a generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub endpoint: Option<String>,
}

/// Provider interface for streaming one generation request.
pub trait GenerationProvider: Send + Sync + 'static {
    /// Returns provider identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Streams a request and emits events in transport order.
    ///
    /// Returns once the transport signals end of stream. The cancel flag is a
    /// hint: providers may poll it between reads but are not required to abort
    /// a read already in progress.
    fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(GenerationEvent),
    ) -> Result<(), TransportError>;
}
