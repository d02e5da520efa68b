//! HTTP-backed implementation of the shared `generation_provider` contract.
//!
//! This adapter drives the async `generate_api` client on a private
//! current-thread runtime and forwards fragments to the caller as they are
//! parsed, so the orchestrator sees the same incremental stream the service
//! produced.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use generate_api::{
    normalize_generate_url, GenerateApiClient, GenerateApiConfig, GenerateApiError,
    GenerateRequest,
};
use generation_provider::{
    CancelSignal, GenerationEvent, GenerationProvider, GenerationRequest, ProviderInitError,
    ProviderProfile, TransportError,
};
use tracing::{debug, info, warn};

/// Stable provider identifier used by front-end startup selection.
pub const HTTP_PROVIDER_ID: &str = "ollama-http";

/// Runtime configuration for the HTTP provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpProviderConfig {
    pub host: Option<String>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub user_agent: Option<String>,
}

impl HttpProviderConfig {
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn into_api_config(self) -> GenerateApiConfig {
        let mut config = match self.host {
            Some(host) if !host.trim().is_empty() => GenerateApiConfig::new(host.trim()),
            _ => GenerateApiConfig::from_env(),
        };

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        if let Some(max_retries) = self.max_retries {
            config = config.with_max_retries(max_retries);
        }

        if let Some(user_agent) = self.user_agent {
            config = config.with_user_agent(user_agent);
        }

        config
    }
}

/// Live progress reported by a stream client while a request runs.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamProgress {
    Connected,
    Fragment(String),
}

trait StreamClient: Send + Sync {
    fn endpoint(&self) -> String;

    fn stream(
        &self,
        request: &GenerateRequest,
        cancel: &CancelSignal,
        on_progress: &mut dyn FnMut(StreamProgress),
    ) -> Result<(), GenerateApiError>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: GenerateApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn endpoint(&self) -> String {
        self.client.normalized_endpoint()
    }

    fn stream(
        &self,
        request: &GenerateRequest,
        cancel: &CancelSignal,
        on_progress: &mut dyn FnMut(StreamProgress),
    ) -> Result<(), GenerateApiError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| {
                GenerateApiError::Runtime(format!("failed to initialize tokio runtime: {error}"))
            })?;

        runtime.block_on(async {
            let response = self.client.send_with_retry(request, Some(cancel)).await?;
            on_progress(StreamProgress::Connected);
            let done = self
                .client
                .read_stream(response, Some(cancel), |event| {
                    if let Some(text) = event.fragment() {
                        on_progress(StreamProgress::Fragment(text.to_string()));
                    }
                })
                .await?;
            debug!(?done, "generate stream closed");
            Ok(())
        })
    }
}

/// `GenerationProvider` adapter backed by `generate_api` transport primitives.
pub struct HttpGenerationProvider {
    stream_client: Arc<dyn StreamClient>,
}

impl HttpGenerationProvider {
    /// Creates a provider using the real HTTP transport.
    pub fn new(config: HttpProviderConfig) -> Result<Self, ProviderInitError> {
        let config = config.into_api_config();
        validate_host(&config.host)?;
        let stream_client = Arc::new(DefaultStreamClient {
            client: GenerateApiClient::new(config).map_err(map_init_error)?,
        });

        Ok(Self { stream_client })
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(stream_client: Arc<dyn StreamClient>) -> Self {
        Self { stream_client }
    }
}

impl GenerationProvider for HttpGenerationProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: HTTP_PROVIDER_ID.to_string(),
            endpoint: Some(self.stream_client.endpoint()),
        }
    }

    fn generate(
        &self,
        request: GenerationRequest,
        cancel: CancelSignal,
        emit: &mut dyn FnMut(GenerationEvent),
    ) -> Result<(), TransportError> {
        let request_id = request.request_id;

        if cancel.load(Ordering::Acquire) {
            return Err(TransportError::Cancelled);
        }

        info!(request_id, model = %request.model, "starting generate request");
        let payload = GenerateRequest::new(request.model, request.prompt);
        let mut fragments = 0_usize;
        let outcome = self
            .stream_client
            .stream(&payload, &cancel, &mut |progress| match progress {
                StreamProgress::Connected => emit(GenerationEvent::Connected { request_id }),
                StreamProgress::Fragment(text) if text.is_empty() => {}
                StreamProgress::Fragment(text) => {
                    fragments += 1;
                    emit(GenerationEvent::Fragment { request_id, text });
                }
            });

        match outcome {
            Ok(()) => {
                info!(request_id, fragments, "generate request finished");
                Ok(())
            }
            Err(error) => {
                let error = map_transport_error(error);
                if !error.is_cancelled() {
                    warn!(request_id, %error, "generate request failed");
                }
                Err(error)
            }
        }
    }
}

fn validate_host(host: &str) -> Result<(), ProviderInitError> {
    let endpoint = normalize_generate_url(host);
    let parsed = url::Url::parse(&endpoint)
        .map_err(|error| ProviderInitError::new(format!("invalid host '{host}': {error}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ProviderInitError::new(format!(
            "invalid host '{host}': unsupported scheme '{scheme}'"
        ))),
    }
}

/// Collapse transport-client failures into the provider-neutral taxonomy.
fn map_transport_error(error: GenerateApiError) -> TransportError {
    match error {
        GenerateApiError::Cancelled => TransportError::Cancelled,
        GenerateApiError::Status(status, message) => TransportError::Status {
            status: status.as_u16(),
            message,
        },
        GenerateApiError::RetryExhausted {
            status: Some(status),
            last_error,
        } => TransportError::Status {
            status: status.as_u16(),
            message: last_error.unwrap_or_default(),
        },
        GenerateApiError::RetryExhausted {
            status: None,
            last_error,
        } => TransportError::Connection(
            last_error.unwrap_or_else(|| "retry exhausted".to_string()),
        ),
        GenerateApiError::StreamFailed { message } => TransportError::Stream(message),
        other => TransportError::Connection(other.to_string()),
    }
}

fn map_init_error(error: GenerateApiError) -> ProviderInitError {
    ProviderInitError::new(format!("Failed to initialize HTTP provider: {error}"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::{Mutex, MutexGuard};

    use super::*;

    fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        match mutex.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    enum FakeStreamOutcome {
        Success(Vec<&'static str>),
        Error(GenerateApiError),
    }

    struct FakeStreamClient {
        observed: Mutex<Option<GenerateRequest>>,
        outcome: Mutex<Option<FakeStreamOutcome>>,
    }

    impl FakeStreamClient {
        fn success(fragments: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                observed: Mutex::new(None),
                outcome: Mutex::new(Some(FakeStreamOutcome::Success(fragments))),
            })
        }

        fn failure(error: GenerateApiError) -> Arc<Self> {
            Arc::new(Self {
                observed: Mutex::new(None),
                outcome: Mutex::new(Some(FakeStreamOutcome::Error(error))),
            })
        }

        fn observed(&self) -> Option<GenerateRequest> {
            lock_unpoisoned(&self.observed).clone()
        }
    }

    impl StreamClient for FakeStreamClient {
        fn endpoint(&self) -> String {
            "http://fake:11434/api/generate".to_string()
        }

        fn stream(
            &self,
            request: &GenerateRequest,
            _cancel: &CancelSignal,
            on_progress: &mut dyn FnMut(StreamProgress),
        ) -> Result<(), GenerateApiError> {
            *lock_unpoisoned(&self.observed) = Some(request.clone());

            match lock_unpoisoned(&self.outcome).take() {
                Some(FakeStreamOutcome::Success(fragments)) => {
                    on_progress(StreamProgress::Connected);
                    for fragment in fragments {
                        on_progress(StreamProgress::Fragment(fragment.to_string()));
                    }
                    Ok(())
                }
                Some(FakeStreamOutcome::Error(error)) => Err(error),
                None => panic!("fake stream outcome should be consumed exactly once"),
            }
        }
    }

    fn run(
        provider: &HttpGenerationProvider,
        cancelled: bool,
    ) -> (Vec<GenerationEvent>, Result<(), TransportError>) {
        let cancel = Arc::new(AtomicBool::new(cancelled));
        let mut events = Vec::new();
        let result = provider.generate(
            GenerationRequest {
                request_id: 9,
                model: "deepseek-r1:8b".to_string(),
                prompt: "User: hello".to_string(),
            },
            cancel,
            &mut |event| events.push(event),
        );
        (events, result)
    }

    #[test]
    fn profile_reports_http_provider_id_and_endpoint() {
        let provider =
            HttpGenerationProvider::with_stream_client_for_tests(FakeStreamClient::success(vec![]));
        let profile = provider.profile();

        assert_eq!(profile.provider_id, HTTP_PROVIDER_ID);
        assert_eq!(
            profile.endpoint.as_deref(),
            Some("http://fake:11434/api/generate")
        );
    }

    #[test]
    fn generate_forwards_connected_then_fragments_in_order() {
        let stream = FakeStreamClient::success(vec!["<think>", "", "hm</think>"]);
        let provider = HttpGenerationProvider::with_stream_client_for_tests(
            Arc::clone(&stream) as Arc<dyn StreamClient>
        );

        let (events, result) = run(&provider, false);

        assert!(result.is_ok());
        let observed = stream.observed().expect("request should reach the client");
        assert_eq!(observed.model, "deepseek-r1:8b");
        assert_eq!(observed.prompt, "User: hello");
        assert!(observed.stream);
        assert_eq!(
            events,
            vec![
                GenerationEvent::Connected { request_id: 9 },
                GenerationEvent::Fragment {
                    request_id: 9,
                    text: "<think>".to_string(),
                },
                GenerationEvent::Fragment {
                    request_id: 9,
                    text: "hm</think>".to_string(),
                },
            ]
        );
    }

    #[test]
    fn generate_skips_transport_when_already_cancelled() {
        let stream = FakeStreamClient::success(vec!["never"]);
        let provider = HttpGenerationProvider::with_stream_client_for_tests(
            Arc::clone(&stream) as Arc<dyn StreamClient>
        );

        let (events, result) = run(&provider, true);

        assert!(events.is_empty());
        assert_eq!(result, Err(TransportError::Cancelled));
        assert!(stream.observed().is_none());
    }

    #[test]
    fn generate_maps_status_failure() {
        let provider = HttpGenerationProvider::with_stream_client_for_tests(
            FakeStreamClient::failure(GenerateApiError::Status(
                generate_api::StatusCode::NOT_FOUND,
                "model not found".to_string(),
            )),
        );

        let (events, result) = run(&provider, false);

        assert!(events.is_empty());
        assert_eq!(
            result,
            Err(TransportError::Status {
                status: 404,
                message: "model not found".to_string(),
            })
        );
    }

    #[test]
    fn generate_maps_stream_and_retry_failures() {
        assert_eq!(
            map_transport_error(GenerateApiError::StreamFailed {
                message: "runner stopped".to_string(),
            }),
            TransportError::Stream("runner stopped".to_string())
        );
        assert_eq!(
            map_transport_error(GenerateApiError::RetryExhausted {
                status: None,
                last_error: Some("connection refused".to_string()),
            }),
            TransportError::Connection("connection refused".to_string())
        );
        assert!(map_transport_error(GenerateApiError::Cancelled).is_cancelled());
    }

    #[test]
    fn new_rejects_non_http_hosts() {
        let error = match HttpGenerationProvider::new(HttpProviderConfig::new("ftp://models")) {
            Ok(_) => panic!("ftp host must be rejected"),
            Err(error) => error,
        };
        assert!(error.message().contains("unsupported scheme 'ftp'"));
    }

    #[test]
    fn new_accepts_local_host() {
        let provider = HttpGenerationProvider::new(HttpProviderConfig::new("http://127.0.0.1:11434"))
            .expect("local host should be accepted");
        assert_eq!(
            provider.profile().endpoint.as_deref(),
            Some("http://127.0.0.1:11434/api/generate")
        );
    }
}
