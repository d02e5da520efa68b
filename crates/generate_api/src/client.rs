use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderValue, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::GenerateApiConfig;
use crate::error::{parse_error_message, GenerateApiError};
use crate::events::GenerateStreamEvent;
use crate::ndjson::NdjsonStreamParser;
use crate::payload::GenerateRequest;
use crate::retry::{is_retryable_http_error, retry_delay_ms};
use crate::url::normalize_generate_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct GenerateApiClient {
    http: Client,
    config: GenerateApiConfig,
}

#[derive(Debug, Clone, Default)]
pub struct StreamResult {
    pub events: Vec<GenerateStreamEvent>,
    /// `Some` once a `done: true` line was seen; holds its `done_reason`.
    pub done: Option<Option<String>>,
}

impl StreamResult {
    /// Concatenation of every fragment in arrival order.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(GenerateStreamEvent::fragment)
            .collect()
    }
}

impl GenerateApiClient {
    pub fn new(config: GenerateApiConfig) -> Result<Self, GenerateApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GenerateApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_generate_url(&self.config.host)
    }

    pub fn build_request(
        &self,
        request: &GenerateRequest,
    ) -> Result<reqwest::RequestBuilder, GenerateApiError> {
        validate_request(request)?;

        let mut payload = request.clone();
        payload.stream = true;

        let mut builder = self.http.post(self.normalized_endpoint()).json(&payload);
        if let Some(user_agent) = self.config.user_agent.as_deref() {
            let value = HeaderValue::from_str(user_agent).map_err(|_| {
                GenerateApiError::InvalidRequestPayload(format!(
                    "invalid user agent: {user_agent}"
                ))
            })?;
            builder = builder.header(USER_AGENT, value);
        }
        Ok(builder)
    }

    /// Send the request, retrying transient failures until a success status
    /// arrives. No body byte has been read when this returns.
    pub async fn send_with_retry(
        &self,
        request: &GenerateRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, GenerateApiError> {
        let max_retries = self.config.max_retries;
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            if is_cancelled(cancellation) {
                return Err(GenerateApiError::Cancelled);
            }

            let response = self.build_request(request)?.send();
            let response = await_or_cancel(response, cancellation).await?;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!(%status, attempt, "generate request accepted");
                        return Ok(response);
                    }

                    last_status = Some(status);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if attempt < max_retries && is_retryable_http_error(status.as_u16(), &body) {
                        warn!(%status, attempt, %message, "retrying generate request");
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(GenerateApiError::Status(status, message));
                }
                Err(error) => {
                    let message = error.to_string();
                    last_error = Some(message.clone());
                    if attempt < max_retries && !error.is_builder() {
                        warn!(attempt, %message, "retrying generate request after connection failure");
                        await_or_cancel(tokio::time::sleep(retry_delay_ms(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                    if attempt == 0 {
                        return Err(GenerateApiError::Request(error));
                    }
                    return Err(GenerateApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(GenerateApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Consume an accepted response body, delivering events in wire order.
    ///
    /// Returns the `done_reason` bookkeeping: `None` when the body closed
    /// without a `done` line.
    pub async fn read_stream<F>(
        &self,
        response: Response,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<Option<Option<String>>, GenerateApiError>
    where
        F: FnMut(GenerateStreamEvent),
    {
        let mut bytes = response.bytes_stream();
        let mut parser = NdjsonStreamParser::default();
        let mut done = None;

        loop {
            let Some(chunk) = await_or_cancel(bytes.next(), cancellation).await? else {
                break;
            };
            if is_cancelled(cancellation) {
                return Err(GenerateApiError::Cancelled);
            }
            let chunk = chunk.map_err(|error| GenerateApiError::StreamFailed {
                message: error.to_string(),
            })?;
            for event in parser.feed(&chunk) {
                process_stream_event(event, &mut done, &mut on_event)?;
            }
        }

        for event in parser.finish() {
            process_stream_event(event, &mut done, &mut on_event)?;
        }

        if is_cancelled(cancellation) {
            return Err(GenerateApiError::Cancelled);
        }

        Ok(done)
    }

    pub async fn stream_with_handler<F>(
        &self,
        request: &GenerateRequest,
        cancellation: Option<&CancellationSignal>,
        on_event: F,
    ) -> Result<Option<Option<String>>, GenerateApiError>
    where
        F: FnMut(GenerateStreamEvent),
    {
        let response = self.send_with_retry(request, cancellation).await?;
        self.read_stream(response, cancellation, on_event).await
    }

    pub async fn stream(
        &self,
        request: &GenerateRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<StreamResult, GenerateApiError> {
        let mut events = Vec::new();
        let done = self
            .stream_with_handler(request, cancellation, |event| {
                events.push(event);
            })
            .await?;

        Ok(StreamResult { events, done })
    }
}

fn validate_request(request: &GenerateRequest) -> Result<(), GenerateApiError> {
    if request.model.trim().is_empty() {
        return Err(GenerateApiError::InvalidRequestPayload(
            "'model' must not be empty".to_owned(),
        ));
    }
    Ok(())
}

fn process_stream_event<F>(
    event: GenerateStreamEvent,
    done: &mut Option<Option<String>>,
    on_event: &mut F,
) -> Result<(), GenerateApiError>
where
    F: FnMut(GenerateStreamEvent),
{
    match &event {
        GenerateStreamEvent::Error { message } => {
            return Err(GenerateApiError::StreamFailed {
                message: message.clone(),
            });
        }
        GenerateStreamEvent::Done { done_reason } => {
            *done = Some(done_reason.clone());
        }
        GenerateStreamEvent::Fragment { .. } => {}
    }

    on_event(event);
    Ok(())
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, GenerateApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(GenerateApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(GenerateApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
