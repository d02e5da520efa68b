use std::sync::Arc;
use std::time::Duration;

use generation_provider::{GenerationProvider, ProviderInitError};
use generation_provider_http::{HttpGenerationProvider, HttpProviderConfig};
use generation_provider_mock::MockProvider;
use stream_formatter::ProviderKind;
use tracing::info;

/// Construct the generation backend selected at startup.
pub fn build_provider(
    kind: ProviderKind,
    host: &str,
    timeout: Option<Duration>,
) -> Result<Arc<dyn GenerationProvider>, ProviderInitError> {
    let provider: Arc<dyn GenerationProvider> = match kind {
        ProviderKind::Http => {
            let mut config = HttpProviderConfig::new(host);
            if let Some(timeout) = timeout {
                config = config.with_timeout(timeout);
            }
            Arc::new(HttpGenerationProvider::new(config)?)
        }
        ProviderKind::Mock => Arc::new(MockProvider::default()),
    };

    let profile = provider.profile();
    info!(
        provider = %profile.provider_id,
        endpoint = profile.endpoint.as_deref().unwrap_or("-"),
        "generation provider ready"
    );
    Ok(provider)
}
