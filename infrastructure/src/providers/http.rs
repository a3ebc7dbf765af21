//! Shared HTTP plumbing for provider adapters.

use council_application::ProviderError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Connect timeout for every provider; the phase deadline bounds the rest.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// POST `body` and decode a successful JSON reply.
pub(crate) async fn post_json<B, R>(
    request: reqwest::RequestBuilder,
    body: &B,
    provider: &str,
) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .header("content-type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| ProviderError::Network(format!("{} request failed: {}", provider, e)))?;

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        debug!("{} returned {}: {}", provider, status, text);
        return Err(ProviderError::from_http_status(status.as_u16(), &text));
    }

    response.json::<R>().await.map_err(|e| {
        ProviderError::MalformedResponse(format!("{} reply could not be decoded: {}", provider, e))
    })
}

/// Reject replies that carry no text.
pub(crate) fn require_text(text: Option<String>, provider: &str) -> Result<String, ProviderError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ProviderError::MalformedResponse(format!(
            "{} reply contained no text",
            provider
        ))),
    }
}
