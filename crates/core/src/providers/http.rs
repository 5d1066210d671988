use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::errors::CoreError;

/// Build a client with a hard per-request timeout.
pub fn client_with_timeout(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// GET `url` and decode its JSON body.
///
/// Non-2xx statuses and undecodable bodies are provider failures.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: &str,
    url: &str,
) -> Result<T, CoreError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(CoreError::Api {
            provider: provider.to_string(),
            message: format!("HTTP {status}"),
        });
    }
    resp.json::<T>().await.map_err(|e| CoreError::Api {
        provider: provider.to_string(),
        message: format!("Malformed payload: {e}"),
    })
}

/// Trim a trailing slash so paths can be appended with `/`.
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}
