//! JSON-over-HTTP calls shared by the remote embedding and generation
//! providers.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Every failure is reported as [`RagError::Provider`].

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use repo_rag_core::{RagError, Result};

/// Build a client with the configured request timeout.
pub fn client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(RagError::provider)
}

/// POST `body` to `url` and return the parsed JSON response.
///
/// `service` names the backend in error messages (e.g. `"Ollama"`).
pub async fn post_json(
    client: &reqwest::Client,
    url: &str,
    bearer: Option<&str>,
    body: &Value,
    max_retries: u32,
    service: &str,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            warn!(service, attempt, delay_secs = delay.as_secs(), "retrying request");
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json().await.map_err(|e| {
                        RagError::Provider(format!("{} returned invalid JSON: {}", service, e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                let err =
                    RagError::Provider(format!("{} API error {}: {}", service, status, body_text));

                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(err);
                    continue;
                }
                return Err(err);
            }
            Err(e) => {
                last_err = Some(RagError::Provider(format!(
                    "{} connection error (is it running at {}?): {}",
                    service, url, e
                )));
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| RagError::Provider(format!("{} request failed after retries", service))))
}

/// Join a base URL and an API path without doubling the slash.
pub fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
