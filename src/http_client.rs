// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::errors::LuotainError;
use crate::str_utils::floor_char_boundary;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Realistic browser User-Agents to avoid trivial blocks
const BROWSER_USER_AGENTS: &[&str] = &[
    // Chrome on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Chrome on macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    // Firefox on Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
];

/// Get a browser User-Agent (rotates to avoid blocks)
fn get_browser_user_agent() -> &'static str {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    let index = COUNTER.fetch_add(1, Ordering::Relaxed) % BROWSER_USER_AGENTS.len();
    BROWSER_USER_AGENTS[index]
}

/// Maximum response body size (10MB) to prevent memory exhaustion
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Shared HTTP client for all discovery connectors. Every request carries
/// the configured timeout; a hung remote endpoint can never hold a
/// connector past it.
#[derive(Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    max_body_size: usize,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> Result<Self, LuotainError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(get_browser_user_agent())
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| LuotainError::Network {
                url: String::new(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_body_size: MAX_BODY_SIZE,
        })
    }

    /// GET a page body as text. Non-2xx statuses and transport failures are
    /// errors; the caller logs and abandons the single attempt.
    pub async fn get(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<String, LuotainError> {
        let mut request = self.client.get(url);
        if let Some(headers) = headers {
            for (key, value) in headers {
                request = request.header(key, value);
            }
        }

        let response = request.send().await.map_err(|e| LuotainError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(LuotainError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut body = response.text().await.map_err(|e| LuotainError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if body.len() > self.max_body_size {
            debug!(
                "truncating oversized response body ({} bytes) from {}",
                body.len(),
                url
            );
            body.truncate(floor_char_boundary(&body, self.max_body_size));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_rotation() {
        let first = get_browser_user_agent();
        let second = get_browser_user_agent();
        assert!(first.starts_with("Mozilla/5.0"));
        assert!(second.starts_with("Mozilla/5.0"));
    }

    #[tokio::test]
    async fn test_client_construction() {
        assert!(HttpClient::new(5).is_ok());
    }
}
