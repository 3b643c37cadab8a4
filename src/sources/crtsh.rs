// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::bus::EventBus;
use crate::config::Config;
use crate::errors::LuotainError;
use crate::filter::StringFilter;
use crate::http_client::HttpClient;
use crate::rate_limiter::SourceRateLimiter;
use crate::service::{Service, ServiceCore};
use crate::sources::clean_name;
use crate::types::{DnsRequest, Tag, NEW_NAME_TOPIC};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE_NAME: &str = "Crtsh";

#[derive(Debug, Deserialize)]
struct CrtshEntry {
    name_value: String,
}

/// Certificate transparency connector. Fed one request per root domain by
/// the caller; every certificate name under that root becomes a new-name
/// event with certificate provenance.
pub struct Crtsh {
    core: ServiceCore,
    http: HttpClient,
    limiter: SourceRateLimiter,
    filter: StringFilter,
}

impl Crtsh {
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>, http: HttpClient) -> Arc<Self> {
        Arc::new(Self {
            core: ServiceCore::new(SOURCE_NAME, config, bus),
            http,
            // crt.sh asks for gentle clients
            limiter: SourceRateLimiter::with_period(Duration::from_secs(1)),
            filter: StringFilter::new(),
        })
    }

    fn query_url(domain: &str) -> String {
        format!("https://crt.sh/?q=%25.{}&output=json", domain)
    }

    fn names_from_response(body: &str, config: &Config) -> Result<Vec<String>, LuotainError> {
        let entries: Vec<CrtshEntry> =
            serde_json::from_str(body).map_err(|e| LuotainError::MalformedResponse {
                url: "crt.sh".to_string(),
                reason: e.to_string(),
            })?;

        let mut names = Vec::new();
        for entry in entries {
            for line in entry.name_value.lines() {
                let name = clean_name(line);
                if name.is_empty() || name.contains('*') {
                    continue;
                }
                if config.is_domain_in_scope(&name) && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    async fn execute_query(&self, domain: &str) {
        self.limiter.until_ready().await;
        self.core.set_active();

        let url = Self::query_url(domain);
        let body = match self.http.get(&url, None).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source = SOURCE_NAME, %url, "query failed: {}", e);
                return;
            }
        };

        let names = match Self::names_from_response(&body, self.core.config()) {
            Ok(names) => names,
            Err(e) => {
                warn!(source = SOURCE_NAME, %url, "unparseable response: {}", e);
                return;
            }
        };

        debug!(source = SOURCE_NAME, domain, count = names.len(), "certificate names extracted");
        for name in names {
            self.core.bus().publish(
                NEW_NAME_TOPIC,
                DnsRequest::new(&name, domain, Tag::Cert, SOURCE_NAME),
            );
        }
    }

    async fn process_requests(self: Arc<Self>) {
        let Some(mut inboxes) = self.core.take_inboxes() else {
            return;
        };
        let mut quit = self.core.quit_signal();
        let mut pause = self.core.pause_signal();

        loop {
            tokio::select! {
                _ = quit.changed() => return,
                _ = pause.changed() => self.core.wait_if_paused(&mut pause).await,
                Some(req) = inboxes.dns.recv() => {
                    if self.core.config().is_domain_in_scope(&req.domain)
                        && !self.filter.duplicate(&req.domain)
                    {
                        self.execute_query(&req.domain).await;
                    }
                }
                Some(_) = inboxes.addr.recv() => {}
                Some(_) = inboxes.asn.recv() => {}
                Some(_) = inboxes.whois.recv() => {}
            }
        }
    }
}

#[async_trait]
impl Service for Crtsh {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    async fn on_start(self: Arc<Self>) -> Result<(), LuotainError> {
        self.core.mark_started()?;
        tokio::spawn(Arc::clone(&self).process_requests());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_url() {
        assert_eq!(
            Crtsh::query_url("example.com"),
            "https://crt.sh/?q=%25.example.com&output=json"
        );
    }

    #[test]
    fn test_names_from_response() {
        let config = Config::new(vec!["example.com".to_string()]);
        let body = r#"[
            {"issuer_name": "C=US", "name_value": "www.example.com\n*.api.example.com"},
            {"issuer_name": "C=US", "name_value": "WWW.EXAMPLE.COM"},
            {"issuer_name": "C=US", "name_value": "mail.other-company.net"}
        ]"#;

        let names = Crtsh::names_from_response(body, &config).unwrap();
        assert_eq!(names, vec!["www.example.com", "api.example.com"]);
    }

    #[test]
    fn test_malformed_response_is_error() {
        let config = Config::new(vec!["example.com".to_string()]);
        assert!(Crtsh::names_from_response("<html>rate limited</html>", &config).is_err());
    }
}
