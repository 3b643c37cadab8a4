// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::bus::{EventBus, EventHandler};
use crate::config::Config;
use crate::errors::LuotainError;
use crate::filter::StringFilter;
use crate::http_client::HttpClient;
use crate::rate_limiter::SourceRateLimiter;
use crate::service::{Service, ServiceCore};
use crate::sources::clean_name;
use crate::types::{DnsRequest, Tag, NAME_RESOLVED_TOPIC, NEW_NAME_TOPIC};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE_NAME: &str = "Wayback";
const BASE_URL: &str = "https://web.archive.org/cdx/search/cdx";

/// Web archive connector. Subscribes to resolved names and crawls the
/// archive index for each one, extracting in-scope host names from archived
/// URLs.
pub struct Wayback {
    core: ServiceCore,
    http: HttpClient,
    limiter: SourceRateLimiter,
    filter: StringFilter,
}

impl Wayback {
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>, http: HttpClient) -> Arc<Self> {
        Arc::new(Self {
            core: ServiceCore::new(SOURCE_NAME, config, bus),
            http,
            limiter: SourceRateLimiter::with_period(Duration::from_millis(500)),
            filter: StringFilter::new(),
        })
    }

    fn query_url(subdomain: &str) -> String {
        format!(
            "{}?url={}/*&output=json&collapse=urlkey&fl=original&limit=1000",
            BASE_URL, subdomain
        )
    }

    async fn execute_query(&self, subdomain: &str, domain: &str) {
        if subdomain.is_empty() || domain.is_empty() || self.filter.duplicate(subdomain) {
            return;
        }
        let Some(re) = self.core.config().domain_regex(domain) else {
            return;
        };

        self.limiter.until_ready().await;
        self.core.set_active();

        let url = Self::query_url(subdomain);
        let body = match self.http.get(&url, None).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source = SOURCE_NAME, %url, "query failed: {}", e);
                return;
            }
        };

        let mut published = 0usize;
        for found in re.find_iter(&body) {
            let name = clean_name(found.as_str());
            if name.is_empty() {
                continue;
            }
            self.core.bus().publish(
                NEW_NAME_TOPIC,
                DnsRequest::new(&name, domain, Tag::Archive, SOURCE_NAME),
            );
            published += 1;
        }
        debug!(source = SOURCE_NAME, subdomain, published, "archive index crawled");
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
                    if self.core.config().is_domain_in_scope(&req.name) {
                        self.execute_query(&req.name, &req.domain).await;
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
impl Service for Wayback {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    async fn on_start(self: Arc<Self>) -> Result<(), LuotainError> {
        self.core.mark_started()?;

        // Subscribing to resolved names keeps the archive crawl one step
        // behind confirmation: only names that actually resolve get crawled.
        let me = Arc::clone(&self);
        let on_resolved = EventHandler::new::<DnsRequest, _>(move |req| {
            me.core.send_dns_request(req.as_ref().clone());
        });
        self.core.bus().subscribe(NAME_RESOLVED_TOPIC, &on_resolved);

        tokio::spawn(Arc::clone(&self).process_requests());
        Ok(())
    }
}
