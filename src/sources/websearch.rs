// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::bus::EventBus;
use crate::config::Config;
use crate::errors::LuotainError;
use crate::filter::StringFilter;
use crate::http_client::HttpClient;
use crate::service::{Service, ServiceCore};
use crate::sources::clean_name;
use crate::types::{DnsRequest, Tag, NEW_NAME_TOPIC};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

const SOURCE_NAME: &str = "Haku";
const RESULTS_PER_PAGE: usize = 20;
const RESULT_LIMIT: usize = 100;

/// Search engine scraper. Pages through `site:` queries for each root
/// domain on a one-second ticker and extracts subdomains from the result
/// markup.
pub struct Haku {
    core: ServiceCore,
    http: HttpClient,
    filter: StringFilter,
}

impl Haku {
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>, http: HttpClient) -> Arc<Self> {
        Arc::new(Self {
            core: ServiceCore::new(SOURCE_NAME, config, bus),
            http,
            filter: StringFilter::new(),
        })
    }

    fn url_by_page(domain: &str, page: usize) -> String {
        let query = format!("site:{} -site:www.{}", domain, domain);
        let params = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("q", &query)
            .append_pair("s", &(page * RESULTS_PER_PAGE).to_string())
            .finish();
        format!("https://html.duckduckgo.com/html/?{}", params)
    }

    async fn execute_query(&self, domain: &str, quit: &mut watch::Receiver<bool>) {
        let Some(re) = self.core.config().domain_regex(domain) else {
            return;
        };

        let pages = RESULT_LIMIT / RESULTS_PER_PAGE;
        let mut ticker = tokio::time::interval(Duration::from_secs(1));

        for page in 0..pages {
            self.core.set_active();

            tokio::select! {
                _ = quit.changed() => return,
                _ = ticker.tick() => {}
            }

            let url = Self::url_by_page(domain, page);
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
                    DnsRequest::new(&name, domain, Tag::Scrape, SOURCE_NAME),
                );
                published += 1;
            }
            debug!(source = SOURCE_NAME, domain, page, published, "result page scraped");
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
                        self.execute_query(&req.domain, &mut quit).await;
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
impl Service for Haku {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    async fn on_start(self: Arc<Self>) -> Result<(), LuotainError> {
        self.core.mark_started()?;
        tokio::spawn(Arc::clone(&self).process_requests());
        Ok(())
    }
}
