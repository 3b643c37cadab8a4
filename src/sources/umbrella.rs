// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use crate::bus::EventBus;
use crate::config::{ApiKey, Config};
use crate::errors::LuotainError;
use crate::http_client::HttpClient;
use crate::rate_limiter::SourceRateLimiter;
use crate::service::{Service, ServiceCore};
use crate::types::{DnsRequest, Tag, WhoisRequest, NEW_NAME_TOPIC, NEW_WHOIS_TOPIC};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SOURCE_NAME: &str = "Umbrella";
const BASE_URL: &str = "https://investigate.api.umbrella.com";
// The API serves reverse WHOIS data in 500 piece chunks
const PAGE_SIZE: usize = 500;

/// The API exposes much more than this; only these fields matter here.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WhoisRecord {
    #[serde(rename = "nameServers")]
    name_servers: Vec<String>,
    #[serde(rename = "administrativeContactEmail")]
    admin_contact_email: String,
    #[serde(rename = "billingContactEmail")]
    billing_contact_email: String,
    #[serde(rename = "registrantEmail")]
    registrant_email: String,
    #[serde(rename = "technicalContactEmail")]
    tech_contact_email: String,
    #[serde(rename = "zoneContactEmail")]
    zone_contact_email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RWhoisDomain {
    domain: String,
    current: bool,
}

// Email and nameserver reverse lookups share one response shape.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RWhoisResponse {
    #[serde(rename = "totalResults")]
    total_results: usize,
    #[serde(rename = "moreDataAvailable")]
    more_data: bool,
    domains: Vec<RWhoisDomain>,
}

/// Reverse-WHOIS API connector. Requires a credential; without one it logs
/// once at start and degrades to draining its inboxes.
pub struct Umbrella {
    core: ServiceCore,
    http: HttpClient,
    limiter: SourceRateLimiter,
    api: Mutex<Option<ApiKey>>,
}

impl Umbrella {
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>, http: HttpClient) -> Arc<Self> {
        Arc::new(Self {
            core: ServiceCore::new(SOURCE_NAME, config, bus),
            http,
            limiter: SourceRateLimiter::with_period(Duration::from_millis(500)),
            api: Mutex::new(None),
        })
    }

    fn api_key(&self) -> Option<ApiKey> {
        self.api.lock().clone()
    }

    fn rest_headers(key: &ApiKey) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Authorization".to_string(), format!("Bearer {}", key.key));
        headers
    }

    fn pattern_search_url(domain: &str) -> String {
        format!("{}/search/.*[.]{}?start=-30days&limit=1000", BASE_URL, domain)
    }

    fn whois_record_url(domain: &str) -> String {
        format!("{}/whois/{}", BASE_URL, domain)
    }

    fn reverse_whois_by_email_url(emails: &[String]) -> String {
        format!("{}/whois/emails?emailList={}", BASE_URL, emails.join(","))
    }

    fn reverse_whois_by_ns_url(nameservers: &[String]) -> String {
        format!(
            "{}/whois/nameservers?nameServerList={}",
            BASE_URL,
            nameservers.join(",")
        )
    }

    fn collate_emails(record: &WhoisRecord, config: &Config) -> Vec<String> {
        let mut emails: Vec<String> = Vec::new();
        for email in [
            &record.admin_contact_email,
            &record.billing_contact_email,
            &record.registrant_email,
            &record.tech_contact_email,
            &record.zone_contact_email,
        ] {
            let in_scope = email
                .rsplit_once('@')
                .map(|(_, mail_domain)| config.is_domain_in_scope(mail_domain))
                .unwrap_or(false);
            if in_scope && !emails.contains(email) {
                emails.push(email.clone());
            }
        }
        emails
    }

    async fn execute_dns_query(&self, domain: &str) {
        let Some(api) = self.api_key() else { return };
        let Some(re) = self.core.config().domain_regex(domain) else {
            return;
        };

        self.limiter.until_ready().await;
        self.core.set_active();

        let headers = Self::rest_headers(&api);
        let url = Self::pattern_search_url(domain);
        let body = match self.http.get(&url, Some(&headers)).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source = SOURCE_NAME, %url, "query failed: {}", e);
                return;
            }
        };

        let mut published = 0usize;
        for found in re.find_iter(&body) {
            self.core.bus().publish(
                NEW_NAME_TOPIC,
                DnsRequest::new(found.as_str(), domain, Tag::Api, SOURCE_NAME),
            );
            published += 1;
        }
        debug!(source = SOURCE_NAME, domain, published, "pattern search complete");
    }

    async fn query_whois(&self, domain: &str, api: &ApiKey) -> Option<WhoisRecord> {
        self.limiter.until_ready().await;
        self.core.set_active();

        let headers = Self::rest_headers(api);
        let url = Self::whois_record_url(domain);
        let body = match self.http.get(&url, Some(&headers)).await {
            Ok(body) => body,
            Err(e) => {
                warn!(source = SOURCE_NAME, %url, "query failed: {}", e);
                return None;
            }
        };

        match serde_json::from_str(&body) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(source = SOURCE_NAME, %url, "unparseable WHOIS record: {}", e);
                None
            }
        }
    }

    async fn query_reverse_whois(&self, api_url: &str, api: &ApiKey) -> Vec<String> {
        let headers = Self::rest_headers(api);
        let mut domains: Vec<String> = Vec::new();

        let mut offset = 0usize;
        loop {
            self.limiter.until_ready().await;
            self.core.set_active();

            let url = format!("{}&offset={}", api_url, offset);
            let body = match self.http.get(&url, Some(&headers)).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(source = SOURCE_NAME, %url, "query failed: {}", e);
                    return domains;
                }
            };

            let parsed: HashMap<String, RWhoisResponse> = match serde_json::from_str(&body) {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!(source = SOURCE_NAME, %url, "unparseable response: {}", e);
                    return domains;
                }
            };

            let mut more = false;
            for result in parsed.values() {
                if result.total_results > 0 {
                    for entry in &result.domains {
                        if entry.current && !domains.contains(&entry.domain) {
                            domains.push(entry.domain.clone());
                        }
                    }
                }
                more = more || result.more_data;
            }
            if !more {
                return domains;
            }
            offset += PAGE_SIZE;
        }
    }

    async fn execute_whois_query(&self, domain: &str) {
        let Some(api) = self.api_key() else { return };

        let Some(record) = self.query_whois(domain, &api).await else {
            return;
        };
        let config = Arc::clone(self.core.config());

        // Related registrations are interesting precisely when they fall
        // outside the current scope.
        let mut new_domains: Vec<String> = Vec::new();

        let emails = Self::collate_emails(&record, &config);
        if !emails.is_empty() {
            let url = Self::reverse_whois_by_email_url(&emails);
            for found in self.query_reverse_whois(&url, &api).await {
                if !config.is_domain_in_scope(&found) && !new_domains.contains(&found) {
                    new_domains.push(found);
                }
            }
        }

        let nameservers: Vec<String> = record
            .name_servers
            .iter()
            .filter(|ns| config.is_domain_in_scope(ns))
            .cloned()
            .collect();
        if !nameservers.is_empty() {
            let url = Self::reverse_whois_by_ns_url(&nameservers);
            for found in self.query_reverse_whois(&url, &api).await {
                if !config.is_domain_in_scope(&found) && !new_domains.contains(&found) {
                    new_domains.push(found);
                }
            }
        }

        if !new_domains.is_empty() {
            let mut req = WhoisRequest::new(domain, Tag::Api, SOURCE_NAME);
            req.new_domains = new_domains;
            self.core.bus().publish(NEW_WHOIS_TOPIC, req);
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
                    if self.core.config().is_domain_in_scope(&req.domain) {
                        self.execute_dns_query(&req.domain).await;
                    }
                }
                Some(req) = inboxes.whois.recv() => {
                    if self.core.config().is_domain_in_scope(&req.domain) {
                        self.execute_whois_query(&req.domain).await;
                    }
                }
                Some(_) = inboxes.addr.recv() => {}
                Some(_) = inboxes.asn.recv() => {}
            }
        }
    }
}

#[async_trait]
impl Service for Umbrella {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    async fn on_start(self: Arc<Self>) -> Result<(), LuotainError> {
        self.core.mark_started()?;

        match self.core.config().get_api_key(SOURCE_NAME) {
            Some(api) => *self.api.lock() = Some(api),
            None => warn!(source = SOURCE_NAME, "API key data was not provided"),
        }

        tokio::spawn(Arc::clone(&self).process_requests());
        Ok(())
    }
}
