// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/*
 * Bountyy Oy - Resolver Service
 * Bounded-concurrency DNS resolution with TTL caching
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

//! Consumes resolve-name events and answers them asynchronously, out of
//! order, on the resolved topic. A successful lookup also yields one
//! AddrRequest per distinct address, a CNAME edge per alias in the answer
//! chain, and one Output record. Failed lookups produce nothing; absence is
//! the only failure signal at this boundary.

use crate::bus::{EventBus, EventHandler};
use crate::config::Config;
use crate::errors::LuotainError;
use crate::graph::{DataGraph, DataOpts};
use crate::service::{Service, ServiceCore};
use crate::types::{
    AddrRequest, AddressInfo, DnsAnswer, DnsRequest, Output, NAME_RESOLVED_TOPIC, NEW_ADDR_TOPIC,
    OUTPUT_TOPIC, RESOLVE_NAME_TOPIC,
};
use async_trait::async_trait;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioResolver;
use moka::future::Cache;
use parking_lot::Mutex;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::debug;

const CACHE_CAPACITY: u64 = 10_000;
const CACHE_TTL_SECS: u64 = 300;

/// Extract address info from A/AAAA answers.
fn addresses_from_records(records: &[DnsAnswer]) -> Vec<AddressInfo> {
    let mut addresses = Vec::new();
    for record in records {
        if record.record_type == u16::from(RecordType::A)
            || record.record_type == u16::from(RecordType::AAAA)
        {
            if let Ok(ip) = record.data.parse::<IpAddr>() {
                if !addresses.iter().any(|a: &AddressInfo| a.address == ip) {
                    addresses.push(AddressInfo::new(ip));
                }
            }
        }
    }
    addresses
}

/// Extract (alias, target) pairs from CNAME answers.
fn alias_edges(records: &[DnsAnswer]) -> Vec<(String, String)> {
    records
        .iter()
        .filter(|r| r.record_type == u16::from(RecordType::CNAME))
        .map(|r| {
            (
                r.name.trim_end_matches('.').to_lowercase(),
                r.data.trim_end_matches('.').to_lowercase(),
            )
        })
        .collect()
}

/// Resolves names published on the resolve topic.
pub struct ResolverService {
    core: ServiceCore,
    resolver: TokioResolver,
    cache: Cache<String, Arc<Vec<DnsAnswer>>>,
    max_lookups: Arc<Semaphore>,
    graph: Mutex<Option<Arc<dyn DataGraph>>>,
}

impl ResolverService {
    /// Initialized but not yet started.
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>) -> Result<Arc<Self>, LuotainError> {
        let resolver = TokioResolver::builder(TokioConnectionProvider::default())
            .map_err(|e| LuotainError::Resolution {
                host: String::new(),
                reason: format!("failed to create resolver: {}", e),
            })?
            .build();
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(CACHE_TTL_SECS))
            .build();
        let max_lookups = Arc::new(Semaphore::new(config.max_dns_queries));

        Ok(Arc::new(Self {
            core: ServiceCore::new("Resolver", config, bus),
            resolver,
            cache,
            max_lookups,
            graph: Mutex::new(None),
        }))
    }

    /// Make the graph collaborator available for alias bookkeeping. Call
    /// before `on_start`.
    pub fn register_graph(&self, graph: Arc<dyn DataGraph>) {
        *self.graph.lock() = Some(graph);
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
                    if !self.core.config().is_domain_in_scope(&req.name) {
                        continue;
                    }
                    let permit = match Arc::clone(&self.max_lookups).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    };
                    let me = Arc::clone(&self);
                    tokio::spawn(async move {
                        me.perform_request(req).await;
                        drop(permit);
                    });
                }
                Some(_) = inboxes.addr.recv() => {}
                Some(_) = inboxes.asn.recv() => {}
                Some(_) = inboxes.whois.recv() => {}
            }
        }
    }

    async fn perform_request(&self, mut req: DnsRequest) {
        self.core.set_active();

        let Some(records) = self.lookup(&req.name).await else {
            return;
        };
        req.records = records;

        let graph = self.graph.lock().clone();
        if let Some(graph) = graph {
            for (alias, target) in alias_edges(&req.records) {
                graph.insert_cname(
                    &DataOpts {
                        uuid: self.core.config().uuid.to_string(),
                        name: alias,
                        domain: req.domain.clone(),
                    },
                    &target,
                );
            }
        }

        let addresses = addresses_from_records(&req.records);
        for info in &addresses {
            self.core.bus().publish(
                NEW_ADDR_TOPIC,
                AddrRequest {
                    address: info.address,
                    domain: req.domain.clone(),
                    tag: req.tag,
                    source: req.source.clone(),
                },
            );
        }

        let mut output = Output::new(&req.name, &req.domain, req.tag, &req.source);
        output.addresses = addresses;

        self.core.bus().publish(NAME_RESOLVED_TOPIC, req);
        self.core.bus().publish(OUTPUT_TOPIC, output);
    }

    async fn lookup(&self, name: &str) -> Option<Vec<DnsAnswer>> {
        if let Some(hit) = self.cache.get(name).await {
            return Some(hit.as_ref().clone());
        }

        let lookup = match self.resolver.lookup_ip(name).await {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!(service = "Resolver", host = %name, "lookup failed: {}", e);
                return None;
            }
        };

        let answers: Vec<DnsAnswer> = lookup
            .as_lookup()
            .record_iter()
            .map(|record| DnsAnswer {
                name: record.name().to_string().trim_end_matches('.').to_string(),
                record_type: u16::from(record.record_type()),
                ttl: record.ttl(),
                data: record.data().to_string(),
            })
            .collect();
        if answers.is_empty() {
            return None;
        }

        self.cache
            .insert(name.to_string(), Arc::new(answers.clone()))
            .await;
        Some(answers)
    }
}

#[async_trait]
impl Service for ResolverService {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    async fn on_start(self: Arc<Self>) -> Result<(), LuotainError> {
        self.core.mark_started()?;

        let me = Arc::clone(&self);
        let on_resolve = EventHandler::new::<DnsRequest, _>(move |req| {
            me.core.send_dns_request(req.as_ref().clone());
        });
        self.core.bus().subscribe(RESOLVE_NAME_TOPIC, &on_resolve);

        tokio::spawn(Arc::clone(&self).process_requests());
        Ok(())
    }
}
