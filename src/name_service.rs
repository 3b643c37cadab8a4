// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/*
 * Bountyy Oy - Name Service
 * Dedup, scope enforcement, subdomain derivation and observation scoring
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

//! The single point of deduplication for the whole system. Newly discovered
//! names arrive on the new-name topic, get normalized and deduplicated per
//! trust class, and are either emitted directly (passive mode) or republished
//! for resolution (active mode). Resolved names come back on the resolved
//! topic, where subdomain candidates are derived, alias nodes suppressed,
//! and each promotion stamped with a strictly increasing observation count.
//!
//! Every rejection here is an expected, high-frequency filtering outcome,
//! not a fault: empty names, duplicates, out-of-scope names, SRV-style
//! labels and alias targets are all dropped silently.

use crate::bus::{EventBus, EventHandler};
use crate::config::Config;
use crate::errors::LuotainError;
use crate::filter::StringFilter;
use crate::graph::{DataGraph, DataOpts};
use crate::service::{Service, ServiceCore};
use crate::types::{
    DnsRequest, Output, SubdomainEvent, NAME_RESOLVED_TOPIC, NEW_NAME_TOPIC, NEW_SUBDOMAIN_TOPIC,
    OUTPUT_TOPIC, RESOLVE_NAME_TOPIC,
};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

/// Generic subdomain-label syntax check applied before passive emission.
static SUBDOMAIN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(([a-zA-Z0-9]|[_a-zA-Z0-9][_a-zA-Z0-9-]{0,61}[a-zA-Z0-9])\.)+[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$")
        .expect("subdomain pattern")
});

/// Strip one leading wildcard label, e.g. `*.stage.example.com`.
fn remove_asterisk_label(name: &str) -> &str {
    name.strip_prefix("*.").unwrap_or(name)
}

struct TimesRequest {
    subdomain: String,
    resp: oneshot::Sender<usize>,
}

/// Handles every newly discovered name in the architecture.
pub struct NameService {
    core: ServiceCore,
    /// Passive-mode emission dedup, across all trust classes.
    output_filter: StringFilter,
    trusted_filter: StringFilter,
    other_filter: StringFilter,
    times_tx: mpsc::Sender<TimesRequest>,
    times_rx: Mutex<Option<mpsc::Receiver<TimesRequest>>>,
    resolved_tx: mpsc::Sender<DnsRequest>,
    resolved_rx: Mutex<Option<mpsc::Receiver<DnsRequest>>>,
    graph: Mutex<Option<Arc<dyn DataGraph>>>,
}

impl NameService {
    /// Initialized but not yet started.
    pub fn new(config: Arc<Config>, bus: Arc<EventBus>) -> Arc<Self> {
        let capacity = config.inbox_capacity;
        let (times_tx, times_rx) = mpsc::channel(capacity);
        let (resolved_tx, resolved_rx) = mpsc::channel(capacity);
        Arc::new(Self {
            core: ServiceCore::new("Name Service", config, bus),
            output_filter: StringFilter::new(),
            trusted_filter: StringFilter::new(),
            other_filter: StringFilter::new(),
            times_tx,
            times_rx: Mutex::new(Some(times_rx)),
            resolved_tx,
            resolved_rx: Mutex::new(Some(resolved_rx)),
            graph: Mutex::new(None),
        })
    }

    /// Make the graph collaborator available. Call before `on_start`;
    /// without one, alias suppression is skipped.
    pub fn register_graph(&self, graph: Arc<dyn DataGraph>) {
        *self.graph.lock() = Some(graph);
    }

    /// Entry point for every freshly discovered name.
    fn new_name_event(&self, req: &DnsRequest) {
        if req.name.is_empty() || req.domain.is_empty() {
            return;
        }

        let mut req = req.clone();
        req.name = remove_asterisk_label(&req.name).to_lowercase();
        req.domain = req.domain.to_lowercase();

        // A name is forwarded at most once per trust class.
        let duplicate = if req.tag.is_trusted() {
            self.trusted_filter.duplicate(&req.name)
        } else {
            self.other_filter.duplicate(&req.name)
        };
        if duplicate {
            return;
        }
        self.core.send_dns_request(req);
    }

    /// Entry point for names the resolver confirmed.
    fn resolved_event(&self, req: &DnsRequest) {
        if self.resolved_tx.try_send(req.clone()).is_err() {
            debug!(service = "Name Service", "resolved inbox full, dropping request");
        }
    }

    async fn process_requests(self: Arc<Self>) {
        let Some(mut inboxes) = self.core.take_inboxes() else {
            return;
        };
        let Some(mut resolved_rx) = self.resolved_rx.lock().take() else {
            return;
        };
        let mut quit = self.core.quit_signal();
        let mut pause = self.core.pause_signal();

        loop {
            tokio::select! {
                _ = quit.changed() => return,
                _ = pause.changed() => self.core.wait_if_paused(&mut pause).await,
                Some(req) = inboxes.dns.recv() => self.perform_request(&req),
                Some(req) = resolved_rx.recv() => self.handle_resolved(&req).await,
                Some(_) = inboxes.addr.recv() => {}
                Some(_) = inboxes.asn.recv() => {}
                Some(_) = inboxes.whois.recv() => {}
            }
        }
    }

    fn perform_request(&self, req: &DnsRequest) {
        self.core.set_active();
        if self.core.config().passive {
            if !self.output_filter.duplicate(&req.name) && SUBDOMAIN_RE.is_match(&req.name) {
                self.core.bus().publish(
                    OUTPUT_TOPIC,
                    Output::new(&req.name, &req.domain, req.tag, &req.source),
                );
            }
            return;
        }
        self.core.bus().publish(RESOLVE_NAME_TOPIC, req.clone());
    }

    async fn handle_resolved(&self, req: &DnsRequest) {
        self.core.set_active();
        if self.core.config().is_domain_in_scope(&req.name) {
            self.check_subdomain(req).await;
        }
    }

    async fn check_subdomain(&self, req: &DnsRequest) {
        let labels: Vec<&str> = req.name.split('.').collect();
        if labels.len() < 2 {
            return;
        }
        // Cannot have fewer labels than the root domain name itself
        if labels.len() - 1 < req.domain.split('.').count() {
            return;
        }
        // Service records are not real subdomains
        if matches!(labels[1], "_tcp" | "_udp" | "_tls") {
            return;
        }

        let sub = labels[1..].join(".");

        // CNAME alias nodes are not promoted; chasing alias chains would
        // count the same host many times over.
        let graph = self.graph.lock().clone();
        if let Some(graph) = graph {
            let cname = graph.is_cname_node(&DataOpts {
                uuid: self.core.config().uuid.to_string(),
                name: sub.clone(),
                domain: req.domain.clone(),
            });
            if cname {
                return;
            }
        }

        let times = self.times_for_subdomain(&sub).await;
        self.core.bus().publish(
            NEW_SUBDOMAIN_TOPIC,
            SubdomainEvent {
                request: DnsRequest::new(&sub, &req.domain, req.tag, &req.source),
                times,
            },
        );
    }

    /// Observation count for `sub`, serialized through the counter task so
    /// concurrent promotions of the same string receive strictly
    /// increasing, gap-free counts.
    async fn times_for_subdomain(&self, sub: &str) -> usize {
        let (tx, rx) = oneshot::channel();
        let sent = self
            .times_tx
            .send(TimesRequest {
                subdomain: sub.to_string(),
                resp: tx,
            })
            .await
            .is_ok();
        if !sent {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

/// Owns the observation counter map; the only task that reads or writes it.
async fn process_times_requests(
    mut requests: mpsc::Receiver<TimesRequest>,
    mut quit: watch::Receiver<bool>,
) {
    let mut subdomains: HashMap<String, usize> = HashMap::new();

    loop {
        tokio::select! {
            _ = quit.changed() => return,
            req = requests.recv() => {
                let Some(req) = req else { return };
                let times = subdomains
                    .entry(req.subdomain)
                    .and_modify(|t| *t += 1)
                    .or_insert(1);
                let _ = req.resp.send(*times);
            }
        }
    }
}

#[async_trait]
impl Service for NameService {
    fn core(&self) -> &ServiceCore {
        &self.core
    }

    async fn on_start(self: Arc<Self>) -> Result<(), LuotainError> {
        self.core.mark_started()?;

        let me = Arc::clone(&self);
        let on_new_name = EventHandler::new::<DnsRequest, _>(move |req| {
            me.new_name_event(req.as_ref());
        });
        self.core.bus().subscribe(NEW_NAME_TOPIC, &on_new_name);

        let me = Arc::clone(&self);
        let on_resolved = EventHandler::new::<DnsRequest, _>(move |req| {
            me.resolved_event(req.as_ref());
        });
        self.core.bus().subscribe(NAME_RESOLVED_TOPIC, &on_resolved);

        let times_rx = self
            .times_rx
            .lock()
            .take()
            .ok_or_else(|| LuotainError::ServiceState {
                service: self.core.name().to_string(),
                state: self.core.state(),
            })?;
        tokio::spawn(process_times_requests(times_rx, self.core.quit_signal()));
        tokio::spawn(Arc::clone(&self).process_requests());
        Ok(())
    }
}
