// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/*
 * Bountyy Oy - Service Lifecycle Framework
 * Uniform control plane and typed inboxes for all discovery services
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

//! Every producer and consumer in Luotain embeds a [`ServiceCore`]: a state
//! machine (`Created -> Running -> (Paused <-> Running)* -> Stopped`), a
//! quit/pause/resume control plane, one bounded inbox per request kind, and
//! a last-active timestamp for liveness monitoring.
//!
//! Inbox sends come from bus subscription callbacks and must never block the
//! dispatch task. The policy here is drop-on-full: a `try_send` that fails
//! discards the request with a debug log. This is the backpressure point
//! between the bus and a slow consumer; a consumer that never drains its
//! inbox loses publishes from its own view only.

use crate::bus::EventBus;
use crate::config::Config;
use crate::errors::LuotainError;
use crate::types::{AddrRequest, AsnRequest, DnsRequest, WhoisRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Lifecycle states. `Stopped` is terminal; no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Running,
    Paused,
    Stopped,
}

/// The receiving halves of a service's typed inboxes, taken exactly once by
/// its processing loop.
pub struct Inboxes {
    pub dns: mpsc::Receiver<DnsRequest>,
    pub addr: mpsc::Receiver<AddrRequest>,
    pub asn: mpsc::Receiver<AsnRequest>,
    pub whois: mpsc::Receiver<WhoisRequest>,
}

/// The base unit of concurrent work shared by every service.
pub struct ServiceCore {
    name: String,
    config: Arc<Config>,
    bus: Arc<EventBus>,
    state: Mutex<ServiceState>,
    quit_tx: watch::Sender<bool>,
    pause_tx: watch::Sender<bool>,
    last_active: Mutex<Instant>,
    dns_tx: mpsc::Sender<DnsRequest>,
    addr_tx: mpsc::Sender<AddrRequest>,
    asn_tx: mpsc::Sender<AsnRequest>,
    whois_tx: mpsc::Sender<WhoisRequest>,
    inboxes: Mutex<Option<Inboxes>>,
}

impl ServiceCore {
    pub fn new(name: &str, config: Arc<Config>, bus: Arc<EventBus>) -> Self {
        let capacity = config.inbox_capacity;
        let (dns_tx, dns_rx) = mpsc::channel(capacity);
        let (addr_tx, addr_rx) = mpsc::channel(capacity);
        let (asn_tx, asn_rx) = mpsc::channel(capacity);
        let (whois_tx, whois_rx) = mpsc::channel(capacity);
        let (quit_tx, _) = watch::channel(false);
        let (pause_tx, _) = watch::channel(false);

        Self {
            name: name.to_string(),
            config,
            bus,
            state: Mutex::new(ServiceState::Created),
            quit_tx,
            pause_tx,
            last_active: Mutex::new(Instant::now()),
            dns_tx,
            addr_tx,
            asn_tx,
            whois_tx,
            inboxes: Mutex::new(Some(Inboxes {
                dns: dns_rx,
                addr: addr_rx,
                asn: asn_rx,
                whois: whois_rx,
            })),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only view of the owning configuration.
    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    /// Read-only handle to the shared bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn state(&self) -> ServiceState {
        *self.state.lock()
    }

    /// Guarded `Created -> Running` transition. A second start attempt is an
    /// error, which keeps `on_start` from ever double-subscribing.
    pub fn mark_started(&self) -> Result<(), LuotainError> {
        let mut state = self.state.lock();
        match *state {
            ServiceState::Created => {
                *state = ServiceState::Running;
                Ok(())
            }
            current => Err(LuotainError::ServiceState {
                service: self.name.clone(),
                state: current,
            }),
        }
    }

    /// Record the last-active timestamp read by the liveness monitor.
    pub fn set_active(&self) {
        *self.last_active.lock() = Instant::now();
    }

    pub fn since_active(&self) -> Duration {
        self.last_active.lock().elapsed()
    }

    /// Push into the DNS inbox without blocking bus dispatch. Dropped with a
    /// debug log when the inbox is full.
    pub fn send_dns_request(&self, req: DnsRequest) {
        if self.dns_tx.try_send(req).is_err() {
            debug!(service = %self.name, "dns inbox full, dropping request");
        }
    }

    pub fn send_addr_request(&self, req: AddrRequest) {
        if self.addr_tx.try_send(req).is_err() {
            debug!(service = %self.name, "addr inbox full, dropping request");
        }
    }

    pub fn send_asn_request(&self, req: AsnRequest) {
        if self.asn_tx.try_send(req).is_err() {
            debug!(service = %self.name, "asn inbox full, dropping request");
        }
    }

    pub fn send_whois_request(&self, req: WhoisRequest) {
        if self.whois_tx.try_send(req).is_err() {
            debug!(service = %self.name, "whois inbox full, dropping request");
        }
    }

    /// Take the inbox receivers. Returns None after the first call; only one
    /// processing loop may own them.
    pub fn take_inboxes(&self) -> Option<Inboxes> {
        self.inboxes.lock().take()
    }

    /// Select-once quit signal for the processing loop.
    pub fn quit_signal(&self) -> watch::Receiver<bool> {
        self.quit_tx.subscribe()
    }

    pub fn pause_signal(&self) -> watch::Receiver<bool> {
        self.pause_tx.subscribe()
    }

    /// Terminal transition; the processing loop observes it at its next
    /// suspension point.
    pub fn quit(&self) {
        *self.state.lock() = ServiceState::Stopped;
        let _ = self.quit_tx.send(true);
    }

    pub fn pause(&self) {
        let mut state = self.state.lock();
        if *state == ServiceState::Running {
            *state = ServiceState::Paused;
            let _ = self.pause_tx.send(true);
        }
    }

    pub fn resume(&self) {
        let mut state = self.state.lock();
        if *state == ServiceState::Paused {
            *state = ServiceState::Running;
            let _ = self.pause_tx.send(false);
        }
    }

    /// Cooperative pause point. Blocks until resume when paused; checked
    /// only at suspension points, never preemptive.
    pub async fn wait_if_paused(&self, pause: &mut watch::Receiver<bool>) {
        if *pause.borrow() {
            let _ = pause.wait_for(|paused| !*paused).await;
        }
    }
}

/// A unit of concurrent work wired to the bus.
#[async_trait]
pub trait Service: Send + Sync {
    /// The embedded lifecycle core.
    fn core(&self) -> &ServiceCore;

    /// Transition to Running, subscribe to the topics this service needs,
    /// and spawn its processing loop(s). Never double-subscribes: the
    /// `mark_started` guard fails a second call.
    async fn on_start(self: Arc<Self>) -> Result<(), LuotainError>;

    fn name(&self) -> String {
        self.core().name().to_string()
    }
}
