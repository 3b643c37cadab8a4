// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Liveness Monitor
 * Stall detection over service last-active timestamps
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::service::{Service, ServiceState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Watches every registered service's last-active timestamp. A running
/// service that has not marked itself active within the stall threshold is
/// reported once; the same quiescence signal tells the caller when an
/// enumeration has drained.
pub struct HealthMonitor {
    services: Mutex<Vec<Arc<dyn Service>>>,
    stall_threshold: Duration,
}

impl HealthMonitor {
    pub fn new(stall_threshold: Duration) -> Arc<Self> {
        Arc::new(Self {
            services: Mutex::new(Vec::new()),
            stall_threshold,
        })
    }

    pub fn register(&self, service: Arc<dyn Service>) {
        self.services.lock().push(service);
    }

    /// Whether every registered service has been idle for at least `idle`.
    /// Stopped services count as idle.
    pub fn all_idle_for(&self, idle: Duration) -> bool {
        self.services.lock().iter().all(|service| {
            service.core().state() == ServiceState::Stopped
                || service.core().since_active() >= idle
        })
    }

    /// Periodic stall reporting. Runs until the handle is dropped/aborted.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CHECK_INTERVAL);
            loop {
                interval.tick().await;
                for service in monitor.services.lock().iter() {
                    let core = service.core();
                    if core.state() != ServiceState::Running {
                        continue;
                    }
                    let idle = core.since_active();
                    if idle >= monitor.stall_threshold {
                        warn!(
                            service = core.name(),
                            idle_secs = idle.as_secs(),
                            "service appears stalled"
                        );
                    } else {
                        debug!(service = core.name(), idle_ms = idle.as_millis() as u64, "live");
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::EventBus;
    use crate::config::Config;
    use crate::errors::LuotainError;
    use crate::service::ServiceCore;
    use async_trait::async_trait;
    use tokio::time::sleep;

    struct IdleService {
        core: ServiceCore,
    }

    #[async_trait]
    impl Service for IdleService {
        fn core(&self) -> &ServiceCore {
            &self.core
        }

        async fn on_start(self: Arc<Self>) -> Result<(), LuotainError> {
            self.core.mark_started()?;
            Ok(())
        }
    }

    fn idle_service() -> Arc<IdleService> {
        let config = Arc::new(Config::new(vec!["example.com".to_string()]));
        let bus = Arc::new(EventBus::new());
        Arc::new(IdleService {
            core: ServiceCore::new("Idle", config, bus),
        })
    }

    #[tokio::test]
    async fn test_all_idle_after_quiet_period() {
        let monitor = HealthMonitor::new(Duration::from_secs(30));
        let service = idle_service();
        monitor.register(Arc::clone(&service) as Arc<dyn Service>);

        service.core().set_active();
        assert!(!monitor.all_idle_for(Duration::from_millis(50)));

        sleep(Duration::from_millis(80)).await;
        assert!(monitor.all_idle_for(Duration::from_millis(50)));

        // Fresh activity resets quiescence
        service.core().set_active();
        assert!(!monitor.all_idle_for(Duration::from_millis(50)));
    }

    #[tokio::test]
    async fn test_stopped_services_count_as_idle() {
        let monitor = HealthMonitor::new(Duration::from_secs(30));
        let service = idle_service();
        monitor.register(Arc::clone(&service) as Arc<dyn Service>);

        service.core().set_active();
        service.core().quit();
        assert!(monitor.all_idle_for(Duration::from_secs(3600)));
    }
}
