// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/*
 * Bountyy Oy - Discovery Connectors
 * Thin stateless clients that publish discovered names onto the bus
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

//! Every connector is a Service that differs from its siblings only in URL
//! construction and response parsing. Connectors tag each emitted request
//! with their provenance category and their own name, dedup the queries they
//! have already issued in the current run, pace themselves with a
//! [`SourceRateLimiter`](crate::rate_limiter::SourceRateLimiter), and log
//! failures with their identity and the failing URL before moving on.

pub mod crtsh;
pub mod umbrella;
pub mod wayback;
pub mod websearch;

use crate::bus::EventBus;
use crate::config::Config;
use crate::http_client::HttpClient;
use crate::service::Service;
use std::sync::Arc;

pub use crtsh::Crtsh;
pub use umbrella::Umbrella;
pub use wayback::Wayback;
pub use websearch::Haku;

/// Normalize a name scraped out of free text: lowercase, trim stray dots
/// and whitespace, drop wildcard labels.
pub fn clean_name(name: &str) -> String {
    let mut name = name.trim().trim_matches('.').to_lowercase();
    while let Some(stripped) = name.strip_prefix("*.") {
        name = stripped.to_string();
    }
    name
}

/// Every data source connector, initialized but not yet started.
pub fn all_sources(
    config: &Arc<Config>,
    bus: &Arc<EventBus>,
    http: &HttpClient,
) -> Vec<Arc<dyn Service>> {
    vec![
        Crtsh::new(Arc::clone(config), Arc::clone(bus), http.clone()) as Arc<dyn Service>,
        Wayback::new(Arc::clone(config), Arc::clone(bus), http.clone()) as Arc<dyn Service>,
        Haku::new(Arc::clone(config), Arc::clone(bus), http.clone()) as Arc<dyn Service>,
        Umbrella::new(Arc::clone(config), Arc::clone(bus), http.clone()) as Arc<dyn Service>,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("  WWW.Example.COM. "), "www.example.com");
        assert_eq!(clean_name("*.stage.example.com"), "stage.example.com");
        assert_eq!(clean_name("*.*.deep.example.com"), "deep.example.com");
        assert_eq!(clean_name(".example.com"), "example.com");
    }
}
