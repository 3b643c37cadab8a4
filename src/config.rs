// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Enumeration Configuration
 * Scope, mode, credentials and tuning knobs for a reconnaissance run
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::errors::LuotainError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;
use validator::Validate;

fn default_max_dns_queries() -> usize {
    100
}

fn default_timeout() -> u64 {
    30
}

fn default_inbox_capacity() -> usize {
    1024
}

fn default_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Credential for a data source that requires one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub key: String,
    #[serde(default)]
    pub secret: String,
}

/// Configuration shared read-only by every service in a run.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Root domains the run is authorized to expand into, lowercase.
    #[validate(length(min = 1))]
    pub domains: Vec<String>,

    /// Passive mode never triggers resolution; names that pass the sanity
    /// check are emitted directly.
    #[serde(default)]
    pub passive: bool,

    /// Ceiling on concurrent DNS lookups in the resolver service.
    #[validate(range(min = 1, max = 10000))]
    #[serde(default = "default_max_dns_queries")]
    pub max_dns_queries: usize,

    /// Per-request timeout for connector HTTP calls.
    #[validate(range(min = 1, max = 3600))]
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Capacity of each typed service inbox.
    #[validate(range(min = 16, max = 65536))]
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,

    /// Per-source credentials, keyed by source name.
    #[serde(default)]
    pub api_keys: HashMap<String, ApiKey>,

    /// Correlation id for this run, passed to the graph collaborator.
    #[serde(default = "default_uuid")]
    pub uuid: Uuid,
}

impl Config {
    pub fn new(domains: Vec<String>) -> Self {
        let domains = domains
            .into_iter()
            .map(|d| d.trim().trim_end_matches('.').to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        Self {
            domains,
            passive: false,
            max_dns_queries: default_max_dns_queries(),
            request_timeout_secs: default_timeout(),
            inbox_capacity: default_inbox_capacity(),
            api_keys: HashMap::new(),
            uuid: Uuid::new_v4(),
        }
    }

    /// Load from a JSON file and validate. API keys may be overridden per
    /// source via `LUOTAIN_<SOURCE>_KEY` environment variables.
    pub fn load(path: &Path) -> Result<Self, LuotainError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| LuotainError::Configuration(format!("{}: {}", path.display(), e)))?;
        let mut config: Config = serde_json::from_str(&raw)
            .map_err(|e| LuotainError::Configuration(format!("{}: {}", path.display(), e)))?;
        config.domains = config
            .domains
            .into_iter()
            .map(|d| d.trim().trim_end_matches('.').to_lowercase())
            .filter(|d| !d.is_empty())
            .collect();
        config
            .validate()
            .map_err(|e| LuotainError::Configuration(e.to_string()))?;
        Ok(config)
    }

    /// The configured scope roots.
    pub fn root_domains(&self) -> &[String] {
        &self.domains
    }

    /// Whether `name` falls under one of the configured root domains.
    pub fn is_domain_in_scope(&self, name: &str) -> bool {
        self.which_domain(name).is_some()
    }

    /// The root domain `name` belongs to, if any. Suffix-compatible match:
    /// the name equals a root or sits strictly below it on a label boundary.
    pub fn which_domain(&self, name: &str) -> Option<&str> {
        let name = name.trim_end_matches('.');
        self.domains
            .iter()
            .find(|root| {
                name == root.as_str()
                    || (name.len() > root.len() + 1
                        && name.ends_with(root.as_str())
                        && name.as_bytes()[name.len() - root.len() - 1] == b'.')
            })
            .map(String::as_str)
    }

    /// Compiled pattern matching any subdomain of `root` inside free text.
    /// Used by connectors to extract names from response bodies.
    pub fn domain_regex(&self, root: &str) -> Option<Regex> {
        if !self.domains.iter().any(|d| d == root) {
            return None;
        }
        let pattern = format!(
            r"(([a-zA-Z0-9]|[_a-zA-Z0-9][_a-zA-Z0-9-]{{0,61}}[a-zA-Z0-9])\.)+{}",
            regex::escape(root)
        );
        Regex::new(&pattern).ok()
    }

    /// Credential lookup: environment first, config file second.
    pub fn get_api_key(&self, source: &str) -> Option<ApiKey> {
        let env_var = format!(
            "LUOTAIN_{}_KEY",
            source.to_uppercase().replace([' ', '-'], "_")
        );
        if let Ok(key) = std::env::var(&env_var) {
            if !key.is_empty() {
                return Some(ApiKey {
                    key,
                    secret: String::new(),
                });
            }
        }
        self.api_keys.get(source).cloned()
    }
}
