// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Error Types
 * Library error taxonomy with thiserror
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use crate::service::ServiceState;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by Luotain components. Filtering outcomes in the name
/// pipeline are not errors and never appear here; connector-local transient
/// failures are logged and swallowed at the connector.
#[derive(Error, Debug)]
pub enum LuotainError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("service {service} cannot start from state {state:?}")]
    ServiceState {
        service: String,
        state: ServiceState,
    },

    #[error("network error for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("response from {url} could not be parsed: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("DNS resolution failed for {host}: {reason}")]
    Resolution { host: String, reason: String },

    #[error("missing API credential for {source}")]
    MissingCredential { r#source: String },

    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },
}
