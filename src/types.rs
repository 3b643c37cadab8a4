// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Reconnaissance Request Model
 * Shared event vocabulary for all discovery services
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

// Pub/sub topics used across Luotain. Core and collaborators must agree on
// these strings exactly; there is no namespacing beyond the prefix.
pub const NEW_NAME_TOPIC: &str = "luotain:newname";
pub const NEW_ADDR_TOPIC: &str = "luotain:newaddr";
pub const NEW_SUBDOMAIN_TOPIC: &str = "luotain:newsub";
pub const RESOLVE_NAME_TOPIC: &str = "luotain:resolve";
pub const NAME_RESOLVED_TOPIC: &str = "luotain:resolved";
pub const OUTPUT_TOPIC: &str = "luotain:output";
pub const NEW_ASN_TOPIC: &str = "luotain:asn";
pub const WHOIS_REQUEST_TOPIC: &str = "luotain:whoisreq";
pub const NEW_WHOIS_TOPIC: &str = "luotain:whoisinfo";

/// Provenance classification of a discovered name or address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    /// Alteration/permutation of a known name
    Alt,
    /// Web archive crawling
    Archive,
    /// Commercial or community API
    Api,
    /// DNS zone transfer
    Axfr,
    /// Brute-force guessing
    Brute,
    /// Certificate inspection
    Cert,
    /// Direct DNS discovery
    Dns,
    /// Externally supplied (user input, piped data)
    External,
    /// Search engine scraping
    Scrape,
}

impl Tag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::Alt => "alt",
            Tag::Archive => "archive",
            Tag::Api => "api",
            Tag::Axfr => "axfr",
            Tag::Brute => "brute",
            Tag::Cert => "cert",
            Tag::Dns => "dns",
            Tag::External => "ext",
            Tag::Scrape => "scrape",
        }
    }

    /// Provenance classes confident enough to bypass the general dedup
    /// filter and use the trusted one instead.
    pub fn is_trusted(&self) -> bool {
        matches!(self, Tag::Axfr | Tag::Cert | Tag::Dns)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single DNS answer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsAnswer {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: u16,
    #[serde(rename = "TTL")]
    pub ttl: u32,
    pub data: String,
}

/// Data carried through service processing of a DNS name.
///
/// Published payloads are shared read-only between subscribers; a request is
/// owned by its producer only until it is handed to the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsRequest {
    pub name: String,
    pub domain: String,
    pub records: Vec<DnsAnswer>,
    pub tag: Tag,
    pub source: String,
}

impl DnsRequest {
    pub fn new(name: &str, domain: &str, tag: Tag, source: &str) -> Self {
        Self {
            name: name.to_string(),
            domain: domain.to_string(),
            records: Vec::new(),
            tag,
            source: source.to_string(),
        }
    }
}

/// Data carried through service processing of a network address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddrRequest {
    pub address: IpAddr,
    pub domain: String,
    pub tag: Tag,
    pub source: String,
}

/// Autonomous system information for an address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnRequest {
    pub address: String,
    pub asn: u32,
    pub prefix: String,
    pub country_code: String,
    pub registry: String,
    pub allocation_date: Option<DateTime<Utc>>,
    pub description: String,
    pub netblocks: Vec<String>,
    pub tag: Tag,
    pub source: String,
}

/// Data carried through service processing of reverse WHOIS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhoisRequest {
    pub domain: String,
    pub company: String,
    pub email: String,
    /// Related domains discovered via reverse WHOIS
    pub new_domains: Vec<String>,
    pub tag: Tag,
    pub source: String,
}

impl WhoisRequest {
    pub fn new(domain: &str, tag: Tag, source: &str) -> Self {
        Self {
            domain: domain.to_string(),
            company: String::new(),
            email: String::new(),
            new_domains: Vec::new(),
            tag,
            source: source.to_string(),
        }
    }
}

/// Network addressing info attached to an output record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressInfo {
    #[serde(rename = "ip")]
    pub address: IpAddr,
    #[serde(rename = "cidr")]
    pub cidr: String,
    #[serde(rename = "asn")]
    pub asn: u32,
    #[serde(rename = "desc")]
    pub description: String,
}

impl AddressInfo {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            cidr: String::new(),
            asn: 0,
            description: String::new(),
        }
    }
}

/// The externally visible discovery record for an enumerated DNS name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub domain: String,
    pub addresses: Vec<AddressInfo>,
    pub tag: Tag,
    pub source: String,
}

impl Output {
    pub fn new(name: &str, domain: &str, tag: Tag, source: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            name: name.to_string(),
            domain: domain.to_string(),
            addresses: Vec::new(),
            tag,
            source: source.to_string(),
        }
    }
}

/// Payload published on the new-subdomain topic: a freshly promoted
/// subdomain together with how many times it has been observed so far.
#[derive(Debug, Clone)]
pub struct SubdomainEvent {
    pub request: DnsRequest,
    pub times: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_string_forms() {
        assert_eq!(Tag::External.as_str(), "ext");
        assert_eq!(Tag::Cert.to_string(), "cert");
        assert_eq!(Tag::Scrape.to_string(), "scrape");
    }

    #[test]
    fn test_trusted_tags() {
        assert!(Tag::Cert.is_trusted());
        assert!(Tag::Axfr.is_trusted());
        assert!(Tag::Dns.is_trusted());
        assert!(!Tag::Scrape.is_trusted());
        assert!(!Tag::Archive.is_trusted());
        assert!(!Tag::Api.is_trusted());
    }

    #[test]
    fn test_output_serializes_addresses() {
        let mut out = Output::new("www.example.com", "example.com", Tag::Cert, "Crtsh");
        out.addresses
            .push(AddressInfo::new("93.184.216.34".parse().unwrap()));

        let json = serde_json::to_string(&out).unwrap();
        assert!(json.contains("\"ip\":\"93.184.216.34\""));
        assert!(json.contains("\"tag\":\"cert\""));
    }
}
