// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! End-to-end exercises of the discovery pipeline: bus, name service and
//! stubbed collaborators wired together the way the CLI wires them.

use luotain::bus::{EventBus, EventHandler};
use luotain::config::Config;
use luotain::graph::{DataGraph, DataOpts};
use luotain::name_service::NameService;
use luotain::service::Service;
use luotain::types::{
    DnsRequest, Output, SubdomainEvent, Tag, NAME_RESOLVED_TOPIC, NEW_NAME_TOPIC,
    NEW_SUBDOMAIN_TOPIC, OUTPUT_TOPIC, RESOLVE_NAME_TOPIC,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn config(passive: bool) -> Arc<Config> {
    let mut config = Config::new(vec!["example.com".to_string()]);
    config.passive = passive;
    Arc::new(config)
}

fn collect<T: Clone + Send + Sync + 'static>(
    bus: &EventBus,
    topic: &str,
) -> Arc<Mutex<Vec<T>>> {
    let collected = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&collected);
    let handler = EventHandler::new::<T, _>(move |payload| {
        sink.lock().push(payload.as_ref().clone());
    });
    bus.subscribe(topic, &handler);
    collected
}

#[tokio::test]
async fn passive_discovery_emits_one_output() {
    let bus = Arc::new(EventBus::new());
    let service = NameService::new(config(true), Arc::clone(&bus));
    Arc::clone(&service).on_start().await.unwrap();

    let outputs = collect::<Output>(&bus, OUTPUT_TOPIC);
    let resolves = collect::<DnsRequest>(&bus, RESOLVE_NAME_TOPIC);

    bus.publish(
        NEW_NAME_TOPIC,
        DnsRequest::new("x.example.com", "example.com", Tag::Scrape, "spider"),
    );
    sleep(Duration::from_millis(150)).await;

    let seen = outputs.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "x.example.com");
    assert_eq!(seen[0].domain, "example.com");
    assert_eq!(seen[0].tag, Tag::Scrape);
    assert_eq!(seen[0].source, "spider");
    assert!(resolves.lock().is_empty());

    service.core().quit();
    bus.stop();
}

#[tokio::test]
async fn active_discovery_requests_exactly_one_resolution() {
    let bus = Arc::new(EventBus::new());
    let service = NameService::new(config(false), Arc::clone(&bus));
    Arc::clone(&service).on_start().await.unwrap();

    let outputs = collect::<Output>(&bus, OUTPUT_TOPIC);
    let resolves = collect::<DnsRequest>(&bus, RESOLVE_NAME_TOPIC);

    bus.publish(
        NEW_NAME_TOPIC,
        DnsRequest::new("x.example.com", "example.com", Tag::Scrape, "spider"),
    );
    // Replays of the same (name, trust class) pair change nothing.
    bus.publish(
        NEW_NAME_TOPIC,
        DnsRequest::new("x.example.com", "example.com", Tag::Scrape, "spider"),
    );
    sleep(Duration::from_millis(150)).await;

    let seen = resolves.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].name, "x.example.com");
    assert_eq!(seen[0].domain, "example.com");
    assert_eq!(seen[0].tag, Tag::Scrape);
    assert_eq!(seen[0].source, "spider");
    assert!(outputs.lock().is_empty());

    service.core().quit();
    bus.stop();
}

#[tokio::test]
async fn resolved_names_cycle_back_into_promotions() {
    let bus = Arc::new(EventBus::new());
    let service = NameService::new(config(false), Arc::clone(&bus));
    Arc::clone(&service).on_start().await.unwrap();

    let promotions = collect::<SubdomainEvent>(&bus, NEW_SUBDOMAIN_TOPIC);

    // A stand-in resolver: confirm whatever is asked for.
    let resolver_bus = Arc::clone(&bus);
    let stub_resolver = EventHandler::new::<DnsRequest, _>(move |req| {
        resolver_bus.publish(NAME_RESOLVED_TOPIC, req.as_ref().clone());
    });
    bus.subscribe(RESOLVE_NAME_TOPIC, &stub_resolver);

    bus.publish(
        NEW_NAME_TOPIC,
        DnsRequest::new("www.foo.example.com", "example.com", Tag::Cert, "ct-log"),
    );
    sleep(Duration::from_millis(200)).await;

    let seen = promotions.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].request.name, "foo.example.com");
    assert_eq!(seen[0].request.domain, "example.com");
    assert_eq!(seen[0].request.source, "ct-log");
    assert_eq!(seen[0].times, 1);

    service.core().quit();
    bus.stop();
}

#[tokio::test]
async fn alias_reported_by_graph_is_never_promoted() {
    struct CdnAlias;

    impl DataGraph for CdnAlias {
        fn is_cname_node(&self, opts: &DataOpts) -> bool {
            opts.name == "cdn.example.com"
        }
        fn insert_cname(&self, _opts: &DataOpts, _target: &str) {}
    }

    let bus = Arc::new(EventBus::new());
    let service = NameService::new(config(false), Arc::clone(&bus));
    service.register_graph(Arc::new(CdnAlias));
    Arc::clone(&service).on_start().await.unwrap();

    let promotions = collect::<SubdomainEvent>(&bus, NEW_SUBDOMAIN_TOPIC);

    bus.publish(
        NAME_RESOLVED_TOPIC,
        DnsRequest::new("edge.cdn.example.com", "example.com", Tag::Dns, "t"),
    );
    bus.publish(
        NAME_RESOLVED_TOPIC,
        DnsRequest::new("www.app.example.com", "example.com", Tag::Dns, "t"),
    );
    sleep(Duration::from_millis(200)).await;

    let seen = promotions.lock().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].request.name, "app.example.com");

    service.core().quit();
    bus.stop();
}

#[tokio::test]
async fn repeated_promotions_count_up_without_gaps() {
    let bus = Arc::new(EventBus::new());
    let service = NameService::new(config(false), Arc::clone(&bus));
    Arc::clone(&service).on_start().await.unwrap();

    let promotions = collect::<SubdomainEvent>(&bus, NEW_SUBDOMAIN_TOPIC);

    const N: usize = 10;
    for i in 0..N {
        let name = format!("host{}.pivot.example.com", i);
        bus.publish(
            NAME_RESOLVED_TOPIC,
            DnsRequest::new(&name, "example.com", Tag::Dns, "t"),
        );
    }
    sleep(Duration::from_millis(300)).await;

    let mut counts: Vec<usize> = promotions.lock().iter().map(|e| e.times).collect();
    counts.sort_unstable();
    assert_eq!(counts, (1..=N).collect::<Vec<_>>());

    service.core().quit();
    bus.stop();
}
