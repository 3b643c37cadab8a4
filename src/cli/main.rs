// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Luotain - Attack Surface Reconnaissance
 * Standalone CLI for subdomain discovery
 *
 * Features:
 * - Passive and active enumeration modes
 * - Certificate transparency, web archive, search and reverse-WHOIS sources
 * - JSON-lines output stream
 * - Per-source rate limiting and liveness monitoring
 *
 * (c) 2026 Bountyy Oy
 */

use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use luotain::bus::{EventBus, EventHandler};
use luotain::config::Config;
use luotain::graph::{DataGraph, MemoryGraph};
use luotain::health::HealthMonitor;
use luotain::http_client::HttpClient;
use luotain::name_service::NameService;
use luotain::resolver::ResolverService;
use luotain::service::Service;
use luotain::sources;
use luotain::types::{DnsRequest, Output, Tag, WhoisRequest, NEW_NAME_TOPIC, OUTPUT_TOPIC};

const SEED_SOURCE: &str = "Luotain";

/// Luotain - Attack Surface Reconnaissance
#[derive(Parser)]
#[command(name = "luotain")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version)]
#[command(about = "Subdomain discovery across passive data sources. Fast, modular, Rust.", long_about = None)]
struct Cli {
    /// Root domain(s) to enumerate
    #[arg(short, long = "domain")]
    domains: Vec<String>,

    /// Passive mode: never resolve, emit names as discovered
    #[arg(short, long)]
    passive: bool,

    /// Configuration file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write JSON-lines output to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    timeout: u64,

    /// Seconds of system-wide quiet before the run is considered drained
    #[arg(long, default_value = "10")]
    idle: u64,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<Arc<Config>> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path).context("failed to load configuration")?,
        None => Config::new(cli.domains.clone()),
    };

    for domain in &cli.domains {
        let domain = domain.trim().trim_end_matches('.').to_lowercase();
        if !domain.is_empty() && !config.domains.contains(&domain) {
            config.domains.push(domain);
        }
    }
    if config.domains.is_empty() {
        anyhow::bail!("no root domains given; use --domain or a configuration file");
    }

    config.passive = config.passive || cli.passive;
    config.request_timeout_secs = cli.timeout;
    Ok(Arc::new(config))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = build_config(&cli)?;
    info!(
        domains = %config.domains.join(","),
        passive = config.passive,
        "starting enumeration"
    );

    let bus = Arc::new(EventBus::new());
    let graph: Arc<dyn DataGraph> = Arc::new(MemoryGraph::new());
    let http = HttpClient::new(config.request_timeout_secs)?;

    // Output writer: subscribes to the output topic and drains into a
    // JSON-lines sink on its own task.
    let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<Output>();
    let on_output = EventHandler::new::<Output, _>(move |out| {
        let _ = out_tx.send(out.as_ref().clone());
    });
    bus.subscribe(OUTPUT_TOPIC, &on_output);

    let output_path = cli.output.clone();
    let writer = tokio::spawn(async move {
        let mut sink: Box<dyn Write + Send> = match &output_path {
            Some(path) => match std::fs::File::create(path) {
                Ok(file) => Box::new(file),
                Err(e) => {
                    warn!("cannot create {}: {}, falling back to stdout", path.display(), e);
                    Box::new(std::io::stdout())
                }
            },
            None => Box::new(std::io::stdout()),
        };

        let mut count = 0usize;
        while let Some(record) = out_rx.recv().await {
            match serde_json::to_string(&record) {
                Ok(line) => {
                    if writeln!(sink, "{}", line).is_err() {
                        break;
                    }
                    count += 1;
                }
                Err(e) => debug!("unserializable output record: {}", e),
            }
        }
        let _ = sink.flush();
        count
    });

    // Core pipeline
    let name_service = NameService::new(Arc::clone(&config), Arc::clone(&bus));
    name_service.register_graph(Arc::clone(&graph));
    Arc::clone(&name_service)
        .on_start()
        .await
        .context("failed to start the name service")?;

    let mut services: Vec<Arc<dyn Service>> = vec![Arc::clone(&name_service) as Arc<dyn Service>];

    if !config.passive {
        let resolver = ResolverService::new(Arc::clone(&config), Arc::clone(&bus))
            .context("failed to create the resolver")?;
        resolver.register_graph(Arc::clone(&graph));
        Arc::clone(&resolver)
            .on_start()
            .await
            .context("failed to start the resolver")?;
        services.push(resolver as Arc<dyn Service>);
    }

    // Data sources are independent: one refusing to start must not take
    // down the run.
    let mut connectors: Vec<Arc<dyn Service>> = Vec::new();
    for source in sources::all_sources(&config, &bus, &http) {
        match Arc::clone(&source).on_start().await {
            Ok(()) => {
                connectors.push(Arc::clone(&source));
                services.push(source);
            }
            Err(e) => warn!(source = source.core().name(), "failed to start: {}", e),
        }
    }

    let monitor = HealthMonitor::new(Duration::from_secs(60));
    for service in &services {
        monitor.register(Arc::clone(service));
    }
    let monitor_handle = monitor.start();

    // Seed the run: every root domain enters as a newly discovered name,
    // and the per-domain connectors get fed directly.
    for domain in config.root_domains() {
        bus.publish(
            NEW_NAME_TOPIC,
            DnsRequest::new(domain, domain, Tag::Dns, SEED_SOURCE),
        );
        for connector in &connectors {
            connector
                .core()
                .send_dns_request(DnsRequest::new(domain, domain, Tag::Dns, SEED_SOURCE));
            connector
                .core()
                .send_whois_request(WhoisRequest::new(domain, Tag::Dns, SEED_SOURCE));
        }
    }

    // Run until the whole system has been quiet for the idle window, or
    // the user interrupts.
    let idle = Duration::from_secs(cli.idle);
    let started = Instant::now();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tick.tick() => {
                if started.elapsed() > idle && monitor.all_idle_for(idle) {
                    info!("no new activity for {}s, run complete", idle.as_secs());
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    monitor_handle.abort();
    for service in &services {
        service.core().quit();
    }
    bus.stop();

    // Releasing the last handle on the output subscription closes the
    // writer's channel and lets it report its final count.
    bus.unsubscribe(OUTPUT_TOPIC, &on_output);
    drop(on_output);

    let discovered = writer.await.unwrap_or(0);
    info!(
        discovered,
        elapsed_secs = started.elapsed().as_secs(),
        "enumeration finished"
    );
    Ok(())
}
