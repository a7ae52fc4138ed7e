//! # netsim — Network Simulator Entry Point
//!
//! Loads a network configuration, wires up every node's ports (in-process
//! pipes or real TCP sockets), spawns one task per node, and hands control
//! to the interactive [`manager`](netsim::manager) console.
//!
//! ## Architecture Overview
//!
//! 1. **Parse arguments**: config path, verbosity, and which host the
//!    operator starts attached to.
//! 2. **Initialize logging**: structured `tracing` output, colorized on
//!    stdout and plain in an optional log file.
//! 3. **Load the configuration**: spec §6's node/link grammar.
//! 4. **Build links**: one [`PipePort`] pair per pipe link, one
//!    [`TcpPort`] per socket-link endpoint.
//! 5. **Spawn nodes**: one Tokio task per host/switch/name-server, each
//!    owning its ports exclusively.
//! 6. **Run the manager**: blocks until the operator quits or stdin closes.

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Styles};
use clap::Parser;
use netsim::config::{LinkSpec, NetworkConfig, NodeKindSpec};
use netsim::manager::{Manager, ManagerHandle};
use netsim::node::host::{HostContext, ManLink};
use netsim::node::nameserver::NameServerContext;
use netsim::node::switch::SwitchContext;
use netsim::port::{PipePort, Port, TcpPort};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

mod logging;
use logging::ColorizedFormatter;

fn styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::Yellow.on_default())
        .usage(AnsiColor::Yellow.on_default())
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// A small in-process packet-switched network simulator.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, styles = styles())]
struct Args {
    /// Path to the network configuration file (spec §6 grammar).
    #[arg(long)]
    config: PathBuf,

    /// Increase diagnostic log verbosity.
    ///
    ///  -v: debug
    ///  -vv: trace
    /// By default, only INFO and above are shown.
    #[arg(short, long, action = clap::ArgAction::Count, help_heading = "Output and Logging")]
    verbose: u8,

    /// Silence user-facing logging on stdout; only the manager prompt and
    /// host replies are printed.
    #[arg(short, long, help_heading = "Output and Logging")]
    quiet: bool,

    /// Host id the manager starts attached to. Defaults to the lowest host
    /// id present in the configuration.
    #[arg(long)]
    active: Option<u8>,

    /// Write detailed logs to this file instead of `netsim.log` in the
    /// current directory. Pass "stderr" to log to stderr instead of a file.
    #[arg(long)]
    log_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let guard;
    let detailed_log_layer;
    if let Some("stderr") = args.log_file.as_deref() {
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(log_level)
            .boxed();
        guard = None;
    } else {
        let file_appender = match args.log_file.as_deref() {
            Some(path_str) => {
                let log_path = std::path::Path::new(path_str);
                let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
                let log_filename = log_path
                    .file_name()
                    .unwrap_or_else(|| std::ffi::OsStr::new("netsim.log"));
                tracing_appender::rolling::never(log_dir, log_filename)
            }
            None => tracing_appender::rolling::never(".", "netsim.log"),
        };
        let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        detailed_log_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_filter(log_level)
            .boxed();
        guard = Some(file_guard);
    }

    let stdout_log = if !args.quiet {
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ColorizedFormatter)
                .with_filter(log_level),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(detailed_log_layer)
        .with(stdout_log)
        .init();
    let _log_guard = guard;

    info!("loading network configuration from {}", args.config.display());
    let config = NetworkConfig::load(&args.config).context("loading network configuration")?;

    let mut ports: HashMap<u8, Vec<Box<dyn Port>>> = HashMap::new();
    for node in &config.nodes {
        ports.entry(node.id).or_default();
    }

    for link in &config.links {
        match link {
            LinkSpec::Pipe { a, b } => {
                let (pa, pb) = PipePort::pair(*a, *b);
                ports.entry(*a).or_default().push(Box::new(pa));
                ports.entry(*b).or_default().push(Box::new(pb));
            }
            LinkSpec::Socket {
                a,
                local_domain,
                local_port,
                remote_domain,
                remote_port,
            } => {
                let local_addr = resolve(local_domain, *local_port)
                    .await
                    .with_context(|| format!("resolving local address {local_domain}:{local_port}"))?;
                let remote_addr = resolve(remote_domain, *remote_port)
                    .await
                    .with_context(|| format!("resolving remote address {remote_domain}:{remote_port}"))?;
                // spec §6's socket-link grammar only names the local node
                // `a` per entry, not the id on the other end of the wire.
                let port = TcpPort::bind(None, local_addr, remote_addr)
                    .await
                    .with_context(|| format!("binding TCP port for node {a}"))?;
                ports.entry(*a).or_default().push(Box::new(port));
            }
        }
    }

    let mut manager_handles = Vec::new();

    for node in &config.nodes {
        let node_ports = ports.remove(&node.id).unwrap_or_default();
        match node.kind {
            NodeKindSpec::Host => {
                let (cmd_tx, cmd_rx) = mpsc::channel(16);
                let (reply_tx, reply_rx) = mpsc::channel(64);
                manager_handles.push(ManagerHandle {
                    node_id: node.id,
                    cmd_tx,
                    reply_rx,
                });
                let man = ManLink { cmd_rx, reply_tx };
                let ctx = HostContext::new(node.id, node_ports, man);
                tokio::task::spawn(ctx.run());
            }
            NodeKindSpec::Switch => {
                let ctx = SwitchContext::new(node.id, node_ports);
                tokio::task::spawn(ctx.run());
            }
            NodeKindSpec::NameServer => {
                let ctx = NameServerContext::new(node_ports);
                tokio::task::spawn(ctx.run());
            }
        }
    }

    if manager_handles.is_empty() {
        warn!("configuration has no hosts; nothing for the manager to attach to");
    }

    let manager = match args.active {
        Some(id) => Manager::with_active(manager_handles, id),
        None => Manager::new(manager_handles),
    };
    let code = manager.run().await;
    std::process::exit(code);
}

async fn resolve(domain: &str, port: u16) -> Result<std::net::SocketAddr> {
    tokio::net::lookup_host((domain, port))
        .await?
        .next()
        .with_context(|| format!("no addresses found for {domain}:{port}"))
}
