mod analyzer;
mod canon;
mod capture;
mod error;
mod fingerprint;
mod flow;
mod query;
mod report;
mod response;
mod stats;
mod wire;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info};

use analyzer::{Analyzer, Options};
use fingerprint::QueryFormatter;
use report::SortKey;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Passive MySQL traffic analyzer", long_about = None)]
struct Config {
    /// MySQL server port to watch
    #[arg(short = 'P', long, default_value_t = 3306)]
    port: u16,

    /// Interface to sniff
    #[arg(short = 'i', long, default_value = "eth0")]
    interface: String,

    /// Unsanitized: do not canonicalize queries
    #[arg(short = 'u', long)]
    unsanitized: bool,

    /// Seconds between status reports
    #[arg(short = 't', long = "interval", default_value_t = 10)]
    interval: u64,

    /// Show this many fingerprints per status report
    #[arg(short = 'd', long = "display", default_value_t = 15)]
    display_count: usize,

    /// Print every query and its decoded response (spammy)
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Skip query cleanup in verbose output
    #[arg(short = 'n', long = "no-clean")]
    no_clean: bool,

    /// Aggregation format template (#s source, #i ip, #q query, #r route)
    #[arg(short = 'f', long, default_value = fingerprint::DEFAULT_TEMPLATE)]
    format: String,

    /// Status report sort key
    #[arg(short = 's', long, value_enum, default_value_t = SortKey::Count)]
    sort: SortKey,

    /// Hide fingerprints below this many queries per second
    #[arg(short = 'c', long, default_value_t = 0)]
    cutoff: u64,

    /// Show result set rows (use with -v)
    #[arg(short = 'r', long = "rows")]
    show_rows: bool,

    /// Seconds before an idle flow is dropped
    #[arg(long, default_value_t = 3600)]
    flow_timeout: u64,
}

fn main() {
    env_logger::init();
    let config = Config::parse();

    info!(
        "initializing MySQL sniffing on {}:{}",
        config.interface, config.port
    );

    let cap = match capture::open(&config.interface, config.port) {
        Ok(cap) => cap,
        Err(e) => {
            error!("failed to open capture on {}: {}", config.interface, e);
            std::process::exit(1);
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    let stop = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("interrupt received, shutting down");
        stop.store(false, Ordering::Relaxed);
    }) {
        error!("failed to install signal handler: {}", e);
    }

    let (packet_tx, packet_rx) = bounded(10_000);

    let formatter = QueryFormatter::new(
        &config.format,
        config.unsanitized,
        config.verbose && config.no_clean,
    );
    let opts = Options {
        port: config.port,
        verbose: config.verbose,
        show_rows: config.show_rows,
        interval: Duration::from_secs(config.interval),
        display_count: config.display_count,
        sort: config.sort,
        cutoff: config.cutoff,
        flow_timeout: Duration::from_secs(config.flow_timeout),
    };

    let analyzer = Analyzer::new(opts, formatter);
    let analyzer_handle = thread::spawn(move || {
        analyzer.run(packet_rx);
    });

    let capture_handle = thread::spawn(move || {
        capture::run(cap, packet_tx, running);
    });

    let _ = capture_handle.join();
    let _ = analyzer_handle.join();
}
