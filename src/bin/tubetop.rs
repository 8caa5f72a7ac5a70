//! tubetop - interactive beanstalkd stats & control dashboard.
//!
//! Connects to a beanstalkd server and shows live server-wide and per-tube
//! statistics in scrollable grids; function keys perform maintenance
//! actions (bury, kick, delete by state) on the selected tube.
//!
//! Usage:
//!   tubetop                      # 127.0.0.1:11300, 1 second refresh
//!   tubetop -H queue.internal    # remote server
//!   tubetop -i 5                 # refresh every 5 seconds

use std::process;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tubetop::client::BeanstalkClient;
use tubetop::tui::{Dashboard, DashboardConfig};

/// Interactive beanstalkd stats & control dashboard.
#[derive(Parser)]
#[command(name = "tubetop", about = "beanstalkd stats & control dashboard", version)]
struct Args {
    /// beanstalkd host.
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// beanstalkd port.
    #[arg(short, long, default_value_t = 11300)]
    port: u16,

    /// Refresh interval in seconds; values below 1 are clamped to 1.
    #[arg(short, long, default_value_t = 1)]
    interval: u64,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    /// Logs go to stderr and stay silent unless requested.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let args = Args::parse();

    if args.host.trim().is_empty() {
        eprintln!("Error: host must not be empty");
        eprintln!("Usage: tubetop [-H HOST] [-p PORT] [-i SECONDS]");
        process::exit(1);
    }

    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let config = DashboardConfig {
        host: args.host.clone(),
        port: args.port,
        poll_interval: Duration::from_secs(args.interval.max(1)),
    };

    // Two connections: the background poller must not contend with the
    // foreground maintenance actions.
    let conn = connect_or_exit(&args.host, args.port);
    let poll_conn = connect_or_exit(&args.host, args.port);

    let mut dashboard = match Dashboard::new(config, Box::new(conn)) {
        Ok(dashboard) => dashboard,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };

    if let Err(err) = dashboard.run(Box::new(poll_conn)) {
        eprintln!("Error running dashboard: {err}");
        process::exit(1);
    }
}

fn connect_or_exit(host: &str, port: u16) -> BeanstalkClient {
    match BeanstalkClient::connect(host, port) {
        Ok(client) => client,
        Err(err) => {
            eprintln!("Error connecting to {host}:{port}: {err}");
            process::exit(1);
        }
    }
}
