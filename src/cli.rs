//! Command-line argument parsing

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use pico_args::Arguments;

use emberdns::server::Proto;

/// Parsed command-line options
pub struct Args {
    pub config: Vec<PathBuf>,
    pub sqlite: Option<String>,
    pub api_listen: SocketAddr,
    pub dns_listen: SocketAddr,
    pub dns_protocol: Proto,
    pub upstreams: Vec<SocketAddr>,
    pub upstream_timeout: Duration,
    pub disable_cache: bool,
    pub metrics_namespace: String,
    pub verbose: bool,
}

pub fn print_help() {
    println!("emberdns {}\n", env!("CARGO_PKG_VERSION"));
    println!("A DNS server for developers for home use.\n");
    println!("Usage: emberdns [OPTIONS]\n");
    println!("OPTIONS:");
    println!("  -c, --config <PATH>           Static-zone configuration file (repeatable)");
    println!("  -s, --sqlite <PATH>           Dynamic-zone sqlite database path (default: in-memory)");
    println!("  -l, --api-listen <ADDR>       Address for API and metrics (default: 0.0.0.0:9353)");
    println!("  -L, --dns-listen <ADDR>       Address for DNS (default: 0.0.0.0:53)");
    println!("      --dns-protocol <PROTO>    DNS listener protocol, udp or tcp (default: udp)");
    println!("  -u, --upstream <ADDR>         Upstream DNS server for recursive resolve (repeatable)");
    println!("      --upstream-timeout <MS>   Timeout for recursive resolve in milliseconds (default: 100)");
    println!("      --disable-cache           Disable cache for recursive resolve");
    println!("      --metrics-namespace <NS>  Namespace of prometheus metrics (default: emberdns)");
    println!("  -v, --verbose                 Show verbose logs");
    println!("  -h, --help                    Print this help message");
}

/// Parse CLI arguments using `pico-args`.
/// Returns `None` if help was printed and the caller should exit.
pub fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print_help();
        return Ok(None);
    }

    let config = pargs.values_from_str(["-c", "--config"])?;
    let sqlite = pargs.opt_value_from_str(["-s", "--sqlite"])?;
    let api_listen = pargs
        .opt_value_from_str(["-l", "--api-listen"])?
        .unwrap_or_else(|| "0.0.0.0:9353".parse().unwrap());
    let dns_listen = pargs
        .opt_value_from_str(["-L", "--dns-listen"])?
        .unwrap_or_else(|| "0.0.0.0:53".parse().unwrap());
    let dns_protocol = pargs
        .opt_value_from_str("--dns-protocol")?
        .unwrap_or_default();
    let upstreams = pargs.values_from_str(["-u", "--upstream"])?;
    let upstream_timeout = Duration::from_millis(
        pargs
            .opt_value_from_str("--upstream-timeout")?
            .unwrap_or(100),
    );
    let disable_cache = pargs.contains("--disable-cache");
    let metrics_namespace = pargs
        .opt_value_from_str("--metrics-namespace")?
        .unwrap_or_else(|| "emberdns".to_string());
    let verbose = pargs.contains(["-v", "--verbose"]);

    let rest = pargs.finish();
    if !rest.is_empty() {
        anyhow::bail!("unexpected arguments: {:?}", rest);
    }

    Ok(Some(Args {
        config,
        sqlite,
        api_listen,
        dns_listen,
        dns_protocol,
        upstreams,
        upstream_timeout,
        disable_cache,
        metrics_namespace,
        verbose,
    }))
}
