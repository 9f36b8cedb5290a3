//! emberdns - a small authoritative-plus-recursive DNS server for home and
//! development use.

mod cli;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;

use emberdns::metrics::Metrics;
use emberdns::resolver::{
    DynamicResolver, FirstResolver, ForwardResolver, LocalCache, MergeResolver, Resolver,
    SqliteResolver, StaticResolver,
};
use emberdns::server::Server;

use crate::cli::{parse_args, Args};

fn load_static_resolvers(args: &Args) -> anyhow::Result<Vec<Arc<dyn Resolver>>> {
    let mut resolvers: Vec<Arc<dyn Resolver>> = Vec::new();

    for path in &args.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("static-zone: failed to read {}", path.display()))?;
        let resolver = StaticResolver::from_config(&text)
            .with_context(|| format!("static-zone: {}", path.display()))?;
        resolvers.push(Arc::new(resolver));
    }

    Ok(resolvers)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        return Ok(());
    };

    emberdns::logging::init_logging(args.verbose)?;

    let metrics = Arc::new(Metrics::new(&args.metrics_namespace)?);

    let mut resolvers = load_static_resolvers(&args)?;

    let sqlite_path = args.sqlite.clone().unwrap_or_else(|| ":memory:".to_string());
    let dynamic = Arc::new(SqliteResolver::new(&sqlite_path).context("dynamic-zone")?);
    resolvers.push(Arc::clone(&dynamic) as Arc<dyn Resolver>);

    let local = Arc::new(MergeResolver::new(resolvers));

    let resolver: Arc<dyn Resolver> = if args.upstreams.is_empty() {
        local
    } else {
        let mut forward: Arc<dyn Resolver> = Arc::new(ForwardResolver::new(
            args.upstreams.clone(),
            args.upstream_timeout,
            Arc::clone(&metrics),
        ));
        if !args.disable_cache {
            forward = Arc::new(LocalCache::new(forward, Arc::clone(&metrics)));
        }
        Arc::new(FirstResolver::new(vec![local, forward]))
    };

    let server = Server {
        name: String::new(),
        metrics,
        dynamic_resolver: Arc::clone(&dynamic) as Arc<dyn DynamicResolver>,
        resolver: Arc::clone(&resolver),
    };

    let (closer, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutting down");
            let _ = closer.send(true);
        }
    });

    let result = server
        .listen_and_serve(args.api_listen, args.dns_listen, args.dns_protocol, shutdown)
        .await;

    resolver.close().await?;

    result.map_err(Into::into)
}
