use clap::Parser;
use nodenetd::alert::broadcaster::AlertBroadcaster;
use nodenetd::alert::signing::Ed25519Signer;
use nodenetd::alert::store::AlertStore;
use nodenetd::config::{self, Config};
use nodenetd::constants::alert::PRUNE_INTERVAL_SECS;
use nodenetd::constants::client::{CLIENT_NAME, CLIENT_VERSION, PROTOCOL_VERSION};
use nodenetd::constants::peers::LOCAL_MANUAL_SCORE;
use nodenetd::constants::services::NODE_NETWORK;
use nodenetd::error::AppError;
use nodenetd::network::added_peers::{AddedPeerList, DialQueue};
use nodenetd::network::peer_connection_registry::PeerConnectionRegistry;
use nodenetd::network::peer_scoring::MisbehaviorTracker;
use nodenetd::network::reachability::{Network, Reachability};
use nodenetd::network::resolver::DnsResolver;
use nodenetd::peer_directory::{NodeIdentity, PeerDirectoryService};
use nodenetd::rpc::{RpcHandler, RpcServer};
use nodenetd::shutdown::ShutdownManager;
use nodenetd::time_sync::{Clock, NetworkClock};
use nodenetd::NetworkType;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "nodenetd")]
#[command(about = "nodenet peer directory and alert daemon", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "nodenet.toml")]
    config: String,

    #[arg(short, long)]
    verbose: bool,

    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let network_type = Config::load_from_file(&args.config)
        .map(|cfg| cfg.node.network_type())
        .unwrap_or(NetworkType::Testnet);

    if args.generate_config {
        match Config::default().save_to_file(&args.config) {
            Ok(()) => {
                println!("✅ Generated default config at: {}", args.config);
                return;
            }
            Err(e) => {
                eprintln!("❌ Failed to generate config: {}", e);
                std::process::exit(1);
            }
        }
    }

    let config = match Config::load_or_create(&args.config, &network_type) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    setup_logging(&config.logging, args.verbose);

    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_date = option_env!("BUILD_DATE").unwrap_or("unknown");
    tracing::info!("🚀 nodenetd v{} ({}), built {}", version, git_hash, build_date);
    tracing::info!("📡 Network: {}", config.node.network_type());
    tracing::info!("📁 Data directory: {}", config::get_network_data_dir(&config.node.network_type()).display());

    let mut shutdown_manager = ShutdownManager::new();
    if let Err(e) = start(&config, &mut shutdown_manager).await {
        tracing::error!("❌ Startup failed: {}", e);
        std::process::exit(1);
    }

    shutdown_manager.wait_for_shutdown().await;
}

async fn start(config: &Config, shutdown: &mut ShutdownManager) -> Result<(), AppError> {
    let network_type = config.node.network_type();

    let clock: Arc<dyn Clock> = Arc::new(NetworkClock::new());
    let registry = Arc::new(PeerConnectionRegistry::new());
    let added = Arc::new(AddedPeerList::with_entries(config.network.added_nodes.iter()));
    let reachability = Arc::new(build_reachability(config, &network_type)?);

    let authority = config.alert.authority_key_bytes()?;
    let alerts = Arc::new(AlertStore::new(authority, Arc::new(Ed25519Signer), clock.clone()));

    let identity = NodeIdentity {
        client_name: CLIENT_NAME.to_string(),
        client_version: CLIENT_VERSION,
        protocol_version: PROTOCOL_VERSION,
        sub_version_comments: config.node.subversion_comments.clone(),
        local_services: NODE_NETWORK,
        relay_fee: config.network.relay_fee,
        default_port: network_type.default_p2p_port(),
    };
    let directory = Arc::new(PeerDirectoryService::new(
        identity,
        registry.clone(),
        added.clone(),
        Arc::new(DnsResolver::new(config.network.name_lookup)),
        Arc::new(MisbehaviorTracker::default()),
        reachability,
        alerts.clone(),
        clock.clone(),
    ));
    tracing::info!("📒 {} added node(s) from config", added.len());

    let (dial_queue, mut dial_requests) = DialQueue::new();
    shutdown.spawn(|token| async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                request = dial_requests.recv() => match request {
                    Some(addr) => tracing::info!("📞 One-shot connection requested to {}", addr),
                    None => break,
                },
            }
        }
    });

    let prune_store = alerts.clone();
    shutdown.spawn(|token| async move {
        let mut interval = tokio::time::interval(Duration::from_secs(PRUNE_INTERVAL_SECS));
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    let pruned = prune_store.prune_expired();
                    if pruned > 0 {
                        tracing::debug!("🧹 Dropped {} expired alert(s)", pruned);
                    }
                }
            }
        }
    });

    let broadcaster = if config.alert.allow_sendalert {
        tracing::warn!("⚠️ sendalert is enabled on this node");
        Some(Arc::new(AlertBroadcaster::new(
            registry,
            alerts,
            Arc::new(Ed25519Signer),
            clock,
            PROTOCOL_VERSION,
        )))
    } else {
        None
    };

    if config.rpc.enabled {
        let rpc_addr = config.rpc.full_listen_address(&network_type);
        let handler = Arc::new(RpcHandler::new(directory, Arc::new(dial_queue), broadcaster));
        let server = RpcServer::bind(&rpc_addr, handler)
            .await
            .map_err(|e| AppError::Network(format!("cannot bind RPC on {}: {}", rpc_addr, e)))?;
        shutdown.spawn(|token| async move {
            if let Err(e) = server.run(token).await {
                tracing::error!("RPC server stopped: {}", e);
            }
        });
    } else {
        tracing::info!("RPC disabled");
    }

    Ok(())
}

fn build_reachability(config: &Config, network_type: &NetworkType) -> Result<Reachability, AppError> {
    let reachability = Reachability::new();

    for network in config.network.limited_networks()? {
        reachability.set_limited(network, true);
    }
    for network in [Network::Ipv4, Network::Ipv6] {
        reachability.set_reachable(network, true);
    }
    for (network, proxy) in config.network.proxies()? {
        reachability.set_proxy(network, proxy);
        reachability.set_reachable(network, true);
    }

    if let Some(external) = config.network.full_external_address(network_type) {
        match external.parse::<SocketAddr>() {
            Ok(addr) => {
                reachability.add_local(addr, LOCAL_MANUAL_SCORE);
            }
            Err(e) => tracing::warn!("⚠️ Ignoring external address {}: {}", external, e),
        }
    }

    Ok(reachability)
}

fn setup_logging(config: &config::LoggingConfig, verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if verbose { "trace" } else { &config.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // journald adds its own timestamp and host
    let is_systemd =
        std::env::var("JOURNAL_STREAM").is_ok() || std::env::var("INVOCATION_ID").is_ok();

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let short_hostname = hostname.split('.').next().unwrap_or(&hostname).to_string();

    match config.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_thread_ids(false)
                .init();
        }
        _ if is_systemd => {
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .without_time()
                .compact()
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_timer(CustomTimer {
                    hostname: short_hostname,
                })
                .compact()
                .init();
        }
    }
}

/// UTC time plus short hostname, e.g. "2026-10-18 18:09:43.150 [seed1]"
struct CustomTimer {
    hostname: String,
}

impl tracing_subscriber::fmt::time::FormatTime for CustomTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(
            w,
            "{}.{:03} [{}]",
            now.format("%Y-%m-%d %H:%M:%S"),
            now.timestamp_subsec_millis(),
            self.hostname
        )
    }
}
