use clap::{Parser, Subcommand};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Parser, Debug)]
#[command(name = "nodenet-cli")]
#[command(about = "nodenet CLI - peer directory and alert RPC client", long_about = None)]
struct Args {
    /// RPC server URL
    #[arg(short, long, default_value = "http://127.0.0.1:19376")]
    rpc_url: String,

    /// Output compact JSON (single line)
    #[arg(long)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "lowercase")]
enum Commands {
    /// Number of live peer connections
    GetConnectionCount,

    /// Request a ping measurement from every peer
    Ping,

    /// Per-connection statistics
    GetPeerInfo,

    /// Add, remove or try once a peer address
    AddNode {
        node: String,
        /// add, remove or onetry
        command: String,
    },

    /// Added nodes, optionally resolved and matched to connections
    GetAddedNodeInfo {
        /// Resolve names and report connection state
        #[arg(long)]
        dns: bool,
        node: Option<String>,
    },

    /// Process-wide traffic totals
    GetNetTotals,

    /// Node version, reachability, local addresses and alerts
    GetNetworkInfo,

    /// Sign and broadcast a network alert
    SendAlert {
        message: String,
        /// Hex alert signing key
        private_key: String,
        min_ver: i32,
        max_ver: i32,
        /// "" for all clients, or "/name:ver/" entries
        sub_versions: String,
        priority: i32,
        id: i32,
        #[arg(long)]
        relay_days: Option<i64>,
        #[arg(long)]
        expire_days: Option<i64>,
        #[arg(long)]
        cancel_up_to: Option<i32>,
    },
}

#[derive(Serialize, Debug)]
struct RpcRequest {
    jsonrpc: String,
    id: String,
    method: String,
    params: Value,
}

#[derive(Deserialize, Debug)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize, Debug)]
struct RpcError {
    code: i32,
    message: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = run_command(args).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run_command(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let client = Client::new();

    let (method, params) = match &args.command {
        Commands::GetConnectionCount => ("getconnectioncount", json!([])),
        Commands::Ping => ("ping", json!([])),
        Commands::GetPeerInfo => ("getpeerinfo", json!([])),
        Commands::AddNode { node, command } => ("addnode", json!([node, command])),
        Commands::GetAddedNodeInfo { dns, node } => match node {
            Some(node) => ("getaddednodeinfo", json!([dns, node])),
            None => ("getaddednodeinfo", json!([dns])),
        },
        Commands::GetNetTotals => ("getnettotals", json!([])),
        Commands::GetNetworkInfo => ("getnetworkinfo", json!([])),
        Commands::SendAlert {
            message,
            private_key,
            min_ver,
            max_ver,
            sub_versions,
            priority,
            id,
            relay_days,
            expire_days,
            cancel_up_to,
        } => (
            "sendalert",
            json!([
                message,
                private_key,
                min_ver,
                max_ver,
                sub_versions,
                priority,
                id,
                relay_days,
                expire_days,
                cancel_up_to
            ]),
        ),
    };

    let request = RpcRequest {
        jsonrpc: "2.0".to_string(),
        id: "nodenet-cli".to_string(),
        method: method.to_string(),
        params,
    };

    let response = client.post(&args.rpc_url).json(&request).send().await?;

    if !response.status().is_success() {
        return Err(format!("HTTP error: {}", response.status()).into());
    }

    let rpc_response: RpcResponse = response.json().await?;

    if let Some(error) = rpc_response.error {
        return Err(format!("RPC error {}: {}", error.code, error.message).into());
    }

    match rpc_response.result {
        Some(Value::Null) | None => {}
        Some(result) if args.compact => println!("{}", serde_json::to_string(&result)?),
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
    }

    Ok(())
}
