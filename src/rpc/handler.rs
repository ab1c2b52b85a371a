//! Dispatch of the peer-directory and alert RPC methods.

use super::server::{RpcError, RpcRequest, RpcResponse};
use crate::alert::broadcaster::{AlertBroadcaster, AlertRequest};
use crate::error::{AlertError, DirectoryError};
use crate::network::added_peers::Connector;
use crate::peer_directory::PeerDirectoryService;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

const RPC_MISC_ERROR: i32 = -1;
const RPC_INVALID_PARAMETER: i32 = -8;
const RPC_NODE_ALREADY_ADDED: i32 = -23;
const RPC_NODE_NOT_ADDED: i32 = -24;
const RPC_METHOD_NOT_FOUND: i32 = -32601;
const RPC_INVALID_PARAMS: i32 = -32602;

pub struct RpcHandler {
    directory: Arc<PeerDirectoryService>,
    connector: Arc<dyn Connector>,
    /// Present only when the node is allowed to originate alerts
    broadcaster: Option<Arc<AlertBroadcaster>>,
}

impl RpcHandler {
    pub fn new(
        directory: Arc<PeerDirectoryService>,
        connector: Arc<dyn Connector>,
        broadcaster: Option<Arc<AlertBroadcaster>>,
    ) -> Self {
        Self {
            directory,
            connector,
            broadcaster,
        }
    }

    pub async fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        let params = match &request.params {
            Value::Array(arr) => arr.clone(),
            Value::Null => vec![],
            other => vec![other.clone()],
        };

        let result = match request.method.as_str() {
            "getconnectioncount" => Ok(json!(self.directory.connection_count())),
            "ping" => self.ping(),
            "getpeerinfo" => to_value(self.directory.get_peer_info()),
            "addnode" => self.add_node(&params),
            "getaddednodeinfo" => self.get_added_node_info(&params).await,
            "getnettotals" => to_value(self.directory.get_network_totals()),
            "getnetworkinfo" => to_value(self.directory.get_network_info()),
            "sendalert" => self.send_alert(&params),
            _ => Err(RpcError {
                code: RPC_METHOD_NOT_FOUND,
                message: format!("Method not found: {}", request.method),
            }),
        };

        match result {
            Ok(value) => RpcResponse::success(request.id, value),
            Err(error) => RpcResponse::failure(request.id, error),
        }
    }

    fn ping(&self) -> Result<Value, RpcError> {
        self.directory.ping();
        Ok(Value::Null)
    }

    /// addnode "node" "add|remove|onetry"
    fn add_node(&self, params: &[Value]) -> Result<Value, RpcError> {
        let node = str_param(params, 0, "node")?;
        let command = str_param(params, 1, "command")?;

        match command {
            "add" => self.directory.add_node(node).map_err(directory_error)?,
            "remove" => self.directory.remove_node(node).map_err(directory_error)?,
            "onetry" => self.directory.connect_once(node, self.connector.as_ref()),
            other => {
                return Err(RpcError {
                    code: RPC_INVALID_PARAMS,
                    message: format!(
                        "Unknown addnode command '{}', expected add, remove or onetry",
                        other
                    ),
                })
            }
        }
        Ok(Value::Null)
    }

    /// getaddednodeinfo dns ( "node" )
    async fn get_added_node_info(&self, params: &[Value]) -> Result<Value, RpcError> {
        let dns = params
            .first()
            .and_then(Value::as_bool)
            .ok_or_else(|| RpcError {
                code: RPC_INVALID_PARAMS,
                message: "dns parameter (true/false) required".to_string(),
            })?;
        let filter = match params.get(1) {
            None | Some(Value::Null) => None,
            Some(_) => Some(str_param(params, 1, "node")?),
        };

        let records = self
            .directory
            .get_added_node_info(dns, filter)
            .await
            .map_err(directory_error)?;
        to_value(records)
    }

    /// sendalert "message" "privatekey" minver maxver "subvers" priority id
    ///     ( relaydays expiredays cancelupto )
    fn send_alert(&self, params: &[Value]) -> Result<Value, RpcError> {
        let broadcaster = self.broadcaster.as_ref().ok_or_else(|| RpcError {
            code: RPC_METHOD_NOT_FOUND,
            message: "Method not found: sendalert".to_string(),
        })?;
        if params.len() < 7 {
            return Err(RpcError {
                code: RPC_INVALID_PARAMS,
                message: "sendalert \"message\" \"privatekey\" minver maxver \"subvers\" priority id ( relaydays expiredays cancelupto )".to_string(),
            });
        }

        let message = str_param(params, 0, "message")?;
        let key_hex = str_param(params, 1, "privatekey")?;
        let mut request = AlertRequest::new(
            message,
            i32_param(params, 2, "minver")?,
            i32_param(params, 3, "maxver")?,
            str_param(params, 4, "subvers")?,
            i32_param(params, 5, "priority")?,
            i32_param(params, 6, "id")?,
        );
        if let Some(days) = opt_i64_param(params, 7, "relaydays")? {
            request = request.relay_days(narrow(days, "relaydays")?.into());
        }
        if let Some(days) = opt_i64_param(params, 8, "expiredays")? {
            request = request.expire_days(narrow(days, "expiredays")?.into());
        }
        if let Some(cancel) = opt_i64_param(params, 9, "cancelupto")? {
            request = request.cancel_up_to(narrow(cancel, "cancelupto")?);
        }

        let summary = broadcaster.send_alert(&request, key_hex).map_err(alert_error)?;
        to_value(summary)
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError {
        code: RPC_MISC_ERROR,
        message: e.to_string(),
    })
}

fn directory_error(e: DirectoryError) -> RpcError {
    let code = match e {
        DirectoryError::AlreadyPresent(_) => RPC_NODE_ALREADY_ADDED,
        DirectoryError::NotPresent(_) => RPC_NODE_NOT_ADDED,
    };
    RpcError {
        code,
        message: e.to_string(),
    }
}

fn alert_error(e: AlertError) -> RpcError {
    let code = match e {
        AlertError::MalformedSubversionSpec(_) | AlertError::InvalidWindow(_) => {
            RPC_INVALID_PARAMETER
        }
        AlertError::SigningFailed(_) | AlertError::AlertRejected(_) | AlertError::Codec(_) => {
            RPC_MISC_ERROR
        }
    };
    RpcError {
        code,
        message: e.to_string(),
    }
}

fn str_param<'a>(params: &'a [Value], index: usize, name: &str) -> Result<&'a str, RpcError> {
    params
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError {
            code: RPC_INVALID_PARAMS,
            message: format!("{} parameter (string) required", name),
        })
}

fn i32_param(params: &[Value], index: usize, name: &str) -> Result<i32, RpcError> {
    let value = params
        .get(index)
        .and_then(Value::as_i64)
        .ok_or_else(|| RpcError {
            code: RPC_INVALID_PARAMS,
            message: format!("{} parameter (integer) required", name),
        })?;
    narrow(value, name)
}

fn opt_i64_param(params: &[Value], index: usize, name: &str) -> Result<Option<i64>, RpcError> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_i64().map(Some).ok_or_else(|| RpcError {
            code: RPC_INVALID_PARAMS,
            message: format!("{} must be an integer", name),
        }),
    }
}

fn narrow(value: i64, name: &str) -> Result<i32, RpcError> {
    i32::try_from(value).map_err(|_| RpcError {
        code: RPC_INVALID_PARAMETER,
        message: format!("{} out of range: {}", name, value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::signing::Ed25519Signer;
    use crate::alert::store::AlertStore;
    use crate::network::added_peers::AddedPeerList;
    use crate::network::peer_connection_registry::PeerConnectionRegistry;
    use crate::network::peer_scoring::MisbehaviorTracker;
    use crate::network::reachability::Reachability;
    use crate::network::resolver::DnsResolver;
    use crate::peer_directory::NodeIdentity;
    use crate::time_sync::{Clock, NetworkClock};
    use ed25519_dalek::SigningKey;
    use parking_lot::Mutex;

    const SECRET: [u8; 32] = [3u8; 32];

    #[derive(Default)]
    struct RecordingConnector(Mutex<Vec<String>>);

    impl Connector for RecordingConnector {
        fn connect_once(&self, addr: &str) {
            self.0.lock().push(addr.to_string());
        }
    }

    fn handler(allow_sendalert: bool) -> (RpcHandler, Arc<RecordingConnector>) {
        let registry = Arc::new(PeerConnectionRegistry::new());
        let clock: Arc<dyn Clock> = Arc::new(NetworkClock::new());
        let authority = SigningKey::from_bytes(&SECRET).verifying_key().to_bytes().to_vec();
        let store = Arc::new(AlertStore::new(authority, Arc::new(Ed25519Signer), clock.clone()));
        let directory = Arc::new(PeerDirectoryService::new(
            NodeIdentity {
                client_name: "nodenet".to_string(),
                client_version: 90300,
                protocol_version: 70010,
                sub_version_comments: Vec::new(),
                local_services: 1,
                relay_fee: 0.00001,
                default_port: 9377,
            },
            registry.clone(),
            Arc::new(AddedPeerList::new()),
            Arc::new(DnsResolver::new(false)),
            Arc::new(MisbehaviorTracker::default()),
            Arc::new(Reachability::new()),
            store.clone(),
            clock.clone(),
        ));
        let broadcaster = allow_sendalert.then(|| {
            Arc::new(AlertBroadcaster::new(
                registry,
                store,
                Arc::new(Ed25519Signer),
                clock,
                70010,
            ))
        });
        let connector = Arc::new(RecordingConnector::default());
        (
            RpcHandler::new(directory, connector.clone(), broadcaster),
            connector,
        )
    }

    async fn call(handler: &RpcHandler, method: &str, params: Value) -> RpcResponse {
        handler
            .handle_request(RpcRequest {
                jsonrpc: "2.0".to_string(),
                id: json!(1),
                method: method.to_string(),
                params,
            })
            .await
    }

    fn error_code(response: &RpcResponse) -> Option<i32> {
        response.error.as_ref().map(|e| e.code)
    }

    #[tokio::test]
    async fn test_addnode_lifecycle() {
        let (handler, connector) = handler(false);

        let resp = call(&handler, "addnode", json!(["10.0.0.5:9377", "add"])).await;
        assert!(resp.error.is_none());
        assert_eq!(resp.result, Some(Value::Null));

        let resp = call(&handler, "addnode", json!([" 10.0.0.5:9377 ", "add"])).await;
        assert_eq!(error_code(&resp), Some(RPC_NODE_ALREADY_ADDED));

        let resp = call(&handler, "getaddednodeinfo", json!([false])).await;
        assert_eq!(resp.result, Some(json!([{ "addednode": "10.0.0.5:9377" }])));

        let resp = call(&handler, "addnode", json!(["10.0.0.5:9377", "remove"])).await;
        assert!(resp.error.is_none());
        let resp = call(&handler, "addnode", json!(["10.0.0.5:9377", "remove"])).await;
        assert_eq!(error_code(&resp), Some(RPC_NODE_NOT_ADDED));

        call(&handler, "addnode", json!(["10.0.0.9:9377", "onetry"])).await;
        assert_eq!(connector.0.lock().as_slice(), &["10.0.0.9:9377".to_string()]);

        let resp = call(&handler, "addnode", json!(["10.0.0.9:9377", "bogus"])).await;
        assert_eq!(error_code(&resp), Some(RPC_INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_getaddednodeinfo_params() {
        let (handler, _) = handler(false);
        let resp = call(&handler, "getaddednodeinfo", json!([])).await;
        assert_eq!(error_code(&resp), Some(RPC_INVALID_PARAMS));

        let resp = call(&handler, "getaddednodeinfo", json!([true, "10.1.1.1"])).await;
        assert_eq!(error_code(&resp), Some(RPC_NODE_NOT_ADDED));

        // Name lookups are disabled here, so resolution degrades
        call(&handler, "addnode", json!(["seed.example", "add"])).await;
        let resp = call(&handler, "getaddednodeinfo", json!([true])).await;
        assert_eq!(
            resp.result,
            Some(json!([{ "addednode": "seed.example", "connected": false, "addresses": [] }]))
        );
    }

    #[tokio::test]
    async fn test_simple_queries() {
        let (handler, _) = handler(false);
        assert_eq!(
            call(&handler, "getconnectioncount", Value::Null).await.result,
            Some(json!(0))
        );
        assert_eq!(call(&handler, "ping", Value::Null).await.result, Some(Value::Null));
        assert_eq!(
            call(&handler, "getpeerinfo", Value::Null).await.result,
            Some(json!([]))
        );

        let totals = call(&handler, "getnettotals", Value::Null).await.result.unwrap();
        assert_eq!(totals["totalbytesrecv"], json!(0));
        assert!(totals["timemillis"].as_i64().unwrap() > 0);

        let info = call(&handler, "getnetworkinfo", Value::Null).await.result.unwrap();
        assert_eq!(info["subversion"], json!("/nodenet:0.9.3/"));
        assert_eq!(info["networks"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_method_and_disabled_sendalert() {
        let (handler, _) = handler(false);
        let resp = call(&handler, "makekeypair", Value::Null).await;
        assert_eq!(error_code(&resp), Some(RPC_METHOD_NOT_FOUND));
        let resp = call(
            &handler,
            "sendalert",
            json!(["msg", hex::encode(SECRET), 0, 1, "", 1, 1]),
        )
        .await;
        assert_eq!(error_code(&resp), Some(RPC_METHOD_NOT_FOUND));
    }

    #[tokio::test]
    async fn test_sendalert() {
        let (handler, _) = handler(true);

        let resp = call(
            &handler,
            "sendalert",
            json!(["Upgrade now", hex::encode(SECRET), 70000, 70010, "/nodenet:0.9.2/", 100, 5, 10, 20, 4]),
        )
        .await;
        let summary = resp.result.unwrap();
        assert_eq!(summary["alertid"], json!(5));
        assert_eq!(summary["subver"], json!("nodenet:0.9.2"));
        assert_eq!(summary["cancel"], json!(4));
        assert_eq!(summary["version"], json!(70010));

        let info = call(&handler, "getnetworkinfo", Value::Null).await.result.unwrap();
        assert_eq!(info["alerts"][0]["alertid"], json!(5));

        let resp = call(
            &handler,
            "sendalert",
            json!(["x", hex::encode(SECRET), 0, 1, "nodenet", 1, 6]),
        )
        .await;
        assert_eq!(error_code(&resp), Some(RPC_INVALID_PARAMETER));

        let resp = call(
            &handler,
            "sendalert",
            json!(["x", hex::encode([9u8; 32]), 0, 1, "", 1, 7]),
        )
        .await;
        assert_eq!(error_code(&resp), Some(RPC_MISC_ERROR));

        let resp = call(&handler, "sendalert", json!(["x"])).await;
        assert_eq!(error_code(&resp), Some(RPC_INVALID_PARAMS));
    }

    #[tokio::test]
    async fn test_sendalert_day_counts_out_of_range() {
        let (handler, _) = handler(true);
        let key = hex::encode(SECRET);

        let resp = call(
            &handler,
            "sendalert",
            json!(["x", key, 0, 1, "", 1, 8, i64::MAX / 1000]),
        )
        .await;
        assert_eq!(error_code(&resp), Some(RPC_INVALID_PARAMETER));

        let resp = call(
            &handler,
            "sendalert",
            json!(["x", key, 0, 1, "", 1, 8, 1, i64::from(i32::MIN) - 1]),
        )
        .await;
        assert_eq!(error_code(&resp), Some(RPC_INVALID_PARAMETER));

        let resp = call(
            &handler,
            "sendalert",
            json!(["x", key, 0, 1, "", 1, 8, i32::MAX, 30]),
        )
        .await;
        assert_eq!(resp.result.unwrap()["alertid"], json!(8));
    }
}
