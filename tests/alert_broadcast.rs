//! End-to-end alert broadcast: construct, sign, accept, flood to peers and
//! read back on the receiving side.

use ed25519_dalek::SigningKey;
use nodenetd::alert::broadcaster::{AlertBroadcaster, AlertRequest, RelayOutcome};
use nodenetd::alert::codec::{decode_signed, encode_signed, Alert};
use nodenetd::alert::matcher::applies_to;
use nodenetd::alert::signing::Ed25519Signer;
use nodenetd::alert::store::{AlertAcceptor, AlertStore};
use nodenetd::error::AlertError;
use nodenetd::network::message::NetworkMessage;
use nodenetd::network::peer_connection::{ChannelSender, ConnectionDirection};
use nodenetd::network::peer_connection_registry::PeerConnectionRegistry;
use nodenetd::time_sync::{Clock, NetworkClock};
use std::sync::Arc;
use tokio::sync::mpsc;

const AUTHORITY_SECRET: [u8; 32] = [21u8; 32];

struct Node {
    registry: Arc<PeerConnectionRegistry>,
    store: Arc<AlertStore>,
    broadcaster: AlertBroadcaster,
}

fn node() -> Node {
    let registry = Arc::new(PeerConnectionRegistry::new());
    let clock: Arc<dyn Clock> = Arc::new(NetworkClock::new());
    let authority = SigningKey::from_bytes(&AUTHORITY_SECRET)
        .verifying_key()
        .to_bytes()
        .to_vec();
    let store = Arc::new(AlertStore::new(authority, Arc::new(Ed25519Signer), clock.clone()));
    let broadcaster = AlertBroadcaster::new(
        registry.clone(),
        store.clone(),
        Arc::new(Ed25519Signer),
        clock,
        70010,
    );
    Node {
        registry,
        store,
        broadcaster,
    }
}

fn connect(node: &Node, addr: &str) -> mpsc::UnboundedReceiver<NetworkMessage> {
    let (tx, rx) = mpsc::unbounded_channel();
    node.registry.register_peer(
        addr.parse().unwrap(),
        ConnectionDirection::Outbound,
        Arc::new(ChannelSender::new(tx)),
    );
    rx
}

fn signed(node: &Node, request: &AlertRequest, key: &[u8]) -> Alert {
    let unsigned = node.broadcaster.construct(request).unwrap();
    node.broadcaster.sign(unsigned, key).unwrap()
}

#[test]
fn forged_alert_is_never_relayed() {
    let node = node();
    let mut peers: Vec<_> = (1..=3)
        .map(|i| connect(&node, &format!("10.0.0.{}:9377", i)))
        .collect();

    let forged = signed(
        &node,
        &AlertRequest::new("Send coins here", 0, 99999, "", 1000, 1),
        &[99u8; 32],
    );
    assert!(matches!(
        node.broadcaster.submit_and_relay(&forged),
        RelayOutcome::Rejected(_)
    ));
    assert!(node.store.is_empty());
    for rx in &mut peers {
        assert!(rx.try_recv().is_err());
    }
}

#[test]
fn accepted_alert_reaches_every_peer() {
    let sender = node();
    let mut peers: Vec<_> = (1..=3)
        .map(|i| connect(&sender, &format!("10.0.0.{}:9377", i)))
        .collect();

    let request = AlertRequest::new("Upgrade to 1.0.1", 70000, 70010, "/node:1.0.0/", 100, 1);
    let alert = signed(&sender, &request, &AUTHORITY_SECRET);
    assert_eq!(
        sender.broadcaster.submit_and_relay(&alert),
        RelayOutcome::Accepted { relayed: 3, failed: 0 }
    );

    // Each receiver validates independently against the same authority
    for rx in &mut peers {
        let NetworkMessage::Alert(wire) = rx.try_recv().unwrap();
        let received = Alert::from_wire(wire).unwrap();
        assert_eq!(received, alert);

        let receiver = node();
        receiver.store.accept(&received).unwrap();
        assert!(applies_to(received.fields(), 70005, "node:1.0.0"));
        assert!(!applies_to(received.fields(), 70011, "node:1.0.0"));
        assert!(!applies_to(received.fields(), 70005, "node:2.0.0"));
    }

    // A second submission of the same alert is a duplicate
    assert!(matches!(
        sender.broadcaster.submit_and_relay(&alert),
        RelayOutcome::Rejected(_)
    ));
}

#[test]
fn departed_peer_does_not_block_relay() {
    let node = node();
    let mut alive = connect(&node, "10.0.0.1:9377");
    drop(connect(&node, "10.0.0.2:9377"));

    let alert = signed(
        &node,
        &AlertRequest::new("Maintenance", 0, 99999, "", 1, 2),
        &AUTHORITY_SECRET,
    );
    assert_eq!(
        node.broadcaster.submit_and_relay(&alert),
        RelayOutcome::Accepted { relayed: 1, failed: 1 }
    );
    assert!(alive.try_recv().is_ok());
}

#[test]
fn cancellation_supersedes_held_alerts() {
    let node = node();
    let key = hex::encode(AUTHORITY_SECRET);

    node.broadcaster
        .send_alert(&AlertRequest::new("first", 0, 99999, "", 1, 1), &key)
        .unwrap();
    node.broadcaster
        .send_alert(&AlertRequest::new("second", 0, 99999, "", 1, 2), &key)
        .unwrap();
    let summary = node
        .broadcaster
        .send_alert(
            &AlertRequest::new("replaces both", 0, 99999, "", 1, 3).cancel_up_to(2),
            &key,
        )
        .unwrap();
    assert_eq!(summary.cancel, Some(2));

    let ids: Vec<i32> = node.store.active().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![3]);

    // Old ids stay cancelled while the cancelling alert is held
    assert!(matches!(
        node.broadcaster
            .send_alert(&AlertRequest::new("first again", 0, 99999, "", 1, 1), &key),
        Err(AlertError::AlertRejected(_))
    ));
}

#[test]
fn wire_form_survives_transport() {
    let node = node();
    let alert = signed(
        &node,
        &AlertRequest::new("Fork ahead", 60000, 70010, "/a:1/b:2/", 50, 9)
            .relay_days(1)
            .expire_days(30),
        &AUTHORITY_SECRET,
    );

    let bytes = encode_signed(&alert).unwrap();
    let decoded = decode_signed(&bytes).unwrap();
    assert_eq!(decoded.digest(), alert.digest());
    assert_eq!(decoded.fields().sub_versions.render(), "a:1 or b:2");

    // Flipping a payload byte still decodes but breaks the signature
    let mut tampered = alert.to_wire();
    tampered.payload[0] ^= 0x01;
    let tampered = Alert::from_wire(tampered).unwrap();
    assert_eq!(tampered.fields().version, alert.fields().version ^ 0x01);
    assert!(matches!(
        node.store.accept(&tampered),
        Err(AlertError::AlertRejected(_))
    ));
}
