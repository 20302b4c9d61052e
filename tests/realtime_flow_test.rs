//! End-to-end in-memory flows across the connection registry, the signaling
//! router and the client-side crypto helpers. No database: history storage is
//! covered by the service unit tests, these exercise the live-channel paths.

use secure_comms_service::routes::wsroute;
use secure_comms_service::services::e2ee::{
    self, BoxKeyPair, SentPlaintextCache, DECRYPT_FAILED_PLACEHOLDER,
};
use secure_comms_service::signaling::{CallRole, PeerState, RoomRegistry, SignalingRouter};
use secure_comms_service::websocket::message_types::ClientEvent;
use secure_comms_service::websocket::ConnectionRegistry;
use serde_json::{json, Value};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use uuid::Uuid;

struct LivePeer {
    id: Uuid,
    rx: UnboundedReceiver<String>,
}

impl LivePeer {
    fn next_event(&mut self) -> Option<Value> {
        self.rx
            .try_recv()
            .ok()
            .map(|s| serde_json::from_str(&s).unwrap())
    }

    fn drain(&mut self) -> Vec<Value> {
        let mut out = Vec::new();
        while let Some(evt) = self.next_event() {
            out.push(evt);
        }
        out
    }
}

async fn connect(registry: &ConnectionRegistry) -> LivePeer {
    let id = Uuid::new_v4();
    let (_conn, rx) = registry.register(id).await;
    LivePeer { id, rx }
}

fn harness() -> (SignalingRouter, ConnectionRegistry) {
    let registry = ConnectionRegistry::new();
    let router = SignalingRouter::new(RoomRegistry::new(), registry.clone());
    (router, registry)
}

#[tokio::test]
async fn full_call_handshake_between_client_and_professional() {
    let (router, registry) = harness();
    let mut client = connect(&registry).await;
    let mut professional = connect(&registry).await;
    let meeting = "case-311-consult";

    // Client opens the room, professional joins second.
    router.join(meeting, client.id).await;
    router.join(meeting, professional.id).await;

    let evt = client.next_event().unwrap();
    assert_eq!(evt["type"], "role-assigned");
    assert_eq!(evt["role"], "initiator");
    let evt = client.next_event().unwrap();
    assert_eq!(evt["type"], "user-joined");
    assert_eq!(evt["userId"], professional.id.to_string());

    let evt = professional.next_event().unwrap();
    assert_eq!(evt["type"], "role-assigned");
    assert_eq!(evt["role"], "receiver");

    assert_eq!(
        router.rooms().role_of(meeting, client.id).await,
        Some(CallRole::Initiator)
    );

    // Offer travels initiator -> receiver, answer travels back, and trickle
    // candidates cross in both directions.
    router
        .offer(meeting, client.id, json!({"type": "offer", "sdp": "v=0..."}))
        .await;
    let evt = professional.next_event().unwrap();
    assert_eq!(evt["type"], "offer");
    assert_eq!(evt["from"], client.id.to_string());

    router
        .ice_candidate(meeting, client.id, json!({"candidate": "candidate:1"}))
        .await;
    let evt = professional.next_event().unwrap();
    assert_eq!(evt["type"], "ice-candidate");

    router
        .answer(meeting, professional.id, json!({"type": "answer", "sdp": "v=0..."}))
        .await;
    let evt = client.next_event().unwrap();
    assert_eq!(evt["type"], "answer");
    assert_eq!(evt["from"], professional.id.to_string());

    assert_eq!(
        router.rooms().state_of(meeting, client.id).await,
        Some(PeerState::Connected)
    );
    assert_eq!(
        router.rooms().state_of(meeting, professional.id).await,
        Some(PeerState::Connected)
    );

    // Hang-up notifies the remaining member exactly once; its call is over.
    router.leave(meeting, client.id).await;
    let events = professional.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "user-left");
    assert_eq!(
        router.rooms().state_of(meeting, professional.id).await,
        Some(PeerState::Ended)
    );

    // Last member out destroys the room.
    router.leave(meeting, professional.id).await;
    assert!(!router.rooms().room_exists(meeting).await);
}

#[tokio::test]
async fn reconnect_takes_over_the_live_channel() {
    let (router, registry) = harness();
    let mut a = connect(&registry).await;
    let mut b = connect(&registry).await;
    router.join("m", a.id).await;
    router.join("m", b.id).await;
    a.drain();
    b.drain();

    // B reconnects: same user, fresh channel. The old receiver closes and
    // subsequent signaling lands on the new one only.
    let (_conn, new_rx) = registry.register(b.id).await;
    let mut b_new = LivePeer { id: b.id, rx: new_rx };

    router
        .ice_candidate("m", a.id, json!({"candidate": "after-reconnect"}))
        .await;

    assert!(b.next_event().is_none());
    let evt = b_new.next_event().unwrap();
    assert_eq!(evt["type"], "ice-candidate");
    assert_eq!(evt["candidate"]["candidate"], "after-reconnect");
}

#[tokio::test]
async fn abrupt_disconnect_sweeps_every_room() {
    let (router, registry) = harness();
    let mut a = connect(&registry).await;
    let mut b = connect(&registry).await;
    let mut c = connect(&registry).await;
    router.join("m1", a.id).await;
    router.join("m1", b.id).await;
    router.join("m2", a.id).await;
    router.join("m2", c.id).await;
    a.drain();
    b.drain();
    c.drain();

    // Heartbeat timeout path: the session cleanup sweeps A from both rooms.
    router.disconnect(a.id).await;

    let events = b.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "user-left");
    let events = c.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "user-left");

    // B is still a member of m1, so the room survives; m2 was emptied.
    assert!(router.rooms().room_exists("m1").await);
    assert!(!router.rooms().room_exists("m2").await);
}

#[tokio::test]
async fn superseded_session_cleanup_keeps_live_membership() {
    let (router, registry) = harness();
    let mut a = connect(&registry).await;
    let b = Uuid::new_v4();
    let (old_conn, _old_rx) = registry.register(b).await;

    router.join("m1", a.id).await;
    router.join("m1", b).await;

    // B reconnects; the live session keeps the room membership it holds.
    let (new_conn, _new_rx) = registry.register(b).await;
    a.drain();

    // The old session's heartbeat timeout fires later and runs its cleanup.
    // It no longer owns the registration, so nothing may be torn down.
    wsroute::cleanup_session(&registry, &router, b, old_conn).await;

    assert!(registry.is_online(b).await);
    assert_eq!(
        router.rooms().role_of("m1", b).await,
        Some(CallRole::Receiver)
    );
    assert!(a.next_event().is_none());

    // The live session's own stop still tears everything down.
    wsroute::cleanup_session(&registry, &router, b, new_conn).await;
    assert!(!registry.is_online(b).await);
    assert_eq!(router.rooms().role_of("m1", b).await, None);
    let events = a.drain();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "user-left");
}

#[tokio::test]
async fn inbound_events_apply_in_arrival_order() {
    let (router, registry) = harness();
    let mut a = connect(&registry).await;
    let mut b = connect(&registry).await;
    router.join("m1", a.id).await;
    router.join("m1", b.id).await;
    a.drain();
    b.drain();

    // A rapid hang-up and rejoin from one connection must resolve as
    // leave-then-join, never join-then-leave.
    let (tx, rx) = unbounded_channel();
    tx.send(ClientEvent::LeaveMeeting {
        meeting_id: "m1".into(),
    })
    .unwrap();
    tx.send(ClientEvent::JoinMeeting {
        meeting_id: "m1".into(),
    })
    .unwrap();
    drop(tx);
    wsroute::run_session_events(router.clone(), b.id, rx).await;

    assert_eq!(
        router.rooms().role_of("m1", b.id).await,
        Some(CallRole::Receiver)
    );

    let events = a.drain();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "user-left");
    assert_eq!(events[1]["type"], "user-joined");

    let events = b.drain();
    assert_eq!(events.last().unwrap()["type"], "role-assigned");
    assert_eq!(events.last().unwrap()["role"], "receiver");
}

#[tokio::test]
async fn sealed_message_round_trip_matches_relay_contract() {
    // What the client edges do around the relay: seal with the pair box key,
    // ship hex ciphertext and nonce, open on the other side with the mirror
    // derivation.
    let client = BoxKeyPair::generate();
    let professional = BoxKeyPair::generate();

    let sealed = e2ee::seal(
        "meet at the courthouse at nine",
        &professional.public_hex(),
        client.secret(),
    )
    .unwrap();

    // The relay only ever validates shape, never content.
    assert!(e2ee::validate_envelope(&sealed.ciphertext, &sealed.nonce, false).is_ok());

    let plain = e2ee::open(
        &sealed.ciphertext,
        &sealed.nonce,
        &client.public_hex(),
        professional.secret(),
    )
    .unwrap();
    assert_eq!(plain, "meet at the courthouse at nine");

    // A reader without the pair key gets the placeholder, not an error.
    let stranger = BoxKeyPair::generate();
    let text = e2ee::open_or_placeholder(
        &sealed.ciphertext,
        &sealed.nonce,
        Some(&client.public_hex()),
        stranger.secret(),
    );
    assert_eq!(text, DECRYPT_FAILED_PLACEHOLDER);
}

#[tokio::test]
async fn sender_reads_own_history_from_plaintext_cache() {
    // Box keys are directional per pair; the sender re-reads its own sent
    // messages from the local cache rather than decrypting them.
    let mut cache = SentPlaintextCache::new();
    let message_id = Uuid::new_v4();
    cache.insert(message_id, "draft of the settlement terms".into());

    assert_eq!(
        cache.get(message_id),
        Some("draft of the settlement terms")
    );
    assert_eq!(cache.get(Uuid::new_v4()), None);
}
