//! WebSocket session actor.
//!
//! Each session registers exactly one channel for its user in the
//! `ConnectionRegistry` and forwards everything that arrives on that channel
//! into the socket. Inbound frames are parsed into `ClientEvent` at the
//! boundary and queued to a per-session worker that applies them strictly in
//! arrival order; malformed frames are logged and dropped without closing
//! the session.

use crate::signaling::SignalingRouter;
use crate::state::AppState;
use crate::websocket::message_types::ClientEvent;
use crate::websocket::{ConnectionId, ConnectionRegistry};
use actix::prelude::*;
use actix_web::{get, web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub user_id: Uuid,
}

/// A serialized server event bound for this session's socket.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Outbound(pub String);

pub struct WsSession {
    user_id: Uuid,
    connection_id: ConnectionId,
    registry: ConnectionRegistry,
    signaling: SignalingRouter,
    events: UnboundedSender<ClientEvent>,
    heartbeat_interval: Duration,
    client_timeout: Duration,
    last_pong: Instant,
}

impl WsSession {
    #[allow(clippy::too_many_arguments)]
    fn new(
        user_id: Uuid,
        connection_id: ConnectionId,
        registry: ConnectionRegistry,
        signaling: SignalingRouter,
        events: UnboundedSender<ClientEvent>,
        heartbeat_interval: Duration,
        client_timeout: Duration,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            registry,
            signaling,
            events,
            heartbeat_interval,
            client_timeout,
            last_pong: Instant::now(),
        }
    }

    /// Ping on an interval and stop the session when the client has been
    /// silent past the timeout. Stopping triggers the same cleanup path as a
    /// clean close, so abandoned sessions also get swept out of their rooms.
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let timeout = self.client_timeout;
        ctx.run_interval(self.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.last_pong) > timeout {
                tracing::info!(user_id = %act.user_id, "heartbeat timeout, closing session");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn dispatch(&self, event: ClientEvent) {
        if self.events.send(event).is_err() {
            tracing::warn!(user_id = %self.user_id, "event worker gone, dropping event");
        }
    }
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "websocket session started");
        self.hb(ctx);
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(user_id = %self.user_id, "websocket session stopped");
        let registry = self.registry.clone();
        let signaling = self.signaling.clone();
        let user_id = self.user_id;
        let connection_id = self.connection_id;
        tokio::spawn(async move {
            cleanup_session(&registry, &signaling, user_id, connection_id).await;
        });
    }
}

impl Handler<Outbound> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        ctx.text(msg.0);
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(bytes)) => {
                self.last_pong = Instant::now();
                ctx.pong(&bytes);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_pong = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => self.dispatch(event),
                Err(err) => {
                    tracing::warn!(user_id = %self.user_id, %err, "dropping malformed event");
                }
            },
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!(user_id = %self.user_id, "dropping unsupported binary frame");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => {}
            Err(err) => {
                tracing::warn!(user_id = %self.user_id, %err, "websocket protocol error");
                ctx.stop();
            }
        }
    }
}

/// Release the session's registration and, only when this session still
/// owned it, sweep the user out of its rooms. A superseded session stopping
/// late must not tear down membership the live session rebuilt.
pub async fn cleanup_session(
    registry: &ConnectionRegistry,
    signaling: &SignalingRouter,
    user_id: Uuid,
    connection_id: ConnectionId,
) {
    if registry.unregister(user_id, connection_id).await {
        signaling.disconnect(user_id).await;
    } else {
        tracing::debug!(%user_id, "superseded session stopped, keeping room membership");
    }
}

/// Apply one session's inbound events strictly in arrival order. A single
/// task per session owns this loop, so a rapid leave/rejoin from one
/// connection can never resolve out of order. Ends when the session drops
/// its sender.
pub async fn run_session_events(
    signaling: SignalingRouter,
    user_id: Uuid,
    mut events: UnboundedReceiver<ClientEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::JoinMeeting { meeting_id } => {
                signaling.join(&meeting_id, user_id).await;
            }
            ClientEvent::Offer { meeting_id, offer } => {
                signaling.offer(&meeting_id, user_id, offer).await;
            }
            ClientEvent::Answer { meeting_id, answer } => {
                signaling.answer(&meeting_id, user_id, answer).await;
            }
            ClientEvent::IceCandidate {
                meeting_id,
                candidate,
            } => {
                signaling.ice_candidate(&meeting_id, user_id, candidate).await;
            }
            ClientEvent::LeaveMeeting { meeting_id } => {
                signaling.leave(&meeting_id, user_id).await;
            }
        }
    }
}

/// Upgrade to a WebSocket session for `user_id`.
///
/// Registration happens before the upgrade completes, so a reconnect always
/// supersedes the previous channel instead of racing it.
#[get("/ws")]
pub async fn ws_handler(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<AppState>,
    params: web::Query<WsParams>,
) -> Result<HttpResponse, Error> {
    let user_id = params.user_id;
    let (connection_id, mut rx) = state.registry.register(user_id).await;

    let (event_tx, event_rx) = unbounded_channel();
    tokio::spawn(run_session_events(
        state.signaling.clone(),
        user_id,
        event_rx,
    ));

    let session = WsSession::new(
        user_id,
        connection_id,
        state.registry.clone(),
        state.signaling.clone(),
        event_tx,
        Duration::from_secs(state.config.ws_heartbeat_secs),
        Duration::from_secs(state.config.ws_client_timeout_secs),
    );

    let (addr, response) = ws::WsResponseBuilder::new(session, &req, stream).start_with_addr()?;

    // Pump registry traffic into the actor mailbox. The task ends when the
    // registry drops this channel's sender, either on unregister or when a
    // reconnect supersedes it.
    tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            addr.do_send(Outbound(payload));
        }
    });

    Ok(response)
}
