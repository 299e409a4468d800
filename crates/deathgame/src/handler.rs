//! Per-connection handler: decodes client events, calls the rooms, and
//! relays what the rooms broadcast.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The task waits on two things at once:
//!
//!   1. frames from the socket, decoded into [`ClientEvent`]s and turned
//!      into registry or room calls
//!   2. [`ServerEvent`]s the player's room pushed into the connection's
//!      outbound channel
//!
//! Acks (`roomCreated`, `joinedRoom`) and `error` replies go straight to
//! the socket from step 1, so an ack always precedes the roster broadcast
//! that the same join queued.

use std::sync::Arc;

use deathgame_protocol::{
    ClientEvent, Codec, CreateRoomRequest, ErrorCode, JoinRoomRequest, PlayerId, RoomCode,
    ServerEvent, StartGameRequest, SubmitNumberRequest,
};
use deathgame_room::{GameError, PlayerSender, RoomHandle};
use deathgame_transport::{Connection, ConnectionId, WebSocketConnection};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::server::ServerState;
use crate::DeathGameError;

/// The seat a connection holds.
#[derive(Debug, Clone)]
struct Membership {
    room: RoomHandle,
    player_id: PlayerId,
}

/// Drop guard that tells the room its player left when the handler exits.
///
/// Runs even if the handler returns early with an error. `Drop` is
/// synchronous, so the detach is a fire-and-forget task.
#[derive(Default)]
struct MembershipGuard {
    membership: Option<Membership>,
}

impl MembershipGuard {
    /// The current seat, unless its room has stopped since.
    fn active(&self) -> Option<&Membership> {
        self.membership.as_ref().filter(|m| !m.room.is_closed())
    }

    fn set(&mut self, room: RoomHandle, player_id: PlayerId) {
        self.membership = Some(Membership { room, player_id });
    }
}

impl Drop for MembershipGuard {
    fn drop(&mut self) {
        let Some(Membership { room, player_id }) = self.membership.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move { room.detach(player_id).await });
        }
    }
}

/// Per-connection state threaded through the event handlers.
struct Session<'a, C: Codec> {
    conn_id: ConnectionId,
    state: &'a ServerState<C>,
    outbound: PlayerSender,
    guard: MembershipGuard,
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), DeathGameError> {
    let conn_id = conn.id();
    debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (outbound, mut inbox) = mpsc::unbounded_channel();
    let mut session = Session {
        conn_id,
        state: &state,
        outbound,
        guard: MembershipGuard::default(),
    };

    loop {
        tokio::select! {
            received = tokio::time::timeout(state.idle_timeout, conn.recv()) => {
                let data = match received {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Ok(Err(e)) => {
                        debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                    Err(_) => {
                        info!(%conn_id, "connection idle, closing");
                        break;
                    }
                };
                session.handle_frame(&conn, &data).await?;
            }
            Some(event) = inbox.recv() => {
                send_event(&conn, &state.codec, &event).await?;
            }
        }
    }

    let _ = conn.close().await;
    // session.guard drops here → detach fires.
    Ok(())
}

impl<C: Codec> Session<'_, C> {
    async fn handle_frame(
        &mut self,
        conn: &WebSocketConnection,
        data: &[u8],
    ) -> Result<(), DeathGameError> {
        let event: ClientEvent = match self.state.codec.decode(data) {
            Ok(event) => event,
            Err(e) => {
                debug!(conn_id = %self.conn_id, error = %e, "failed to decode event");
                let reply = ServerEvent::error(ErrorCode::BadRequest, format!("malformed event: {e}"));
                return send_event(conn, &self.state.codec, &reply).await;
            }
        };
        debug!(conn_id = %self.conn_id, event = event.name(), "event received");

        let outcome = match event {
            ClientEvent::CreateRoom(req) => self.create_room(req).await.map(Some),
            ClientEvent::JoinRoom(req) => self.join_room(req).await.map(Some),
            ClientEvent::SubmitNumber(req) => self.submit_number(req).await.map(|()| None),
            ClientEvent::StartGame(req) => self.start_game(req).await.map(|()| None),
        };

        let reply = match outcome {
            Ok(Some(ack)) => ack,
            Ok(None) => return Ok(()),
            Err(e) => {
                debug!(conn_id = %self.conn_id, error = %e, "request rejected");
                ServerEvent::error(e.code(), e.to_string())
            }
        };
        send_event(conn, &self.state.codec, &reply).await
    }

    fn ensure_not_seated(&self) -> Result<(), GameError> {
        match self.guard.active() {
            Some(m) => Err(GameError::AlreadyInRoom(m.room.code().clone())),
            None => Ok(()),
        }
    }

    async fn create_room(&mut self, req: CreateRoomRequest) -> Result<ServerEvent, GameError> {
        self.ensure_not_seated()?;
        let (room, player_id) = self
            .state
            .registry
            .create_room(&req.player_name, self.outbound.clone())
            .await?;
        let room_code = room.code().clone();
        info!(conn_id = %self.conn_id, room = %room_code, player = %player_id, "created room");
        self.guard.set(room, player_id);
        Ok(ServerEvent::RoomCreated {
            room_code,
            player_id,
        })
    }

    async fn join_room(&mut self, req: JoinRoomRequest) -> Result<ServerEvent, GameError> {
        self.ensure_not_seated()?;
        let (room, player_id) = self
            .state
            .registry
            .join_room(&req.room_code, &req.player_name, self.outbound.clone())
            .await?;
        info!(conn_id = %self.conn_id, room = %room.code(), player = %player_id, "joined room");
        self.guard.set(room, player_id);
        Ok(ServerEvent::JoinedRoom { player_id })
    }

    async fn submit_number(&self, req: SubmitNumberRequest) -> Result<(), GameError> {
        let seat = self.seat_in(&req.room_code).await?;
        seat.room.submit(seat.player_id, req.number).await
    }

    async fn start_game(&self, req: StartGameRequest) -> Result<(), GameError> {
        let seat = self.seat_in(&req.room_code).await?;
        seat.room.start(seat.player_id).await
    }

    /// The connection's seat in the room named by `code`.
    ///
    /// An unknown code is `RoomNotFound`; a room the connection does not
    /// play in is `NotInRoom`.
    async fn seat_in(&self, code: &RoomCode) -> Result<&Membership, GameError> {
        if let Some(seat) = self.guard.membership.as_ref() {
            if seat.room.code() == code {
                return Ok(seat);
            }
        }
        self.state.registry.get_room(code).await?;
        Err(GameError::NotInRoom(code.clone()))
    }
}

/// Encodes one event and writes it to the socket.
async fn send_event<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    event: &ServerEvent,
) -> Result<(), DeathGameError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}
