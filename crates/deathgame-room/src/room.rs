//! Room actor: one Tokio task per room, owning its [`RoomSession`].
//!
//! Everything that changes a room arrives as a [`RoomCommand`] on the
//! actor's channel or as a wake-up from its [`PhaseTimer`], and is handled
//! to completion before the next one. There is no lock around the session.

use std::collections::HashMap;
use std::ops::ControlFlow;

use deathgame_protocol::{Guess, PlayerId, PlayerView, RoomCode, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::{RoomConfig, RoomPhase};
use crate::error::GameError;
use crate::session::{Outbound, RoomSession};
use crate::timer::{PhaseTimer, Wake};

/// Channel the room uses to push events to one player's connection.
pub type PlayerSender = mpsc::UnboundedSender<ServerEvent>;

/// Requests the outside world can make of a room. Most carry a reply
/// channel the caller awaits.
pub(crate) enum RoomCommand {
    Join {
        name: String,
        sender: PlayerSender,
        reply: oneshot::Sender<Result<PlayerId, GameError>>,
    },

    /// Early start requested by a player.
    Start {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), GameError>>,
    },

    Submit {
        player_id: PlayerId,
        number: Guess,
        reply: oneshot::Sender<Result<(), GameError>>,
    },

    /// The player's connection went away.
    Detach { player_id: PlayerId },

    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },

    Shutdown,
}

/// A snapshot of a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: RoomPhase,
    /// 0 before the game starts.
    pub round: u32,
    pub players: Vec<PlayerView>,
    /// Players whose connection is still open.
    pub connected: usize,
}

/// Handle to a running room actor.
///
/// Cheap to clone. Once the actor has stopped every call fails with
/// [`GameError::RoomNotFound`].
#[derive(Debug, Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn gone(&self) -> GameError {
        GameError::RoomNotFound(self.code.clone())
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, GameError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| self.gone())?;
        reply_rx.await.map_err(|_| self.gone())
    }

    /// Seats a player. Events for them start flowing into `sender`
    /// right away, beginning with the roster.
    pub async fn join(
        &self,
        name: impl Into<String>,
        sender: PlayerSender,
    ) -> Result<PlayerId, GameError> {
        let name = name.into();
        self.request(|reply| RoomCommand::Join {
            name,
            sender,
            reply,
        })
        .await?
    }

    /// Starts the game ahead of the room filling up. Only the room's
    /// creator may do this.
    pub async fn start(&self, player_id: PlayerId) -> Result<(), GameError> {
        self.request(|reply| RoomCommand::Start { player_id, reply })
            .await?
    }

    /// Submits a guess for the open round.
    pub async fn submit(
        &self,
        player_id: PlayerId,
        number: impl Into<Guess>,
    ) -> Result<(), GameError> {
        let number = number.into();
        self.request(|reply| RoomCommand::Submit {
            player_id,
            number,
            reply,
        })
        .await?
    }

    /// Tells the room a player's connection closed. Fire-and-forget.
    pub async fn detach(&self, player_id: PlayerId) {
        if self
            .sender
            .send(RoomCommand::Detach { player_id })
            .await
            .is_err()
        {
            debug!(room = %self.code, player = %player_id, "detach after room stopped");
        }
    }

    pub async fn info(&self) -> Result<RoomInfo, GameError> {
        self.request(|reply| RoomCommand::GetInfo { reply }).await
    }

    /// Stops the room. Connections stay open but no longer hear from it.
    pub async fn shutdown(&self) -> Result<(), GameError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.gone())
    }
}

struct RoomActor {
    session: RoomSession,
    connections: HashMap<PlayerId, PlayerSender>,
    timer: PhaseTimer,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        info!(room = %self.session.code(), "room opened");

        loop {
            let flow = tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => ControlFlow::Break(()),
                },
                wake = self.timer.wait() => self.handle_wake(wake),
            };
            if flow.is_break() {
                break;
            }
        }

        info!(
            room = %self.session.code(),
            phase = %self.session.phase(),
            round = self.session.round_number(),
            "room disposed"
        );
    }

    fn handle_command(&mut self, cmd: RoomCommand) -> ControlFlow<()> {
        match cmd {
            RoomCommand::Join {
                name,
                sender,
                reply,
            } => {
                let result = self.handle_join(&name, sender);
                let _ = reply.send(result);
            }
            RoomCommand::Start { player_id, reply } => {
                let result = self
                    .session
                    .start(Some(player_id), Instant::now())
                    .map(|out| self.advance(out));
                let _ = reply.send(result);
            }
            RoomCommand::Submit {
                player_id,
                number,
                reply,
            } => match self.session.submit(player_id, number) {
                Ok(round_complete) => {
                    let _ = reply.send(Ok(()));
                    if round_complete {
                        let out = self.session.close_round();
                        self.advance(out);
                    }
                }
                Err(e) => {
                    debug!(room = %self.session.code(), player = %player_id, error = %e, "submission rejected");
                    let _ = reply.send(Err(e));
                }
            },
            RoomCommand::Detach { player_id } => return self.handle_detach(player_id),
            RoomCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            RoomCommand::Shutdown => {
                info!(room = %self.session.code(), "room shutting down");
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_join(&mut self, name: &str, sender: PlayerSender) -> Result<PlayerId, GameError> {
        let (player_id, out) = self.session.add_player(name)?;
        self.connections.insert(player_id, sender);
        self.dispatch(out);

        if self.session.is_full() {
            match self.session.start(None, Instant::now()) {
                Ok(out) => self.advance(out),
                Err(e) => debug!(room = %self.session.code(), error = %e, "auto-start skipped"),
            }
        }
        Ok(player_id)
    }

    fn handle_detach(&mut self, player_id: PlayerId) -> ControlFlow<()> {
        if self.connections.remove(&player_id).is_none() {
            return ControlFlow::Continue(());
        }
        let live = self.live_connections();
        info!(room = %self.session.code(), player = %player_id, remaining = live, "player disconnected");

        let out = self.session.remove_waiting_player(player_id);
        self.dispatch(out);

        if live == 0 {
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }

    fn handle_wake(&mut self, wake: Wake) -> ControlFlow<()> {
        let phase = self.session.phase();
        let current = self.session.round_number();
        match wake {
            Wake::RoundDeadline { round } if phase == RoomPhase::Playing && round == current => {
                debug!(room = %self.session.code(), round, "round deadline reached");
                let out = self.session.close_round();
                self.advance(out);
            }
            Wake::NextRound { round } if phase == RoomPhase::Results && round == current => {
                let out = self.session.begin_next_round(Instant::now());
                self.advance(out);
            }
            Wake::Dispose => return ControlFlow::Break(()),
            stale => {
                debug!(room = %self.session.code(), ?stale, %phase, "ignoring stale wake-up");
            }
        }
        ControlFlow::Continue(())
    }

    /// Delivers the events of a phase change and arms the timer for the
    /// phase the room is now in.
    fn advance(&mut self, out: Outbound) {
        self.dispatch(out);

        let round = self.session.round_number();
        let config = self.session.config();
        match self.session.phase() {
            RoomPhase::Waiting => self.timer.disarm(),
            RoomPhase::Playing => match self.session.current_round() {
                Some(state) => self
                    .timer
                    .arm_at(state.deadline(), Wake::RoundDeadline { round }),
                None => self.timer.disarm(),
            },
            RoomPhase::Results => {
                let delay = config.results_delay;
                self.timer.arm_after(delay, Wake::NextRound { round });
            }
            RoomPhase::GameOver => {
                let grace = config.game_over_grace;
                self.timer.arm_after(grace, Wake::Dispose);
            }
        }
    }

    /// Broadcasts to every seated player whose connection is still around.
    fn dispatch(&self, out: Outbound) {
        for event in out {
            for sender in self.connections.values() {
                let _ = sender.send(event.clone());
            }
        }
    }

    fn live_connections(&self) -> usize {
        self.connections.values().filter(|s| !s.is_closed()).count()
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            code: self.session.code().clone(),
            phase: self.session.phase(),
            round: self.session.round_number(),
            players: self.session.roster(),
            connected: self.live_connections(),
        }
    }
}

/// Spawns a room actor and returns a handle to it.
pub(crate) fn spawn_room(code: RoomCode, config: RoomConfig) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size);

    let actor = RoomActor {
        session: RoomSession::new(code.clone(), config),
        connections: HashMap::new(),
        timer: PhaseTimer::new(),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
