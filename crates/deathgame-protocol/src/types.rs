//! Wire types for the Death Game server.
//!
//! Everything in this module travels over the socket. The browser client
//! speaks in named events (`createRoom`, `roundResults`, ...) with a JSON
//! payload, so every frame is an adjacently tagged object:
//!
//! ```text
//! { "event": "submitNumber", "data": { "roomCode": "K7QXPA", "number": 42 } }
//! ```
//!
//! Inbound and outbound events are closed enums ([`ClientEvent`],
//! [`ServerEvent`]). An event name the server does not know fails to decode
//! instead of being silently dropped by a string-keyed dispatcher.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifies a player inside one room.
///
/// Ids are handed out in join order starting at 1 and are only unique
/// within their room. Serialized as a plain number, and as a string key
/// when used in the `numbers` map of [`RoundResults`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// The short code players type to find a room.
///
/// Codes are compared after trimming and upper-casing, so `" k7qxpa"`
/// and `"K7QXPA"` name the same room. The normalization also runs when a
/// code is deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String")]
pub struct RoomCode(String);

impl RoomCode {
    /// Builds a code from user input.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_ascii_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for RoomCode {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Payloads shared by several events
// ---------------------------------------------------------------------------

/// A player as the client renders it in the roster table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub points: i32,
    pub is_alive: bool,
}

/// A short reference to a player (round winner, eliminated players).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: PlayerId,
    pub name: String,
}

/// Sent when a round opens for submissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundInfo {
    /// 1-based round number.
    pub round: u32,
    /// Seconds until the round closes on its own.
    pub time_limit: u64,
}

/// The outcome of one round, as broadcast to the room.
///
/// `average` and `target` are full precision; the client rounds them for
/// display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundResults {
    pub round: u32,
    pub average: f64,
    pub target: f64,
    /// Numbers voided by the four-player duplicate rule, ascending.
    pub duplicates: Vec<u8>,
    pub winner: Option<PlayerRef>,
    /// What each submitting player chose, keyed by player id.
    pub numbers: BTreeMap<PlayerId, u8>,
    /// Players eliminated by this round, in join order.
    pub eliminations: Vec<PlayerRef>,
    /// `true` when the three-player exact match doubled the penalty.
    pub exact_match: bool,
}

/// Sent once when the game ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverInfo {
    /// The last player standing, or `None` when the final round
    /// eliminated everyone who was left.
    pub winner: Option<PlayerRef>,
    pub final_scores: Vec<PlayerView>,
}

// ---------------------------------------------------------------------------
// Errors on the wire
// ---------------------------------------------------------------------------

/// Stable machine-readable reason attached to an `error` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidName,
    InvalidNumber,
    RoomFull,
    GameAlreadyStarted,
    NotEnoughPlayers,
    RoomNotFound,
    PlayerNotFound,
    AlreadySubmitted,
    PlayerNotAlive,
    GameOver,
    RoundNotActive,
    NotRoomCreator,
    AlreadyInRoom,
    /// The frame could not be decoded into a known event.
    BadRequest,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Payload of the `error` event. Only ever sent to the connection whose
/// request was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: ErrorCode,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Inbound events
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    pub player_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomRequest {
    pub room_code: RoomCode,
    pub player_name: String,
}

/// The `number` of a submission exactly as far as the wire goes.
///
/// Anything that is not a JSON number (`null`, a string, a missing field)
/// decodes to [`Guess::NotANumber`] so the room can reject it as
/// `InvalidNumber` instead of the whole frame failing to decode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Guess {
    Number(f64),
    #[default]
    NotANumber,
}

impl Guess {
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(n),
            Self::NotANumber => None,
        }
    }
}

impl From<f64> for Guess {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl Serialize for Guess {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::NotANumber => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Guess {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Other(IgnoredAny),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Self::Number(n),
            Raw::Other(_) => Self::NotANumber,
        })
    }
}

/// A guess for the current round.
///
/// `number` is kept loose on the wire so that `4.5`, `-3` or `null` reach
/// the room and are rejected as `InvalidNumber` rather than as an
/// undecodable frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitNumberRequest {
    pub room_code: RoomCode,
    #[serde(default)]
    pub number: Guess,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGameRequest {
    pub room_code: RoomCode,
}

/// Everything a client may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    CreateRoom(CreateRoomRequest),
    JoinRoom(JoinRoomRequest),
    SubmitNumber(SubmitNumberRequest),
    /// Room creator asks to start before the room is full.
    StartGame(StartGameRequest),
}

impl ClientEvent {
    /// The event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom(_) => "createRoom",
            Self::JoinRoom(_) => "joinRoom",
            Self::SubmitNumber(_) => "submitNumber",
            Self::StartGame(_) => "startGame",
        }
    }
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Everything the server may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Ack of `createRoom`, sent to the creator only.
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_code: RoomCode,
        player_id: PlayerId,
    },

    /// Ack of `joinRoom`, sent to the joining player only.
    #[serde(rename_all = "camelCase")]
    JoinedRoom { player_id: PlayerId },

    /// Full roster in join order. Broadcast on every join and after every
    /// round so points and elimination status stay current.
    PlayerJoined { players: Vec<PlayerView> },

    /// First round opened.
    GameStart(RoundInfo),

    /// Any later round opened.
    RoundStart(RoundInfo),

    RoundResults(RoundResults),

    GameOver(GameOverInfo),

    Error(ErrorReply),
}

impl ServerEvent {
    /// Shorthand for an `error` event.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorReply {
            code,
            message: message.into(),
        })
    }

    /// The event name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomCreated { .. } => "roomCreated",
            Self::JoinedRoom { .. } => "joinedRoom",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::GameStart(_) => "gameStart",
            Self::RoundStart(_) => "roundStart",
            Self::RoundResults(_) => "roundResults",
            Self::GameOver(_) => "gameOver",
            Self::Error(_) => "error",
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The browser client reads these shapes field by field, so the tests
    //! pin the JSON layout rather than round-tripping every type.

    use serde_json::json;

    use super::*;

    fn alice() -> PlayerView {
        PlayerView {
            id: PlayerId(1),
            name: "alice".into(),
            points: -3,
            is_alive: true,
        }
    }

    #[test]
    fn test_player_id_serializes_as_plain_number() {
        assert_eq!(serde_json::to_string(&PlayerId(4)).unwrap(), "4");
        assert_eq!(PlayerId(4).to_string(), "P-4");
    }

    #[test]
    fn test_room_code_is_normalized() {
        assert_eq!(RoomCode::new("  k7qxpa "), RoomCode::new("K7QXPA"));
        assert_eq!(RoomCode::new("k7qxpa").as_str(), "K7QXPA");
    }

    #[test]
    fn test_room_code_normalized_on_deserialize() {
        let code: RoomCode = serde_json::from_str("\"abc234\"").unwrap();
        assert_eq!(code.as_str(), "ABC234");
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"ABC234\"");
    }

    #[test]
    fn test_client_create_room_decodes_from_socket_frame() {
        let frame = json!({
            "event": "createRoom",
            "data": { "playerName": "alice" }
        });
        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        assert_eq!(
            event,
            ClientEvent::CreateRoom(CreateRoomRequest {
                player_name: "alice".into()
            })
        );
        assert_eq!(event.name(), "createRoom");
    }

    #[test]
    fn test_client_join_room_decodes_camel_case_fields() {
        let frame = json!({
            "event": "joinRoom",
            "data": { "roomCode": "k7qxpa", "playerName": "bob" }
        });
        let event: ClientEvent = serde_json::from_value(frame).unwrap();
        match event {
            ClientEvent::JoinRoom(req) => {
                assert_eq!(req.room_code.as_str(), "K7QXPA");
                assert_eq!(req.player_name, "bob");
            }
            other => panic!("expected JoinRoom, got {other:?}"),
        }
    }

    #[test]
    fn test_client_submit_number_accepts_integer_and_fraction() {
        let whole: ClientEvent = serde_json::from_value(json!({
            "event": "submitNumber",
            "data": { "roomCode": "AAAAAA", "number": 42 }
        }))
        .unwrap();
        let fraction: ClientEvent = serde_json::from_value(json!({
            "event": "submitNumber",
            "data": { "roomCode": "AAAAAA", "number": 4.5 }
        }))
        .unwrap();

        assert!(matches!(whole, ClientEvent::SubmitNumber(ref r) if r.number == Guess::Number(42.0)));
        assert!(matches!(fraction, ClientEvent::SubmitNumber(ref r) if r.number == Guess::Number(4.5)));
    }

    #[test]
    fn test_client_submit_number_tolerates_non_numbers() {
        for number in [json!(null), json!("42"), json!([42]), json!({ "n": 42 })] {
            let event: ClientEvent = serde_json::from_value(json!({
                "event": "submitNumber",
                "data": { "roomCode": "AAAAAA", "number": number }
            }))
            .unwrap();
            match event {
                ClientEvent::SubmitNumber(req) => assert_eq!(req.number, Guess::NotANumber),
                other => panic!("expected SubmitNumber, got {other:?}"),
            }
        }

        let missing: ClientEvent = serde_json::from_value(json!({
            "event": "submitNumber",
            "data": { "roomCode": "AAAAAA" }
        }))
        .unwrap();
        assert!(matches!(missing, ClientEvent::SubmitNumber(ref r) if r.number == Guess::NotANumber));
    }

    #[test]
    fn test_unknown_client_event_is_rejected() {
        let frame = json!({ "event": "cheat", "data": {} });
        assert!(serde_json::from_value::<ClientEvent>(frame).is_err());
    }

    #[test]
    fn test_room_created_json_format() {
        let event = ServerEvent::RoomCreated {
            room_code: RoomCode::new("K7QXPA"),
            player_id: PlayerId(1),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "roomCreated",
                "data": { "roomCode": "K7QXPA", "playerId": 1 }
            })
        );
    }

    #[test]
    fn test_player_joined_uses_is_alive() {
        let event = ServerEvent::PlayerJoined {
            players: vec![alice()],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "playerJoined");
        assert_eq!(
            value["data"]["players"][0],
            json!({ "id": 1, "name": "alice", "points": -3, "isAlive": true })
        );
    }

    #[test]
    fn test_round_start_json_format() {
        let event = ServerEvent::RoundStart(RoundInfo {
            round: 3,
            time_limit: 30,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({ "event": "roundStart", "data": { "round": 3, "timeLimit": 30 } })
        );
    }

    #[test]
    fn test_round_results_numbers_keyed_by_player_id() {
        let mut numbers = BTreeMap::new();
        numbers.insert(PlayerId(1), 20);
        numbers.insert(PlayerId(2), 30);
        let event = ServerEvent::RoundResults(RoundResults {
            round: 1,
            average: 25.0,
            target: 20.0,
            duplicates: vec![],
            winner: Some(PlayerRef {
                id: PlayerId(1),
                name: "alice".into(),
            }),
            numbers,
            eliminations: vec![],
            exact_match: false,
        });
        let value = serde_json::to_value(&event).unwrap();
        let data = &value["data"];

        assert_eq!(data["numbers"], json!({ "1": 20, "2": 30 }));
        assert_eq!(data["winner"]["name"], "alice");
        assert_eq!(data["exactMatch"], false);
        assert!(data["eliminations"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_game_over_without_winner_is_null() {
        let event = ServerEvent::GameOver(GameOverInfo {
            winner: None,
            final_scores: vec![alice()],
        });
        let value = serde_json::to_value(&event).unwrap();
        assert!(value["data"]["winner"].is_null());
        assert_eq!(value["data"]["finalScores"][0]["points"], -3);
    }

    #[test]
    fn test_error_event_json_format() {
        let event = ServerEvent::error(ErrorCode::RoomFull, "room K7QXPA is full");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "error",
                "data": { "code": "RoomFull", "message": "room K7QXPA is full" }
            })
        );
    }

    #[test]
    fn test_server_event_names_match_wire_tags() {
        let events = [
            ServerEvent::JoinedRoom {
                player_id: PlayerId(2),
            },
            ServerEvent::GameStart(RoundInfo {
                round: 1,
                time_limit: 30,
            }),
            ServerEvent::error(ErrorCode::GameOver, "over"),
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }
}
