//! Wire protocol.
//!
//! JSON objects in UTF-8 text frames, discriminated by an `action` field.
//! Outbound messages are [`ClientMessage`]; inbound ones decode into the
//! closed [`ServerEvent`] enum, with [`ServerEvent::Unknown`] absorbing any
//! action this client does not know about.

use crate::error::Result;
use crate::world::{Avatar, AvatarMap, Entity, EntityId, EntityMap, EntityPatch, MoveDirection};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinGame { username: String },
    Move { direction: MoveDirection },
    Stop,
}

impl ClientMessage {
    /// Encode as one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`](crate::error::ClientError::Decode) if
    /// serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Reply to `join_game`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinAck {
    pub success: bool,
    #[serde(default)]
    pub player_id: Option<EntityId>,
    #[serde(default)]
    pub players: EntityMap,
    #[serde(default)]
    pub avatars: AvatarMap,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerJoined {
    pub player: Entity,
    #[serde(default)]
    pub avatar: Option<Avatar>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlayersMoved {
    #[serde(default)]
    pub players: FxHashMap<EntityId, EntityPatch>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeft {
    pub player_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerEvent {
    JoinGame(JoinAck),
    PlayerJoined(PlayerJoined),
    PlayersMoved(PlayersMoved),
    PlayerLeft(PlayerLeft),
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Short name for logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::JoinGame(_) => "join_game",
            Self::PlayerJoined(_) => "player_joined",
            Self::PlayersMoved(_) => "players_moved",
            Self::PlayerLeft(_) => "player_left",
            Self::Unknown => "unknown",
        }
    }
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Fails when the payload is not JSON, has no `action`, or a known action
/// carries fields of the wrong shape.
pub fn decode(text: &str) -> Result<ServerEvent> {
    let event: ServerEvent = serde_json::from_str(text)?;
    if event == ServerEvent::Unknown {
        log::debug!("unrecognized action in {}", preview(text));
    }
    Ok(event)
}

/// First few bytes of a payload, for log lines.
pub fn preview(text: &str) -> &str {
    const MAX: usize = 80;
    if text.len() <= MAX {
        return text;
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.get(..end).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
