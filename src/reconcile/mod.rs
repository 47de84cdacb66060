//! State reconciliation: applies authoritative server events to local state.
//!
//! No `egui` or socket types live here. [`apply`] mutates [`WorldState`] in a
//! single pass and returns [`Effect`]s so the shell knows what to load.
//! Redraws need no effect: the frame that applied the event paints it.

use crate::protocol::{JoinAck, PlayerJoined, PlayerLeft, PlayersMoved, ServerEvent};
use crate::viewport::Viewport;
use crate::world::{Avatar, AvatarMap, Entity, EntityId, EntityTable};

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

/// What happened while applying an event, for the layer above.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// The local player is known; the session is live.
    Joined { player_id: EntityId },
    /// The server refused the join.
    JoinRejected { reason: String },
    /// Start decoding this avatar's frames.
    LoadAvatar(Avatar),
    /// The camera moved.
    Recentered,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything the server is authoritative for, plus the camera that follows it.
#[derive(Debug, Clone)]
pub struct WorldState {
    pub local_id: Option<EntityId>,
    pub players: EntityTable,
    pub avatars: AvatarMap,
    pub viewport: Viewport,
    pub world_size: f32,
}

impl WorldState {
    pub fn new(world_size: f32, viewport: Viewport) -> Self {
        Self {
            local_id: None,
            players: EntityTable::default(),
            avatars: AvatarMap::default(),
            viewport,
            world_size,
        }
    }

    pub fn local_player(&self) -> Option<&Entity> {
        self.local_id
            .as_ref()
            .and_then(|id| self.players.get(&id.0))
    }

    /// Recenter on the local player. Returns `false` before the join completes.
    pub fn recenter(&mut self) -> bool {
        let Some(focus) = self.local_player().map(|p| p.position) else {
            return false;
        };
        self.viewport.recenter_on(focus, self.world_size);
        true
    }

    /// The window changed size. Returns whether the camera was recentered.
    pub fn resize(&mut self, width: f32, height: f32) -> bool {
        self.viewport.resize(width, height);
        self.recenter()
    }
}

// ---------------------------------------------------------------------------
// Apply
// ---------------------------------------------------------------------------

/// Apply one inbound event. Events must be fed in arrival order.
///
/// Never waits on images: avatars to decode come back as
/// [`Effect::LoadAvatar`].
pub fn apply(state: &mut WorldState, event: ServerEvent) -> Vec<Effect> {
    match event {
        ServerEvent::JoinGame(ack) => join(state, ack),
        ServerEvent::PlayerJoined(joined) => player_joined(state, joined),
        ServerEvent::PlayersMoved(moved) => players_moved(state, &moved),
        ServerEvent::PlayerLeft(PlayerLeft { player_id }) => {
            if state.players.remove(&player_id.0).is_some() {
                log::info!("player {player_id} left");
            }
            Vec::new()
        }
        ServerEvent::Unknown => {
            log::debug!("ignoring unrecognized server event");
            Vec::new()
        }
    }
}

fn join(state: &mut WorldState, ack: JoinAck) -> Vec<Effect> {
    let player_id = match (ack.success, ack.player_id) {
        (true, Some(id)) => id,
        (true, None) => {
            log::error!("join acknowledged without a player id");
            return vec![Effect::JoinRejected {
                reason: "server sent no player id".into(),
            }];
        }
        (false, _) => {
            let reason = ack.error.unwrap_or_else(|| "unknown error".into());
            log::error!("join rejected: {reason}");
            return vec![Effect::JoinRejected { reason }];
        }
    };

    state.players.replace(ack.players, state.world_size);
    state.avatars = ack.avatars;
    state.local_id = Some(player_id.clone());
    log::info!(
        "joined as {player_id} with {} players and {} avatars",
        state.players.len(),
        state.avatars.len()
    );

    let mut avatars: Vec<&Avatar> = state.avatars.values().collect();
    avatars.sort_by(|a, b| a.name.cmp(&b.name));
    let mut effects: Vec<Effect> = avatars
        .into_iter()
        .map(|avatar| Effect::LoadAvatar(avatar.clone()))
        .collect();

    effects.push(Effect::Joined { player_id });
    if state.recenter() {
        effects.push(Effect::Recentered);
    }
    effects
}

fn player_joined(state: &mut WorldState, joined: PlayerJoined) -> Vec<Effect> {
    let PlayerJoined { player, avatar } = joined;
    if player.id.0.is_empty() {
        log::warn!("discarding player_joined without a player id");
        return Vec::new();
    }
    let mut effects = Vec::new();

    if let Some(avatar) = avatar {
        // Avatars never change once known.
        if !state.avatars.contains_key(&avatar.name) {
            effects.push(Effect::LoadAvatar(avatar.clone()));
            state.avatars.insert(avatar.name.clone(), avatar);
        }
    }

    let id = player.id.clone();
    log::info!("player {id} ({}) joined", player.name);
    let is_local = state.local_id.as_ref() == Some(&id);
    state.players.upsert(id, player, state.world_size);
    if is_local && state.recenter() {
        effects.push(Effect::Recentered);
    }
    effects
}

fn players_moved(state: &mut WorldState, moved: &PlayersMoved) -> Vec<Effect> {
    let mut local_moved = false;
    #[expect(clippy::iter_over_hash_type, reason = "each patch touches one entity; order does not matter")]
    for (id, patch) in &moved.players {
        if !state.players.merge(&id.0, patch, state.world_size) {
            log::debug!("move for unknown player {id}");
            continue;
        }
        local_moved |= state.local_id.as_ref() == Some(id);
    }

    if local_moved && state.recenter() {
        vec![Effect::Recentered]
    } else {
        Vec::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
