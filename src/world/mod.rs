//! Entity storage and core value types.
//!
//! This module owns the data layout for entities, avatars and the entity
//! table, plus the world-bounds clamp every position mutation goes through.
//! It is free of networking and rendering concerns.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::ops::{Add, Mul, Sub};

// ---------------------------------------------------------------------------
// Type aliases
// ---------------------------------------------------------------------------

/// Map from entity IDs to their data.
pub type EntityMap = FxHashMap<EntityId, Entity>;

/// Session-wide avatar cache keyed by avatar name.
pub type AvatarMap = FxHashMap<String, Avatar>;

// ---------------------------------------------------------------------------
// Core value types
// ---------------------------------------------------------------------------

/// Server-assigned identifier, unique within the entity table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for EntityId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point (or offset) in world space. Fractional values are kept as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f32 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Clamp a position into `[0, world_size]` on both axes.
pub fn clamp_to_world(pos: Vec2, world_size: f32) -> Vec2 {
    let max = world_size.max(0.0);
    Vec2::new(pos.x.clamp(0.0, max), pos.y.clamp(0.0, max))
}

/// Cardinal display direction of an entity.
///
/// West has no frames of its own: it is drawn by mirroring east.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[serde(alias = "up")]
    North,
    #[default]
    #[serde(alias = "down")]
    South,
    #[serde(alias = "right")]
    East,
    #[serde(alias = "left")]
    West,
}

impl Facing {
    /// Facing for a movement vector, picked by its dominant axis.
    ///
    /// Ties go to the vertical axis.
    pub fn from_delta(delta: Vec2) -> Self {
        if delta.x.abs() > delta.y.abs() {
            if delta.x > 0.0 { Self::East } else { Self::West }
        } else if delta.y > 0.0 {
            Self::South
        } else {
            Self::North
        }
    }

    /// The facing whose frames are drawn, and whether they are mirrored.
    pub const fn canonical(self) -> (Self, bool) {
        match self {
            Self::West => (Self::East, true),
            other => (other, false),
        }
    }
}

/// Direction of a movement intent sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
    Left,
    Right,
}

impl MoveDirection {
    /// When several directions are held, the first one here wins.
    pub const PRIORITY: [Self; 4] = [Self::Up, Self::Down, Self::Left, Self::Right];
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A player or NPC as seen by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    #[serde(default)]
    pub id: EntityId,
    #[serde(rename = "username", default)]
    pub name: String,
    #[serde(flatten)]
    pub position: Vec2,
    #[serde(default)]
    pub facing: Facing,
    #[serde(rename = "animationFrame", default)]
    pub anim_phase: f32,
    #[serde(default)]
    pub avatar: String,
}

impl Entity {
    /// Index of the animation frame to draw. Negative phases count as 0.
    pub fn frame_index(&self) -> usize {
        frame_index(self.anim_phase)
    }
}

/// Truncate an animation phase to a frame index.
pub fn frame_index(phase: f32) -> usize {
    phase.max(0.0) as usize
}

/// Partial entity update; absent fields leave the current value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPatch {
    #[serde(rename = "username", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
    #[serde(rename = "animationFrame", default, skip_serializing_if = "Option::is_none")]
    pub anim_phase: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl EntityPatch {
    /// Overwrite the fields present in the patch, then clamp the position.
    pub fn apply_to(&self, entity: &mut Entity, world_size: f32) {
        if let Some(name) = &self.name {
            entity.name.clone_from(name);
        }
        if let Some(x) = self.x {
            entity.position.x = x;
        }
        if let Some(y) = self.y {
            entity.position.y = y;
        }
        if let Some(facing) = self.facing {
            entity.facing = facing;
        }
        if let Some(phase) = self.anim_phase {
            entity.anim_phase = phase;
        }
        if let Some(avatar) = &self.avatar {
            entity.avatar.clone_from(avatar);
        }
        entity.position = clamp_to_world(entity.position, world_size);
    }
}

// ---------------------------------------------------------------------------
// Avatars
// ---------------------------------------------------------------------------

/// A named, per-direction set of encoded sprite frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Avatar {
    pub name: String,
    #[serde(default)]
    pub frames: FxHashMap<Facing, Vec<String>>,
}

impl Avatar {
    /// Encoded frames for `facing`. West is never stored separately.
    pub fn frames_for(&self, facing: Facing) -> &[String] {
        let (canonical, _) = facing.canonical();
        self.frames.get(&canonical).map_or(&[], Vec::as_slice)
    }

    /// Every stored frame with its facing and index, west excluded.
    pub fn encoded_frames(&self) -> impl Iterator<Item = (Facing, usize, &str)> + '_ {
        [Facing::North, Facing::South, Facing::East]
            .into_iter()
            .flat_map(move |facing| {
                self.frames_for(facing)
                    .iter()
                    .enumerate()
                    .map(move |(index, payload)| (facing, index, payload.as_str()))
            })
    }

    /// Number of walk frames, taken from the south-facing set.
    pub fn walk_frame_count(&self) -> usize {
        self.frames_for(Facing::South).len().max(1)
    }
}

// ---------------------------------------------------------------------------
// Entity table
// ---------------------------------------------------------------------------

/// The server-owned players known to this client.
///
/// Every mutation keeps positions inside `[0, world_size]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityTable {
    entities: EntityMap,
}

impl EntityTable {
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Entities sorted by ID so drawing order is stable between frames.
    pub fn sorted(&self) -> Vec<&Entity> {
        let mut all: Vec<&Entity> = self.entities.values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Replace the whole table with a server snapshot.
    pub fn replace(&mut self, snapshot: EntityMap, world_size: f32) {
        self.entities.clear();
        #[expect(clippy::iter_over_hash_type, reason = "rebuilding a map; order not significant")]
        for (id, entity) in snapshot {
            self.upsert(id, entity, world_size);
        }
    }

    /// Insert or overwrite one entity. The map key wins over the body's `id`.
    pub fn upsert(&mut self, id: EntityId, mut entity: Entity, world_size: f32) {
        entity.id = id.clone();
        entity.position = clamp_to_world(entity.position, world_size);
        self.entities.insert(id, entity);
    }

    /// Merge a partial update. Returns `false` for unknown IDs.
    pub fn merge(&mut self, id: &str, patch: &EntityPatch, world_size: f32) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                patch.apply_to(entity, world_size);
                true
            }
            None => false,
        }
    }

    /// Remove one entity; absent IDs are a no-op.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
