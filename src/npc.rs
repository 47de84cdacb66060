//! Locally simulated villagers.
//!
//! The server knows nothing about these: they wander between random targets
//! purely for visual life. Each villager is either idle at its target or
//! walking toward it, and periodically picks a new target.

use crate::world::{Entity, EntityId, Facing, Vec2, clamp_to_world};

use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng};
use std::f32::consts::TAU;
use std::ops::RangeInclusive;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Tuning
// ---------------------------------------------------------------------------

/// Simulation tick period, independent of rendering and network cadence.
pub const NPC_TICK: Duration = Duration::from_millis(50);

/// Below this distance a villager counts as arrived and snaps to its target.
pub const ARRIVAL_THRESHOLD: f32 = 2.0;

/// Targets and spawn points stay this far away from the world edge.
pub const TARGET_MARGIN: f32 = 50.0;

/// How far away a new target is picked, in world pixels.
pub const RETARGET_DISTANCE: RangeInclusive<f32> = 100.0..=300.0;

/// Seconds between target choices, drawn per villager.
pub const RETARGET_INTERVAL: RangeInclusive<f32> = 3.0..=8.0;

/// World pixels moved per tick, drawn per villager.
pub const SPEED: RangeInclusive<f32> = 0.5..=1.5;

/// Animation phase advance per tick while walking.
pub const ANIM_STEP: f32 = 0.15;

/// Distance at which a villager will offer to trade.
pub const TRADE_RADIUS: f32 = 60.0;

const NAMES: [&str; 12] = [
    "Alder", "Briony", "Cobb", "Dara", "Edric", "Fern", "Garrick", "Hazel", "Ivo", "Juniper",
    "Kestrel", "Linden",
];

// ---------------------------------------------------------------------------
// Villager
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Npc {
    pub entity: Entity,
    pub target: Vec2,
    /// Seconds since the last target choice.
    pub retarget_timer: f32,
    pub retarget_interval: f32,
    pub speed: f32,
    /// Walk frames in the avatar; the phase wraps at this.
    pub frame_count: usize,
    pub idle: bool,
}

impl Npc {
    pub fn position(&self) -> Vec2 {
        self.entity.position
    }

    /// Move one tick toward the target.
    pub fn step(&mut self, world_size: f32) {
        let delta = self.target - self.entity.position;
        let distance = delta.length();

        if distance < ARRIVAL_THRESHOLD {
            self.entity.position = self.target;
            self.entity.anim_phase = 0.0;
            self.idle = true;
            return;
        }

        // Never overshoot: the final partial step lands inside the threshold.
        let travel = self.speed.min(distance);
        let next = self.entity.position + delta * (travel / distance);
        self.entity.position = clamp_to_world(next, world_size);
        self.idle = false;

        let frames = self.frame_count.max(1) as f32;
        self.entity.anim_phase = (self.entity.anim_phase + ANIM_STEP) % frames;
    }

    fn retarget(&mut self, rng: &mut SmallRng, world_size: f32) {
        let angle = rng.random_range(0.0..TAU);
        let distance = rng.random_range(RETARGET_DISTANCE);
        let raw = self.entity.position + Vec2::new(angle.cos(), angle.sin()) * distance;

        self.target = clamp_target(raw, world_size);
        self.retarget_timer = 0.0;
        self.retarget_interval = rng.random_range(RETARGET_INTERVAL);
        self.entity.facing = Facing::from_delta(self.target - self.entity.position);
    }
}

/// Clamp a target into `[margin, world_size - margin]`. Worlds too small for
/// the margin put every target in the middle.
pub fn clamp_target(target: Vec2, world_size: f32) -> Vec2 {
    let lo = TARGET_MARGIN.min(world_size / 2.0);
    let hi = (world_size - TARGET_MARGIN).max(lo);
    Vec2::new(target.x.clamp(lo, hi), target.y.clamp(lo, hi))
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

/// Owns the villager population and the RNG driving it.
#[derive(Debug)]
pub struct NpcSimulator {
    npcs: Vec<Npc>,
    rng: SmallRng,
    world_size: f32,
    spawned: bool,
}

impl NpcSimulator {
    pub fn new(world_size: f32) -> Self {
        Self::with_rng(world_size, SmallRng::from_os_rng())
    }

    /// Reproducible population, for tests.
    pub fn seeded(world_size: f32, seed: u64) -> Self {
        Self::with_rng(world_size, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(world_size: f32, rng: SmallRng) -> Self {
        Self {
            npcs: Vec::new(),
            rng,
            world_size,
            spawned: false,
        }
    }

    pub fn npcs(&self) -> &[Npc] {
        &self.npcs
    }

    pub fn npcs_mut(&mut self) -> &mut [Npc] {
        &mut self.npcs
    }

    pub const fn is_spawned(&self) -> bool {
        self.spawned
    }

    /// Create the population once. Later calls are ignored.
    pub fn spawn(&mut self, count: usize, avatar: &str, frame_count: usize) {
        if self.spawned {
            return;
        }
        self.spawned = true;
        let world_size = self.world_size;
        for i in 0..count {
            let position = clamp_target(
                Vec2::new(
                    self.rng.random_range(0.0..=world_size),
                    self.rng.random_range(0.0..=world_size),
                ),
                world_size,
            );
            let name = NAMES.get(i % NAMES.len()).copied().unwrap_or("Villager");
            self.npcs.push(Npc {
                entity: Entity {
                    id: EntityId(format!("npc-{i}")),
                    name: name.to_owned(),
                    position,
                    facing: Facing::South,
                    anim_phase: 0.0,
                    avatar: avatar.to_owned(),
                },
                target: position,
                retarget_timer: 0.0,
                retarget_interval: self.rng.random_range(RETARGET_INTERVAL),
                speed: self.rng.random_range(SPEED),
                frame_count: frame_count.max(1),
                idle: true,
            });
        }
        log::info!("spawned {count} villagers using avatar {avatar:?}");
    }

    /// Advance every villager by one tick of `dt`.
    pub fn tick(&mut self, dt: Duration) {
        let dt = dt.as_secs_f32();
        for npc in &mut self.npcs {
            npc.retarget_timer += dt;
            if npc.retarget_timer >= npc.retarget_interval {
                npc.retarget(&mut self.rng, self.world_size);
            }
            npc.step(self.world_size);
        }
    }

    /// The closest villager within `radius` of `from`; the first found wins ties.
    pub fn nearest_within(&self, from: Vec2, radius: f32) -> Option<&Npc> {
        let mut best: Option<(&Npc, f32)> = None;
        for npc in &self.npcs {
            let distance = from.distance(npc.position());
            if distance > radius {
                continue;
            }
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((npc, distance));
            }
        }
        best.map(|(npc, _)| npc)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const WORLD: f32 = 2000.0;

    fn spawned(seed: u64, count: usize) -> NpcSimulator {
        let mut sim = NpcSimulator::seeded(WORLD, seed);
        sim.spawn(count, "knight", 4);
        sim
    }

    // -- movement ----------------------------------------------------------

    #[test]
    fn arrival_snaps_exactly_and_goes_idle() {
        let mut sim = spawned(1, 1);
        let npc = sim.npcs_mut().first_mut().expect("one villager");
        npc.entity.position = Vec2::new(500.0, 500.0);
        npc.target = Vec2::new(501.2, 500.7);
        npc.entity.anim_phase = 2.5;
        npc.idle = false;
        npc.retarget_timer = 0.0;
        npc.retarget_interval = 100.0;

        sim.tick(NPC_TICK);

        let npc = sim.npcs().first().expect("one villager");
        assert_eq!(npc.position(), Vec2::new(501.2, 500.7));
        assert!(npc.idle);
        assert_eq!(npc.entity.anim_phase, 0.0);
    }

    #[test]
    fn walking_moves_by_speed_and_animates() {
        let mut sim = spawned(2, 1);
        let npc = sim.npcs_mut().first_mut().expect("one villager");
        npc.entity.position = Vec2::new(100.0, 100.0);
        npc.target = Vec2::new(200.0, 100.0);
        npc.speed = 1.0;
        npc.retarget_interval = 100.0;
        npc.entity.anim_phase = 3.9;

        sim.tick(NPC_TICK);

        let npc = sim.npcs().first().expect("one villager");
        assert!((npc.position().x - 101.0).abs() < 1e-4);
        assert!((npc.position().y - 100.0).abs() < 1e-4);
        assert!(!npc.idle);
        // 3.9 + 0.15 wraps past 4 frames
        assert!((npc.entity.anim_phase - 0.05).abs() < 1e-4);
    }

    #[test]
    fn trajectories_are_continuous() {
        let mut sim = spawned(3, 6);
        for _ in 0..2_000 {
            let before: Vec<Vec2> = sim.npcs().iter().map(Npc::position).collect();
            sim.tick(NPC_TICK);
            for (npc, prev) in sim.npcs().iter().zip(before) {
                let jump = prev.distance(npc.position());
                assert!(
                    jump <= npc.speed.max(ARRIVAL_THRESHOLD) + 1e-3,
                    "villager jumped {jump}"
                );
            }
        }
    }

    // -- retargeting -------------------------------------------------------

    #[test]
    fn retarget_fires_when_interval_elapses() {
        let mut sim = spawned(4, 1);
        let npc = sim.npcs_mut().first_mut().expect("one villager");
        npc.retarget_interval = 0.0;
        let old_target = npc.target;

        sim.tick(NPC_TICK);

        let npc = sim.npcs().first().expect("one villager");
        assert_ne!(npc.target, old_target);
        assert!(npc.retarget_timer.abs() < f32::EPSILON);
        assert!(RETARGET_INTERVAL.contains(&npc.retarget_interval));
    }

    #[test]
    fn targets_stay_inside_margin() {
        let mut sim = spawned(5, 12);
        for npc in sim.npcs_mut() {
            npc.retarget_interval = 0.0;
        }
        for _ in 0..500 {
            sim.tick(NPC_TICK);
            for npc in sim.npcs() {
                for axis in [npc.target.x, npc.target.y] {
                    assert!((TARGET_MARGIN..=WORLD - TARGET_MARGIN).contains(&axis));
                }
                for axis in [npc.position().x, npc.position().y] {
                    assert!((0.0..=WORLD).contains(&axis));
                }
            }
            for npc in sim.npcs_mut() {
                npc.retarget_interval = 0.0;
            }
        }
    }

    #[test]
    fn facing_points_at_new_target() {
        let mut sim = spawned(6, 8);
        for npc in sim.npcs_mut() {
            npc.retarget_interval = 0.0;
        }
        sim.tick(NPC_TICK);
        for npc in sim.npcs() {
            let expected = Facing::from_delta(npc.target - npc.position());
            // One step toward the target never flips the dominant axis sign.
            if npc.target.distance(npc.position()) > ARRIVAL_THRESHOLD {
                assert_eq!(npc.entity.facing, expected);
            }
        }
    }

    #[test]
    fn clamp_target_handles_tiny_worlds() {
        let t = clamp_target(Vec2::new(-10.0, 90.0), 60.0);
        assert_eq!(t, Vec2::new(30.0, 30.0));
    }

    // -- spawning ----------------------------------------------------------

    #[test]
    fn spawn_happens_once() {
        let mut sim = spawned(7, 5);
        sim.spawn(9, "other", 2);
        assert_eq!(sim.npcs().len(), 5);
        assert!(sim.npcs().iter().all(|n| n.entity.avatar == "knight"));
    }

    // -- proximity ---------------------------------------------------------

    #[test]
    fn nearest_within_radius_wins() {
        let mut sim = spawned(8, 3);
        let spots = [
            Vec2::new(140.0, 100.0),
            Vec2::new(120.0, 100.0),
            Vec2::new(100.0, 300.0),
        ];
        for (npc, spot) in sim.npcs_mut().iter_mut().zip(spots) {
            npc.entity.position = spot;
        }

        let nearby = sim
            .nearest_within(Vec2::new(100.0, 100.0), TRADE_RADIUS)
            .expect("someone is close");
        assert_eq!(nearby.entity.id, EntityId::from("npc-1"));

        assert!(sim.nearest_within(Vec2::new(1000.0, 1000.0), TRADE_RADIUS).is_none());
    }

    #[test]
    fn ties_go_to_first_found() {
        let mut sim = spawned(9, 2);
        for npc in sim.npcs_mut() {
            npc.entity.position = Vec2::new(110.0, 100.0);
        }
        let nearby = sim
            .nearest_within(Vec2::new(100.0, 100.0), TRADE_RADIUS)
            .expect("both in range");
        assert_eq!(nearby.entity.id, EntityId::from("npc-0"));
    }
}
