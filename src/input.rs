//! Keyboard → movement intents.
//!
//! Held keys collapse into one direction by fixed priority. While anything is
//! held a [`FixedTimer`] re-sends that direction; releasing the last key
//! stops the timer and emits a single `stop`.

use crate::npc::Npc;
use crate::protocol::ClientMessage;
use crate::timer::FixedTimer;
use crate::world::MoveDirection;

use egui::Key;
use rustc_hash::FxHashSet;
use std::time::{Duration, Instant};

/// Cadence of `move` messages while a key is held.
pub const MOVE_SEND_INTERVAL: Duration = Duration::from_millis(100);

/// Opens the (placeholder) trade dialogue with a nearby villager.
pub const TRADE_KEY: Key = Key::E;

/// How long a trade notice stays on screen.
pub const TRADE_MESSAGE_DURATION: Duration = Duration::from_secs(3);

pub fn direction_for_key(key: Key) -> Option<MoveDirection> {
    match key {
        Key::W | Key::ArrowUp => Some(MoveDirection::Up),
        Key::S | Key::ArrowDown => Some(MoveDirection::Down),
        Key::A | Key::ArrowLeft => Some(MoveDirection::Left),
        Key::D | Key::ArrowRight => Some(MoveDirection::Right),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct MovementController {
    held: FxHashSet<Key>,
    timer: FixedTimer,
    /// Last intent sent: a direction, or `None` for stopped.
    transmitted: Option<MoveDirection>,
    shut_down: bool,
}

impl Default for MovementController {
    fn default() -> Self {
        Self {
            held: FxHashSet::default(),
            timer: FixedTimer::new(MOVE_SEND_INTERVAL),
            transmitted: None,
            shut_down: false,
        }
    }
}

impl MovementController {
    pub const fn transmitted(&self) -> Option<MoveDirection> {
        self.transmitted
    }

    pub const fn is_transmitting(&self) -> bool {
        self.timer.is_running()
    }

    pub const fn next_due(&self) -> Option<Instant> {
        self.timer.next_due()
    }

    /// Highest-priority direction among the held keys.
    pub fn active_direction(&self) -> Option<MoveDirection> {
        MoveDirection::PRIORITY.into_iter().find(|dir| {
            self.held
                .iter()
                .any(|key| direction_for_key(*key) == Some(*dir))
        })
    }

    /// A key went down. Repeats of an already held key are ignored.
    pub fn key_down(&mut self, key: Key, now: Instant) {
        if self.shut_down || direction_for_key(key).is_none() || !self.held.insert(key) {
            return;
        }
        if !self.timer.is_running() {
            self.timer.start(now);
        }
    }

    /// A key went up. Returns `stop` when it was the last movement key held.
    pub fn key_up(&mut self, key: Key) -> Option<ClientMessage> {
        if !self.held.remove(&key) || !self.held.is_empty() {
            return None;
        }
        self.halt()
    }

    /// Forget every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) -> Option<ClientMessage> {
        if self.held.is_empty() {
            return None;
        }
        self.held.clear();
        self.halt()
    }

    /// The `move` due by `now`, if any. Intervals missed while the UI was
    /// stalled are dropped rather than sent back-to-back.
    pub fn poll(&mut self, now: Instant) -> Option<ClientMessage> {
        if !self.timer.fire_skipping(now) {
            return None;
        }
        let direction = self.active_direction()?;
        self.transmitted = Some(direction);
        Some(ClientMessage::Move { direction })
    }

    /// The connection is gone: never transmit again.
    pub fn shut_down(&mut self) {
        self.shut_down = true;
        self.held.clear();
        self.timer.stop();
        self.transmitted = None;
    }

    fn halt(&mut self) -> Option<ClientMessage> {
        self.timer.stop();
        self.transmitted = None;
        (!self.shut_down).then_some(ClientMessage::Stop)
    }
}

// ---------------------------------------------------------------------------
// Trading
// ---------------------------------------------------------------------------

/// A short-lived line of text about the (not yet real) trade system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeNotice {
    pub text: String,
    pub expires_at: Instant,
}

impl TradeNotice {
    pub fn active_text(&self, now: Instant) -> Option<&str> {
        (now < self.expires_at).then_some(self.text.as_str())
    }
}

/// Handle the trade key. Only does something when a villager is nearby.
pub fn trade_with(nearby: Option<&Npc>, now: Instant) -> Option<TradeNotice> {
    let npc = nearby?;
    Some(TradeNotice {
        text: format!("{} has nothing to trade yet.", npc.entity.name),
        expires_at: now + TRADE_MESSAGE_DURATION,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::npc::NpcSimulator;

    fn after(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    // -- key mapping -------------------------------------------------------

    #[test]
    fn wasd_and_arrows_map_to_directions() {
        assert_eq!(direction_for_key(Key::W), Some(MoveDirection::Up));
        assert_eq!(direction_for_key(Key::ArrowLeft), Some(MoveDirection::Left));
        assert_eq!(direction_for_key(Key::Q), None);
        assert_eq!(direction_for_key(TRADE_KEY), None);
    }

    // -- transmission ------------------------------------------------------

    #[test]
    fn holding_a_key_sends_moves_at_fixed_cadence() {
        let mut ctl = MovementController::default();
        let t0 = Instant::now();
        ctl.key_down(Key::D, t0);
        assert!(ctl.is_transmitting());

        assert_eq!(ctl.poll(after(t0, 50)), None);
        assert_eq!(
            ctl.poll(after(t0, 100)),
            Some(ClientMessage::Move {
                direction: MoveDirection::Right
            })
        );
        assert_eq!(ctl.poll(after(t0, 150)), None);
        assert!(ctl.poll(after(t0, 200)).is_some());
        assert_eq!(ctl.transmitted(), Some(MoveDirection::Right));
    }

    #[test]
    fn stall_sends_a_single_move() {
        let mut ctl = MovementController::default();
        let t0 = Instant::now();
        ctl.key_down(Key::D, t0);

        let late = after(t0, 2_000);
        assert!(ctl.poll(late).is_some());
        assert_eq!(ctl.poll(late), None);
        assert_eq!(ctl.next_due(), Some(late + MOVE_SEND_INTERVAL));
        assert!(ctl.poll(late + MOVE_SEND_INTERVAL).is_some());
    }

    #[test]
    fn up_wins_over_left() {
        let mut ctl = MovementController::default();
        let t0 = Instant::now();
        ctl.key_down(Key::A, t0);
        ctl.key_down(Key::W, t0);
        assert_eq!(ctl.active_direction(), Some(MoveDirection::Up));
        assert_eq!(
            ctl.poll(after(t0, 100)),
            Some(ClientMessage::Move {
                direction: MoveDirection::Up
            })
        );
    }

    #[test]
    fn releasing_last_key_sends_one_stop() {
        let mut ctl = MovementController::default();
        let t0 = Instant::now();
        ctl.key_down(Key::W, t0);
        ctl.key_down(Key::ArrowUp, t0);

        assert_eq!(ctl.key_up(Key::W), None, "ArrowUp still held");
        assert_eq!(ctl.key_up(Key::ArrowUp), Some(ClientMessage::Stop));
        assert!(!ctl.is_transmitting());
        assert_eq!(ctl.transmitted(), None);
        assert_eq!(ctl.poll(after(t0, 1_000)), None);

        assert_eq!(ctl.key_up(Key::ArrowUp), None, "already released");
    }

    #[test]
    fn unmapped_and_repeated_keys_are_ignored() {
        let mut ctl = MovementController::default();
        let t0 = Instant::now();
        ctl.key_down(Key::Space, t0);
        assert!(!ctl.is_transmitting());
        assert_eq!(ctl.key_up(Key::Space), None);

        ctl.key_down(Key::S, t0);
        ctl.key_down(Key::S, after(t0, 90));
        // The repeat did not restart the schedule.
        assert!(ctl.poll(after(t0, 100)).is_some());
    }

    #[test]
    fn losing_focus_releases_everything() {
        let mut ctl = MovementController::default();
        let t0 = Instant::now();
        assert_eq!(ctl.release_all(), None);
        ctl.key_down(Key::S, t0);
        ctl.key_down(Key::D, t0);
        assert_eq!(ctl.release_all(), Some(ClientMessage::Stop));
        assert!(!ctl.is_transmitting());
    }

    #[test]
    fn shut_down_controller_stays_silent() {
        let mut ctl = MovementController::default();
        let t0 = Instant::now();
        ctl.key_down(Key::W, t0);
        ctl.shut_down();

        assert_eq!(ctl.poll(after(t0, 500)), None);
        ctl.key_down(Key::W, after(t0, 600));
        assert!(!ctl.is_transmitting());
        assert_eq!(ctl.key_up(Key::W), None);
    }

    // -- trading -----------------------------------------------------------

    #[test]
    fn trade_needs_a_nearby_villager() {
        let now = Instant::now();
        assert_eq!(trade_with(None, now), None);

        let mut sim = NpcSimulator::seeded(1000.0, 11);
        sim.spawn(1, "knight", 4);
        let notice = trade_with(sim.npcs().first(), now).expect("villager present");
        assert!(notice.active_text(now).is_some());
        assert!(notice.active_text(now + TRADE_MESSAGE_DURATION).is_none());
    }
}
