//! One play session, without any window attached.
//!
//! The eframe shell feeds this input events and a clock; everything it needs
//! to paint is read back through accessors.

use crate::config::ClientConfig;
use crate::input::{self, MovementController, TradeNotice};
use crate::net::{ConnectionState, Link, Transport};
use crate::npc::{NPC_TICK, Npc, NpcSimulator, TRADE_RADIUS};
use crate::reconcile::{self, Effect, WorldState};
use crate::timer::FixedTimer;
use crate::viewport::Viewport;
use crate::world::Avatar;

use egui::Key;
use std::time::Instant;

pub struct Session {
    world: WorldState,
    link: Link,
    movement: MovementController,
    npcs: NpcSimulator,
    npc_timer: FixedTimer,
    npc_count: usize,
    trade: Option<TradeNotice>,
}

impl Session {
    pub fn new(
        config: &ClientConfig,
        transport: Box<dyn Transport>,
        npcs: NpcSimulator,
    ) -> Self {
        Self {
            world: WorldState::new(config.world_size, Viewport::new(0.0, 0.0)),
            link: Link::new(transport, config.username.clone()),
            movement: MovementController::default(),
            npcs,
            npc_timer: FixedTimer::new(NPC_TICK),
            npc_count: config.npc_count,
            trade: None,
        }
    }

    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn npcs(&self) -> &[Npc] {
        self.npcs.npcs()
    }

    pub const fn connection(&self) -> &ConnectionState {
        self.link.state()
    }

    // -- network -----------------------------------------------------------

    /// Apply everything the server sent since the last call.
    ///
    /// Returns the avatars whose frames should start decoding.
    pub fn poll_network(&mut self) -> Vec<Avatar> {
        let mut loads = Vec::new();
        for event in self.link.poll() {
            for effect in reconcile::apply(&mut self.world, event) {
                match effect {
                    Effect::LoadAvatar(avatar) => loads.push(avatar),
                    Effect::JoinRejected { reason } => {
                        log::warn!("staying disconnected from the world: {reason}");
                    }
                    Effect::Joined { .. } | Effect::Recentered => {}
                }
            }
        }
        if self.link.state().is_closed() {
            self.movement.shut_down();
        }
        loads
    }

    // -- input -------------------------------------------------------------

    pub fn key_down(&mut self, key: Key, now: Instant) {
        if key == input::TRADE_KEY {
            if let Some(notice) = input::trade_with(self.nearby_npc(), now) {
                log::debug!("{}", notice.text);
                self.trade = Some(notice);
            }
            return;
        }
        self.movement.key_down(key, now);
    }

    pub fn key_up(&mut self, key: Key) {
        if let Some(msg) = self.movement.key_up(key) {
            self.link.send(&msg);
        }
    }

    pub fn focus_lost(&mut self) {
        if let Some(msg) = self.movement.release_all() {
            self.link.send(&msg);
        }
    }

    /// The drawing area changed size.
    pub fn resize(&mut self, width: f32, height: f32) {
        let viewport = self.world.viewport;
        if viewport.width == width && viewport.height == height {
            return;
        }
        self.world.resize(width, height);
    }

    // -- timers ------------------------------------------------------------

    /// Fire every timer due by `now`.
    pub fn fire_timers(&mut self, now: Instant) {
        if let Some(msg) = self.movement.poll(now) {
            self.link.send(&msg);
        }
        for _ in 0..self.npc_timer.fire(now) {
            self.npcs.tick(NPC_TICK);
        }
        if self.trade.as_ref().is_some_and(|t| t.active_text(now).is_none()) {
            self.trade = None;
        }
    }

    /// Spawn villagers once `avatar_ready` reports the local player's avatar
    /// has something to draw.
    pub fn spawn_npcs_when_ready(
        &mut self,
        avatar_ready: impl Fn(&str) -> bool,
        now: Instant,
    ) {
        if self.npcs.is_spawned() {
            return;
        }
        let Some(avatar) = self.world.local_player().map(|p| p.avatar.clone()) else {
            return;
        };
        if !avatar_ready(&avatar) {
            return;
        }
        let frame_count = self
            .world
            .avatars
            .get(&avatar)
            .map_or(1, Avatar::walk_frame_count);
        self.npcs.spawn(self.npc_count, &avatar, frame_count);
        self.npc_timer.start(now);
    }

    /// Earliest instant something needs to happen without user input.
    pub fn next_due(&self) -> Option<Instant> {
        [
            self.movement.next_due(),
            self.npc_timer.next_due(),
            self.trade.as_ref().map(|t| t.expires_at),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    // -- queries -----------------------------------------------------------

    /// The villager close enough to trade with, if any.
    pub fn nearby_npc(&self) -> Option<&Npc> {
        let player = self.world.local_player()?;
        self.npcs.nearest_within(player.position, TRADE_RADIUS)
    }

    pub fn trade_text(&self, now: Instant) -> Option<&str> {
        self.trade.as_ref()?.active_text(now)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{MOVE_SEND_INTERVAL, TRADE_MESSAGE_DURATION};
    use crate::net::{MockPeer, NetEvent, mock_transport_pair};
    use crate::protocol::{self, ClientMessage};
    use crate::world::{MoveDirection, Vec2};

    use std::time::Duration;

    const JOIN: &str = r#"{"action":"join_game","success":true,"playerId":"p1",
        "players":{"p1":{"id":"p1","username":"ada","x":1000,"y":1000,"facing":"south","animationFrame":0,"avatar":"knight"}},
        "avatars":{"knight":{"name":"knight","frames":{"south":["AAAA","BBBB","CCCC"],"east":["DDDD"]}}}}"#;

    fn session() -> (Session, MockPeer) {
        let (transport, peer) = mock_transport_pair();
        let config = ClientConfig {
            npc_count: 3,
            ..ClientConfig::default()
        };
        let npcs = NpcSimulator::seeded(config.world_size, 5);
        let mut session = Session::new(&config, Box::new(transport), npcs);
        session.resize(800.0, 600.0);
        (session, peer)
    }

    fn push(peer: &MockPeer, json: &str) {
        let event = protocol::decode(json).expect("test payload should decode");
        peer.tx.send(NetEvent::Message(event)).expect("send");
    }

    fn sent(peer: &mut MockPeer) -> Vec<ClientMessage> {
        std::iter::from_fn(|| peer.rx.try_recv().ok()).collect()
    }

    fn joined() -> (Session, MockPeer) {
        let (mut session, mut peer) = session();
        peer.tx.send(NetEvent::Opened).expect("send");
        push(&peer, JOIN);
        let loads = session.poll_network();
        assert_eq!(loads.len(), 1);
        assert_eq!(
            sent(&mut peer),
            vec![ClientMessage::JoinGame {
                username: "wanderer".into()
            }]
        );
        (session, peer)
    }

    // -- end to end --------------------------------------------------------

    #[test]
    fn join_then_move_follows_local_player() {
        let (mut session, peer) = joined();
        assert_eq!(session.world().viewport.origin, Vec2::new(600.0, 700.0));

        push(&peer, r#"{"action":"players_moved","players":{"p1":{"x":1005}}}"#);
        assert!(session.poll_network().is_empty());
        assert_eq!(session.world().viewport.origin, Vec2::new(605.0, 700.0));
    }

    #[test]
    fn held_key_streams_moves_then_stop() {
        let (mut session, mut peer) = joined();
        let t0 = Instant::now();

        session.key_down(Key::ArrowRight, t0);
        session.fire_timers(t0 + MOVE_SEND_INTERVAL);
        session.fire_timers(t0 + MOVE_SEND_INTERVAL * 2);
        session.key_up(Key::ArrowRight);

        let right = ClientMessage::Move {
            direction: MoveDirection::Right,
        };
        assert_eq!(sent(&mut peer), vec![right.clone(), right, ClientMessage::Stop]);
    }

    #[test]
    fn closing_the_connection_silences_input() {
        let (mut session, mut peer) = joined();
        let t0 = Instant::now();
        session.key_down(Key::W, t0);

        peer.tx
            .send(NetEvent::Closed {
                reason: "bye".into(),
            })
            .expect("send");
        session.poll_network();
        assert!(session.connection().is_closed());

        session.fire_timers(t0 + Duration::from_secs(1));
        session.key_up(Key::W);
        session.key_down(Key::S, t0 + Duration::from_secs(2));
        assert!(sent(&mut peer).is_empty());
        assert_eq!(session.next_due(), None);
    }

    #[test]
    fn focus_loss_sends_stop() {
        let (mut session, mut peer) = joined();
        session.key_down(Key::A, Instant::now());
        session.focus_lost();
        assert_eq!(sent(&mut peer), vec![ClientMessage::Stop]);
    }

    // -- villagers ---------------------------------------------------------

    #[test]
    fn villagers_wait_for_the_local_avatar() {
        let (mut session, _peer) = joined();
        let t0 = Instant::now();

        session.spawn_npcs_when_ready(|_| false, t0);
        assert!(session.npcs().is_empty());

        session.spawn_npcs_when_ready(|avatar| avatar == "knight", t0);
        assert_eq!(session.npcs().len(), 3);
        assert!(session.npcs().iter().all(|npc| npc.entity.avatar == "knight"));
        assert!(session.npcs().iter().all(|npc| npc.frame_count == 3));

        // Only once.
        session.spawn_npcs_when_ready(|_| true, t0);
        assert_eq!(session.npcs().len(), 3);
        assert_eq!(session.next_due(), Some(t0 + NPC_TICK));
    }

    #[test]
    fn villagers_move_on_their_own_clock() {
        let (mut session, _peer) = joined();
        let t0 = Instant::now();
        session.spawn_npcs_when_ready(|_| true, t0);
        for npc in session.npcs.npcs_mut() {
            npc.retarget_interval = 0.0;
        }
        let before: Vec<Vec2> = session.npcs().iter().map(Npc::position).collect();

        session.fire_timers(t0 + NPC_TICK * 3);
        let after: Vec<Vec2> = session.npcs().iter().map(Npc::position).collect();
        assert_ne!(before, after);
    }

    #[test]
    fn no_villagers_before_join() {
        let (mut session, _peer) = session();
        session.spawn_npcs_when_ready(|_| true, Instant::now());
        assert!(session.npcs().is_empty());
    }

    // -- trading -----------------------------------------------------------

    #[test]
    fn trade_key_needs_a_neighbour() {
        let (mut session, mut peer) = joined();
        let t0 = Instant::now();

        session.key_down(input::TRADE_KEY, t0);
        assert_eq!(session.trade_text(t0), None);

        session.spawn_npcs_when_ready(|_| true, t0);
        let here = session.world().local_player().expect("joined").position;
        if let Some(npc) = session.npcs.npcs_mut().first_mut() {
            npc.entity.position = here + Vec2::new(10.0, 0.0);
        }
        assert!(session.nearby_npc().is_some());

        session.key_down(input::TRADE_KEY, t0);
        assert!(session.trade_text(t0).is_some());
        assert!(sent(&mut peer).is_empty(), "trading is local only");

        session.fire_timers(t0 + TRADE_MESSAGE_DURATION);
        assert_eq!(session.trade_text(t0 + TRADE_MESSAGE_DURATION), None);
    }
}
