//! Outbound replication: turning settled simulation state into packets.
//!
//! Tick stages never touch the network; they queue notifications in the
//! [`Outbox`]. After the simulation settles this module drains the queue,
//! streams live bullets, and emits decimated player snapshots, all through
//! the [`PacketSink`] trait so the rules can be exercised against a
//! recording double in tests.

use crate::game::{OutEvent, Outbox, World};
use log::debug;
use shared::{ConnectionHandle, Packet, PlayerEventKind};

/// Where outbound packets go. The live implementation queues datagrams on
/// the sender task; tests record them. Every method reports whether the
/// packet was accepted for delivery.
pub trait PacketSink {
    fn send_to(&mut self, target: ConnectionHandle, packet: &Packet) -> bool;
    fn broadcast(&mut self, packet: &Packet) -> bool;
    fn broadcast_except(&mut self, skip: ConnectionHandle, packet: &Packet) -> bool;
}

/// Tick counter gating the player snapshot cadence. Snapshots leave at
/// `client_update_rate`, a whole fraction of the tick rate; everything
/// else in the replication stream goes out every tick.
#[derive(Debug)]
pub struct Decimator {
    interval: u64,
    counter: u64,
}

impl Decimator {
    pub fn new(tick_rate: u32, client_update_rate: u32) -> Self {
        let interval = (tick_rate / client_update_rate.max(1)).max(1);
        Decimator {
            interval: u64::from(interval),
            counter: 0,
        }
    }

    /// Advances one tick and reports whether snapshots are due on it.
    pub fn tick(&mut self) -> bool {
        self.counter = (self.counter + 1) % self.interval;
        self.counter == 0
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }
}

/// Drains the outbox and sends each notification exactly once.
/// Ammunition deltas are private to the owning client; every other
/// notification is broadcast.
pub fn flush_events(outbox: &mut Outbox, sink: &mut impl PacketSink) {
    for event in outbox.drain() {
        match event {
            OutEvent::Death { dead, killer } => {
                sink.broadcast(&Packet::DeathNotification { dead, killer });
            }
            OutEvent::Event {
                subject,
                kind,
                int_arg,
                float_arg,
                text_arg,
            } => {
                sink.broadcast(&Packet::PlayerEvent {
                    subject,
                    kind,
                    int_arg,
                    float_arg,
                    text_arg,
                });
            }
            OutEvent::BulletGone {
                id,
                owner,
                position,
                angle,
                size,
            } => {
                sink.broadcast(&Packet::BulletUpdate {
                    id,
                    owner,
                    position,
                    angle,
                    size,
                    delete: true,
                });
            }
            OutEvent::WpnDelta {
                owner,
                weapon,
                available,
                mag,
                unmag,
            } => {
                // The hosting process has no remote endpoint to update.
                if !owner.is_local() {
                    sink.send_to(
                        owner,
                        &Packet::WpnUpdate {
                            weapon,
                            available,
                            mag,
                            unmag,
                        },
                    );
                }
            }
            OutEvent::CurrentWpn {
                owner,
                weapon,
                state,
            } => {
                sink.broadcast(&Packet::CurrentWpnUpdate {
                    handle: owner,
                    weapon,
                    state,
                });
            }
            OutEvent::ItemState { item_id, taken } => {
                sink.broadcast(&Packet::MapItemUpdate { item_id, taken });
            }
            OutEvent::Session {
                session_ended,
                game_restarted,
            } => {
                sink.broadcast(&Packet::GameSessionState {
                    session_ended,
                    game_restarted,
                });
            }
        }
    }
}

/// Streams the position of every live bullet. Bullets move every tick
/// they exist, so there is no change detection to consult.
pub fn replicate_bullets(world: &World, sink: &mut impl PacketSink) {
    for bullet in &world.bullets {
        sink.broadcast(&Packet::BulletUpdate {
            id: bullet.id,
            owner: bullet.owner,
            position: bullet.position,
            angle: bullet.angle,
            size: bullet.size,
            delete: false,
        });
    }
}

/// Emits a full snapshot for every booted player whose replicated fields
/// changed, when the decimation turn has come. Dirty flags survive until
/// the snapshot is actually queued, so a refused send retries on the
/// next turn instead of losing the change.
pub fn replicate_players(world: &mut World, due: bool, sink: &mut impl PacketSink) {
    if !due {
        return;
    }
    for player in world.players.iter_mut() {
        if !player.booted || !player.is_dirty() {
            continue;
        }
        let packet = Packet::UserUpdate {
            handle: player.handle,
            update: player.to_update(),
        };
        if sink.broadcast(&packet) {
            player.clear_dirty();
        }
    }
}

/// Folds this tick's values into every player's change detector. Runs
/// after replication so a change stays eligible for at least one send.
pub fn commit_snapshots(world: &mut World) {
    for player in world.players.iter_mut() {
        player.commit_snapshots();
    }
}

/// One tick of outbound traffic, in stage order: queued notifications,
/// then the bullet stream, then decimated player snapshots.
pub fn replicate(world: &mut World, outbox: &mut Outbox, due: bool, sink: &mut impl PacketSink) {
    flush_events(outbox, sink);
    replicate_bullets(world, sink);
    replicate_players(world, due, sink);
}

/// Brings a newly admitted connection up to date before any ambient tick
/// traffic reaches it: setup, confirmed name, current snapshot and current
/// weapon for every booted player in directory order, the inventory
/// toggles still burning, and the map items that are off their spawn
/// state.
pub fn replay_world(world: &World, target: ConnectionHandle, sink: &mut impl PacketSink) {
    let mut replayed = 0_usize;
    for player in world.players.iter() {
        if player.handle == target || !player.booted {
            continue;
        }
        sink.send_to(
            target,
            &Packet::UserSetup {
                handle: player.handle,
                is_own: false,
                addr: player.addr.clone(),
                map_name: world.map.name.clone(),
            },
        );
        sink.send_to(
            target,
            &Packet::NameChange {
                handle: player.handle,
                name: player.name.clone(),
                current_client: false,
            },
        );
        sink.send_to(
            target,
            &Packet::UserUpdate {
                handle: player.handle,
                update: player.to_update(),
            },
        );
        let weapon = player.current_weapon();
        sink.send_to(
            target,
            &Packet::CurrentWpnUpdate {
                handle: player.handle,
                weapon: weapon.spec.name.to_string(),
                state: weapon.state(),
            },
        );
        if player.inventory_active {
            sink.send_to(
                target,
                &Packet::PlayerEvent {
                    subject: player.handle,
                    kind: PlayerEventKind::InventoryToggle,
                    int_arg: Some(1),
                    float_arg: None,
                    text_arg: None,
                },
            );
        }
        replayed += 1;
    }
    for item in &world.map.items {
        if item.taken {
            sink.send_to(
                target,
                &Packet::MapItemUpdate {
                    item_id: item.id,
                    taken: true,
                },
            );
        }
    }
    debug!("replayed {} players to {}", replayed, target);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{SimConfig, World};
    use shared::weapon::RIFLE;
    use shared::{Bullet, GameMode, GameModeConfig, Map, SpawnPolicy, Vec3};
    use std::time::{Duration, Instant};

    /// Records everything pushed through it; `fail` refuses packets the
    /// way a saturated sender queue would.
    struct RecordingSink {
        sent: Vec<(ConnectionHandle, Packet)>,
        broadcasts: Vec<Packet>,
        fail: bool,
    }

    impl RecordingSink {
        fn new() -> Self {
            RecordingSink {
                sent: Vec::new(),
                broadcasts: Vec::new(),
                fail: false,
            }
        }
    }

    impl PacketSink for RecordingSink {
        fn send_to(&mut self, target: ConnectionHandle, packet: &Packet) -> bool {
            if self.fail {
                return false;
            }
            self.sent.push((target, packet.clone()));
            true
        }

        fn broadcast(&mut self, packet: &Packet) -> bool {
            if self.fail {
                return false;
            }
            self.broadcasts.push(packet.clone());
            true
        }

        fn broadcast_except(&mut self, _skip: ConnectionHandle, packet: &Packet) -> bool {
            self.broadcast(packet)
        }
    }

    fn test_config() -> SimConfig {
        SimConfig {
            tick_rate: 30,
            physics_rate: 30,
            client_update_rate: 15,
            respawn_delay: Duration::from_secs(3),
            invulnerable: Duration::ZERO,
            spawn_policy: SpawnPolicy::Leftmost,
        }
    }

    fn world_with(names: &[&str]) -> World {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = World::new(
            Map::demo_arena(),
            GameMode::new(GameModeConfig::default(), now),
        );
        for (index, name) in names.iter().enumerate() {
            let handle = ConnectionHandle(index as u32 + 1);
            world.add_player(handle, "127.0.0.1:9000");
            assert!(world.confirm_player(handle, name, now, &cfg));
        }
        world
    }

    fn air_bullet(id: u32, x: f32) -> Bullet {
        Bullet {
            id,
            owner: ConnectionHandle(1),
            position: Vec3::new(x, 7.0, 0.0),
            angle: Vec3::new(0.0, 0.0, 0.0),
            size: RIFLE.bullet_size,
            damage: RIFLE.damage,
            speed: RIFLE.bullet_speed,
            blast: None,
        }
    }

    #[test]
    fn test_decimator_interval_and_cadence() {
        let mut half = Decimator::new(30, 15);
        assert_eq!(half.interval(), 2);
        let pattern: Vec<bool> = (0..4).map(|_| half.tick()).collect();
        assert_eq!(pattern, vec![false, true, false, true]);

        // client_update_rate at or above the tick rate means every tick.
        let mut every = Decimator::new(30, 60);
        assert_eq!(every.interval(), 1);
        assert!(every.tick());
        assert!(every.tick());
    }

    #[test]
    fn test_decimator_survives_zero_rate() {
        let mut decimator = Decimator::new(30, 0);
        assert_eq!(decimator.interval(), 1);
        assert!(decimator.tick());
    }

    #[test]
    fn test_events_flush_once() {
        let mut world = world_with(&["alpha"]);
        let mut outbox = Outbox::new();
        outbox.death(ConnectionHandle(1), ConnectionHandle(1));
        outbox.item_state(0, true);

        let mut sink = RecordingSink::new();
        replicate(&mut world, &mut outbox, false, &mut sink);
        assert!(matches!(
            sink.broadcasts[0],
            Packet::DeathNotification { .. }
        ));
        assert!(matches!(sink.broadcasts[1], Packet::MapItemUpdate { .. }));

        let mut again = RecordingSink::new();
        replicate(&mut world, &mut outbox, false, &mut again);
        assert!(again.broadcasts.is_empty());
    }

    #[test]
    fn test_wpn_delta_targets_owner_only() {
        let world = world_with(&["alpha", "beta"]);
        let mut outbox = Outbox::new();
        let weapon = world
            .players
            .get(ConnectionHandle(2))
            .unwrap()
            .current_weapon()
            .clone();
        outbox.wpn_delta(ConnectionHandle(2), &weapon);

        let mut sink = RecordingSink::new();
        flush_events(&mut outbox, &mut sink);

        assert!(sink.broadcasts.is_empty());
        assert_eq!(sink.sent.len(), 1);
        assert_eq!(sink.sent[0].0, ConnectionHandle(2));
        assert!(matches!(sink.sent[0].1, Packet::WpnUpdate { .. }));
    }

    #[test]
    fn test_wpn_delta_for_host_goes_nowhere() {
        let mut outbox = Outbox::new();
        let weapon = world_with(&["alpha"])
            .players
            .get(ConnectionHandle(1))
            .unwrap()
            .current_weapon()
            .clone();
        outbox.wpn_delta(ConnectionHandle::LOCAL, &weapon);

        let mut sink = RecordingSink::new();
        flush_events(&mut outbox, &mut sink);
        assert!(sink.sent.is_empty());
        assert!(sink.broadcasts.is_empty());
    }

    #[test]
    fn test_bullets_stream_every_tick() {
        let mut world = world_with(&["alpha"]);
        world.bullets.push(air_bullet(0, 5.0));
        world.bullets.push(air_bullet(1, 6.0));

        let mut sink = RecordingSink::new();
        replicate_bullets(&world, &mut sink);
        assert_eq!(sink.broadcasts.len(), 2);
        for packet in &sink.broadcasts {
            assert!(matches!(packet, Packet::BulletUpdate { delete: false, .. }));
        }
    }

    #[test]
    fn test_snapshots_wait_for_decimation_turn() {
        let mut world = world_with(&["alpha"]);
        {
            let player = world.players.get_mut(ConnectionHandle(1)).unwrap();
            player.commit_snapshots();
            player.clear_dirty();
            player.set_x(9.0);
            player.commit_snapshots();
            assert!(player.is_dirty());
        }

        let mut sink = RecordingSink::new();
        replicate_players(&mut world, false, &mut sink);
        assert!(sink.broadcasts.is_empty());
        assert!(world.players.get(ConnectionHandle(1)).unwrap().is_dirty());

        replicate_players(&mut world, true, &mut sink);
        assert_eq!(sink.broadcasts.len(), 1);
        assert!(!world.players.get(ConnectionHandle(1)).unwrap().is_dirty());
    }

    #[test]
    fn test_dirty_survives_refused_send() {
        let mut world = world_with(&["alpha"]);
        {
            let player = world.players.get_mut(ConnectionHandle(1)).unwrap();
            player.set_x(9.0);
            player.commit_snapshots();
        }

        let mut sink = RecordingSink::new();
        sink.fail = true;
        replicate_players(&mut world, true, &mut sink);
        assert!(world.players.get(ConnectionHandle(1)).unwrap().is_dirty());

        sink.fail = false;
        replicate_players(&mut world, true, &mut sink);
        assert!(!world.players.get(ConnectionHandle(1)).unwrap().is_dirty());
    }

    #[test]
    fn test_clean_players_are_not_sent() {
        let mut world = world_with(&["alpha", "beta"]);
        for player in world.players.iter_mut() {
            player.commit_snapshots();
            player.clear_dirty();
        }

        let mut sink = RecordingSink::new();
        replicate_players(&mut world, true, &mut sink);
        assert!(sink.broadcasts.is_empty());
    }

    #[test]
    fn test_join_replay_in_directory_order() {
        let mut world = world_with(&["alpha", "beta", "gamma"]);
        world
            .players
            .get_mut(ConnectionHandle(2))
            .unwrap()
            .inventory_active = true;

        let newcomer = ConnectionHandle(9);
        world.add_player(newcomer, "127.0.0.1:9100");

        let mut sink = RecordingSink::new();
        replay_world(&world, newcomer, &mut sink);

        // Unbooted newcomer itself is absent from its own replay.
        let setups: Vec<ConnectionHandle> = sink
            .sent
            .iter()
            .filter_map(|(_, packet)| match packet {
                Packet::UserSetup { handle, .. } => Some(*handle),
                _ => None,
            })
            .collect();
        assert_eq!(
            setups,
            vec![ConnectionHandle(1), ConnectionHandle(2), ConnectionHandle(3)]
        );

        let updates = sink
            .sent
            .iter()
            .filter(|(_, packet)| matches!(packet, Packet::UserUpdate { .. }))
            .count();
        let weapons = sink
            .sent
            .iter()
            .filter(|(_, packet)| matches!(packet, Packet::CurrentWpnUpdate { .. }))
            .count();
        let names = sink
            .sent
            .iter()
            .filter(|(_, packet)| matches!(packet, Packet::NameChange { .. }))
            .count();
        let toggles = sink
            .sent
            .iter()
            .filter(|(_, packet)| {
                matches!(
                    packet,
                    Packet::PlayerEvent {
                        kind: PlayerEventKind::InventoryToggle,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(updates, 3);
        assert_eq!(weapons, 3);
        assert_eq!(names, 3);
        assert_eq!(toggles, 1);

        // Everything is addressed to the newcomer, nothing broadcast.
        assert!(sink.sent.iter().all(|(target, _)| *target == newcomer));
        assert!(sink.broadcasts.is_empty());
    }

    #[test]
    fn test_join_replay_includes_taken_items() {
        let mut world = world_with(&["alpha"]);
        let now = Instant::now();
        world.map.items[0].take(now);
        let taken_id = world.map.items[0].id;

        let mut sink = RecordingSink::new();
        replay_world(&world, ConnectionHandle(9), &mut sink);

        let item_lines: Vec<u16> = sink
            .sent
            .iter()
            .filter_map(|(_, packet)| match packet {
                Packet::MapItemUpdate { item_id, taken: true } => Some(*item_id),
                _ => None,
            })
            .collect();
        assert_eq!(item_lines, vec![taken_id]);
    }

    #[test]
    fn test_replicate_orders_events_before_bullets() {
        let mut world = world_with(&["alpha"]);
        world.bullets.push(air_bullet(0, 5.0));
        let mut outbox = Outbox::new();
        outbox.session(true, false);

        let mut sink = RecordingSink::new();
        replicate(&mut world, &mut outbox, false, &mut sink);

        assert!(matches!(sink.broadcasts[0], Packet::GameSessionState { .. }));
        assert!(matches!(sink.broadcasts[1], Packet::BulletUpdate { .. }));
    }
}
