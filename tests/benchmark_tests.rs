//! Performance benchmarks for critical game systems

use server::game::{Outbox, SimConfig, World};
use server::replication::PacketSink;
use shared::{
    Aabb, CmdState, ConnectionHandle, GameMode, GameModeConfig, Map, Packet, Player, SpawnPolicy,
    Vec3,
};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Benchmarks AABB overlap testing performance
#[test]
fn benchmark_overlap_tests() {
    let player_box = Aabb::from_center_size(Vec3::new(4.0, 2.0, 0.0), Vec3::new(0.9, 1.8, 0.6));
    let block_box = Aabb::from_center_size(Vec3::new(4.5, 1.5, 0.0), Vec3::new(1.0, 1.0, 1.0));

    let iterations = 100_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = player_box.overlaps_2d(&block_box);
    }

    let duration = start.elapsed();
    println!(
        "Overlap tests: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 100ms for 100k iterations
    assert!(duration.as_millis() < 100);
}

/// Benchmarks wall collision resolution with a full roster pushed into
/// the ground every iteration
#[test]
fn benchmark_wall_resolution() {
    use server::physics;

    let mut world = bench_world(8);
    let mut outbox = Outbox::new();

    let iterations = 5_000u32;
    let start = Instant::now();

    for step in 0..iterations {
        let depth = 1.2 + (step % 4) as f32 * 0.1;
        for player in world.players.iter_mut() {
            let x = player.position.get().x;
            player.position.set(Vec3::new(x, depth, 0.0));
        }
        physics::resolve_wall_collisions(&mut world, &mut outbox);
        outbox.drain();
    }

    let duration = start.elapsed();
    println!(
        "Wall resolution: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / f64::from(iterations)
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full simulation ticks with a populated world
#[test]
fn benchmark_simulation_tick() {
    let now = Instant::now();
    let cfg = SimConfig {
        spawn_policy: SpawnPolicy::Leftmost,
        ..SimConfig::default()
    };
    let mut world = bench_world(8);
    let mut outbox = Outbox::new();

    let iterations = 1_000u32;
    let tick = Duration::from_millis(33);
    let start = Instant::now();

    for step in 0..iterations {
        world.run_tick(now + tick * (step + 1), &cfg, &mut outbox);
        outbox.drain();
    }

    let duration = start.elapsed();
    println!(
        "Simulation: 8 players × {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / f64::from(iterations)
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks network packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    use bincode::{deserialize, serialize};

    let mut source = Player::new(ConnectionHandle(3), "bench");
    source.spawn_at(Vec3::new(4.0, 2.0, 0.0));
    let packet = Packet::UserUpdate {
        handle: ConnectionHandle(3),
        update: source.to_update(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Stress tests command buffering across many connections
#[test]
fn stress_test_cmd_buffering() {
    use server::connection::ConnectionTable;

    let mut table = ConnectionTable::new(50);
    let mut addrs = Vec::new();
    for index in 0..10 {
        let addr: SocketAddr = format!("127.0.0.1:{}", 8000 + index).parse().unwrap();
        let handle = table.add(addr).expect("table should have room");
        table.mark_active(handle);
        addrs.push(addr);
    }

    let start = Instant::now();

    for addr in &addrs {
        for sequence in 1..=100u32 {
            table.queue_cmd(*addr, bench_cmd(sequence));
        }
    }
    let drained = table.drain_cmds();
    let total: usize = drained.iter().map(|(_, cmds)| cmds.len()).sum();

    let duration = start.elapsed();
    println!("Cmd buffering: {} cmds processed in {:?}", total, duration);

    assert_eq!(total, 1000);
    // Should process 1000 buffered cmds in under 10ms
    assert!(duration.as_millis() < 10);
}

/// Benchmarks client mirror refresh from authoritative snapshots
#[test]
fn benchmark_mirror_refresh() {
    use client::game::WorldView;
    use client::observer::LogObserver;

    let mut view = WorldView::new();
    let mut observer = LogObserver;
    for index in 0..8u32 {
        let handle = ConnectionHandle(index + 1);
        view.setup_player(handle, index == 0, "127.0.0.1:9000", "arena.map");
        view.set_name(handle, &format!("bot-{}", index), &mut observer);
    }

    let mut source = Player::new(ConnectionHandle(1), "bench");
    source.spawn_at(Vec3::new(4.0, 2.0, 0.0));
    let mut update = source.to_update();

    let iterations = 1_000u32;
    let start = Instant::now();

    for step in 0..iterations {
        update.position.x = 4.0 + (step % 16) as f32 * 0.25;
        for index in 0..8u32 {
            view.apply_update(ConnectionHandle(index + 1), &update, &mut observer);
        }
    }

    let duration = start.elapsed();
    println!(
        "Mirror refresh: {} snapshots in {:?} ({:.2} μs/snapshot)",
        iterations * 8,
        duration,
        duration.as_micros() as f64 / f64::from(iterations * 8)
    );

    // Should apply 8000 snapshots in under 500ms
    assert!(duration.as_millis() < 500);
}

/// Benchmarks the dirty scan and snapshot fan-out across a full roster
#[test]
fn benchmark_replication_fanout() {
    use server::replication::replicate_players;

    let mut world = bench_world(8);
    let mut sink = CountingSink { broadcasts: 0 };

    let iterations = 1_000u32;
    let start = Instant::now();

    for step in 0..iterations {
        let x = 3.0 + (step % 8) as f32 * 0.5;
        for player in world.players.iter_mut() {
            player.set_x(x);
            player.commit_snapshots();
        }
        replicate_players(&mut world, true, &mut sink);
    }

    let duration = start.elapsed();
    println!(
        "Replication fan-out: {} snapshots in {:?} ({:.2} μs/tick)",
        sink.broadcasts,
        duration,
        duration.as_micros() as f64 / f64::from(iterations)
    );

    assert_eq!(sink.broadcasts, 8_000);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the bullet stream scanning map geometry and players
#[test]
fn benchmark_bullet_stream() {
    use server::combat;
    use shared::weapon::RIFLE;
    use shared::Bullet;

    let now = Instant::now();
    let cfg = SimConfig {
        spawn_policy: SpawnPolicy::Leftmost,
        ..SimConfig::default()
    };
    let mut world = bench_world(2);
    for id in 0..64u32 {
        world.bullets.push(Bullet {
            id,
            owner: ConnectionHandle(1),
            position: Vec3::new(2.0 + (id % 16) as f32, 5.0 + (id / 16) as f32, 0.0),
            angle: Vec3::new(0.0, 0.0, 0.0),
            size: RIFLE.bullet_size,
            damage: 0,
            speed: 0.0,
            blast: None,
        });
    }

    let mut outbox = Outbox::new();
    let iterations = 1_000u32;
    let start = Instant::now();

    for _ in 0..iterations {
        combat::update_bullets(&mut world, 60.0, now, &cfg, &mut outbox);
        outbox.drain();
    }

    let duration = start.elapsed();
    println!(
        "Bullet stream: 64 bullets × {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / f64::from(iterations)
    );

    assert_eq!(world.bullets.len(), 64);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks frag table sorting at a busy server
#[test]
fn benchmark_frag_table_sort() {
    use shared::{sort_rows, FragRow};

    let rows: Vec<FragRow> = (0..16u32)
        .map(|index| FragRow {
            handle: ConnectionHandle(index + 1),
            name: format!("player-{}", index),
            frags: (index as i32 * 7) % 13,
            deaths: (index * 3) % 11,
        })
        .collect();

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let mut table = rows.clone();
        sort_rows(&mut table);
    }

    let duration = start.elapsed();
    println!(
        "Frag table sort: {} sorts in {:?} ({:.2} μs/sort)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

// HELPER FUNCTIONS

/// A replication sink that only counts, standing in for the sender task.
struct CountingSink {
    broadcasts: usize,
}

impl PacketSink for CountingSink {
    fn send_to(&mut self, _target: ConnectionHandle, _packet: &Packet) -> bool {
        true
    }

    fn broadcast(&mut self, _packet: &Packet) -> bool {
        self.broadcasts += 1;
        true
    }

    fn broadcast_except(&mut self, _skip: ConnectionHandle, _packet: &Packet) -> bool {
        self.broadcasts += 1;
        true
    }
}

fn bench_world(players: u32) -> World {
    let now = Instant::now();
    let cfg = SimConfig {
        spawn_policy: SpawnPolicy::Leftmost,
        ..SimConfig::default()
    };
    let mut world = World::new(
        Map::demo_arena(),
        GameMode::new(GameModeConfig::default(), now),
    );
    for index in 0..players {
        let handle = ConnectionHandle(index + 1);
        world.add_player(handle, "127.0.0.1:9000");
        world.confirm_player(handle, &format!("bot-{}", index), now, &cfg);
    }
    world
}

fn bench_cmd(sequence: u32) -> CmdState {
    CmdState {
        sequence,
        timestamp: u64::from(sequence) * 16,
        move_left: sequence % 2 == 0,
        move_right: sequence % 3 == 0,
        jump: sequence % 5 == 0,
        crouch: false,
        fire: false,
        aim_angle: 0.0,
        switch_slot: None,
    }
}
