//! Death bookkeeping, respawns and the once-per-tick player upkeep.

use crate::game::{Outbox, SimConfig, World};
use log::debug;
use rand::Rng;
use shared::{
    CmdIntent, ConnectionHandle, Invulnerability, Player, PlayerEventKind, SpawnPolicy, Vec3,
    INVENTORY_DRAIN_PER_SEC,
};
use std::cmp::Ordering;
use std::time::Instant;

/// Books a death that already happened (health is zero): bumps the
/// counters, arms the respawn timer and credits the killer when it is
/// somebody else and still around. `notify` suppresses the individual
/// death broadcast when the caller folds several deaths into one
/// multi-kill announcement.
pub fn on_death(
    world: &mut World,
    victim: ConnectionHandle,
    killer: ConnectionHandle,
    now: Instant,
    cfg: &SimConfig,
    outbox: &mut Outbox,
    notify: bool,
) {
    let suicide = victim == killer;
    if let Some(player) = world.players.tolerant_mut(victim) {
        player.deaths.set(player.deaths.get() + 1);
        if suicide {
            player.suicides.set(player.suicides.get() + 1);
        }
        player.respawn_pending.set(true);
        player.respawn_at = Some(now + cfg.respawn_delay);
        player.intent = CmdIntent::default();
        player.jumping = false;
    }
    if !suicide {
        // The killer may have disconnected while the shot was in flight.
        if let Some(player) = world.players.tolerant_mut(killer) {
            player.frags.set(player.frags.get() + 1);
        }
    }
    world.refresh_mode_row(victim);
    world.refresh_mode_row(killer);
    if notify {
        outbox.death(victim, killer);
    }
}

/// Once-per-tick upkeep: due respawns, protection expiry, weapon reload
/// completion and inventory item drain. Everything here pauses while
/// the round is over; the restart puts all players back itself.
pub fn update(world: &mut World, now: Instant, cfg: &SimConfig, outbox: &mut Outbox) {
    if world.round_over {
        return;
    }
    for handle in world.players.handles() {
        let due = world
            .players
            .get(handle)
            .map(|player| {
                player.booted
                    && !player.is_alive()
                    && player.respawn_pending.get()
                    && player.respawn_at.map(|at| now >= at).unwrap_or(false)
            })
            .unwrap_or(false);
        if due {
            respawn(world, handle, now, cfg);
        }
    }
    for player in world.players.iter_mut() {
        if !player.booted {
            continue;
        }
        player.invulnerable.set(player.is_invulnerable(now));
        if !player.is_alive() {
            continue;
        }
        let handle = player.handle;
        for slot in 0..player.weapons.len() {
            if player.weapons[slot].update(now) {
                outbox.wpn_delta(handle, &player.weapons[slot]);
            }
        }
        if player.inventory_active {
            let power =
                (player.item_power.get() - INVENTORY_DRAIN_PER_SEC / cfg.tick_rate as f32).max(0.0);
            player.item_power.set(power);
            if power <= 0.0 {
                player.inventory_active = false;
                outbox.event(
                    handle,
                    PlayerEventKind::InventoryToggle,
                    Some(0),
                    None,
                    None,
                );
            }
        }
    }
}

/// Puts a player back into play at a point chosen by the configured
/// policy, with the protection window armed.
pub fn respawn(world: &mut World, handle: ConnectionHandle, now: Instant, cfg: &SimConfig) {
    let position = pick_spawn(world, handle, cfg);
    if let Some(player) = world.players.get_mut(handle) {
        player.spawn_at(position);
        arm_invulnerability(player, now, cfg);
        debug!(
            "respawned player {} at ({:.1}, {:.1})",
            handle, position.x, position.y
        );
    }
}

/// Arms the post-spawn protection window. A zero window means none at
/// all once the player is booted.
pub fn arm_invulnerability(player: &mut Player, now: Instant, cfg: &SimConfig) {
    player.invulnerability = if cfg.invulnerable.is_zero() {
        Invulnerability::None
    } else {
        Invulnerability::Until(now + cfg.invulnerable)
    };
    player.invulnerable.set(player.is_invulnerable(now));
}

/// Picks a spawn point for `handle`: team points when the mode is
/// team-based, free points (nobody standing there) preferred, extreme
/// left/right available for deterministic setups.
fn pick_spawn(world: &World, handle: ConnectionHandle, cfg: &SimConfig) -> Vec3 {
    let team = world
        .players
        .get(handle)
        .filter(|player| world.mode.config().team_based && player.team != 0)
        .map(|player| player.team);
    let candidates = world.map.spawns_for_team(team);
    if candidates.is_empty() {
        return world.map.bounds().center();
    }
    let free: Vec<_> = candidates
        .iter()
        .copied()
        .filter(|point| {
            !world.players.iter().any(|other| {
                other.handle != handle
                    && other.is_alive()
                    && other.position.get().distance(&point.position) < 1.0
            })
        })
        .collect();
    let pool = if free.is_empty() { candidates } else { free };
    let chosen = match cfg.spawn_policy {
        SpawnPolicy::Random => pool[rand::thread_rng().gen_range(0..pool.len())],
        SpawnPolicy::Leftmost => pool
            .iter()
            .copied()
            .min_by(|a, b| {
                a.position
                    .x
                    .partial_cmp(&b.position.x)
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or(pool[0]),
        SpawnPolicy::Rightmost => pool
            .iter()
            .copied()
            .max_by(|a, b| {
                a.position
                    .x
                    .partial_cmp(&b.position.x)
                    .unwrap_or(Ordering::Equal)
            })
            .unwrap_or(pool[0]),
    };
    chosen.position
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::OutEvent;
    use shared::{GameMode, GameModeConfig, Map, MAX_HEALTH};
    use std::time::Duration;

    fn test_config() -> SimConfig {
        SimConfig {
            respawn_delay: Duration::from_secs(3),
            invulnerable: Duration::ZERO,
            spawn_policy: SpawnPolicy::Leftmost,
            ..SimConfig::default()
        }
    }

    fn world_with(names: &[&str], cfg: &SimConfig, now: Instant) -> World {
        let mut world = World::new(
            Map::demo_arena(),
            GameMode::new(GameModeConfig::default(), now),
        );
        for (index, name) in names.iter().enumerate() {
            let handle = ConnectionHandle(index as u32 + 1);
            world.add_player(handle, "127.0.0.1:9000");
            world.confirm_player(handle, name, now, cfg);
        }
        world
    }

    #[test]
    fn test_death_bookkeeping_and_notification() {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = world_with(&["victim", "killer"], &cfg, now);
        let victim = ConnectionHandle(1);
        let killer = ConnectionHandle(2);

        world.players.get_mut(victim).unwrap().kill();
        let mut outbox = Outbox::new();
        on_death(&mut world, victim, killer, now, &cfg, &mut outbox, true);

        let dead = world.players.get(victim).unwrap();
        assert_eq!(dead.deaths.get(), 1);
        assert_eq!(dead.suicides.get(), 0);
        assert!(dead.respawn_pending.get());
        assert_eq!(dead.respawn_at, Some(now + cfg.respawn_delay));
        assert_eq!(world.players.get(killer).unwrap().frags.get(), 1);
        assert!(outbox
            .events()
            .iter()
            .any(|event| matches!(event, OutEvent::Death { .. })));
    }

    #[test]
    fn test_suicide_scores_no_frag() {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = world_with(&["loner"], &cfg, now);
        let handle = ConnectionHandle(1);

        world.players.get_mut(handle).unwrap().kill();
        let mut outbox = Outbox::new();
        on_death(&mut world, handle, handle, now, &cfg, &mut outbox, true);

        let player = world.players.get(handle).unwrap();
        assert_eq!(player.deaths.get(), 1);
        assert_eq!(player.suicides.get(), 1);
        assert_eq!(player.frags.get(), 0);
    }

    #[test]
    fn test_vanished_killer_tolerated() {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = world_with(&["victim"], &cfg, now);
        let victim = ConnectionHandle(1);

        world.players.get_mut(victim).unwrap().kill();
        let mut outbox = Outbox::new();
        on_death(
            &mut world,
            victim,
            ConnectionHandle(99),
            now,
            &cfg,
            &mut outbox,
            true,
        );

        assert_eq!(world.players.get(victim).unwrap().deaths.get(), 1);
        assert_eq!(world.players.len(), 1);
    }

    #[test]
    fn test_respawn_waits_for_delay() {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = world_with(&["victim"], &cfg, now);
        let handle = ConnectionHandle(1);

        world.players.get_mut(handle).unwrap().kill();
        let mut outbox = Outbox::new();
        on_death(&mut world, handle, handle, now, &cfg, &mut outbox, true);

        update(&mut world, now + Duration::from_secs(1), &cfg, &mut outbox);
        assert!(!world.players.get(handle).unwrap().is_alive());

        update(&mut world, now + cfg.respawn_delay, &cfg, &mut outbox);
        let player = world.players.get(handle).unwrap();
        assert!(player.is_alive());
        assert_eq!(player.health.get(), MAX_HEALTH);
        assert!(!player.respawn_pending.get());
    }

    #[test]
    fn test_respawn_arms_protection_window() {
        let mut cfg = test_config();
        cfg.invulnerable = Duration::from_secs(3);
        let now = Instant::now();
        let mut world = world_with(&["target"], &cfg, now);
        let handle = ConnectionHandle(1);

        let player = world.players.get(handle).unwrap();
        assert!(player.is_invulnerable(now));
        assert!(player.invulnerable.get());
        assert!(!player.is_invulnerable(now + Duration::from_secs(4)));
    }

    #[test]
    fn test_zero_window_spawns_unprotected() {
        let cfg = test_config();
        let now = Instant::now();
        let world = world_with(&["target"], &cfg, now);

        let player = world.players.get(ConnectionHandle(1)).unwrap();
        assert!(!player.is_invulnerable(now));
        assert!(!player.invulnerable.get());
    }

    #[test]
    fn test_protection_flag_tracks_expiry() {
        let mut cfg = test_config();
        cfg.invulnerable = Duration::from_secs(1);
        let now = Instant::now();
        let mut world = world_with(&["target"], &cfg, now);
        let handle = ConnectionHandle(1);
        assert!(world.players.get(handle).unwrap().invulnerable.get());

        let mut outbox = Outbox::new();
        update(&mut world, now + Duration::from_secs(2), &cfg, &mut outbox);
        assert!(!world.players.get(handle).unwrap().invulnerable.get());
    }

    #[test]
    fn test_reload_completion_notifies_owner() {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = world_with(&["gunner"], &cfg, now);
        let handle = ConnectionHandle(1);

        let reload_time = {
            let player = world.players.get_mut(handle).unwrap();
            player.current_weapon_mut().mag = 0;
            player.current_weapon_mut().begin_reload(now);
            player.current_weapon().spec.reload_time
        };

        let mut outbox = Outbox::new();
        update(&mut world, now + Duration::from_millis(1), &cfg, &mut outbox);
        assert!(outbox.is_empty());

        update(&mut world, now + reload_time, &cfg, &mut outbox);
        assert!(outbox
            .events()
            .iter()
            .any(|event| matches!(event, OutEvent::WpnDelta { .. })));
        let mag = world.players.get(handle).unwrap().current_weapon().mag;
        assert!(mag > 0);
    }

    #[test]
    fn test_inventory_drains_to_auto_off() {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = world_with(&["runner"], &cfg, now);
        let handle = ConnectionHandle(1);
        {
            let player = world.players.get_mut(handle).unwrap();
            player.item_power.set(0.01);
            player.inventory_active = true;
        }

        let mut outbox = Outbox::new();
        for tick in 0..5 {
            let at = now + Duration::from_millis(33 * (tick + 1));
            update(&mut world, at, &cfg, &mut outbox);
        }

        let player = world.players.get(handle).unwrap();
        assert!(!player.inventory_active);
        assert_eq!(player.item_power.get(), 0.0);
        assert!(outbox.events().iter().any(|event| matches!(
            event,
            OutEvent::Event {
                kind: PlayerEventKind::InventoryToggle,
                int_arg: Some(0),
                ..
            }
        )));
    }

    #[test]
    fn test_no_respawn_while_round_over() {
        let cfg = test_config();
        let now = Instant::now();
        let mut world = world_with(&["victim"], &cfg, now);
        let handle = ConnectionHandle(1);

        world.players.get_mut(handle).unwrap().kill();
        let mut outbox = Outbox::new();
        on_death(&mut world, handle, handle, now, &cfg, &mut outbox, true);
        world.round_over = true;

        update(&mut world, now + Duration::from_secs(30), &cfg, &mut outbox);
        assert!(!world.players.get(handle).unwrap().is_alive());
    }

    #[test]
    fn test_team_spawns_used_when_team_based() {
        let mut cfg = test_config();
        cfg.spawn_policy = SpawnPolicy::Leftmost;
        let now = Instant::now();
        let mut world = World::new(
            Map::demo_arena(),
            GameMode::new(
                GameModeConfig {
                    team_based: true,
                    ..GameModeConfig::default()
                },
                now,
            ),
        );
        let handle = ConnectionHandle(1);
        world.add_player(handle, "127.0.0.1:9000");
        world.players.get_mut(handle).unwrap().team = 2;
        world.confirm_player(handle, "teammate", now, &cfg);

        let expected = world
            .map
            .spawn_points
            .iter()
            .filter(|point| point.team == Some(2))
            .map(|point| point.position.x)
            .fold(f32::INFINITY, f32::min);
        let spawned = world.players.get(handle).unwrap().position.get().x;
        assert_eq!(spawned, expected);
    }
}
