//! Weapon fire, bullet flight and explosion handling.

use crate::game::{Outbox, SimConfig, World};
use crate::lifecycle;
use shared::{
    explosion_falloff, Bullet, ConnectionHandle, DamageOutcome, Explosion, Map, PlayerEventKind,
    Vec3,
};
use std::time::Instant;

/// Distance from the player center at which new bullets appear, so a
/// shot never collides with its own shooter's surroundings on frame
/// one.
const MUZZLE_OFFSET: f32 = 0.8;

/// Fires the current weapon of `handle` if it is ready: one bullet per
/// pellet offset, a single shot on the accuracy books, and an automatic
/// reload announcement when the magazine runs dry.
pub fn try_fire(world: &mut World, handle: ConnectionHandle, now: Instant, outbox: &mut Outbox) {
    let spawned = {
        let player = match world.players.tolerant_mut(handle) {
            Some(player) => player,
            None => return,
        };
        if !player.booted || !player.is_alive() {
            return;
        }
        let aim = player.intent.aim_angle;
        if !player.current_weapon().can_fire(now) {
            return;
        }
        player.current_weapon_mut().fire(now);
        player.record_shot();
        let spec = player.current_weapon().spec;
        let origin = player.position.get();
        let muzzle = Vec3::new(
            origin.x + aim.cos() * MUZZLE_OFFSET,
            origin.y + aim.sin() * MUZZLE_OFFSET,
            origin.z,
        );
        let mut spawned = Vec::with_capacity(spec.pellets.len());
        for offset in spec.pellets {
            spawned.push((muzzle, aim + offset, spec));
        }
        if player.current_weapon().is_reloading() {
            outbox.current_wpn(handle, player.current_weapon());
        }
        spawned
    };
    for (position, angle, spec) in spawned {
        let bullet = Bullet {
            id: world.next_bullet_id,
            owner: handle,
            position,
            angle: Vec3::new(0.0, 0.0, angle),
            size: spec.bullet_size,
            damage: spec.damage,
            speed: spec.bullet_speed,
            blast: spec.blast,
        };
        world.next_bullet_id += 1;
        world.bullets.push(bullet);
    }
}

/// Advances every live bullet one iteration and settles its fate. The
/// checks run in a fixed order and the first match wins: end-of-round
/// removal, player hit, out of bounds, wall hit. Survivors then cancel
/// each other out pairwise when bullets of different owners meet.
pub fn update_bullets(
    world: &mut World,
    rate: f32,
    now: Instant,
    cfg: &SimConfig,
    outbox: &mut Outbox,
) {
    let bullets = std::mem::take(&mut world.bullets);
    let mut survivors: Vec<Bullet> = Vec::with_capacity(bullets.len());
    for mut bullet in bullets {
        bullet.advance(rate);
        if world.round_over {
            outbox.bullet_gone(&bullet);
            continue;
        }
        if let Some(target) = find_bullet_target(world, &bullet) {
            resolve_player_hit(world, &bullet, target, now, cfg, outbox);
            outbox.bullet_gone(&bullet);
            continue;
        }
        if !world.map.bullet_bounds().contains_2d(bullet.position) {
            outbox.bullet_gone(&bullet);
            continue;
        }
        if bullet_hits_wall(&world.map, &bullet) {
            if bullet.blast.is_some() {
                detonate(world, &bullet, None, now, cfg, outbox);
            }
            outbox.bullet_gone(&bullet);
            continue;
        }
        survivors.push(bullet);
    }

    let mut cancelled = vec![false; survivors.len()];
    for i in 0..survivors.len() {
        for j in (i + 1)..survivors.len() {
            if cancelled[i] || cancelled[j] {
                continue;
            }
            // Pellets from the same trigger pull overlap at the muzzle
            // and must not destroy each other.
            if survivors[i].owner == survivors[j].owner {
                continue;
            }
            if survivors[i].aabb().overlaps_2d(&survivors[j].aabb()) {
                cancelled[i] = true;
                cancelled[j] = true;
            }
        }
    }
    for (bullet, cancelled) in survivors.into_iter().zip(cancelled) {
        if cancelled {
            outbox.bullet_gone(&bullet);
        } else {
            world.bullets.push(bullet);
        }
    }

    // Ids restart only between rounds, once nothing references them.
    if world.round_over && world.bullets.is_empty() {
        world.next_bullet_id = 0;
    }
}

/// First player in directory order the bullet overlaps, skipping its
/// owner and the already dead. Protected players still stop bullets.
fn find_bullet_target(world: &World, bullet: &Bullet) -> Option<ConnectionHandle> {
    let bullet_box = bullet.aabb();
    world
        .players
        .iter()
        .find(|player| {
            player.handle != bullet.owner
                && player.booted
                && player.is_alive()
                && !player.awaiting_spawn
                && player.aabb().overlaps_2d(&bullet_box)
        })
        .map(|player| player.handle)
}

fn resolve_player_hit(
    world: &mut World,
    bullet: &Bullet,
    target: ConnectionHandle,
    now: Instant,
    cfg: &SimConfig,
    outbox: &mut Outbox,
) {
    let outcome = match world.players.get_mut(target) {
        Some(player) => player.apply_damage(bullet.damage, now),
        None => return,
    };
    match outcome {
        DamageOutcome::Ignored => {}
        DamageOutcome::Hit => {
            if let Some(owner) = world.players.tolerant_mut(bullet.owner) {
                owner.record_hit();
            }
        }
        DamageOutcome::Died => {
            if let Some(owner) = world.players.tolerant_mut(bullet.owner) {
                owner.record_hit();
            }
            lifecycle::on_death(world, target, bullet.owner, now, cfg, outbox, true);
        }
    }
    if bullet.blast.is_some() {
        detonate(world, bullet, Some(target), now, cfg, outbox);
    }
}

/// Spawns the burst for an explosive bullet and deals its falloff
/// damage in one go. The direct-hit target already took the bullet
/// damage and is left out. Several victims dying to the same burst are
/// reported as a single multi-kill instead of a string of death
/// notifications.
fn detonate(
    world: &mut World,
    bullet: &Bullet,
    direct_target: Option<ConnectionHandle>,
    now: Instant,
    cfg: &SimConfig,
    outbox: &mut Outbox,
) {
    let blast = match bullet.blast {
        Some(blast) => blast,
        None => return,
    };
    let explosion = Explosion::new(
        world.next_explosion_id,
        bullet.owner,
        bullet.position,
        blast.damage_area,
    );
    world.next_explosion_id += 1;

    let mut killed = Vec::new();
    for handle in world.players.handles() {
        if Some(handle) == direct_target {
            continue;
        }
        let died = match world.players.get_mut(handle) {
            Some(player) => {
                if !player.booted || !player.is_alive() {
                    continue;
                }
                let distance = player.position.get().distance(&explosion.position);
                let damage =
                    explosion_falloff(blast.damage, blast.damage_area, distance, explosion.pulse);
                if damage <= 0 {
                    continue;
                }
                player.apply_damage(damage, now) == DamageOutcome::Died
            }
            None => false,
        };
        if died {
            killed.push(handle);
        }
    }

    if killed.len() > 1 {
        for &victim in &killed {
            lifecycle::on_death(world, victim, bullet.owner, now, cfg, outbox, false);
        }
        outbox.event(
            bullet.owner,
            PlayerEventKind::ExplosionMultiKill,
            Some(killed.len() as i32),
            None,
            None,
        );
    } else if let Some(&victim) = killed.first() {
        lifecycle::on_death(world, victim, bullet.owner, now, cfg, outbox, true);
    }
    world.explosions.push(explosion);
}

/// Drops bursts whose pulse has run out.
pub fn update_explosions(world: &mut World, rate: f32) {
    world.explosions.retain_mut(|explosion| !explosion.update(rate));
}

fn bullet_hits_wall(map: &Map, bullet: &Bullet) -> bool {
    let velocity = bullet.velocity();
    let bullet_box = bullet.aabb();
    for block in &map.blocks {
        // Cheap pre-filter: a block entirely behind the direction of
        // travel can be skipped without the overlap test.
        if velocity.x > 0.0 && block.aabb.max.x < bullet_box.min.x {
            continue;
        }
        if velocity.x < 0.0 && block.aabb.min.x > bullet_box.max.x {
            continue;
        }
        if velocity.y > 0.0 && block.aabb.max.y < bullet_box.min.y {
            continue;
        }
        if velocity.y < 0.0 && block.aabb.min.y > bullet_box.max.y {
            continue;
        }
        if block.aabb.overlaps_2d(&bullet_box) {
            return true;
        }
    }
    false
}
