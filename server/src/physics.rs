//! Fixed-rate movement integration and block collision resolution.
//!
//! All speeds are units per second scaled by the physics rate, so the
//! outcome of a tick is identical no matter how many substeps the
//! session driver packs into it. Collision is plain AABB overlap with
//! post-hoc snapping; there is no swept test, so very thin geometry can
//! be tunnelled through at low rates.

use crate::game::{Outbox, World};
use shared::{
    ConnectionHandle, PlayerEventKind, CROUCH_SPEED, FALL_ACCEL, FALL_EVENT_GRAVITY,
    FALL_KILL_MARGIN, GRAVITY_MIN, INVENTORY_SPEED_BOOST, JUMPPAD_GRAVITY, JUMP_DECAY, RUN_SPEED,
    WALL_EPSILON,
};

/// Applies the buffered horizontal intent of every live player.
pub fn apply_movement(world: &mut World, rate: f32) {
    for player in world.players.iter_mut() {
        if !player.booted || !player.is_alive() {
            continue;
        }
        player.crouching.set(player.intent.crouch);
        if player.intent.move_dir == 0.0 {
            continue;
        }
        let mut speed = if player.intent.crouch {
            CROUCH_SPEED
        } else {
            RUN_SPEED
        };
        if player.inventory_active {
            speed *= INVENTORY_SPEED_BOOST;
        }
        let position = player.position.get();
        player.set_x(position.x + player.intent.move_dir * speed / rate);
    }
}

/// Advances the gravity scalar and the vertical position of every live
/// player. While jumping the scalar starts positive and is eaten away
/// until it crosses zero, which ends the jump; afterwards downward
/// speed accumulates until the clamp. Returns the players that fell
/// past the kill margin below the map, to be killed by the caller.
pub fn integrate_gravity(
    world: &mut World,
    rate: f32,
    outbox: &mut Outbox,
) -> Vec<ConnectionHandle> {
    let kill_line = world.map.bottom() - FALL_KILL_MARGIN;
    let mut fallen = Vec::new();
    for player in world.players.iter_mut() {
        if !player.booted || !player.is_alive() {
            continue;
        }
        if player.jumping {
            let position = player.position.get();
            player.set_y(position.y + player.gravity / rate);
            player.gravity -= JUMP_DECAY / rate;
            if player.gravity <= 0.0 {
                player.gravity = 0.0;
                player.jumping = false;
            }
        } else {
            player.gravity = (player.gravity - FALL_ACCEL / rate).max(GRAVITY_MIN);
            let position = player.position.get();
            player.set_y(position.y + player.gravity / rate);
        }
        if player.gravity < FALL_EVENT_GRAVITY && !player.falling_far {
            player.falling_far = true;
            outbox.event(
                player.handle,
                PlayerEventKind::FallingFromHigh,
                None,
                Some(player.gravity),
                None,
            );
        }
        if player.position.get().y < kill_line {
            fallen.push(player.handle);
        }
    }
    fallen
}

/// Snaps every player out of the blocks it moved into this step.
///
/// The vertical pass runs only when the tracked Y moved and tests each
/// block against the horizontal band of the old position and the
/// vertical band of the new one; whether the player is put on top of
/// the block or under it follows from where the block sits relative to
/// the old Y. The horizontal pass then settles X against the nearest
/// colliding block with a small gap so the next step does not re-enter
/// it.
pub fn resolve_wall_collisions(world: &mut World, outbox: &mut Outbox) {
    let World { map, players, .. } = world;
    for player in players.iter_mut() {
        if !player.booted || !player.is_alive() {
            continue;
        }
        let old = player.position.previous();
        let size = player.collider_size();
        let half_w = size.x / 2.0;
        let half_h = size.y / 2.0;

        let new = player.position.get();
        if old.y != new.y {
            let mut grounded = false;
            for block in &map.blocks {
                let aabb = &block.aabb;
                let overlaps_x = aabb.min.x <= old.x + half_w && old.x - half_w <= aabb.max.x;
                let overlaps_y = aabb.min.y <= new.y + half_h && new.y - half_h <= aabb.max.y;
                if !overlaps_x || !overlaps_y {
                    continue;
                }
                if aabb.center().y < old.y {
                    // Hit from above: the block carries the player.
                    player.set_y(aabb.max.y + half_h);
                    if block.jumppad {
                        player.gravity = JUMPPAD_GRAVITY;
                        player.jumping = true;
                        outbox.event(
                            player.handle,
                            PlayerEventKind::Jumppad,
                            None,
                            Some(JUMPPAD_GRAVITY),
                            None,
                        );
                    } else {
                        player.gravity = 0.0;
                        player.jumping = false;
                        grounded = true;
                    }
                    if player.falling_far {
                        player.falling_far = false;
                        outbox.event(player.handle, PlayerEventKind::Landed, None, None, None);
                    }
                    player.somersaulting.set(false);
                } else {
                    // Hit a ceiling: the jump dies here.
                    player.set_y(aabb.min.y - half_h);
                    player.gravity = 0.0;
                    player.jumping = false;
                }
            }
            player.on_ground.set(grounded);
        }

        let new = player.position.get();
        if old.x != new.x {
            // Strict overlap here: resting flush on a floor tile must not
            // count as a horizontal hit against it.
            let player_box = player.aabb();
            let nearest = map
                .blocks
                .iter()
                .filter(|block| {
                    let aabb = &block.aabb;
                    aabb.min.x < player_box.max.x
                        && player_box.min.x < aabb.max.x
                        && aabb.min.y < player_box.max.y
                        && player_box.min.y < aabb.max.y
                })
                .min_by(|a, b| {
                    let da = (a.aabb.center().x - old.x).abs();
                    let db = (b.aabb.center().x - old.x).abs();
                    da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
                });
            if let Some(block) = nearest {
                if block.aabb.center().x > old.x {
                    player.set_x(block.aabb.min.x - half_w - WALL_EPSILON);
                } else {
                    player.set_x(block.aabb.max.x + half_w + WALL_EPSILON);
                }
            }
        }
    }
}
