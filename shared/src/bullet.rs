use crate::collision::Aabb;
use crate::math::Vec3;
use crate::protocol::ConnectionHandle;
use crate::weapon::Blast;
use crate::EXPLOSION_PULSE_DECAY;

/// A projectile in flight. Identifiers are allocated monotonically per
/// round and only reset once the round has ended and no bullets remain.
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    pub id: u32,
    pub owner: ConnectionHandle,
    pub position: Vec3,
    /// Direction of travel, carried as Euler angles; the in-plane
    /// heading sits in `z`.
    pub angle: Vec3,
    pub size: Vec3,
    pub damage: i32,
    pub speed: f32,
    pub blast: Option<Blast>,
}

impl Bullet {
    pub fn velocity(&self) -> Vec3 {
        Vec3::new(
            self.angle.z.cos() * self.speed,
            self.angle.z.sin() * self.speed,
            0.0,
        )
    }

    /// Advances the bullet by one physics iteration.
    pub fn advance(&mut self, physics_rate_hz: f32) {
        let step = 1.0 / physics_rate_hz;
        self.position = self.position.add(&self.velocity().scale(step));
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.position, self.size)
    }
}

/// An area-damage burst left behind by an explosive projectile. Damage
/// is dealt once, on spawn; the pulse then decays until the burst is
/// dropped from the world.
#[derive(Debug, Clone, PartialEq)]
pub struct Explosion {
    pub id: u32,
    pub owner: ConnectionHandle,
    pub position: Vec3,
    pub damage_area: f32,
    pub pulse: f32,
}

impl Explosion {
    pub fn new(id: u32, owner: ConnectionHandle, position: Vec3, damage_area: f32) -> Self {
        Explosion {
            id,
            owner,
            position,
            damage_area,
            pulse: 1.0,
        }
    }

    /// Decays the pulse by one iteration. Returns true once expired.
    pub fn update(&mut self, physics_rate_hz: f32) -> bool {
        self.pulse -= EXPLOSION_PULSE_DECAY / physics_rate_hz;
        self.pulse <= 0.0
    }
}

/// Damage dealt at `distance` from the center of a burst, falling off
/// linearly to zero at the edge of the damage area and modulated by the
/// current pulse.
pub fn explosion_falloff(base: i32, damage_area: f32, distance: f32, pulse: f32) -> i32 {
    if distance >= damage_area || damage_area <= 0.0 {
        return 0;
    }
    (base as f32 * (1.0 - distance / damage_area) * pulse).round() as i32
}
