use crate::math::Vec3;
use crate::protocol::WeaponState;
use std::time::{Duration, Instant};

/// Area damage attached to a weapon's projectiles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blast {
    pub damage_area: f32,
    pub damage: i32,
}

/// Static description of a weapon type, keyed by its asset filename.
#[derive(Debug, PartialEq)]
pub struct WeaponSpec {
    pub name: &'static str,
    pub damage: i32,
    pub fire_interval: Duration,
    pub mag_size: u16,
    pub reserve: u16,
    pub reload_time: Duration,
    pub bullet_speed: f32,
    pub bullet_size: Vec3,
    /// Angular offsets of the projectiles released per trigger pull.
    pub pellets: &'static [f32],
    pub blast: Option<Blast>,
}

pub const RIFLE: WeaponSpec = WeaponSpec {
    name: "rifle.wpn",
    damage: 18,
    fire_interval: Duration::from_millis(180),
    mag_size: 12,
    reserve: 36,
    reload_time: Duration::from_millis(1400),
    bullet_speed: 24.0,
    bullet_size: Vec3::new(0.2, 0.2, 0.2),
    pellets: &[0.0],
    blast: None,
};

pub const SCATTER: WeaponSpec = WeaponSpec {
    name: "scatter.wpn",
    damage: 9,
    fire_interval: Duration::from_millis(650),
    mag_size: 6,
    reserve: 18,
    reload_time: Duration::from_millis(1800),
    bullet_speed: 20.0,
    bullet_size: Vec3::new(0.15, 0.15, 0.15),
    pellets: &[-0.09, 0.0, 0.09],
    blast: None,
};

pub const LAUNCHER: WeaponSpec = WeaponSpec {
    name: "launcher.wpn",
    damage: 30,
    fire_interval: Duration::from_millis(900),
    mag_size: 4,
    reserve: 8,
    reload_time: Duration::from_millis(2500),
    bullet_speed: 14.0,
    bullet_size: Vec3::new(0.35, 0.35, 0.35),
    pellets: &[0.0],
    blast: Some(Blast {
        damage_area: 3.5,
        damage: 45,
    }),
};

pub fn spec_by_name(name: &str) -> Option<&'static WeaponSpec> {
    match name {
        "rifle.wpn" => Some(&RIFLE),
        "scatter.wpn" => Some(&SCATTER),
        "launcher.wpn" => Some(&LAUNCHER),
        _ => None,
    }
}

/// The loadout every player starts with. The launcher stays locked until
/// picked up from a weapon crate.
pub fn default_arsenal() -> Vec<Weapon> {
    vec![
        Weapon::new(&RIFLE, true),
        Weapon::new(&SCATTER, true),
        Weapon::new(&LAUNCHER, false),
    ]
}

/// One weapon instance carried by a player: availability plus loaded and
/// reserve ammunition, with a timed reload in between.
#[derive(Debug, Clone)]
pub struct Weapon {
    pub spec: &'static WeaponSpec,
    pub available: bool,
    pub mag: u16,
    pub unmag: u16,
    reload_started: Option<Instant>,
    last_fired: Option<Instant>,
}

impl Weapon {
    pub fn new(spec: &'static WeaponSpec, available: bool) -> Self {
        Weapon {
            spec,
            available,
            mag: spec.mag_size,
            unmag: spec.reserve,
            reload_started: None,
            last_fired: None,
        }
    }

    pub fn is_reloading(&self) -> bool {
        self.reload_started.is_some()
    }

    pub fn state(&self) -> WeaponState {
        if self.is_reloading() {
            WeaponState::Reloading
        } else if self.mag == 0 {
            WeaponState::Empty
        } else {
            WeaponState::Ready
        }
    }

    pub fn can_fire(&self, now: Instant) -> bool {
        if !self.available || self.is_reloading() || self.mag == 0 {
            return false;
        }
        match self.last_fired {
            Some(at) => now.duration_since(at) >= self.spec.fire_interval,
            None => true,
        }
    }

    /// Consumes one round. An emptied magazine starts the reload timer
    /// automatically when reserve ammunition remains.
    pub fn fire(&mut self, now: Instant) -> bool {
        if !self.can_fire(now) {
            return false;
        }
        self.mag -= 1;
        self.last_fired = Some(now);
        if self.mag == 0 && self.unmag > 0 {
            self.begin_reload(now);
        }
        true
    }

    pub fn begin_reload(&mut self, now: Instant) {
        if !self.is_reloading() && self.mag < self.spec.mag_size && self.unmag > 0 {
            self.reload_started = Some(now);
        }
    }

    /// Advances the reload timer. Returns true exactly once, on the tick
    /// the reload completes and ammunition moves from reserve to mag.
    pub fn update(&mut self, now: Instant) -> bool {
        let started = match self.reload_started {
            Some(at) => at,
            None => return false,
        };
        if now.duration_since(started) < self.spec.reload_time {
            return false;
        }
        let moved = (self.spec.mag_size - self.mag).min(self.unmag);
        self.mag += moved;
        self.unmag -= moved;
        self.reload_started = None;
        true
    }

    /// Refills both buffers, e.g. on round restart.
    pub fn restock(&mut self) {
        self.mag = self.spec.mag_size;
        self.unmag = self.spec.reserve;
        self.reload_started = None;
        self.last_fired = None;
    }

    pub fn add_reserve(&mut self, rounds: u16) {
        self.unmag = self.unmag.saturating_add(rounds);
    }
}
