pub mod bullet;
pub mod collision;
pub mod game_mode;
pub mod map;
pub mod math;
pub mod player;
pub mod protocol;
pub mod snapshot;
pub mod tick;
pub mod weapon;

pub use bullet::{explosion_falloff, Bullet, Explosion};
pub use collision::Aabb;
pub use game_mode::{sort_rows, FragRow, GameMode, GameModeConfig};
pub use map::{Block, Map, MapItem, MapItemKind, SpawnPoint, SpawnPolicy};
pub use math::Vec3;
pub use player::{CmdIntent, DamageOutcome, Invulnerability, Player, PlayerDirectory};
pub use protocol::{
    CmdState, ConnectionHandle, MenuAction, Packet, PlayerEventKind, PlayerUpdate, WeaponState,
    PROTOCOL_VERSION,
};
pub use snapshot::Tracked;
pub use tick::{TickBatch, TickClock};
pub use weapon::{Blast, Weapon, WeaponSpec};

/// Side length of one world block; all other distances are in block units.
pub const BLOCK_SIZE: f32 = 1.0;

pub const PLAYER_WIDTH: f32 = 0.9;
pub const PLAYER_HEIGHT: f32 = 1.8;
pub const PLAYER_CROUCH_HEIGHT: f32 = 0.9;
pub const PLAYER_DEPTH: f32 = 0.6;

pub const MAX_HEALTH: i32 = 100;
pub const MAX_ARMOR: i32 = 100;

/// Horizontal movement speed in blocks per second.
pub const RUN_SPEED: f32 = 5.2;
pub const CROUCH_SPEED: f32 = 2.1;

/// Vertical speed scalar a jump starts with.
pub const JUMP_GRAVITY: f32 = 9.0;
/// Stronger launch granted by jumppad blocks.
pub const JUMPPAD_GRAVITY: f32 = 14.5;
/// How fast an ongoing jump bleeds off, per second. Larger than
/// [`FALL_ACCEL`] so the way up is quicker than the way down.
pub const JUMP_DECAY: f32 = 22.0;
/// Downward acceleration while falling, per second.
pub const FALL_ACCEL: f32 = 16.0;
/// Terminal fall speed; the gravity scalar never drops below this.
pub const GRAVITY_MIN: f32 = -20.0;
/// Falling this far below the lowest map geometry is lethal.
pub const FALL_KILL_MARGIN: f32 = 5.0;
/// Falls faster than this are announced before the landing.
pub const FALL_EVENT_GRAVITY: f32 = -14.0;

/// Gap left between a player and the wall it was snapped against.
pub const WALL_EPSILON: f32 = 0.001;
/// Bullets survive this far outside the map before being dropped.
pub const BULLET_BOUNDS_SLACK: f32 = 4.0 * BLOCK_SIZE;
/// Pulse units an explosion loses per second before expiring.
pub const EXPLOSION_PULSE_DECAY: f32 = 2.5;

/// Inventory item power drained per active second.
pub const INVENTORY_DRAIN_PER_SEC: f32 = 0.25;
/// Movement speed multiplier while the inventory item is powered on.
pub const INVENTORY_SPEED_BOOST: f32 = 1.3;

pub const DEFAULT_TICK_RATE: u32 = 30;
pub const DEFAULT_CLIENT_UPDATE_RATE: u32 = 15;
pub const DEFAULT_PHYSICS_RATE: u32 = 60;

/// Most simulation ticks replayed in one catch-up burst after a stall.
pub const MAX_CATCHUP_TICKS: u32 = 8;
