use crate::collision::Aabb;
use crate::math::Vec3;
use crate::protocol::{ConnectionHandle, PlayerUpdate};
use crate::snapshot::Tracked;
use crate::weapon::{self, Weapon};
use crate::{MAX_ARMOR, MAX_HEALTH, PLAYER_CROUCH_HEIGHT, PLAYER_DEPTH, PLAYER_HEIGHT, PLAYER_WIDTH};
use log::debug;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::time::Instant;

const MOMENTARY_DECAY: f32 = 0.85;
const MOMENTARY_HIT_BOOST: f32 = 0.3;

/// Protection from damage, armed on spawn.
///
/// A configured duration gives a plain timed window. The sentinel form
/// covers the stretch between connection setup and the boot-up
/// handshake, where the player exists in the directory but has no
/// authoritative state yet; it ends implicitly when boot-up completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Invulnerability {
    None,
    Until(Instant),
    UntilBootUp,
}

/// What applying damage did to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DamageOutcome {
    /// Target was protected or already dead; nothing changed.
    Ignored,
    Hit,
    /// Health crossed from positive to zero on this application.
    Died,
}

/// Latest movement intent, retained between commands so a player keeps
/// moving through short gaps in the command stream.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CmdIntent {
    pub move_dir: f32,
    pub crouch: bool,
    pub fire: bool,
    pub aim_angle: f32,
}

/// One simulated player. Fields wrapped in [`Tracked`] replicate through
/// user updates; the rest is simulation-local bookkeeping.
#[derive(Debug, Clone)]
pub struct Player {
    pub handle: ConnectionHandle,
    pub name: String,
    /// Presentation form of the remote address, echoed in setup replays.
    pub addr: String,
    pub team: u8,
    pub booted: bool,
    /// True from construction until the first authoritative position
    /// lands, either by spawning (server) or by the first user update
    /// (client mirror).
    pub awaiting_spawn: bool,

    pub position: Tracked<Vec3>,
    pub facing: Tracked<Vec3>,
    pub weapon_angle: Tracked<f32>,
    pub momentary_accuracy: Tracked<f32>,
    pub on_ground: Tracked<bool>,
    pub crouching: Tracked<bool>,
    pub somersaulting: Tracked<bool>,
    pub armor: Tracked<i32>,
    pub health: Tracked<i32>,
    pub respawn_pending: Tracked<bool>,
    pub frags: Tracked<i32>,
    pub deaths: Tracked<u32>,
    pub suicides: Tracked<u32>,
    pub accuracy: Tracked<f32>,
    pub shots_fired: Tracked<u32>,
    pub invulnerable: Tracked<bool>,
    pub item_power: Tracked<f32>,

    /// Vertical speed scalar: positive while a jump carries the player
    /// up, negative while gravity pulls it down.
    pub gravity: f32,
    pub jumping: bool,
    /// Set once a fall gets fast enough to be worth announcing, cleared
    /// on landing.
    pub falling_far: bool,
    pub invulnerability: Invulnerability,
    pub respawn_at: Option<Instant>,
    pub inventory_active: bool,
    pub shots_hit: u32,
    pub weapons: Vec<Weapon>,
    pub weapon_slot: usize,
    pub intent: CmdIntent,
    force_dirty: bool,
}

impl Player {
    pub fn new(handle: ConnectionHandle, name: &str) -> Self {
        Player {
            handle,
            name: name.to_string(),
            addr: String::new(),
            team: 0,
            booted: false,
            awaiting_spawn: true,
            position: Tracked::new(Vec3::ZERO),
            facing: Tracked::new(Vec3::ZERO),
            weapon_angle: Tracked::new(0.0),
            momentary_accuracy: Tracked::new(0.0),
            on_ground: Tracked::new(false),
            crouching: Tracked::new(false),
            somersaulting: Tracked::new(false),
            armor: Tracked::new(0),
            health: Tracked::new(0),
            respawn_pending: Tracked::new(false),
            frags: Tracked::new(0),
            deaths: Tracked::new(0),
            suicides: Tracked::new(0),
            accuracy: Tracked::new(0.0),
            shots_fired: Tracked::new(0),
            invulnerable: Tracked::new(false),
            item_power: Tracked::new(0.0),
            gravity: 0.0,
            jumping: false,
            falling_far: false,
            invulnerability: Invulnerability::UntilBootUp,
            respawn_at: None,
            inventory_active: false,
            shots_hit: 0,
            weapons: weapon::default_arsenal(),
            weapon_slot: 0,
            intent: CmdIntent::default(),
            force_dirty: false,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.health.get() > 0
    }

    pub fn is_invulnerable(&self, now: Instant) -> bool {
        match self.invulnerability {
            Invulnerability::None => false,
            Invulnerability::Until(deadline) => now < deadline,
            Invulnerability::UntilBootUp => !self.booted,
        }
    }

    pub fn collider_size(&self) -> Vec3 {
        let height = if self.crouching.get() {
            PLAYER_CROUCH_HEIGHT
        } else {
            PLAYER_HEIGHT
        };
        Vec3::new(PLAYER_WIDTH, height, PLAYER_DEPTH)
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.position.get(), self.collider_size())
    }

    pub fn set_x(&mut self, x: f32) {
        let mut position = self.position.get();
        position.x = x;
        self.position.set(position);
    }

    pub fn set_y(&mut self, y: f32) {
        let mut position = self.position.get();
        position.y = y;
        self.position.set(position);
    }

    /// Applies incoming damage through armor and the protection window.
    /// Armor absorbs half of the inflicted amount, as far as it lasts.
    pub fn apply_damage(&mut self, amount: i32, now: Instant) -> DamageOutcome {
        if !self.is_alive() || amount <= 0 {
            return DamageOutcome::Ignored;
        }
        if self.is_invulnerable(now) {
            return DamageOutcome::Ignored;
        }
        let absorbed = (amount / 2).min(self.armor.get());
        self.armor.set(self.armor.get() - absorbed);
        let health = (self.health.get() - (amount - absorbed)).clamp(0, MAX_HEALTH);
        self.health.set(health);
        if health == 0 {
            DamageOutcome::Died
        } else {
            DamageOutcome::Hit
        }
    }

    /// Unconditional kill that bypasses armor and protection, used for
    /// world hazards. Returns true only on the live-to-dead edge so the
    /// caller cannot double-report a death.
    pub fn kill(&mut self) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health.set(0);
        true
    }

    pub fn heal(&mut self, amount: i32) {
        let health = (self.health.get() + amount).clamp(0, MAX_HEALTH);
        self.health.set(health);
    }

    pub fn add_armor(&mut self, amount: i32) {
        let armor = (self.armor.get() + amount).clamp(0, MAX_ARMOR);
        self.armor.set(armor);
    }

    pub fn current_weapon(&self) -> &Weapon {
        &self.weapons[self.weapon_slot]
    }

    pub fn current_weapon_mut(&mut self) -> &mut Weapon {
        &mut self.weapons[self.weapon_slot]
    }

    /// Switches to `slot` if it holds an available weapon.
    pub fn select_weapon(&mut self, slot: usize) -> bool {
        match self.weapons.get(slot) {
            Some(weapon) if weapon.available && slot != self.weapon_slot => {
                self.weapon_slot = slot;
                true
            }
            _ => false,
        }
    }

    pub fn record_shot(&mut self) {
        self.shots_fired.set(self.shots_fired.get() + 1);
        self.momentary_accuracy
            .set(self.momentary_accuracy.get() * MOMENTARY_DECAY);
        self.refresh_accuracy();
    }

    pub fn record_hit(&mut self) {
        self.shots_hit += 1;
        let boosted = (self.momentary_accuracy.get() + MOMENTARY_HIT_BOOST).min(1.0);
        self.momentary_accuracy.set(boosted);
        self.refresh_accuracy();
    }

    fn refresh_accuracy(&mut self) {
        let fired = self.shots_fired.get();
        let accuracy = if fired == 0 {
            0.0
        } else {
            self.shots_hit as f32 / fired as f32
        };
        self.accuracy.set(accuracy);
    }

    /// Puts the player back into play at `position` with full health and
    /// restocked weapons. Protection arming stays with the caller, which
    /// knows the configured window.
    pub fn spawn_at(&mut self, position: Vec3) {
        self.position.force(position);
        self.health.set(MAX_HEALTH);
        self.armor.set(0);
        self.on_ground.set(false);
        self.crouching.set(false);
        self.somersaulting.set(false);
        self.respawn_pending.set(false);
        self.gravity = 0.0;
        self.jumping = false;
        self.falling_far = false;
        self.respawn_at = None;
        self.awaiting_spawn = false;
        self.intent.fire = false;
        for weapon in &mut self.weapons {
            weapon.restock();
        }
        self.force_dirty = true;
    }

    /// Zeroes score counters, e.g. on round restart.
    pub fn reset_score(&mut self) {
        self.frags.set(0);
        self.deaths.set(0);
        self.suicides.set(0);
        self.shots_fired.set(0);
        self.shots_hit = 0;
        self.accuracy.set(0.0);
        self.momentary_accuracy.set(0.0);
    }

    pub fn is_dirty(&self) -> bool {
        self.force_dirty
            || self.position.is_dirty()
            || self.facing.is_dirty()
            || self.weapon_angle.is_dirty()
            || self.momentary_accuracy.is_dirty()
            || self.on_ground.is_dirty()
            || self.crouching.is_dirty()
            || self.somersaulting.is_dirty()
            || self.armor.is_dirty()
            || self.health.is_dirty()
            || self.respawn_pending.is_dirty()
            || self.frags.is_dirty()
            || self.deaths.is_dirty()
            || self.suicides.is_dirty()
            || self.accuracy.is_dirty()
            || self.shots_fired.is_dirty()
            || self.invulnerable.is_dirty()
            || self.item_power.is_dirty()
    }

    /// Folds every live value into its previous slot, marking fields
    /// that changed since the last commit. Runs once per tick; the
    /// dirty state survives until a send goes through.
    pub fn commit_snapshots(&mut self) {
        self.position.commit();
        self.facing.commit();
        self.weapon_angle.commit();
        self.momentary_accuracy.commit();
        self.on_ground.commit();
        self.crouching.commit();
        self.somersaulting.commit();
        self.armor.commit();
        self.health.commit();
        self.respawn_pending.commit();
        self.frags.commit();
        self.deaths.commit();
        self.suicides.commit();
        self.accuracy.commit();
        self.shots_fired.commit();
        self.invulnerable.commit();
        self.item_power.commit();
    }

    pub fn clear_dirty(&mut self) {
        self.position.clear_dirty();
        self.facing.clear_dirty();
        self.weapon_angle.clear_dirty();
        self.momentary_accuracy.clear_dirty();
        self.on_ground.clear_dirty();
        self.crouching.clear_dirty();
        self.somersaulting.clear_dirty();
        self.armor.clear_dirty();
        self.health.clear_dirty();
        self.respawn_pending.clear_dirty();
        self.frags.clear_dirty();
        self.deaths.clear_dirty();
        self.suicides.clear_dirty();
        self.accuracy.clear_dirty();
        self.shots_fired.clear_dirty();
        self.invulnerable.clear_dirty();
        self.item_power.clear_dirty();
        self.force_dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.force_dirty = true;
    }

    pub fn to_update(&self) -> PlayerUpdate {
        PlayerUpdate {
            position: self.position.get(),
            facing: self.facing.get(),
            weapon_angle: self.weapon_angle.get(),
            momentary_accuracy: self.momentary_accuracy.get(),
            on_ground: self.on_ground.get(),
            crouching: self.crouching.get(),
            somersaulting: self.somersaulting.get(),
            armor: self.armor.get(),
            health: self.health.get(),
            respawn_pending: self.respawn_pending.get(),
            frags: self.frags.get(),
            deaths: self.deaths.get(),
            suicides: self.suicides.get(),
            accuracy: self.accuracy.get(),
            shots_fired: self.shots_fired.get(),
            invulnerable: self.invulnerable.get(),
            item_power: self.item_power.get(),
        }
    }

    /// Adopts an authoritative snapshot on the mirroring side. The first
    /// update snaps the position without leaving an interpolation delta;
    /// later ones shift the previous value so rendering can blend.
    pub fn apply_update(&mut self, update: &PlayerUpdate) {
        if self.awaiting_spawn {
            self.position.force(update.position);
            self.awaiting_spawn = false;
        } else {
            self.position.commit();
            self.position.set(update.position);
        }
        self.facing.set(update.facing);
        self.weapon_angle.set(update.weapon_angle);
        self.momentary_accuracy.set(update.momentary_accuracy);
        self.on_ground.set(update.on_ground);
        self.crouching.set(update.crouching);
        self.somersaulting.set(update.somersaulting);
        self.armor.set(update.armor);
        self.health.set(update.health);
        self.respawn_pending.set(update.respawn_pending);
        self.frags.set(update.frags);
        self.deaths.set(update.deaths);
        self.suicides.set(update.suicides);
        self.accuracy.set(update.accuracy);
        self.shots_fired.set(update.shots_fired);
        self.invulnerable.set(update.invulnerable);
        self.item_power.set(update.item_power);
    }

    /// Position blended between the last two snapshots for rendering.
    pub fn render_position(&self, alpha: f32) -> Vec3 {
        self.position.previous().lerp(&self.position.get(), alpha)
    }
}

/// All known players, keyed by connection handle. Iteration order is the
/// handle order, which doubles as join order since handles are assigned
/// monotonically.
#[derive(Debug, Default)]
pub struct PlayerDirectory {
    players: BTreeMap<ConnectionHandle, Player>,
}

impl PlayerDirectory {
    pub fn new() -> Self {
        PlayerDirectory {
            players: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, player: Player) {
        debug_assert!(
            !self.players.contains_key(&player.handle),
            "handle {} inserted twice",
            player.handle
        );
        self.players.insert(player.handle, player);
    }

    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<Player> {
        self.players.remove(&handle)
    }

    pub fn contains(&self, handle: ConnectionHandle) -> bool {
        self.players.contains_key(&handle)
    }

    pub fn get(&self, handle: ConnectionHandle) -> Option<&Player> {
        self.players.get(&handle)
    }

    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Player> {
        self.players.get_mut(&handle)
    }

    /// Lookup that tolerates stale handles. Messages can refer to players
    /// that already left, so a miss is logged and swallowed rather than
    /// treated as an error.
    pub fn tolerant(&self, handle: ConnectionHandle) -> Option<&Player> {
        let found = self.players.get(&handle);
        if found.is_none() {
            debug!("no player for handle {} in the directory", handle);
        }
        found
    }

    /// Mutable variant of [`PlayerDirectory::tolerant`].
    pub fn tolerant_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Player> {
        if !self.players.contains_key(&handle) {
            debug!("no player for handle {} in the directory", handle);
            return None;
        }
        self.players.get_mut(&handle)
    }

    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.players.keys().copied().collect()
    }

    pub fn iter(&self) -> btree_map::Values<'_, ConnectionHandle, Player> {
        self.players.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, ConnectionHandle, Player> {
        self.players.values_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
