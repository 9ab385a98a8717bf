use crate::{combat, lifecycle, physics};
use log::info;
use shared::map::MapItemKind;
use shared::weapon::{self, Weapon};
use shared::{
    Bullet, CmdState, ConnectionHandle, Explosion, GameMode, Map, Player, PlayerDirectory,
    PlayerEventKind, SpawnPolicy, Vec3, WeaponState, JUMP_GRAVITY, MAX_ARMOR, MAX_HEALTH,
};
use std::time::{Duration, Instant};

/// Simulation tuning shared by every per-tick stage.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub tick_rate: u32,
    pub physics_rate: u32,
    pub client_update_rate: u32,
    pub respawn_delay: Duration,
    /// Post-spawn protection window. Zero disables the timed window, in
    /// which case only the pre-boot-up protection applies.
    pub invulnerable: Duration,
    pub spawn_policy: SpawnPolicy,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            tick_rate: shared::DEFAULT_TICK_RATE,
            physics_rate: shared::DEFAULT_PHYSICS_RATE,
            client_update_rate: shared::DEFAULT_CLIENT_UPDATE_RATE,
            respawn_delay: Duration::from_secs(3),
            invulnerable: Duration::from_secs(3),
            spawn_policy: SpawnPolicy::Random,
        }
    }
}

/// One outbound notification produced by a tick stage. The replication
/// layer turns these into packets after the simulation settles, so the
/// stages themselves never touch the network.
#[derive(Debug, Clone, PartialEq)]
pub enum OutEvent {
    Death {
        dead: ConnectionHandle,
        killer: ConnectionHandle,
    },
    Event {
        subject: ConnectionHandle,
        kind: PlayerEventKind,
        int_arg: Option<i32>,
        float_arg: Option<f32>,
        text_arg: Option<String>,
    },
    BulletGone {
        id: u32,
        owner: ConnectionHandle,
        position: Vec3,
        angle: Vec3,
        size: Vec3,
    },
    /// Ammunition state change, delivered to the owner only.
    WpnDelta {
        owner: ConnectionHandle,
        weapon: String,
        available: bool,
        mag: u16,
        unmag: u16,
    },
    CurrentWpn {
        owner: ConnectionHandle,
        weapon: String,
        state: WeaponState,
    },
    ItemState {
        item_id: u16,
        taken: bool,
    },
    Session {
        session_ended: bool,
        game_restarted: bool,
    },
}

/// Staging area for everything a tick wants to announce.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<OutEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Outbox { events: Vec::new() }
    }

    pub fn death(&mut self, dead: ConnectionHandle, killer: ConnectionHandle) {
        self.events.push(OutEvent::Death { dead, killer });
    }

    pub fn event(
        &mut self,
        subject: ConnectionHandle,
        kind: PlayerEventKind,
        int_arg: Option<i32>,
        float_arg: Option<f32>,
        text_arg: Option<String>,
    ) {
        self.events.push(OutEvent::Event {
            subject,
            kind,
            int_arg,
            float_arg,
            text_arg,
        });
    }

    pub fn bullet_gone(&mut self, bullet: &Bullet) {
        self.events.push(OutEvent::BulletGone {
            id: bullet.id,
            owner: bullet.owner,
            position: bullet.position,
            angle: bullet.angle,
            size: bullet.size,
        });
    }

    pub fn wpn_delta(&mut self, owner: ConnectionHandle, weapon: &Weapon) {
        self.events.push(OutEvent::WpnDelta {
            owner,
            weapon: weapon.spec.name.to_string(),
            available: weapon.available,
            mag: weapon.mag,
            unmag: weapon.unmag,
        });
    }

    pub fn current_wpn(&mut self, owner: ConnectionHandle, weapon: &Weapon) {
        self.events.push(OutEvent::CurrentWpn {
            owner,
            weapon: weapon.spec.name.to_string(),
            state: weapon.state(),
        });
    }

    pub fn item_state(&mut self, item_id: u16, taken: bool) {
        self.events.push(OutEvent::ItemState { item_id, taken });
    }

    pub fn session(&mut self, session_ended: bool, game_restarted: bool) {
        self.events.push(OutEvent::Session {
            session_ended,
            game_restarted,
        });
    }

    pub fn drain(&mut self) -> Vec<OutEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[OutEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Authoritative game state. Owned by the session driver and passed by
/// reference into the per-tick stages.
#[derive(Debug)]
pub struct World {
    pub map: Map,
    pub players: PlayerDirectory,
    pub bullets: Vec<Bullet>,
    pub explosions: Vec<Explosion>,
    pub mode: GameMode,
    pub tick: u64,
    /// Gameplay freezes while true; cleared by the round restart.
    pub round_over: bool,
    pub next_bullet_id: u32,
    pub next_explosion_id: u32,
}

impl World {
    pub fn new(map: Map, mode: GameMode) -> Self {
        World {
            map,
            players: PlayerDirectory::new(),
            bullets: Vec::new(),
            explosions: Vec::new(),
            mode,
            tick: 0,
            round_over: false,
            next_bullet_id: 0,
            next_explosion_id: 0,
        }
    }

    /// Creates the half-initialized directory entry for a fresh
    /// connection. The player stays out of play, protected and without
    /// a name, until boot-up confirms it.
    pub fn add_player(&mut self, handle: ConnectionHandle, addr: &str) {
        let mut player = Player::new(handle, "");
        player.addr = addr.to_string();
        info!("added player {} from {}", handle, addr);
        self.players.insert(player);
    }

    /// Completes boot-up: assigns the confirmed name and puts the player
    /// into play. Returns false when the handle is unknown.
    pub fn confirm_player(
        &mut self,
        handle: ConnectionHandle,
        name: &str,
        now: Instant,
        cfg: &SimConfig,
    ) -> bool {
        match self.players.get_mut(handle) {
            Some(player) => {
                player.name = name.to_string();
                player.booted = true;
            }
            None => return false,
        }
        lifecycle::respawn(self, handle, now, cfg);
        self.refresh_mode_row(handle);
        info!("player {} booted up as {:?}", handle, name);
        true
    }

    pub fn remove_player(&mut self, handle: ConnectionHandle) -> bool {
        self.mode.remove_player(handle);
        let removed = self.players.remove(handle).is_some();
        if removed {
            info!("removed player {}", handle);
        }
        removed
    }

    /// Deduplicates a requested name against the directory.
    pub fn unique_name(&self, requested: &str) -> String {
        let mut name = requested.to_string();
        let mut suffix = 2;
        while self.players.iter().any(|player| player.name == name) {
            name = format!("{} ({})", requested, suffix);
            suffix += 1;
        }
        name
    }

    /// Pushes one player's current counters into the frag table.
    pub fn refresh_mode_row(&mut self, handle: ConnectionHandle) {
        let row = self
            .players
            .get(handle)
            .filter(|player| player.booted)
            .map(|player| (player.name.clone(), player.frags.get(), player.deaths.get()));
        if let Some((name, frags, deaths)) = row {
            self.mode.update_player_data(handle, &name, frags, deaths);
        }
    }

    /// Applies one connection's buffered commands in sequence order.
    /// Movement intents persist until the next command; jump, weapon
    /// switches and fire act immediately.
    pub fn apply_commands(
        &mut self,
        handle: ConnectionHandle,
        cmds: Vec<CmdState>,
        now: Instant,
        outbox: &mut Outbox,
    ) {
        if self.round_over {
            return;
        }
        for cmd in cmds {
            let (fire, switch) = {
                let player = match self.players.tolerant_mut(handle) {
                    Some(player) => player,
                    None => return,
                };
                if !player.booted || !player.is_alive() || player.awaiting_spawn {
                    continue;
                }
                player.intent.aim_angle = cmd.aim_angle;
                player.weapon_angle.set(cmd.aim_angle);
                player.facing.set(Vec3::new(0.0, 0.0, cmd.aim_angle));
                player.intent.move_dir = (cmd.move_right as i32 - cmd.move_left as i32) as f32;
                player.intent.crouch = cmd.crouch;
                player.intent.fire = cmd.fire;
                if cmd.jump {
                    if player.on_ground.get() && !player.jumping {
                        player.jumping = true;
                        player.gravity = JUMP_GRAVITY;
                        player.on_ground.set(false);
                    } else if player.jumping && !player.somersaulting.get() {
                        player.somersaulting.set(true);
                    }
                }
                (cmd.fire, cmd.switch_slot)
            };
            if let Some(slot) = switch {
                let switched = self
                    .players
                    .get_mut(handle)
                    .map(|player| player.select_weapon(slot as usize))
                    .unwrap_or(false);
                if switched {
                    if let Some(player) = self.players.get(handle) {
                        outbox.current_wpn(handle, player.current_weapon());
                    }
                }
            }
            if fire {
                combat::try_fire(self, handle, now, outbox);
            }
        }
    }

    /// Item layer: hands out effects on overlap and brings taken items
    /// back once their delay runs out.
    pub fn update_items(&mut self, now: Instant, outbox: &mut Outbox) {
        if self.round_over {
            return;
        }
        let World { map, players, .. } = self;
        for item in &mut map.items {
            if item.taken {
                if item.ready_to_respawn(now) {
                    item.respawn();
                    outbox.item_state(item.id, false);
                    outbox.event(
                        ConnectionHandle::LOCAL,
                        PlayerEventKind::ItemRespawned,
                        Some(i32::from(item.id)),
                        None,
                        None,
                    );
                }
                continue;
            }
            let item_box = item.aabb();
            let mut taker = None;
            for player in players.iter_mut() {
                if !player.is_alive() || player.awaiting_spawn {
                    continue;
                }
                if !player.aabb().overlaps_2d(&item_box) {
                    continue;
                }
                if !item_eligible(item.kind, player) {
                    continue;
                }
                apply_item(item.kind, player, outbox);
                taker = Some(player.handle);
                break;
            }
            if let Some(handle) = taker {
                item.take(now);
                outbox.item_state(item.id, true);
                outbox.event(
                    handle,
                    PlayerEventKind::ItemTaken,
                    Some(i32::from(item.id)),
                    None,
                    None,
                );
            }
        }
    }

    /// Win detection and the post-round restart.
    pub fn update_mode(&mut self, now: Instant, cfg: &SimConfig, outbox: &mut Outbox) {
        if !self.round_over {
            if self.mode.take_just_won(now) {
                self.round_over = true;
                outbox.session(true, false);
                info!(
                    "round over after {:?}; restart in {:?}",
                    self.mode.elapsed_since_reset(now),
                    self.mode.config().restart_cooldown
                );
            }
        } else if self.mode.due_for_restart(now) {
            self.restart_round(now, cfg, outbox);
        }
    }

    /// Fresh round: scores and positions reset, items restored, event
    /// state cleared on every client via the restart flag.
    pub fn restart_round(&mut self, now: Instant, cfg: &SimConfig, outbox: &mut Outbox) {
        info!("restarting round");
        for bullet in std::mem::take(&mut self.bullets) {
            outbox.bullet_gone(&bullet);
        }
        self.explosions.clear();
        self.next_bullet_id = 0;
        self.next_explosion_id = 0;
        for item in &mut self.map.items {
            if item.taken {
                item.respawn();
                outbox.item_state(item.id, false);
            }
        }
        self.mode.reset(now);
        for handle in self.players.handles() {
            let booted = self
                .players
                .get(handle)
                .map(|player| player.booted)
                .unwrap_or(false);
            if !booted {
                continue;
            }
            if let Some(player) = self.players.get_mut(handle) {
                player.reset_score();
            }
            lifecycle::respawn(self, handle, now, cfg);
            self.refresh_mode_row(handle);
        }
        self.round_over = false;
        outbox.session(false, true);
    }

    /// One full simulation tick: commands were already applied, physics
    /// and combat run at the physics rate, then the once-per-tick layers
    /// follow. Replication and the snapshot commit run afterwards, from
    /// the session driver.
    pub fn run_tick(&mut self, now: Instant, cfg: &SimConfig, outbox: &mut Outbox) {
        let substeps = (cfg.physics_rate / cfg.tick_rate.max(1)).max(1);
        let rate = (cfg.tick_rate * substeps) as f32;
        for _ in 0..substeps {
            physics::apply_movement(self, rate);
            let fall_deaths = physics::integrate_gravity(self, rate, outbox);
            for handle in fall_deaths {
                let edge = self
                    .players
                    .get_mut(handle)
                    .map(|player| player.kill())
                    .unwrap_or(false);
                if edge {
                    lifecycle::on_death(self, handle, handle, now, cfg, outbox, true);
                }
            }
            physics::resolve_wall_collisions(self, outbox);
            combat::update_bullets(self, rate, now, cfg, outbox);
            combat::update_explosions(self, rate);
        }
        self.update_items(now, outbox);
        lifecycle::update(self, now, cfg, outbox);
        self.update_mode(now, cfg, outbox);
        self.tick += 1;
    }
}

fn item_eligible(kind: MapItemKind, player: &Player) -> bool {
    match kind {
        MapItemKind::HealthPack => player.health.get() < MAX_HEALTH,
        MapItemKind::ArmorVest => player.armor.get() < MAX_ARMOR,
        MapItemKind::WeaponCrate => player.weapons.iter().any(|w| {
            w.spec.name == weapon::LAUNCHER.name && (!w.available || w.unmag < w.spec.reserve)
        }),
        MapItemKind::PowerCell => player.item_power.get() < 1.0,
    }
}

fn apply_item(kind: MapItemKind, player: &mut Player, outbox: &mut Outbox) {
    match kind {
        MapItemKind::HealthPack => player.heal(25),
        MapItemKind::ArmorVest => player.add_armor(50),
        MapItemKind::WeaponCrate => {
            let handle = player.handle;
            if let Some(launcher) = player
                .weapons
                .iter_mut()
                .find(|w| w.spec.name == weapon::LAUNCHER.name)
            {
                launcher.available = true;
                launcher.add_reserve(launcher.spec.mag_size);
                outbox.wpn_delta(handle, launcher);
            }
        }
        MapItemKind::PowerCell => player.item_power.set(1.0),
    }
}
