//! Client-side mirror of the authoritative world.
//!
//! Player state is adopted wholesale from server snapshots whenever they
//! arrive. Between snapshots the mirror advances only what it can move
//! safely on its own, which is bullet travel and explosion decay; players
//! interpolate between their last two snapshots instead. The presentation
//! layer learns about anything audible or listable through the
//! [`SessionObserver`] passed into the message handlers.

use crate::observer::{SessionObserver, SoundCue};
use log::{debug, warn};
use shared::{
    sort_rows, Bullet, ConnectionHandle, Explosion, FragRow, Map, MapItem, MapItemKind, Player,
    PlayerDirectory, PlayerEventKind, PlayerUpdate, Vec3, WeaponSpec,
};

/// Everything the client knows about the session, rebuilt from scratch
/// on every (re)connect.
pub struct WorldView {
    pub map: Map,
    pub players: PlayerDirectory,
    pub bullets: Vec<Bullet>,
    pub explosions: Vec<Explosion>,
    /// Our own handle, learned from the first `UserSetup`.
    pub own: Option<ConnectionHandle>,
    /// True between a round-over announcement and the restart.
    pub session_ended: bool,
    next_explosion_id: u32,
}

impl WorldView {
    pub fn new() -> Self {
        WorldView {
            map: Map::demo_arena(),
            players: PlayerDirectory::new(),
            bullets: Vec::new(),
            explosions: Vec::new(),
            own: None,
            session_ended: false,
            next_explosion_id: 0,
        }
    }

    /// `UserSetup`: creates the directory entry for a player the server
    /// announced, or records which entry is ours. Map files are not
    /// loaded from disk, so a foreign map name falls back to the
    /// built-in arena geometry.
    pub fn setup_player(
        &mut self,
        handle: ConnectionHandle,
        is_own: bool,
        addr: &str,
        map_name: &str,
    ) {
        if is_own {
            self.own = Some(handle);
            if map_name != self.map.name {
                warn!(
                    "server plays {:?}, only {:?} is built in",
                    map_name, self.map.name
                );
            }
        }
        if !self.players.contains(handle) {
            let mut player = Player::new(handle, "");
            player.addr = addr.to_string();
            self.players.insert(player);
        }
    }

    /// `NameChange`: the first name doubles as the join announcement,
    /// later ones are renames.
    pub fn set_name(
        &mut self,
        handle: ConnectionHandle,
        name: &str,
        observer: &mut dyn SessionObserver,
    ) {
        if let Some(player) = self.players.tolerant_mut(handle) {
            if player.name.is_empty() {
                observer.event_line(&format!("{} joined the game", name));
            } else if player.name != name {
                observer.event_line(&format!("{} is now known as {}", player.name, name));
            }
            player.name = name.to_string();
        }
    }

    /// Adopts one authoritative player snapshot. Edges on the local
    /// player's alive and respawn-wait flags drive the HUD callbacks.
    pub fn apply_update(
        &mut self,
        handle: ConnectionHandle,
        update: &PlayerUpdate,
        observer: &mut dyn SessionObserver,
    ) {
        let own = self.own == Some(handle);
        if let Some(player) = self.players.tolerant_mut(handle) {
            let was_alive = player.is_alive();
            let was_waiting = player.respawn_pending.get();
            player.apply_update(update);
            if own {
                if player.is_alive() != was_alive {
                    observer.crosshair_hidden(!player.is_alive());
                }
                if player.respawn_pending.get() != was_waiting {
                    observer.respawn_countdown(player.respawn_pending.get());
                }
            }
        }
    }

    /// `PlayerLeft`: drops the directory entry. Bullets the leaver owned
    /// stay in flight, matching the server.
    pub fn remove_player(&mut self, handle: ConnectionHandle, observer: &mut dyn SessionObserver) {
        if let Some(player) = self.players.remove(handle) {
            if !player.name.is_empty() {
                observer.event_line(&format!("{} left the game", player.name));
            }
        }
    }

    /// `BulletUpdate`: upserts a live bullet or retires it. The wire
    /// record carries no ballistics, so a first sighting borrows speed
    /// and payload from the owner's current weapon. Wrong only across a
    /// weapon switch in the same tick, and then only for presentation.
    pub fn apply_bullet(
        &mut self,
        id: u32,
        owner: ConnectionHandle,
        position: Vec3,
        angle: Vec3,
        size: Vec3,
        delete: bool,
        observer: &mut dyn SessionObserver,
    ) {
        if delete {
            let blast = match self.bullets.iter().position(|bullet| bullet.id == id) {
                Some(index) => self.bullets.remove(index).blast,
                // Never sighted, or already culled locally; judge the
                // payload from the owner's weapon instead.
                None => self.owner_spec(owner).and_then(|spec| spec.blast),
            };
            match blast {
                Some(blast) => {
                    self.explosions.push(Explosion::new(
                        self.next_explosion_id,
                        owner,
                        position,
                        blast.damage_area,
                    ));
                    self.next_explosion_id += 1;
                    observer.sound_at(SoundCue::Explosion, position);
                }
                None => observer.sound_at(SoundCue::Impact, position),
            }
            return;
        }

        match self.bullets.iter_mut().find(|bullet| bullet.id == id) {
            Some(bullet) => {
                bullet.position = position;
                bullet.angle = angle;
            }
            None => {
                let spec = self.owner_spec(owner);
                self.bullets.push(Bullet {
                    id,
                    owner,
                    position,
                    angle,
                    size,
                    damage: spec.map(|spec| spec.damage).unwrap_or(0),
                    speed: spec.map(|spec| spec.bullet_speed).unwrap_or(0.0),
                    blast: spec.and_then(|spec| spec.blast),
                });
                observer.sound_at(SoundCue::Shot, position);
            }
        }
    }

    /// `CurrentWpnUpdate`: which weapon a player is holding.
    pub fn set_current_weapon(&mut self, handle: ConnectionHandle, weapon: &str) {
        if let Some(player) = self.players.tolerant_mut(handle) {
            match player.weapons.iter().position(|w| w.spec.name == weapon) {
                Some(slot) => player.weapon_slot = slot,
                None => debug!("{} holds unknown weapon {:?}", handle, weapon),
            }
        }
    }

    /// `WpnUpdate`: ammunition totals for one of our own weapons. The
    /// server targets these at the owner only, so they always concern
    /// the local player.
    pub fn apply_ammo(&mut self, weapon: &str, available: bool, mag: u16, unmag: u16) {
        let own = match self.own {
            Some(own) => own,
            None => return,
        };
        if let Some(player) = self.players.tolerant_mut(own) {
            match player.weapons.iter_mut().find(|w| w.spec.name == weapon) {
                Some(w) => {
                    w.available = available;
                    w.mag = mag;
                    w.unmag = unmag;
                }
                None => debug!("ammo update for unknown weapon {:?}", weapon),
            }
        }
    }

    /// `MapItemUpdate`: flips the presentational taken flag.
    pub fn set_item_taken(&mut self, item_id: u16, taken: bool) {
        match self.map.item_mut(item_id) {
            Some(item) => item.taken = taken,
            None => debug!("item state for unknown id {}", item_id),
        }
    }

    /// `PlayerEvent`: sounds and lister lines. Events can refer to a
    /// player who left between sends; those fall through quietly.
    pub fn apply_event(
        &mut self,
        subject: ConnectionHandle,
        kind: PlayerEventKind,
        int_arg: Option<i32>,
        observer: &mut dyn SessionObserver,
    ) {
        match kind {
            PlayerEventKind::FallingFromHigh => {
                if let Some(position) = self.position_of(subject) {
                    observer.sound_at(SoundCue::Falling, position);
                }
            }
            PlayerEventKind::Landed => {
                if let Some(position) = self.position_of(subject) {
                    observer.sound_at(SoundCue::Landed, position);
                }
            }
            PlayerEventKind::ItemTaken => {
                if let Some(item) = self.item_by_arg(int_arg) {
                    let position = item.position;
                    let label = item_label(item.kind);
                    observer.sound_at(SoundCue::ItemTaken, position);
                    observer.event_line(&format!("{} took the {}", self.name_of(subject), label));
                }
            }
            PlayerEventKind::ItemRespawned => {
                if let Some(item) = self.item_by_arg(int_arg) {
                    observer.sound_at(SoundCue::ItemRespawned, item.position);
                }
            }
            PlayerEventKind::InventoryToggle => {
                let active = int_arg == Some(1);
                if let Some(player) = self.players.tolerant_mut(subject) {
                    player.inventory_active = active;
                }
                if self.own == Some(subject) {
                    observer.event_line(if active {
                        "power cell engaged"
                    } else {
                        "power cell off"
                    });
                }
            }
            PlayerEventKind::Jumppad => {
                if let Some(position) = self.position_of(subject) {
                    observer.sound_at(SoundCue::Jumppad, position);
                }
            }
            PlayerEventKind::TeamChanged => {
                if let Some(team) = int_arg {
                    if let Some(player) = self.players.tolerant_mut(subject) {
                        player.team = team as u8;
                    }
                    observer.event_line(&format!("{} joined team {}", self.name_of(subject), team));
                }
            }
            PlayerEventKind::ExplosionMultiKill => {
                if let Some(count) = int_arg {
                    observer.event_line(&format!(
                        "{} took out {} players with one shot",
                        self.name_of(subject),
                        count
                    ));
                }
            }
        }
    }

    /// `DeathNotification`: the frag line plus the death cue. Score
    /// counters arrive separately with the next snapshots.
    pub fn apply_death(
        &mut self,
        dead: ConnectionHandle,
        killer: ConnectionHandle,
        observer: &mut dyn SessionObserver,
    ) {
        if let Some(position) = self.position_of(dead) {
            observer.sound_at(SoundCue::Death, position);
        }
        let line = if dead == killer {
            format!("{} died", self.name_of(dead))
        } else {
            format!(
                "{} was fragged by {}",
                self.name_of(dead),
                self.name_of(killer)
            )
        };
        observer.event_line(&line);
    }

    /// `GameSessionState`: latches the intermission on a win and wipes
    /// the volatile layers on a restart. Bullet deletes and item resets
    /// are broadcast around the restart too, but datagrams reorder, so
    /// the wipe does not rely on them.
    pub fn apply_session(
        &mut self,
        session_ended: bool,
        game_restarted: bool,
        observer: &mut dyn SessionObserver,
    ) {
        if session_ended && !self.session_ended {
            self.session_ended = true;
            match self.scoreboard().first() {
                Some(row) => observer.event_line(&format!("round over, {} wins", row.name)),
                None => observer.event_line("round over"),
            }
        }
        if game_restarted {
            self.session_ended = false;
            self.bullets.clear();
            self.explosions.clear();
            self.next_explosion_id = 0;
            for item in &mut self.map.items {
                item.taken = false;
            }
            observer.event_line("new round");
        }
    }

    /// One presentation tick: bullets fly on their borrowed ballistics
    /// and are culled against the local geometry, explosions fade. The
    /// authoritative delete record may arrive before or after the local
    /// cull; both orders converge on the same state.
    pub fn local_tick(&mut self, physics_rate_hz: f32) {
        let WorldView {
            map,
            bullets,
            explosions,
            ..
        } = self;
        let bounds = map.bullet_bounds();
        bullets.retain_mut(|bullet| {
            bullet.advance(physics_rate_hz);
            if !bounds.contains_2d(bullet.position) {
                return false;
            }
            let aabb = bullet.aabb();
            !map.blocks.iter().any(|block| block.aabb.overlaps_2d(&aabb))
        });
        explosions.retain_mut(|explosion| !explosion.update(physics_rate_hz));
    }

    /// Frag table over every named player, ordered the way the server
    /// orders its own.
    pub fn scoreboard(&self) -> Vec<FragRow> {
        let mut rows: Vec<FragRow> = self
            .players
            .iter()
            .filter(|player| !player.name.is_empty())
            .map(|player| FragRow {
                handle: player.handle,
                name: player.name.clone(),
                frags: player.frags.get(),
                deaths: player.deaths.get(),
            })
            .collect();
        sort_rows(&mut rows);
        rows
    }

    fn position_of(&self, handle: ConnectionHandle) -> Option<Vec3> {
        self.players
            .tolerant(handle)
            .map(|player| player.position.get())
    }

    fn item_by_arg(&self, int_arg: Option<i32>) -> Option<&MapItem> {
        int_arg.and_then(|id| self.map.item(id as u16))
    }

    /// Display name, falling back to the handle for players we never
    /// learned a name for.
    fn name_of(&self, handle: ConnectionHandle) -> String {
        match self.players.get(handle) {
            Some(player) if !player.name.is_empty() => player.name.clone(),
            _ => handle.to_string(),
        }
    }

    /// Ballistics guess for a bullet first seen in flight: whatever its
    /// owner currently holds.
    fn owner_spec(&self, owner: ConnectionHandle) -> Option<&'static WeaponSpec> {
        self.players
            .get(owner)
            .map(|player| player.current_weapon().spec)
    }
}

impl Default for WorldView {
    fn default() -> Self {
        Self::new()
    }
}

fn item_label(kind: MapItemKind) -> &'static str {
    match kind {
        MapItemKind::HealthPack => "health pack",
        MapItemKind::ArmorVest => "armor vest",
        MapItemKind::WeaponCrate => "weapon crate",
        MapItemKind::PowerCell => "power cell",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::weapon::{LAUNCHER, RIFLE};

    #[derive(Default)]
    struct RecordingObserver {
        cues: Vec<(SoundCue, Vec3)>,
        lines: Vec<String>,
        crosshair: Vec<bool>,
        countdown: Vec<bool>,
    }

    impl SessionObserver for RecordingObserver {
        fn sound_at(&mut self, cue: SoundCue, position: Vec3) {
            self.cues.push((cue, position));
        }

        fn respawn_countdown(&mut self, waiting: bool) {
            self.countdown.push(waiting);
        }

        fn crosshair_hidden(&mut self, hidden: bool) {
            self.crosshair.push(hidden);
        }

        fn event_line(&mut self, line: &str) {
            self.lines.push(line.to_string());
        }
    }

    fn snapshot(x: f32, health: i32) -> PlayerUpdate {
        PlayerUpdate {
            position: Vec3::new(x, 5.0, 0.0),
            facing: Vec3::ZERO,
            weapon_angle: 0.0,
            momentary_accuracy: 0.0,
            on_ground: true,
            crouching: false,
            somersaulting: false,
            armor: 0,
            health,
            respawn_pending: health == 0,
            frags: 0,
            deaths: 0,
            suicides: 0,
            accuracy: 0.0,
            shots_fired: 0,
            invulnerable: false,
            item_power: 0.0,
        }
    }

    fn view_with(names: &[(u32, &str)]) -> WorldView {
        let mut view = WorldView::new();
        let mut observer = RecordingObserver::default();
        for (id, name) in names {
            let handle = ConnectionHandle(*id);
            view.setup_player(handle, false, "127.0.0.1:9000", "arena.map");
            view.set_name(handle, name, &mut observer);
            view.apply_update(handle, &snapshot(5.0, 100), &mut observer);
        }
        view
    }

    #[test]
    fn test_first_name_announces_join_later_ones_rename() {
        let mut view = WorldView::new();
        let mut observer = RecordingObserver::default();
        let handle = ConnectionHandle(1);

        view.setup_player(handle, false, "127.0.0.1:9000", "arena.map");
        view.set_name(handle, "alpha", &mut observer);
        view.set_name(handle, "bravo", &mut observer);

        assert_eq!(
            observer.lines,
            vec!["alpha joined the game", "alpha is now known as bravo"]
        );
        assert_eq!(view.players.get(handle).unwrap().name, "bravo");
    }

    #[test]
    fn test_own_death_and_respawn_drive_hud_callbacks() {
        let mut view = WorldView::new();
        let mut observer = RecordingObserver::default();
        let handle = ConnectionHandle(1);
        view.setup_player(handle, true, "127.0.0.1:9000", "arena.map");

        view.apply_update(handle, &snapshot(5.0, 100), &mut observer);
        view.apply_update(handle, &snapshot(5.0, 0), &mut observer);
        view.apply_update(handle, &snapshot(8.0, 100), &mut observer);

        // Spawn, death, respawn.
        assert_eq!(observer.crosshair, vec![false, true, false]);
        assert_eq!(observer.countdown, vec![true, false]);
    }

    #[test]
    fn test_other_players_never_touch_the_hud() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();

        view.apply_update(ConnectionHandle(1), &snapshot(5.0, 0), &mut observer);

        assert!(observer.crosshair.is_empty());
        assert!(observer.countdown.is_empty());
    }

    #[test]
    fn test_new_bullet_borrows_owner_ballistics() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();

        view.apply_bullet(
            0,
            ConnectionHandle(1),
            Vec3::new(5.0, 7.0, 0.0),
            Vec3::ZERO,
            RIFLE.bullet_size,
            false,
            &mut observer,
        );

        assert_eq!(view.bullets.len(), 1);
        assert_eq!(view.bullets[0].speed, RIFLE.bullet_speed);
        assert_eq!(view.bullets[0].damage, RIFLE.damage);
        assert!(matches!(observer.cues.as_slice(), [(SoundCue::Shot, _)]));
    }

    #[test]
    fn test_refresh_moves_known_bullet_without_new_cue() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();
        view.apply_bullet(
            0,
            ConnectionHandle(1),
            Vec3::new(5.0, 7.0, 0.0),
            Vec3::ZERO,
            RIFLE.bullet_size,
            false,
            &mut observer,
        );

        let moved = Vec3::new(6.0, 7.0, 0.0);
        view.apply_bullet(
            0,
            ConnectionHandle(1),
            moved,
            Vec3::ZERO,
            RIFLE.bullet_size,
            false,
            &mut observer,
        );

        assert_eq!(view.bullets.len(), 1);
        assert_eq!(view.bullets[0].position, moved);
        assert_eq!(observer.cues.len(), 1);
    }

    #[test]
    fn test_bullets_advance_between_refreshes() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();
        view.apply_bullet(
            0,
            ConnectionHandle(1),
            Vec3::new(5.0, 7.0, 0.0),
            Vec3::ZERO,
            RIFLE.bullet_size,
            false,
            &mut observer,
        );

        view.local_tick(60.0);

        let expected = 5.0 + RIFLE.bullet_speed / 60.0;
        assert!((view.bullets[0].position.x - expected).abs() < 1e-4);
    }

    #[test]
    fn test_delete_record_retires_bullet_with_impact_cue() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();
        let position = Vec3::new(5.0, 7.0, 0.0);
        view.apply_bullet(
            0,
            ConnectionHandle(1),
            position,
            Vec3::ZERO,
            RIFLE.bullet_size,
            false,
            &mut observer,
        );

        view.apply_bullet(
            0,
            ConnectionHandle(1),
            position,
            Vec3::ZERO,
            RIFLE.bullet_size,
            true,
            &mut observer,
        );

        assert!(view.bullets.is_empty());
        assert!(view.explosions.is_empty());
        assert!(matches!(observer.cues.last(), Some((SoundCue::Impact, _))));
    }

    #[test]
    fn test_launcher_delete_spawns_local_explosion() {
        let mut view = view_with(&[(1, "alpha")]);
        view.set_current_weapon(ConnectionHandle(1), LAUNCHER.name);
        let mut observer = RecordingObserver::default();

        // Delete record for a shell we never saw in flight.
        let position = Vec3::new(9.0, 3.0, 0.0);
        view.apply_bullet(
            4,
            ConnectionHandle(1),
            position,
            Vec3::ZERO,
            LAUNCHER.bullet_size,
            true,
            &mut observer,
        );

        assert_eq!(view.explosions.len(), 1);
        assert_eq!(view.explosions[0].position, position);
        assert!(matches!(
            observer.cues.last(),
            Some((SoundCue::Explosion, _))
        ));
    }

    #[test]
    fn test_explosions_fade_out() {
        let mut view = view_with(&[(1, "alpha")]);
        view.explosions
            .push(Explosion::new(0, ConnectionHandle(1), Vec3::ZERO, 3.0));

        let mut ticks = 0;
        while !view.explosions.is_empty() {
            view.local_tick(60.0);
            ticks += 1;
            assert!(ticks < 1000, "explosion never faded");
        }
    }

    #[test]
    fn test_local_cull_against_walls_and_bounds() {
        let mut view = view_with(&[(1, "alpha")]);

        // One bullet inside the ground row, one far outside the relaxed
        // bounds, one safely in the air.
        let mut bullet = Bullet {
            id: 0,
            owner: ConnectionHandle(1),
            position: Vec3::new(5.0, 0.5, 0.0),
            angle: Vec3::ZERO,
            size: RIFLE.bullet_size,
            damage: 0,
            speed: 0.0,
            blast: None,
        };
        view.bullets.push(bullet.clone());
        bullet.id = 1;
        bullet.position = Vec3::new(-40.0, 7.0, 0.0);
        view.bullets.push(bullet.clone());
        bullet.id = 2;
        bullet.position = Vec3::new(5.0, 7.0, 0.0);
        view.bullets.push(bullet);

        view.local_tick(60.0);

        let survivors: Vec<u32> = view.bullets.iter().map(|bullet| bullet.id).collect();
        assert_eq!(survivors, vec![2]);
    }

    #[test]
    fn test_item_taken_cues_at_item_and_names_taker() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();

        view.apply_event(
            ConnectionHandle(1),
            PlayerEventKind::ItemTaken,
            Some(0),
            &mut observer,
        );

        let expected = view.map.items[0].position;
        assert_eq!(observer.cues, vec![(SoundCue::ItemTaken, expected)]);
        assert_eq!(observer.lines, vec!["alpha took the health pack"]);
    }

    #[test]
    fn test_inventory_toggle_mirrors_flag_and_lines_own_only() {
        let mut view = view_with(&[(1, "alpha"), (2, "beta")]);
        view.own = Some(ConnectionHandle(1));
        let mut observer = RecordingObserver::default();

        view.apply_event(
            ConnectionHandle(2),
            PlayerEventKind::InventoryToggle,
            Some(1),
            &mut observer,
        );
        assert!(view.players.get(ConnectionHandle(2)).unwrap().inventory_active);
        assert!(observer.lines.is_empty());

        view.apply_event(
            ConnectionHandle(1),
            PlayerEventKind::InventoryToggle,
            Some(1),
            &mut observer,
        );
        assert_eq!(observer.lines, vec!["power cell engaged"]);
    }

    #[test]
    fn test_team_change_updates_mirror() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();

        view.apply_event(
            ConnectionHandle(1),
            PlayerEventKind::TeamChanged,
            Some(2),
            &mut observer,
        );

        assert_eq!(view.players.get(ConnectionHandle(1)).unwrap().team, 2);
        assert_eq!(observer.lines, vec!["alpha joined team 2"]);
    }

    #[test]
    fn test_death_lines_distinguish_suicides() {
        let mut view = view_with(&[(1, "alpha"), (2, "beta")]);
        let mut observer = RecordingObserver::default();

        view.apply_death(ConnectionHandle(1), ConnectionHandle(2), &mut observer);
        view.apply_death(ConnectionHandle(2), ConnectionHandle(2), &mut observer);

        assert_eq!(
            observer.lines,
            vec!["alpha was fragged by beta", "beta died"]
        );
    }

    #[test]
    fn test_unknown_handles_are_tolerated() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();
        let ghost = ConnectionHandle(9);

        view.apply_update(ghost, &snapshot(1.0, 100), &mut observer);
        view.set_current_weapon(ghost, RIFLE.name);
        view.apply_event(ghost, PlayerEventKind::Jumppad, None, &mut observer);
        view.apply_death(ghost, ghost, &mut observer);
        view.remove_player(ghost, &mut observer);

        // The death line still prints, with the handle standing in for
        // the name.
        assert_eq!(observer.lines, vec!["#9 died"]);
        assert!(observer.cues.is_empty());
    }

    #[test]
    fn test_ammo_update_targets_own_weapon() {
        let mut view = view_with(&[(1, "alpha")]);
        view.own = Some(ConnectionHandle(1));

        view.apply_ammo(RIFLE.name, true, 3, 12);

        let player = view.players.get(ConnectionHandle(1)).unwrap();
        let rifle = player
            .weapons
            .iter()
            .find(|w| w.spec.name == RIFLE.name)
            .unwrap();
        assert_eq!(rifle.mag, 3);
        assert_eq!(rifle.unmag, 12);
    }

    #[test]
    fn test_scoreboard_orders_like_the_server() {
        let mut view = view_with(&[(1, "low"), (2, "high"), (3, "unnamed")]);
        view.players
            .get_mut(ConnectionHandle(1))
            .unwrap()
            .frags
            .set(2);
        view.players
            .get_mut(ConnectionHandle(2))
            .unwrap()
            .frags
            .set(7);
        view.players.get_mut(ConnectionHandle(3)).unwrap().name = String::new();

        let rows = view.scoreboard();
        let names: Vec<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["high", "low"]);
    }

    #[test]
    fn test_round_over_latches_and_restart_wipes() {
        let mut view = view_with(&[(1, "alpha")]);
        let mut observer = RecordingObserver::default();
        view.bullets.push(Bullet {
            id: 0,
            owner: ConnectionHandle(1),
            position: Vec3::new(5.0, 7.0, 0.0),
            angle: Vec3::ZERO,
            size: RIFLE.bullet_size,
            damage: 0,
            speed: 0.0,
            blast: None,
        });
        view.map.items[0].taken = true;

        view.apply_session(true, false, &mut observer);
        view.apply_session(true, false, &mut observer);
        assert!(view.session_ended);
        assert_eq!(observer.lines, vec!["round over, alpha wins"]);

        view.apply_session(false, true, &mut observer);
        assert!(!view.session_ended);
        assert!(view.bullets.is_empty());
        assert!(!view.map.items[0].taken);
        assert_eq!(observer.lines.last().map(String::as_str), Some("new round"));
    }
}
