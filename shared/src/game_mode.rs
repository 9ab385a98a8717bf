use crate::protocol::ConnectionHandle;
use std::time::{Duration, Instant};

/// Tunable limits for a deathmatch round. A limit of zero disables that
/// condition; with both disabled the round runs forever.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameModeConfig {
    pub frag_limit: u32,
    pub time_limit: Duration,
    pub restart_cooldown: Duration,
    pub team_based: bool,
}

impl Default for GameModeConfig {
    fn default() -> Self {
        GameModeConfig {
            frag_limit: 20,
            time_limit: Duration::ZERO,
            restart_cooldown: Duration::from_secs(60),
            team_based: false,
        }
    }
}

/// One scoreboard line.
#[derive(Debug, Clone, PartialEq)]
pub struct FragRow {
    pub handle: ConnectionHandle,
    pub name: String,
    pub frags: i32,
    pub deaths: u32,
}

/// Orders rows by frags descending, deaths ascending. The sort is stable,
/// so re-sorting unchanged input never reshuffles ties.
pub fn sort_rows(rows: &mut [FragRow]) {
    rows.sort_by(|a, b| b.frags.cmp(&a.frags).then(a.deaths.cmp(&b.deaths)));
}

/// Round state for deathmatch: the frag table plus win and restart
/// timing. The win time latches on first detection and stays put until
/// the round is reset.
#[derive(Debug)]
pub struct GameMode {
    config: GameModeConfig,
    rows: Vec<FragRow>,
    reset_at: Instant,
    win_time: Option<Instant>,
    was_won: bool,
}

impl GameMode {
    pub fn new(config: GameModeConfig, now: Instant) -> Self {
        GameMode {
            config,
            rows: Vec::new(),
            reset_at: now,
            win_time: None,
            was_won: false,
        }
    }

    pub fn config(&self) -> &GameModeConfig {
        &self.config
    }

    pub fn is_team_based(&self) -> bool {
        self.config.team_based
    }

    pub fn rows(&self) -> &[FragRow] {
        &self.rows
    }

    pub fn win_time(&self) -> Option<Instant> {
        self.win_time
    }

    pub fn elapsed_since_reset(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.reset_at)
    }

    /// Inserts or refreshes one player's line, then re-sorts the table.
    pub fn update_player_data(
        &mut self,
        handle: ConnectionHandle,
        name: &str,
        frags: i32,
        deaths: u32,
    ) {
        match self.rows.iter_mut().find(|row| row.handle == handle) {
            Some(row) => {
                row.name = name.to_string();
                row.frags = frags;
                row.deaths = deaths;
            }
            None => self.rows.push(FragRow {
                handle,
                name: name.to_string(),
                frags,
                deaths,
            }),
        }
        sort_rows(&mut self.rows);
    }

    pub fn remove_player(&mut self, handle: ConnectionHandle) {
        self.rows.retain(|row| row.handle != handle);
    }

    /// Whether the round is decided. Safe to call every tick: the first
    /// detection latches the win time, later calls just report the
    /// standing result without touching it.
    pub fn check_winning_conditions(&mut self, now: Instant) -> bool {
        let time_up = self.config.time_limit > Duration::ZERO
            && self.elapsed_since_reset(now) >= self.config.time_limit;
        let frags_reached = self.config.frag_limit > 0
            && self
                .rows
                .first()
                .map(|row| row.frags >= self.config.frag_limit as i32)
                .unwrap_or(false);

        if time_up || frags_reached {
            if self.win_time.is_none() {
                self.win_time = Some(now);
            }
            true
        } else {
            false
        }
    }

    /// Edge detector over [`GameMode::check_winning_conditions`]: true
    /// only on the tick the round first becomes decided.
    pub fn take_just_won(&mut self, now: Instant) -> bool {
        let won = self.check_winning_conditions(now);
        let edge = won && !self.was_won;
        self.was_won = won;
        edge
    }

    /// Whether the post-round cooldown has run out.
    pub fn due_for_restart(&self, now: Instant) -> bool {
        match self.win_time {
            Some(at) => now.saturating_duration_since(at) >= self.config.restart_cooldown,
            None => false,
        }
    }

    /// Re-arms the table for a fresh round: counters to zero, win state
    /// cleared, round clock restarted.
    pub fn reset(&mut self, now: Instant) {
        for row in &mut self.rows {
            row.frags = 0;
            row.deaths = 0;
        }
        self.reset_at = now;
        self.win_time = None;
        self.was_won = false;
    }
}
