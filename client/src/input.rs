//! Command sampling and the outgoing command stream.
//!
//! Whatever steers the client, a scripted pilot or a real input device,
//! reduces to an [`Intent`] per local tick. The [`CmdRelay`] turns that
//! stream into sequenced `UserCmd` packets: a changed intent goes out
//! immediately, an unchanged one is repeated at the keepalive rate so
//! the server keeps seeing a live connection.

use shared::Packet;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// What the pilot wants at one sampling instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Intent {
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    pub crouch: bool,
    pub fire: bool,
    pub aim_angle: f32,
    /// Weapon slot to switch to, on the tick the switch is wanted.
    pub switch_slot: Option<u8>,
}

/// Source of steering decisions, sampled once per local tick.
pub trait IntentSource {
    fn sample(&mut self) -> Intent;
}

/// Turns sampled intents into the outgoing command stream.
pub struct CmdRelay {
    next_sequence: u32,
    last_intent: Intent,
    last_sent: Option<Instant>,
    keepalive: Duration,
}

impl CmdRelay {
    pub fn new(cmd_rate: u32) -> Self {
        CmdRelay {
            next_sequence: 1,
            last_intent: Intent::default(),
            last_sent: None,
            keepalive: Duration::from_secs_f64(1.0 / cmd_rate.max(1) as f64),
        }
    }

    /// The next command to send, if any. The first sample always sends;
    /// afterwards a send happens on any intent change and at least once
    /// per keepalive interval. The server drops stale sequence numbers,
    /// so the counter only moves when a packet is actually produced.
    pub fn next_cmd(&mut self, intent: Intent, now: Instant) -> Option<Packet> {
        let due = match self.last_sent {
            Some(at) => now.duration_since(at) >= self.keepalive,
            None => true,
        };
        if intent != self.last_intent || due {
            let packet = Packet::UserCmd {
                sequence: self.next_sequence,
                timestamp: unix_millis(),
                move_left: intent.move_left,
                move_right: intent.move_right,
                jump: intent.jump,
                crouch: intent.crouch,
                fire: intent.fire,
                aim_angle: intent.aim_angle,
                switch_slot: intent.switch_slot,
            };
            self.next_sequence += 1;
            self.last_intent = intent;
            self.last_sent = Some(now);
            Some(packet)
        } else {
            None
        }
    }

    /// Restarts the stream for a fresh connection. Sequence filtering on
    /// the server is per connection, so a reconnect starts over at one.
    pub fn reset(&mut self) {
        self.next_sequence = 1;
        self.last_intent = Intent::default();
        self.last_sent = None;
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
