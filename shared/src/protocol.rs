use crate::math::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Current protocol version, bumped on incompatible packet changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Identifier for one network participant.
///
/// Handle 0 is reserved for the hosting process itself; remote
/// connections are numbered from 1. The same handle is never assigned
/// twice within one server run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ConnectionHandle(pub u32);

impl ConnectionHandle {
    pub const LOCAL: ConnectionHandle = ConnectionHandle(0);

    pub fn is_local(&self) -> bool {
        *self == Self::LOCAL
    }
}

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Weapon readiness as shown to other clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponState {
    Ready,
    Reloading,
    Empty,
}

/// Discrete things that happen to a player and are worth announcing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerEventKind {
    FallingFromHigh,
    Landed,
    ItemTaken,
    ItemRespawned,
    InventoryToggle,
    Jumppad,
    TeamChanged,
    ExplosionMultiKill,
}

/// Actions issued from the in-game menu rather than the movement keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuAction {
    SelectTeam(u8),
    ToggleInventoryItem,
}

/// Full positional and status snapshot for one player, sent whenever the
/// player is dirty and its decimation turn comes up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerUpdate {
    pub position: Vec3,
    pub facing: Vec3,
    pub weapon_angle: f32,
    pub momentary_accuracy: f32,
    pub on_ground: bool,
    pub crouching: bool,
    pub somersaulting: bool,
    pub armor: i32,
    pub health: i32,
    pub respawn_pending: bool,
    pub frags: i32,
    pub deaths: u32,
    pub suicides: u32,
    pub accuracy: f32,
    pub shots_fired: u32,
    pub invulnerable: bool,
    pub item_power: f32,
}

/// Network packet types for client-server communication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    // Connection bring-up and teardown.
    Connect {
        protocol_version: u32,
    },
    Disconnect,
    Disconnected {
        reason: String,
    },
    PlayerLeft {
        handle: ConnectionHandle,
    },

    // Server to client replication.
    UserSetup {
        handle: ConnectionHandle,
        is_own: bool,
        addr: String,
        map_name: String,
    },
    UserUpdate {
        handle: ConnectionHandle,
        update: PlayerUpdate,
    },
    BulletUpdate {
        id: u32,
        owner: ConnectionHandle,
        position: Vec3,
        angle: Vec3,
        size: Vec3,
        delete: bool,
    },
    WpnUpdate {
        weapon: String,
        available: bool,
        mag: u16,
        unmag: u16,
    },
    CurrentWpnUpdate {
        handle: ConnectionHandle,
        weapon: String,
        state: WeaponState,
    },
    MapItemUpdate {
        item_id: u16,
        taken: bool,
    },
    PlayerEvent {
        subject: ConnectionHandle,
        kind: PlayerEventKind,
        int_arg: Option<i32>,
        float_arg: Option<f32>,
        text_arg: Option<String>,
    },
    DeathNotification {
        dead: ConnectionHandle,
        killer: ConnectionHandle,
    },
    GameSessionState {
        session_ended: bool,
        game_restarted: bool,
    },

    // Client to server.
    UserCmd {
        sequence: u32,
        timestamp: u64,
        move_left: bool,
        move_right: bool,
        jump: bool,
        crouch: bool,
        fire: bool,
        aim_angle: f32,
        switch_slot: Option<u8>,
    },
    NameChange {
        handle: ConnectionHandle,
        name: String,
        current_client: bool,
    },
    InGameMenuCmd {
        action: MenuAction,
    },
}

/// Command fields as queued on the server between arrival and tick
/// processing, kept sorted by sequence number.
#[derive(Debug, Clone, PartialEq)]
pub struct CmdState {
    pub sequence: u32,
    pub timestamp: u64,
    pub move_left: bool,
    pub move_right: bool,
    pub jump: bool,
    pub crouch: bool,
    pub fire: bool,
    pub aim_angle: f32,
    pub switch_slot: Option<u8>,
}

impl CmdState {
    pub fn from_packet(packet: &Packet) -> Option<CmdState> {
        match packet {
            Packet::UserCmd {
                sequence,
                timestamp,
                move_left,
                move_right,
                jump,
                crouch,
                fire,
                aim_angle,
                switch_slot,
            } => Some(CmdState {
                sequence: *sequence,
                timestamp: *timestamp,
                move_left: *move_left,
                move_right: *move_right,
                jump: *jump,
                crouch: *crouch,
                fire: *fire,
                aim_angle: *aim_angle,
                switch_slot: *switch_slot,
            }),
            _ => None,
        }
    }
}
