//! Client transport layer: UDP socket handling and the session loop.
//!
//! The client is headless and relentless: it connects, boots up with a
//! name, streams commands while mirroring the replication feed, and on
//! any kind of session loss schedules the next connect attempt instead
//! of giving up. Everything runs on one task; the socket future and the
//! local tick interleave through `select!`.

use crate::game::WorldView;
use crate::input::{CmdRelay, IntentSource};
use crate::observer::SessionObserver;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{ConnectionHandle, MenuAction, Packet, DEFAULT_PHYSICS_RATE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::interval;

/// The session is declared dead after this much server silence.
const SERVER_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the stage watchdog looks at deadlines.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Connection parameters, fixed for the lifetime of the client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub name: String,
    /// Preferred team, announced once after boot-up.
    pub team: Option<u8>,
    /// Keepalive floor for the command stream, in sends per second.
    pub cmd_rate: u32,
    pub reconnect_delay: Duration,
}

/// Where the session currently stands. Terminal conditions never stop
/// the client; they all lead back to [`Stage::Disconnected`] with a
/// retry deadline.
#[derive(Debug, Clone, Copy)]
enum Stage {
    /// Waiting out the delay before the next connect attempt.
    Disconnected { retry_at: Instant },
    /// Connect sent, waiting for our own setup record.
    Connecting { since: Instant },
    /// Name requested, waiting for the server to confirm it.
    AwaitingConfirm { since: Instant },
    /// Booted and exchanging state.
    Active { last_heard: Instant },
}

/// Headless game client: socket, session stage, the mirrored world and
/// the command relay feeding the server.
pub struct Client<P, O> {
    socket: UdpSocket,
    server_addr: SocketAddr,
    cfg: ClientConfig,
    stage: Stage,
    world: WorldView,
    relay: CmdRelay,
    pilot: P,
    observer: O,
}

impl<P: IntentSource, O: SessionObserver> Client<P, O> {
    pub async fn new(
        cfg: ClientConfig,
        pilot: P,
        observer: O,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = cfg.server_addr.parse()?;
        let relay = CmdRelay::new(cfg.cmd_rate);

        Ok(Client {
            socket,
            server_addr,
            stage: Stage::Disconnected {
                retry_at: Instant::now(),
            },
            world: WorldView::new(),
            relay,
            pilot,
            observer,
            cfg,
        })
    }

    /// Starts a fresh session: the mirror and the command stream reset,
    /// then the connect request goes out. The old view survives only
    /// until here, so a disconnected client keeps showing the last
    /// known world.
    async fn connect(&mut self) {
        info!("connecting to {}", self.server_addr);
        self.world = WorldView::new();
        self.relay.reset();

        let packet = Packet::Connect {
            protocol_version: PROTOCOL_VERSION,
        };
        if self.send_packet(&packet).await {
            self.stage = Stage::Connecting {
                since: Instant::now(),
            };
        } else {
            self.schedule_retry();
        }
    }

    async fn send_packet(&self, packet: &Packet) -> bool {
        let data = match serialize(packet) {
            Ok(data) => data,
            Err(e) => {
                warn!("failed to encode outbound packet: {}", e);
                return false;
            }
        };
        match self.socket.send_to(&data, self.server_addr).await {
            Ok(_) => true,
            Err(e) => {
                error!("failed to send to {}: {}", self.server_addr, e);
                false
            }
        }
    }

    fn schedule_retry(&mut self) {
        info!("next connect attempt in {:?}", self.cfg.reconnect_delay);
        self.stage = Stage::Disconnected {
            retry_at: Instant::now() + self.cfg.reconnect_delay,
        };
    }

    fn drop_session(&mut self, reason: &str) {
        warn!("session lost: {}", reason);
        self.schedule_retry();
    }

    /// Dispatches one inbound packet into the mirror, driving the boot
    /// handshake along the way.
    async fn handle_packet(&mut self, packet: Packet) {
        if let Stage::Active { last_heard } = &mut self.stage {
            *last_heard = Instant::now();
        }

        match packet {
            Packet::UserSetup {
                handle,
                is_own,
                addr,
                map_name,
            } => {
                self.world.setup_player(handle, is_own, &addr, &map_name);
                if is_own && matches!(self.stage, Stage::Connecting { .. }) {
                    info!("server granted {} on map {:?}", handle, map_name);
                    self.send_packet(&Packet::NameChange {
                        handle: ConnectionHandle::LOCAL,
                        name: self.cfg.name.clone(),
                        current_client: true,
                    })
                    .await;
                    self.stage = Stage::AwaitingConfirm {
                        since: Instant::now(),
                    };
                }
            }
            Packet::NameChange {
                handle,
                name,
                current_client,
            } => {
                self.world.set_name(handle, &name, &mut self.observer);
                if current_client && matches!(self.stage, Stage::AwaitingConfirm { .. }) {
                    // The confirmed name may differ from the requested
                    // one when it was already taken.
                    info!("joined as {:?}", name);
                    self.stage = Stage::Active {
                        last_heard: Instant::now(),
                    };
                    if let Some(team) = self.cfg.team {
                        self.send_packet(&Packet::InGameMenuCmd {
                            action: MenuAction::SelectTeam(team),
                        })
                        .await;
                    }
                }
            }
            Packet::UserUpdate { handle, update } => {
                self.world.apply_update(handle, &update, &mut self.observer);
            }
            Packet::BulletUpdate {
                id,
                owner,
                position,
                angle,
                size,
                delete,
            } => {
                self.world
                    .apply_bullet(id, owner, position, angle, size, delete, &mut self.observer);
            }
            Packet::WpnUpdate {
                weapon,
                available,
                mag,
                unmag,
            } => {
                self.world.apply_ammo(&weapon, available, mag, unmag);
            }
            Packet::CurrentWpnUpdate { handle, weapon, .. } => {
                self.world.set_current_weapon(handle, &weapon);
            }
            Packet::MapItemUpdate { item_id, taken } => {
                self.world.set_item_taken(item_id, taken);
            }
            Packet::PlayerEvent {
                subject,
                kind,
                int_arg,
                ..
            } => {
                self.world
                    .apply_event(subject, kind, int_arg, &mut self.observer);
            }
            Packet::DeathNotification { dead, killer } => {
                self.world.apply_death(dead, killer, &mut self.observer);
            }
            Packet::GameSessionState {
                session_ended,
                game_restarted,
            } => {
                self.world
                    .apply_session(session_ended, game_restarted, &mut self.observer);
            }
            Packet::PlayerLeft { handle } => {
                self.world.remove_player(handle, &mut self.observer);
            }
            Packet::Disconnected { reason } => {
                self.drop_session(&format!("server closed the session: {}", reason));
            }
            _ => {
                debug_assert!(false, "client-bound dispatch got a client->server packet");
                warn!("unexpected packet type from server");
            }
        }
    }

    /// One local tick: presentation state advances, and while booted the
    /// pilot is sampled into the command stream. The stream keeps going
    /// through intermissions; the server ignores the commands then but
    /// still counts them as signs of life.
    async fn on_local_tick(&mut self, now: Instant) {
        self.world.local_tick(DEFAULT_PHYSICS_RATE as f32);

        if matches!(self.stage, Stage::Active { .. }) {
            let intent = self.pilot.sample();
            if let Some(cmd) = self.relay.next_cmd(intent, now) {
                self.send_packet(&cmd).await;
            }
        }
    }

    /// Stage watchdog: fires due reconnects and drops sessions that
    /// stopped making progress.
    async fn poll_session(&mut self, now: Instant) {
        match self.stage {
            Stage::Disconnected { retry_at } => {
                if now >= retry_at {
                    self.connect().await;
                }
            }
            Stage::Connecting { since } | Stage::AwaitingConfirm { since } => {
                if now.duration_since(since) > SERVER_TIMEOUT {
                    self.drop_session("no answer from server");
                }
            }
            Stage::Active { last_heard } => {
                if now.duration_since(last_heard) > SERVER_TIMEOUT {
                    self.drop_session("server went silent");
                }
            }
        }
    }

    /// Main session loop. Returns after ctrl-c, announcing the departure
    /// when a session is up.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let mut tick_interval = interval(Duration::from_secs(1) / DEFAULT_PHYSICS_RATE);
        let mut poll_interval = interval(POLL_INTERVAL);
        let mut buffer = [0_u8; 2048];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, addr)) => {
                            if addr != self.server_addr {
                                debug!("datagram from stranger {}", addr);
                            } else {
                                match deserialize::<Packet>(&buffer[0..len]) {
                                    Ok(packet) => self.handle_packet(packet).await,
                                    Err(_) => warn!("undecodable packet from {}", addr),
                                }
                            }
                        }
                        Err(e) => {
                            error!("socket receive error: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }
                _ = tick_interval.tick() => {
                    self.on_local_tick(Instant::now()).await;
                }
                _ = poll_interval.tick() => {
                    self.poll_session(Instant::now()).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutting down");
                    break;
                }
            }
        }

        if !matches!(self.stage, Stage::Disconnected { .. }) {
            self.send_packet(&Packet::Disconnect).await;
        }
        Ok(())
    }
}
