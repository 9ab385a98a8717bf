//! Server transport layer: UDP socket handling and the session loop.
//!
//! One reader task forwards datagrams into a channel, one sender task
//! drains the outbound queue; everything else runs on the main task so
//! packet dispatch and tick execution interleave but never overlap.

use crate::connection::ConnectionTable;
use crate::game::{Outbox, SimConfig, World};
use crate::replication::{self, Decimator, PacketSink};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    CmdState, ConnectionHandle, GameMode, GameModeConfig, Map, MenuAction, Packet,
    PlayerEventKind, TickClock, MAX_CATCHUP_TICKS, PROTOCOL_VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Connections silent for this long are swept out.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Messages from the network tasks to the main loop.
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Outbound work handed to the sender task. Recipients are resolved
/// before queueing, so the task needs no view of the connection table.
#[derive(Debug)]
pub enum GameMessage {
    Send {
        data: Vec<u8>,
        addr: SocketAddr,
    },
    Broadcast {
        data: Vec<u8>,
        addrs: Vec<SocketAddr>,
    },
}

/// Live [`PacketSink`]: encodes once and queues datagrams on the sender
/// task. Borrowed fresh from the server each time replication runs.
pub struct NetSink<'a> {
    conns: &'a ConnectionTable,
    game_tx: &'a mpsc::UnboundedSender<GameMessage>,
}

impl<'a> NetSink<'a> {
    pub fn new(
        conns: &'a ConnectionTable,
        game_tx: &'a mpsc::UnboundedSender<GameMessage>,
    ) -> Self {
        NetSink { conns, game_tx }
    }

    fn encode(packet: &Packet) -> Option<Vec<u8>> {
        match serialize(packet) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("failed to encode outbound packet: {}", e);
                None
            }
        }
    }

    fn queue(&self, message: GameMessage) -> bool {
        if self.game_tx.send(message).is_err() {
            error!("sender task is gone, dropping outbound packet");
            return false;
        }
        true
    }
}

impl PacketSink for NetSink<'_> {
    fn send_to(&mut self, target: ConnectionHandle, packet: &Packet) -> bool {
        let addr = match self.conns.addr_of(target) {
            Some(addr) => addr,
            None => {
                debug!("no endpoint for {}, targeted packet dropped", target);
                return false;
            }
        };
        match Self::encode(packet) {
            Some(data) => self.queue(GameMessage::Send { data, addr }),
            None => false,
        }
    }

    fn broadcast(&mut self, packet: &Packet) -> bool {
        let addrs = self.conns.replication_addrs();
        if addrs.is_empty() {
            return true;
        }
        match Self::encode(packet) {
            Some(data) => self.queue(GameMessage::Broadcast { data, addrs }),
            None => false,
        }
    }

    fn broadcast_except(&mut self, skip: ConnectionHandle, packet: &Packet) -> bool {
        let addrs = self.conns.replication_addrs_except(skip);
        if addrs.is_empty() {
            return true;
        }
        match Self::encode(packet) {
            Some(data) => self.queue(GameMessage::Broadcast { data, addrs }),
            None => false,
        }
    }
}

/// Authoritative game server: socket, connection table, world and the
/// channels wiring the network tasks to the session loop.
pub struct Server {
    socket: Arc<UdpSocket>,
    conns: ConnectionTable,
    world: World,
    sim: SimConfig,
    outbox: Outbox,
    clock: TickClock,
    decimator: Decimator,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        bind_addr: &str,
        max_clients: usize,
        sim: SimConfig,
        mode_cfg: GameModeConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        info!("listening on {}", socket.local_addr()?);

        let now = Instant::now();
        let world = World::new(Map::demo_arena(), GameMode::new(mode_cfg, now));
        info!(
            "hosting map {:?} at {} ticks/s ({} snapshot/s)",
            world.map.name, sim.tick_rate, sim.client_update_rate
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let clock = TickClock::new(sim.tick_rate, now);
        let decimator = Decimator::new(sim.tick_rate, sim.client_update_rate);

        Ok(Server {
            socket,
            conns: ConnectionTable::new(max_clients),
            world,
            sim,
            outbox: Outbox::new(),
            clock,
            decimator,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    /// The address the socket actually bound, for callers that asked
    /// for port zero.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns the task that forwards inbound datagrams to the main loop.
    fn spawn_reader(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0_u8; 2048];
            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[0..len]) {
                        Ok(packet) => {
                            if server_tx
                                .send(ServerMessage::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(_) => warn!("undecodable packet from {}", addr),
                    },
                    Err(e) => {
                        error!("socket receive error: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that drains the outbound queue onto the socket.
    fn spawn_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::Send { data, addr } => {
                        if let Err(e) = socket.send_to(&data, addr).await {
                            error!("failed to send to {}: {}", addr, e);
                        }
                    }
                    GameMessage::Broadcast { data, addrs } => {
                        for addr in addrs {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("failed to send to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    fn send_to_addr(&self, packet: &Packet, addr: SocketAddr) {
        match serialize(packet) {
            Ok(data) => {
                if self.game_tx.send(GameMessage::Send { data, addr }).is_err() {
                    error!("sender task gone while queueing packet for {}", addr);
                }
            }
            Err(e) => warn!("failed to encode packet for {}: {}", addr, e),
        }
    }

    /// Dispatches one inbound packet. Runs on the main task, between
    /// ticks, so handlers mutate world and table without locking.
    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { protocol_version } => self.handle_connect(addr, protocol_version),
            Packet::UserCmd { .. } => {
                if let Some(cmd) = CmdState::from_packet(&packet) {
                    self.conns.queue_cmd(addr, cmd);
                }
            }
            Packet::NameChange { name, .. } => self.handle_name_change(addr, &name),
            Packet::InGameMenuCmd { action } => self.handle_menu_cmd(addr, action),
            Packet::Disconnect => {
                if let Some(handle) = self.conns.handle_by_addr(addr) {
                    self.teardown(handle, "disconnect requested");
                }
            }
            _ => {
                debug_assert!(false, "server-bound dispatch got a server->client packet");
                warn!("unexpected packet type from {}", addr);
            }
        }
    }

    fn handle_connect(&mut self, addr: SocketAddr, protocol_version: u32) {
        info!("connect from {} (protocol {})", addr, protocol_version);

        if protocol_version != PROTOCOL_VERSION {
            let refusal = Packet::Disconnected {
                reason: format!(
                    "protocol version {} not supported, server runs {}",
                    protocol_version, PROTOCOL_VERSION
                ),
            };
            self.send_to_addr(&refusal, addr);
            return;
        }

        // A fresh Connect from a known endpoint replaces the old session.
        if let Some(existing) = self.conns.handle_by_addr(addr) {
            info!("replacing stale session {} from {}", existing, addr);
            self.teardown(existing, "reconnected");
        }

        let handle = match self.conns.add(addr) {
            Some(handle) => handle,
            None => {
                self.send_to_addr(
                    &Packet::Disconnected {
                        reason: "server is full".to_string(),
                    },
                    addr,
                );
                return;
            }
        };

        self.world.add_player(handle, &addr.to_string());
        self.send_to_addr(
            &Packet::UserSetup {
                handle,
                is_own: true,
                addr: addr.to_string(),
                map_name: self.world.map.name.clone(),
            },
            addr,
        );

        let mut sink = NetSink::new(&self.conns, &self.game_tx);
        replication::replay_world(&self.world, handle, &mut sink);
        self.conns.mark_setup_sent(handle);
    }

    fn handle_name_change(&mut self, addr: SocketAddr, requested: &str) {
        let handle = match self.conns.handle_by_addr(addr) {
            Some(handle) => handle,
            None => {
                debug!("name change from unknown address {}", addr);
                return;
            }
        };
        let trimmed = requested.trim();
        if trimmed.is_empty() {
            debug!("empty name from {}, ignored", handle);
            return;
        }

        let booted = self
            .world
            .players
            .get(handle)
            .map(|player| player.booted)
            .unwrap_or(false);
        if booted {
            let unchanged = self
                .world
                .players
                .get(handle)
                .map(|player| player.name == trimmed)
                .unwrap_or(false);
            if unchanged {
                return;
            }
        }

        let name = self.world.unique_name(trimmed);
        if booted {
            // Plain rename after boot-up.
            if let Some(player) = self.world.players.get_mut(handle) {
                player.name = name.clone();
            }
            self.world.refresh_mode_row(handle);
            info!("{} renamed to {:?}", handle, name);
        } else {
            if !self.world.confirm_player(handle, &name, Instant::now(), &self.sim) {
                return;
            }
            self.conns.mark_active(handle);
        }

        self.send_to_addr(
            &Packet::NameChange {
                handle,
                name: name.clone(),
                current_client: true,
            },
            addr,
        );

        // Everyone else learns of the newcomer (or just the new name).
        let mut sink = NetSink::new(&self.conns, &self.game_tx);
        if !booted {
            sink.broadcast_except(
                handle,
                &Packet::UserSetup {
                    handle,
                    is_own: false,
                    addr: addr.to_string(),
                    map_name: self.world.map.name.clone(),
                },
            );
        }
        sink.broadcast_except(
            handle,
            &Packet::NameChange {
                handle,
                name,
                current_client: false,
            },
        );
        if !booted {
            if let Some(player) = self.world.players.get(handle) {
                sink.broadcast_except(
                    handle,
                    &Packet::UserUpdate {
                        handle,
                        update: player.to_update(),
                    },
                );
                let weapon = player.current_weapon();
                sink.broadcast_except(
                    handle,
                    &Packet::CurrentWpnUpdate {
                        handle,
                        weapon: weapon.spec.name.to_string(),
                        state: weapon.state(),
                    },
                );
            }
        }
    }

    fn handle_menu_cmd(&mut self, addr: SocketAddr, action: MenuAction) {
        let handle = match self.conns.handle_by_addr(addr) {
            Some(handle) => handle,
            None => return,
        };
        if !self.conns.is_active(handle) {
            debug!("menu command from {} before boot-up", handle);
            return;
        }
        match action {
            MenuAction::SelectTeam(team) => {
                if let Some(player) = self.world.players.get_mut(handle) {
                    if player.team != team {
                        player.team = team;
                        info!("{} selected team {}", handle, team);
                        self.outbox.event(
                            handle,
                            PlayerEventKind::TeamChanged,
                            Some(i32::from(team)),
                            None,
                            None,
                        );
                    }
                }
            }
            MenuAction::ToggleInventoryItem => {
                if let Some(player) = self.world.players.get_mut(handle) {
                    if player.inventory_active {
                        player.inventory_active = false;
                        self.outbox
                            .event(handle, PlayerEventKind::InventoryToggle, Some(0), None, None);
                    } else if player.item_power.get() > 0.0 {
                        player.inventory_active = true;
                        self.outbox
                            .event(handle, PlayerEventKind::InventoryToggle, Some(1), None, None);
                    }
                }
            }
        }
    }

    /// Removes a connection and its player, announcing the departure.
    fn teardown(&mut self, handle: ConnectionHandle, reason: &str) {
        if let Some(connection) = self.conns.remove(handle) {
            info!("{} ({}) gone: {}", handle, connection.addr, reason);
        }
        if self.world.remove_player(handle) {
            let mut sink = NetSink::new(&self.conns, &self.game_tx);
            sink.broadcast(&Packet::PlayerLeft { handle });
        }
    }

    fn sweep_timeouts(&mut self, now: Instant) {
        for handle in self.conns.check_timeouts(now, CONNECTION_TIMEOUT) {
            self.teardown(handle, "timed out");
        }
    }

    /// Runs every tick the clock owes, then replicates.
    fn run_due_ticks(&mut self, now: Instant) {
        let batch = self.clock.due(now);
        if batch.dropped_backlog {
            warn!(
                "tick backlog exceeded {}, skipping the remainder",
                MAX_CATCHUP_TICKS
            );
        }
        for _ in 0..batch.ticks {
            self.run_game_tick(Instant::now());
        }
    }

    fn run_game_tick(&mut self, now: Instant) {
        for (handle, cmds) in self.conns.drain_cmds() {
            self.world.apply_commands(handle, cmds, now, &mut self.outbox);
        }
        self.world.run_tick(now, &self.sim, &mut self.outbox);

        let due = self.decimator.tick();
        let mut sink = NetSink::new(&self.conns, &self.game_tx);
        replication::replicate(&mut self.world, &mut self.outbox, due, &mut sink);
        replication::commit_snapshots(&mut self.world);

        let report_every = u64::from(self.sim.tick_rate.max(1)) * 10;
        if self.world.tick % report_every == 0 && !self.conns.is_empty() {
            debug!(
                "tick {}: {} connections, {} players, {} bullets in flight",
                self.world.tick,
                self.conns.len(),
                self.world.players.len(),
                self.world.bullets.len()
            );
        }
    }

    /// Main session loop: inbound packets, tick execution and the
    /// timeout sweep, interleaved on one task.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_reader();
        self.spawn_sender();

        let mut tick_interval = interval(self.clock.interval());
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_interval = interval(Duration::from_secs(1));

        info!("server ready");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("server shutting down");
                            break;
                        }
                    }
                }
                _ = tick_interval.tick() => {
                    self.run_due_ticks(Instant::now());
                }
                _ = sweep_interval.tick() => {
                    self.sweep_timeouts(Instant::now());
                }
            }
        }

        Ok(())
    }
}
