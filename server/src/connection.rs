use log::{debug, info};
use shared::{CmdState, ConnectionHandle};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How far a connection has come since the first packet.
///
/// A connection is not a valid player until it reaches `Active`: the
/// directory entry exists earlier, but carries no confirmed name and no
/// authoritative state, and commands from it are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnStage {
    /// Connect packet seen, nothing answered yet.
    Connecting,
    /// Own setup sent; waiting for the name/boot-up handshake.
    SetupSent,
    /// Boot-up complete, participating in the game.
    Active,
}

/// Transport-side record of one remote participant.
///
/// Commands are buffered here between network arrival and tick
/// processing, kept ordered by sequence number so late packets slot into
/// place instead of being applied out of order.
#[derive(Debug)]
pub struct Connection {
    pub handle: ConnectionHandle,
    pub addr: SocketAddr,
    pub last_seen: Instant,
    pub stage: ConnStage,
    /// Pending commands sorted by sequence number.
    pending_cmds: Vec<CmdState>,
    /// Highest sequence number already handed to the simulation.
    pub last_cmd_seq: u32,
}

impl Connection {
    pub fn new(handle: ConnectionHandle, addr: SocketAddr) -> Self {
        Connection {
            handle,
            addr,
            last_seen: Instant::now(),
            stage: ConnStage::Connecting,
            pending_cmds: Vec::new(),
            last_cmd_seq: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Buffers a command at its sorted position. Stale sequences (already
    /// processed) and duplicates are dropped.
    pub fn queue_cmd(&mut self, cmd: CmdState) {
        self.touch();
        if cmd.sequence <= self.last_cmd_seq && self.last_cmd_seq != 0 {
            debug!(
                "dropping stale cmd {} from {} (already at {})",
                cmd.sequence, self.handle, self.last_cmd_seq
            );
            return;
        }
        match self
            .pending_cmds
            .binary_search_by_key(&cmd.sequence, |queued| queued.sequence)
        {
            Ok(_) => {}
            Err(pos) => self.pending_cmds.insert(pos, cmd),
        }
    }

    /// Hands all buffered commands to the caller in sequence order and
    /// remembers the highest sequence seen.
    pub fn take_cmds(&mut self) -> Vec<CmdState> {
        if let Some(last) = self.pending_cmds.last() {
            self.last_cmd_seq = last.sequence;
        }
        std::mem::take(&mut self.pending_cmds)
    }

    pub fn pending_len(&self) -> usize {
        self.pending_cmds.len()
    }
}

/// All live connections, keyed by handle. Handles are assigned
/// monotonically starting at 1; handle 0 stays reserved for the hosting
/// process and never appears here.
#[derive(Debug)]
pub struct ConnectionTable {
    connections: BTreeMap<ConnectionHandle, Connection>,
    next_handle: u32,
    max_connections: usize,
}

impl ConnectionTable {
    pub fn new(max_connections: usize) -> Self {
        ConnectionTable {
            connections: BTreeMap::new(),
            next_handle: 1,
            max_connections,
        }
    }

    /// Admits a new connection, or `None` when the table is full. The
    /// handle counter never rewinds, so handles of departed connections
    /// are not reused within a server run.
    pub fn add(&mut self, addr: SocketAddr) -> Option<ConnectionHandle> {
        if self.connections.len() >= self.max_connections {
            info!("connection from {} refused: server is full", addr);
            return None;
        }
        let handle = ConnectionHandle(self.next_handle);
        self.next_handle += 1;
        self.connections.insert(handle, Connection::new(handle, addr));
        Some(handle)
    }

    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<Connection> {
        self.connections.remove(&handle)
    }

    pub fn get(&self, handle: ConnectionHandle) -> Option<&Connection> {
        self.connections.get(&handle)
    }

    pub fn get_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Connection> {
        self.connections.get_mut(&handle)
    }

    pub fn handle_by_addr(&self, addr: SocketAddr) -> Option<ConnectionHandle> {
        self.connections
            .values()
            .find(|connection| connection.addr == addr)
            .map(|connection| connection.handle)
    }

    pub fn addr_of(&self, handle: ConnectionHandle) -> Option<SocketAddr> {
        self.connections.get(&handle).map(|connection| connection.addr)
    }

    pub fn mark_setup_sent(&mut self, handle: ConnectionHandle) {
        if let Some(connection) = self.connections.get_mut(&handle) {
            connection.stage = ConnStage::SetupSent;
        }
    }

    pub fn mark_active(&mut self, handle: ConnectionHandle) {
        if let Some(connection) = self.connections.get_mut(&handle) {
            connection.stage = ConnStage::Active;
        }
    }

    pub fn stage(&self, handle: ConnectionHandle) -> Option<ConnStage> {
        self.connections.get(&handle).map(|connection| connection.stage)
    }

    pub fn is_active(&self, handle: ConnectionHandle) -> bool {
        self.stage(handle) == Some(ConnStage::Active)
    }

    /// Buffers a command for the connection behind `addr`. Commands from
    /// connections that have not finished boot-up are dropped.
    pub fn queue_cmd(&mut self, addr: SocketAddr, cmd: CmdState) {
        let handle = match self.handle_by_addr(addr) {
            Some(handle) => handle,
            None => {
                debug!("cmd from unknown address {}", addr);
                return;
            }
        };
        match self.connections.get_mut(&handle) {
            Some(connection) if connection.stage == ConnStage::Active => {
                connection.queue_cmd(cmd)
            }
            Some(connection) => {
                connection.touch();
                debug!("cmd from {} before boot-up, dropped", handle);
            }
            None => {}
        }
    }

    /// Collects every connection's buffered commands, in handle order.
    pub fn drain_cmds(&mut self) -> Vec<(ConnectionHandle, Vec<CmdState>)> {
        let mut drained = Vec::new();
        for (handle, connection) in self.connections.iter_mut() {
            if connection.pending_len() > 0 {
                drained.push((*handle, connection.take_cmds()));
            }
        }
        drained
    }

    /// Refreshes the liveness timestamp for whatever connection sits
    /// behind `addr`.
    pub fn touch(&mut self, addr: SocketAddr) {
        if let Some(handle) = self.handle_by_addr(addr) {
            if let Some(connection) = self.connections.get_mut(&handle) {
                connection.touch();
            }
        }
    }

    /// Returns the handles of connections silent for longer than
    /// `timeout`. The caller decides what to do with them.
    pub fn check_timeouts(&self, now: Instant, timeout: Duration) -> Vec<ConnectionHandle> {
        self.connections
            .values()
            .filter(|connection| now.saturating_duration_since(connection.last_seen) > timeout)
            .map(|connection| connection.handle)
            .collect()
    }

    /// Addresses that should receive replication traffic: everything
    /// past the initial handshake, including clients still typing their
    /// name, so their world mirror stays warm.
    pub fn replication_addrs(&self) -> Vec<SocketAddr> {
        self.connections
            .values()
            .filter(|connection| connection.stage != ConnStage::Connecting)
            .map(|connection| connection.addr)
            .collect()
    }

    pub fn replication_addrs_except(&self, skip: ConnectionHandle) -> Vec<SocketAddr> {
        self.connections
            .values()
            .filter(|connection| {
                connection.stage != ConnStage::Connecting && connection.handle != skip
            })
            .map(|connection| connection.addr)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
