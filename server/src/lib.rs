//! # Game Server Library
//!
//! Authoritative simulation core for the multiplayer arena shooter. The
//! server owns the only real copy of the world: every player, bullet,
//! item and score lives here, advances at a fixed tick rate, and is
//! replicated outward as deltas. Clients send commands and render what
//! they are told; nothing a client claims about its own state is
//! trusted.
//!
//! ## Tick Pipeline
//!
//! Every tick runs the same stage order:
//!
//! 1. Drain buffered commands per connection, in sequence order
//! 2. Physics substeps: movement, gravity integration, wall resolution
//! 3. Combat: bullet flight, hits, explosions
//! 4. Items, lifecycle (respawns, protection, reload watch), win poll
//! 5. Replication: queued events, the bullet stream, decimated dirty
//!    player snapshots
//! 6. Snapshot commit, making this tick the baseline the next tick's
//!    change detection compares against
//!
//! ## Module Organization
//!
//! - [`connection`]: transport-side table of live connections, command
//!   buffering and timeout bookkeeping
//! - [`game`]: the [`game::World`] aggregate, the tick driver and the
//!   outbox collecting what a tick wants to announce
//! - [`physics`]: movement and the gravity scalar, resolved against the
//!   map's blocks
//! - [`combat`]: firing, bullet simulation, explosions and their kills
//! - [`lifecycle`]: death bookkeeping, respawn scheduling, spawn-point
//!   policy and invulnerability windows
//! - [`replication`]: dirty-flag snapshots, send decimation, event
//!   fan-out and the join replay
//! - [`network`]: UDP socket tasks and the `tokio::select!` session loop
//!
//! ## Concurrency
//!
//! One logical task runs the simulation. A reader task forwards
//! datagrams into a channel and a sender task drains the outbound
//! queue; packet dispatch and tick execution interleave on the main
//! task and never run concurrently, so handlers mutate the world
//! without locks.

pub mod combat;
pub mod connection;
pub mod game;
pub mod lifecycle;
pub mod network;
pub mod physics;
pub mod replication;
