//! # Game Client Library
//!
//! Headless client for the multiplayer arena shooter. The client trusts
//! the server completely: it mirrors the replicated world, derives
//! presentation cues from the stream, and sends back nothing but its
//! commands. There is no prediction; players move when snapshots say
//! so, and only bullet travel and explosion decay are animated locally
//! between refreshes.
//!
//! ## Module Organization
//!
//! - [`game`]: the mirrored [`game::WorldView`] built from replication
//!   messages, plus the local presentation tick
//! - [`input`]: pilot intents and the sequenced command stream with its
//!   change-or-keepalive send policy
//! - [`network`]: UDP socket handling, the boot handshake and the
//!   reconnecting session loop
//! - [`observer`]: the [`observer::SessionObserver`] hooks a frontend
//!   implements for sound, HUD state and the event lister
//!
//! The bundled binary wires these together with a scripted pilot and a
//! logging observer, which is enough to exercise a server end to end.

pub mod game;
pub mod input;
pub mod network;
pub mod observer;
