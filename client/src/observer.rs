//! Presentation callbacks fired by the mirrored session.
//!
//! Audio playback, HUD drawing and the event lister live outside this
//! crate. Whatever the session derives from the replication stream that
//! is worth presenting goes out through [`SessionObserver`]; the
//! bundled binary just logs it, a real frontend would play and draw.

use log::{debug, info};
use shared::Vec3;

/// Positional audio cues derivable from the replication stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundCue {
    Shot,
    Impact,
    Explosion,
    ItemTaken,
    ItemRespawned,
    Jumppad,
    Falling,
    Landed,
    Death,
}

/// Hooks for the presentation layer. Implementations must not assume
/// any call order; packet loss and reordering thin the stream out.
pub trait SessionObserver {
    /// A sound worth playing at a world position.
    fn sound_at(&mut self, cue: SoundCue, position: Vec3);

    /// The local player entered (`true`) or left the respawn wait.
    fn respawn_countdown(&mut self, waiting: bool);

    /// Aiming reticle visibility, following the local player's alive
    /// state.
    fn crosshair_hidden(&mut self, hidden: bool);

    /// One line for the scrolling event lister.
    fn event_line(&mut self, line: &str);
}

/// Observer used by the headless binary: everything goes to the log.
#[derive(Debug, Default)]
pub struct LogObserver;

impl SessionObserver for LogObserver {
    fn sound_at(&mut self, cue: SoundCue, position: Vec3) {
        debug!("cue {:?} at ({:.1}, {:.1})", cue, position.x, position.y);
    }

    fn respawn_countdown(&mut self, waiting: bool) {
        if waiting {
            info!("down, waiting for respawn");
        }
    }

    fn crosshair_hidden(&mut self, hidden: bool) {
        debug!("crosshair hidden: {}", hidden);
    }

    fn event_line(&mut self, line: &str) {
        info!("{}", line);
    }
}
