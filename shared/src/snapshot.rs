/// A replicated field holding the live value, the value at the last
/// snapshot commit, and a changed-since-last-send bit.
///
/// The previous value feeds interpolation and the per-axis collision
/// passes, which key on whether a coordinate moved this tick. The dirty
/// bit drives outbound replication and is maintained by `commit`: a net
/// difference between the two buffers at commit time marks the field,
/// so within-tick wiggles that settle back on the old value never
/// replicate. The bit then stays set, across any number of commits,
/// until `clear_dirty` runs after a successful send.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tracked<T: Copy + PartialEq> {
    value: T,
    previous: T,
    dirty: bool,
}

impl<T: Copy + PartialEq> Tracked<T> {
    pub fn new(value: T) -> Self {
        Tracked {
            value,
            previous: value,
            dirty: false,
        }
    }

    pub fn get(&self) -> T {
        self.value
    }

    pub fn previous(&self) -> T {
        self.previous
    }

    /// Updates the live value. Dirtiness is judged at the next commit,
    /// not here.
    pub fn set(&mut self, value: T) {
        self.value = value;
    }

    /// Teleport-style update: both buffers jump to the new value so no
    /// stale delta is left behind, but the field still replicates.
    pub fn force(&mut self, value: T) {
        self.value = value;
        self.previous = value;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Folds the live value into the previous slot, marking the field
    /// dirty when they disagreed.
    pub fn commit(&mut self) {
        if self.value != self.previous {
            self.dirty = true;
        }
        self.previous = self.value;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
