//! Playback Guard: single-rate lock, forward-seek prevention, visibility
//! suspension, and quiz-marker crossing detection.
//!
//! Violations never propagate as errors. Every check self-corrects and is
//! logged at warn only.

use std::collections::HashSet;

use uuid::Uuid;

/// Buffering slack allowed past the watched ceiling on a seek.
pub const SEEK_TOLERANCE_SECS: f64 = 0.5;

/// Window around a marker timestamp within which a progress tick counts as
/// crossing it.
pub const MARKER_WINDOW_SECS: f64 = 0.5;

/// The only marker fields the guard needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerPoint {
    pub id: Uuid,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekOutcome {
    Accepted,
    /// Seek exceeded the allowed ceiling; position must be put back.
    Reverted { to: f64 },
}

pub struct PlaybackGuard {
    server_max_viewed: f64,
    last_local: f64,
    markers: Vec<MarkerPoint>,
    fired: HashSet<Uuid>,
}

impl PlaybackGuard {
    pub fn new(server_max_viewed: f64, mut markers: Vec<MarkerPoint>) -> Self {
        markers.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        Self {
            server_max_viewed,
            last_local: 0.0,
            markers,
            fired: HashSet::new(),
        }
    }

    /// Ceiling for seeking: the server-acknowledged maximum or anything
    /// reached locally since, whichever is higher.
    pub fn allowed_max(&self) -> f64 {
        self.server_max_viewed.max(self.last_local)
    }

    /// Returns the rate the player must run at. Anything but 1.0 is a
    /// violation, corrected silently.
    pub fn on_rate_change(&self, observed: f64) -> f64 {
        if observed != 1.0 {
            tracing::warn!(rate = observed, "playback rate manipulation attempt");
        }
        1.0
    }

    /// Validates a seek to `target` seconds. Accepted seeks only ever raise
    /// the local high-water mark; rewinding does not forfeit the ceiling.
    pub fn on_seek(&mut self, target: f64) -> SeekOutcome {
        let allowed = self.allowed_max();
        if target > allowed + SEEK_TOLERANCE_SECS {
            tracing::warn!(target, allowed, "forward seek blocked");
            SeekOutcome::Reverted { to: allowed }
        } else {
            self.last_local = self.last_local.max(target);
            SeekOutcome::Accepted
        }
    }

    /// Advances the local high-water mark and reports a marker whose
    /// timestamp was just crossed, if any. A returned marker means playback
    /// must pause and the question be surfaced; each marker fires at most
    /// once until `clear_marker` re-arms it.
    pub fn on_tick(&mut self, time: f64) -> Option<MarkerPoint> {
        if time > self.last_local {
            self.last_local = time;
        }
        let crossed = self
            .markers
            .iter()
            .find(|m| (time - m.timestamp).abs() < MARKER_WINDOW_SECS && !self.fired.contains(&m.id))
            .copied();
        if let Some(marker) = crossed {
            self.fired.insert(marker.id);
        }
        crossed
    }

    /// Whether playback must be suspended for the given visibility state.
    pub fn on_visibility_change(&self, hidden: bool, playing: bool) -> bool {
        hidden && playing
    }

    /// Re-arms a marker after an incorrect answer and rewind, so it fires
    /// again when the learner reaches it next time.
    pub fn clear_marker(&mut self, id: Uuid) {
        self.fired.remove(&id);
    }

    /// Folds a server-acknowledged maximum (from a heartbeat response) into
    /// the ceiling. Only ever raises it.
    pub fn absorb_server_max(&mut self, server_max: f64) {
        if server_max > self.server_max_viewed {
            self.server_max_viewed = server_max;
        }
    }
}
