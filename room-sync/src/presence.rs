//! Presence roster and remote cursors.
//!
//! ```text
//! editor cursor move
//!       │
//!       ▼
//! CursorThrottle::admit()   (one send per 75ms window, no trailing send)
//!       │
//!       ▼
//! room:cursor ──► authority ──► room:cursor-update (peers)
//!                                      │
//!                                      ▼
//!                          Presence::apply_cursor() → CursorMap
//! ```
//!
//! The roster is replaced wholesale on every presence event. Cursors are
//! never expired here; a departed participant's cursor stays until the host
//! prunes it (see [`Presence::prune_departed_cursors`]).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::protocol::{CursorPosition, CursorUpdate, Participant, ParticipantId};

// ───────────────────────────────────────────────────────────────────
// Outbound throttle
// ───────────────────────────────────────────────────────────────────

/// Fixed-window gate for outbound cursor updates.
///
/// Positions arriving inside the window are dropped, not buffered.
#[derive(Debug, Clone)]
pub struct CursorThrottle {
    interval: Duration,
    last_sent: Option<Instant>,
}

impl CursorThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Admit a send now if the window has reopened.
    pub fn admit(&mut self) -> bool {
        self.admit_at(Instant::now())
    }

    /// Admit a send at `now`; records `now` as the last send when admitted.
    pub fn admit_at(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_sent = Some(now);
        true
    }
}

// ───────────────────────────────────────────────────────────────────
// Roster and cursors
// ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Presence {
    roster: Vec<Participant>,
    cursors: HashMap<ParticipantId, CursorPosition>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the roster with exactly `participants`.
    pub fn replace_roster(&mut self, participants: Vec<Participant>) {
        self.roster = participants;
    }

    /// Baseline from a join snapshot: new roster, no cursors.
    pub fn reset(&mut self, participants: Vec<Participant>) {
        self.roster = participants;
        self.cursors.clear();
    }

    /// Record a remote cursor. Returns `false` for our own cursor.
    pub fn apply_cursor(&mut self, update: &CursorUpdate, local: Option<&ParticipantId>) -> bool {
        if local == Some(&update.origin) {
            return false;
        }
        self.cursors.insert(update.origin.clone(), update.cursor);
        true
    }

    /// Drop cursors whose owner is no longer on the roster. Returns the removed ids.
    pub fn prune_departed_cursors(&mut self) -> Vec<ParticipantId> {
        let departed: Vec<ParticipantId> = self
            .cursors
            .keys()
            .filter(|id| !self.is_present(id))
            .cloned()
            .collect();
        for id in &departed {
            self.cursors.remove(id);
        }
        departed
    }

    pub fn roster(&self) -> &[Participant] {
        &self.roster
    }

    pub fn is_present(&self, id: &ParticipantId) -> bool {
        self.roster.iter().any(|p| &p.user_id == id)
    }

    pub fn cursors(&self) -> &HashMap<ParticipantId, CursorPosition> {
        &self.cursors
    }

    pub fn cursor(&self, id: &ParticipantId) -> Option<CursorPosition> {
        self.cursors.get(id).copied()
    }
}
