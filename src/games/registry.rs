use crate::clock::TimerHandle;
use crate::common::types::RoundTicket;
use crate::errors::RoundError;
use crate::games::types::Round;
use dashmap::{mapref::entry::Entry, DashMap};
use uuid::Uuid;

/// A running round plus the handle of its pending auto-resolution
pub struct ActiveRound {
    pub round: Round,
    pub timer: Option<TimerHandle>,
}

impl ActiveRound {
    fn cancel_timer(&self) {
        if let Some(timer) = &self.timer {
            timer.cancel();
        }
    }
}

/// Thread-safe set of active rounds, at most one per player
///
/// Removing an entry is the single arbitration point between a manual stop
/// and the scheduled resolution: whichever removes it resolves the round.
pub struct SessionRegistry {
    active: DashMap<String, ActiveRound>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
        }
    }

    /// Register a new round, rejecting a second round for the same player
    pub fn insert(&self, round: Round) -> Result<(), RoundError> {
        match self.active.entry(round.player_id().to_string()) {
            Entry::Occupied(entry) => Err(RoundError::AlreadyActive(entry.key().clone())),
            Entry::Vacant(entry) => {
                entry.insert(ActiveRound { round, timer: None });
                Ok(())
            }
        }
    }

    /// Store the timer for `round_id`. If the round is already gone the timer
    /// is cancelled immediately.
    pub fn attach_timer(&self, player_id: &str, round_id: Uuid, timer: TimerHandle) {
        match self.active.get_mut(player_id) {
            Some(mut entry) if entry.round.id() == round_id => entry.timer = Some(timer),
            _ => timer.cancel(),
        }
    }

    /// Claim the player's round for a manual stop, cancelling its timer
    pub fn take(&self, player_id: &str) -> Option<Round> {
        let (_, active) = self.active.remove(player_id)?;
        active.cancel_timer();
        Some(active.round)
    }

    /// Claim a specific round for its scheduled resolution
    pub fn take_if_current(&self, player_id: &str, round_id: Uuid) -> Option<Round> {
        self.active
            .remove_if(player_id, |_, active| active.round.id() == round_id)
            .map(|(_, active)| active.round)
    }

    /// Drop the player's round without resolving it
    pub fn cancel(&self, player_id: &str) -> Option<RoundTicket> {
        self.take(player_id).map(|round| round.ticket().clone())
    }

    /// Drop every active round without resolving them
    pub fn cancel_all(&self) -> Vec<RoundTicket> {
        let players: Vec<String> = self.active.iter().map(|e| e.key().clone()).collect();
        players.iter().filter_map(|p| self.cancel(p)).collect()
    }

    pub fn lookup(&self, player_id: &str) -> Option<RoundTicket> {
        self.active.get(player_id).map(|e| e.round.ticket().clone())
    }

    pub fn is_active(&self, player_id: &str) -> bool {
        self.active.contains_key(player_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
