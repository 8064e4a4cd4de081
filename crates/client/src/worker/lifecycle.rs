//! Worker lifecycle state machine.
//!
//! `Installing -> Waiting -> Active -> Superseded`. A worker may be
//! superseded from any state; nothing leaves `Superseded`.

use chrono::{DateTime, Utc};
use postcache_core::Error;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Installing,
    Waiting,
    Active,
    Superseded,
}

impl LifecycleState {
    fn can_become(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Installing, Waiting) | (Waiting, Active) | (Installing | Waiting | Active, Superseded)
        )
    }
}

/// Lifecycle bookkeeping shared by every clone of a worker.
#[derive(Debug, Clone, Serialize)]
pub struct Lifecycle {
    pub state: LifecycleState,
    /// Set once install finishes or an admin asks to skip the waiting phase.
    pub skip_waiting: bool,
    /// Set on activation: open pages are controlled without a reload.
    pub clients_claimed: bool,
    pub installed_at: Option<DateTime<Utc>>,
    pub activated_at: Option<DateTime<Utc>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            state: LifecycleState::Installing,
            skip_waiting: false,
            clients_claimed: false,
            installed_at: None,
            activated_at: None,
        }
    }
}

impl Lifecycle {
    /// Move to `next`, rejecting transitions the state machine does not allow.
    pub fn transition(&mut self, next: LifecycleState, now: DateTime<Utc>) -> Result<(), Error> {
        if !self.state.can_become(next) {
            return Err(Error::InvalidState(format!("cannot move from {:?} to {next:?}", self.state)));
        }

        tracing::info!(from = ?self.state, to = ?next, "lifecycle transition");
        self.state = next;
        match next {
            LifecycleState::Waiting => self.installed_at = Some(now),
            LifecycleState::Active => {
                self.activated_at = Some(now);
                self.clients_claimed = true;
            }
            LifecycleState::Superseded => self.clients_claimed = false,
            LifecycleState::Installing => {}
        }
        Ok(())
    }

    pub fn require(&self, state: LifecycleState) -> Result<(), Error> {
        if self.state == state {
            Ok(())
        } else {
            Err(Error::InvalidState(format!("expected {state:?}, worker is {:?}", self.state)))
        }
    }
}
