//! Debounced, single-flight autosave state machine.
//!
//! The machine never touches timers itself. It hands out [`TimerCommand`]s for
//! whoever owns the event loop (browser timeouts in `state::document_sync`,
//! plain method calls in tests) and only accepts a timer fire for the ticket it
//! issued last.

pub const DEFAULT_DEBOUNCE_MS: u32 = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    /// A timer carrying `ticket` is armed.
    PendingDebounce { ticket: u64 },
    /// A persistence request is in flight.
    Saving,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerCommand {
    /// Replace any armed timer with one that fires `ticket` after `delay_ms`.
    Arm { ticket: u64, delay_ms: u32 },
    /// Clear the armed timer, if any.
    Disarm,
}

#[derive(Clone, Debug)]
pub struct AutoSave {
    state: SaveState,
    debounce_ms: u32,
    last_ticket: u64,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_MS)
    }
}

impl AutoSave {
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            state: SaveState::Idle,
            debounce_ms,
            last_ticket: 0,
        }
    }

    pub fn state(&self) -> SaveState {
        self.state
    }

    pub fn debounce_ms(&self) -> u32 {
        self.debounce_ms
    }

    pub fn is_saving(&self) -> bool {
        self.state == SaveState::Saving
    }

    /// A confirmed change: restart the debounce window.
    ///
    /// Ignored while saving; there is no queued follow-up.
    pub fn on_change(&mut self) -> Option<TimerCommand> {
        if self.is_saving() {
            log::debug!("autosave: change during save, not rescheduling");
            return None;
        }
        self.last_ticket += 1;
        let ticket = self.last_ticket;
        self.state = SaveState::PendingDebounce { ticket };
        Some(TimerCommand::Arm {
            ticket,
            delay_ms: self.debounce_ms,
        })
    }

    /// State matches the snapshot again: a pending timer has nothing to save.
    pub fn on_settled(&mut self) -> Option<TimerCommand> {
        match self.state {
            SaveState::PendingDebounce { .. } => {
                self.state = SaveState::Idle;
                Some(TimerCommand::Disarm)
            }
            _ => None,
        }
    }

    /// Timer fired. Returns true when a save should start now.
    pub fn on_timer(&mut self, ticket: u64) -> bool {
        match self.state {
            SaveState::PendingDebounce { ticket: current } if current == ticket => {
                self.state = SaveState::Saving;
                true
            }
            SaveState::Saving => {
                log::debug!("autosave: timer {ticket} fired during save, dropped");
                false
            }
            _ => false,
        }
    }

    /// Manual save. Returns true when a save should start now; the caller
    /// clears any armed timer either way.
    pub fn save_now(&mut self) -> bool {
        if self.is_saving() {
            log::debug!("autosave: save already in flight, manual save dropped");
            return false;
        }
        self.state = SaveState::Saving;
        true
    }

    /// The in-flight request settled (success or failure). Releases the guard.
    pub fn finish(&mut self) {
        if self.is_saving() {
            self.state = SaveState::Idle;
        }
    }

    /// Unmount or document switch.
    pub fn cancel(&mut self) -> TimerCommand {
        if let SaveState::PendingDebounce { .. } = self.state {
            self.state = SaveState::Idle;
        }
        TimerCommand::Disarm
    }

    /// Forget everything, including an in-flight save (its response will be discarded).
    pub fn reset(&mut self) -> TimerCommand {
        self.state = SaveState::Idle;
        TimerCommand::Disarm
    }
}
