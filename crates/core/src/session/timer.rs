use chrono::{DateTime, Duration, Utc};
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    CountingDown { deadline: DateTime<Utc>, warned: bool },
    Renewed { at: DateTime<Utc> },
    LoggedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Nothing,
    WarningStarted { remaining: Duration },
    LoggedOut,
}

/// Inactivity countdown. Only one countdown can exist at a time; `start`
/// while counting down is ignored.
#[derive(Clone, Debug)]
pub struct SessionTimer {
    idle_timeout: Duration,
    warning_window: Duration,
    state: TimerState,
}

impl SessionTimer {
    pub fn new(idle_timeout: Duration, warning_window: Duration) -> Self {
        let warning_window = warning_window.min(idle_timeout);
        Self { idle_timeout, warning_window, state: TimerState::Idle }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    /// Returns `false` when a countdown is already running or the session
    /// already logged out.
    pub fn start(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            TimerState::Idle | TimerState::Renewed { .. } => {
                self.state =
                    TimerState::CountingDown { deadline: now + self.idle_timeout, warned: false };
                true
            }
            TimerState::CountingDown { .. } | TimerState::LoggedOut => false,
        }
    }

    /// User activity. Ends the running countdown; the caller starts the next one.
    pub fn renew(&mut self, now: DateTime<Utc>) -> bool {
        match self.state {
            TimerState::CountingDown { deadline, .. } if now < deadline => {
                self.state = TimerState::Renewed { at: now };
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        if matches!(self.state, TimerState::CountingDown { .. } | TimerState::Renewed { .. }) {
            self.state = TimerState::Idle;
        }
    }

    /// Called after a fresh sign-in.
    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.state {
            TimerState::CountingDown { deadline, .. } => Some((deadline - now).max(Duration::zero())),
            _ => None,
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> TimerEvent {
        let TimerState::CountingDown { deadline, warned } = self.state else {
            return TimerEvent::Nothing;
        };

        if now >= deadline {
            self.state = TimerState::LoggedOut;
            info!(event_name = "session.timer.logged_out", "session expired after inactivity");
            return TimerEvent::LoggedOut;
        }

        let remaining = deadline - now;
        if !warned && remaining <= self.warning_window {
            self.state = TimerState::CountingDown { deadline, warned: true };
            return TimerEvent::WarningStarted { remaining };
        }

        TimerEvent::Nothing
    }
}
