//! Session budget countdown.
//!
//! The timer itself is a plain state machine: the controller owns the
//! recurring `tokio::time::Interval` and calls [`SessionTimer::tick`] once per
//! period, so every tick's decrement, classification and emission happen in a
//! single dispatch step.

use std::time::Duration;

/// Seconds removed from the budget on every tick.
pub const TICK_SECONDS: i64 = 10;
pub const TICK_PERIOD: Duration = Duration::from_secs(TICK_SECONDS as u64);

/// At or below this many seconds the agent is told to start wrapping up.
pub const WRAP_UP_SECONDS: i64 = 30;
/// How far past zero the agent may run before the session is forced closed.
pub const HARD_STOP_GRACE_SECONDS: i64 = 60;

/// Name of the client tool the agent calls to hang up.
pub const END_CALL_TOOL: &str = "Avsluta";

/// Rounds a budget up to the next multiple of the tick. Non-positive budgets
/// collapse to zero, which disables the timer.
pub fn round_budget(seconds: i64) -> i64 {
    if seconds <= 0 {
        return 0;
    }
    seconds.saturating_add(TICK_SECONDS - 1) / TICK_SECONDS * TICK_SECONDS
}

/// What a single tick produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerNotice {
    /// More than the wrap-up window left.
    Countdown(i64),
    /// Inside the wrap-up window.
    WrapUp(i64),
    /// Out of time, still inside the grace period.
    Goodbye(i64),
    /// Grace period exceeded; the session must be torn down.
    HardStop,
}

impl TimerNotice {
    /// The contextual update to send to the agent, if any.
    pub fn message(&self) -> Option<String> {
        match self {
            TimerNotice::Countdown(remaining) => Some(format!(
                "This conversation will end in about {remaining} seconds."
            )),
            TimerNotice::WrapUp(remaining) => Some(format!(
                "This conversation needs to be wrapped up in {remaining} seconds. Start saying goodbye in the user's language."
            )),
            TimerNotice::Goodbye(_) => Some(format!(
                "**IMPORTANT** This conversation needs to be wrapped up now. Say goodbye immediately (it's OK to be a bit abrupt, no need to make an excuse or be polite). Always say goodbye in the user's language. Don't wait for the user to say goodbye, but make sure you **FINISH** saying goodbye **BEFORE** calling the tool \"{END_CALL_TOOL}\" to end the conversation."
            )),
            TimerNotice::HardStop => None,
        }
    }

    pub fn remaining(&self) -> Option<i64> {
        match self {
            TimerNotice::Countdown(r) | TimerNotice::WrapUp(r) | TimerNotice::Goodbye(r) => Some(*r),
            TimerNotice::HardStop => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionTimer {
    remaining: Option<i64>,
}

impl SessionTimer {
    pub fn inactive() -> Self {
        Self::default()
    }

    /// Starts a countdown from `budget_seconds` rounded up to the tick.
    /// A non-positive budget yields an inactive timer.
    pub fn start(budget_seconds: i64) -> Self {
        let budget = round_budget(budget_seconds);
        Self {
            remaining: (budget > 0).then_some(budget),
        }
    }

    pub fn is_active(&self) -> bool {
        self.remaining.is_some()
    }

    pub fn remaining(&self) -> Option<i64> {
        self.remaining
    }

    /// Advances the countdown by one period.
    ///
    /// Returns `None` once stopped. A hard-stop stops the timer, so it is
    /// reported exactly once.
    pub fn tick(&mut self) -> Option<TimerNotice> {
        let remaining = self.remaining.as_mut()?;
        *remaining -= TICK_SECONDS;
        let remaining = *remaining;

        let notice = if remaining < -HARD_STOP_GRACE_SECONDS {
            self.stop();
            TimerNotice::HardStop
        } else if remaining <= 0 {
            TimerNotice::Goodbye(remaining)
        } else if remaining <= WRAP_UP_SECONDS {
            TimerNotice::WrapUp(remaining)
        } else {
            TimerNotice::Countdown(remaining)
        };
        tracing::debug!(remaining, ?notice, "session timer tick");
        Some(notice)
    }

    /// Stops the countdown. Returns whether it was running.
    pub fn stop(&mut self) -> bool {
        self.remaining.take().is_some()
    }
}
