//! Restartable one-shot timer built on the scheduler.
//!
//! Protocol models have no implicit timeouts: every retransmission or
//! keep-alive is an explicitly scheduled event. [`Timer`] packages the usual
//! bookkeeping around one such event (remember its id, cancel it before
//! rescheduling, pause and resume it).
//!
//! Dropping a `Timer` does not cancel a pending expiration; call
//! [`Timer::cancel`] first if the owner goes away.

use std::fmt;
use std::rc::Rc;

use netsim_core::{EventId, SimulationError, SimulationResult, Time};

use crate::Simulator;

/// Callback invoked when a timer expires.
pub type TimerCallback = Rc<dyn Fn(&mut Simulator) -> SimulationResult<()>>;

/// Observable state of a [`Timer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    /// An expiration is pending.
    Running,
    /// No expiration is pending.
    Expired,
    /// Paused by [`Timer::suspend`]; the remaining delay is remembered.
    Suspended,
}

/// A restartable timer with a default delay and a reusable callback.
pub struct Timer {
    delay: Time,
    callback: Option<TimerCallback>,
    event: Option<EventId>,
    remaining: Option<Time>,
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("delay", &self.delay)
            .field("has_callback", &self.callback.is_some())
            .field("event", &self.event)
            .field("remaining", &self.remaining)
            .finish()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new(Time::ZERO)
    }
}

impl Timer {
    /// Creates a timer with a default delay and no callback.
    pub fn new(delay: Time) -> Self {
        Self {
            delay,
            callback: None,
            event: None,
            remaining: None,
        }
    }

    /// Sets the callback invoked on expiration.
    pub fn set_function<F>(&mut self, callback: F)
    where
        F: Fn(&mut Simulator) -> SimulationResult<()> + 'static,
    {
        self.callback = Some(Rc::new(callback));
    }

    /// Sets the delay used by [`Timer::schedule`].
    pub fn set_delay(&mut self, delay: Time) {
        self.delay = delay;
    }

    /// The delay used by [`Timer::schedule`].
    pub fn delay(&self) -> Time {
        self.delay
    }

    /// (Re)arms the timer with its default delay.
    ///
    /// # Errors
    ///
    /// See [`Timer::schedule_with_delay`].
    pub fn schedule(&mut self, sim: &mut Simulator) -> SimulationResult<()> {
        self.schedule_with_delay(sim, self.delay)
    }

    /// (Re)arms the timer to expire after `delay`, cancelling any pending
    /// expiration.
    ///
    /// # Errors
    ///
    /// - [`SimulationError::InvalidState`] if no callback was set
    /// - [`SimulationError::NegativeDelay`] if `delay` is negative
    pub fn schedule_with_delay(
        &mut self,
        sim: &mut Simulator,
        delay: Time,
    ) -> SimulationResult<()> {
        let callback = self
            .callback
            .clone()
            .ok_or_else(|| SimulationError::InvalidState("timer has no callback".to_string()))?;
        self.cancel(sim);
        self.event = Some(sim.schedule(delay, move |sim| callback(sim))?);
        Ok(())
    }

    /// Cancels a pending expiration and forgets a suspended one.
    pub fn cancel(&mut self, sim: &mut Simulator) {
        if let Some(event) = self.event.take() {
            sim.cancel(event);
        }
        self.remaining = None;
    }

    /// Current state of the timer.
    pub fn state(&self, sim: &Simulator) -> TimerState {
        if self.remaining.is_some() {
            TimerState::Suspended
        } else if self.event.is_some_and(|event| sim.is_pending(event)) {
            TimerState::Running
        } else {
            TimerState::Expired
        }
    }

    /// Returns `true` if an expiration is pending.
    pub fn is_running(&self, sim: &Simulator) -> bool {
        self.state(sim) == TimerState::Running
    }

    /// Returns `true` if no expiration is pending and the timer is not suspended.
    pub fn is_expired(&self, sim: &Simulator) -> bool {
        self.state(sim) == TimerState::Expired
    }

    /// Returns `true` if the timer is suspended.
    pub fn is_suspended(&self) -> bool {
        self.remaining.is_some()
    }

    /// Time until expiration; the remembered delay while suspended; zero if expired.
    pub fn delay_left(&self, sim: &Simulator) -> Time {
        match (self.remaining, self.event) {
            (Some(remaining), _) => remaining,
            (None, Some(event)) => sim.delay_left(event),
            (None, None) => Time::ZERO,
        }
    }

    /// Pauses a running timer, remembering the remaining delay.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidState`] if the timer is not running.
    pub fn suspend(&mut self, sim: &mut Simulator) -> SimulationResult<()> {
        if !self.is_running(sim) {
            return Err(SimulationError::InvalidState(
                "cannot suspend a timer that is not running".to_string(),
            ));
        }
        let remaining = self.delay_left(sim);
        self.cancel(sim);
        self.remaining = Some(remaining);
        Ok(())
    }

    /// Re-arms a suspended timer with the remaining delay.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidState`] if the timer is not suspended.
    pub fn resume(&mut self, sim: &mut Simulator) -> SimulationResult<()> {
        let remaining = self.remaining.ok_or_else(|| {
            SimulationError::InvalidState("cannot resume a timer that is not suspended".to_string())
        })?;
        self.schedule_with_delay(sim, remaining)
    }
}
