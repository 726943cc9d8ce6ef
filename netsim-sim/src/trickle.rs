//! Trickle timer (RFC 6206).
//!
//! Trickle spreads periodic transmissions over an interval `I` that starts at
//! `Imin` and doubles after every interval up to `Imax = Imin * 2^doublings`.
//! Within each interval the callback fires once, at a random point in
//! `[I/2, I)`, unless `redundancy` consistent messages were already heard in
//! that interval. An inconsistency shrinks the interval back to `Imin`.
//!
//! Redundancy zero disables suppression: the callback fires every interval.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use netsim_core::{EventId, SimulationError, SimulationResult, Time};

use crate::{timer::TimerCallback, Simulator};

struct TrickleInner {
    min_interval: Time,
    ticks: u64,
    max_interval: Time,
    redundancy: u16,
    current_interval: Time,
    counter: u16,
    timer_event: Option<EventId>,
    interval_event: Option<EventId>,
    callback: Option<TimerCallback>,
}

/// A Trickle timer driven by a [`Simulator`].
///
/// Cloning yields another handle to the same timer.
#[derive(Clone)]
pub struct TrickleTimer {
    inner: Rc<RefCell<TrickleInner>>,
}

impl fmt::Debug for TrickleTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("TrickleTimer")
            .field("min_interval", &inner.min_interval)
            .field("max_interval", &inner.max_interval)
            .field("redundancy", &inner.redundancy)
            .field("current_interval", &inner.current_interval)
            .field("counter", &inner.counter)
            .finish_non_exhaustive()
    }
}

impl TrickleTimer {
    /// Creates a timer with interval `min_interval`, up to `doublings`
    /// doublings, and redundancy constant `redundancy`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfig`] if `doublings` is 64 or
    /// more, or if `min_interval` is not positive.
    pub fn new(min_interval: Time, doublings: u8, redundancy: u16) -> SimulationResult<Self> {
        let timer = Self {
            inner: Rc::new(RefCell::new(TrickleInner {
                min_interval: Time::ZERO,
                ticks: 0,
                max_interval: Time::ZERO,
                redundancy: 0,
                current_interval: Time::ZERO,
                counter: 0,
                timer_event: None,
                interval_event: None,
                callback: None,
            })),
        };
        timer.set_parameters(min_interval, doublings, redundancy)?;
        Ok(timer)
    }

    /// Replaces the timer parameters. Takes effect at the next interval.
    ///
    /// # Errors
    ///
    /// See [`TrickleTimer::new`].
    pub fn set_parameters(
        &self,
        min_interval: Time,
        doublings: u8,
        redundancy: u16,
    ) -> SimulationResult<()> {
        if u32::from(doublings) >= u64::BITS {
            return Err(SimulationError::InvalidConfig(format!(
                "trickle doublings {doublings} is too large"
            )));
        }
        if !min_interval.is_positive() {
            return Err(SimulationError::InvalidConfig(format!(
                "trickle minimum interval {min_interval} must be positive"
            )));
        }
        let ticks = 1u64 << doublings;
        let max_interval = i64::try_from(ticks)
            .ok()
            .and_then(|ticks| min_interval.checked_mul(ticks))
            .ok_or_else(|| {
                SimulationError::InvalidConfig("trickle maximum interval overflows".to_string())
            })?;

        let mut inner = self.inner.borrow_mut();
        inner.min_interval = min_interval;
        inner.ticks = ticks;
        inner.max_interval = max_interval;
        inner.redundancy = redundancy;
        Ok(())
    }

    /// Sets the callback invoked when the timer fires.
    pub fn set_function<F>(&self, callback: F)
    where
        F: Fn(&mut Simulator) -> SimulationResult<()> + 'static,
    {
        self.inner.borrow_mut().callback = Some(Rc::new(callback));
    }

    /// `Imin`.
    pub fn min_interval(&self) -> Time {
        self.inner.borrow().min_interval
    }

    /// `Imax`.
    pub fn max_interval(&self) -> Time {
        self.inner.borrow().max_interval
    }

    /// Number of doublings from `Imin` to `Imax`.
    pub fn doublings(&self) -> u8 {
        self.inner.borrow().ticks.trailing_zeros() as u8
    }

    /// The redundancy constant `k`.
    pub fn redundancy(&self) -> u16 {
        self.inner.borrow().redundancy
    }

    /// The current interval `I`.
    pub fn current_interval(&self) -> Time {
        self.inner.borrow().current_interval
    }

    /// Time until the callback fires in this interval, zero if it already did.
    pub fn delay_left(&self, sim: &Simulator) -> Time {
        self.inner
            .borrow()
            .timer_event
            .map(|event| sim.delay_left(event))
            .unwrap_or(Time::ZERO)
    }

    /// Time until the current interval ends, zero if the timer is stopped.
    pub fn interval_left(&self, sim: &Simulator) -> Time {
        self.inner
            .borrow()
            .interval_event
            .map(|event| sim.delay_left(event))
            .unwrap_or(Time::ZERO)
    }

    /// Starts the timer with a random first interval in `[Imin, Imax)`.
    ///
    /// # Errors
    ///
    /// Propagates scheduling errors.
    pub fn enable(&self, sim: &mut Simulator) -> SimulationResult<()> {
        let (min_interval, ticks) = {
            let inner = self.inner.borrow();
            (inner.min_interval, inner.ticks)
        };
        let whole = sim.rng().random_range(1..ticks + 1);
        let mut factor = whole as f64;
        if whole < ticks {
            factor += sim.rng().random_f64();
        }
        self.inner.borrow_mut().current_interval = min_interval.mul_f64(factor);
        start_interval(&self.inner, sim)
    }

    /// Records a consistent transmission heard in this interval.
    pub fn consistent_event(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.counter = inner.counter.saturating_add(1);
    }

    /// Records an inconsistency; resets to `Imin` unless already there.
    ///
    /// # Errors
    ///
    /// Propagates scheduling errors.
    pub fn inconsistent_event(&self, sim: &mut Simulator) -> SimulationResult<()> {
        let reset_needed = {
            let inner = self.inner.borrow();
            inner.current_interval > inner.min_interval
        };
        if reset_needed {
            self.reset(sim)?;
        }
        Ok(())
    }

    /// Restarts with interval `Imin`.
    ///
    /// # Errors
    ///
    /// Propagates scheduling errors.
    pub fn reset(&self, sim: &mut Simulator) -> SimulationResult<()> {
        self.cancel_events(sim);
        {
            let mut inner = self.inner.borrow_mut();
            inner.current_interval = inner.min_interval;
        }
        start_interval(&self.inner, sim)
    }

    /// Stops the timer; [`TrickleTimer::enable`] starts it again.
    pub fn stop(&self, sim: &mut Simulator) {
        self.cancel_events(sim);
        let mut inner = self.inner.borrow_mut();
        inner.current_interval = inner.min_interval;
        inner.counter = 0;
    }

    fn cancel_events(&self, sim: &mut Simulator) {
        let (timer_event, interval_event) = {
            let mut inner = self.inner.borrow_mut();
            (inner.timer_event.take(), inner.interval_event.take())
        };
        for event in [timer_event, interval_event].into_iter().flatten() {
            sim.cancel(event);
        }
    }
}

/// Schedules the end of the current interval and the transmission point in it.
fn start_interval(this: &Rc<RefCell<TrickleInner>>, sim: &mut Simulator) -> SimulationResult<()> {
    let interval = this.borrow().current_interval;

    let weak = Rc::downgrade(this);
    let interval_event = sim.schedule(interval, move |sim| interval_expired(&weak, sim))?;

    let fraction = sim.rng().random_range(0.5..1.0);
    let weak = Rc::downgrade(this);
    let timer_event =
        sim.schedule(interval.mul_f64(fraction), move |sim| timer_expired(&weak, sim))?;

    let mut inner = this.borrow_mut();
    inner.interval_event = Some(interval_event);
    inner.timer_event = Some(timer_event);
    inner.counter = 0;
    Ok(())
}

fn timer_expired(weak: &Weak<RefCell<TrickleInner>>, sim: &mut Simulator) -> SimulationResult<()> {
    let Some(this) = weak.upgrade() else {
        return Ok(());
    };
    let callback = {
        let mut inner = this.borrow_mut();
        inner.timer_event = None;
        if inner.redundancy == 0 || inner.counter < inner.redundancy {
            inner.callback.clone()
        } else {
            tracing::trace!(counter = inner.counter, "trickle transmission suppressed");
            None
        }
    };
    match callback {
        Some(callback) => callback(sim),
        None => Ok(()),
    }
}

fn interval_expired(
    weak: &Weak<RefCell<TrickleInner>>,
    sim: &mut Simulator,
) -> SimulationResult<()> {
    let Some(this) = weak.upgrade() else {
        return Ok(());
    };
    {
        let mut inner = this.borrow_mut();
        let doubled = inner.current_interval * 2;
        inner.current_interval = doubled.min(inner.max_interval);
    }
    start_interval(&this, sim)
}
