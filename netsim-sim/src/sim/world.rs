//! The simulator: virtual clock, pending events and the run loop.
//!
//! A [`Simulator`] is an explicit value owned by the code driving a run.
//! Event actions receive `&mut Simulator`, so a model can read `now`, draw
//! random numbers and schedule follow-up events from inside an action without
//! any global state. Several independent simulators can coexist in one
//! process.

use std::{
    collections::VecDeque,
    sync::atomic::{AtomicU64, Ordering},
};

use tracing::instrument;

use netsim_core::{ContextId, EventId, SimulationError, SimulationResult, Time};

use crate::config::SimulatorConfig;
use crate::report::{SimulationMetrics, SimulationReport, StopReason};

use super::{
    events::{Action, EventQueue, EventRecord, EventSlab, ScheduledEvent},
    rng::SimRng,
};

/// Slot marker for events registered with [`Simulator::schedule_destroy`].
const DESTROY_SLOT: u32 = u32::MAX;

/// Source of simulator identities stamped into every [`EventId`].
static NEXT_SIMULATOR_ID: AtomicU64 = AtomicU64::new(0);

/// An event deferred until [`Simulator::destroy`].
struct DestroyEvent {
    uid: u64,
    action: Action,
}

impl std::fmt::Debug for DestroyEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestroyEvent")
            .field("uid", &self.uid)
            .finish_non_exhaustive()
    }
}

/// The central simulation coordinator that manages time and event processing.
///
/// Events are totally ordered by `(time, sequence)`: equal-time events run in
/// the order they were scheduled. The clock only moves forward, and only
/// inside [`Simulator::run`] or [`Simulator::step`].
///
/// # Examples
///
/// ```
/// use std::{cell::RefCell, rc::Rc};
/// use netsim_core::Time;
/// use netsim_sim::Simulator;
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let mut sim = Simulator::new();
/// for (label, ms) in [("t5a", 5), ("t5b", 5), ("t3", 3)] {
///     let log = log.clone();
///     sim.schedule(Time::from_millis(ms), move |_| {
///         log.borrow_mut().push(label);
///         Ok(())
///     })?;
/// }
/// sim.run()?;
/// assert_eq!(*log.borrow(), vec!["t3", "t5a", "t5b"]);
/// assert_eq!(sim.now(), Time::from_millis(5));
/// # Ok::<(), netsim_core::SimulationError>(())
/// ```
#[derive(Debug)]
pub struct Simulator {
    instance: u64,
    config: SimulatorConfig,
    current_time: Time,
    current_context: ContextId,
    queue: EventQueue,
    slab: EventSlab,
    next_uid: u64,
    destroy_events: VecDeque<DestroyEvent>,
    rng: SimRng,
    running: bool,
    stop_requested: bool,
    stop_time_armed: bool,
    stop_reason: Option<StopReason>,
    metrics: SimulationMetrics,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Creates a simulator with the default configuration.
    pub fn new() -> Self {
        Self::create(SimulatorConfig::default())
    }

    /// Creates a simulator with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::InvalidConfig`] if the configuration fails
    /// [`SimulatorConfig::validate`].
    pub fn with_config(config: SimulatorConfig) -> SimulationResult<Self> {
        config.validate()?;
        Ok(Self::create(config))
    }

    /// Creates a simulator with default settings and the given seed.
    pub fn new_with_seed(seed: u64) -> Self {
        Self::create(SimulatorConfig::default().with_seed(seed))
    }

    fn create(config: SimulatorConfig) -> Self {
        Self {
            instance: NEXT_SIMULATOR_ID.fetch_add(1, Ordering::Relaxed),
            rng: SimRng::new(config.seed),
            config,
            current_time: Time::ZERO,
            current_context: ContextId::NONE,
            queue: EventQueue::new(),
            slab: EventSlab::default(),
            next_uid: 0,
            destroy_events: VecDeque::new(),
            running: false,
            stop_requested: false,
            stop_time_armed: false,
            stop_reason: None,
            metrics: SimulationMetrics::default(),
        }
    }

    /// The configuration this simulator was created with.
    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> Time {
        self.current_time
    }

    /// Context of the event currently executing, or of the last one executed.
    pub fn current_context(&self) -> ContextId {
        self.current_context
    }

    /// The latest time an event could ever be scheduled at.
    pub fn maximum_simulation_time(&self) -> Time {
        Time::MAX
    }

    /// The simulator's deterministic random number generator.
    pub fn rng(&mut self) -> &mut SimRng {
        &mut self.rng
    }

    /// Schedules `action` to run after `delay`, in the current context.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NegativeDelay`] if `delay` is negative.
    pub fn schedule<F>(&mut self, delay: Time, action: F) -> SimulationResult<EventId>
    where
        F: FnOnce(&mut Simulator) -> SimulationResult<()> + 'static,
    {
        self.schedule_with_context(self.current_context, delay, action)
    }

    /// Schedules `action` to run after `delay` on behalf of `context`.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NegativeDelay`] if `delay` is negative.
    pub fn schedule_with_context<F>(
        &mut self,
        context: ContextId,
        delay: Time,
        action: F,
    ) -> SimulationResult<EventId>
    where
        F: FnOnce(&mut Simulator) -> SimulationResult<()> + 'static,
    {
        if delay.is_negative() {
            return Err(SimulationError::NegativeDelay { delay });
        }
        let delay = self.config.resolution.quantize(delay);
        let time = self.current_time.checked_add(delay).ok_or_else(|| {
            SimulationError::InvalidState(format!(
                "event time overflows: now {} + delay {}",
                self.current_time, delay
            ))
        })?;
        Ok(self.insert(time, context, Box::new(action)))
    }

    /// Schedules `action` at the absolute time `time`, in the current context.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NegativeDelay`] if `time` is before `now`.
    pub fn schedule_at<F>(&mut self, time: Time, action: F) -> SimulationResult<EventId>
    where
        F: FnOnce(&mut Simulator) -> SimulationResult<()> + 'static,
    {
        self.schedule(time - self.current_time, action)
    }

    /// Schedules `action` to run at the current time, after every event
    /// already pending for this instant.
    pub fn schedule_now<F>(&mut self, action: F) -> EventId
    where
        F: FnOnce(&mut Simulator) -> SimulationResult<()> + 'static,
    {
        self.insert(self.current_time, self.current_context, Box::new(action))
    }

    /// Registers `action` to run when the simulation is torn down with
    /// [`Simulator::destroy`]. Destroy events never run during `run`.
    pub fn schedule_destroy<F>(&mut self, action: F) -> EventId
    where
        F: FnOnce(&mut Simulator) -> SimulationResult<()> + 'static,
    {
        let uid = self.allocate_uid();
        self.metrics.events_scheduled += 1;
        self.destroy_events.push_back(DestroyEvent {
            uid,
            action: Box::new(action),
        });
        EventId::new(self.instance, uid, DESTROY_SLOT)
    }

    fn allocate_uid(&mut self) -> u64 {
        let uid = self.next_uid;
        self.next_uid += 1;
        uid
    }

    fn insert(&mut self, time: Time, context: ContextId, action: Action) -> EventId {
        let uid = self.allocate_uid();
        let slot = self.slab.insert(EventRecord {
            uid,
            time,
            context,
            action,
        });
        self.queue.schedule(ScheduledEvent::new(time, uid, slot));
        self.metrics.events_scheduled += 1;
        self.metrics.peak_pending = self.metrics.peak_pending.max(self.slab.live());
        tracing::trace!(uid, %time, %context, "scheduled event");
        EventId::new(self.instance, uid, slot)
    }

    fn check_issued(&self, id: EventId) {
        assert!(
            id.owner() == self.instance && id.uid() < self.next_uid,
            "{id} was not issued by this simulator"
        );
    }

    /// Cancels a pending event.
    ///
    /// Returns `true` if the event was pending and will now never run.
    /// Cancelling an event that already ran or was already cancelled is a
    /// no-op returning `false`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this simulator.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.check_issued(id);
        let cancelled = if id.slot() == DESTROY_SLOT {
            let before = self.destroy_events.len();
            self.destroy_events.retain(|event| event.uid != id.uid());
            self.destroy_events.len() != before
        } else {
            // The record and its action are dropped now; the heap key is
            // skipped when popped.
            self.slab.take(id.slot(), id.uid()).is_some()
        };
        if cancelled {
            self.metrics.events_cancelled += 1;
            tracing::trace!(uid = id.uid(), "cancelled event");
        }
        cancelled
    }

    /// Removes a pending event. Equivalent to [`Simulator::cancel`].
    pub fn remove(&mut self, id: EventId) -> bool {
        self.cancel(id)
    }

    /// Returns `true` if the event is still waiting to run.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this simulator.
    pub fn is_pending(&self, id: EventId) -> bool {
        self.check_issued(id);
        if id.slot() == DESTROY_SLOT {
            self.destroy_events.iter().any(|event| event.uid == id.uid())
        } else {
            self.slab.get(id.slot(), id.uid()).is_some()
        }
    }

    /// Returns `true` if the event has run or was cancelled.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this simulator.
    pub fn is_expired(&self, id: EventId) -> bool {
        !self.is_pending(id)
    }

    /// Time remaining until the event runs; zero once it has expired.
    ///
    /// Destroy events report zero: they have no place on the time line.
    pub fn delay_left(&self, id: EventId) -> Time {
        self.check_issued(id);
        if id.slot() == DESTROY_SLOT {
            return Time::ZERO;
        }
        self.slab
            .get(id.slot(), id.uid())
            .map(|record| record.time - self.current_time)
            .unwrap_or(Time::ZERO)
    }

    /// Returns `true` if there are events waiting to be processed.
    pub fn has_pending_events(&self) -> bool {
        self.slab.live() > 0
    }

    /// Number of events waiting to be processed (destroy events excluded).
    pub fn pending_event_count(&self) -> usize {
        self.slab.live()
    }

    /// Number of events executed so far.
    pub fn events_executed(&self) -> u64 {
        self.metrics.events_executed
    }

    /// Returns `true` if `run` would return immediately.
    pub fn is_finished(&self) -> bool {
        !self.has_pending_events() || self.stop_requested
    }

    /// Requests the run loop to return after the current event.
    pub fn stop(&mut self) {
        tracing::debug!(time = %self.current_time, "stop requested");
        self.stop_requested = true;
    }

    /// Stops the run loop once simulated time reaches `time`.
    ///
    /// Events scheduled for exactly `time` before this call still run.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NegativeDelay`] if `time` is in the past.
    pub fn stop_at(&mut self, time: Time) -> SimulationResult<EventId> {
        self.schedule_at(time, |sim| {
            sim.stop();
            Ok(())
        })
    }

    /// Stops the run loop after `delay` from now.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::NegativeDelay`] if `delay` is negative.
    pub fn stop_after(&mut self, delay: Time) -> SimulationResult<EventId> {
        self.schedule(delay, |sim| {
            sim.stop();
            Ok(())
        })
    }

    /// Runs events in `(time, sequence)` order until the queue is empty or a
    /// stop is requested.
    ///
    /// An error returned by an action aborts the run immediately and is
    /// returned here; the clock stays at the failing event's time.
    ///
    /// A configured `stop_time` is armed by the first `run`. If [`step`]
    /// already moved the clock past it, that run stops before executing
    /// anything.
    ///
    /// [`step`]: Simulator::step
    ///
    /// # Errors
    ///
    /// - [`SimulationError::ReentrantRun`] if called from inside an action
    /// - any error returned by an event action
    #[instrument(skip(self), fields(seed = self.rng.seed()))]
    pub fn run(&mut self) -> SimulationResult<SimulationReport> {
        if self.running {
            return Err(SimulationError::ReentrantRun);
        }
        let mut stop_time_passed = false;
        if !self.stop_time_armed {
            self.stop_time_armed = true;
            if let Some(stop_time) = self.config.stop_time {
                if stop_time < self.current_time {
                    stop_time_passed = true;
                } else {
                    self.stop_at(stop_time)?;
                }
            }
        }

        self.running = true;
        self.stop_requested = stop_time_passed;
        let outcome = self.run_loop();
        self.running = false;

        match outcome {
            Ok(reason) => {
                self.stop_reason = Some(reason);
                tracing::debug!(
                    time = %self.current_time,
                    executed = self.metrics.events_executed,
                    %reason,
                    "run finished"
                );
                Ok(self.report())
            }
            Err(err) => {
                tracing::error!(
                    time = %self.current_time,
                    context = %self.current_context,
                    error = %err,
                    "event action aborted the run"
                );
                Err(err)
            }
        }
    }

    fn run_loop(&mut self) -> SimulationResult<StopReason> {
        loop {
            if self.stop_requested {
                return Ok(StopReason::Stopped);
            }
            if let Some(limit) = self.config.max_events {
                if self.metrics.events_executed >= limit {
                    return Ok(StopReason::EventLimit);
                }
            }
            if !self.process_next()? {
                return Ok(StopReason::QueueEmpty);
            }
        }
    }

    /// Processes the next scheduled event and advances time.
    ///
    /// Returns `true` if more events are available for processing,
    /// `false` if this was the last event or if no events are available.
    ///
    /// # Errors
    ///
    /// Same as [`Simulator::run`].
    #[instrument(skip(self))]
    pub fn step(&mut self) -> SimulationResult<bool> {
        if self.running {
            return Err(SimulationError::ReentrantRun);
        }
        self.running = true;
        let outcome = self.process_next();
        self.running = false;
        outcome?;
        Ok(self.has_pending_events())
    }

    /// Pops keys until a live one is found and runs its action.
    ///
    /// Returns `false` if the queue held no live event.
    fn process_next(&mut self) -> SimulationResult<bool> {
        while let Some(key) = self.queue.pop_earliest() {
            let Some(record) = self.slab.take(key.slot(), key.sequence()) else {
                self.metrics.stale_entries_skipped += 1;
                continue;
            };
            debug_assert!(record.time >= self.current_time, "time moved backward");

            // Advance logical time to event timestamp
            self.current_time = record.time;
            self.current_context = record.context;
            self.metrics.events_executed += 1;
            tracing::trace!(
                uid = record.uid,
                time = %record.time,
                context = %record.context,
                "executing event"
            );

            (record.action)(self)?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Runs destroy events in registration order and discards every pending
    /// event. The clock is left where the run ended.
    ///
    /// Destroy events registered while destroying also run.
    ///
    /// # Errors
    ///
    /// - [`SimulationError::ReentrantRun`] if called from inside an action
    /// - the first error returned by a destroy action
    #[instrument(skip(self))]
    pub fn destroy(&mut self) -> SimulationResult<()> {
        if self.running {
            return Err(SimulationError::ReentrantRun);
        }
        self.running = true;
        let mut outcome = Ok(());
        while let Some(event) = self.destroy_events.pop_front() {
            self.metrics.events_executed += 1;
            if let Err(err) = (event.action)(self) {
                outcome = Err(err);
                break;
            }
        }
        self.running = false;

        let discarded = self.slab.live();
        self.queue.clear();
        self.slab.clear();
        self.destroy_events.clear();
        tracing::debug!(discarded, time = %self.current_time, "simulation destroyed");
        outcome
    }

    /// Snapshot of the run's outcome and counters.
    pub fn report(&self) -> SimulationReport {
        SimulationReport {
            final_time: self.current_time,
            stop_reason: self.stop_reason,
            seed: self.rng.seed(),
            pending_events: self.slab.live(),
            metrics: self.metrics.clone(),
        }
    }
}
