//! Event ordering, cancellation and determinism.

use std::{cell::RefCell, rc::Rc};

use netsim::{EventId, SimulationResult, Simulator, SimulatorConfig, StopReason, Time};
use proptest::prelude::*;

use crate::common::init_tracing;

type Trace = Rc<RefCell<Vec<(Time, u32)>>>;

fn record(trace: &Trace, label: u32) -> impl FnOnce(&mut Simulator) -> SimulationResult<()> {
    let trace = trace.clone();
    move |sim| {
        trace.borrow_mut().push((sim.now(), label));
        Ok(())
    }
}

#[test]
fn test_equal_times_keep_schedule_order() {
    init_tracing();
    let trace: Trace = Rc::default();
    let mut sim = Simulator::new();
    sim.schedule(Time::from_secs(5), record(&trace, 1)).expect("t5a");
    sim.schedule(Time::from_secs(5), record(&trace, 2)).expect("t5b");
    sim.schedule(Time::from_secs(3), record(&trace, 3)).expect("t3");

    let report = sim.run().expect("run");
    assert_eq!(
        *trace.borrow(),
        vec![
            (Time::from_secs(3), 3),
            (Time::from_secs(5), 1),
            (Time::from_secs(5), 2)
        ]
    );
    assert_eq!(report.final_time, Time::from_secs(5));
    assert_eq!(report.stop_reason, Some(StopReason::QueueEmpty));
}

/// A node that pings itself with random jitter until a budget runs out.
fn jittery_node(sim: &mut Simulator, trace: Trace, node: u32, budget: u32) -> SimulationResult<()> {
    trace.borrow_mut().push((sim.now(), node));
    if budget > 0 {
        let jitter = sim
            .rng()
            .random_time_between(Time::from_micros(10), Time::from_micros(500));
        sim.schedule(jitter, move |sim| jittery_node(sim, trace, node, budget - 1))?;
    }
    Ok(())
}

fn run_jittery(seed: u64) -> Vec<(Time, u32)> {
    let trace: Trace = Rc::default();
    let mut sim = Simulator::with_config(SimulatorConfig::new().with_seed(seed)).expect("config");
    for node in 0..4 {
        let trace = trace.clone();
        sim.schedule(Time::ZERO, move |sim| jittery_node(sim, trace, node, 25))
            .expect("schedule");
    }
    sim.run().expect("run");
    let trace = trace.borrow().clone();
    trace
}

#[test]
fn test_same_seed_same_trace() {
    let first = run_jittery(1234);
    assert_eq!(first.len(), 4 * 26);
    assert_eq!(first, run_jittery(1234));
    assert_ne!(first, run_jittery(4321));
}

#[test]
fn test_clock_never_moves_backward() {
    let trace = run_jittery(99);
    assert!(trace.windows(2).all(|pair| pair[0].0 <= pair[1].0));
}

#[test]
fn test_two_simulators_are_independent() {
    let trace_a: Trace = Rc::default();
    let trace_b: Trace = Rc::default();
    let mut a = Simulator::new();
    let mut b = Simulator::new();
    a.schedule(Time::from_millis(3), record(&trace_a, 1)).expect("schedule");
    b.schedule(Time::from_millis(7), record(&trace_b, 2)).expect("schedule");

    a.run().expect("run a");
    assert_eq!(a.now(), Time::from_millis(3));
    assert_eq!(b.now(), Time::ZERO);
    b.run().expect("run b");
    assert_eq!(*trace_b.borrow(), vec![(Time::from_millis(7), 2)]);
}

proptest! {
    #[test]
    fn cancelled_events_never_run_and_survivors_stay_ordered(
        events in prop::collection::vec((0i64..100, any::<bool>()), 1..80),
    ) {
        let trace: Trace = Rc::default();
        let mut sim = Simulator::new();
        let mut scheduled: Vec<(EventId, Time, u32, bool)> = Vec::new();
        for (label, (delay, cancel)) in events.iter().enumerate() {
            let time = Time::from_millis(*delay);
            let id = sim.schedule(time, record(&trace, label as u32)).expect("schedule");
            scheduled.push((id, time, label as u32, *cancel));
        }
        for (id, _, _, cancel) in &scheduled {
            if *cancel {
                prop_assert!(sim.cancel(*id));
            }
        }
        let report = sim.run().expect("run");

        let mut expected: Vec<(Time, u32)> = scheduled
            .iter()
            .filter(|(_, _, _, cancel)| !cancel)
            .map(|(_, time, label, _)| (*time, *label))
            .collect();
        expected.sort();
        prop_assert_eq!(&*trace.borrow(), &expected);
        prop_assert_eq!(report.metrics.events_executed, expected.len() as u64);
        for (id, _, _, _) in &scheduled {
            prop_assert!(sim.is_expired(*id));
        }
    }
}
