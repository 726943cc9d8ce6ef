//! A stop-and-wait sender over a lossy link, retransmitting on a timer.
//!
//! Every layer of the kernel takes part: packets are built by pushing
//! headers, travel as scheduled events, are dropped by a link drawing from
//! the simulator's RNG, and are recovered by a retransmission [`Timer`].

use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use netsim::{
    Packet, SimulationReport, SimulationResult, Simulator, SimulatorConfig, StopReason, Time,
    Timer,
};

use crate::common::{init_tracing, FlowId, NetHeader, PortHeader, SentAt};

const LINK_DELAY: Time = Time::from_millis(2);
const RETRANSMIT_AFTER: Time = Time::from_millis(10);

struct Session {
    loss: f64,
    segments: Vec<Vec<u8>>,
    next: usize,
    transmissions: u32,
    retransmissions: u32,
    timer: Timer,
    expected: usize,
    delivered: Vec<Vec<u8>>,
    latencies: Vec<Time>,
}

type Shared = Rc<RefCell<Session>>;

fn lost(sim: &mut Simulator, loss: f64) -> bool {
    sim.rng().random_f64() < loss
}

fn transmit(sim: &mut Simulator, session: &Shared) -> SimulationResult<()> {
    let (payload, sequence, loss) = {
        let state = session.borrow();
        (state.segments[state.next].clone(), state.next as u16, state.loss)
    };

    let mut packet = Packet::new(&payload);
    packet.add_byte_tag(SentAt(sim.now()))?;
    packet.add_header(&PortHeader {
        source: 4000,
        destination: 80,
        length: (8 + payload.len()) as u16,
        sequence,
    })?;
    packet.add_header(&NetHeader::new(1, 2, packet.size()))?;
    packet.add_packet_tag(FlowId(1));

    {
        let mut state = session.borrow_mut();
        state.transmissions += 1;
        state.timer.schedule(sim)?;
    }

    if lost(sim, loss) {
        tracing::debug!(sequence, time = %sim.now(), "segment lost");
        return Ok(());
    }
    let session = session.clone();
    sim.schedule(LINK_DELAY, move |sim| receive(sim, &session, packet))?;
    Ok(())
}

fn receive(sim: &mut Simulator, session: &Shared, mut packet: Packet) -> SimulationResult<()> {
    let net: NetHeader = packet.remove_header()?;
    assert_eq!(net.total_length as usize, NetHeader::SIZE + packet.size());
    let port: PortHeader = packet.remove_header()?;
    assert_eq!(packet.peek_packet_tag::<FlowId>(), Some(&FlowId(1)));

    let loss = {
        let mut state = session.borrow_mut();
        let sequence = usize::from(port.sequence);
        if sequence == state.expected {
            if let Some(SentAt(sent)) = packet.find_first_byte_tag::<SentAt>() {
                state.latencies.push(sim.now() - *sent);
            }
            state.delivered.push(packet.to_vec());
            state.expected += 1;
        }
        state.loss
    };

    // Acknowledge duplicates too: the previous ack may have been lost
    if lost(sim, loss) {
        tracing::debug!(sequence = port.sequence, "ack lost");
        return Ok(());
    }
    let session = session.clone();
    sim.schedule(LINK_DELAY, move |sim| on_ack(sim, &session, port.sequence))?;
    Ok(())
}

fn on_ack(sim: &mut Simulator, session: &Shared, sequence: u16) -> SimulationResult<()> {
    let more = {
        let mut state = session.borrow_mut();
        if usize::from(sequence) != state.next {
            return Ok(());
        }
        state.timer.cancel(sim);
        state.next += 1;
        state.next < state.segments.len()
    };
    if more {
        transmit(sim, session)?;
    }
    Ok(())
}

fn retransmit(sim: &mut Simulator, session: &Weak<RefCell<Session>>) -> SimulationResult<()> {
    let Some(session) = session.upgrade() else {
        return Ok(());
    };
    session.borrow_mut().retransmissions += 1;
    tracing::debug!(time = %sim.now(), "retransmission timer fired");
    transmit(sim, &session)
}

fn run_session(seed: u64, loss: f64, segments: usize) -> (SimulationReport, Shared) {
    init_tracing();
    let config = SimulatorConfig::new()
        .with_seed(seed)
        .with_max_events(100_000);
    let mut sim = Simulator::with_config(config).expect("config");

    let session: Shared = Rc::new(RefCell::new(Session {
        loss,
        segments: (0..segments)
            .map(|i| format!("segment-{i}").into_bytes())
            .collect(),
        next: 0,
        transmissions: 0,
        retransmissions: 0,
        timer: Timer::new(RETRANSMIT_AFTER),
        expected: 0,
        delivered: Vec::new(),
        latencies: Vec::new(),
    }));
    let weak = Rc::downgrade(&session);
    session
        .borrow_mut()
        .timer
        .set_function(move |sim| retransmit(sim, &weak));

    let start = session.clone();
    sim.schedule(Time::ZERO, move |sim| transmit(sim, &start))
        .expect("schedule");
    let report = sim.run().expect("run");
    (report, session)
}

#[test]
fn test_lossless_link_has_exact_timing() {
    let (report, session) = run_session(1, 0.0, 20);
    let state = session.borrow();

    assert_eq!(state.delivered, state.segments);
    assert_eq!(state.transmissions, 20);
    assert_eq!(state.retransmissions, 0);
    assert!(state.latencies.iter().all(|latency| *latency == LINK_DELAY));

    // One round trip per segment
    assert_eq!(report.final_time, Time::from_millis(20 * 4));
    assert_eq!(report.stop_reason, Some(StopReason::QueueEmpty));
    assert_eq!(report.metrics.events_cancelled, 20);
}

#[test]
fn test_lossy_link_recovers_every_segment_in_order() {
    let (report, session) = run_session(7, 0.3, 20);
    let state = session.borrow();

    assert_eq!(state.delivered, state.segments);
    assert!(state.retransmissions > 0);
    assert_eq!(state.transmissions, 20 + state.retransmissions);
    assert!(report.final_time > Time::from_millis(80));
    assert_eq!(report.stop_reason, Some(StopReason::QueueEmpty));
}

#[test]
fn test_lossy_runs_replay_exactly() {
    let (first, first_session) = run_session(42, 0.25, 15);
    let (second, second_session) = run_session(42, 0.25, 15);
    assert_eq!(first, second);
    assert_eq!(
        first_session.borrow().retransmissions,
        second_session.borrow().retransmissions
    );
    println!("{first}");
}
