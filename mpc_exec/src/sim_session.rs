//! # Simulator session
//!
//! Serves a single simulator connection. Frames are handled strictly in order, each reply is sent
//! before the next frame is read.
//!
//! ```text
//! Idle -> Connected -> (Telemetry | Manual)* -> Disconnected
//! ```
//!
//! Idle is the executable's accept loop waiting in `SimServer::accept`. A session is only created
//! once a connection has been accepted, so it starts in `Connected`.
//!
//! - Payloads without the sentinel get no reply.
//! - Payloads which don't decode into telemetry get the manual acknowledgment, and the controller
//!   is not run.
//! - Telemetry runs one control cycle. Rejected input is answered with the safe stop command.
//!   The reply is held back by the actuation delay before being sent.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{thread, time::Duration};
use log::{info, trace, warn};

use crate::{
    ctrl_gateway::Optimizer,
    mpc_ctrl::MpcCtrl,
};
use comms_if::{
    net::{ConnEvent, FrameTransport, NetError},
    sim::{InboundFrame, OutboundFrame, ProtocolError, SteerCmd},
};
use util::{archive::Archived, module::State};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A session with one simulator.
pub struct SimSession<O: Optimizer> {
    ctrl: MpcCtrl<O>,

    state: SessionState,

    /// Delay between computing a steering command and sending it
    actuation_delay: Duration,

    /// Name of the peer used in log messages
    peer: String,

    num_cycles: u64
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The state of a session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Connected, no event received yet
    Connected,

    /// The last event was telemetry
    Telemetry,

    /// The last event was not usable telemetry
    Manual,

    /// The connection has closed
    Disconnected
}

#[derive(Debug, thiserror::Error)]
pub enum SimSessionError {
    #[error("Network error: {0}")]
    NetError(NetError),

    #[error("Could not encode the reply: {0}")]
    EncodeError(ProtocolError)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<O: Optimizer> SimSession<O> {
    /// Create a new session driving the given controller.
    ///
    /// A non-positive `actuation_delay_s` disables the delay.
    pub fn new(ctrl: MpcCtrl<O>, actuation_delay_s: f64, peer: &str) -> Self {
        let actuation_delay = if actuation_delay_s > 0.0 {
            Duration::from_secs_f64(actuation_delay_s)
        }
        else {
            Duration::from_secs(0)
        };

        info!("{}: session {:?}", peer, SessionState::Connected);

        Self {
            ctrl,
            state: SessionState::Connected,
            actuation_delay,
            peer: String::from(peer),
            num_cycles: 0
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn ctrl(&self) -> &MpcCtrl<O> {
        &self.ctrl
    }

    /// Number of control cycles run in this session.
    pub fn num_cycles(&self) -> u64 {
        self.num_cycles
    }

    /// Work out the reply to a single payload, or `None` if no reply is due.
    pub fn handle_payload(&mut self, payload: &str) -> Option<OutboundFrame> {
        trace!("{} <- {}", self.peer, payload);

        match InboundFrame::from_payload(payload) {
            InboundFrame::Ignored => None,
            InboundFrame::Manual => {
                self.transition(SessionState::Manual);
                Some(OutboundFrame::Manual)
            },
            InboundFrame::Telemetry(telemetry) => {
                self.transition(SessionState::Telemetry);
                self.num_cycles += 1;

                let cmd = match self.ctrl.proc(&telemetry) {
                    Ok((cmd, _)) => {
                        if let Err(e) = self.ctrl.write() {
                            warn!("{}: could not archive the cycle: {}", self.peer, e);
                        }
                        cmd
                    },
                    Err(e) => {
                        warn!("{}: telemetry rejected, commanding safe stop: {}", self.peer, e);
                        SteerCmd::safe_stop()
                    }
                };

                Some(OutboundFrame::Steer(cmd))
            }
        }
    }

    /// Serve the connection until it closes.
    pub fn run<T: FrameTransport>(&mut self, transport: &mut T) -> Result<(), SimSessionError> {
        let result = self.serve(transport);

        self.transition(SessionState::Disconnected);
        info!("{}: {} control cycles run", self.peer, self.num_cycles);

        result
    }

    fn serve<T: FrameTransport>(&mut self, transport: &mut T) -> Result<(), SimSessionError> {
        loop {
            let payload = match transport.recv().map_err(SimSessionError::NetError)? {
                ConnEvent::Text(p) => p,
                ConnEvent::Closed => return Ok(())
            };

            let frame = match self.handle_payload(&payload) {
                Some(f) => f,
                None => continue
            };

            let reply = frame.to_payload().map_err(SimSessionError::EncodeError)?;

            // Emulate actuator lag on steering commands only
            if let OutboundFrame::Steer(_) = frame {
                if self.actuation_delay > Duration::from_secs(0) {
                    thread::sleep(self.actuation_delay);
                }
            }

            trace!("{} -> {}", self.peer, reply);

            transport.send(reply).map_err(SimSessionError::NetError)?;
        }
    }

    fn transition(&mut self, next: SessionState) {
        if next != self.state {
            info!("{}: session {:?} -> {:?}", self.peer, self.state, next);
            self.state = next;
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::{collections::VecDeque, time::Instant};
    use crate::{ctrl_gateway::test::MockOptimizer, params::VehicleParams};
    use comms_if::sim::{Telemetry, MANUAL_ACK};

    /// In-memory transport replaying a fixed sequence of events.
    struct MockTransport {
        inbound: VecDeque<ConnEvent>,
        sent: Vec<String>
    }

    impl MockTransport {
        fn new(payloads: &[String]) -> Self {
            Self {
                inbound: payloads.iter().cloned().map(ConnEvent::Text).collect(),
                sent: Vec::new()
            }
        }
    }

    impl FrameTransport for MockTransport {
        fn recv(&mut self) -> Result<ConnEvent, NetError> {
            Ok(self.inbound.pop_front().unwrap_or(ConnEvent::Closed))
        }

        fn send(&mut self, payload: String) -> Result<(), NetError> {
            self.sent.push(payload);
            Ok(())
        }
    }

    fn session(delay_s: f64) -> SimSession<MockOptimizer> {
        let ctrl = MpcCtrl::new(
            &VehicleParams::default(),
            MockOptimizer::returning(vec![0.0, 0.25, 4.0, 0.0])
        );
        SimSession::new(ctrl, delay_s, "test")
    }

    fn telemetry_payload(num_waypoints: usize) -> String {
        let ptsx: Vec<f64> = (1..=num_waypoints).map(|k| 5.0 * k as f64).collect();
        Telemetry {
            ptsy: vec![0.0; ptsx.len()],
            ptsx,
            x: 0.0,
            y: 0.0,
            psi: 0.0,
            speed: 20.0,
            steering_angle: 0.0,
            throttle: 0.0
        }.to_payload().unwrap()
    }

    #[test]
    fn test_garbage_gets_manual_ack_without_solve() {
        let mut s = session(0.0);

        for payload in &["42", "42garbage", "42[\"manual\",null]", "42[\"telemetry\",{}]"] {
            let reply = s.handle_payload(payload);
            let expected = if *payload == "42" { None } else { Some(OutboundFrame::Manual) };
            assert_eq!(reply, expected, "payload {}", payload);
        }

        assert_eq!(OutboundFrame::Manual.to_payload().unwrap(), MANUAL_ACK);
        assert!(s.ctrl().optimizer().calls.is_empty());
        assert_eq!(s.state(), SessionState::Manual);
        assert_eq!(s.num_cycles(), 0);
    }

    #[test]
    fn test_no_sentinel_no_reply() {
        let mut s = session(0.0);

        assert_eq!(s.handle_payload(""), None);
        assert_eq!(s.handle_payload("2"), None);
        assert_eq!(s.handle_payload(&telemetry_payload(6)[2..]), None);
        assert_eq!(s.state(), SessionState::Connected);
    }

    #[test]
    fn test_telemetry_gets_steer() {
        let mut s = session(0.0);

        match s.handle_payload(&telemetry_payload(6)) {
            Some(OutboundFrame::Steer(cmd)) => {
                assert_eq!(cmd.throttle, 0.25);
                assert_eq!(cmd.mpc_x, vec![4.0]);
                assert_eq!(cmd.next_x, vec![5.0, 10.0, 15.0, 20.0, 25.0]);
            },
            r => panic!("Expected a steer reply, got {:?}", r)
        }

        assert_eq!(s.ctrl().optimizer().calls.len(), 1);
        assert_eq!(s.state(), SessionState::Telemetry);
    }

    #[test]
    fn test_new_session_starts_connected() {
        let s = session(0.0);

        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(s.num_cycles(), 0);
    }

    #[test]
    fn test_huge_coordinates_safe_stop() {
        let payload = Telemetry {
            ptsx: (1..=6).map(|k| 1e110 * k as f64).collect(),
            ptsy: vec![1.0; 6],
            x: 0.0,
            y: 0.0,
            psi: 0.0,
            speed: 20.0,
            steering_angle: 0.0,
            throttle: 0.0
        }.to_payload().unwrap();
        let mut s = session(0.0);

        assert_eq!(
            s.handle_payload(&payload),
            Some(OutboundFrame::Steer(SteerCmd::safe_stop()))
        );
        assert!(s.ctrl().optimizer().calls.is_empty());

        // The session keeps serving afterwards
        assert!(matches!(s.handle_payload(&telemetry_payload(6)), Some(OutboundFrame::Steer(_))));
    }

    #[test]
    fn test_too_few_waypoints_safe_stop() {
        let mut s = session(0.0);

        assert_eq!(
            s.handle_payload(&telemetry_payload(3)),
            Some(OutboundFrame::Steer(SteerCmd::safe_stop()))
        );
        assert!(s.ctrl().optimizer().calls.is_empty());
    }

    #[test]
    fn test_run_replies_in_order() {
        let mut s = session(0.0);
        let mut transport = MockTransport::new(&[
            String::from("42[\"manual\",null]"),
            telemetry_payload(6),
            String::from("3"),
            telemetry_payload(6),
            String::from("42garbage")
        ]);

        s.run(&mut transport).unwrap();

        assert_eq!(transport.sent.len(), 4);
        assert_eq!(transport.sent[0], MANUAL_ACK);
        assert!(transport.sent[1].starts_with("42[\"steer\","));
        assert!(transport.sent[2].starts_with("42[\"steer\","));
        assert_eq!(transport.sent[3], MANUAL_ACK);

        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(s.num_cycles(), 2);
    }

    #[test]
    fn test_actuation_delay_on_steer_only() {
        let delay_s = 0.05;

        let mut s = session(delay_s);
        let mut transport = MockTransport::new(&[String::from("42garbage")]);
        let start = Instant::now();
        s.run(&mut transport).unwrap();
        assert!(start.elapsed().as_secs_f64() < delay_s);

        let mut s = session(delay_s);
        let mut transport = MockTransport::new(&[telemetry_payload(6)]);
        let start = Instant::now();
        s.run(&mut transport).unwrap();
        assert!(start.elapsed().as_secs_f64() >= delay_s);
        assert_eq!(transport.sent.len(), 1);
    }
}
