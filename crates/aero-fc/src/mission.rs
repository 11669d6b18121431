//! Mission state machine.
//!
//! A pure transition core: `(state, event) -> actions`. The machine
//! never touches the link itself; it returns the commands the caller
//! should issue, which keeps every transition testable without a
//! vehicle. Events that do not match the active state's trigger are
//! no-ops.

use std::collections::VecDeque;

use tracing::{debug, info};

use aero_proto::telemetry::TelemetryEvent;
use aero_proto::waypoint::Waypoint;

/// Takeoff completes when the vehicle reaches this fraction of the
/// target altitude.
const TAKEOFF_ALT_FRACTION: f64 = 0.95;
/// A waypoint counts as reached inside this horizontal radius, meters.
const WAYPOINT_RADIUS_M: f64 = 1.0;
/// Landing is only commanded once horizontal speed drops below this.
const SETTLE_SPEED_MPS: f64 = 1.0;
/// Landed when the geodetic altitude is within this of home...
const LANDED_ALT_DELTA_M: f64 = 0.1;
/// ...and the vertical position magnitude is within this.
const LANDED_DOWN_EPS_M: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightState {
    Manual,
    Arming,
    Planning,
    Takeoff,
    Waypoint,
    Landing,
    Disarming,
}

/// Side effects a transition asks the caller to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Arm,
    TakeControl,
    ReleaseControl,
    /// Run the route planner and feed the result back through
    /// [`MissionStateMachine::route_ready`] / `route_failed`.
    PlanRoute,
    Takeoff(f64),
    SetPosition(Waypoint),
    Land,
    Disarm,
    Stop,
}

pub struct MissionStateMachine {
    state: FlightState,
    in_mission: bool,
    target_alt: f64,
    home_alt: f64,
    waypoints: VecDeque<Waypoint>,
    target: Option<Waypoint>,
    /// Last reported local position (north, east, down).
    local: Option<(f64, f64, f64)>,
    /// Last reported geodetic altitude.
    global_alt: Option<f64>,
    /// Last reported horizontal speed.
    horizontal_speed: Option<f64>,
}

impl MissionStateMachine {
    pub fn new(target_alt: f64, home_alt: f64) -> Self {
        Self {
            state: FlightState::Manual,
            in_mission: false,
            target_alt,
            home_alt,
            waypoints: VecDeque::new(),
            target: None,
            local: None,
            global_alt: None,
            horizontal_speed: None,
        }
    }

    pub fn state(&self) -> FlightState {
        self.state
    }

    pub fn in_mission(&self) -> bool {
        self.in_mission
    }

    pub fn remaining_waypoints(&self) -> usize {
        self.waypoints.len()
    }

    /// Last reported local position, for resolving the planning start.
    pub fn last_local(&self) -> Option<(f64, f64, f64)> {
        self.local
    }

    /// Begin the mission: MANUAL -> ARMING.
    pub fn start(&mut self) -> Vec<Action> {
        if self.state != FlightState::Manual || self.in_mission {
            return Vec::new();
        }
        self.in_mission = true;
        self.state = FlightState::Arming;
        info!("arming transition");
        vec![Action::Arm, Action::TakeControl]
    }

    /// Planning finished: PLANNING -> TAKEOFF.
    pub fn route_ready(&mut self, waypoints: Vec<Waypoint>) -> Vec<Action> {
        if self.state != FlightState::Planning {
            return Vec::new();
        }
        self.waypoints = waypoints.into();
        self.state = FlightState::Takeoff;
        info!("takeoff transition: {} waypoints queued", self.waypoints.len());
        vec![Action::Takeoff(self.target_alt)]
    }

    /// Planning failed (unreachable goal or unusable input): abort.
    pub fn route_failed(&mut self) -> Vec<Action> {
        self.abort()
    }

    /// Abort to MANUAL: clear the queue, mark the mission inactive,
    /// and stop. Nothing further is processed.
    pub fn abort(&mut self) -> Vec<Action> {
        self.waypoints.clear();
        self.target = None;
        self.state = FlightState::Manual;
        self.in_mission = false;
        info!("manual transition");
        vec![Action::Stop]
    }

    /// Process one telemetry event to completion.
    pub fn handle(&mut self, event: &TelemetryEvent) -> Vec<Action> {
        if !self.in_mission {
            return Vec::new();
        }

        match *event {
            TelemetryEvent::LocalPosition { north, east, down, alt } => {
                self.local = Some((north, east, down));
                if alt.is_finite() {
                    self.global_alt = Some(alt);
                }
                self.on_position(north, east, down)
            }
            TelemetryEvent::Velocity { north, east, .. } => {
                self.horizontal_speed = Some((north * north + east * east).sqrt());
                match self.state {
                    FlightState::Landing => self.check_landed(),
                    _ => Vec::new(),
                }
            }
            TelemetryEvent::ArmedState { armed, guided } => self.on_armed_state(armed, guided),
        }
    }

    fn on_position(&mut self, north: f64, east: f64, down: f64) -> Vec<Action> {
        match self.state {
            FlightState::Takeoff => {
                if -down >= TAKEOFF_ALT_FRACTION * self.target_alt {
                    self.next_waypoint_or_land()
                } else {
                    Vec::new()
                }
            }
            FlightState::Waypoint => {
                let Some(target) = self.target else {
                    return Vec::new();
                };
                if target.horizontal_distance_to(north, east) >= WAYPOINT_RADIUS_M {
                    return Vec::new();
                }
                if !self.waypoints.is_empty() {
                    self.next_waypoint_or_land()
                } else if self.horizontal_speed.is_some_and(|v| v < SETTLE_SPEED_MPS) {
                    self.state = FlightState::Landing;
                    info!("landing transition");
                    vec![Action::Land]
                } else {
                    Vec::new()
                }
            }
            FlightState::Landing => self.check_landed(),
            _ => Vec::new(),
        }
    }

    fn on_armed_state(&mut self, armed: bool, guided: bool) -> Vec<Action> {
        match self.state {
            FlightState::Arming if armed => {
                self.state = FlightState::Planning;
                info!("planning transition: searching for a path");
                vec![Action::PlanRoute]
            }
            FlightState::Disarming if !armed && !guided => {
                self.state = FlightState::Manual;
                self.in_mission = false;
                info!("manual transition: mission complete");
                vec![Action::Stop]
            }
            _ => {
                debug!("armed state ignored in {:?}", self.state);
                Vec::new()
            }
        }
    }

    /// Dequeue the next waypoint, or land when the queue is empty.
    fn next_waypoint_or_land(&mut self) -> Vec<Action> {
        match self.waypoints.pop_front() {
            Some(wp) => {
                info!(
                    "waypoint transition: ({:.1}, {:.1}, {:.1}), {} remaining",
                    wp.north,
                    wp.east,
                    wp.alt,
                    self.waypoints.len()
                );
                self.target = Some(wp);
                self.state = FlightState::Waypoint;
                vec![Action::SetPosition(wp)]
            }
            None => {
                self.state = FlightState::Landing;
                info!("landing transition");
                vec![Action::Land]
            }
        }
    }

    fn check_landed(&mut self) -> Vec<Action> {
        let (Some(alt), Some((_, _, down))) = (self.global_alt, self.local) else {
            return Vec::new();
        };
        if alt - self.home_alt < LANDED_ALT_DELTA_M && down.abs() < LANDED_DOWN_EPS_M {
            self.state = FlightState::Disarming;
            info!("disarm transition");
            vec![Action::Disarm, Action::ReleaseControl]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(north: f64, east: f64) -> Waypoint {
        Waypoint::new(north, east, 5.0, 0.0)
    }

    fn position(north: f64, east: f64, down: f64, alt: f64) -> TelemetryEvent {
        TelemetryEvent::LocalPosition { north, east, down, alt }
    }

    fn velocity(north: f64, east: f64) -> TelemetryEvent {
        TelemetryEvent::Velocity { north, east, down: 0.0 }
    }

    fn armed(armed: bool, guided: bool) -> TelemetryEvent {
        TelemetryEvent::ArmedState { armed, guided }
    }

    /// Drive a fresh machine to the WAYPOINT state with the given queue.
    fn machine_at_waypoint(waypoints: Vec<Waypoint>) -> MissionStateMachine {
        let mut m = MissionStateMachine::new(5.0, 0.0);
        m.start();
        m.handle(&armed(true, true));
        m.route_ready(waypoints);
        m.handle(&position(0.0, 0.0, -4.9, 4.9));
        assert_eq!(m.state(), FlightState::Waypoint);
        m
    }

    #[test]
    fn test_start_arms_and_takes_control() {
        let mut m = MissionStateMachine::new(5.0, 0.0);
        let actions = m.start();

        assert_eq!(actions, vec![Action::Arm, Action::TakeControl]);
        assert_eq!(m.state(), FlightState::Arming);
        assert!(m.in_mission());
    }

    #[test]
    fn test_arming_waits_for_armed() {
        let mut m = MissionStateMachine::new(5.0, 0.0);
        m.start();

        // Not armed yet: no transition.
        assert!(m.handle(&armed(false, true)).is_empty());
        assert_eq!(m.state(), FlightState::Arming);

        let actions = m.handle(&armed(true, true));
        assert_eq!(actions, vec![Action::PlanRoute]);
        assert_eq!(m.state(), FlightState::Planning);
    }

    #[test]
    fn test_route_ready_commands_takeoff() {
        let mut m = MissionStateMachine::new(5.0, 0.0);
        m.start();
        m.handle(&armed(true, true));

        let actions = m.route_ready(vec![wp(10.0, 0.0)]);
        assert_eq!(actions, vec![Action::Takeoff(5.0)]);
        assert_eq!(m.state(), FlightState::Takeoff);
        assert_eq!(m.remaining_waypoints(), 1);
    }

    #[test]
    fn test_takeoff_completes_at_95_percent() {
        let mut m = MissionStateMachine::new(10.0, 0.0);
        m.start();
        m.handle(&armed(true, true));
        m.route_ready(vec![wp(10.0, 0.0)]);

        // Below threshold: still climbing.
        assert!(m.handle(&position(0.0, 0.0, -9.0, 9.0)).is_empty());
        assert_eq!(m.state(), FlightState::Takeoff);

        let actions = m.handle(&position(0.0, 0.0, -9.6, 9.6));
        assert_eq!(actions, vec![Action::SetPosition(wp(10.0, 0.0))]);
        assert_eq!(m.state(), FlightState::Waypoint);
        assert_eq!(m.remaining_waypoints(), 0);
    }

    #[test]
    fn test_empty_route_lands_after_takeoff() {
        let mut m = MissionStateMachine::new(5.0, 0.0);
        m.start();
        m.handle(&armed(true, true));
        m.route_ready(Vec::new());

        let actions = m.handle(&position(0.0, 0.0, -5.0, 5.0));
        assert_eq!(actions, vec![Action::Land]);
        assert_eq!(m.state(), FlightState::Landing);
    }

    #[test]
    fn test_waypoint_dequeues_within_radius() {
        let mut m = machine_at_waypoint(vec![wp(10.0, 0.0), wp(10.0, 10.0)]);
        // First dequeue happened at takeoff completion; target (10, 0),
        // one left in the queue.
        assert_eq!(m.remaining_waypoints(), 1);

        // Distance 0.5 < 1.0: dequeue the next one, stay in WAYPOINT.
        let actions = m.handle(&position(9.5, 0.0, -5.0, 5.0));
        assert_eq!(actions, vec![Action::SetPosition(wp(10.0, 10.0))]);
        assert_eq!(m.state(), FlightState::Waypoint);
        assert_eq!(m.remaining_waypoints(), 0);
    }

    #[test]
    fn test_waypoint_far_away_is_noop() {
        let mut m = machine_at_waypoint(vec![wp(10.0, 0.0), wp(10.0, 10.0)]);
        assert!(m.handle(&position(5.0, 0.0, -5.0, 5.0)).is_empty());
        assert_eq!(m.state(), FlightState::Waypoint);
        assert_eq!(m.remaining_waypoints(), 1);
    }

    #[test]
    fn test_final_waypoint_waits_for_settle() {
        let mut m = machine_at_waypoint(vec![wp(10.0, 0.0)]);
        assert_eq!(m.remaining_waypoints(), 0);

        // At the waypoint but still moving fast: hold.
        m.handle(&velocity(3.0, 0.0));
        assert!(m.handle(&position(9.8, 0.0, -5.0, 5.0)).is_empty());
        assert_eq!(m.state(), FlightState::Waypoint);

        // Slowed down: land.
        m.handle(&velocity(0.3, 0.0));
        let actions = m.handle(&position(9.8, 0.0, -5.0, 5.0));
        assert_eq!(actions, vec![Action::Land]);
        assert_eq!(m.state(), FlightState::Landing);
    }

    #[test]
    fn test_landing_disarms_on_touchdown() {
        let mut m = machine_at_waypoint(vec![wp(10.0, 0.0)]);
        m.handle(&velocity(0.1, 0.0));
        m.handle(&position(9.9, 0.0, -5.0, 5.0));
        assert_eq!(m.state(), FlightState::Landing);

        // Still descending.
        assert!(m.handle(&position(9.9, 0.0, -1.0, 1.0)).is_empty());

        let actions = m.handle(&position(9.9, 0.0, -0.005, 0.05));
        assert_eq!(actions, vec![Action::Disarm, Action::ReleaseControl]);
        assert_eq!(m.state(), FlightState::Disarming);
    }

    #[test]
    fn test_disarming_finishes_mission() {
        let mut m = machine_at_waypoint(vec![wp(10.0, 0.0)]);
        m.handle(&velocity(0.1, 0.0));
        m.handle(&position(9.9, 0.0, -5.0, 5.0));
        m.handle(&position(9.9, 0.0, -0.005, 0.05));
        assert_eq!(m.state(), FlightState::Disarming);

        // Disarmed but still guided: not done yet.
        assert!(m.handle(&armed(false, true)).is_empty());
        assert_eq!(m.state(), FlightState::Disarming);

        let actions = m.handle(&armed(false, false));
        assert_eq!(actions, vec![Action::Stop]);
        assert_eq!(m.state(), FlightState::Manual);
        assert!(!m.in_mission());

        // Terminal: further events are ignored.
        assert!(m.handle(&armed(true, true)).is_empty());
        assert_eq!(m.state(), FlightState::Manual);
    }

    #[test]
    fn test_unmatched_events_are_noops() {
        let mut m = MissionStateMachine::new(5.0, 0.0);
        m.start();

        // Position and velocity mean nothing while ARMING.
        assert!(m.handle(&position(0.0, 0.0, 0.0, 0.0)).is_empty());
        assert!(m.handle(&velocity(0.0, 0.0)).is_empty());
        assert_eq!(m.state(), FlightState::Arming);

        m.handle(&armed(true, true));
        assert_eq!(m.state(), FlightState::Planning);
        // Telemetry during planning is a no-op too.
        assert!(m.handle(&position(0.0, 0.0, -5.0, 5.0)).is_empty());
        assert_eq!(m.state(), FlightState::Planning);
    }

    #[test]
    fn test_abort_clears_queue_and_stops() {
        let mut m = machine_at_waypoint(vec![wp(10.0, 0.0), wp(20.0, 0.0)]);
        let actions = m.abort();

        assert_eq!(actions, vec![Action::Stop]);
        assert_eq!(m.state(), FlightState::Manual);
        assert!(!m.in_mission());
        assert_eq!(m.remaining_waypoints(), 0);

        // Nothing is processed after an abort.
        assert!(m.handle(&position(0.0, 0.0, -5.0, 5.0)).is_empty());
    }

    #[test]
    fn test_route_failed_aborts_from_planning() {
        let mut m = MissionStateMachine::new(5.0, 0.0);
        m.start();
        m.handle(&armed(true, true));
        assert_eq!(m.state(), FlightState::Planning);

        let actions = m.route_failed();
        assert_eq!(actions, vec![Action::Stop]);
        assert_eq!(m.state(), FlightState::Manual);
        assert!(!m.in_mission());
    }

    #[test]
    fn test_nan_altitude_never_triggers_landing() {
        let mut m = machine_at_waypoint(vec![wp(10.0, 0.0)]);
        m.handle(&velocity(0.1, 0.0));
        m.handle(&position(9.9, 0.0, -5.0, f64::NAN));
        assert_eq!(m.state(), FlightState::Landing);

        // No finite global altitude seen: stay in LANDING.
        assert!(m.handle(&position(9.9, 0.0, -0.001, f64::NAN)).is_empty());
        assert_eq!(m.state(), FlightState::Landing);
    }
}
