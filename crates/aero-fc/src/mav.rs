use std::collections::VecDeque;
use std::io::Write;
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use mavlink::{
    common::{
        MavAutopilot, MavCmd, MavMessage, MavModeFlag, MavState, MavType,
        PositionTargetTypemask, COMMAND_LONG_DATA, HEARTBEAT_DATA,
        SET_POSITION_TARGET_LOCAL_NED_DATA,
    },
    MavConnection, MavHeader,
};
use tracing::{info, warn};

use aero_proto::telemetry::TelemetryEvent;

use crate::link::VehicleLink;
use crate::LinkConfig;

/// ArduPilot copter custom mode ids used for take/release control.
const COPTER_MODE_STABILIZE: f32 = 0.0;
const COPTER_MODE_GUIDED: f32 = 4.0;

/// Open the command link and the telemetry reader as separate
/// connections to the same endpoint. The reader may block in recv for
/// long stretches, so commands get their own socket; both share the
/// heartbeat-seen flag that gates command sends.
pub fn open_pair(cfg: &LinkConfig) -> Result<(MavVehicleLink, MavTelemetry)> {
    let seen = Arc::new(AtomicBool::new(false));
    let cmd = MavVehicleLink::open(cfg, seen.clone())?;
    let telem = MavTelemetry::open(cfg, seen)?;
    Ok((cmd, telem))
}

fn connect(cfg: &LinkConfig) -> Result<Box<dyn MavConnection<MavMessage> + Send>> {
    let url = format!("tcpout:{}:{}", cfg.host, cfg.port);
    let conn = mavlink::connect::<MavMessage>(&url)
        .with_context(|| format!("mavlink connect {}", url))?;
    Ok(conn)
}

/// Command side of the vehicle link.
pub struct MavVehicleLink {
    conn: Box<dyn MavConnection<MavMessage> + Send>,
    hdr: MavHeader,
    target_sys: u8,
    target_comp: u8,
    require_heartbeat: bool,
    seen_heartbeat: Arc<AtomicBool>,
    wp_addr: (String, u16),
    wp_stream: Option<TcpStream>,
}

impl MavVehicleLink {
    fn open(cfg: &LinkConfig, seen_heartbeat: Arc<AtomicBool>) -> Result<Self> {
        Ok(Self {
            conn: connect(cfg)?,
            hdr: MavHeader { system_id: cfg.sys_id, component_id: cfg.comp_id, sequence: 0 },
            target_sys: cfg.target_sys,
            target_comp: cfg.target_comp,
            require_heartbeat: cfg.require_heartbeat,
            seen_heartbeat,
            wp_addr: (cfg.host.clone(), cfg.port),
            wp_stream: None,
        })
    }

    fn gate(&self) -> Result<()> {
        if self.require_heartbeat && !self.seen_heartbeat.load(Ordering::Relaxed) {
            anyhow::bail!("refusing command: no vehicle heartbeat seen yet");
        }
        Ok(())
    }

    fn send(&mut self, msg: MavMessage) -> Result<()> {
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        self.conn.send(&self.hdr, &msg).context("mavlink send")?;
        Ok(())
    }

    fn send_command(&mut self, cmd: MavCmd, params: [f32; 7]) -> Result<()> {
        self.gate()?;
        let data = COMMAND_LONG_DATA {
            target_system: self.target_sys,
            target_component: self.target_comp,
            command: cmd,
            confirmation: 0,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        };
        self.send(MavMessage::COMMAND_LONG(data))
    }
}

impl VehicleLink for MavVehicleLink {
    fn arm(&mut self) -> Result<()> {
        info!("link: arm");
        self.send_command(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn disarm(&mut self) -> Result<()> {
        info!("link: disarm");
        self.send_command(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn take_control(&mut self) -> Result<()> {
        info!("link: take control (guided)");
        self.send_command(
            MavCmd::MAV_CMD_DO_SET_MODE,
            [1.0, COPTER_MODE_GUIDED, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn release_control(&mut self) -> Result<()> {
        info!("link: release control");
        self.send_command(
            MavCmd::MAV_CMD_DO_SET_MODE,
            [1.0, COPTER_MODE_STABILIZE, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn takeoff(&mut self, alt: f64) -> Result<()> {
        info!("link: takeoff to {:.1} m", alt);
        self.send_command(
            MavCmd::MAV_CMD_NAV_TAKEOFF,
            [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, alt as f32],
        )
    }

    fn set_position(&mut self, north: f64, east: f64, alt: f64, heading: f64) -> Result<()> {
        self.gate()?;
        // Position + yaw setpoint; velocity/acceleration/yaw-rate ignored.
        let type_mask = PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VX_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VY_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_VZ_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AX_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AY_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_AZ_IGNORE
            | PositionTargetTypemask::POSITION_TARGET_TYPEMASK_YAW_RATE_IGNORE;

        let data = SET_POSITION_TARGET_LOCAL_NED_DATA {
            time_boot_ms: 0,
            target_system: self.target_sys,
            target_component: self.target_comp,
            coordinate_frame: mavlink::common::MavFrame::MAV_FRAME_LOCAL_NED,
            type_mask,
            x: north as f32,
            y: east as f32,
            z: -(alt as f32),
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            afx: 0.0,
            afy: 0.0,
            afz: 0.0,
            yaw: heading as f32,
            yaw_rate: 0.0,
        };
        self.send(MavMessage::SET_POSITION_TARGET_LOCAL_NED(data))
    }

    fn land(&mut self) -> Result<()> {
        info!("link: land");
        self.send_command(
            MavCmd::MAV_CMD_NAV_LAND,
            [0.0, 0.0, 0.0, f32::NAN, f32::NAN, f32::NAN, 0.0],
        )
    }

    fn stop(&mut self) -> Result<()> {
        info!("link: stop");
        self.wp_stream = None;
        Ok(())
    }

    fn send_waypoints(&mut self, blob: &[u8]) -> Result<()> {
        // Waypoint list goes over a raw side-channel the simulator
        // reads msgpack from, not over MAVLink.
        let stream = match self.wp_stream.as_mut() {
            Some(s) => s,
            None => {
                let addr = format!("{}:{}", self.wp_addr.0, self.wp_addr.1);
                let stream = TcpStream::connect(&addr)
                    .with_context(|| format!("waypoint channel {}", addr))?;
                self.wp_stream.insert(stream)
            }
        };
        stream.write_all(blob).context("waypoint channel write")?;
        stream.flush().context("waypoint channel flush")?;
        info!("link: sent {} waypoint bytes", blob.len());
        Ok(())
    }
}

/// Telemetry side of the vehicle link. `recv_event` may block; run it
/// from a dedicated blocking task and forward events into a channel.
pub struct MavTelemetry {
    conn: Box<dyn MavConnection<MavMessage> + Send>,
    hdr: MavHeader,
    seen_heartbeat: Arc<AtomicBool>,
    pending: VecDeque<TelemetryEvent>,
    /// Last geodetic altitude from GLOBAL_POSITION_INT, meters.
    last_alt: Option<f64>,
}

impl MavTelemetry {
    fn open(cfg: &LinkConfig, seen_heartbeat: Arc<AtomicBool>) -> Result<Self> {
        Ok(Self {
            conn: connect(cfg)?,
            hdr: MavHeader { system_id: cfg.sys_id, component_id: cfg.comp_id, sequence: 0 },
            seen_heartbeat,
            pending: VecDeque::new(),
            last_alt: None,
        })
    }

    /// Periodic companion heartbeat so the vehicle sees us.
    pub fn send_heartbeat(&mut self) -> Result<()> {
        let hb = HEARTBEAT_DATA {
            custom_mode: 0,
            mavtype: MavType::MAV_TYPE_ONBOARD_CONTROLLER,
            autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
            base_mode: MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED,
            system_status: MavState::MAV_STATE_ACTIVE,
            mavlink_version: 3,
        };
        self.hdr.sequence = self.hdr.sequence.wrapping_add(1);
        self.conn
            .send(&self.hdr, &MavMessage::HEARTBEAT(hb))
            .context("mavlink send heartbeat")?;
        Ok(())
    }

    /// Next telemetry event, blocking until one arrives. Messages that
    /// carry no event (or only update merge state) are skipped.
    pub fn recv_event(&mut self) -> Result<TelemetryEvent> {
        loop {
            if let Some(ev) = self.pending.pop_front() {
                return Ok(ev);
            }
            let (_hdr, msg) = match self.conn.recv() {
                Ok(ok) => ok,
                Err(e) => {
                    warn!("mavlink recv failed: {}", e);
                    anyhow::bail!("mavlink recv: {}", e);
                }
            };
            self.translate(msg);
        }
    }

    fn translate(&mut self, msg: MavMessage) {
        match msg {
            MavMessage::HEARTBEAT(hb) => {
                self.seen_heartbeat.store(true, Ordering::Relaxed);
                let armed =
                    (hb.base_mode.bits() & MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED.bits()) != 0;
                let guided =
                    (hb.base_mode.bits() & MavModeFlag::MAV_MODE_FLAG_GUIDED_ENABLED.bits()) != 0;
                self.pending.push_back(TelemetryEvent::ArmedState { armed, guided });
            }
            MavMessage::LOCAL_POSITION_NED(p) => {
                // Altitude merged from the last global fix; NaN until
                // one arrives, which keeps the landing guard false.
                self.pending.push_back(TelemetryEvent::LocalPosition {
                    north: p.x as f64,
                    east: p.y as f64,
                    down: p.z as f64,
                    alt: self.last_alt.unwrap_or(f64::NAN),
                });
                self.pending.push_back(TelemetryEvent::Velocity {
                    north: p.vx as f64,
                    east: p.vy as f64,
                    down: p.vz as f64,
                });
            }
            MavMessage::GLOBAL_POSITION_INT(g) => {
                self.last_alt = Some(g.alt as f64 / 1000.0);
            }
            _ => {}
        }
    }
}
