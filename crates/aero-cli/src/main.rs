use std::collections::VecDeque;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use aero_fc::link::VehicleLink;
use aero_fc::mav::{self, MavVehicleLink};
use aero_fc::mission::{Action, MissionStateMachine};
use aero_fc::LinkConfig;
use aero_plan::doctor;
use aero_plan::frame::{self, GlobalPosition};
use aero_plan::route::{self, FlightConfig, GoalConfig};
use aero_plan::survey::{self, Survey};
use aero_proto::telemetry::TelemetryEvent;
use aero_proto::waypoint;

use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "aeropath", version, about = "aeropath - obstacle-aware drone mission planner")]
struct Cli {
    #[arg(long)]
    config: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate config and survey data without touching the vehicle.
    Doctor,
    /// Plan a route and print it; optionally write the msgpack blob.
    Plan {
        #[arg(long)]
        out: Option<String>,
    },
    /// Connect to the vehicle and fly the mission end to end.
    Fly,
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    survey: SurveyCfg,
    flight: FlightConfig,
    goal: Option<GoalConfig>,
    start: Option<StartCfg>,
    link: LinkConfig,
}

#[derive(Debug, serde::Deserialize)]
struct SurveyCfg {
    path: String,
}

/// Planning start override for `plan` runs without a vehicle.
#[derive(Debug, serde::Deserialize)]
struct StartCfg {
    lat: f64,
    lon: f64,
    #[serde(default)]
    alt: f64,
}

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

fn load_survey(cfg: &Config) -> Result<Survey> {
    let text = std::fs::read_to_string(&cfg.survey.path)
        .with_context(|| format!("read survey {}", cfg.survey.path))?;
    Ok(survey::parse_survey(&text)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(&cli.config)?;

    match cli.cmd {
        Command::Doctor => run_doctor(&cfg)?,
        Command::Plan { out } => run_plan(&cfg, out.as_deref())?,
        Command::Fly => fly(&cfg).await?,
    }
    Ok(())
}

fn run_doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    doctor::check_flight(&cfg.flight)?;
    if let Some(goal) = &cfg.goal {
        doctor::check_goal(goal)?;
    }
    doctor::check_survey(&cfg.survey.path)?;

    anyhow::ensure!(!cfg.link.host.is_empty(), "link.host missing");
    anyhow::ensure!(cfg.link.port > 0, "link.port invalid");

    info!("doctor: OK");
    Ok(())
}

fn run_plan(cfg: &Config, out: Option<&str>) -> Result<()> {
    let survey = load_survey(cfg)?;

    // Without a vehicle the start comes from [start], or home.
    let vehicle = match &cfg.start {
        Some(s) => GlobalPosition { lat: s.lat, lon: s.lon, alt: s.alt },
        None => survey.home,
    };

    let plan = route::plan_route(&survey, &cfg.flight, cfg.goal, vehicle)?;

    println!(
        "route: {} waypoints ({} raw cells), cost {:.2}",
        plan.waypoints.len(),
        plan.raw_len,
        plan.cost
    );
    for (i, wp) in plan.waypoints.iter().enumerate() {
        println!(
            "  {:>3}: north {:>8.1}  east {:>8.1}  alt {:>6.1}  heading {:.2}",
            i, wp.north, wp.east, wp.alt, wp.heading
        );
    }

    if let Some(path) = out {
        let blob = waypoint::encode(&plan.waypoints).context("encode waypoints")?;
        std::fs::write(path, &blob).with_context(|| format!("write {}", path))?;
        info!("wrote {} bytes to {}", blob.len(), path);
    }
    Ok(())
}

async fn fly(cfg: &Config) -> Result<()> {
    info!("fly: starting");

    let survey = load_survey(cfg)?;
    let (mut link, mut telem) = mav::open_pair(&cfg.link)?;

    // Reader loop in a blocking task (mavlink recv blocks). Companion
    // heartbeats ride the same loop, paced by incoming traffic.
    let (tx, mut rx) = mpsc::channel(64);
    let hb_hz = cfg.link.send_heartbeat_hz.unwrap_or(1.0).max(0.2);
    tokio::task::spawn_blocking(move || {
        let hb_interval = std::time::Duration::from_secs_f32(1.0 / hb_hz);
        let mut last_hb_send = std::time::Instant::now();
        loop {
            if last_hb_send.elapsed() >= hb_interval {
                let _ = telem.send_heartbeat();
                last_hb_send = std::time::Instant::now();
            }
            let ev = match telem.recv_event() {
                Ok(ev) => ev,
                Err(e) => {
                    warn!("telemetry stream ended: {:#}", e);
                    break;
                }
            };
            if tx.blocking_send(ev).is_err() {
                break;
            }
        }
    });

    let mut machine = MissionStateMachine::new(cfg.flight.target_alt, survey.home.alt);
    let mut started = false;

    loop {
        tokio::select! {
            ev = rx.recv() => {
                let Some(ev) = ev else {
                    anyhow::bail!("vehicle connection lost");
                };
                // Wait for the vehicle's heartbeat before arming, so
                // the command gate is satisfied.
                if !started && matches!(ev, TelemetryEvent::ArmedState { .. }) {
                    started = true;
                    execute(machine.start(), &mut machine, &mut link, &survey, cfg);
                }
                execute(machine.handle(&ev), &mut machine, &mut link, &survey, cfg);
                if started && !machine.in_mission() {
                    info!("fly: mission over");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupt: aborting mission");
                execute(machine.abort(), &mut machine, &mut link, &survey, cfg);
                break;
            }
        }
    }
    Ok(())
}

/// Drain a batch of machine actions, feeding any follow-ups (planning
/// results) back through the machine. Commands are fire-and-forget:
/// a failed send is logged and the mission continues.
fn execute(
    actions: Vec<Action>,
    machine: &mut MissionStateMachine,
    link: &mut MavVehicleLink,
    survey: &Survey,
    cfg: &Config,
) {
    let mut queue: VecDeque<Action> = actions.into();
    while let Some(action) = queue.pop_front() {
        let sent = match action {
            Action::Arm => link.arm(),
            Action::Disarm => link.disarm(),
            Action::TakeControl => link.take_control(),
            Action::ReleaseControl => link.release_control(),
            Action::Takeoff(alt) => link.takeoff(alt),
            Action::SetPosition(wp) => link.set_position(wp.north, wp.east, wp.alt, wp.heading),
            Action::Land => link.land(),
            Action::Stop => link.stop(),
            Action::PlanRoute => {
                queue.extend(plan_and_send(machine, link, survey, cfg));
                Ok(())
            }
        };
        if let Err(e) = sent {
            warn!("link command failed: {:#}", e);
        }
    }
}

/// Run the planner from the machine's last known position (or home)
/// and report the outcome back to the machine. The waypoint blob goes
/// to the simulator best-effort; its delivery is advisory.
fn plan_and_send(
    machine: &mut MissionStateMachine,
    link: &mut MavVehicleLink,
    survey: &Survey,
    cfg: &Config,
) -> Vec<Action> {
    let vehicle = match machine.last_local() {
        Some((north, east, down)) => {
            match frame::to_global(frame::LocalPosition { north, east, down }, survey.home) {
                Ok(g) => g,
                Err(e) => {
                    warn!("planning failed: {:#}", e);
                    return machine.route_failed();
                }
            }
        }
        None => survey.home,
    };

    match route::plan_route(survey, &cfg.flight, cfg.goal, vehicle) {
        Ok(plan) => {
            match waypoint::encode(&plan.waypoints) {
                Ok(blob) => {
                    if let Err(e) = link.send_waypoints(&blob) {
                        warn!("waypoint channel send failed: {:#}", e);
                    }
                }
                Err(e) => warn!("waypoint encode failed: {}", e),
            }
            machine.route_ready(plan.waypoints)
        }
        Err(e) => {
            warn!("planning failed: {:#}", e);
            machine.route_failed()
        }
    }
}
