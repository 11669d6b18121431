//! Obstacle survey parsing.
//!
//! Survey files are line-oriented:
//! - line 1: `lat0 <f64>, lon0 <f64>` — home geodetic reference
//! - line 2: column header (skipped)
//! - rest:   `posN,posE,posAlt,halfN,halfE,halfAlt` per obstacle

use crate::error::PlanError;
use crate::frame::GlobalPosition;

/// One surveyed obstacle: axis-aligned box center plus half-extents,
/// in local coordinates relative to the survey home.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObstacleRecord {
    pub north: f64,
    pub east: f64,
    pub alt: f64,
    pub half_north: f64,
    pub half_east: f64,
    pub half_alt: f64,
}

impl ObstacleRecord {
    /// Top altitude of the obstacle box.
    pub fn top(&self) -> f64 {
        self.alt + self.half_alt
    }
}

#[derive(Debug, Clone)]
pub struct Survey {
    pub home: GlobalPosition,
    pub obstacles: Vec<ObstacleRecord>,
}

/// Parse a survey file's contents.
pub fn parse_survey(text: &str) -> Result<Survey, PlanError> {
    let mut lines = text.lines();

    let first = lines.next().ok_or(PlanError::Parse {
        line: 1,
        msg: "empty survey: missing home reference line".into(),
    })?;
    let home = parse_home_line(first)?;

    // line 2 is the column header
    if lines.next().is_none() {
        return Err(PlanError::Parse { line: 2, msg: "missing column header line".into() });
    }

    let mut obstacles = Vec::new();
    for (i, line) in lines.enumerate() {
        let lineno = i + 3;
        if line.trim().is_empty() {
            continue;
        }
        obstacles.push(parse_obstacle_line(line, lineno)?);
    }

    Ok(Survey { home, obstacles })
}

/// Home reference line: `lat0 37.792480, lon0 -122.397450`.
fn parse_home_line(line: &str) -> Result<GlobalPosition, PlanError> {
    let err = |msg: &str| PlanError::Parse { line: 1, msg: msg.into() };

    let mut lat = None;
    let mut lon = None;
    for field in line.split(',') {
        let mut it = field.split_whitespace();
        let key = it.next().ok_or_else(|| err("empty home field"))?;
        let val: f64 = it
            .next()
            .ok_or_else(|| err("home field missing value"))?
            .parse()
            .map_err(|_| err("home field value is not a number"))?;
        match key {
            "lat0" => lat = Some(val),
            "lon0" => lon = Some(val),
            other => return Err(err(&format!("unexpected home field '{}'", other))),
        }
    }

    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(GlobalPosition { lat, lon, alt: 0.0 }),
        _ => Err(err("home reference must provide both lat0 and lon0")),
    }
}

fn parse_obstacle_line(line: &str, lineno: usize) -> Result<ObstacleRecord, PlanError> {
    let vals: Vec<f64> = line
        .split(',')
        .map(|f| f.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|_| PlanError::Parse {
            line: lineno,
            msg: format!("obstacle row is not 6 comma-separated numbers: '{}'", line.trim()),
        })?;

    if vals.len() != 6 {
        return Err(PlanError::Parse {
            line: lineno,
            msg: format!("expected 6 columns, got {}", vals.len()),
        });
    }

    Ok(ObstacleRecord {
        north: vals[0],
        east: vals[1],
        alt: vals[2],
        half_north: vals[3],
        half_east: vals[4],
        half_alt: vals[5],
    })
}
