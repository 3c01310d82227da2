use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Parser;

use crate::{
    bodies::registry::ReferenceFrame,
    gravity::{common::GravityUnits, integrator::IntegrationScheme},
};

/// Defines the argument structure for the orrery simulation program
#[derive(Parser, Debug)]
#[command(
    name = "orrery",
    version,
    about = "Physics-stepped simulation of the Solar System driven by measured orbital data."
)]
pub struct ProgramArgs {
    /// TOML or JSON data store containing the bodies at initialization.
    pub input: PathBuf,

    /// TOML configuration file. Command line flags take precedence.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output specifier
    #[arg(short, long, value_name = "DIR_NAME")]
    pub out: Option<String>,

    /// Simulation time step interval in seconds
    #[arg(short = 's', long = "step", value_name = "STEP_INTERVAL")]
    pub fixed_dt: Option<f64>,

    /// Simulated seconds per wall-clock second
    #[arg(long)]
    pub time_scale: Option<f64>,

    /// Rendered frames per wall-clock second
    #[arg(long)]
    pub frame_rate: Option<f64>,

    /// Simulated seconds until the run stops
    #[arg(short, long, value_name = "SECONDS")]
    pub duration: Option<f64>,

    /// Minimum simulated seconds between written frames
    #[arg(long, value_name = "SECONDS")]
    pub write_period: Option<f64>,

    /// Upper bound on physics steps run in a single frame
    #[arg(long)]
    pub max_steps_per_frame: Option<u64>,

    /// Gravitational constant, SI units unless --g-units says otherwise
    #[arg(long)]
    pub gravitational_constant: Option<f64>,

    /// Units of --gravitational-constant: si or km
    #[arg(long)]
    pub g_units: Option<GravityUnits>,

    /// Integration scheme: verlet, leapfrog or euler
    #[arg(long)]
    pub integrator: Option<IntegrationScheme>,

    /// Coordinate frame origin: barycentric or heliocentric
    #[arg(long)]
    pub frame: Option<ReferenceFrame>,

    /// Calendar date of simulation time zero, ISO 8601
    #[arg(long)]
    pub epoch: Option<DateTime<Utc>>,

    /// Pace frames against the wall clock instead of running flat out
    #[arg(long)]
    pub realtime: bool,
}
