use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{
    error::{OrreryError, OrreryResult},
    snapshot::Snapshot,
};

#[derive(Debug, Serialize, PartialEq)]
pub struct BodyStateOut {
    pub frame: u64,          // Index of the rendered frame
    pub epoch: String,       // Calendar time of the frame, RFC 3339
    pub sim_time_s: f64,     // Simulation time
    pub name: String,        // Name of the body
    pub kind: String,        // star, planet or satellite
    pub x_coord: f64,        // Coordinate of body in the x axis, km
    pub y_coord: f64,        // Coordinate of body in the y axis, km
    pub z_coord: f64,        // Coordinate of body in the z axis, km
    pub x_velocity: f64,     // Velocity of body in the x axis, km/s
    pub y_velocity: f64,     // Velocity of body in the y axis, km/s
    pub z_velocity: f64,     // Velocity of body in the z axis, km/s
    pub radius_km: f64,
    pub color: String,
}

/// Consumer of per-frame snapshots. Stands in for the render loop when the
/// simulation runs headless.
pub trait SimulationOutput {
    fn write_out_snapshot(&mut self, snapshot: &Snapshot, epoch: DateTime<Utc>)
        -> OrreryResult<()>;
}

/// Calendar time of a simulation time, relative to the run's start epoch.
/// Fails when the result falls outside the range chrono can represent.
pub fn sim_time_to_epoch(start: DateTime<Utc>, sim_time_s: f64) -> OrreryResult<DateTime<Utc>> {
    Duration::try_milliseconds((sim_time_s * 1000.0) as i64)
        .and_then(|offset| start.checked_add_signed(offset))
        .ok_or_else(|| {
            OrreryError::invalid(format!(
                "{} simulated seconds after {} is outside the supported calendar range",
                sim_time_s, start
            ))
        })
}

/// Flatten a snapshot into one output row per body.
pub fn snapshot_to_output_form(
    snapshot: &Snapshot,
    start: DateTime<Utc>,
) -> OrreryResult<Vec<BodyStateOut>> {
    let epoch = sim_time_to_epoch(start, snapshot.sim_time_s)?.to_rfc3339();

    let rows = snapshot
        .bodies
        .iter()
        .map(|body| BodyStateOut {
            frame: snapshot.frame,
            epoch: epoch.clone(),
            sim_time_s: snapshot.sim_time_s,
            name: body.name.clone(),
            kind: body.kind.to_string(),
            x_coord: body.position.x,
            y_coord: body.position.y,
            z_coord: body.position.z,
            x_velocity: body.velocity.x,
            y_velocity: body.velocity.y,
            z_velocity: body.velocity.z,
            radius_km: body.radius_km,
            color: body.color.to_string(),
        })
        .collect();

    Ok(rows)
}

pub mod csv_output {
    use std::fs;
    use std::path::{Path, PathBuf};

    use chrono::{DateTime, Utc};
    use tracing::info;

    use super::{snapshot_to_output_form, SimulationOutput};
    use crate::{error::OrreryResult, snapshot::Snapshot};

    pub struct CSVController {
        run_dir: PathBuf,
        body_state_writer: csv::Writer<fs::File>,
    }

    impl CSVController {
        /// Create a timestamped run directory below `dir_filepath` and open
        /// the body state file inside it.
        pub fn new(dir_filepath: &str) -> OrreryResult<Self> {
            let sub_dirpath = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
            let full_dirpath = Path::new(dir_filepath).join(sub_dirpath);
            fs::create_dir_all(&full_dirpath)?;

            let body_state_writer =
                csv::Writer::from_path(full_dirpath.join("orrery_body_states.csv"))?;
            info!(dir = %full_dirpath.display(), "writing snapshots as csv");

            Ok(CSVController {
                run_dir: full_dirpath,
                body_state_writer,
            })
        }

        pub fn run_dir(&self) -> &Path {
            &self.run_dir
        }
    }

    impl SimulationOutput for CSVController {
        fn write_out_snapshot(
            &mut self,
            snapshot: &Snapshot,
            epoch: DateTime<Utc>,
        ) -> OrreryResult<()> {
            for row in snapshot_to_output_form(snapshot, epoch)? {
                self.body_state_writer.serialize(row)?;
            }
            self.body_state_writer.flush()?;
            Ok(())
        }
    }
}
