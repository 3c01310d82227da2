use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::{
    clock::SimulationClock,
    error::{OrreryError, OrreryResult},
    gravity::integrator::GravityIntegrator,
    input::SimulationParameters,
    output::SimulationOutput,
    snapshot::{Snapshot, SnapshotPublisher},
    state::SimulationState,
};

/// What a finished run did.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub frames_written: u64,
    pub steps: u64,
    pub sim_time_s: f64,
    pub relative_energy_drift: f64,
}

fn should_simulation_halt(state: &SimulationState, runtime_params: &SimulationParameters) -> bool {
    state.sim_time_s() + 1e-6 >= runtime_params.duration_s
}

fn relative_drift(initial: f64, current: f64) -> f64 {
    if initial == 0.0 {
        (current - initial).abs()
    } else {
        ((current - initial) / initial).abs()
    }
}

/// Write the snapshot if enough simulated time has passed since the last
/// write. Returns the step count of the last written snapshot.
fn write_out_simulation_results(
    snapshot: &Snapshot,
    output_controller: &mut dyn SimulationOutput,
    runtime_params: &SimulationParameters,
    last_write: Option<(u64, f64)>,
    force: bool,
) -> OrreryResult<Option<(u64, f64)>> {
    if let Some((last_step, last_time)) = last_write {
        if snapshot.step_count == last_step {
            return Ok(last_write);
        }
        if !force && snapshot.sim_time_s < last_time + runtime_params.write_period_s - 0.001 {
            return Ok(last_write);
        }
    }

    output_controller.write_out_snapshot(snapshot, runtime_params.epoch)?;
    Ok(Some((snapshot.step_count, snapshot.sim_time_s)))
}

/// Wait out the rest of the current frame and return the wall seconds it
/// actually took.
fn pace_frame(frame_start: &mut Instant, frame_period: Duration) -> f64 {
    let elapsed = frame_start.elapsed();
    if elapsed < frame_period {
        thread::sleep(frame_period - elapsed);
    }
    let now = Instant::now();
    let wall_seconds = now.duration_since(*frame_start).as_secs_f64();
    *frame_start = now;
    wall_seconds
}

/// Main frame loop. Every frame the clock converts elapsed wall time into a
/// whole number of physics steps, the integrator runs them one after another
/// and the publisher hands a snapshot of the completed state to the output.
///
/// Runs on the calling thread. The stop condition is only checked between
/// steps, so the state handed out is always a completed step.
pub fn simulate(
    mut state: SimulationState,
    integrator: &GravityIntegrator,
    mut clock: SimulationClock,
    output_controller: &mut dyn SimulationOutput,
    runtime_params: &SimulationParameters,
) -> OrreryResult<RunSummary> {
    if clock.time_scale() <= 0.0 {
        return Err(OrreryError::invalid(
            "a time_scale of zero never reaches the end of the run",
        ));
    }

    let g_km = integrator.g_km();
    let initial_energy = state.total_energy(g_km);
    let frame_period_s = 1.0 / runtime_params.frame_rate;
    let mut publisher = SnapshotPublisher::new();
    let mut frames_written = 0u64;

    info!(
        bodies = state.len(),
        integrator = %integrator.scheme(),
        fixed_dt = clock.fixed_dt(),
        time_scale = clock.time_scale(),
        duration_s = runtime_params.duration_s,
        "starting simulation"
    );

    // Capture the initial state before any step runs.
    let snapshot = publisher.publish(&state);
    let mut last_write =
        write_out_simulation_results(&snapshot, output_controller, runtime_params, None, true)?;
    frames_written += 1;

    let mut frame_start = Instant::now();
    while !should_simulation_halt(&state, runtime_params) {
        let elapsed = if runtime_params.realtime {
            pace_frame(&mut frame_start, Duration::from_secs_f64(frame_period_s))
        } else {
            frame_period_s
        };

        let steps = clock.accumulate(elapsed);
        for _ in 0..steps {
            integrator.step(&mut state, clock.fixed_dt())?;
            if should_simulation_halt(&state, runtime_params) {
                break;
            }
        }

        let snapshot = publisher.publish(&state);
        let finished = should_simulation_halt(&state, runtime_params);
        let written = write_out_simulation_results(
            &snapshot,
            output_controller,
            runtime_params,
            last_write,
            finished,
        )?;
        if written != last_write {
            frames_written += 1;
            debug!(
                frame = snapshot.frame,
                sim_time_s = snapshot.sim_time_s,
                energy_drift = relative_drift(initial_energy, state.total_energy(g_km)),
                "frame written"
            );
        }
        last_write = written;
    }

    let summary = RunSummary {
        frames: publisher.frames_published(),
        frames_written,
        steps: state.step_count(),
        sim_time_s: state.sim_time_s(),
        relative_energy_drift: relative_drift(initial_energy, state.total_energy(g_km)),
    };
    info!(
        frames = summary.frames,
        steps = summary.steps,
        sim_time_s = summary.sim_time_s,
        energy_drift = summary.relative_energy_drift,
        "simulation finished"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::body::{Body, BodyKind, Color};
    use crate::gravity::common::GravitationalConstant;
    use crate::gravity::integrator::IntegrationScheme;
    use crate::types::Array3d;
    use chrono::{DateTime, Utc};

    #[derive(Default)]
    struct MemoryOutput {
        snapshots: Vec<Snapshot>,
    }

    impl SimulationOutput for MemoryOutput {
        fn write_out_snapshot(
            &mut self,
            snapshot: &Snapshot,
            _epoch: DateTime<Utc>,
        ) -> OrreryResult<()> {
            self.snapshots.push(snapshot.clone());
            Ok(())
        }
    }

    fn sun_earth() -> SimulationState {
        let g_km = GravitationalConstant::default().km_scaled();
        let au = 149_597_870.7;
        SimulationState::new(vec![
            Body::new(
                "Sun",
                BodyKind::Star,
                1.989e30,
                695_700.0,
                Color(255, 204, 0),
                Array3d::default(),
                Array3d::default(),
            )
            .unwrap(),
            Body::new(
                "Earth",
                BodyKind::Planet,
                5.972e24,
                6371.0,
                Color(100, 149, 237),
                Array3d::new(au, 0.0, 0.0),
                Array3d::new(0.0, (g_km * 1.989e30 / au).sqrt(), 0.0),
            )
            .unwrap(),
        ])
        .unwrap()
    }

    fn params(duration_s: f64) -> SimulationParameters {
        SimulationParameters {
            fixed_dt: 3600.0,
            time_scale: 86400.0,
            frame_rate: 4.0,
            duration_s,
            ..Default::default()
        }
    }

    fn integrator() -> GravityIntegrator {
        GravityIntegrator::new(IntegrationScheme::VelocityVerlet, GravitationalConstant::default())
            .unwrap()
    }

    #[test]
    fn test_simulate_runs_to_duration() {
        // A frame at 4 fps and one day per wall second owes 6 hours: 6 steps.
        let params = params(30.0 * 86400.0);
        let clock = SimulationClock::new(params.fixed_dt, params.time_scale).unwrap();
        let mut output = MemoryOutput::default();

        let summary = simulate(sun_earth(), &integrator(), clock, &mut output, &params).unwrap();

        assert_eq!(summary.steps, 720);
        assert!((summary.sim_time_s - 30.0 * 86400.0).abs() < 1e-6);
        assert_eq!(summary.frames, 121);
        assert_eq!(summary.frames_written, 121);
        assert!(summary.relative_energy_drift < 1e-8);

        assert_eq!(output.snapshots.len(), 121);
        assert_eq!(output.snapshots[0].step_count, 0);
        assert_eq!(output.snapshots[1].step_count, 6);
        assert!(output
            .snapshots
            .windows(2)
            .all(|w| w[1].sim_time_s > w[0].sim_time_s));
    }

    #[test]
    fn test_write_period_throttles_output() {
        let mut params = params(10.0 * 86400.0);
        params.write_period_s = 86400.0;
        let clock = SimulationClock::new(params.fixed_dt, params.time_scale).unwrap();
        let mut output = MemoryOutput::default();

        let summary = simulate(sun_earth(), &integrator(), clock, &mut output, &params).unwrap();

        // Initial state plus one snapshot per simulated day.
        assert_eq!(output.snapshots.len(), 11);
        assert_eq!(summary.frames_written, 11);
        assert_eq!(summary.frames, 41);
    }

    #[test]
    fn test_stop_lands_on_a_step_boundary() {
        // 6 steps owed per frame, but the run ends after 10 steps.
        let params = params(10.0 * 3600.0);
        let clock = SimulationClock::new(params.fixed_dt, params.time_scale).unwrap();
        let mut output = MemoryOutput::default();

        let summary = simulate(sun_earth(), &integrator(), clock, &mut output, &params).unwrap();

        assert_eq!(summary.steps, 10);
        assert_eq!(output.snapshots.last().unwrap().step_count, 10);
    }

    #[test]
    fn test_degenerate_state_halts_the_run() {
        let twin = |name: &str| {
            Body::new(
                name,
                BodyKind::Planet,
                1.0e24,
                1.0,
                Color(0, 0, 0),
                Array3d::new(1.0e6, 0.0, 0.0),
                Array3d::default(),
            )
            .unwrap()
        };
        let state = SimulationState::new(vec![twin("A"), twin("B")]).unwrap();
        let params = params(86400.0);
        let clock = SimulationClock::new(params.fixed_dt, params.time_scale).unwrap();
        let mut output = MemoryOutput::default();

        let result = simulate(state, &integrator(), clock, &mut output, &params);
        assert!(matches!(
            result,
            Err(OrreryError::DegenerateConfiguration { .. })
        ));
        // Only the initial snapshot made it out.
        assert_eq!(output.snapshots.len(), 1);
    }

    #[test]
    fn test_run_past_the_calendar_fails_cleanly() {
        let lonely = Body::new(
            "Lonely",
            BodyKind::Planet,
            1.0e20,
            1.0,
            Color(0, 0, 0),
            Array3d::default(),
            Array3d::new(1.0, 0.0, 0.0),
        )
        .unwrap();
        let state = SimulationState::new(vec![lonely]).unwrap();
        let params = SimulationParameters {
            fixed_dt: 1.0e11,
            time_scale: 1.0e12,
            duration_s: 1.0e13,
            ..Default::default()
        };
        let clock = SimulationClock::new(params.fixed_dt, params.time_scale).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let mut output =
            crate::output::csv_output::CSVController::new(dir.path().to_str().unwrap()).unwrap();

        let result = simulate(state, &integrator(), clock, &mut output, &params);
        assert!(matches!(
            result,
            Err(OrreryError::InvalidConfiguration(_))
        ));
        assert!(params.validate().is_err());
    }
}
