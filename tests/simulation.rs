use std::path::Path;

use chrono::{DateTime, Utc};

use orrery::{
    bodies::{
        body::BodyKind,
        registry::{self, RegistryOptions},
    },
    clock::SimulationClock,
    error::OrreryResult,
    gravity::{common::GravitationalConstant, integrator::GravityIntegrator},
    input::{self, SimulationParameters},
    output::SimulationOutput,
    sim,
    snapshot::{Snapshot, SnapshotPublisher},
};

#[derive(Default)]
struct Frames(Vec<Snapshot>);

impl SimulationOutput for Frames {
    fn write_out_snapshot(
        &mut self,
        snapshot: &Snapshot,
        _epoch: DateTime<Utc>,
    ) -> OrreryResult<()> {
        self.0.push(snapshot.clone());
        Ok(())
    }
}

fn bundled_state() -> orrery::state::SimulationState {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/celestial_bodies_data.toml");
    let source = input::read_body_records(path).unwrap();
    registry::load(&source, &RegistryOptions::default()).unwrap()
}

#[test]
fn paused_clock_holds_the_solar_system_still() {
    let mut state = bundled_state();
    assert!(!state.is_empty());
    let integrator =
        GravityIntegrator::new(Default::default(), GravitationalConstant::default()).unwrap();
    let mut publisher = SnapshotPublisher::new();
    let mut clock = SimulationClock::new(3600.0, 86400.0).unwrap();

    let start = publisher.publish(&state);

    clock.pause();
    assert!(clock.is_paused());
    assert_eq!(clock.accumulate(10.0), 0);
    assert_eq!(clock.pending_time(), 0.0);

    clock.resume();
    clock.set_time_scale(3600.0 * 24.0 * 2.0).unwrap();
    let steps = clock.accumulate(0.5);
    assert_eq!(steps, 24);
    for _ in 0..steps {
        integrator.step(&mut state, clock.fixed_dt()).unwrap();
    }
    assert!((clock.consumed_time() - 86400.0).abs() < 1e-9);

    let after = publisher.publish(&state);
    let earth_before = start.body("Earth").unwrap();
    let earth_after = after.body("Earth").unwrap();
    assert_eq!(earth_after.kind, BodyKind::Planet);
    assert_ne!(earth_before.position, earth_after.position);
    assert_eq!(state.body("Sun").unwrap().kind(), BodyKind::Star);
}

#[test]
fn one_week_of_the_bundled_system() {
    let state = bundled_state();
    let params = SimulationParameters {
        duration_s: 7.0 * 86400.0,
        ..Default::default()
    };
    assert!(params.validate().is_ok());
    let integrator =
        GravityIntegrator::new(params.integrator, params.gravitational_constant).unwrap();
    let clock = SimulationClock::new(params.fixed_dt, params.time_scale).unwrap();
    let mut frames = Frames::default();

    let summary = sim::simulate(state, &integrator, clock, &mut frames, &params).unwrap();

    assert_eq!(summary.steps, 168);
    assert!(summary.relative_energy_drift < 1e-6);
    let last = frames.0.last().unwrap();
    assert_eq!(last.step_count, 168);
    assert!(last.body("Moon").is_some());
}
