use serde::Serialize;

use crate::{
    bodies::body::{BodyKind, Color},
    state::SimulationState,
    types::Array3d,
};

/// Render-facing copy of one body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct BodySnapshot {
    pub name: String,
    pub kind: BodyKind,
    pub position: Array3d, // km
    pub velocity: Array3d, // km/s
    pub radius_km: f64,
    pub color: Color,
}

/// Immutable copy of the simulation state taken between two completed steps.
/// Owns all of its data, nothing in it points back into the live state.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub frame: u64,
    pub sim_time_s: f64,
    pub step_count: u64,
    pub bodies: Vec<BodySnapshot>,
}

impl Snapshot {
    pub fn body(&self, name: &str) -> Option<&BodySnapshot> {
        self.bodies.iter().find(|body| body.name == name)
    }
}

/// Hands out one snapshot per rendered frame.
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    frames_published: u64,
}

impl SnapshotPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_published(&self) -> u64 {
        self.frames_published
    }

    /// Deep copy of `state`. Takes a shared borrow, so it can never run while
    /// the integrator holds the state mutably in the middle of a step.
    pub fn publish(&mut self, state: &SimulationState) -> Snapshot {
        let bodies = state
            .bodies()
            .iter()
            .map(|body| BodySnapshot {
                name: body.name().to_string(),
                kind: body.kind(),
                position: *body.position(),
                velocity: *body.velocity(),
                radius_km: body.radius_km(),
                color: body.color(),
            })
            .collect();

        let snapshot = Snapshot {
            frame: self.frames_published,
            sim_time_s: state.sim_time_s(),
            step_count: state.step_count(),
            bodies,
        };
        self.frames_published += 1;

        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::body::Body;
    use crate::gravity::common::GravitationalConstant;
    use crate::gravity::integrator::{GravityIntegrator, IntegrationScheme};

    fn state() -> SimulationState {
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
                Array3d::new(149_597_870.7, 0.0, 0.0),
                Array3d::new(0.0, 29.78, 0.0),
            )
            .unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn test_snapshot_copies_state() {
        let state = state();
        let mut publisher = SnapshotPublisher::new();
        let snapshot = publisher.publish(&state);

        assert_eq!(snapshot.frame, 0);
        assert_eq!(snapshot.bodies.len(), 2);
        let earth = snapshot.body("Earth").unwrap();
        assert_eq!(earth.kind, BodyKind::Planet);
        assert_eq!(earth.radius_km, 6371.0);
        assert_eq!(earth.color, Color(100, 149, 237));
        assert_eq!(&earth.position, state.body("Earth").unwrap().position());
    }

    #[test]
    fn test_snapshot_is_independent_of_later_steps() {
        let mut state = state();
        let integrator =
            GravityIntegrator::new(IntegrationScheme::VelocityVerlet, GravitationalConstant::default())
                .unwrap();
        let mut publisher = SnapshotPublisher::new();

        let before = publisher.publish(&state);
        let frozen = before.clone();
        for _ in 0..10 {
            integrator.step(&mut state, 3600.0).unwrap();
        }
        let after = publisher.publish(&state);

        assert_eq!(before, frozen);
        assert_eq!(before.step_count, 0);
        assert_eq!(after.step_count, 10);
        assert_eq!(after.frame, 1);
        assert_ne!(
            before.body("Earth").unwrap().position,
            after.body("Earth").unwrap().position
        );
        assert_eq!(publisher.frames_published(), 2);
    }
}
