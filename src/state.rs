use std::collections::HashSet;

use crate::{
    bodies::body::Body,
    error::{OrreryError, OrreryResult},
    types::{self, Array3d},
};

/// The authoritative set of bodies at the current simulation time.
///
/// Body order is fixed at construction and only the gravity integrator
/// writes positions and velocities.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    bodies: Vec<Body>,
    sim_time_s: f64, // Simulated seconds since the start of the run.
    step_count: u64, // Number of completed integration steps.
}

impl SimulationState {
    pub fn new(bodies: Vec<Body>) -> OrreryResult<Self> {
        let mut names = HashSet::with_capacity(bodies.len());
        for body in &bodies {
            if !names.insert(body.name()) {
                return Err(OrreryError::DuplicateName(body.name().to_string()));
            }
        }

        Ok(Self {
            bodies,
            sim_time_s: 0.0,
            step_count: 0,
        })
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub(crate) fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    pub fn body(&self, name: &str) -> Option<&Body> {
        self.bodies.iter().find(|body| body.name() == name)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn sim_time_s(&self) -> f64 {
        self.sim_time_s
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Record that one integration step of `dt` seconds has completed.
    pub(crate) fn complete_step(&mut self, dt: f64) {
        self.step_count += 1;
        self.sim_time_s += dt;
    }

    pub fn positions(&self) -> Vec<Array3d> {
        self.bodies.iter().map(|body| body.position).collect()
    }

    pub fn masses(&self) -> Vec<f64> {
        self.bodies.iter().map(Body::mass_kg).collect()
    }

    pub fn total_mass(&self) -> f64 {
        self.bodies.iter().map(Body::mass_kg).sum()
    }

    /// Total linear momentum in kg km/s.
    pub fn total_momentum(&self) -> Array3d {
        self.bodies
            .iter()
            .map(|body| body.velocity * body.mass_kg())
            .sum()
    }

    pub fn center_of_mass(&self) -> Array3d {
        let weighted: Array3d = self
            .bodies
            .iter()
            .map(|body| body.position * body.mass_kg())
            .sum();
        weighted / self.total_mass()
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.bodies
            .iter()
            .map(|body| 0.5 * body.mass_kg() * types::l2_norm_squared(&body.velocity))
            .sum()
    }

    /// Pairwise gravitational potential energy. Coincident pairs are skipped.
    pub fn potential_energy(&self, g_km: f64) -> f64 {
        let mut potential = 0.0;
        for (i, a) in self.bodies.iter().enumerate() {
            for b in &self.bodies[i + 1..] {
                let distance = types::l2_norm(&(a.position - b.position));
                if distance > 0.0 {
                    potential -= g_km * a.mass_kg() * b.mass_kg() / distance;
                }
            }
        }
        potential
    }

    /// Kinetic plus potential energy in kg km^2/s^2.
    pub fn total_energy(&self, g_km: f64) -> f64 {
        self.kinetic_energy() + self.potential_energy(g_km)
    }

    /// Move into the centre-of-mass frame: barycenter at the origin, zero
    /// total momentum. Only used while the registry builds the initial state.
    pub(crate) fn recenter_on_barycenter(&mut self) {
        if self.bodies.is_empty() {
            return;
        }
        let com = self.center_of_mass();
        let com_velocity = self.total_momentum() / self.total_mass();
        for body in self.bodies.iter_mut() {
            body.position -= com;
            body.velocity -= com_velocity;
        }
    }
}
